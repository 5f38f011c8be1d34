//! Configuration model loaded from external sources.

use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
/// Basic configuration shared across handlers and binaries.
pub struct ServerConfig {
    pub domain: String,
    pub address: String,
    pub port: u16,
    pub database_url: String,
    pub templates_dir: String,
    pub secret: String,
    pub auth_service_url: String,
    /// Names of the default routes an overriding deployment registers itself.
    #[serde(default)]
    pub swapped_routes: Vec<String>,
    /// `From` address of campaign sendings.
    #[serde(default = "default_mail_sender")]
    pub mail_sender: String,
    /// Delay between two polls of `creme_jobs`.
    #[serde(default = "default_jobs_poll_seconds")]
    pub jobs_poll_seconds: u64,
}

fn default_mail_sender() -> String {
    "crm@localhost".to_string()
}

fn default_jobs_poll_seconds() -> u64 {
    60
}

#[cfg(feature = "server")]
impl ServerConfig {
    /// Layers `config/default.yaml`, `config/{APP_ENV}.yaml` and `APP_*`
    /// environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        // Select config profile (defaults to `local`).
        let app_env = std::env::var("APP_ENV").unwrap_or_else(|_| "local".into());
        config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name(&format!("config/{app_env}")).required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .list_separator(",")
                    .with_list_parse_key("swapped_routes")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
