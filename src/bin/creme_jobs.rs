//! Worker running the due jobs: reminders, sendings, recurrent generation
//! and the trash cleaner.

use std::thread;
use std::time::Duration;

use dotenvy::dotenv;

use creme_crm::db::establish_connection_pool;
use creme_crm::models::config::ServerConfig;
use creme_crm::repository::DieselRepository;
use creme_crm::services::emails::LogTransport;
use creme_crm::services::jobs::run_due_jobs;

fn main() {
    dotenv().ok(); // Load .env file
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let server_config = match ServerConfig::load() {
        Ok(server_config) => server_config,
        Err(err) => {
            log::error!("Error loading server config: {err}");
            std::process::exit(1);
        }
    };

    let pool = match establish_connection_pool(&server_config.database_url) {
        Ok(pool) => pool,
        Err(e) => {
            log::error!("Failed to establish database connection: {e}");
            std::process::exit(1);
        }
    };
    let repo = DieselRepository::new(pool);
    let poll = Duration::from_secs(server_config.jobs_poll_seconds.max(1));

    log::info!("Starting jobs worker, polling every {}s", poll.as_secs());

    loop {
        let now = chrono::Utc::now().naive_utc();
        match run_due_jobs(&repo, &LogTransport, now) {
            Ok(results) => {
                for (job_type, result) in results {
                    if let Some(error) = result.error {
                        log::warn!("Job {} failed: {error}", job_type.as_str());
                    }
                }
            }
            Err(e) => log::error!("Error running the due jobs: {e}"),
        }
        thread::sleep(poll);
    }
}
