use std::path::PathBuf;

use creme_crm::db::{DbPool, establish_connection_pool};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use tempfile::TempDir;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// SQLite database in a temporary directory, migrated and seeded.
///
/// The directory and the database file are removed on drop.
pub struct TestDb {
    _dir: TempDir,
    path: PathBuf,
    pool: DbPool,
}

impl TestDb {
    pub fn new(name: &str) -> Self {
        let dir = tempfile::tempdir().expect("temporary directory");
        let path = dir.path().join(name);
        let url = path.to_string_lossy().to_string();
        let pool = establish_connection_pool(&url).expect("connection pool");
        let mut conn = pool.get().expect("connection");
        conn.run_pending_migrations(MIGRATIONS)
            .expect("migrations applied");
        Self {
            _dir: dir,
            path,
            pool,
        }
    }

    pub fn pool(&self) -> DbPool {
        self.pool.clone()
    }

    #[allow(dead_code)]
    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

/// Configuration for apps built in tests; nothing here is contacted.
#[allow(dead_code)]
pub fn server_config(swapped_routes: &[&str]) -> creme_crm::models::config::ServerConfig {
    creme_crm::models::config::ServerConfig {
        domain: "localhost".into(),
        address: "127.0.0.1".into(),
        port: 8080,
        database_url: ":memory:".into(),
        templates_dir: "templates/**/*".into(),
        secret: "swordfish".into(),
        auth_service_url: "http://localhost/auth".into(),
        swapped_routes: swapped_routes.iter().map(|name| name.to_string()).collect(),
        mail_sender: "crm@localhost".into(),
        jobs_poll_seconds: 60,
    }
}
