//! SQLite connection pool shared by the server, the job runner and the CLI.

use std::time::Duration;

use diesel::connection::SimpleConnection;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool, PoolError, PooledConnection};
use diesel::sqlite::SqliteConnection;

pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;
pub type DbConnection = PooledConnection<ConnectionManager<SqliteConnection>>;

/// Pragmas run on every connection handed out by the pool.
#[derive(Debug, Clone)]
pub struct SqlitePragmas {
    /// WAL journal; unavailable for in-memory databases.
    pub wal: bool,
    /// Relations, custom values and lines cascade through foreign keys.
    pub foreign_keys: bool,
    pub busy_timeout: Duration,
}

impl Default for SqlitePragmas {
    fn default() -> Self {
        Self {
            wal: true,
            foreign_keys: true,
            busy_timeout: Duration::from_secs(30),
        }
    }
}

impl SqlitePragmas {
    fn statements(&self) -> String {
        let mut sql = String::new();
        if self.wal {
            sql.push_str("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL; ");
        }
        if self.foreign_keys {
            sql.push_str("PRAGMA foreign_keys = ON; ");
        }
        sql.push_str(&format!(
            "PRAGMA busy_timeout = {};",
            self.busy_timeout.as_millis()
        ));
        sql
    }
}

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for SqlitePragmas {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
        conn.batch_execute(&self.statements())
            .map_err(diesel::r2d2::Error::QueryError)
    }
}

/// Whether every connection to `database_url` opens its own private database.
pub fn is_in_memory(database_url: &str) -> bool {
    database_url == ":memory:" || database_url.contains("mode=memory")
}

/// Pool for `database_url` with the default pragmas.
///
/// In-memory databases get a single connection so that every caller sees the
/// same data.
pub fn establish_connection_pool(database_url: &str) -> Result<DbPool, PoolError> {
    let in_memory = is_in_memory(database_url);
    let pragmas = SqlitePragmas {
        wal: !in_memory,
        ..SqlitePragmas::default()
    };
    let builder = Pool::builder().connection_customizer(Box::new(pragmas));
    let builder = if in_memory { builder.max_size(1) } else { builder };
    builder.build(ConnectionManager::<SqliteConnection>::new(database_url))
}

pub fn get_connection(pool: &DbPool) -> Result<DbConnection, PoolError> {
    pool.get().inspect_err(|err| {
        log::error!("No database connection available: {err}");
    })
}
