use std::time::Duration;

use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::info;

use crate::config::AppConfig;

/// Holds the Postgres pool backing the status checks.
///
/// The pool connects lazily, so the server comes up (and keeps taking signups)
/// while the database is unreachable.
#[derive(Clone, Debug)]
pub struct DbManager {
    db: PgPool,
}

impl DbManager {
    pub fn init(config: &AppConfig) -> Self {
        info!("{:<20} - Initializing the DB pool", "init_db");
        let max_cons = if cfg!(test) { 1 } else { 5 };

        let con_opts = config.db_config.connection_options();

        let db_pool = PgPoolOptions::new()
            .max_connections(max_cons)
            .acquire_timeout(Duration::from_millis(500))
            .connect_lazy_with(con_opts);

        Self { db: db_pool }
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.db).await?;
        Ok(())
    }

    pub fn db(&self) -> &PgPool {
        &self.db
    }
}

// ###################################
// ->   ERROR
// ###################################
pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("sqlx error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("sqlx migration error: {0}")]
    SqlxMigrate(#[from] sqlx::migrate::MigrateError),
}
