use crate::{config, database, sheets, web};

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("web error: {0}")]
    Web(#[from] web::Error),
    #[error("signup sink error: {0}")]
    Sink(#[from] sheets::SinkError),
    #[error("database error: {0}")]
    Database(#[from] database::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
