use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use strum_macros::AsRefStr;

use crate::{sheets::SinkError, web::types::DataParsingError};

pub type WebResult<T> = core::result::Result<T, Error>;

#[derive(Debug, AsRefStr, thiserror::Error)]
pub enum Error {
    #[error("data parsing error: {0}")]
    DataParsing(#[from] DataParsingError),
    #[error("signup sink error: {0}")]
    SignupSink(#[from] SinkError),

    #[error("sqlx error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

impl Error {
    pub fn status_code_and_client_error(&self) -> (StatusCode, ClientError) {
        use ClientError::*;

        match self {
            Error::DataParsing(data_er) => {
                (StatusCode::BAD_REQUEST, InvalidInput(data_er.to_string()))
            }
            Error::SignupSink(_) => (StatusCode::INTERNAL_SERVER_ERROR, SignupFailed),
            Error::Sqlx(_) => (StatusCode::INTERNAL_SERVER_ERROR, ServiceError),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        tracing::debug!("{:<12} - into_response(Error: {self:?})", "INTO_RESP");

        // Construct a response
        let mut res = StatusCode::INTERNAL_SERVER_ERROR.into_response();

        // Insert the Error into response so that it can be retrieved later.
        res.extensions_mut().insert(Arc::new(self));

        res
    }
}

/// What the caller gets to see. Upstream detail never makes it in here.
#[derive(Debug, AsRefStr, derive_more::Display)]
pub enum ClientError {
    #[display("{_0}")]
    InvalidInput(String),
    #[display("Failed to save signup. Please try again.")]
    SignupFailed,
    #[display("Service Error!")]
    ServiceError,
}
