use axum::http::{Method, StatusCode, Uri};
use serde::Serialize;
use serde_json::json;
use tracing::{error, info};

use super::error::ClientError;
use crate::web::Error;

/// Emits one structured line per request. Server side errors keep their full detail here,
/// the client only ever gets the `ClientError` message.
pub fn log_request(
    req_id: &str,
    req_method: Method,
    uri: Uri,
    status_code: StatusCode,
    web_error: Option<&Error>,
    client_status_and_error: Option<&(StatusCode, ClientError)>,
) {
    let timestamp = chrono::Utc::now().to_rfc3339();
    let client_error_type = client_status_and_error.map(|(_, ce)| ce.as_ref().to_string());
    let status_code = client_status_and_error
        .map(|(sc, _)| *sc)
        .unwrap_or(status_code);

    let logline = LogLine {
        timestamp,
        req_id: req_id.to_string(),
        req_method: req_method.to_string(),
        uri: uri.to_string(),
        status_code: status_code.as_u16(),
        client_error_type,
        web_error_type: web_error.map(|we| we.as_ref().to_string()),
        web_error_data: web_error.map(|we| we.to_string()),
    };

    if status_code.is_server_error() {
        error!("LOGLINE: {}", json!(logline));
    } else {
        info!("LOGLINE: {}", json!(logline));
    }
}

#[derive(Serialize)]
struct LogLine {
    timestamp: String,
    req_id: String,

    req_method: String,
    uri: String,
    status_code: u16,

    #[serde(skip_serializing_if = "Option::is_none")]
    client_error_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    web_error_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    web_error_data: Option<String>,
}
