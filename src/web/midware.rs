use std::sync::Arc;

use axum::{
    http::{HeaderMap, Method, Uri},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use uuid::Uuid;

use crate::web::{log, Error, REQUEST_ID_HEADER};

/// Turns a stashed `web::Error` into the client facing error body and logs every request.
pub async fn response_mapper(
    req_method: Method,
    uri: Uri,
    headers: HeaderMap,
    resp: Response,
) -> Response {
    let req_id = headers
        .get(REQUEST_ID_HEADER)
        .and_then(|id| id.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let web_error = resp.extensions().get::<Arc<Error>>().map(Arc::as_ref);
    let client_status_and_error = web_error.map(Error::status_code_and_client_error);

    let err_resp = client_status_and_error.as_ref().map(|(status, cl_err)| {
        let client_error_body = json!({
            "success": false,
            "message": cl_err.to_string(),
            "req_id": req_id,
        });

        (*status, Json(client_error_body)).into_response()
    });

    log::log_request(
        &req_id,
        req_method,
        uri,
        resp.status(),
        web_error,
        client_status_and_error.as_ref(),
    );

    err_resp.unwrap_or(resp)
}
