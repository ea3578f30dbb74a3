use axum::{extract::State, Json};
use tracing::info;

use crate::{
    web::{
        types::{StatusCheck, StatusCheckCreate},
        WebResult,
    },
    AppState,
};

/// Upper bound on the number of status checks returned by one listing.
const STATUS_LIST_LIMIT: i64 = 1000;

#[tracing::instrument(name = "Recording status check", skip(app_state, input), fields(client_name = %input.client_name))]
pub async fn status_create(
    State(app_state): State<AppState>,
    Json(input): Json<StatusCheckCreate>,
) -> WebResult<Json<StatusCheck>> {
    let status_check = StatusCheck::from(input);

    sqlx::query(
        r#"INSERT INTO status_checks (id, client_name, timestamp)
    VALUES ($1, $2, $3)"#,
    )
    .bind(status_check.id)
    .bind(&status_check.client_name)
    .bind(status_check.timestamp)
    .execute(app_state.database_mgr.db())
    .await?;

    info!("Status check recorded");
    Ok(Json(status_check))
}

#[tracing::instrument(name = "Listing status checks", skip(app_state))]
pub async fn status_list(State(app_state): State<AppState>) -> WebResult<Json<Vec<StatusCheck>>> {
    let status_checks = sqlx::query_as::<_, StatusCheck>(
        r#"SELECT id, client_name, timestamp FROM status_checks
    ORDER BY timestamp
    LIMIT $1"#,
    )
    .bind(STATUS_LIST_LIMIT)
    .fetch_all(app_state.database_mgr.db())
    .await?;

    Ok(Json(status_checks))
}
