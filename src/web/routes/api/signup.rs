use axum::{extract::State, Json};

use crate::{
    sheets::SignupRecord,
    web::{
        types::{DeserSignup, NormalizedEmail, SignupResponse},
        WebResult,
    },
    AppState,
};

/// Validates the email before anything touches the network, then appends it to the sheet.
/// Sink failures come back as `web::Error` and are turned into one generic message by the
/// response mapper.
#[tracing::instrument(
    name = "Adding a waitlist signup",
    skip(app_state, signup),
    fields(signup_email = %signup.email)
)]
pub async fn signup(
    State(app_state): State<AppState>,
    Json(signup): Json<DeserSignup>,
) -> WebResult<Json<SignupResponse>> {
    let email = NormalizedEmail::try_from(signup)?;
    let record = SignupRecord::new(email);

    app_state.signup_sink.try_append_signup(&record).await?;

    Ok(Json(SignupResponse::joined()))
}
