pub mod signup;
pub mod status;

pub use signup::signup;
pub use status::{status_create, status_list};

use axum::Json;
use serde_json::{json, Value};

pub async fn root() -> Json<Value> {
    Json(json!({ "message": "Hello World" }))
}
