use axum::extract::State;
use axum::{Form, Json, Router, routing::post};
use serde::{Deserialize, Serialize};
use turnstile_core::{RegistrationParams, TaskId};

use crate::error::AppResult;
use crate::state::AppState;

/// Form body of `POST /register`. Missing fields are left to queue validation
/// so the client gets the same message for absent and blank values.
#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    first_name: Option<String>,
    last_name: Option<String>,
    username: Option<String>,
    email: Option<String>,
}

impl From<RegisterForm> for RegistrationParams {
    fn from(form: RegisterForm) -> Self {
        RegistrationParams::new(
            form.first_name.unwrap_or_default(),
            form.last_name.unwrap_or_default(),
            form.username.unwrap_or_default(),
            form.email.unwrap_or_default(),
        )
    }
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub success: bool,
    pub task_id: TaskId,
    pub message: &'static str,
}

/// POST /register -- queue a registration and return immediately.
async fn register(
    State(state): State<AppState>,
    Form(form): Form<RegisterForm>,
) -> AppResult<Json<RegisterResponse>> {
    let task_id = state.queue.submit(form.into()).await?;

    Ok(Json(RegisterResponse {
        success: true,
        task_id,
        message: "task added to queue",
    }))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/register", post(register))
}
