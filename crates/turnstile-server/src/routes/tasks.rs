use axum::extract::{Path, State};
use axum::{Json, Router, routing::get};
use serde::Serialize;
use turnstile_core::{TaskId, TaskView};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct TaskResponse {
    pub success: bool,
    pub task: TaskView,
}

/// GET /task/{task_id} -- current status of one task.
async fn get_task(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> AppResult<Json<TaskResponse>> {
    // An id we could never have issued is just another unknown task.
    let task_id: TaskId = raw_id
        .parse()
        .map_err(|_| AppError::UnknownTask(raw_id.clone()))?;

    let task = state.queue.status(task_id).await?;
    Ok(Json(TaskResponse {
        success: true,
        task,
    }))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/task/{task_id}", get(get_task))
}
