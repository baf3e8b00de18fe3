//! Task API endpoints.
//!
//! Thin handlers that delegate to the task service and wrap results in the
//! response envelope. All scheduling logic lives in [`crate::task::service`].

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Response,
    routing::{delete, get, post, put},
    Json, Router,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::store::{NewTask, TaskPatch};
use crate::task::service::TaskQuery;

use super::routes::AppState;
use super::types::*;

/// Create task routes, nested under `/tasks`.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_tasks))
        .route("/", post(create_task))
        .route("/rearrange", post(rearrange))
        .route("/:id", get(get_task))
        .route("/:id", put(update_task))
        .route("/:id", delete(delete_task))
}

/// GET /tasks - List the caller's tasks.
async fn list_tasks(
    State(state): State<Arc<AppState>>,
    UserId(user_id): UserId,
    Query(query): Query<ListTasksQuery>,
) -> Result<Response, ApiError> {
    let query = TaskQuery {
        day: query.day,
        is_recurring: query.is_recurring,
        is_fixed: query.is_fixed,
        is_completed: query.is_completed,
        current_date: query.current_date,
    };
    let tasks = state.service.list_tasks(user_id, &query).await?;
    Ok(success("Get Tasks Successfully", StatusCode::OK, tasks))
}

/// GET /tasks/:id - Get a single task.
async fn get_task(
    State(state): State<Arc<AppState>>,
    UserId(user_id): UserId,
    Path(id): Path<Uuid>,
    Query(query): Query<GetTaskQuery>,
) -> Result<Response, ApiError> {
    let task = state
        .service
        .get_task(user_id, id, query.current_date)
        .await?;
    Ok(success("Get Task By ID Successfully", StatusCode::OK, task))
}

/// POST /tasks - Create a task.
async fn create_task(
    State(state): State<Arc<AppState>>,
    UserId(user_id): UserId,
    Json(body): Json<CreateTaskRequest>,
) -> Result<Response, ApiError> {
    let input = NewTask {
        title: body.title,
        desc: body.desc,
        day_of_week: body.day_of_week,
        start_time: body.start_time,
        end_time: body.end_time,
        all_day: body.all_day,
        is_recurring: body.is_recurring,
        is_fixed: body.is_fixed,
        is_completed: body.is_completed,
        deadline: body.deadline,
    };
    let task = state.service.create_task(user_id, input).await?;
    Ok(success("Create Tasks Successfully", StatusCode::CREATED, task))
}

/// PUT /tasks/:id - Partially update a task.
async fn update_task(
    State(state): State<Arc<AppState>>,
    UserId(user_id): UserId,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateTaskRequest>,
) -> Result<Response, ApiError> {
    let patch = TaskPatch {
        title: body.title,
        desc: body.desc,
        day_of_week: body.day_of_week,
        start_time: body.start_time,
        end_time: body.end_time,
        all_day: body.all_day,
        is_recurring: body.is_recurring,
        is_fixed: body.is_fixed,
        is_completed: body.is_completed,
        deadline: body.deadline,
    };
    let task = state.service.update_task(user_id, id, patch).await?;
    Ok(success("Update By ID Successfully", StatusCode::OK, task))
}

/// DELETE /tasks/:id - Delete a task.
async fn delete_task(
    State(state): State<Arc<AppState>>,
    UserId(user_id): UserId,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    state.service.delete_task(user_id, id).await?;
    Ok(success(
        "Delete Task By ID Successfully",
        StatusCode::OK,
        serde_json::json!([]),
    ))
}

/// POST /tasks/rearrange - Rearrange the caller's schedule.
async fn rearrange(
    State(state): State<Arc<AppState>>,
    UserId(user_id): UserId,
    Json(body): Json<RearrangeRequest>,
) -> Result<Response, ApiError> {
    let tasks = state
        .service
        .rearrange(user_id, body.range, body.current_date)
        .await?;
    Ok(success("Rearrange By AI Successfully", StatusCode::OK, tasks))
}
