//! API request/response types and the response envelope.
//!
//! Every response, success or error, is wrapped in the same envelope:
//! `{"status": bool, "code": u16, "message": string, "data": ...}` with
//! `data: []` on errors.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::optimizer::OptimizerErrorKind;
use crate::task::classify::RearrangeRange;
use crate::task::service::SchedulingError;
use crate::task::DayOfWeek;

/// Uniform response envelope.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub status: bool,
    pub code: u16,
    pub message: String,
    pub data: T,
}

/// Build a success response.
pub fn success<T: Serialize>(message: &str, code: StatusCode, data: T) -> Response {
    (
        code,
        Json(Envelope {
            status: true,
            code: code.as_u16(),
            message: message.to_string(),
            data,
        }),
    )
        .into_response()
}

/// An error carried to the client as an envelope with empty `data`.
///
/// Only stable messages cross this boundary; internal detail stays in the log.
#[derive(Debug)]
pub struct ApiError {
    pub code: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn unauthenticated() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Unauthenticated")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.code,
            Json(Envelope {
                status: false,
                code: self.code.as_u16(),
                message: self.message,
                data: json!([]),
            }),
        )
            .into_response()
    }
}

impl From<SchedulingError> for ApiError {
    fn from(e: SchedulingError) -> Self {
        match e {
            SchedulingError::NotFound => Self::new(StatusCode::NOT_FOUND, "Task Not Found"),
            SchedulingError::Validation(message) => {
                Self::new(StatusCode::UNPROCESSABLE_ENTITY, message)
            }
            SchedulingError::Optimizer(err) => {
                tracing::error!("optimizer failure: {}", err);
                let message = match err.kind {
                    OptimizerErrorKind::ParseError => "Optimizer Returned An Invalid Proposal",
                    _ => "Optimizer Unavailable",
                };
                Self::new(StatusCode::BAD_GATEWAY, message)
            }
            SchedulingError::SchedulingFailure { attempts } => {
                tracing::warn!(attempts, "rearrangement gave up");
                Self::new(
                    StatusCode::CONFLICT,
                    "Unable To Find A Conflict-Free Schedule",
                )
            }
            SchedulingError::Store(err) => {
                tracing::error!("storage failure: {}", err);
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
            }
        }
    }
}

/// Caller identity, injected by the upstream gateway as `X-User-Id`.
///
/// Session management is not this service's concern; the header is trusted
/// the same way a reverse proxy's authenticated-user header would be.
#[derive(Debug, Clone, Copy)]
pub struct UserId(pub Uuid);

#[async_trait::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for UserId {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(ApiError::unauthenticated)?;
        let id = Uuid::parse_str(value).map_err(|_| ApiError::unauthenticated())?;
        Ok(UserId(id))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Request Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub title: String,
    pub desc: Option<String>,
    pub day_of_week: DayOfWeek,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    #[serde(default)]
    pub all_day: bool,
    #[serde(default)]
    pub is_recurring: bool,
    #[serde(default)]
    pub is_fixed: bool,
    pub is_completed: Option<bool>,
    pub deadline: Option<NaiveDateTime>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    pub desc: Option<String>,
    pub day_of_week: Option<DayOfWeek>,
    pub start_time: Option<NaiveDateTime>,
    pub end_time: Option<NaiveDateTime>,
    pub all_day: Option<bool>,
    pub is_recurring: Option<bool>,
    pub is_fixed: Option<bool>,
    pub is_completed: Option<bool>,
    pub deadline: Option<NaiveDateTime>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListTasksQuery {
    pub day: Option<DayOfWeek>,
    pub is_recurring: Option<bool>,
    pub is_fixed: Option<bool>,
    pub is_completed: Option<bool>,
    /// Parameterizes recurring-task projection only; never filters rows.
    pub current_date: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct GetTaskQuery {
    pub current_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct RearrangeRequest {
    pub range: RearrangeRange,
    pub current_date: Option<NaiveDate>,
}

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Service version
    pub version: String,
    /// Whether the task store persists across restarts
    pub persistent_store: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_envelope_has_empty_data_array() {
        let response = ApiError::new(StatusCode::NOT_FOUND, "Task Not Found");
        let envelope = Envelope {
            status: false,
            code: response.code.as_u16(),
            message: response.message.clone(),
            data: json!([]),
        };
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["status"], json!(false));
        assert_eq!(value["code"], json!(404));
        assert_eq!(value["message"], json!("Task Not Found"));
        assert_eq!(value["data"], json!([]));
    }

    #[test]
    fn scheduling_errors_map_to_stable_codes() {
        let not_found = ApiError::from(SchedulingError::NotFound);
        assert_eq!(not_found.code, StatusCode::NOT_FOUND);

        let invalid = ApiError::from(SchedulingError::Validation("bad".to_string()));
        assert_eq!(invalid.code, StatusCode::UNPROCESSABLE_ENTITY);

        let exhausted = ApiError::from(SchedulingError::SchedulingFailure { attempts: 3 });
        assert_eq!(exhausted.code, StatusCode::CONFLICT);
    }

    #[test]
    fn rearrange_request_parses_range_values() {
        let body: RearrangeRequest =
            serde_json::from_str(r#"{"range": "week", "current_date": "2025-03-12"}"#).unwrap();
        assert_eq!(body.range, RearrangeRange::Week);
        assert_eq!(
            body.current_date,
            Some(NaiveDate::from_ymd_opt(2025, 3, 12).unwrap())
        );

        let body: RearrangeRequest = serde_json::from_str(r#"{"range": "day"}"#).unwrap();
        assert_eq!(body.range, RearrangeRange::Day);
        assert!(body.current_date.is_none());

        assert!(serde_json::from_str::<RearrangeRequest>(r#"{"range": "month"}"#).is_err());
    }

    #[test]
    fn create_request_rejects_invalid_day_of_week() {
        let result = serde_json::from_str::<CreateTaskRequest>(
            r#"{
                "title": "t",
                "day_of_week": "Funday",
                "start_time": "2025-03-12T09:00:00",
                "end_time": "2025-03-12T10:00:00"
            }"#,
        );
        assert!(result.is_err());
    }
}
