//! HTTP API for the task service.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /tasks` - List the caller's tasks
//! - `GET /tasks/{id}` - Get a single task
//! - `POST /tasks` - Create a task
//! - `PUT /tasks/{id}` - Partially update a task
//! - `DELETE /tasks/{id}` - Delete a task
//! - `POST /tasks/rearrange` - Rearrange the caller's schedule
//!
//! All `/tasks` routes require an `X-User-Id` header from the upstream
//! gateway; responses use the `{status, code, message, data}` envelope.

pub mod routes;
pub mod tasks;
pub mod types;

pub use routes::serve;
