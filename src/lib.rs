//! # replan
//!
//! Self-hosted calendar task service with AI-assisted schedule rearrangement.
//!
//! This library provides:
//! - A user-scoped task repository with memory and SQLite backends
//! - A reconciliation engine that turns optimizer proposals into validated,
//!   conflict-free schedules
//! - A function-calling gateway to an external scheduling optimizer
//! - A thin HTTP surface and a minute-cadence reminder poller
//!
//! ## Rearrangement Flow
//! 1. Load and classify the user's tasks for the requested range
//! 2. Project recurring templates onto the target week
//! 3. Submit the candidate snapshot to the optimizer
//! 4. Validate the proposal (immutability, forward-only, conflicts); retry
//!    on residual conflicts up to the configured budget
//! 5. Persist accepted timing changes and return projected views
//!
//! ## Modules
//! - `task`: domain model, projection, classification, conflicts, service
//! - `store`: task repository backends
//! - `optimizer`: optimizer gateway
//! - `api`: HTTP surface
//! - `notify`: reminder poller

pub mod api;
pub mod config;
pub mod notify;
pub mod optimizer;
pub mod store;
pub mod task;

pub use config::Config;
