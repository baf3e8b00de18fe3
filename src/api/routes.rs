//! Router assembly and server startup.

use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, http::StatusCode, response::Response, routing::get, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::notify::{self, LogNotifier, Notifier, WebhookNotifier};
use crate::optimizer::OpenRouterOptimizer;
use crate::store::create_task_store;
use crate::task::service::{ReconcilePolicy, TaskService};

use super::tasks;
use super::types::{success, HealthResponse};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub service: Arc<TaskService>,
    pub persistent_store: bool,
}

/// Start the HTTP server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let store = create_task_store(config.store, config.data_dir.clone()).await?;
    tracing::info!(persistent = store.is_persistent(), "task store initialized");

    let optimizer = Arc::new(OpenRouterOptimizer::new(
        config.api_key.clone(),
        config.optimizer_model.clone(),
        Duration::from_secs(config.optimizer_timeout_secs),
    ));
    let policy = ReconcilePolicy {
        max_attempts: config.max_rearrange_attempts,
        include_completed: config.rearrange_include_completed,
        min_gap_minutes: config.min_gap_minutes,
    };
    let service = Arc::new(TaskService::new(Arc::clone(&store), optimizer, policy));

    // Reminder poller: scans for tasks starting each minute.
    let notifier: Arc<dyn Notifier> = match &config.notify_webhook_url {
        Some(url) => {
            tracing::info!(url = %url, "reminder webhook configured");
            Arc::new(WebhookNotifier::new(url.clone()))
        }
        None => Arc::new(LogNotifier),
    };
    notify::spawn_due_task_poller(Arc::clone(&store), notifier);

    let persistent_store = store.is_persistent();
    let state = Arc::new(AppState {
        config: config.clone(),
        service,
        persistent_store,
    });

    let app = Router::new()
        .route("/health", get(health))
        .nest("/tasks", tasks::routes())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// GET /health - Health check.
async fn health(State(state): State<Arc<AppState>>) -> Response {
    success(
        "OK",
        StatusCode::OK,
        HealthResponse {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            persistent_store: state.persistent_store,
        },
    )
}
