//! dockyard-api — REST API for Dockyard.
//!
//! Provides axum route handlers for registering compose applications and
//! driving their containers. Definitions are posted as raw YAML bodies;
//! every response is a JSON envelope `{ success, data?, error? }`.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/api/v1/apps` | List applications |
//! | POST | `/api/v1/apps[?name=]` | Register an application |
//! | GET | `/api/v1/apps/{id}` | Application with live container status |
//! | DELETE | `/api/v1/apps/{id}` | Tear down and delete an application |
//! | POST | `/api/v1/apps/{id}/start` | Start every service |
//! | POST | `/api/v1/apps/{id}/stop` | Stop every service |
//! | POST | `/api/v1/apps/{id}/update` | Replace the definition and reconcile |
//! | GET | `/healthz` | Liveness |

pub mod handlers;

use axum::Router;
use axum::routing::{get, post};
use dockyard_reconcile::AppController;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub controller: AppController,
}

/// Build the complete API router.
pub fn build_router(controller: AppController) -> Router {
    let api_state = ApiState { controller };

    let api_routes = Router::new()
        .route("/apps", get(handlers::list_apps).post(handlers::register_app))
        .route("/apps/{id}", get(handlers::get_app).delete(handlers::delete_app))
        .route("/apps/{id}/start", post(handlers::start_app))
        .route("/apps/{id}/stop", post(handlers::stop_app))
        .route("/apps/{id}/update", post(handlers::update_app))
        .with_state(api_state);

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/healthz", get(handlers::healthz))
}
