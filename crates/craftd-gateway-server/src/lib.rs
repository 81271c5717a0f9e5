pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod streaming;

use auth::JwtVerifier;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use craftd_executor::{
    ActionExecutor, ContainerRuntime, InstanceInspector, LifecycleConfig, LogTailPoller,
    Provisioner,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

#[derive(Clone)]
pub struct AppState {
    pub runtime: Arc<dyn ContainerRuntime>,
    pub inspector: InstanceInspector,
    pub provisioner: Provisioner,
    pub executor: ActionExecutor,
    pub poller: LogTailPoller,
    pub auth: Arc<JwtVerifier>,
}

impl AppState {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        lifecycle: LifecycleConfig,
        jwt_secret: &str,
    ) -> Self {
        Self {
            inspector: InstanceInspector::new(runtime.clone(), lifecycle.image_repo.clone()),
            executor: ActionExecutor::new(runtime.clone(), &lifecycle),
            poller: LogTailPoller::new(runtime.clone(), &lifecycle),
            provisioner: Provisioner::new(runtime.clone(), lifecycle),
            auth: Arc::new(JwtVerifier::new(jwt_secret)),
            runtime,
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    let protected = Router::new()
        .route("/me", get(routes::me))
        .route("/servers", get(routes::list_servers))
        .route("/servers/create", post(routes::create_server))
        .route("/servers/:id", get(routes::get_server))
        .route("/servers/:id/action", post(routes::server_action))
        .route("/servers/:id/logs", get(streaming::stream_logs))
        .route(
            "/servers/:id/commands/:dispatch_id",
            get(routes::command_record),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ));

    let api = Router::new()
        .route("/health", get(routes::health))
        .merge(protected);

    Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
