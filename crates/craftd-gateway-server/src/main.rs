use anyhow::Context;
use craftd_executor::DockerRuntime;
use craftd_gateway_server::{config::GatewayConfig, create_app, AppState};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                EnvFilter::new("info,craftd_gateway_server=debug,craftd_executor=debug")
            }),
        )
        .init();

    let config = GatewayConfig::from_env()?;

    let runtime = DockerRuntime::connect().context("Failed to connect to Docker")?;
    let state = AppState::new(Arc::new(runtime), config.lifecycle.clone(), &config.jwt_secret);
    let app = create_app(state);

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(%addr, image_repo = %config.lifecycle.image_repo, "craftd gateway listening");

    axum::serve(listener, app).await?;
    Ok(())
}
