//! Sandbox service binary. Configuration comes from `SANDBOX_*`
//! environment variables; a bind failure exits non-zero.

use tracing_subscriber::EnvFilter;

use oasis_sandbox::{build_router, SandboxConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = SandboxConfig::from_env();
    tracing::info!(
        addr = %config.addr,
        workspace = %config.workspace,
        max_concurrent = config.max_concurrent,
        "starting sandbox service"
    );

    std::fs::create_dir_all(&config.workspace)?;
    let addr = config.addr.clone();
    let app = build_router(config);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
