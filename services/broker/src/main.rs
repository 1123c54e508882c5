// Broker service main entry point.
use anyhow::{Context, Result};
use broker::{config, observability};
use courier_server::{ServerHandle, ServerLifecycleManager};
use std::future::Future;

#[tokio::main]
async fn main() -> Result<()> {
    run_with_shutdown(async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await
}

async fn run_with_shutdown<F>(shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    observability::init_observability("courier-broker");

    let config = config::BrokerConfig::from_env_or_yaml()?;
    let server_config = config.server_config()?;
    let manager = ServerLifecycleManager::with_grace_period(config.shutdown_grace());
    let mut handle = manager.construct(server_config);

    if let Err(err) = manager.start(&mut handle).await {
        // Shutdown ordering stays uniform: stop runs once per constructed
        // handle even when start never succeeded.
        stop_server(&manager, &mut handle).await;
        return Err(err).context("start broker server");
    }
    tracing::info!(port = server_config.port(), "broker server started");

    // Block until SIGINT so the process stays alive.
    shutdown.await;
    stop_server(&manager, &mut handle).await;
    tracing::info!("broker server stopped");
    Ok(())
}

async fn stop_server(manager: &ServerLifecycleManager, handle: &mut ServerHandle) {
    // Grace-period overrun is reported, not fatal: shutdown proceeds regardless.
    if let Err(err) = manager.stop(handle).await {
        tracing::warn!(error = %err, "graceful shutdown incomplete");
    }
}
