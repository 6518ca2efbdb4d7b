use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use relay::{Balancer, RECOVERY_INTERVAL, RECOVERY_TIMEOUT};
use relayd::args::{maybe_daemonize, Cli};
use relayd::ProxyService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(tracing_subscriber::filter::LevelFilter::from(cli.log_level))
        .init();

    maybe_daemonize(cli.daemon)?;

    let config = Arc::new(relay::config::load(&cli.config).await?);
    let mut models: Vec<&str> = config.models.keys().map(String::as_str).collect();
    models.sort_unstable();
    tracing::info!(
        models_count = models.len(),
        ?models,
        port = config.server.port,
        auth_enabled = config.is_auth_enabled(),
        "configuration loaded"
    );

    let balancer = Arc::new(Balancer::new(&config));
    balancer
        .clone()
        .spawn_recovery(RECOVERY_INTERVAL, RECOVERY_TIMEOUT);

    let service = Arc::new(ProxyService::new(config.clone(), balancer)?);
    let app = service.router();

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!(%addr, "serving relay");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

fn shutdown_signal() -> impl std::future::Future<Output = ()> {
    use tokio::signal::unix::{signal, SignalKind};
    async {
        let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = sigint.recv() => {},
            _ = sigterm.recv() => {},
        }
    }
}
