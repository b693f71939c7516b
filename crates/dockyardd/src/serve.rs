//! `serve` mode — opens the record store, connects the container runtime
//! and serves the REST API until Ctrl-C.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info};

use dockyard_core::DaemonConfig;
use dockyard_core::config::RuntimeKind;
use dockyard_reconcile::AppController;
use dockyard_runtime::{ContainerRuntime, DockerRuntime, MemoryRuntime};
use dockyard_state::StateStore;

pub async fn run(config: DaemonConfig) -> anyhow::Result<()> {
    info!("Dockyard daemon starting");

    // ── Record store ───────────────────────────────────────────

    let store = if config.store.in_memory {
        let store = StateStore::open_in_memory()?;
        info!("in-memory record store opened; records are lost on exit");
        store
    } else {
        std::fs::create_dir_all(&config.store.data_dir).with_context(|| {
            format!("create data dir {}", config.store.data_dir.display())
        })?;
        let db_path = config.db_path();
        let store = StateStore::open(&db_path)?;
        info!(path = ?db_path, "record store opened");
        store
    };

    // ── Container runtime ──────────────────────────────────────

    let runtime: Arc<dyn ContainerRuntime> = match config.runtime.kind {
        RuntimeKind::Docker => {
            let docker = DockerRuntime::connect(
                config.runtime.docker_host.as_deref(),
                config.runtime.timeout_secs,
            )?;
            info!(
                host = config.runtime.docker_host.as_deref().unwrap_or("local defaults"),
                timeout_secs = config.runtime.timeout_secs,
                "docker runtime configured"
            );
            Arc::new(docker)
        }
        RuntimeKind::Memory => {
            info!("in-memory runtime configured; no containers will run");
            // Nobody reads the call journal in the daemon.
            Arc::new(MemoryRuntime::with_journal_capacity(0))
        }
    };

    let apps = store.list()?.len();
    let controller = AppController::new(store, runtime);
    info!(apps, "controller initialized");

    // ── API server ─────────────────────────────────────────────

    let router = dockyard_api::build_router(controller);
    let addr = bind_addr(&config)?;

    info!(%addr, "API server starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Graceful shutdown on Ctrl-C.
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "failed to install Ctrl-C handler");
                std::future::pending::<()>().await;
            }
            info!("shutdown signal received");
        })
        .await?;

    info!("Dockyard daemon stopped");
    Ok(())
}

/// Listen address from `[server]`. `bind` is a bare IPv4 or IPv6 address.
fn bind_addr(config: &DaemonConfig) -> anyhow::Result<SocketAddr> {
    let ip: IpAddr = config
        .server
        .bind
        .parse()
        .with_context(|| format!("invalid bind address {}", config.server.bind))?;
    Ok(SocketAddr::new(ip, config.server.port))
}
