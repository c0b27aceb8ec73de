//! Daemon bootstrap: config resolution, driver selection, supervision.

use anyhow::Context;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use xmastree::clock::SystemClock;
use xmastree::config::ConfigStore;
use xmastree::controller::{DriverFactory, TreeController};
use xmastree_apa102::{Apa102Tree, TermTree, TreeDriver};

/// Resolve the config file path: `--config`, then `$XMASTREE_CONFIG`,
/// then `$XDG_CONFIG_HOME/xmastree/config.json` with the usual
/// `~/.config` fallback.
pub fn resolve_config_path(flag: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    if let Some(path) = flag {
        return Ok(path);
    }
    if let Some(path) = std::env::var_os("XMASTREE_CONFIG") {
        return Ok(PathBuf::from(path));
    }
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))
        .context("neither XDG_CONFIG_HOME nor HOME is set")?;
    Ok(base.join("xmastree").join("config.json"))
}

/// Run the daemon until SIGINT, SIGTERM or a D-Bus `Shutdown`.
pub async fn run(config: Option<PathBuf>, spi: String, term: bool) -> anyhow::Result<()> {
    // Logs go to stderr; in --term mode stdout belongs to the renderer.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("xmastree=info".parse().unwrap()),
        )
        .with_writer(std::io::stderr)
        .init();

    let path = resolve_config_path(config)?;
    info!(path = %path.display(), "using config");
    let store = Arc::new(ConfigStore::open(path));

    // The factory runs on every reconnect attempt, so a missing SPI device
    // keeps the daemon alive and retrying instead of failing startup.
    let factory: DriverFactory = if term {
        Box::new(|| Ok(Arc::new(TermTree::new()) as Arc<dyn TreeDriver>))
    } else {
        Box::new(move || {
            Apa102Tree::open_spidev(&spi).map(|tree| Arc::new(tree) as Arc<dyn TreeDriver>)
        })
    };

    let controller = TreeController::spawn(store, Arc::new(SystemClock), factory);

    let quit = CancellationToken::new();
    #[cfg(feature = "dbus")]
    let _conn = {
        let conn = xmastree::dbus::serve(Arc::clone(&controller), quit.clone())
            .await
            .context("claim the D-Bus name (is another daemon running?)")?;
        info!(name = xmastree::dbus::BUS_NAME, "control interface up");
        conn
    };

    wait_for_stop(&quit).await;

    controller.shutdown().await;
    info!("daemon stopped");
    Ok(())
}

async fn wait_for_stop(quit: &CancellationToken) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(e) => {
            // No SIGTERM stream; SIGINT and D-Bus shutdown still work.
            tracing::warn!(error = %e, "cannot listen for SIGTERM");
            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("interrupted"),
                _ = quit.cancelled() => {}
            }
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("interrupted"),
        _ = sigterm.recv() => info!("terminated"),
        _ = quit.cancelled() => {}
    }
}
