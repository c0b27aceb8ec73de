//! Terminal preview: run a program against the in-terminal renderer.

use super::CommandResult;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use xmastree::program;
use xmastree_apa102::{TermTree, TreeDriver};

/// Render a program locally. No daemon, no hardware, no config changes.
pub async fn preview(id: &str, speed: f64, duration: f64) -> CommandResult {
    let Some(program) = program::find(id) else {
        let known = program::PROGRAMS
            .iter()
            .map(|p| p.id())
            .collect::<Vec<_>>()
            .join(", ");
        return Err(format!("unknown program {id:?} (available: {known})").into());
    };

    let tree: Arc<dyn TreeDriver> = Arc::new(TermTree::new());
    let cancel = CancellationToken::new();
    let limit = (duration > 0.0).then(|| Duration::from_secs_f64(duration));

    let stopper = cancel.clone();
    tokio::spawn(async move {
        match limit {
            Some(limit) => {
                tokio::select! {
                    _ = tokio::time::sleep(limit) => {}
                    _ = tokio::signal::ctrl_c() => {}
                }
            }
            None => {
                tokio::signal::ctrl_c().await.ok();
            }
        }
        stopper.cancel();
    });

    println!("{} ({id}) at {speed}x, Ctrl-C to stop", program.name());
    let result = program.run(Arc::clone(&tree), cancel, speed).await;
    tree.close().ok();
    result?;
    Ok(())
}
