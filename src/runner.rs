//! Single-task program lifecycle.
//!
//! The runner owns at most one spawned animation task. Stopping cancels the
//! task's token and waits for it with a hard bound; a program that ignores
//! cancellation is logged and abandoned (the handle is dropped, never
//! aborted mid-frame), so a wedged frame loop cannot wedge its caller.

use crate::program::Program;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use xmastree_apa102::TreeDriver;

/// Bound on how long [`ProgramRunner::stop`] waits after cancelling.
pub const STOP_TIMEOUT: Duration = Duration::from_secs(2);

/// A spawned program run.
pub struct RunningProgram {
    program_id: &'static str,
    speed: f64,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl RunningProgram {
    /// Resolved id of the running program (never an unknown config id).
    pub fn program_id(&self) -> &'static str {
        self.program_id
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// False once the task has returned, normally or by crash.
    pub fn is_alive(&self) -> bool {
        !self.handle.is_finished()
    }
}

/// Owns at most one program task at a time.
#[derive(Default)]
pub struct ProgramRunner {
    current: Option<RunningProgram>,
}

impl ProgramRunner {
    pub fn running(&self) -> Option<&RunningProgram> {
        self.current.as_ref()
    }

    /// Spawn `program` with a fresh token. An `Err` from the program is
    /// logged and swallowed; the caller notices the dead task on its next
    /// reconcile pass and restarts.
    ///
    /// Callers stop the previous program first. Should one still be there,
    /// it is cancelled and left to wind down on its own.
    pub fn start(&mut self, program: &'static dyn Program, tree: Arc<dyn TreeDriver>, speed: f64) {
        if let Some(previous) = self.current.take() {
            warn!(program = previous.program_id, "replacing program that was not stopped");
            previous.cancel.cancel();
        }
        let id = program.id();
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        info!(program = id, speed, "starting program");
        let handle = tokio::spawn(async move {
            if let Err(e) = program.run(tree, task_cancel, speed).await {
                warn!(program = id, "program exited with error: {e}");
            }
        });
        self.current = Some(RunningProgram {
            program_id: id,
            speed,
            cancel,
            handle,
        });
    }

    /// Cancel the current program and wait for it, bounded by
    /// [`STOP_TIMEOUT`]. No-op when idle.
    pub async fn stop(&mut self) {
        let Some(run) = self.current.take() else {
            return;
        };
        let RunningProgram {
            program_id,
            cancel,
            handle,
            ..
        } = run;
        cancel.cancel();
        match tokio::time::timeout(STOP_TIMEOUT, handle).await {
            Ok(Ok(())) => info!(program = program_id, "program stopped"),
            Ok(Err(e)) => warn!(program = program_id, "program task panicked: {e}"),
            Err(_) => warn!(program = program_id, "program ignored cancellation, abandoning it"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::sleep_unless_cancelled;
    use async_trait::async_trait;
    use xmastree_apa102::{BrightnessChannel, Rgb, TreeError};

    struct NullTree;

    impl TreeDriver for NullTree {
        fn set_pixel(&self, _: usize, _: Rgb) -> Result<(), TreeError> {
            Ok(())
        }
        fn set_all(&self, _: &[Rgb]) -> Result<(), TreeError> {
            Ok(())
        }
        fn set_brightness(&self, _: BrightnessChannel, _: u8) -> Result<(), TreeError> {
            Ok(())
        }
        fn show(&self) -> Result<(), TreeError> {
            Ok(())
        }
        fn power_off(&self) -> Result<(), TreeError> {
            Ok(())
        }
        fn close(&self) -> Result<(), TreeError> {
            Ok(())
        }
    }

    /// Loops forever but honors cancellation within a frame.
    struct Obedient;

    #[async_trait]
    impl Program for Obedient {
        fn id(&self) -> &'static str {
            "obedient"
        }
        fn name(&self) -> &'static str {
            "Obedient"
        }
        async fn run(
            &self,
            _tree: Arc<dyn TreeDriver>,
            cancel: CancellationToken,
            _speed: f64,
        ) -> Result<(), TreeError> {
            loop {
                if !sleep_unless_cancelled(&cancel, Duration::from_millis(10)).await {
                    return Ok(());
                }
            }
        }
    }

    /// Never looks at its token.
    struct Stubborn;

    #[async_trait]
    impl Program for Stubborn {
        fn id(&self) -> &'static str {
            "stubborn"
        }
        fn name(&self) -> &'static str {
            "Stubborn"
        }
        async fn run(
            &self,
            _tree: Arc<dyn TreeDriver>,
            _cancel: CancellationToken,
            _speed: f64,
        ) -> Result<(), TreeError> {
            loop {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
        }
    }

    /// Dies on its first frame.
    struct Crashy;

    #[async_trait]
    impl Program for Crashy {
        fn id(&self) -> &'static str {
            "crashy"
        }
        fn name(&self) -> &'static str {
            "Crashy"
        }
        async fn run(
            &self,
            _tree: Arc<dyn TreeDriver>,
            _cancel: CancellationToken,
            _speed: f64,
        ) -> Result<(), TreeError> {
            Err(TreeError::Closed)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stop_joins_a_cooperative_program() {
        let mut runner = ProgramRunner::default();
        runner.start(&Obedient, Arc::new(NullTree), 1.0);
        assert_eq!(runner.running().unwrap().program_id(), "obedient");
        assert!(runner.running().unwrap().is_alive());
        runner.stop().await;
        assert!(runner.running().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_abandons_a_wedged_program() {
        let mut runner = ProgramRunner::default();
        runner.start(&Stubborn, Arc::new(NullTree), 1.0);
        // The bounded wait must elapse rather than hang on the hour-long sleep.
        let waited = tokio::time::Instant::now();
        runner.stop().await;
        assert!(waited.elapsed() >= STOP_TIMEOUT);
        assert!(waited.elapsed() < Duration::from_secs(3600));
        assert!(runner.running().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn crashed_program_reads_as_dead() {
        let mut runner = ProgramRunner::default();
        runner.start(&Crashy, Arc::new(NullTree), 1.0);
        // Let the spawned task run to completion.
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(!runner.running().unwrap().is_alive());
        runner.stop().await;
        assert!(runner.running().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_when_idle_is_a_no_op() {
        let mut runner = ProgramRunner::default();
        runner.stop().await;
        assert!(runner.running().is_none());
    }
}
