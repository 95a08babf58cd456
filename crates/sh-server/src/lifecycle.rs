/// Server-wide run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Not running; a run may start.
    Idle,
    /// A run is in progress (or a background run was started and not yet
    /// stopped).
    Running,
    /// Stopped for good.
    Stopped,
}

/// Why a run was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RunRejection {
    /// The server is already running.
    #[error("the server is already running")]
    AlreadyRunning,
    /// The server was stopped and cannot be restarted.
    #[error("the server was stopped and cannot run again")]
    Stopped,
    /// The one background run of this server was already used.
    #[error("a background run was already started")]
    BackgroundUsed,
}

/// Run-state bookkeeping, always accessed under the server's lock.
#[derive(Debug)]
pub(crate) struct Lifecycle {
    state: RunState,
    launching: bool,
    background_spawned: bool,
    ever_ran: bool,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self {
            state: RunState::Idle,
            launching: false,
            background_spawned: false,
            ever_ran: false,
        }
    }
}

impl Lifecycle {
    pub(crate) fn state(&self) -> RunState {
        self.state
    }

    /// A background thread was spawned but has not yet marked itself running.
    pub(crate) fn launching(&self) -> bool {
        self.launching
    }

    fn check_run(&self) -> Result<(), RunRejection> {
        match self.state {
            RunState::Stopped => Err(RunRejection::Stopped),
            RunState::Running => Err(RunRejection::AlreadyRunning),
            RunState::Idle if self.launching => Err(RunRejection::AlreadyRunning),
            RunState::Idle => Ok(()),
        }
    }

    pub(crate) fn begin_blocking(&mut self) -> Result<(), RunRejection> {
        self.check_run()?;
        self.state = RunState::Running;
        self.ever_ran = true;
        Ok(())
    }

    /// The blocking loop returned. `stop_requested` is true when a runner
    /// was asked to stop, which makes the stop permanent.
    pub(crate) fn end_blocking(&mut self, stop_requested: bool) {
        if self.state == RunState::Running {
            self.state = if stop_requested {
                RunState::Stopped
            } else {
                RunState::Idle
            };
        }
    }

    pub(crate) fn begin_background(&mut self) -> Result<(), RunRejection> {
        self.check_run()?;
        if self.background_spawned {
            return Err(RunRejection::BackgroundUsed);
        }
        self.launching = true;
        self.background_spawned = true;
        self.ever_ran = true;
        Ok(())
    }

    /// Called on the background thread before its first step.
    pub(crate) fn mark_background_running(&mut self) {
        self.launching = false;
        if self.state == RunState::Idle {
            self.state = RunState::Running;
        }
    }

    /// The background thread could not be spawned.
    pub(crate) fn abort_launch(&mut self) {
        self.launching = false;
    }

    /// Returns `false` (and changes nothing) if no run was ever started.
    pub(crate) fn stop(&mut self) -> bool {
        if !self.ever_ran {
            return false;
        }
        self.state = RunState::Stopped;
        self.launching = false;
        true
    }

    /// Systems may be attached only while nothing is running.
    pub(crate) fn accepts_mutation(&self) -> bool {
        self.state != RunState::Running && !self.launching
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocking_run_returns_to_idle() {
        let mut lc = Lifecycle::default();
        lc.begin_blocking().unwrap();
        assert_eq!(lc.state(), RunState::Running);
        assert!(!lc.accepts_mutation());
        lc.end_blocking(false);
        assert_eq!(lc.state(), RunState::Idle);
        assert!(lc.begin_blocking().is_ok());
    }

    #[test]
    fn second_run_while_running_is_rejected() {
        let mut lc = Lifecycle::default();
        lc.begin_blocking().unwrap();
        assert_eq!(lc.begin_blocking(), Err(RunRejection::AlreadyRunning));
        assert_eq!(lc.begin_background(), Err(RunRejection::AlreadyRunning));
    }

    #[test]
    fn background_run_is_single_shot() {
        let mut lc = Lifecycle::default();
        lc.begin_background().unwrap();
        assert!(lc.launching());
        assert_eq!(lc.begin_blocking(), Err(RunRejection::AlreadyRunning));
        lc.mark_background_running();
        assert_eq!(lc.state(), RunState::Running);
        assert!(!lc.launching());
    }

    #[test]
    fn background_slot_is_not_reusable() {
        let mut lc = Lifecycle::default();
        lc.begin_background().unwrap();
        lc.abort_launch();
        assert_eq!(lc.begin_background(), Err(RunRejection::BackgroundUsed));
    }

    #[test]
    fn stop_without_run_is_a_no_op() {
        let mut lc = Lifecycle::default();
        assert!(!lc.stop());
        assert_eq!(lc.state(), RunState::Idle);
        assert!(lc.begin_blocking().is_ok());
    }

    #[test]
    fn stop_is_terminal() {
        let mut lc = Lifecycle::default();
        lc.begin_blocking().unwrap();
        assert!(lc.stop());
        lc.end_blocking(false);
        assert_eq!(lc.state(), RunState::Stopped);
        assert_eq!(lc.begin_blocking(), Err(RunRejection::Stopped));
        assert!(lc.accepts_mutation());
    }

    #[test]
    fn stop_requested_by_a_runner_ends_in_stopped() {
        let mut lc = Lifecycle::default();
        lc.begin_blocking().unwrap();
        lc.end_blocking(true);
        assert_eq!(lc.state(), RunState::Stopped);
    }

    #[test]
    fn stop_during_launch_keeps_stopped() {
        let mut lc = Lifecycle::default();
        lc.begin_background().unwrap();
        lc.stop();
        lc.mark_background_running();
        assert_eq!(lc.state(), RunState::Stopped);
    }
}
