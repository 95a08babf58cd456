use std::time::Duration;

/// Tracks simulated time: an iteration counter and the elapsed sim time.
#[derive(Debug, Clone)]
pub struct StepClock {
    iteration: u64,
    sim_time: Duration,
    step: Duration,
}

impl StepClock {
    /// Create a clock at iteration 0 advancing by `step` per iteration.
    pub fn new(step: Duration) -> Self {
        Self {
            iteration: 0,
            sim_time: Duration::ZERO,
            step,
        }
    }

    /// Advance by one step. Returns the new iteration number.
    ///
    /// Sim time saturates at [`Duration::MAX`].
    pub fn advance(&mut self) -> u64 {
        self.iteration += 1;
        self.sim_time = self.sim_time.saturating_add(self.step);
        self.iteration
    }

    /// Completed iterations.
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    /// Simulated time elapsed.
    pub fn sim_time(&self) -> Duration {
        self.sim_time
    }

    /// Simulated time per iteration.
    pub fn step_size(&self) -> Duration {
        self.step
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_initial_state() {
        let clock = StepClock::new(Duration::from_millis(1));
        assert_eq!(clock.iteration(), 0);
        assert_eq!(clock.sim_time(), Duration::ZERO);
    }

    #[test]
    fn clock_advance_accumulates() {
        let mut clock = StepClock::new(Duration::from_millis(4));
        clock.advance();
        clock.advance();
        assert_eq!(clock.advance(), 3);
        assert_eq!(clock.sim_time(), Duration::from_millis(12));
        assert_eq!(clock.step_size(), Duration::from_millis(4));
    }

    #[test]
    fn clock_sim_time_saturates() {
        let mut clock = StepClock::new(Duration::MAX);
        clock.advance();
        assert_eq!(clock.advance(), 2);
        assert_eq!(clock.sim_time(), Duration::MAX);
    }
}
