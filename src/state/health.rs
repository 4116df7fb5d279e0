//! Backend health state.
//!
//! Process-wide liveness flag driven by the health monitor's probe results.
//! The transition logic is kept free of timers so it can be tested directly.

/// Edge-triggered outcome of recording one probe result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthTransition {
    /// No edge crossed.
    None,
    /// First success after a failure streak.
    Recovered,
    /// Failure streak just reached the configured maximum.
    WentDown,
}

/// Backend health as seen by the liveness prober.
///
/// Starts healthy. Only the health monitor mutates it; everyone else reads
/// it as a cheap liveness signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthState {
    pub is_healthy: bool,
    pub consecutive_failures: u32,
}

impl HealthState {
    pub fn new() -> Self {
        Self {
            is_healthy: true,
            consecutive_failures: 0,
        }
    }

    /// Records a successful probe. Returns `Recovered` only when the state
    /// was unhealthy before this probe.
    pub fn observe_success(&mut self) -> HealthTransition {
        let was_healthy = self.is_healthy;
        self.is_healthy = true;
        self.consecutive_failures = 0;
        if was_healthy {
            HealthTransition::None
        } else {
            HealthTransition::Recovered
        }
    }

    /// Records a failed probe. Returns `WentDown` exactly once, on the
    /// failure that reaches `max_consecutive_failures` while still healthy;
    /// further failures while unhealthy are counted but do not re-fire.
    pub fn observe_failure(&mut self, max_consecutive_failures: u32) -> HealthTransition {
        self.consecutive_failures += 1;
        if self.is_healthy && self.consecutive_failures >= max_consecutive_failures {
            self.is_healthy = false;
            HealthTransition::WentDown
        } else {
            HealthTransition::None
        }
    }
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn goes_down_exactly_once_at_threshold() {
        let mut state = HealthState::new();
        assert_eq!(state.observe_failure(3), HealthTransition::None);
        assert_eq!(state.observe_failure(3), HealthTransition::None);
        assert_eq!(state.observe_failure(3), HealthTransition::WentDown);
        // A fourth consecutive failure does not re-fire the edge.
        assert_eq!(state.observe_failure(3), HealthTransition::None);
        assert_eq!(state.consecutive_failures, 4);
        assert!(!state.is_healthy);
    }

    #[test]
    fn recovers_on_first_success_after_streak() {
        let mut state = HealthState::new();
        for _ in 0..3 {
            state.observe_failure(3);
        }
        assert_eq!(state.observe_success(), HealthTransition::Recovered);
        assert!(state.is_healthy);
        assert_eq!(state.consecutive_failures, 0);
        // Success while already healthy is not an edge.
        assert_eq!(state.observe_success(), HealthTransition::None);
    }

    #[test]
    fn success_resets_a_short_streak() {
        let mut state = HealthState::new();
        state.observe_failure(3);
        state.observe_failure(3);
        assert_eq!(state.observe_success(), HealthTransition::None);
        assert_eq!(state.consecutive_failures, 0);
        assert!(state.is_healthy);
    }
}
