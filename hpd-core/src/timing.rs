//! Debounce, retry, and timeout policy.
//!
//! Defaults follow the behaviour sinks in the field expect: a 40 ms
//! stabilization window, 1.5 s tolerance for sinks that drop HPD while they
//! lock onto a new video mode, and five EDID attempts spaced 60 ms apart.

use core::fmt;
use core::time::Duration;

/// Number of EDID reads (or rechecks) attempted before giving up.
pub const MAX_EDID_READ_ATTEMPTS: u8 = 5;

/// Time HPD must be left alone before its level is trusted again.
pub const HPD_STABILIZE_DELAY: Duration = Duration::from_millis(40);

/// How long an enabled output is held after HPD drops.
pub const HPD_DROP_TIMEOUT: Duration = Duration::from_millis(1_500);

/// Debounce between disabling output in `Reset` and sampling the plug.
pub const CHECK_PLUG_DELAY: Duration = Duration::from_millis(10);

/// Spacing between EDID read attempts.
pub const CHECK_EDID_DELAY: Duration = Duration::from_millis(60);

/// Timing policy applied by the state machine.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct HpdTiming {
    pub stabilize: Duration,
    pub drop_timeout: Duration,
    pub check_plug_delay: Duration,
    pub check_edid_delay: Duration,
    pub max_edid_attempts: u8,
}

impl HpdTiming {
    /// Returns the default timing policy.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            stabilize: HPD_STABILIZE_DELAY,
            drop_timeout: HPD_DROP_TIMEOUT,
            check_plug_delay: CHECK_PLUG_DELAY,
            check_edid_delay: CHECK_EDID_DELAY,
            max_edid_attempts: MAX_EDID_READ_ATTEMPTS,
        }
    }

    #[must_use]
    pub const fn with_stabilize(mut self, delay: Duration) -> Self {
        self.stabilize = delay;
        self
    }

    #[must_use]
    pub const fn with_drop_timeout(mut self, timeout: Duration) -> Self {
        self.drop_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_check_plug_delay(mut self, delay: Duration) -> Self {
        self.check_plug_delay = delay;
        self
    }

    #[must_use]
    pub const fn with_check_edid_delay(mut self, delay: Duration) -> Self {
        self.check_edid_delay = delay;
        self
    }

    #[must_use]
    pub const fn with_max_edid_attempts(mut self, attempts: u8) -> Self {
        self.max_edid_attempts = attempts;
        self
    }

    /// Rejects policies the state machine cannot honour.
    pub const fn validate(&self) -> Result<(), TimingError> {
        if self.max_edid_attempts == 0 {
            return Err(TimingError::ZeroAttempts);
        }
        Ok(())
    }
}

impl Default for HpdTiming {
    fn default() -> Self {
        Self::new()
    }
}

/// Reasons a timing policy is rejected.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TimingError {
    /// At least one EDID attempt is required.
    ZeroAttempts,
}

impl fmt::Display for TimingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimingError::ZeroAttempts => f.write_str("max EDID attempts must be at least 1"),
        }
    }
}

impl core::error::Error for TimingError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_field_constants() {
        let timing = HpdTiming::default();
        assert_eq!(timing.stabilize, Duration::from_millis(40));
        assert_eq!(timing.drop_timeout, Duration::from_millis(1_500));
        assert_eq!(timing.check_plug_delay, Duration::from_millis(10));
        assert_eq!(timing.check_edid_delay, Duration::from_millis(60));
        assert_eq!(timing.max_edid_attempts, 5);
        assert_eq!(timing.validate(), Ok(()));
    }

    #[test]
    fn zero_attempt_budget_is_rejected() {
        let timing = HpdTiming::new().with_max_edid_attempts(0);
        assert_eq!(timing.validate(), Err(TimingError::ZeroAttempts));
    }
}
