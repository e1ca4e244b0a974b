//! Single-slot delay scheduler.
//!
//! Timestamps are monotonic uptime values expressed as [`Duration`] since the
//! runtime started, which keeps the slot independent of any particular clock
//! type. Arming always replaces the previous deadline, so at most one
//! evaluation is ever outstanding.

use core::time::Duration;

use crate::machine::Reschedule;

/// Holds at most one pending evaluation deadline.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct DelaySlot {
    deadline: Option<Duration>,
}

impl DelaySlot {
    /// Creates an empty slot.
    #[must_use]
    pub const fn new() -> Self {
        Self { deadline: None }
    }

    /// Cancels any outstanding deadline and arms a new one unless
    /// `reschedule` is [`Reschedule::Idle`]. Returns the armed deadline.
    pub fn arm(&mut self, now: Duration, reschedule: Reschedule) -> Option<Duration> {
        self.deadline = reschedule
            .delay()
            .map(|delay| now.checked_add(delay).unwrap_or(Duration::MAX));
        self.deadline
    }

    /// Clears the slot, returning the deadline that was pending.
    pub fn cancel(&mut self) -> Option<Duration> {
        self.deadline.take()
    }

    #[must_use]
    pub const fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    #[must_use]
    pub const fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Returns `true` when the armed deadline has passed.
    #[must_use]
    pub fn is_due(&self, now: Duration) -> bool {
        matches!(self.deadline, Some(deadline) if deadline <= now)
    }

    /// Clears the slot if its deadline has passed.
    pub fn take_due(&mut self, now: Duration) -> bool {
        if self.is_due(now) {
            self.deadline = None;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn rearming_replaces_previous_deadline() {
        let mut slot = DelaySlot::new();
        assert_eq!(slot.arm(ms(0), Reschedule::After(ms(1_500))), Some(ms(1_500)));
        assert_eq!(slot.arm(ms(5), Reschedule::IMMEDIATE), Some(ms(5)));
        assert!(slot.is_due(ms(5)));
        assert!(slot.take_due(ms(5)));
        assert!(!slot.is_armed());
    }

    #[test]
    fn idle_disarms_the_slot() {
        let mut slot = DelaySlot::new();
        slot.arm(ms(0), Reschedule::After(ms(60)));
        assert_eq!(slot.arm(ms(10), Reschedule::Idle), None);
        assert!(!slot.take_due(ms(100)));
    }

    #[test]
    fn deadline_is_not_due_early() {
        let mut slot = DelaySlot::new();
        slot.arm(ms(100), Reschedule::After(ms(40)));
        assert!(!slot.take_due(ms(139)));
        assert_eq!(slot.deadline(), Some(ms(140)));
        assert!(slot.take_due(ms(140)));
    }
}
