//! Hotplug state catalog and the signal values the state machine reacts to.

use core::fmt;

/// Lifecycle states for a single display output line.
///
/// Every state listed here is reachable; the controller never exposes an
/// uninitialized or out-of-range state.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum HpdState {
    /// Shut all output down, then check the plug after a short debounce.
    Reset,
    /// Sample the debounced HPD level to decide whether a sink is present.
    CheckPlug,
    /// Attempt to read the sink EDID, retrying on transient failures.
    CheckEdid,
    /// Steady state with output disabled; only hotplug activity leaves it.
    DoneDisabled,
    /// Steady state with output enabled; only hotplug activity leaves it.
    DoneEnabled,
    /// HPD dropped while enabled. Output is held while waiting for the sink
    /// to re-assert within the drop timeout.
    WaitForReassert,
    /// HPD came back after a drop; confirm the sink identity is unchanged.
    RecheckEdid,
    /// Boot-time state assuming a bootloader may already drive the panel.
    InitFromBootloader,
}

impl HpdState {
    /// Every state in declaration order.
    pub const ALL: [HpdState; 8] = [
        HpdState::Reset,
        HpdState::CheckPlug,
        HpdState::CheckEdid,
        HpdState::DoneDisabled,
        HpdState::DoneEnabled,
        HpdState::WaitForReassert,
        HpdState::RecheckEdid,
        HpdState::InitFromBootloader,
    ];

    /// Deterministic index used when the state is published through an atomic.
    #[must_use]
    pub const fn as_index(self) -> u8 {
        match self {
            HpdState::Reset => 0,
            HpdState::CheckPlug => 1,
            HpdState::CheckEdid => 2,
            HpdState::DoneDisabled => 3,
            HpdState::DoneEnabled => 4,
            HpdState::WaitForReassert => 5,
            HpdState::RecheckEdid => 6,
            HpdState::InitFromBootloader => 7,
        }
    }

    /// Attempts to construct a [`HpdState`] from a raw index.
    #[must_use]
    pub const fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(HpdState::Reset),
            1 => Some(HpdState::CheckPlug),
            2 => Some(HpdState::CheckEdid),
            3 => Some(HpdState::DoneDisabled),
            4 => Some(HpdState::DoneEnabled),
            5 => Some(HpdState::WaitForReassert),
            6 => Some(HpdState::RecheckEdid),
            7 => Some(HpdState::InitFromBootloader),
            _ => None,
        }
    }

    /// Human readable label used by logs and the REPL.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            HpdState::Reset => "reset",
            HpdState::CheckPlug => "check-plug",
            HpdState::CheckEdid => "check-edid",
            HpdState::DoneDisabled => "disabled",
            HpdState::DoneEnabled => "enabled",
            HpdState::WaitForReassert => "wait-for-reassert",
            HpdState::RecheckEdid => "recheck-edid",
            HpdState::InitFromBootloader => "init-from-bootloader",
        }
    }

    /// Returns `true` for the two steady states that never arm a timer.
    #[must_use]
    pub const fn is_steady(self) -> bool {
        matches!(self, HpdState::DoneDisabled | HpdState::DoneEnabled)
    }
}

impl fmt::Display for HpdState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Sampled level of the hotplug-detect line.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum HpdLevel {
    Asserted,
    Deasserted,
}

impl HpdLevel {
    /// Returns `true` when a sink is signalling its presence.
    #[must_use]
    pub const fn is_asserted(self) -> bool {
        matches!(self, HpdLevel::Asserted)
    }

    /// Helper converting a boolean asserted flag into a [`HpdLevel`].
    #[must_use]
    pub const fn from_asserted(asserted: bool) -> Self {
        if asserted {
            HpdLevel::Asserted
        } else {
            HpdLevel::Deasserted
        }
    }
}

impl fmt::Display for HpdLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HpdLevel::Asserted => f.write_str("asserted"),
            HpdLevel::Deasserted => f.write_str("deasserted"),
        }
    }
}

/// Result of re-reading the EDID after HPD came back.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum RecheckOutcome {
    /// The read itself failed; the caller may retry.
    Failed,
    /// The sink reports the same identity as before the drop.
    Unchanged,
    /// A different sink (or a modified EDID) is now connected.
    Changed,
}

impl fmt::Display for RecheckOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecheckOutcome::Failed => f.write_str("failed"),
            RecheckOutcome::Unchanged => f.write_str("unchanged"),
            RecheckOutcome::Changed => f.write_str("changed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_round_trips_for_every_state() {
        for state in HpdState::ALL {
            assert_eq!(HpdState::from_index(state.as_index()), Some(state));
        }
        assert_eq!(HpdState::from_index(8), None);
    }

    #[test]
    fn only_done_states_are_steady() {
        let steady: heapless::Vec<HpdState, 8> = HpdState::ALL
            .iter()
            .copied()
            .filter(|state| state.is_steady())
            .collect();
        assert_eq!(
            steady.as_slice(),
            &[HpdState::DoneDisabled, HpdState::DoneEnabled]
        );
    }
}
