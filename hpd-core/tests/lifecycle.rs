mod support;

use hpd_core::{HpdState, HpdTiming, StepCause, StepNote};
use support::{Harness, ScriptedSink, ms};

/// Plugs a healthy sink at t=0 and runs until the controller enables output.
fn enabled_harness() -> Harness {
    let mut harness = Harness::new(ScriptedSink::default());
    harness.set_plugged(true);
    harness.settle();
    assert_eq!(harness.state(), HpdState::DoneEnabled);
    harness
}

#[test]
fn bootloader_handoff_checks_plug_after_stabilize_without_disabling() {
    let mut harness = Harness::new(ScriptedSink::default());
    assert_eq!(harness.sink().inits, 1);

    harness.set_plugged(true);
    assert_eq!(harness.state(), HpdState::CheckPlug);
    assert_eq!(harness.steps[0].note, Some(StepNote::BootloaderHandoff));
    assert_eq!(harness.driver.next_deadline(), Some(ms(40)));

    harness.advance(ms(39));
    assert_eq!(harness.steps.len(), 1, "plug check must wait for the stabilize delay");

    harness.advance(ms(1));
    assert_eq!(harness.state(), HpdState::CheckEdid);
    assert_eq!(harness.driver.next_deadline(), Some(ms(100)));

    harness.settle();
    assert_eq!(
        harness.path(),
        [HpdState::CheckPlug, HpdState::CheckEdid, HpdState::DoneEnabled]
    );
    assert_eq!(harness.sink().disables, 0);
    assert_eq!(harness.sink().ready, 1);
}

#[test]
fn unplugged_sink_ends_disabled_with_one_more_disable() {
    let mut harness = Harness::new(ScriptedSink::default());
    harness.raise();
    assert_eq!(harness.state(), HpdState::Reset);

    harness.advance(ms(40));
    assert_eq!(harness.state(), HpdState::CheckPlug);
    assert_eq!(harness.sink().disables, 1);

    harness.advance(ms(10));
    assert_eq!(harness.state(), HpdState::DoneDisabled);
    assert_eq!(harness.sink().disables, 2);
    assert_eq!(harness.driver.next_deadline(), None);

    harness.settle();
    assert_eq!(harness.sink().disables, 2);
}

#[test]
fn edid_read_gives_up_after_five_failures() {
    let mut harness = Harness::new(ScriptedSink {
        failures: 10,
        ..ScriptedSink::default()
    });
    harness.set_plugged(true);
    harness.settle();

    assert_eq!(harness.state(), HpdState::DoneDisabled);
    assert_eq!(harness.sink().reads, 5);
    assert_eq!(harness.sink().ready, 0);
    assert_eq!(harness.sink().disables, 1);
    assert_eq!(
        harness.steps.last().and_then(|step| step.note),
        Some(StepNote::EdidAttemptsExhausted { attempts: 5 })
    );
}

#[test]
fn edid_read_succeeds_on_any_attempt_within_budget() {
    for attempt in 1..=5u8 {
        let mut harness = Harness::new(ScriptedSink {
            failures: u32::from(attempt - 1),
            ..ScriptedSink::default()
        });
        harness.set_plugged(true);
        harness.settle();

        assert_eq!(harness.state(), HpdState::DoneEnabled, "attempt {attempt}");
        assert_eq!(harness.sink().reads, u32::from(attempt));
        assert_eq!(harness.sink().ready, 1);
        assert_eq!(
            harness.steps.last().and_then(|step| step.note),
            Some(StepNote::EdidAcquired { attempt })
        );
    }
}

#[test]
fn brief_drop_rechecks_without_reset() {
    let mut harness = enabled_harness();
    let settled = harness.steps.len();

    harness.advance(ms(100));
    harness.set_plugged(false);
    assert_eq!(harness.state(), HpdState::WaitForReassert);

    harness.advance(ms(1_499));
    harness.set_plugged(true);
    assert_eq!(harness.state(), HpdState::RecheckEdid);

    harness.settle();
    let tail: Vec<_> = harness.steps[settled..]
        .iter()
        .filter_map(|step| step.to)
        .collect();
    assert_eq!(
        tail,
        [
            HpdState::WaitForReassert,
            HpdState::RecheckEdid,
            HpdState::DoneEnabled
        ]
    );
    assert_eq!(harness.sink().disables, 0);
    assert_eq!(harness.sink().ready, 1);
    assert_eq!(harness.sink().rechecks, 1);
    assert_eq!(
        harness.steps.last().and_then(|step| step.note),
        Some(StepNote::RecheckUnchanged)
    );
}

#[test]
fn drop_longer_than_timeout_resets() {
    let mut harness = enabled_harness();
    harness.set_plugged(false);

    harness.advance(ms(1_499));
    assert_eq!(harness.state(), HpdState::WaitForReassert);

    harness.advance(ms(1));
    assert_eq!(harness.sink().disables, 1, "reset runs in the same instant");
    assert_eq!(harness.state(), HpdState::CheckPlug);

    harness.settle();
    assert_eq!(harness.state(), HpdState::DoneDisabled);
    assert_eq!(harness.sink().disables, 2);
    assert!(harness.path().contains(&HpdState::Reset));
}

#[test]
fn changed_edid_on_reassert_resets_and_reacquires() {
    let mut harness = enabled_harness();
    harness.set_plugged(false);
    harness.driver.ops_mut().swapped = true;
    harness.advance(ms(100));
    harness.set_plugged(true);
    harness.settle();

    assert_eq!(harness.state(), HpdState::DoneEnabled);
    assert_eq!(harness.sink().disables, 1);
    assert_eq!(harness.sink().ready, 2);
    assert!(
        harness
            .steps
            .iter()
            .any(|step| step.note == Some(StepNote::RecheckChanged)
                && step.to == Some(HpdState::Reset))
    );
}

#[test]
fn recheck_failures_exhaust_into_reset() {
    let mut harness = enabled_harness();
    harness.set_plugged(false);
    harness.driver.ops_mut().failures = 5;
    harness.advance(ms(20));
    harness.set_plugged(true);
    harness.settle();

    assert_eq!(harness.sink().rechecks, 5);
    assert!(
        harness
            .steps
            .iter()
            .any(|step| step.note == Some(StepNote::RecheckAttemptsExhausted { attempts: 5 }))
    );
    assert_eq!(harness.state(), HpdState::DoneEnabled);
    assert_eq!(harness.sink().ready, 2);
}

#[test]
fn bounce_while_enabled_is_ignored() {
    let mut harness = enabled_harness();
    let disables = harness.sink().disables;

    harness.set_plugged(true);
    let step = harness.steps.last().copied().expect("bounce evaluation");
    assert_eq!(step.cause, StepCause::Event);
    assert_eq!(step.to, None);
    assert_eq!(step.note, Some(StepNote::BounceIgnored));
    assert_eq!(harness.state(), HpdState::DoneEnabled);
    assert_eq!(harness.driver.next_deadline(), None);
    assert_eq!(harness.sink().disables, disables);
}

#[test]
fn event_replaces_pending_edid_read() {
    let mut harness = Harness::new(ScriptedSink::default());
    harness.set_plugged(true);
    harness.advance(ms(70));
    assert_eq!(harness.state(), HpdState::CheckEdid);

    harness.set_plugged(false);
    assert_eq!(harness.state(), HpdState::Reset);
    assert_eq!(harness.driver.next_deadline(), Some(ms(110)));

    harness.settle();
    assert_eq!(harness.sink().reads, 0);
    assert_eq!(harness.state(), HpdState::DoneDisabled);
}

#[test]
fn shutdown_releases_once_and_stops_evaluating() {
    let mut harness = Harness::new(ScriptedSink::default());
    harness.set_plugged(true);
    harness.advance(ms(40));
    assert_eq!(harness.state(), HpdState::CheckEdid);

    assert!(harness.driver.shutdown(&harness.latch));
    assert!(!harness.driver.shutdown(&harness.latch));
    assert_eq!(harness.sink().releases, 1);

    harness.set_plugged(false);
    harness.settle();
    assert_eq!(harness.state(), HpdState::CheckEdid);
    assert_eq!(harness.sink().reads, 0);

    let sink = harness.driver.into_ops();
    assert_eq!(sink.releases, 1);
}

#[test]
fn custom_timing_drives_the_schedule() {
    let timing = HpdTiming::new()
        .with_stabilize(ms(5))
        .with_check_edid_delay(ms(7))
        .with_max_edid_attempts(2);
    let mut harness = Harness::with_timing(
        ScriptedSink {
            failures: 2,
            ..ScriptedSink::default()
        },
        timing,
    );

    harness.set_plugged(true);
    assert_eq!(harness.driver.next_deadline(), Some(ms(5)));
    harness.settle();

    assert_eq!(harness.state(), HpdState::DoneDisabled);
    assert_eq!(harness.sink().reads, 2);
    let timestamps: Vec<_> = harness
        .history()
        .iter()
        .map(|record| record.timestamp)
        .collect();
    assert_eq!(timestamps, [ms(0), ms(5), ms(12), ms(19)]);
}

#[test]
fn telemetry_measures_time_between_transitions() {
    let harness = enabled_harness();
    let history = harness.history();

    assert_eq!(history.len(), 3);
    assert_eq!(history[0].elapsed_since_previous, None);
    assert_eq!(history[1].elapsed_since_previous, Some(ms(40)));
    assert_eq!(history[2].elapsed_since_previous, Some(ms(60)));
    assert!(history[2].entered(HpdState::DoneEnabled));
    assert_eq!(
        history.iter().map(|record| record.id).collect::<Vec<_>>(),
        [0, 1, 2]
    );
}
