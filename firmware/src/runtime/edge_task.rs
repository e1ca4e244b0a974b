use embassy_stm32::exti::ExtiInput;

use crate::display::HpdEvents;
use crate::display::sink::HpdLine;

/// Mirrors the HPD pin into `line` and raises an event on every edge.
///
/// Runs for the lifetime of the device; once the controller has shut down,
/// raised events are dropped by [`HpdEvents::raise`].
#[embassy_executor::task]
pub async fn run(
    mut hpd: ExtiInput<'static>,
    line: &'static HpdLine,
    events: &'static HpdEvents,
) -> ! {
    loop {
        hpd.wait_for_any_edge().await;
        line.store(hpd.is_high());
        events.raise();
    }
}
