use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_stm32::exti::ExtiInput;
use embassy_stm32::gpio::{Level, Output, Pull, Speed};
use embassy_stm32::i2c::{self, I2c};
use embassy_stm32::time::Hertz;
use embassy_time::Instant;
use hpd_core::{HpdHooks, HpdTiming};

use crate::display::sink::{DdcSink, HpdLine, OutputEnable};
use crate::display::{HpdEvents, HpdRunner};
use crate::hw::{EnablePin, Stm32Ddc};

mod edge_task;
mod hpd_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

pub(super) type FirmwareSink = DdcSink<'static, Stm32Ddc<'static>, EnablePin<'static>>;

pub(super) static HPD_EVENTS: HpdEvents = HpdEvents::new();
pub(super) static HPD_LINE: HpdLine = HpdLine::new();

const DDC_FREQUENCY: Hertz = Hertz(100_000);

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let config = hal::Config::default();
    let hal::Peripherals {
        PA0,
        PA1,
        PB8,
        PB9,
        I2C1,
        EXTI0,
        ..
    } = hal::init(config);

    let hpd = ExtiInput::new(PA0, EXTI0, Pull::Down);
    HPD_LINE.store(hpd.is_high());

    let ddc = Stm32Ddc::new(I2c::new_blocking(
        I2C1,
        PB8,
        PB9,
        DDC_FREQUENCY,
        i2c::Config::default(),
    ));
    let enable = EnablePin::new(Output::new(PA1, Level::Low, Speed::Low));
    let sink = DdcSink::new(&HPD_LINE, ddc, enable);

    let hooks = HpdHooks::none()
        .with_init(|sink: &mut FirmwareSink| {
            sink.output_mut().set_enabled(false);
            defmt::info!("hpd: sink initialised");
        })
        .with_release(|sink: &mut FirmwareSink| {
            sink.output_mut().set_enabled(false);
            defmt::info!("hpd: sink released");
        });
    let runner = HpdRunner::new(sink, hooks, HpdTiming::new(), &HPD_EVENTS, Instant::now());

    spawner
        .spawn(hpd_task::run(runner))
        .expect("failed to spawn hpd controller task");
    spawner
        .spawn(edge_task::run(hpd, &HPD_LINE, &HPD_EVENTS))
        .expect("failed to spawn hpd edge task");

    // Evaluate the level the bootloader left behind.
    HPD_EVENTS.raise();

    core::future::pending::<()>().await;
}
