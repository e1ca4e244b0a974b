//! DDC-backed display sink.
//!
//! The sink reads the 128-byte EDID base block over the DDC channel, remembers
//! the last block it accepted, and answers rechecks by byte comparison. Pin and
//! bus access go through [`DdcBus`] and [`OutputEnable`] so the same logic runs
//! against the STM32 peripherals and the host-side fakes in the tests.

use hpd_core::{HpdLevel, HpdOps, RecheckOutcome};
use portable_atomic::{AtomicBool, Ordering};

/// 7-bit DDC address of the EDID EEPROM.
pub const EDID_I2C_ADDRESS: u8 = 0x50;

/// Size of the EDID base block.
pub const EDID_BLOCK_LEN: usize = 128;

const EDID_HEADER: [u8; 8] = [0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x00];

pub type EdidBlock = [u8; EDID_BLOCK_LEN];

/// Blocking access to the DDC channel.
pub trait DdcBus {
    type Error;

    /// Reads the base block starting at offset 0.
    fn read_base_block(&mut self, block: &mut EdidBlock) -> Result<(), Self::Error>;
}

/// Output stage gated by the controller.
pub trait OutputEnable {
    fn set_enabled(&mut self, enabled: bool);
}

/// Reasons a freshly read block is rejected.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EdidError {
    Bus,
    BadHeader,
    BadChecksum { sum: u8 },
}

/// Checks the fixed header and the block checksum.
pub fn validate_block(block: &EdidBlock) -> Result<(), EdidError> {
    if block[..EDID_HEADER.len()] != EDID_HEADER {
        return Err(EdidError::BadHeader);
    }
    let sum = block.iter().fold(0u8, |acc, byte| acc.wrapping_add(*byte));
    if sum != 0 {
        return Err(EdidError::BadChecksum { sum });
    }
    Ok(())
}

/// Level of the HPD line as last observed by the edge task.
pub struct HpdLine {
    asserted: AtomicBool,
}

impl HpdLine {
    pub const fn new() -> Self {
        Self {
            asserted: AtomicBool::new(false),
        }
    }

    pub fn store(&self, asserted: bool) {
        self.asserted.store(asserted, Ordering::Release);
    }

    pub fn level(&self) -> HpdLevel {
        HpdLevel::from_asserted(self.asserted.load(Ordering::Acquire))
    }
}

impl Default for HpdLine {
    fn default() -> Self {
        Self::new()
    }
}

/// Display sink implementing the controller capabilities over DDC.
pub struct DdcSink<'a, B: DdcBus, E: OutputEnable> {
    line: &'a HpdLine,
    bus: B,
    output: E,
    /// Block captured by the last successful read.
    acquired: Option<EdidBlock>,
    last_error: Option<EdidError>,
}

impl<'a, B: DdcBus, E: OutputEnable> DdcSink<'a, B, E> {
    pub fn new(line: &'a HpdLine, bus: B, output: E) -> Self {
        Self {
            line,
            bus,
            output,
            acquired: None,
            last_error: None,
        }
    }

    pub fn acquired(&self) -> Option<&EdidBlock> {
        self.acquired.as_ref()
    }

    pub fn last_error(&self) -> Option<EdidError> {
        self.last_error
    }

    pub fn output_mut(&mut self) -> &mut E {
        &mut self.output
    }

    fn read_block(&mut self) -> Result<EdidBlock, EdidError> {
        let mut block = [0u8; EDID_BLOCK_LEN];
        let result = self
            .bus
            .read_base_block(&mut block)
            .map_err(|_| EdidError::Bus)
            .and_then(|()| validate_block(&block));
        self.last_error = result.err();
        result.map(|()| block)
    }
}

impl<B: DdcBus, E: OutputEnable> HpdOps for DdcSink<'_, B, E> {
    fn hpd_level(&mut self) -> HpdLevel {
        self.line.level()
    }

    fn disable(&mut self) {
        self.output.set_enabled(false);
    }

    fn edid_read(&mut self) -> bool {
        match self.read_block() {
            Ok(block) => {
                self.acquired = Some(block);
                true
            }
            Err(_) => false,
        }
    }

    fn edid_ready(&mut self) {
        self.output.set_enabled(true);
    }

    fn edid_recheck(&mut self) -> RecheckOutcome {
        match self.read_block() {
            Err(_) => RecheckOutcome::Failed,
            Ok(block) if self.acquired.as_ref() == Some(&block) => RecheckOutcome::Unchanged,
            Ok(_) => RecheckOutcome::Changed,
        }
    }
}
