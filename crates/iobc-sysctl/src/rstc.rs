//! Reset Controller: a small register file that arms a whole-SoC reset
//! request. The datasheet key-protects CR to keep flight software from
//! triggering a reset by accident; a write missing the 0xA5 key byte is
//! simply ignored rather than treated as a contract violation.

use iobc_aic::IrqLine;
use iobc_mmio::MmioDevice;

use crate::regs::*;

pub struct Rstc {
    sr: u32,
    mr: u32,
    irq: IrqLine,
    /// Drained by `Soc` after each write; sourced from a CR write that
    /// carried the correct key and requested a processor/peripheral reset.
    pending_reset: bool,
}

impl Rstc {
    pub fn new(irq: IrqLine) -> Self {
        Self { sr: RSTC_SR_NRSTL, mr: 0, irq, pending_reset: false }
    }

    pub fn reset_registers(&mut self) {
        let irq = self.irq.clone();
        *self = Self::new(irq);
    }

    pub fn clear_buffers(&mut self) {}

    fn update_irq(&mut self) {
        self.irq.set(self.mr & RSTC_MR_URSTEN != 0 && self.sr & RSTC_SR_URSTS != 0);
    }

    /// Consumed by `Soc`: `true` means a correctly-keyed CR write requested
    /// a reset this tick, and `Soc::reset()` should run.
    pub fn take_reset_request(&mut self) -> bool {
        std::mem::take(&mut self.pending_reset)
    }

    fn do_cr(&mut self, value: u32) {
        if value & RSTC_CR_KEY_MASK != RSTC_CR_KEY {
            tracing::warn!(value, "RSTC: CR write with wrong key ignored");
            return;
        }
        if value & (RSTC_CR_PROCRST | RSTC_CR_PERRST | RSTC_CR_EXTRST) != 0 {
            self.sr |= RSTC_SR_SRCMP;
            self.pending_reset = true;
        }
    }
}

impl MmioDevice for Rstc {
    fn read(&mut self, offset: u32) -> u32 {
        match offset {
            OFF_RSTC_SR => {
                // Software-reset-in-progress is latched for exactly the tick
                // that requested it; the next status read observes it clear,
                // matching the datasheet's "cleared at the end of reset".
                let v = self.sr;
                self.sr &= !RSTC_SR_SRCMP;
                v
            }
            OFF_RSTC_MR => self.mr,
            OFF_RSTC_CR => panic!("RSTC: read of write-only CR"),
            _ => panic!("RSTC: read of unimplemented register at +0x{offset:x}"),
        }
    }

    fn write(&mut self, offset: u32, value: u32) {
        match offset {
            OFF_RSTC_CR => self.do_cr(value),
            OFF_RSTC_MR => self.mr = value,
            OFF_RSTC_SR => panic!("RSTC: write of read-only SR (value=0x{value:x})"),
            _ => panic!("RSTC: write of unimplemented register at +0x{offset:x} (value=0x{value:x})"),
        }
        self.update_irq();
    }
}
