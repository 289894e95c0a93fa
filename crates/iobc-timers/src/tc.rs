//! Timer/Counter block: 3 channels sharing one MMIO window (spec.md §4.9).
//! Two such blocks exist on-chip; `Tc::new` takes an index purely for
//! diagnostics, the register layout is identical.

use iobc_aic::IrqLine;
use iobc_mmio::MmioDevice;

use crate::regs::*;
use crate::ClockTicks;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WaveShape {
    /// WAVSEL 00: counts 0..=0xFFFF then wraps, setting COVFS.
    SawtoothToMax,
    /// WAVSEL 10: counts 0..=RC then resets to 0, setting CPCS.
    SawtoothToRc,
    /// WAVSEL 01/11: counts up to RC (or 0xFFFF) then back down to 0.
    Triangular { to_rc: bool },
}

struct TcChannel {
    ccr_enabled: bool,
    cmr: u32,
    cv: u32,
    ra: u32,
    rb: u32,
    rc: u32,
    sr: u32,
    imr: u32,
    /// Sub-divisor tick accumulator, in the channel's selected clock domain.
    accum: u64,
    counting_down: bool,
    irq: IrqLine,
}

impl TcChannel {
    fn new(irq: IrqLine) -> Self {
        Self {
            ccr_enabled: false,
            cmr: 0,
            cv: 0,
            ra: 0,
            rb: 0,
            rc: 0,
            sr: 0,
            imr: 0,
            accum: 0,
            counting_down: false,
            irq,
        }
    }

    fn reset_registers(&mut self) {
        let irq = self.irq.clone();
        *self = Self::new(irq);
    }

    fn tcclks(&self) -> u32 {
        self.cmr & CMR_TCCLKS_MASK
    }

    /// Divisor against the MCK domain; `None` for SLCK-clocked or
    /// externally-clocked channels.
    fn mck_divisor(&self) -> Option<u64> {
        match self.tcclks() {
            TCCLKS_MCK2 => Some(2),
            TCCLKS_MCK8 => Some(8),
            TCCLKS_MCK32 => Some(32),
            TCCLKS_MCK128 => Some(128),
            _ => None,
        }
    }

    fn waveform(&self) -> WaveShape {
        match (self.cmr & CMR_WAVSEL_MASK) >> CMR_WAVSEL_SHIFT {
            0b00 => WaveShape::SawtoothToMax,
            0b10 => WaveShape::SawtoothToRc,
            0b01 => WaveShape::Triangular { to_rc: false },
            _ => WaveShape::Triangular { to_rc: true },
        }
    }

    fn do_ccr(&mut self, value: u32) {
        if value & CCR_CLKDIS != 0 {
            self.ccr_enabled = false;
        }
        if value & CCR_CLKEN != 0 {
            self.ccr_enabled = true;
        }
        if value & CCR_SWTRG != 0 {
            self.cv = 0;
            self.counting_down = false;
            self.sr |= SR_ETRGS;
        }
    }

    fn top(&self) -> u32 {
        match self.waveform() {
            WaveShape::SawtoothToMax | WaveShape::Triangular { to_rc: false } => 0xFFFF,
            WaveShape::SawtoothToRc | WaveShape::Triangular { to_rc: true } => self.rc.max(1),
        }
    }

    fn advance_one(&mut self) {
        let top = self.top();
        match self.waveform() {
            WaveShape::SawtoothToMax | WaveShape::SawtoothToRc => {
                self.cv += 1;
                if self.cv >= top {
                    self.cv = 0;
                    if matches!(self.waveform(), WaveShape::SawtoothToMax) {
                        self.sr |= SR_COVFS;
                    } else {
                        self.sr |= SR_CPCS;
                    }
                }
            }
            WaveShape::Triangular { .. } => {
                if self.counting_down {
                    if self.cv == 0 {
                        self.counting_down = false;
                    } else {
                        self.cv -= 1;
                    }
                } else {
                    self.cv += 1;
                    if self.cv >= top {
                        self.counting_down = true;
                        self.sr |= SR_CPCS;
                    }
                }
            }
        }
        if self.cv == self.ra {
            self.sr |= SR_CPAS;
        }
        if self.cv == self.rb {
            self.sr |= SR_CPBS;
        }
    }

    fn service(&mut self, ticks: ClockTicks) {
        if !self.ccr_enabled {
            return;
        }
        let domain_ticks = match self.mck_divisor() {
            Some(divisor) => {
                self.accum += ticks.mck;
                let advances = self.accum / divisor;
                self.accum %= divisor;
                advances
            }
            None => {
                if self.tcclks() != TCCLKS_SLCK {
                    panic!("TC channel: XC0/XC1/XC2 external clocking is not implemented");
                }
                ticks.slck
            }
        };
        for _ in 0..domain_ticks {
            self.advance_one();
        }
        self.irq.set(self.sr & self.imr != 0);
    }

    fn status(&self) -> u32 {
        let mut v = self.sr;
        if self.ccr_enabled {
            v |= SR_CLKSTA;
        }
        v
    }

    fn read(&mut self, offset: u32) -> u32 {
        match offset {
            OFF_TC_CMR => self.cmr,
            OFF_TC_CV => self.cv,
            OFF_TC_RA => self.ra,
            OFF_TC_RB => self.rb,
            OFF_TC_RC => self.rc,
            OFF_TC_SR => {
                let v = self.status();
                self.sr = 0;
                v
            }
            OFF_TC_IMR => self.imr,
            OFF_TC_CCR => panic!("TC channel: read of write-only CCR"),
            _ => panic!("TC channel: read of unimplemented register at +0x{offset:x}"),
        }
    }

    fn write(&mut self, offset: u32, value: u32) {
        match offset {
            OFF_TC_CCR => self.do_ccr(value),
            OFF_TC_CMR => {
                if value & CMR_WAVE == 0 {
                    panic!("TC channel: capture mode (WAVE=0) is not implemented");
                }
                self.cmr = value;
            }
            OFF_TC_RA => self.ra = value,
            OFF_TC_RB => self.rb = value,
            OFF_TC_RC => self.rc = value,
            OFF_TC_IER => {
                self.imr |= value;
                self.irq.set(self.sr & self.imr != 0);
            }
            OFF_TC_IDR => {
                self.imr &= !value;
                self.irq.set(self.sr & self.imr != 0);
            }
            OFF_TC_CV | OFF_TC_SR | OFF_TC_IMR => {
                panic!("TC channel: write of read-only register at +0x{offset:x} (value=0x{value:x})")
            }
            _ => panic!("TC channel: write of unimplemented register at +0x{offset:x} (value=0x{value:x})"),
        }
    }
}

/// One TC block: 3 channels plus the shared BCR/BMR pair (chaining is
/// unsupported, so `Bmr` is stored but never interpreted).
pub struct Tc {
    index: usize,
    channels: [TcChannel; 3],
    bmr: u32,
}

impl Tc {
    pub fn new(index: usize, irqs: [IrqLine; 3]) -> Self {
        let [a, b, c] = irqs;
        Self {
            index,
            channels: [TcChannel::new(a), TcChannel::new(b), TcChannel::new(c)],
            bmr: 0,
        }
    }

    pub fn reset_registers(&mut self) {
        for ch in &mut self.channels {
            ch.reset_registers();
        }
        self.bmr = 0;
    }

    pub fn service(&mut self, ticks: ClockTicks) {
        for ch in &mut self.channels {
            ch.service(ticks);
        }
    }
}

impl MmioDevice for Tc {
    fn read(&mut self, offset: u32) -> u32 {
        if offset < OFF_TC_BCR {
            let ch = (offset / TC_CHANNEL_STRIDE) as usize;
            let inner = offset % TC_CHANNEL_STRIDE;
            self.channels
                .get_mut(ch)
                .unwrap_or_else(|| panic!("TC{}: channel {ch} out of range", self.index))
                .read(inner)
        } else if offset == OFF_TC_BMR {
            self.bmr
        } else if offset == OFF_TC_BCR {
            panic!("TC{}: read of write-only BCR", self.index)
        } else {
            panic!("TC{}: read of unimplemented register at 0x{offset:x}", self.index)
        }
    }

    fn write(&mut self, offset: u32, value: u32) {
        if offset < OFF_TC_BCR {
            let ch = (offset / TC_CHANNEL_STRIDE) as usize;
            let inner = offset % TC_CHANNEL_STRIDE;
            self.channels
                .get_mut(ch)
                .unwrap_or_else(|| panic!("TC{}: channel {ch} out of range", self.index))
                .write(inner, value);
        } else if offset == OFF_TC_BMR {
            self.bmr = value;
        } else if offset == OFF_TC_BCR {
            // Software synchronization trigger across channels; no chaining
            // is modeled, so this is a documented no-op beyond acceptance.
        } else {
            panic!("TC{}: write of unimplemented register at 0x{offset:x} (value=0x{value:x})", self.index);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iobc_aic::{Aic, AicHandle};

    fn tc() -> Tc {
        let handle = AicHandle::new(Aic::new());
        Tc::new(0, [handle.line(17), handle.line(18), handle.line(19)])
    }

    #[test]
    fn sawtooth_to_max_wraps_and_sets_covfs() {
        let mut tc = tc();
        tc.write(OFF_TC_CMR, CMR_WAVE | TCCLKS_MCK2);
        tc.write(OFF_TC_CCR, CCR_CLKEN);
        // 2 MCK ticks per internal tick; drive 0x1FFFE MCK ticks = 0xFFFF advances.
        tc.service(ClockTicks { mck: 2 * 0xFFFF, slck: 0 });
        assert_eq!(tc.read(OFF_TC_CV), 0);
        assert_eq!(tc.read(OFF_TC_SR) & SR_COVFS, SR_COVFS);
    }

    #[test]
    fn sawtooth_to_rc_resets_and_sets_cpcs() {
        let mut tc = tc();
        tc.write(OFF_TC_RC, 10);
        tc.write(OFF_TC_CMR, CMR_WAVE | (0b10 << CMR_WAVSEL_SHIFT) | TCCLKS_MCK2);
        tc.write(OFF_TC_CCR, CCR_CLKEN);
        tc.service(ClockTicks { mck: 2 * 10, slck: 0 });
        assert_eq!(tc.read(OFF_TC_CV), 0);
        assert_eq!(tc.read(OFF_TC_SR) & SR_CPCS, SR_CPCS);
    }

    #[test]
    fn capture_mode_is_unimplemented() {
        let mut tc = tc();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            tc.write(OFF_TC_CMR, TCCLKS_MCK2); // WAVE bit clear
        }));
        assert!(result.is_err());
    }

    #[test]
    fn slck_clocked_channel_advances_from_slck_domain() {
        let mut tc = tc();
        tc.write(OFF_TC_CMR, CMR_WAVE | TCCLKS_SLCK);
        tc.write(OFF_TC_CCR, CCR_CLKEN);
        tc.service(ClockTicks { mck: 1_000_000, slck: 5 });
        assert_eq!(tc.read(OFF_TC_CV), 5);
    }
}
