//! Power Management Controller: clock tree state machine (spec.md §4.13).
//! Four observable frequencies — slow oscillator, main oscillator, PLLA,
//! PLLB — feed a single master-clock selector/prescaler/divider. Readiness
//! bits are set immediately on configuration, never ramped, and only when
//! the configuration is valid (nonzero divider and multiplier). PMC is a
//! SYSC source: its interrupt line is one input of the AIC stub.

mod regs;

use iobc_aic::IrqLine;
use iobc_mmio::MmioDevice;
use regs::*;

/// AT91SAM9G20 MDIV field: 00→÷1, 01→÷2, 10→÷4, 11→÷3.
const MDIV_DIVISORS: [u64; 4] = [1, 2, 4, 3];

pub struct Pmc {
    scsr: u32,
    pcsr: u32,
    mor: u32,
    pllar: u32,
    pllbr: u32,
    mckr: u32,
    sr: u32,
    imr: u32,
    irq: IrqLine,
    /// Master clock as of the last recomputation, used to debounce the
    /// mclk-change callback (spec.md §8 testable property 6).
    last_mclk_hz: u64,
    /// Set by a register write that actually changed the master clock;
    /// drained by `Soc` via [`Pmc::take_mclk_change`] to fan the change out
    /// to clock-sensitive peripherals.
    pending_mclk_change: Option<u64>,
}

impl Pmc {
    pub fn new(irq: IrqLine) -> Self {
        let mut pmc = Self {
            scsr: 0,
            pcsr: 0,
            mor: 0,
            pllar: 0,
            pllbr: 0,
            mckr: 0,
            sr: 0,
            imr: 0,
            irq,
            last_mclk_hz: SLOW_CLOCK_HZ,
            pending_mclk_change: None,
        };
        pmc.last_mclk_hz = pmc.mclk_hz();
        pmc
    }

    pub fn reset_registers(&mut self) {
        let irq = self.irq.clone();
        *self = Self::new(irq);
    }

    pub fn clear_buffers(&mut self) {
        // PMC has no external link and no buffered state.
    }

    fn update_irq(&mut self) {
        self.irq.set(self.sr & self.imr != 0);
    }

    fn pll_locked(pllr: u32) -> bool {
        let div = pllr & PLL_DIV_MASK;
        let mul = (pllr & PLL_MUL_MASK) >> PLL_MUL_SHIFT;
        div != 0 && mul != 0
    }

    /// PLL output frequency, or 0 if unconfigured/invalid.
    fn pll_hz(pllr: u32) -> u64 {
        if !Self::pll_locked(pllr) {
            return 0;
        }
        let div = (pllr & PLL_DIV_MASK) as u64;
        let mul = ((pllr & PLL_MUL_MASK) >> PLL_MUL_SHIFT) as u64;
        MAIN_OSC_HZ / div * (mul + 1)
    }

    /// The master clock, computed purely from the current register state
    /// (spec.md §3 "Clock tree"): selected source ÷ prescaler ÷ MDIV.
    pub fn mclk_hz(&self) -> u64 {
        let css = self.mckr & MCKR_CSS_MASK;
        let source_hz = match css {
            MCKR_CSS_SLOW => SLOW_CLOCK_HZ,
            MCKR_CSS_MAIN => {
                if self.mor & MOR_MOSCEN != 0 {
                    MAIN_OSC_HZ
                } else {
                    0
                }
            }
            MCKR_CSS_PLLA => Self::pll_hz(self.pllar),
            MCKR_CSS_PLLB => Self::pll_hz(self.pllbr),
            _ => unreachable!("CSS is a 2-bit field"),
        };
        if source_hz == 0 {
            return 0;
        }
        let pres_field = (self.mckr & MCKR_PRES_MASK) >> MCKR_PRES_SHIFT;
        if pres_field == 7 {
            return 0;
        }
        let prescaler = 1u64 << pres_field;
        let mdiv = MDIV_DIVISORS[((self.mckr & MCKR_MDIV_MASK) >> MCKR_MDIV_SHIFT) as usize];
        source_hz / prescaler / mdiv
    }

    /// Recomputes the master clock and, if it actually changed since the
    /// last recomputation, latches the new frequency into
    /// `pending_mclk_change` (spec.md §8 testable property 6: writing the
    /// same MCKR value twice fires the callback exactly once).
    fn recompute_mclk(&mut self) {
        let hz = self.mclk_hz();
        if hz != self.last_mclk_hz {
            self.last_mclk_hz = hz;
            self.pending_mclk_change = Some(hz);
        }
    }

    /// Drains a pending master-clock change, if any. `Soc` calls this after
    /// every MMIO write that lands on the PMC and, when it returns `Some`,
    /// re-derives every clock-sensitive peripheral's derived clocks (spec.md
    /// §4.13).
    pub fn take_mclk_change(&mut self) -> Option<u64> {
        self.pending_mclk_change.take()
    }
}

impl MmioDevice for Pmc {
    fn read(&mut self, offset: u32) -> u32 {
        match offset {
            OFF_SCSR => self.scsr,
            OFF_PCSR => self.pcsr,
            OFF_MOR => self.mor,
            OFF_PLLAR => self.pllar,
            OFF_PLLBR => self.pllbr,
            OFF_MCKR => self.mckr,
            OFF_SR => self.sr,
            OFF_IMR => self.imr,
            OFF_SCER | OFF_SCDR | OFF_PCER | OFF_PCDR | OFF_IER | OFF_IDR => {
                panic!("PMC: read of write-only register at +0x{offset:x}")
            }
            _ => panic!("PMC: read of unimplemented register at +0x{offset:x}"),
        }
    }

    fn write(&mut self, offset: u32, value: u32) {
        match offset {
            OFF_SCER => self.scsr |= value,
            OFF_SCDR => self.scsr &= !value,
            OFF_PCER => self.pcsr |= value,
            OFF_PCDR => self.pcsr &= !value,
            OFF_MOR => {
                self.mor = value;
                if value & MOR_MOSCEN != 0 {
                    self.sr |= SR_MOSCS;
                } else {
                    self.sr &= !SR_MOSCS;
                }
                self.recompute_mclk();
            }
            OFF_PLLAR => {
                self.pllar = value;
                if Self::pll_locked(value) {
                    self.sr |= SR_LOCKA;
                } else {
                    self.sr &= !SR_LOCKA;
                }
                self.recompute_mclk();
            }
            OFF_PLLBR => {
                self.pllbr = value;
                if Self::pll_locked(value) {
                    self.sr |= SR_LOCKB;
                } else {
                    self.sr &= !SR_LOCKB;
                }
                self.recompute_mclk();
            }
            OFF_MCKR => {
                self.mckr = value;
                self.recompute_mclk();
                // MCKRDY is set immediately regardless of whether the
                // frequency actually changed; software polls it after every
                // MCKR write to know the switch has taken effect.
                self.sr |= SR_MCKRDY;
            }
            OFF_IER => self.imr |= value,
            OFF_IDR => self.imr &= !value,
            OFF_SCSR | OFF_PCSR | OFF_SR | OFF_IMR => {
                panic!("PMC: write of read-only register at +0x{offset:x} (value=0x{value:x})")
            }
            _ => panic!("PMC: write of unimplemented register at +0x{offset:x} (value=0x{value:x})"),
        }
        self.update_irq();
        if let Some(hz) = self.pending_mclk_change {
            tracing::debug!(mclk_hz = hz, "PMC master clock changed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iobc_aic::{Aic, AicHandle};

    fn pmc() -> Pmc {
        let handle = AicHandle::new(Aic::new());
        Pmc::new(handle.line(0))
    }

    #[test]
    fn slow_clock_is_the_reset_default() {
        let p = pmc();
        assert_eq!(p.mclk_hz(), SLOW_CLOCK_HZ);
    }

    #[test]
    fn main_oscillator_selected_after_enable_and_css_switch() {
        let mut p = pmc();
        p.write(OFF_MOR, MOR_MOSCEN);
        assert_eq!(p.read(OFF_SR) & SR_MOSCS, SR_MOSCS);
        p.write(OFF_MCKR, MCKR_CSS_MAIN);
        assert_eq!(p.mclk_hz(), MAIN_OSC_HZ);
        assert_eq!(p.read(OFF_SR) & SR_MCKRDY, SR_MCKRDY);
    }

    #[test]
    fn plla_locks_only_with_nonzero_div_and_mul() {
        let mut p = pmc();
        p.write(OFF_PLLAR, 0); // div=0 -> invalid
        assert_eq!(p.read(OFF_SR) & SR_LOCKA, 0);
        let valid = 10 | (4 << PLL_MUL_SHIFT); // div=10, mul field=4 -> x5
        p.write(OFF_PLLAR, valid);
        assert_eq!(p.read(OFF_SR) & SR_LOCKA, SR_LOCKA);
        p.write(OFF_MCKR, MCKR_CSS_PLLA);
        assert_eq!(p.mclk_hz(), MAIN_OSC_HZ / 10 * 5);
    }

    #[test]
    fn mckr_prescaler_and_mdiv_divide_the_selected_source() {
        let mut p = pmc();
        p.write(OFF_MOR, MOR_MOSCEN);
        let pres_div4 = 2 << MCKR_PRES_SHIFT;
        let mdiv_div2 = 1 << MCKR_MDIV_SHIFT;
        p.write(OFF_MCKR, MCKR_CSS_MAIN | pres_div4 | mdiv_div2);
        assert_eq!(p.mclk_hz(), MAIN_OSC_HZ / 4 / 2);
    }

    #[test]
    fn writing_same_mckr_value_twice_fires_callback_exactly_once() {
        let mut p = pmc();
        p.write(OFF_MOR, MOR_MOSCEN);
        p.write(OFF_MCKR, MCKR_CSS_MAIN);
        assert_eq!(p.take_mclk_change(), Some(MAIN_OSC_HZ));
        p.write(OFF_MCKR, MCKR_CSS_MAIN);
        assert_eq!(p.take_mclk_change(), None, "same value written twice must not re-fire");
    }

    #[test]
    #[should_panic(expected = "write-only")]
    fn scsr_is_not_directly_writable() {
        let mut p = pmc();
        p.write(OFF_SCSR, 1);
    }
}
