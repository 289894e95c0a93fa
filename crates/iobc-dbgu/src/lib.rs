//! Debug Unit: a stripped-down UART wired directly to host stdio (spec.md
//! §4.11). Unlike the USART channels, DBGU has no PDC and no IOX server —
//! its "external link" is the host process's own stdin/stdout, so writes
//! complete synchronously and reads are injected by whatever polls stdin.

mod regs;

use std::io::Write;

use iobc_aic::IrqLine;
use iobc_mmio::MmioDevice;
use regs::*;

pub struct Dbgu {
    rx_enabled: bool,
    tx_enabled: bool,
    rhr: Option<u8>,
    sr: u32,
    imr: u32,
    irq: IrqLine,
}

impl Dbgu {
    pub fn new(irq: IrqLine) -> Self {
        Self {
            rx_enabled: false,
            tx_enabled: false,
            rhr: None,
            sr: SR_TXRDY | SR_TXEMPTY,
            imr: 0,
            irq,
        }
    }

    pub fn reset_registers(&mut self) {
        let irq = self.irq.clone();
        *self = Self::new(irq);
    }

    pub fn clear_buffers(&mut self) {
        self.rhr = None;
        self.sr &= !SR_RXRDY;
    }

    fn update_irq(&mut self) {
        self.irq.set(self.sr & self.imr != 0);
    }

    fn do_cr(&mut self, value: u32) {
        if value & CR_RSTRX != 0 {
            self.rx_enabled = false;
            self.rhr = None;
            self.sr &= !(SR_RXRDY | SR_FRAME | SR_PARE);
        }
        if value & CR_RSTTX != 0 {
            self.tx_enabled = false;
        }
        if value & CR_RXEN != 0 {
            self.rx_enabled = true;
        }
        if value & CR_RXDIS != 0 {
            self.rx_enabled = false;
        }
        if value & CR_TXEN != 0 {
            self.tx_enabled = true;
        }
        if value & CR_TXDIS != 0 {
            self.tx_enabled = false;
        }
        if value & CR_RSTSTA != 0 {
            self.sr &= !(SR_OVRE | SR_FRAME | SR_PARE);
        }
        self.update_irq();
    }

    fn write_thr(&mut self, value: u32) {
        if !self.tx_enabled {
            return;
        }
        let byte = value as u8;
        std::io::stdout().write_all(&[byte]).expect("write DBGU byte to host stdout");
        std::io::stdout().flush().expect("flush DBGU stdout");
        // Transfers complete instantly (spec.md §4.11): no queueing, TXEMPTY
        // and TXRDY stay set the whole time.
        self.update_irq();
    }

    fn read_rhr(&mut self) -> u32 {
        let v = self.rhr.take().unwrap_or(0);
        self.sr &= !SR_RXRDY;
        self.update_irq();
        v as u32
    }

    /// Called by whatever polls host stdin (outside this crate's scope) when
    /// a byte arrives. Sets OVRE if RXRDY was already set and RX is enabled,
    /// mirroring the USART overrun rule.
    pub fn inject_rx_byte(&mut self, byte: u8) {
        if !self.rx_enabled {
            return;
        }
        if self.sr & SR_RXRDY != 0 {
            self.sr |= SR_OVRE;
        } else {
            self.rhr = Some(byte);
            self.sr |= SR_RXRDY;
        }
        self.update_irq();
    }
}

impl MmioDevice for Dbgu {
    fn read(&mut self, offset: u32) -> u32 {
        match offset {
            OFF_SR => self.sr,
            OFF_RHR => self.read_rhr(),
            OFF_IMR => self.imr,
            OFF_MR | OFF_BRGR => 0,
            OFF_CR | OFF_THR | OFF_IER | OFF_IDR => panic!("DBGU: read of write-only register at +0x{offset:x}"),
            _ => panic!("DBGU: read of unimplemented register at +0x{offset:x}"),
        }
    }

    fn write(&mut self, offset: u32, value: u32) {
        match offset {
            OFF_CR => self.do_cr(value),
            OFF_THR => self.write_thr(value),
            OFF_MR | OFF_BRGR => {}
            OFF_IER => {
                self.imr |= value;
                self.update_irq();
            }
            OFF_IDR => {
                self.imr &= !value;
                self.update_irq();
            }
            OFF_SR | OFF_RHR | OFF_IMR => {
                panic!("DBGU: write of read-only register at +0x{offset:x} (value=0x{value:x})")
            }
            _ => panic!("DBGU: write of unimplemented register at +0x{offset:x} (value=0x{value:x})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iobc_aic::{Aic, AicHandle};

    fn dbgu() -> Dbgu {
        let handle = AicHandle::new(Aic::new());
        Dbgu::new(handle.line(1))
    }

    #[test]
    fn thr_write_while_disabled_is_dropped() {
        let mut d = dbgu();
        // TXEN not set: write is a no-op (no panic, no stdout side effect
        // beyond what tx_enabled gates).
        d.write(OFF_THR, b'A' as u32);
        assert_eq!(d.read(OFF_SR) & SR_TXRDY, SR_TXRDY);
    }

    #[test]
    fn rx_inject_sets_rxrdy_and_overrun_on_second_byte() {
        let mut d = dbgu();
        d.write(OFF_CR, CR_RXEN);
        d.inject_rx_byte(b'A');
        assert_eq!(d.read(OFF_SR) & SR_RXRDY, SR_RXRDY);
        d.inject_rx_byte(b'B');
        assert_eq!(d.read(OFF_SR) & SR_OVRE, SR_OVRE);
        assert_eq!(d.read(OFF_RHR) as u8, b'A');
        assert_eq!(d.read(OFF_SR) & SR_RXRDY, 0);
    }

    #[test]
    fn rststa_clears_fault_bits_not_rxrdy() {
        let mut d = dbgu();
        d.write(OFF_CR, CR_RXEN);
        d.inject_rx_byte(b'A');
        d.inject_rx_byte(b'B'); // sets OVRE
        d.write(OFF_CR, CR_RSTSTA);
        assert_eq!(d.read(OFF_SR) & SR_OVRE, 0);
        assert_eq!(d.read(OFF_SR) & SR_RXRDY, SR_RXRDY, "RSTSTA does not clear RXRDY");
    }
}
