//! One SPI master-mode channel (spec.md §4.6): every transfer writes a
//! unit out and implicitly reads one back, either echoed synchronously
//! (no client connected — loopback) or from the attached IOX client.

mod regs;

use iobc_aic::IrqLine;
use iobc_iox::{well_known, IoxServer};
use iobc_mmio::MmioDevice;
use iobc_pdc::{DmaTarget, Pdc};
use regs::*;

enum Pending {
    None,
    /// Waiting on an echoed single-unit register transfer (manual TDR write).
    Unit { bits: u32 },
    /// Waiting on an echoed DMA burst of `len` bytes.
    Dma { len: usize },
}

pub struct Spi {
    index: usize,
    mr: u32,
    imr: u32,
    sr: u32,
    enabled: bool,
    rdr: Option<u32>,
    pending: Pending,
    csr: [u32; 4],
    pdc: Pdc,
    irq: IrqLine,
    iox: IoxServer,
}

impl Spi {
    pub fn new(index: usize, irq: IrqLine, iox: IoxServer) -> Self {
        Self {
            index,
            mr: 0,
            imr: 0,
            sr: SR_TDRE | SR_TXEMPTY,
            enabled: false,
            rdr: None,
            pending: Pending::None,
            csr: [0; 4],
            pdc: Pdc::new(false),
            irq,
            iox,
        }
    }

    pub fn reset_registers(&mut self) {
        self.mr = 0;
        self.imr = 0;
        self.sr = SR_TDRE | SR_TXEMPTY;
        self.enabled = false;
        self.rdr = None;
        self.pending = Pending::None;
        self.csr = [0; 4];
        self.pdc.reset();
        self.irq.set(false);
    }

    pub fn clear_buffers(&mut self) {
        self.pending = Pending::None;
    }

    fn status(&self) -> u32 {
        let flags = self.pdc.flags();
        let mut v = self.sr;
        if self.enabled {
            v |= SR_SPIENS;
        }
        if flags.endrx {
            v |= SR_ENDRX;
        }
        if flags.rxbuff {
            v |= SR_RXBUFF;
        }
        if flags.endtx {
            v |= SR_ENDTX;
        }
        if flags.txbufe {
            v |= SR_TXBUFE;
        }
        v
    }

    fn update_irq(&mut self) {
        self.irq.set(self.status() & self.imr != 0);
    }

    fn do_cr(&mut self, value: u32) {
        if value & CR_SPIEN != 0 {
            self.enabled = true;
        }
        if value & CR_SPIDIS != 0 {
            self.enabled = false;
        }
        if value & CR_SWRST != 0 {
            self.reset_registers();
        }
        self.update_irq();
    }

    fn width_bytes(&self) -> usize {
        if csr_width_bits(self.csr[0]) <= 8 {
            1
        } else {
            2
        }
    }

    fn write_tdr(&mut self, value: u32) {
        if !self.enabled || self.sr & SR_TDRE == 0 {
            tracing::debug!(spi = self.index, "TDR write dropped: not ready");
            return;
        }
        let bits = csr_width_bits(self.csr[0]);
        let width = self.width_bytes();
        let data = value & ((1u32 << bits) - 1);
        self.sr &= !SR_TDRE;
        let payload = data.to_le_bytes()[..width].to_vec();
        self.iox.send(well_known::CAT_DATA, well_known::ID_DATA_OUT, &payload);

        if self.iox.has_client() {
            self.pending = Pending::Unit { bits };
        } else {
            self.complete_unit(bits, data);
        }
    }

    fn complete_unit(&mut self, bits: u32, data: u32) {
        self.rdr = Some(((bits - 8) << 16) | data);
        self.sr |= SR_RDRF | SR_TDRE | SR_TXEMPTY;
    }

    fn read_rdr(&mut self) -> u32 {
        let v = self.rdr.take().unwrap_or(0);
        self.sr &= !SR_RDRF;
        v
    }

    /// Called once per host-loop tick.
    pub fn service(&mut self, mem: &dyn DmaTarget) {
        let frames = self.iox.poll().expect("IOX socket error is unrecoverable (spec.md §7 regime 3)");
        for frame in frames {
            match (frame.cat, frame.id) {
                (c, i) if c == well_known::CAT_DATA && i == well_known::ID_DATA_IN => {
                    self.on_echo(mem, &frame.payload);
                    self.iox.respond(frame.seq, well_known::CAT_DATA, well_known::ID_DATA_IN, &0u32.to_le_bytes());
                }
                (c, i) if c == well_known::CAT_FAULT => {
                    let bit = match i {
                        well_known::ID_FAULT_MODF => SR_MODF,
                        well_known::ID_FAULT_OVRES => SR_OVRES,
                        _ => 0,
                    };
                    self.sr |= bit;
                }
                _ => tracing::warn!(spi = self.index, cat = frame.cat, id = frame.id, "unrecognized IOX frame"),
            }
        }

        if self.enabled && matches!(self.pending, Pending::None) && self.pdc.read_ptsr() & 0x100 != 0 {
            let bytes = self.pdc.tx_take(mem, 32);
            if !bytes.is_empty() {
                self.iox.send(well_known::CAT_DATA, well_known::ID_DATA_OUT, &bytes);
                if self.iox.has_client() {
                    self.pending = Pending::Dma { len: bytes.len() };
                } else {
                    // Loopback: echo straight back into the RX DMA window.
                    if self.pdc.read_ptsr() & 0x1 != 0 {
                        self.pdc.rx_put(mem, &bytes);
                    }
                }
            }
        }

        self.update_irq();
    }

    fn on_echo(&mut self, mem: &dyn DmaTarget, payload: &[u8]) {
        match std::mem::replace(&mut self.pending, Pending::None) {
            Pending::None => {
                tracing::debug!(spi = self.index, "dropping unrequested IOX echo");
            }
            Pending::Unit { bits } => {
                let mut buf = [0u8; 4];
                let n = payload.len().min(4);
                buf[..n].copy_from_slice(&payload[..n]);
                let data = u32::from_le_bytes(buf) & ((1u32 << bits) - 1);
                self.complete_unit(bits, data);
            }
            Pending::Dma { len } => {
                // Excess client data is dropped (spec.md §4.6).
                let truncated = &payload[..payload.len().min(len)];
                if self.pdc.read_ptsr() & 0x1 != 0 {
                    self.pdc.rx_put(mem, truncated);
                }
            }
        }
    }
}

impl MmioDevice for Spi {
    fn read(&mut self, offset: u32) -> u32 {
        match offset {
            OFF_MR => self.mr,
            OFF_IMR => self.imr,
            OFF_SR => self.status(),
            OFF_RDR => self.read_rdr(),
            OFF_CSR0 => self.csr[0],
            OFF_CSR1 => self.csr[1],
            OFF_CSR2 => self.csr[2],
            OFF_CSR3 => self.csr[3],
            OFF_RPR => self.pdc.read_rpr(),
            OFF_RCR => self.pdc.read_rcr(),
            OFF_TPR => self.pdc.read_tpr(),
            OFF_TCR => self.pdc.read_tcr(),
            OFF_RNPR => self.pdc.read_rnpr(),
            OFF_RNCR => self.pdc.read_rncr(),
            OFF_TNPR => self.pdc.read_tnpr(),
            OFF_TNCR => self.pdc.read_tncr(),
            OFF_PTSR => self.pdc.read_ptsr(),
            OFF_CR | OFF_IER | OFF_IDR | OFF_TDR | OFF_PTCR => {
                panic!("SPI{}: read of write-only register at +0x{offset:x}", self.index)
            }
            _ => panic!("SPI{}: read of unimplemented register at +0x{offset:x}", self.index),
        }
    }

    fn write(&mut self, offset: u32, value: u32) {
        match offset {
            OFF_CR => self.do_cr(value),
            OFF_MR => self.mr = value,
            OFF_IER => {
                self.imr |= value;
                self.update_irq();
            }
            OFF_IDR => {
                self.imr &= !value;
                self.update_irq();
            }
            OFF_TDR => self.write_tdr(value),
            OFF_CSR0 => self.csr[0] = value,
            OFF_CSR1 => self.csr[1] = value,
            OFF_CSR2 => self.csr[2] = value,
            OFF_CSR3 => self.csr[3] = value,
            OFF_RPR => self.pdc.write_rpr(value),
            OFF_RCR => {
                self.pdc.write_rcr(value);
            }
            OFF_TPR => self.pdc.write_tpr(value),
            OFF_TCR => {
                self.pdc.write_tcr(value);
            }
            OFF_RNPR => self.pdc.write_rnpr(value),
            OFF_RNCR => self.pdc.write_rncr(value),
            OFF_TNPR => self.pdc.write_tnpr(value),
            OFF_TNCR => self.pdc.write_tncr(value),
            OFF_PTCR => self.pdc.write_ptcr(value),
            OFF_IMR | OFF_SR | OFF_RDR | OFF_PTSR => {
                panic!("SPI{}: write of read-only register at +0x{offset:x} (value=0x{value:x})", self.index)
            }
            _ => panic!("SPI{}: write of unimplemented register at +0x{offset:x} (value=0x{value:x})", self.index),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iobc_aic::{Aic, AicHandle};
    use std::cell::RefCell;
    use std::io::{Read, Write};
    use std::os::unix::net::UnixStream as ClientStream;
    use std::thread::sleep;
    use std::time::Duration;

    struct FlatMem(RefCell<Vec<u8>>);
    impl DmaTarget for FlatMem {
        fn read_u8(&self, addr: u32) -> u8 {
            self.0.borrow()[addr as usize]
        }
        fn write_u8(&self, addr: u32, value: u8) {
            self.0.borrow_mut()[addr as usize] = value;
        }
    }

    fn spi(tmp: &tempfile::TempDir, name: &str) -> Spi {
        let handle = AicHandle::new(Aic::new());
        let iox = IoxServer::bind(tmp.path().join(name)).unwrap();
        Spi::new(0, handle.line(4), iox)
    }

    #[test]
    fn loopback_completes_synchronously_with_no_client() {
        let tmp = tempfile::tempdir().unwrap();
        let mut s = spi(&tmp, "a");
        s.write(OFF_CR, CR_SPIEN);
        s.write(OFF_TDR, 0xAB);
        assert_eq!(s.read(OFF_SR) & SR_RDRF, SR_RDRF);
        assert_eq!(s.read(OFF_RDR) & 0xFF, 0xAB);
    }

    #[test]
    fn transfer_suspends_until_client_echoes() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("b");
        let mut s = spi(&tmp, "b");
        let mut client = ClientStream::connect(&path).unwrap();
        client.set_nonblocking(true).unwrap();
        sleep(Duration::from_millis(10));

        let mem = FlatMem(RefCell::new(vec![0u8; 4]));
        s.service(&mem);
        s.write(OFF_CR, CR_SPIEN);
        s.write(OFF_TDR, 0x55);
        assert_eq!(s.read(OFF_SR) & SR_RDRF, 0, "must not complete until echoed");

        let mut buf = [0u8; 16];
        let mut n = 0;
        for _ in 0..20 {
            match client.read(&mut buf) {
                Ok(k) if k > 0 => {
                    n = k;
                    break;
                }
                _ => sleep(Duration::from_millis(5)),
            }
        }
        assert!(n > 0);

        let echo = iobc_iox::Frame { seq: buf[0], cat: well_known::CAT_DATA, id: well_known::ID_DATA_IN, payload: vec![0x77] };
        client.write_all(&echo.encode()).unwrap();
        for _ in 0..20 {
            s.service(&mem);
            if s.read(OFF_SR) & SR_RDRF != 0 {
                break;
            }
            sleep(Duration::from_millis(5));
        }
        assert_eq!(s.read(OFF_RDR) & 0xFF, 0x77);
    }
}
