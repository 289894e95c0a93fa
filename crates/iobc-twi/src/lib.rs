//! The master-only TWI (I²C) channel (spec.md §4.7): transactions are
//! bracketed as IOX CTRL_START/DATA_OUT/CTRL_STOP bursts, either debounced
//! from single THR writes or emitted synchronously from PDC DMA.

mod regs;

use std::collections::VecDeque;

use iobc_aic::IrqLine;
use iobc_iox::{well_known, IoxServer};
use iobc_mmio::MmioDevice;
use iobc_pdc::{DmaTarget, Pdc};
use regs::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Offline,
    Master,
}

pub struct Twi {
    index: usize,
    mode: Mode,
    mmr: u32,
    iadr: u32,
    cwgr: u32,
    sr: u32,
    imr: u32,
    rhr: Option<u8>,
    rx_buffer: VecDeque<u8>,
    pending_tx: Vec<u8>,
    debounce_ticks: Option<u32>,
    pdc: Pdc,
    irq: IrqLine,
    iox: IoxServer,
}

impl Twi {
    pub fn new(index: usize, irq: IrqLine, iox: IoxServer) -> Self {
        Self {
            index,
            mode: Mode::Offline,
            mmr: 0,
            iadr: 0,
            cwgr: 0,
            sr: SR_TXCOMP | SR_TXRDY,
            imr: 0,
            rhr: None,
            rx_buffer: VecDeque::new(),
            pending_tx: Vec::new(),
            debounce_ticks: None,
            pdc: Pdc::new(true),
            irq,
            iox,
        }
    }

    pub fn reset_registers(&mut self) {
        self.mode = Mode::Offline;
        self.mmr = 0;
        self.iadr = 0;
        self.cwgr = 0;
        self.sr = SR_TXCOMP | SR_TXRDY;
        self.imr = 0;
        self.rhr = None;
        self.pending_tx.clear();
        self.debounce_ticks = None;
        self.pdc.reset();
        self.irq.set(false);
    }

    pub fn clear_buffers(&mut self) {
        self.rx_buffer.clear();
    }

    fn status(&self) -> u32 {
        let flags = self.pdc.flags();
        let mut v = self.sr;
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
        if value & CR_SWRST != 0 {
            self.reset_registers();
            return;
        }
        if value & CR_MSEN != 0 {
            self.require_txcomp_for_mode_switch();
            self.mode = Mode::Master;
        }
        if value & CR_MSDIS != 0 {
            self.mode = Mode::Offline;
        }
        if value & CR_SVEN != 0 {
            // Slave mode is explicitly not implemented (spec.md §4.7): this
            // is a regime-2 unsupported-feature access, and any mode
            // claiming it would silently produce wrong results, so abort.
            panic!("TWI{}: slave mode is not implemented", self.index);
        }
        self.update_irq();
    }

    fn require_txcomp_for_mode_switch(&self) {
        if self.sr & SR_TXCOMP == 0 {
            panic!("TWI{}: master/slave mode switch while a transaction is in progress (TXCOMP=0)", self.index);
        }
    }

    fn write_thr(&mut self, value: u32) {
        if self.mode != Mode::Master {
            tracing::debug!(twi = self.index, "THR write dropped: not in master mode");
            return;
        }
        self.pending_tx.push(value as u8);
        self.debounce_ticks = Some(THR_DEBOUNCE_TICKS);
        self.sr &= !SR_TXCOMP;
    }

    fn read_rhr(&mut self) -> u32 {
        let v = self.rhr.take().unwrap_or(0);
        self.sr &= !SR_RXRDY;
        self.try_fill_rhr();
        v as u32
    }

    fn try_fill_rhr(&mut self) {
        if self.rhr.is_some() {
            return;
        }
        if let Some(b) = self.rx_buffer.pop_front() {
            self.rhr = Some(b);
            self.sr |= SR_RXRDY;
        }
    }

    fn emit_burst(&mut self, bytes: &[u8]) {
        let dadr = ((self.mmr & MMR_DADR_MASK) >> MMR_DADR_SHIFT) as u8;
        let iadrsz = ((self.mmr & MMR_IADRSZ_MASK) >> MMR_IADRSZ_SHIFT) as u8;
        let iadr = self.iadr.to_be_bytes();
        let mut start_payload = vec![dadr, iadrsz];
        start_payload.extend_from_slice(&iadr[1..1 + iadrsz.min(3) as usize]);
        self.iox.send(well_known::CAT_DATA, well_known::ID_CTRL_START, &start_payload);
        self.iox.send(well_known::CAT_DATA, well_known::ID_DATA_OUT, bytes);
        self.iox.send(well_known::CAT_DATA, well_known::ID_CTRL_STOP, &[]);
        self.sr |= SR_TXCOMP;
    }

    /// Called once per host-loop tick; each call also represents one tick
    /// of the THR debounce timer (spec.md §5 suspension point (c)).
    pub fn service(&mut self, mem: &dyn DmaTarget) {
        let frames = self.iox.poll().expect("IOX socket error is unrecoverable (spec.md §7 regime 3)");
        for frame in frames {
            match (frame.cat, frame.id) {
                (c, i) if c == well_known::CAT_DATA && i == well_known::ID_DATA_IN => {
                    for &b in &frame.payload {
                        if self.rx_buffer.is_empty() && self.rhr.is_some() {
                            self.sr |= SR_OVRE;
                        }
                        self.rx_buffer.push_back(b);
                    }
                    // TWI DATA_IN replies always report success (spec.md §7).
                    self.iox.respond(frame.seq, well_known::CAT_DATA, well_known::ID_DATA_IN, &0u32.to_le_bytes());
                }
                (c, i) if c == well_known::CAT_FAULT => {
                    let bit = match i {
                        well_known::ID_FAULT_OVRE => SR_OVRE,
                        well_known::ID_FAULT_NACK => SR_NACK,
                        well_known::ID_FAULT_ARBLST => SR_ARBLST,
                        _ => 0,
                    };
                    self.sr |= bit;
                }
                _ => tracing::warn!(twi = self.index, cat = frame.cat, id = frame.id, "unrecognized IOX frame"),
            }
        }

        if let Some(ticks) = self.debounce_ticks {
            if ticks == 0 {
                let bytes = std::mem::take(&mut self.pending_tx);
                self.emit_burst(&bytes);
                self.debounce_ticks = None;
            } else {
                self.debounce_ticks = Some(ticks - 1);
            }
        }

        if self.mode == Mode::Master && self.pdc.read_ptsr() & 0x100 != 0 {
            let bytes = self.pdc.tx_take(mem, 64);
            if !bytes.is_empty() {
                // DMA TX is synchronous: no debounce window.
                self.emit_burst(&bytes);
            }
        }

        if self.mode == Mode::Master && self.pdc.read_ptsr() & 0x1 != 0 {
            let pending: Vec<u8> = self.rx_buffer.iter().copied().collect();
            let consumed = self.pdc.rx_put(mem, &pending);
            self.rx_buffer.drain(..consumed);
        } else {
            self.try_fill_rhr();
        }

        self.update_irq();
    }
}

impl MmioDevice for Twi {
    fn read(&mut self, offset: u32) -> u32 {
        match offset {
            OFF_MMR => self.mmr,
            OFF_IADR => self.iadr,
            OFF_CWGR => self.cwgr,
            OFF_SR => self.status(),
            OFF_IMR => self.imr,
            OFF_RHR => self.read_rhr(),
            OFF_RPR => self.pdc.read_rpr(),
            OFF_RCR => self.pdc.read_rcr(),
            OFF_TPR => self.pdc.read_tpr(),
            OFF_TCR => self.pdc.read_tcr(),
            OFF_RNPR => self.pdc.read_rnpr(),
            OFF_RNCR => self.pdc.read_rncr(),
            OFF_TNPR => self.pdc.read_tnpr(),
            OFF_TNCR => self.pdc.read_tncr(),
            OFF_PTSR => self.pdc.read_ptsr(),
            OFF_CR | OFF_IER | OFF_IDR | OFF_THR | OFF_PTCR => {
                panic!("TWI{}: read of write-only register at +0x{offset:x}", self.index)
            }
            _ => panic!("TWI{}: read of unimplemented register at +0x{offset:x}", self.index),
        }
    }

    fn write(&mut self, offset: u32, value: u32) {
        match offset {
            OFF_CR => self.do_cr(value),
            OFF_MMR => self.mmr = value,
            OFF_IADR => self.iadr = value,
            OFF_CWGR => self.cwgr = value,
            OFF_IER => {
                self.imr |= value;
                self.update_irq();
            }
            OFF_IDR => {
                self.imr &= !value;
                self.update_irq();
            }
            OFF_THR => self.write_thr(value),
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
            OFF_IMR | OFF_SR | OFF_RHR | OFF_PTSR => {
                panic!("TWI{}: write of read-only register at +0x{offset:x} (value=0x{value:x})", self.index)
            }
            _ => panic!("TWI{}: write of unimplemented register at +0x{offset:x} (value=0x{value:x})", self.index),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iobc_aic::{Aic, AicHandle};
    use std::cell::RefCell;
    use std::io::Read;
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

    fn twi(tmp: &tempfile::TempDir, name: &str) -> Twi {
        let handle = AicHandle::new(Aic::new());
        let iox = IoxServer::bind(tmp.path().join(name)).unwrap();
        Twi::new(0, handle.line(5), iox)
    }

    #[test]
    #[should_panic(expected = "slave mode")]
    fn slave_mode_is_unsupported() {
        let tmp = tempfile::tempdir().unwrap();
        let mut t = twi(&tmp, "a");
        t.write(OFF_CR, CR_SVEN);
    }

    #[test]
    fn debounced_thr_writes_bundle_into_one_burst() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("b");
        let mut t = twi(&tmp, "b");
        t.write(OFF_CR, CR_MSEN);
        t.write(OFF_MMR, (0x50u32) << MMR_DADR_SHIFT);

        let mut client = ClientStream::connect(&path).unwrap();
        client.set_nonblocking(true).unwrap();
        sleep(Duration::from_millis(10));

        let mem = FlatMem(RefCell::new(vec![0u8; 4]));
        t.write(OFF_THR, 0x11);
        t.service(&mem);
        t.write(OFF_THR, 0x22);
        t.service(&mem);
        assert_eq!(t.read(OFF_SR) & SR_TXCOMP, 0, "still debouncing");
        t.service(&mem);
        t.service(&mem);
        assert_eq!(t.read(OFF_SR) & SR_TXCOMP, SR_TXCOMP);

        let mut received = Vec::new();
        for _ in 0..20 {
            let mut buf = [0u8; 64];
            match client.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => received.extend_from_slice(&buf[..n]),
                Err(_) => sleep(Duration::from_millis(5)),
            }
        }
        let mut decoder = iobc_iox::FrameDecoder::new();
        let frames = decoder.push(&received);
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].id, well_known::ID_CTRL_START);
        assert_eq!(frames[1].id, well_known::ID_DATA_OUT);
        assert_eq!(frames[1].payload, vec![0x11, 0x22]);
        assert_eq!(frames[2].id, well_known::ID_CTRL_STOP);
    }

    #[test]
    fn mode_switch_while_busy_panics() {
        let tmp = tempfile::tempdir().unwrap();
        let mut t = twi(&tmp, "c");
        t.write(OFF_CR, CR_MSEN);
        t.write(OFF_THR, 0xAA);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            t.write(OFF_CR, CR_MSDIS | CR_MSEN);
        }));
        assert!(result.is_err());
    }
}
