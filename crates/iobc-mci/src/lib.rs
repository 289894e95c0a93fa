//! The SD/MMC controller (spec.md §4.8): command dispatch through a
//! generic [`SdBus`], and a block data path drained either through the PDC
//! or through the RDR/TDR flow-controlled register path.

mod regs;
mod sdbus;

use iobc_aic::IrqLine;
use iobc_mmio::MmioDevice;
use iobc_pdc::{DmaTarget, Pdc};
use regs::*;
pub use sdbus::{FileSdBus, SdBus, SECTOR_SIZE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Read,
    Write,
}

struct Transfer {
    dir: Direction,
    /// `None` means unbounded (multi-block infinite, BCNT=0).
    remaining: Option<u32>,
    block_len: u32,
    lba: u32,
    byte_in_block: u32,
    pdc_mode: bool,
}

pub struct Mci {
    index: usize,
    enabled: bool,
    mr: u32,
    dtor: u32,
    sdcr: u32,
    argr: u32,
    blkr: u32,
    rspr: [u32; 4],
    rdr_queue: std::collections::VecDeque<u8>,
    tdr_queue: Vec<u8>,
    sr: u32,
    imr: u32,
    selected_card: u8,
    drives: [Option<Box<dyn SdBus>>; 2],
    transfer: Option<Transfer>,
    pdc: Pdc,
    irq: IrqLine,
}

impl Mci {
    pub fn new(index: usize, irq: IrqLine) -> Self {
        Self {
            index,
            enabled: false,
            mr: 0,
            dtor: 0,
            sdcr: 0,
            argr: 0,
            blkr: 0,
            rspr: [0; 4],
            rdr_queue: std::collections::VecDeque::new(),
            tdr_queue: Vec::new(),
            sr: SR_CMDRDY | SR_TXRDY,
            imr: 0,
            selected_card: 0,
            drives: [None, None],
            transfer: None,
            pdc: Pdc::new(false),
            irq,
        }
    }

    pub fn attach_drive(&mut self, index: u8, drive: Box<dyn SdBus>) {
        self.drives[index as usize] = Some(drive);
    }

    /// Wired from PIOB bit 7 (spec.md §4.8: "card selection is toggled
    /// through a GPIO input ... because two SD cards share slot A
    /// electrically").
    pub fn set_selected_card(&mut self, card: u8) {
        self.selected_card = card & 1;
    }

    /// Phase 1 of SoC reset. `selected_card` is deliberately NOT reset
    /// here: spec.md §4.8 states it "is preserved across MCI-only resets".
    pub fn reset_registers(&mut self) {
        self.enabled = false;
        self.mr = 0;
        self.dtor = 0;
        self.sdcr = 0;
        self.argr = 0;
        self.blkr = 0;
        self.rspr = [0; 4];
        self.tdr_queue.clear();
        self.sr = SR_CMDRDY | SR_TXRDY;
        self.imr = 0;
        self.transfer = None;
        self.pdc.reset();
        self.irq.set(false);
    }

    pub fn clear_buffers(&mut self) {
        self.rdr_queue.clear();
    }

    fn update_irq(&mut self) {
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
        self.irq.set(v & self.imr != 0);
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

    fn do_cr(&mut self, value: u32) {
        if value & CR_SWRST != 0 {
            let saved = self.selected_card;
            self.reset_registers();
            self.selected_card = saved;
            return;
        }
        if value & CR_MCIEN != 0 {
            self.enabled = true;
        }
        if value & CR_MCIDIS != 0 {
            self.enabled = false;
        }
    }

    fn total_bytes(&self, trtyp: u32) -> Option<u32> {
        let blklen = self.blkr & 0xFFFF;
        let bcnt = (self.blkr >> 16) & 0xFFFF;
        match trtyp {
            TRTYP_SINGLE_BLOCK => Some(blklen),
            TRTYP_MULTIPLE_BLOCK => {
                if bcnt == 0 {
                    None
                } else {
                    Some(blklen * bcnt)
                }
            }
            TRTYP_SDIO_BYTE => Some(bcnt),
            TRTYP_SDIO_BLOCK => Some(blklen * bcnt),
            _ => Some(blklen),
        }
    }

    fn write_cmdr(&mut self, value: u32) {
        let cmd = (value & CMDR_CMDNB_MASK) as u8;
        let rsptyp = (value & CMDR_RSPTYP_MASK) >> CMDR_RSPTYP_SHIFT;
        let trcmd = (value & CMDR_TRCMD_MASK) >> CMDR_TRCMD_SHIFT;
        let trdir = value & CMDR_TRDIR != 0;
        let trtyp = (value & CMDR_TRTYP_MASK) >> CMDR_TRTYP_SHIFT;

        self.sr &= !(SR_RTOE | SR_RINDE | SR_RDIRE | SR_RCRCE | SR_RENDE);
        let response = self
            .drives
            .get_mut(self.selected_card as usize)
            .and_then(|d| d.as_mut())
            .and_then(|bus| bus.command(cmd, self.argr));

        match response {
            None => {
                self.sr |= SR_RTOE;
                self.rspr = [0; 4];
            }
            Some(bytes) => {
                self.rspr = [0; 4];
                let expected = match rsptyp {
                    0 => 0,
                    2 => 16,
                    _ => 4,
                };
                for (i, chunk) in bytes.chunks(4).take(4).enumerate() {
                    let mut word = [0u8; 4];
                    word[..chunk.len()].copy_from_slice(chunk);
                    self.rspr[i] = u32::from_be_bytes(word);
                }
                if bytes.len() != expected {
                    self.sr |= SR_RENDE;
                }
            }
        }
        self.sr |= SR_CMDRDY;

        if trcmd == TRCMD_START {
            let blklen = self.blkr & 0xFFFF;
            let pdc_mode = self.pdc.read_ptsr() & 0x101 != 0;
            if pdc_mode && self.mr & MR_PDCFBYTE == 0 && blklen % 4 != 0 {
                panic!("MCI{}: PDC mode without PDCFBYTE requires BLKLEN a multiple of 4, got {blklen}", self.index);
            }
            self.transfer = Some(Transfer {
                dir: if trdir { Direction::Read } else { Direction::Write },
                remaining: self.total_bytes(trtyp),
                block_len: blklen.max(1),
                lba: self.argr,
                byte_in_block: 0,
                pdc_mode,
            });
            self.sr &= !SR_BLKE;
        }
        self.update_irq();
    }

    fn drive(&mut self) -> Option<&mut Box<dyn SdBus>> {
        self.drives[self.selected_card as usize].as_mut()
    }

    /// Services at most one block's worth of transfer per call.
    pub fn service(&mut self, mem: &dyn DmaTarget) {
        let Some(mut t) = self.transfer.take() else {
            return;
        };
        let at_boundary = t.byte_in_block == 0;
        match t.dir {
            Direction::Read => {
                if at_boundary {
                    let mut buf = vec![0u8; t.block_len as usize];
                    if let Some(drive) = self.drive() {
                        drive.read_sector(t.lba, &mut buf);
                    }
                    if t.pdc_mode {
                        self.pdc.rx_put(mem, &buf);
                    } else {
                        self.rdr_queue.extend(buf);
                        self.sr |= SR_RXRDY;
                    }
                }
                t.byte_in_block += t.block_len;
            }
            Direction::Write => {
                if t.pdc_mode {
                    let bytes = self.pdc.tx_take(mem, t.block_len as usize - self.tdr_queue.len());
                    self.tdr_queue.extend(bytes);
                }
                if self.tdr_queue.len() as u32 >= t.block_len {
                    let buf: Vec<u8> = self.tdr_queue.drain(..t.block_len as usize).collect();
                    if let Some(drive) = self.drive() {
                        drive.write_sector(t.lba, &buf);
                    }
                    t.byte_in_block += t.block_len;
                    self.sr |= SR_BLKE;
                }
            }
        }

        if let Some(remaining) = &mut t.remaining {
            *remaining = remaining.saturating_sub(t.block_len);
            if *remaining == 0 {
                if t.dir == Direction::Read {
                    self.sr |= SR_BLKE;
                }
                self.update_irq();
                return;
            }
        }
        t.lba += 1;
        t.byte_in_block = 0;
        self.transfer = Some(t);
        self.update_irq();
    }
}

impl MmioDevice for Mci {
    fn read(&mut self, offset: u32) -> u32 {
        match offset {
            OFF_MR => self.mr,
            OFF_DTOR => self.dtor,
            OFF_SDCR => self.sdcr,
            OFF_ARGR => self.argr,
            OFF_BLKR => self.blkr,
            OFF_RSPR0 => self.rspr[0],
            OFF_RSPR1 => self.rspr[1],
            OFF_RSPR2 => self.rspr[2],
            OFF_RSPR3 => self.rspr[3],
            OFF_RDR => {
                let v = self.rdr_queue.pop_front().unwrap_or(0);
                if self.rdr_queue.is_empty() {
                    self.sr &= !SR_RXRDY;
                }
                v as u32
            }
            OFF_SR => self.status(),
            OFF_IMR => self.imr,
            OFF_RPR => self.pdc.read_rpr(),
            OFF_RCR => self.pdc.read_rcr(),
            OFF_TPR => self.pdc.read_tpr(),
            OFF_TCR => self.pdc.read_tcr(),
            OFF_RNPR => self.pdc.read_rnpr(),
            OFF_RNCR => self.pdc.read_rncr(),
            OFF_TNPR => self.pdc.read_tnpr(),
            OFF_TNCR => self.pdc.read_tncr(),
            OFF_PTSR => self.pdc.read_ptsr(),
            OFF_CR | OFF_CMDR | OFF_TDR | OFF_IER | OFF_IDR | OFF_PTCR => {
                panic!("MCI{}: read of write-only register at +0x{offset:x}", self.index)
            }
            _ => panic!("MCI{}: read of unimplemented register at +0x{offset:x}", self.index),
        }
    }

    fn write(&mut self, offset: u32, value: u32) {
        match offset {
            OFF_CR => self.do_cr(value),
            OFF_MR => self.mr = value,
            OFF_DTOR => self.dtor = value,
            OFF_SDCR => self.sdcr = value,
            OFF_ARGR => self.argr = value,
            OFF_CMDR => self.write_cmdr(value),
            OFF_BLKR => self.blkr = value,
            OFF_TDR => {
                self.tdr_queue.push(value as u8);
            }
            OFF_IER => {
                self.imr |= value;
                self.update_irq();
            }
            OFF_IDR => {
                self.imr &= !value;
                self.update_irq();
            }
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
            OFF_RSPR0 | OFF_RSPR1 | OFF_RSPR2 | OFF_RSPR3 | OFF_RDR | OFF_SR | OFF_IMR | OFF_PTSR => {
                panic!("MCI{}: write of read-only register at +0x{offset:x} (value=0x{value:x})", self.index)
            }
            _ => panic!("MCI{}: write of unimplemented register at +0x{offset:x} (value=0x{value:x})", self.index),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iobc_aic::{Aic, AicHandle};
    use std::cell::RefCell;

    struct FlatMem(RefCell<Vec<u8>>);
    impl DmaTarget for FlatMem {
        fn read_u8(&self, addr: u32) -> u8 {
            self.0.borrow()[addr as usize]
        }
        fn write_u8(&self, addr: u32, value: u8) {
            self.0.borrow_mut()[addr as usize] = value;
        }
    }

    struct StubBus {
        image: Vec<u8>,
    }
    impl SdBus for StubBus {
        fn command(&mut self, _cmd: u8, _arg: u32) -> Option<Vec<u8>> {
            Some(vec![0, 0, 0, 0])
        }
        fn read_sector(&mut self, lba: u32, buf: &mut [u8]) {
            let o = lba as usize * SECTOR_SIZE;
            buf.copy_from_slice(&self.image[o..o + buf.len()]);
        }
        fn write_sector(&mut self, lba: u32, buf: &[u8]) {
            let o = lba as usize * SECTOR_SIZE;
            self.image[o..o + buf.len()].copy_from_slice(buf);
        }
    }

    fn mci() -> Mci {
        let handle = AicHandle::new(Aic::new());
        let mut m = Mci::new(0, handle.line(6));
        m.attach_drive(0, Box::new(StubBus { image: vec![0xEE; SECTOR_SIZE * 4] }));
        m
    }

    #[test]
    fn selected_card_survives_mci_reset() {
        let mut m = mci();
        m.set_selected_card(1);
        m.write(OFF_CR, CR_SWRST);
        assert_eq!(m.selected_card, 1);
    }

    #[test]
    fn command_times_out_when_no_card_attached() {
        let mut m = mci();
        m.set_selected_card(1); // no drive attached at index 1
        m.write(OFF_ARGR, 0);
        m.write(OFF_CMDR, 17);
        assert_eq!(m.read(OFF_SR) & SR_RTOE, SR_RTOE);
    }

    #[test]
    fn pdc_mode_non_multiple_of_4_blklen_aborts() {
        let mut m = mci();
        m.write(OFF_BLKR, 511); // not a multiple of 4
        m.write(OFF_PTCR, 1); // RXTEN
        m.write(OFF_RCR, 512);
        let cmdr = TRCMD_START << CMDR_TRCMD_SHIFT | (1 << CMDR_TRDIR.trailing_zeros());
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            m.write(OFF_CMDR, cmdr);
        }));
        assert!(result.is_err());
    }

    #[test]
    fn single_block_read_drains_through_rdr_without_pdc() {
        let mut m = mci();
        m.write(OFF_BLKR, 512);
        let cmdr = (TRCMD_START << CMDR_TRCMD_SHIFT) | CMDR_TRDIR;
        m.write(OFF_CMDR, cmdr);
        let mem = FlatMem(RefCell::new(vec![0u8; 16]));
        m.service(&mem);
        assert_eq!(m.read(OFF_SR) & SR_RXRDY, SR_RXRDY);
        assert_eq!(m.read(OFF_RDR) as u8, 0xEE);
        assert_eq!(m.read(OFF_SR) & SR_BLKE, SR_BLKE, "single block completes immediately");
    }
}
