//! SDRAM Controller: a small parameter register file plus the one fault an
//! external client can inject (spec.md §6: `SDRAMC | FAULT/RES`) — a
//! refresh error, surfaced as ISR.RES and an interrupt if unmasked.

use iobc_aic::IrqLine;
use iobc_iox::{well_known, IoxServer};
use iobc_mmio::MmioDevice;

use crate::regs::*;

pub struct Sdramc {
    mr: u32,
    tr: u32,
    cr: u32,
    lpr: u32,
    isr: u32,
    imr: u32,
    irq: IrqLine,
    iox: IoxServer,
}

impl Sdramc {
    pub fn new(irq: IrqLine, iox: IoxServer) -> Self {
        Self { mr: 0, tr: 0, cr: 0, lpr: 0, isr: 0, imr: 0, irq, iox }
    }

    pub fn reset_registers(&mut self) {
        self.mr = 0;
        self.tr = 0;
        self.cr = 0;
        self.lpr = 0;
        self.isr = 0;
        self.imr = 0;
        self.irq.set(false);
    }

    pub fn clear_buffers(&mut self) {
        self.isr = 0;
    }

    fn update_irq(&mut self) {
        self.irq.set(self.isr & self.imr != 0);
    }

    pub fn service(&mut self) {
        let frames = self.iox.poll().expect("IOX socket error is unrecoverable (spec.md §7 regime 3)");
        for frame in frames {
            if frame.cat == well_known::CAT_FAULT && frame.id == well_known::ID_FAULT_RES {
                self.isr |= SDRAMC_ISR_RES;
                self.update_irq();
            } else {
                tracing::warn!(cat = frame.cat, id = frame.id, "SDRAMC: unknown IOX frame");
            }
        }
    }
}

impl MmioDevice for Sdramc {
    fn read(&mut self, offset: u32) -> u32 {
        match offset {
            OFF_SDRAMC_MR => self.mr,
            OFF_SDRAMC_TR => self.tr,
            OFF_SDRAMC_CR => self.cr,
            OFF_SDRAMC_LPR => self.lpr,
            OFF_SDRAMC_IMR => self.imr,
            OFF_SDRAMC_ISR => {
                let v = self.isr;
                self.isr = 0;
                self.update_irq();
                v
            }
            OFF_SDRAMC_IER | OFF_SDRAMC_IDR => panic!("SDRAMC: read of write-only register at +0x{offset:x}"),
            _ => panic!("SDRAMC: read of unimplemented register at +0x{offset:x}"),
        }
    }

    fn write(&mut self, offset: u32, value: u32) {
        match offset {
            OFF_SDRAMC_MR => self.mr = value,
            OFF_SDRAMC_TR => self.tr = value,
            OFF_SDRAMC_CR => self.cr = value,
            OFF_SDRAMC_LPR => self.lpr = value,
            OFF_SDRAMC_IER => {
                self.imr |= value;
                self.update_irq();
            }
            OFF_SDRAMC_IDR => {
                self.imr &= !value;
                self.update_irq();
            }
            OFF_SDRAMC_IMR | OFF_SDRAMC_ISR => {
                panic!("SDRAMC: write of read-only register at +0x{offset:x} (value=0x{value:x})")
            }
            _ => panic!("SDRAMC: write of unimplemented register at +0x{offset:x} (value=0x{value:x})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iobc_aic::{Aic, AicHandle};

    fn sdramc(name: &str) -> (Sdramc, std::path::PathBuf, tempfile::TempDir) {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(name);
        let handle = AicHandle::new(Aic::new());
        let iox = IoxServer::bind(&path).unwrap();
        (Sdramc::new(handle.line(5), iox), path, tmp)
    }

    #[test]
    fn injected_fault_sets_res_and_raises_irq() {
        let (mut s, path, _tmp) = sdramc("sdramc_fault");
        s.write(OFF_SDRAMC_IER, SDRAMC_ISR_RES);

        let mut client = std::os::unix::net::UnixStream::connect(&path).unwrap();
        use std::io::Write;
        client.write_all(&[0x00, well_known::CAT_FAULT, well_known::ID_FAULT_RES, 0]).unwrap();
        s.service();

        assert_eq!(s.read(OFF_SDRAMC_ISR) & SDRAMC_ISR_RES, SDRAMC_ISR_RES);
        assert_eq!(s.read(OFF_SDRAMC_ISR), 0, "ISR read clears it");
    }
}
