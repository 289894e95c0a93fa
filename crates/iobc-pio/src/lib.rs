//! 32-pin GPIO controller with peripheral muxing and edge-detected IRQ
//! (spec.md §4.12). Three instances exist on-chip (PIOA/B/C); each owns an
//! IOX server that exposes and accepts the full 32-bit pin-state vector for
//! external observation/injection.

mod regs;

use iobc_aic::IrqLine;
use iobc_iox::{well_known, IoxServer};
use iobc_mmio::MmioDevice;
use regs::*;

pub struct Pio {
    index: usize,
    /// 1 = pin is PIO-owned, 0 = pin is driven by peripheral A/B (ABSR).
    psr: u32,
    /// 1 = peripheral B selected for a peripheral-owned pin (ABSR).
    absr: u32,
    /// 1 = PIO-owned pin configured as output (OSR).
    osr: u32,
    /// Output Write Status: which ODSR bits a SODR/CODR write actually moves.
    owsr: u32,
    odsr: u32,
    /// Last computed PDSR, kept to detect edges into ISR.
    pdsr: u32,
    /// Pins the external client currently drives via PINSTATE_OUT.
    externally_driven: u32,
    external_input: u32,
    isr: u32,
    imr: u32,
    irq: IrqLine,
    iox: IoxServer,
}

impl Pio {
    pub fn new(index: usize, irq: IrqLine, iox: IoxServer) -> Self {
        Self {
            index,
            psr: 0,
            absr: 0,
            osr: 0,
            owsr: 0,
            odsr: 0,
            pdsr: 0,
            externally_driven: 0,
            external_input: 0,
            isr: 0,
            imr: 0,
            irq,
            iox,
        }
    }

    pub fn reset_registers(&mut self) {
        self.psr = 0;
        self.absr = 0;
        self.osr = 0;
        self.owsr = 0;
        self.odsr = 0;
        self.isr = 0;
        self.imr = 0;
        self.pdsr = self.compute_pdsr();
        self.irq.set(false);
    }

    pub fn clear_buffers(&mut self) {
        self.externally_driven = 0;
        self.external_input = 0;
        self.isr = 0;
    }

    /// Re-emits the current pin-state vector outbound, the init-derived
    /// frame spec.md §9's two-phase reset calls for.
    pub fn emit_initial_state(&mut self) {
        let v = self.pdsr;
        self.iox.send(well_known::CAT_PINSTATE, well_known::ID_PINSTATE_GET, &v.to_le_bytes());
    }

    /// Current electrical pin-state vector, for cross-peripheral wiring
    /// (e.g. `Soc` reading PIOB bit 7 to drive MCI's card-select mux).
    pub fn pdsr(&self) -> u32 {
        self.pdsr
    }

    /// Effective electrical level of each pin: for PIO-owned output pins,
    /// ODSR; for PIO-owned input pins driven by the external client,
    /// `external_input`; everything else (peripheral-owned, or undriven
    /// PIO input) reads as 0.
    fn compute_pdsr(&self) -> u32 {
        let output_pins = self.psr & self.osr;
        let input_pins = self.psr & !self.osr;
        (output_pins & self.odsr) | (input_pins & self.externally_driven & self.external_input)
    }

    fn update_pdsr_and_isr(&mut self) {
        let new = self.compute_pdsr();
        let changed = new ^ self.pdsr;
        self.isr |= changed;
        self.pdsr = new;
        self.update_irq();
    }

    fn update_irq(&mut self) {
        self.irq.set(self.isr & self.imr != 0);
    }

    pub fn service(&mut self) {
        let frames = self.iox.poll().expect("IOX socket error is unrecoverable (spec.md §7 regime 3)");
        for frame in frames {
            if frame.cat != well_known::CAT_PINSTATE {
                continue;
            }
            let mask = frame.payload.get(..4).map(|b| u32::from_le_bytes(b.try_into().unwrap())).unwrap_or(0);
            match frame.id {
                id if id == well_known::ID_PINSTATE_ENABLE => self.externally_driven |= mask,
                id if id == well_known::ID_PINSTATE_DISABLE => self.externally_driven &= !mask,
                id if id == well_known::ID_PINSTATE_OUT => {
                    self.external_input = mask;
                    self.update_pdsr_and_isr();
                }
                id if id == well_known::ID_PINSTATE_GET => {
                    let v = self.pdsr;
                    self.iox.respond(frame.seq, well_known::CAT_PINSTATE, well_known::ID_PINSTATE_GET, &v.to_le_bytes());
                }
                _ => tracing::warn!(pio = self.index, id = frame.id, "unknown PINSTATE frame id"),
            }
        }
    }
}

impl MmioDevice for Pio {
    fn read(&mut self, offset: u32) -> u32 {
        match offset {
            OFF_PSR => self.psr,
            OFF_OSR => self.osr,
            OFF_OWSR => self.owsr,
            OFF_ODSR => self.odsr,
            OFF_PDSR => self.pdsr,
            OFF_ABSR => self.absr,
            OFF_IMR => self.imr,
            OFF_ISR => {
                let v = self.isr;
                self.isr = 0;
                self.update_irq();
                v
            }
            OFF_PER | OFF_PDR | OFF_OER | OFF_ODR | OFF_SODR | OFF_CODR | OFF_IER | OFF_IDR | OFF_OWER | OFF_OWDR => {
                panic!("PIO{}: read of write-only register at +0x{offset:x}", self.index)
            }
            _ => panic!("PIO{}: read of unimplemented register at +0x{offset:x}", self.index),
        }
    }

    fn write(&mut self, offset: u32, value: u32) {
        match offset {
            OFF_PER => {
                self.psr |= value;
                self.update_pdsr_and_isr();
            }
            OFF_PDR => {
                self.psr &= !value;
                self.update_pdsr_and_isr();
            }
            OFF_OER => {
                self.osr |= value;
                self.update_pdsr_and_isr();
            }
            OFF_ODR => {
                self.osr &= !value;
                self.update_pdsr_and_isr();
            }
            OFF_SODR => {
                self.odsr |= value & self.owsr;
                self.update_pdsr_and_isr();
            }
            OFF_CODR => {
                self.odsr &= !(value & self.owsr);
                self.update_pdsr_and_isr();
            }
            OFF_ODSR => {
                self.odsr = (self.odsr & !self.owsr) | (value & self.owsr);
                self.update_pdsr_and_isr();
            }
            OFF_ABSR => {
                self.absr = value;
                self.update_pdsr_and_isr();
            }
            OFF_IER => {
                self.imr |= value;
                self.update_irq();
            }
            OFF_IDR => {
                self.imr &= !value;
                self.update_irq();
            }
            OFF_OWER => self.owsr |= value,
            OFF_OWDR => self.owsr &= !value,
            OFF_PSR | OFF_OSR | OFF_OWSR | OFF_PDSR | OFF_IMR | OFF_ISR => {
                panic!("PIO{}: write of read-only register at +0x{offset:x} (value=0x{value:x})", self.index)
            }
            _ => panic!("PIO{}: write of unimplemented register at +0x{offset:x} (value=0x{value:x})", self.index),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iobc_aic::{Aic, AicHandle};

    fn pio(name: &str) -> (Pio, std::path::PathBuf, tempfile::TempDir) {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(name);
        let handle = AicHandle::new(Aic::new());
        let iox = IoxServer::bind(&path).unwrap();
        (Pio::new(0, handle.line(3), iox), path, tmp)
    }

    #[test]
    fn output_write_is_masked_by_owsr() {
        let (mut p, _path, _tmp) = pio("pioa_mask");
        p.write(OFF_PER, 0b11);
        p.write(OFF_OER, 0b11);
        p.write(OFF_OWER, 0b01); // only bit 0 writable via ODSR/SODR/CODR
        p.write(OFF_SODR, 0b11);
        assert_eq!(p.read(OFF_ODSR), 0b01);
        assert_eq!(p.read(OFF_PDSR), 0b01);
    }

    #[test]
    fn output_change_sets_isr_bit() {
        let (mut p, _path, _tmp) = pio("pioa_isr");
        p.write(OFF_IER, 0xFFFF_FFFF);
        p.write(OFF_PER, 1);
        p.write(OFF_OER, 1);
        p.write(OFF_OWER, 1);
        assert_eq!(p.read(OFF_ISR), 1, "PER/OER/OWER wiring already toggled PDSR once");
        p.write(OFF_SODR, 1);
        assert_eq!(p.read(OFF_ISR), 1);
        assert_eq!(p.read(OFF_ISR), 0, "ISR read clears it");
    }

    #[test]
    fn external_client_drives_an_input_pin() {
        let (mut p, path, _tmp) = pio("pioa_ext");
        p.write(OFF_PER, 1); // PIO-owned, input by default (OSR bit clear)

        let mut client = std::os::unix::net::UnixStream::connect(&path).unwrap();
        use std::io::Write;
        // ENABLE mask=1
        client.write_all(&[0x00, 0x01, 0x01, 0x04, 1, 0, 0, 0]).unwrap();
        p.service();
        // OUT mask=1 (drive pin high)
        client.write_all(&[0x01, 0x01, 0x03, 0x04, 1, 0, 0, 0]).unwrap();
        p.service();
        assert_eq!(p.read(OFF_PDSR) & 1, 1);
    }
}
