//! Bus matrix: just the one register spec.md §4.1 actually calls out, MRCR,
//! which selects the bootmem alias target. Real silicon's matrix also
//! carries EBI chip-select assignment and bus arbitration, both out of
//! scope here since nothing in spec.md §3-§4 names them.

use iobc_mmio::{BootmemHandle, BootmemTarget, MmioDevice};

use crate::regs::*;

pub struct Matrix {
    mrcr: u32,
    bootmem: BootmemHandle,
}

impl Matrix {
    pub fn new(bootmem: BootmemHandle, initial: BootmemTarget) -> Self {
        Self { mrcr: Self::encode(initial), bootmem }
    }

    fn encode(target: BootmemTarget) -> u32 {
        match target {
            BootmemTarget::Rom => MATRIX_MRCR_ALIAS_ROM,
            BootmemTarget::Sram0 => MATRIX_MRCR_ALIAS_SRAM0,
            BootmemTarget::Ebi0 => MATRIX_MRCR_ALIAS_EBI0,
        }
    }

    fn decode(field: u32) -> BootmemTarget {
        match field & MATRIX_MRCR_ALIAS_MASK {
            MATRIX_MRCR_ALIAS_ROM => BootmemTarget::Rom,
            MATRIX_MRCR_ALIAS_SRAM0 => BootmemTarget::Sram0,
            MATRIX_MRCR_ALIAS_EBI0 => BootmemTarget::Ebi0,
            other => panic!("Matrix: MRCR alias field 0x{other:x} is reserved"),
        }
    }

    /// The BMS-pin-derived value to construct with; `Soc::reset()` does not
    /// touch this register (reset leaves the alias as the board's boot
    /// strapping set it, not back to a fixed default).
    pub fn reset_registers(&mut self) {}

    pub fn clear_buffers(&mut self) {}
}

impl MmioDevice for Matrix {
    fn read(&mut self, offset: u32) -> u32 {
        match offset {
            OFF_MATRIX_MRCR => self.mrcr,
            _ => panic!("Matrix: read of unimplemented register at +0x{offset:x}"),
        }
    }

    fn write(&mut self, offset: u32, value: u32) {
        match offset {
            OFF_MATRIX_MRCR => {
                self.mrcr = value & MATRIX_MRCR_ALIAS_MASK;
                self.bootmem.set_target(Self::decode(self.mrcr));
            }
            _ => panic!("Matrix: write of unimplemented register at +0x{offset:x} (value=0x{value:x})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iobc_mmio::{Bootmem, GuestMemory};

    fn fixture() -> (Matrix, BootmemHandle) {
        let bootmem = BootmemHandle::new(Bootmem::new(
            GuestMemory::new(0x1000),
            GuestMemory::new(0x1000),
            GuestMemory::new(0x1000),
            BootmemTarget::Rom,
        ));
        (Matrix::new(bootmem.clone(), BootmemTarget::Rom), bootmem)
    }

    #[test]
    fn mrcr_write_flips_the_bootmem_alias() {
        let (mut m, bootmem) = fixture();
        m.write(OFF_MATRIX_MRCR, MATRIX_MRCR_ALIAS_SRAM0);
        assert_eq!(bootmem.target(), BootmemTarget::Sram0);
        assert_eq!(m.read(OFF_MATRIX_MRCR), MATRIX_MRCR_ALIAS_SRAM0);
    }

    #[test]
    #[should_panic(expected = "reserved")]
    fn unused_alias_encoding_panics() {
        let (mut m, _bootmem) = fixture();
        m.write(OFF_MATRIX_MRCR, 0x3);
    }
}
