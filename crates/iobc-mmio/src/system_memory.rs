use crate::address_map::{EBI_NCS0_BASE, EBI_NCS0_SIZE, ROM_BASE, ROM_SIZE, SDRAM_BASE, SDRAM_SIZE, SRAM0_BASE, SRAM0_SIZE};
use crate::memory::GuestMemory;

/// The CPU/DMA-addressable half of the address map (spec.md §5: "CPU
/// address space is the only shared resource between the CPU and
/// peripheral DMA"). Distinct from [`crate::MmioBus`], which only ever
/// sees 32-bit-aligned register accesses: DMA is byte-granular and targets
/// ordinary memory, so this does its own, simpler range dispatch rather
/// than going through the bus.
///
/// A cheap-to-clone handle: cloning shares the same underlying
/// [`GuestMemory`] regions, so every peripheral's `Pdc` can hold its own
/// copy.
#[derive(Clone)]
pub struct SystemMemory {
    rom: GuestMemory,
    sram0: GuestMemory,
    ebi_ncs0: GuestMemory,
    sdram: GuestMemory,
}

impl SystemMemory {
    pub fn new(rom: GuestMemory, sram0: GuestMemory, ebi_ncs0: GuestMemory, sdram: GuestMemory) -> Self {
        Self { rom, sram0, ebi_ncs0, sdram }
    }

    fn locate(&self, addr: u32) -> (&GuestMemory, u32) {
        if addr >= ROM_BASE && addr < ROM_BASE + ROM_SIZE as u32 {
            (&self.rom, addr - ROM_BASE)
        } else if addr >= SRAM0_BASE && addr < SRAM0_BASE + SRAM0_SIZE as u32 {
            (&self.sram0, addr - SRAM0_BASE)
        } else if addr >= EBI_NCS0_BASE && addr < EBI_NCS0_BASE + EBI_NCS0_SIZE {
            (&self.ebi_ncs0, addr - EBI_NCS0_BASE)
        } else if addr >= SDRAM_BASE && addr < SDRAM_BASE + SDRAM_SIZE {
            (&self.sdram, addr - SDRAM_BASE)
        } else {
            panic!("DMA access at 0x{addr:08x} targets no mapped memory region");
        }
    }
}

impl iobc_pdc::DmaTarget for SystemMemory {
    fn read_u8(&self, addr: u32) -> u8 {
        let (region, offset) = self.locate(addr);
        region.read_u8(offset)
    }

    fn write_u8(&self, addr: u32, value: u8) {
        let (region, offset) = self.locate(addr);
        region.write_u8(offset, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iobc_pdc::DmaTarget;

    fn fixture() -> SystemMemory {
        SystemMemory::new(
            GuestMemory::new(ROM_SIZE),
            GuestMemory::new(SRAM0_SIZE),
            GuestMemory::new(EBI_NCS0_SIZE as usize),
            GuestMemory::new(SDRAM_SIZE as usize),
        )
    }

    #[test]
    fn routes_absolute_addresses_to_the_right_region() {
        let mem = fixture();
        mem.write_u8(SDRAM_BASE + 4, 0x42);
        assert_eq!(mem.read_u8(SDRAM_BASE + 4), 0x42);
        mem.write_u8(SRAM0_BASE + 1, 0x7);
        assert_eq!(mem.read_u8(SRAM0_BASE + 1), 0x7);
    }

    #[test]
    #[should_panic(expected = "no mapped memory region")]
    fn out_of_range_dma_aborts() {
        let mem = fixture();
        mem.read_u8(0xFFFF_0000);
    }
}
