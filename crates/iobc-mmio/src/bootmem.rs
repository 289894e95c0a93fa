use std::cell::RefCell;
use std::rc::Rc;

use crate::device::MmioDevice;
use crate::memory::GuestMemory;

/// The three collaborators the `0x0000_0000..0x0010_0000` bootmem window can
/// alias to, per spec.md §4.1. Selection is driven by the Matrix MRCR
/// register (owned by `iobc-sysctl`) and the initial BMS pin state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootmemTarget {
    Rom,
    Sram0,
    Ebi0,
}

/// The bootmem alias itself. `set_target` is a single-field write, so the
/// transition from one alias to another is atomic from the bus's point of
/// view: there is no intermediate state in which a read could see neither
/// (or both) of the old/new targets.
pub struct Bootmem {
    target: BootmemTarget,
    rom: GuestMemory,
    sram0: GuestMemory,
    ebi0: GuestMemory,
}

impl Bootmem {
    pub fn new(rom: GuestMemory, sram0: GuestMemory, ebi0: GuestMemory, initial: BootmemTarget) -> Self {
        Self { target: initial, rom, sram0, ebi0 }
    }

    pub fn set_target(&mut self, target: BootmemTarget) {
        self.target = target;
    }

    pub fn target(&self) -> BootmemTarget {
        self.target
    }

    fn backing(&self) -> &GuestMemory {
        match self.target {
            BootmemTarget::Rom => &self.rom,
            BootmemTarget::Sram0 => &self.sram0,
            BootmemTarget::Ebi0 => &self.ebi0,
        }
    }
}

impl MmioDevice for Bootmem {
    fn read(&mut self, offset: u32) -> u32 {
        self.backing().read_u32(offset)
    }

    fn write(&mut self, offset: u32, value: u32) {
        match self.target {
            // Real silicon ignores writes to the boot ROM alias; this is not
            // a flight-software contract violation worth aborting over.
            BootmemTarget::Rom => {
                tracing::warn!(offset, value, "write to bootmem aliased onto ROM ignored");
            }
            BootmemTarget::Sram0 | BootmemTarget::Ebi0 => self.backing().write_u32(offset, value),
        }
    }
}

/// A shared handle to the bootmem alias, cloned into `iobc-sysctl`'s Matrix
/// model so a Matrix MRCR write can flip the alias target without owning
/// the bus's copy of `Bootmem` outright.
#[derive(Clone)]
pub struct BootmemHandle(Rc<RefCell<Bootmem>>);

impl BootmemHandle {
    pub fn new(bootmem: Bootmem) -> Self {
        Self(Rc::new(RefCell::new(bootmem)))
    }

    pub fn set_target(&self, target: BootmemTarget) {
        self.0.borrow_mut().set_target(target);
    }

    pub fn target(&self) -> BootmemTarget {
        self.0.borrow().target()
    }
}

impl MmioDevice for BootmemHandle {
    fn read(&mut self, offset: u32) -> u32 {
        self.0.borrow_mut().read(offset)
    }

    fn write(&mut self, offset: u32, value: u32) {
        self.0.borrow_mut().write(offset, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mem_filled(size: usize, seed: u8) -> GuestMemory {
        let m = GuestMemory::new(size);
        for i in 0..size as u32 {
            m.write_u8(i, seed.wrapping_add(i as u8));
        }
        m
    }

    /// spec.md §8 invariant 1: reading through the bootmem alias matches
    /// reading the aliased target directly, for every possible target.
    #[test]
    fn alias_matches_target_for_every_selection() {
        let rom = mem_filled(0x1000, 0x10);
        let sram0 = mem_filled(0x1000, 0x20);
        let ebi0 = mem_filled(0x1000, 0x30);

        for target in [BootmemTarget::Rom, BootmemTarget::Sram0, BootmemTarget::Ebi0] {
            let mut boot = Bootmem::new(rom.clone(), sram0.clone(), ebi0.clone(), target);
            let direct = match target {
                BootmemTarget::Rom => &rom,
                BootmemTarget::Sram0 => &sram0,
                BootmemTarget::Ebi0 => &ebi0,
            };
            for offset in [0u32, 4, 0x100, 0xffc] {
                assert_eq!(boot.read(offset), direct.read_u32(offset));
            }
        }
    }

    #[test]
    fn switching_target_is_immediately_observable() {
        let rom = mem_filled(0x1000, 1);
        let sram0 = mem_filled(0x1000, 2);
        let ebi0 = mem_filled(0x1000, 3);
        let mut boot = Bootmem::new(rom, sram0.clone(), ebi0, BootmemTarget::Rom);
        boot.set_target(BootmemTarget::Sram0);
        assert_eq!(boot.read(0), sram0.read_u32(0));
    }
}
