/// A peripheral's MMIO-facing half: every register file in the SoC implements
/// this over its own (already address-relative) offset range. `offset` is
/// always 32-bit aligned; the bus guarantees that before dispatch.
pub trait MmioDevice {
    fn read(&mut self, offset: u32) -> u32;
    fn write(&mut self, offset: u32, value: u32);
}

/// A reserved address region per the AT91SAM9G20 memory map: any access at
/// all is a flight-software bug, so it aborts with location info rather than
/// silently tolerating it (spec.md §4.2, §7 regime 1).
pub struct ReservedRegion {
    name: &'static str,
}

impl ReservedRegion {
    pub fn new(name: &'static str) -> Self {
        Self { name }
    }
}

impl MmioDevice for ReservedRegion {
    fn read(&mut self, offset: u32) -> u32 {
        panic!("reserved region `{}` read at +0x{offset:x}", self.name);
    }

    fn write(&mut self, offset: u32, value: u32) {
        panic!("reserved region `{}` write at +0x{offset:x} (value=0x{value:x})", self.name);
    }
}

/// What an `UnimplementedRegion` does on access: either it behaves like
/// "not wired up yet" (warn, read as zero) so unrelated firmware can still
/// boot, or it behaves like a reserved region (abort), for peripherals whose
/// omission would silently produce wrong results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnimplementedPolicy {
    WarnZero,
    Abort,
}

pub struct UnimplementedRegion {
    name: &'static str,
    policy: UnimplementedPolicy,
}

impl UnimplementedRegion {
    pub fn new(name: &'static str, policy: UnimplementedPolicy) -> Self {
        Self { name, policy }
    }
}

impl MmioDevice for UnimplementedRegion {
    fn read(&mut self, offset: u32) -> u32 {
        match self.policy {
            UnimplementedPolicy::WarnZero => {
                tracing::warn!(region = self.name, offset, "read from unimplemented region");
                0
            }
            UnimplementedPolicy::Abort => {
                panic!("unimplemented region `{}` read at +0x{offset:x}", self.name)
            }
        }
    }

    fn write(&mut self, offset: u32, value: u32) {
        match self.policy {
            UnimplementedPolicy::WarnZero => {
                tracing::warn!(region = self.name, offset, value, "write to unimplemented region");
            }
            UnimplementedPolicy::Abort => {
                panic!("unimplemented region `{}` write at +0x{offset:x} (value=0x{value:x})", self.name)
            }
        }
    }
}
