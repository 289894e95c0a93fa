/// Errors the bus itself detects before dispatching to a region. These are
/// always programming errors in the emulated firmware (spec.md §7 regime 1)
/// and the bus aborts on them rather than returning a value.
#[derive(Debug, thiserror::Error)]
pub enum MmioAbort {
    #[error("unaligned or non-32-bit mmio access at 0x{addr:08x} (size={size})")]
    Misaligned { addr: u32, size: u8 },
    #[error("no peripheral mapped at address 0x{addr:08x}")]
    Unmapped { addr: u32 },
}
