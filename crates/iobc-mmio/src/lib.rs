//! The MMIO fabric: the single routing point every CPU load/store passes
//! through, plus the bootmem alias and the reserved/unimplemented catch-alls
//! (spec.md §4.1, §4.2).

pub mod address_map;
mod bootmem;
mod bus;
mod device;
mod error;
mod memory;
mod system_memory;

pub use bootmem::{Bootmem, BootmemHandle, BootmemTarget};
pub use bus::MmioBus;
pub use device::{MmioDevice, ReservedRegion, UnimplementedPolicy, UnimplementedRegion};
pub use error::MmioAbort;
pub use memory::GuestMemory;
pub use system_memory::SystemMemory;
