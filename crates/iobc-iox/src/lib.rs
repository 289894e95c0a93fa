//! External I/O transfer server (spec.md §4.14): the length-delimited
//! framed Unix-socket protocol that bridges emulated peripherals to
//! outside processes, plus the non-blocking listener/client plumbing that
//! drives it from the host event loop.

mod frame;
mod server;

pub use frame::{split_multiframe, Frame, FrameDecoder, SeqCounter, DIR_OUTBOUND};
pub use server::{IoxError, IoxServer};

/// Well-known category/id pairs (spec.md §6).
pub mod well_known {
    pub const CAT_DATA: u8 = 0x01;
    pub const CAT_FAULT: u8 = 0x02;
    pub const CAT_PINSTATE: u8 = 0x01;

    pub const ID_DATA_IN: u8 = 0x01;
    pub const ID_DATA_OUT: u8 = 0x02;
    pub const ID_CTRL_START: u8 = 0x03;
    pub const ID_CTRL_STOP: u8 = 0x04;

    pub const ID_FAULT_OVRE: u8 = 0x01;
    pub const ID_FAULT_FRAME: u8 = 0x02;
    pub const ID_FAULT_PARE: u8 = 0x03;
    pub const ID_FAULT_TIMEOUT: u8 = 0x04;

    pub const ID_FAULT_MODF: u8 = 0x01;
    pub const ID_FAULT_OVRES: u8 = 0x02;

    pub const ID_FAULT_NACK: u8 = 0x02;
    pub const ID_FAULT_ARBLST: u8 = 0x03;

    /// SDRAMC's one fault injection id: a refresh-error condition.
    pub const ID_FAULT_RES: u8 = 0x01;

    pub const ID_PINSTATE_ENABLE: u8 = 0x01;
    pub const ID_PINSTATE_DISABLE: u8 = 0x02;
    pub const ID_PINSTATE_OUT: u8 = 0x03;
    pub const ID_PINSTATE_GET: u8 = 0x04;

    /// USART DATA_IN reply status codes (spec.md §7).
    pub const STATUS_SUCCESS: u32 = 0;
    pub const STATUS_ENXIO: u32 = 6;
}
