//! AT91 TWI register offsets and status bits (spec.md §4.7).

pub const OFF_CR: u32 = 0x00;
pub const OFF_MMR: u32 = 0x04;
pub const OFF_IADR: u32 = 0x0C;
pub const OFF_CWGR: u32 = 0x10;
pub const OFF_SR: u32 = 0x20;
pub const OFF_IER: u32 = 0x24;
pub const OFF_IDR: u32 = 0x28;
pub const OFF_IMR: u32 = 0x2C;
pub const OFF_RHR: u32 = 0x30;
pub const OFF_THR: u32 = 0x34;

pub const OFF_RPR: u32 = 0x100;
pub const OFF_RCR: u32 = 0x104;
pub const OFF_TPR: u32 = 0x108;
pub const OFF_TCR: u32 = 0x10C;
pub const OFF_RNPR: u32 = 0x110;
pub const OFF_RNCR: u32 = 0x114;
pub const OFF_TNPR: u32 = 0x118;
pub const OFF_TNCR: u32 = 0x11C;
pub const OFF_PTCR: u32 = 0x120;
pub const OFF_PTSR: u32 = 0x124;

pub const CR_START: u32 = 1 << 0;
pub const CR_STOP: u32 = 1 << 1;
pub const CR_MSEN: u32 = 1 << 2;
pub const CR_MSDIS: u32 = 1 << 3;
pub const CR_SVEN: u32 = 1 << 4;
pub const CR_SVDIS: u32 = 1 << 5;
pub const CR_SWRST: u32 = 1 << 7;

pub const MMR_IADRSZ_SHIFT: u32 = 8;
pub const MMR_IADRSZ_MASK: u32 = 0x3 << MMR_IADRSZ_SHIFT;
pub const MMR_MREAD: u32 = 1 << 12;
pub const MMR_DADR_SHIFT: u32 = 16;
pub const MMR_DADR_MASK: u32 = 0x7F << MMR_DADR_SHIFT;

pub const SR_TXCOMP: u32 = 1 << 0;
pub const SR_RXRDY: u32 = 1 << 1;
pub const SR_TXRDY: u32 = 1 << 2;
pub const SR_OVRE: u32 = 1 << 6;
pub const SR_NACK: u32 = 1 << 8;
pub const SR_ARBLST: u32 = 1 << 9;
pub const SR_ENDRX: u32 = 1 << 12;
pub const SR_ENDTX: u32 = 1 << 13;
pub const SR_RXBUFF: u32 = 1 << 14;
pub const SR_TXBUFE: u32 = 1 << 15;

/// Host-wall-time debounce window for consolidating single-byte THR writes
/// into one burst (spec.md §4.7, §5): two ticks of the TWI clock, modeled
/// here as two `service()` calls rather than tracking real elapsed time.
pub const THR_DEBOUNCE_TICKS: u32 = 2;
