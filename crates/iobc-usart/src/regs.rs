//! Register offsets and status/control bit layout (AT91 USART; spec.md §4.5).

pub const OFF_CR: u32 = 0x00;
pub const OFF_MR: u32 = 0x04;
pub const OFF_IER: u32 = 0x08;
pub const OFF_IDR: u32 = 0x0C;
pub const OFF_IMR: u32 = 0x10;
pub const OFF_CSR: u32 = 0x14;
pub const OFF_RHR: u32 = 0x18;
pub const OFF_THR: u32 = 0x1C;
pub const OFF_BRGR: u32 = 0x20;
pub const OFF_RTOR: u32 = 0x24;
pub const OFF_TTGR: u32 = 0x28;
pub const OFF_FIDI: u32 = 0x40;
pub const OFF_NER: u32 = 0x44;
pub const OFF_IF: u32 = 0x4C;
pub const OFF_MAN: u32 = 0x50;

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

/// CR (write-only control actions).
pub const CR_RSTRX: u32 = 1 << 2;
pub const CR_RSTTX: u32 = 1 << 3;
pub const CR_RXEN: u32 = 1 << 4;
pub const CR_RXDIS: u32 = 1 << 5;
pub const CR_TXEN: u32 = 1 << 6;
pub const CR_TXDIS: u32 = 1 << 7;
pub const CR_RSTSTA: u32 = 1 << 8;

/// CSR/IER/IDR/IMR bit positions (shared layout).
pub const SR_RXRDY: u32 = 1 << 0;
pub const SR_TXRDY: u32 = 1 << 1;
pub const SR_RXBRK: u32 = 1 << 2;
pub const SR_ENDRX: u32 = 1 << 3;
pub const SR_ENDTX: u32 = 1 << 4;
pub const SR_OVRE: u32 = 1 << 5;
pub const SR_FRAME: u32 = 1 << 6;
pub const SR_PARE: u32 = 1 << 7;
pub const SR_TIMEOUT: u32 = 1 << 8;
pub const SR_TXEMPTY: u32 = 1 << 9;
pub const SR_RXBUFF: u32 = 1 << 12;
pub const SR_TXBUFE: u32 = 1 << 13;
