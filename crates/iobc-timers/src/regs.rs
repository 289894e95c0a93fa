//! AT91 TC/PIT/RTT register offsets and bits (spec.md §4.9, §4.10).

// --- TC, per-channel block (3 channels, stride 0x40) ---
pub const TC_CHANNEL_STRIDE: u32 = 0x40;
pub const OFF_TC_CCR: u32 = 0x00;
pub const OFF_TC_CMR: u32 = 0x04;
pub const OFF_TC_CV: u32 = 0x10;
pub const OFF_TC_RA: u32 = 0x14;
pub const OFF_TC_RB: u32 = 0x18;
pub const OFF_TC_RC: u32 = 0x1C;
pub const OFF_TC_SR: u32 = 0x20;
pub const OFF_TC_IER: u32 = 0x24;
pub const OFF_TC_IDR: u32 = 0x28;
pub const OFF_TC_IMR: u32 = 0x2C;
// Block-wide registers, beyond the 3-channel window at 0xC0.
pub const OFF_TC_BCR: u32 = 0xC0;
pub const OFF_TC_BMR: u32 = 0xC4;

pub const CCR_CLKEN: u32 = 1 << 0;
pub const CCR_CLKDIS: u32 = 1 << 1;
pub const CCR_SWTRG: u32 = 1 << 2;

pub const CMR_TCCLKS_MASK: u32 = 0x7;
pub const CMR_WAVE: u32 = 1 << 15;
/// WAVSEL bits 13:12; only sawtooth (00, up to 0xFFFF), up to-RC sawtooth
/// (10), and up-down triangular (01/11) are modeled.
pub const CMR_WAVSEL_SHIFT: u32 = 13;
pub const CMR_WAVSEL_MASK: u32 = 0x3 << CMR_WAVSEL_SHIFT;

pub const TCCLKS_MCK2: u32 = 0;
pub const TCCLKS_MCK8: u32 = 1;
pub const TCCLKS_MCK32: u32 = 2;
pub const TCCLKS_MCK128: u32 = 3;
pub const TCCLKS_SLCK: u32 = 4;
// 5..7 select XC0/XC1/XC2, not implemented.

pub const SR_COVFS: u32 = 1 << 0;
pub const SR_LOVRS: u32 = 1 << 1;
pub const SR_CPAS: u32 = 1 << 2;
pub const SR_CPBS: u32 = 1 << 3;
pub const SR_CPCS: u32 = 1 << 4;
pub const SR_LDRAS: u32 = 1 << 5;
pub const SR_LDRBS: u32 = 1 << 6;
pub const SR_ETRGS: u32 = 1 << 7;
pub const SR_CLKSTA: u32 = 1 << 16;

// --- PIT ---
pub const OFF_PIT_MR: u32 = 0x00;
pub const OFF_PIT_SR: u32 = 0x04;
pub const OFF_PIT_PIVR: u32 = 0x08;
pub const OFF_PIT_PIIR: u32 = 0x0C;

pub const PIT_MR_PIV_MASK: u32 = 0xFFFFF;
pub const PIT_MR_PITEN: u32 = 1 << 24;
pub const PIT_MR_PITIEN: u32 = 1 << 25;
pub const PIT_SR_PITS: u32 = 1 << 0;

// --- RTT ---
pub const OFF_RTT_MR: u32 = 0x00;
pub const OFF_RTT_AR: u32 = 0x04;
pub const OFF_RTT_VR: u32 = 0x08;
pub const OFF_RTT_SR: u32 = 0x0C;

pub const RTT_MR_RTPRES_MASK: u32 = 0xFFFF;
pub const RTT_MR_ALMIEN: u32 = 1 << 16;
pub const RTT_MR_RTTINCIEN: u32 = 1 << 17;
pub const RTT_MR_RTTRST: u32 = 1 << 18;
pub const RTT_SR_ALMS: u32 = 1 << 0;
pub const RTT_SR_RTTINC: u32 = 1 << 1;
