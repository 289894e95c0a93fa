//! Register offsets and bits for the three "misc" System Controller blocks
//! (spec.md §2 table row "Misc (RSTC, SDRAMC, matrix)").

// --- RSTC (Reset Controller) ---
pub const OFF_RSTC_CR: u32 = 0x00;
pub const OFF_RSTC_SR: u32 = 0x04;
pub const OFF_RSTC_MR: u32 = 0x08;

pub const RSTC_CR_PROCRST: u32 = 1 << 0;
pub const RSTC_CR_PERRST: u32 = 1 << 2;
pub const RSTC_CR_EXTRST: u32 = 1 << 3;
pub const RSTC_CR_KEY_SHIFT: u32 = 24;
pub const RSTC_CR_KEY_MASK: u32 = 0xFF << RSTC_CR_KEY_SHIFT;
pub const RSTC_CR_KEY: u32 = 0xA5 << RSTC_CR_KEY_SHIFT;

pub const RSTC_SR_URSTS: u32 = 1 << 0;
pub const RSTC_SR_SRCMP: u32 = 1 << 17;
pub const RSTC_SR_NRSTL: u32 = 1 << 16;

pub const RSTC_MR_URSTEN: u32 = 1 << 0;

// --- SDRAMC (SDRAM Controller) ---
pub const OFF_SDRAMC_MR: u32 = 0x00;
pub const OFF_SDRAMC_TR: u32 = 0x04;
pub const OFF_SDRAMC_CR: u32 = 0x08;
pub const OFF_SDRAMC_LPR: u32 = 0x10;
pub const OFF_SDRAMC_IER: u32 = 0x14;
pub const OFF_SDRAMC_IDR: u32 = 0x18;
pub const OFF_SDRAMC_IMR: u32 = 0x1C;
pub const OFF_SDRAMC_ISR: u32 = 0x20;

pub const SDRAMC_ISR_RES: u32 = 1 << 0;

// --- Matrix ---
pub const OFF_MATRIX_MRCR: u32 = 0x00;

pub const MATRIX_MRCR_ALIAS_MASK: u32 = 0x3;
pub const MATRIX_MRCR_ALIAS_ROM: u32 = 0;
pub const MATRIX_MRCR_ALIAS_SRAM0: u32 = 1;
pub const MATRIX_MRCR_ALIAS_EBI0: u32 = 2;
