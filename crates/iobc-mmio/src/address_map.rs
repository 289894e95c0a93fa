//! The fixed (base, size) table for every region spec.md names, grounded in
//! the AT91SAM9G20 datasheet's memory map. `iobc-soc` uses these constants to
//! populate an `MmioBus`; this module only names the addresses, it does not
//! own any state.

pub const BOOTMEM_BASE: u32 = 0x0000_0000;
pub const BOOTMEM_SIZE: u32 = 0x0010_0000;

pub const ROM_BASE: u32 = 0x0010_0000;
pub const ROM_SIZE: u32 = 32 * 1024;

pub const SRAM0_BASE: u32 = 0x0020_0000;
pub const SRAM0_SIZE: u32 = 32 * 1024;

/// NOR flash / SDRAM behind EBI chip-select 0.
pub const EBI_NCS0_BASE: u32 = 0x1000_0000;
pub const EBI_NCS0_SIZE: u32 = 16 * 1024 * 1024;

/// The main external SDRAM, reached through the SDRAM controller rather than
/// the bootmem alias.
pub const SDRAM_BASE: u32 = 0x2000_0000;
pub const SDRAM_SIZE: u32 = 64 * 1024 * 1024;

/// User peripherals (USART/SPI/TWI/MCI/TC).
pub const USER_PERIPHERALS_BASE: u32 = 0xFFFA_0000;

pub const USART0_BASE: u32 = 0xFFFB_0000;
pub const USART1_BASE: u32 = 0xFFFB_4000;
pub const USART2_BASE: u32 = 0xFFFB_8000;
pub const USART3_BASE: u32 = 0xFFFD_0000;
pub const USART4_BASE: u32 = 0xFFFD_4000;
pub const USART5_BASE: u32 = 0xFFFD_8000;
pub const USART_SIZE: u32 = 0x4000;

pub const SPI0_BASE: u32 = 0xFFFC_8000;
pub const SPI1_BASE: u32 = 0xFFFC_C000;
pub const SPI_SIZE: u32 = 0x4000;

pub const TWI_BASE: u32 = 0xFFFA_C000;
pub const TWI_SIZE: u32 = 0x4000;

pub const MCI_BASE: u32 = 0xFFFA_8000;
pub const MCI_SIZE: u32 = 0x4000;

pub const TC0_BLOCK_BASE: u32 = 0xFFFA_0000;
pub const TC1_BLOCK_BASE: u32 = 0xFFFD_C000;
pub const TC_BLOCK_SIZE: u32 = 0x4000;

/// System Controller peripherals.
pub const SYSC_BASE: u32 = 0xFFFF_F000;

pub const AIC_BASE: u32 = 0xFFFF_F000;
pub const AIC_SIZE: u32 = 0x200;

pub const DBGU_BASE: u32 = 0xFFFF_F200;
pub const DBGU_SIZE: u32 = 0x200;

pub const PIOA_BASE: u32 = 0xFFFF_F400;
pub const PIOB_BASE: u32 = 0xFFFF_F600;
pub const PIOC_BASE: u32 = 0xFFFF_F800;
pub const PIO_SIZE: u32 = 0x200;

pub const PMC_BASE: u32 = 0xFFFF_FC00;
pub const PMC_SIZE: u32 = 0x100;

pub const RSTC_BASE: u32 = 0xFFFF_FD00;
pub const RSTC_SIZE: u32 = 0x10;

pub const RTT_BASE: u32 = 0xFFFF_FD20;
pub const RTT_SIZE: u32 = 0x10;

pub const PIT_BASE: u32 = 0xFFFF_FD30;
pub const PIT_SIZE: u32 = 0x10;

pub const SDRAMC_BASE: u32 = 0xFFFF_FEA0;
pub const SDRAMC_SIZE: u32 = 0x200;

pub const MATRIX_BASE: u32 = 0xFFFF_EE00;
pub const MATRIX_SIZE: u32 = 0x200;
