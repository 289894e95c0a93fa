//! The System Controller's smaller register files: the Reset Controller,
//! the SDRAM Controller, and the bus Matrix's bootmem-alias selector
//! (spec.md §2 "Misc (RSTC, SDRAMC, matrix)").

mod matrix;
mod rstc;
mod sdramc;

mod regs;

pub use matrix::Matrix;
pub use rstc::Rstc;
pub use sdramc::Sdramc;
