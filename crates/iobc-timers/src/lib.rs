//! Periodic and real-time counters backed by host monotonic time (spec.md
//! §4.9, §4.10): the Timer/Counter blocks, PIT, and RTT.
//!
//! None of these crates call into any actual wall-clock source themselves —
//! spec.md §1 explicitly excludes cycle-accurate timing, and the aggregate
//! (`iobc-soc`) is the one place that turns host-elapsed wall time into tick
//! counts in each clock domain and hands them down via [`ClockTicks`]. This
//! keeps every timer here a pure function of "how many ticks elapsed",
//! the same decoupling `iobc-pdc` uses for its `DmaTarget`.

mod pit;
mod regs;
mod rtt;
mod tc;

pub use pit::Pit;
pub use rtt::Rtt;
pub use tc::Tc;

/// Elapsed ticks in each clock domain since the previous `service` call.
/// MCK ticks drive TC channels configured for MCK/2..128 and the PIT;
/// SLCK ticks drive TC channels configured for SLCK and the RTT.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClockTicks {
    pub mck: u64,
    pub slck: u64,
}
