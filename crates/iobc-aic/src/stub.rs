use std::cell::RefCell;
use std::rc::Rc;

use crate::regs::IrqLine;

struct Inner {
    inputs: [bool; 32],
    output: IrqLine,
}

impl Inner {
    fn set_input(&mut self, index: usize, level: bool) {
        self.inputs[index] = level;
        let any = self.inputs.iter().any(|&b| b);
        self.output.set(any);
    }
}

/// A tiny 32-input OR reducer: every SYSC source (PMC, RSTC, PIT, RTT,
/// DBGU, ...) feeds one bit here, and the single output drives AIC line 1
/// (spec.md §4.3 "AIC stub"). Shared handle, cloned into the SoC wiring and
/// handed out one [`IrqLine`] per SYSC peripheral via [`AicStub::line`] —
/// the same capability-handle shape `AicHandle::line` uses for ordinary AIC
/// lines, so a SYSC peripheral's `irq: IrqLine` field is wired identically
/// whether it lands on a dedicated AIC line or on a stub input bit.
#[derive(Clone)]
pub struct AicStub(Rc<RefCell<Inner>>);

impl AicStub {
    pub fn new(output: IrqLine) -> Self {
        Self(Rc::new(RefCell::new(Inner { inputs: [false; 32], output })))
    }

    /// Sets SYSC source `index`'s raw level and re-asserts the AIC line 1
    /// input if any source is currently active.
    pub(crate) fn set_input(&self, index: usize, level: bool) {
        self.0.borrow_mut().set_input(index, level);
    }

    /// A narrow handle scoped to one SYSC sub-source.
    pub fn line(&self, index: usize) -> IrqLine {
        IrqLine::from_stub(self.clone(), index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regs::{Aic, AicHandle, OFF_IECR};
    use iobc_mmio::MmioDevice;

    #[test]
    fn output_is_or_of_inputs() {
        let handle = AicHandle::new(Aic::new());
        handle.borrow_mut().write(OFF_IECR, 1 << 1);
        let stub = AicStub::new(handle.line(1));

        stub.line(3).set(true);
        assert!(handle.borrow().irq_asserted());
        stub.line(7).set(true);
        stub.line(3).set(false);
        // Source 7 is still active, so the OR output stays high.
        assert!(handle.borrow().irq_asserted());
        stub.line(7).set(false);
        assert!(!handle.borrow().irq_asserted());
    }
}
