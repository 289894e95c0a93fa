//! A generic capability handle for peripherals `Soc` both maps onto the bus
//! and keeps calling into directly afterwards (`service`, `reset_registers`,
//! `clear_buffers`) — the same `Rc<RefCell<_>>` idiom `iobc-aic`'s
//! `AicHandle` and `iobc-mmio`'s `BootmemHandle` already use for their own
//! dual-ownership needs, generalized here since `Soc` needs it for every
//! peripheral type those two crates don't already wrap.

use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

use iobc_mmio::MmioDevice;

pub struct Shared<T>(Rc<RefCell<T>>);

impl<T> Shared<T> {
    pub fn new(value: T) -> Self {
        Self(Rc::new(RefCell::new(value)))
    }

    pub fn borrow(&self) -> Ref<'_, T> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, T> {
        self.0.borrow_mut()
    }
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: MmioDevice> MmioDevice for Shared<T> {
    fn read(&mut self, offset: u32) -> u32 {
        self.0.borrow_mut().read(offset)
    }

    fn write(&mut self, offset: u32, value: u32) {
        self.0.borrow_mut().write(offset, value)
    }
}
