use std::cell::RefCell;
use std::rc::Rc;

use crate::device::MmioDevice;

/// A flat byte-addressable memory region shared by the CPU and any PDC
/// channel that DMAs into it. Cloning yields another handle onto the same
/// backing storage (the region itself is exclusively owned by whichever
/// aggregate created it; clones are how peripherals get bus-master access).
#[derive(Clone)]
pub struct GuestMemory {
    inner: Rc<RefCell<Vec<u8>>>,
}

impl GuestMemory {
    pub fn new(size: usize) -> Self {
        Self { inner: Rc::new(RefCell::new(vec![0u8; size])) }
    }

    /// A region pre-populated with `image`, zero-padded (or truncated) to `size`.
    pub fn from_image(size: usize, image: &[u8]) -> Self {
        let mut bytes = vec![0u8; size];
        let n = image.len().min(size);
        bytes[..n].copy_from_slice(&image[..n]);
        Self { inner: Rc::new(RefCell::new(bytes)) }
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn read_u8(&self, offset: u32) -> u8 {
        self.inner.borrow()[offset as usize]
    }

    pub fn write_u8(&self, offset: u32, value: u8) {
        self.inner.borrow_mut()[offset as usize] = value;
    }

    pub fn read_u32(&self, offset: u32) -> u32 {
        let buf = self.inner.borrow();
        let o = offset as usize;
        u32::from_le_bytes([buf[o], buf[o + 1], buf[o + 2], buf[o + 3]])
    }

    pub fn write_u32(&self, offset: u32, value: u32) {
        let mut buf = self.inner.borrow_mut();
        let o = offset as usize;
        buf[o..o + 4].copy_from_slice(&value.to_le_bytes());
    }

    pub fn read_bytes(&self, offset: u32, len: usize) -> Vec<u8> {
        let buf = self.inner.borrow();
        let o = offset as usize;
        buf[o..o + len].to_vec()
    }

    pub fn write_bytes(&self, offset: u32, data: &[u8]) {
        let mut buf = self.inner.borrow_mut();
        let o = offset as usize;
        buf[o..o + data.len()].copy_from_slice(data);
    }
}

/// Lets a `GuestMemory` region be mapped directly onto the bus at its real
/// (non-aliased) address, alongside any clone the bootmem alias or a PDC
/// channel holds onto the same storage.
impl MmioDevice for GuestMemory {
    fn read(&mut self, offset: u32) -> u32 {
        self.read_u32(offset)
    }

    fn write(&mut self, offset: u32, value: u32) {
        self.write_u32(offset, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_storage() {
        let mem = GuestMemory::new(16);
        let clone = mem.clone();
        mem.write_u32(0, 0xdead_beef);
        assert_eq!(clone.read_u32(0), 0xdead_beef);
    }

    #[test]
    fn from_image_zero_pads() {
        let mem = GuestMemory::from_image(8, &[1, 2, 3]);
        assert_eq!(mem.read_bytes(0, 8), vec![1, 2, 3, 0, 0, 0, 0, 0]);
    }
}
