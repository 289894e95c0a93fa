//! The Peripheral DMA Controller block (spec.md §4.4): one `Pdc` instance is
//! embedded per DMA-capable peripheral (each USART, each SPI, the DBGU). It
//! owns the RPR/RCR/RNPR/RNCR (receive) and TPR/TCR/TNPR/TNCR (transmit)
//! register pairs and the PTCR/PTSR enable bits, and moves bytes between a
//! peripheral's internal buffer and system memory through a caller-supplied
//! [`DmaTarget`] — `Pdc` itself has no notion of an address map or a bus, so
//! the same block works unmodified for every peripheral it is wired into.

/// Absolute-address byte access into system memory, implemented by whatever
/// owns the address map (the board/SoC aggregate) and handed to each `Pdc`
/// instance as a trait object or generic parameter.
pub trait DmaTarget {
    fn read_u8(&self, addr: u32) -> u8;
    fn write_u8(&self, addr: u32, value: u8);
}

/// Status bits computed from the current register state (spec.md §4.4).
/// These are pure functions of the RCR/RNCR/TCR/TNCR/RXTEN/TXTEN state
/// rather than separately-latched bits, which is observationally identical
/// in this single-threaded, serialized model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PdcFlags {
    pub endrx: bool,
    pub rxbuff: bool,
    pub endtx: bool,
    pub txbufe: bool,
}

/// What a register write told the owning peripheral to do with its side of
/// the DMA engine (start or stop pushing/pulling bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PdcAction {
    None,
    StartRx,
    StopRx,
    StartTx,
    StopTx,
}

/// PTCR write bits (AT91 PDC layout): RXTEN=bit0, RXTDIS=bit1, TXTEN=bit8,
/// TXTDIS=bit9.
const PTCR_RXTEN: u32 = 1 << 0;
const PTCR_RXTDIS: u32 = 1 << 1;
const PTCR_TXTEN: u32 = 1 << 8;
const PTCR_TXTDIS: u32 = 1 << 9;

pub struct Pdc {
    rpr: u32,
    rcr: u32,
    rnpr: u32,
    rncr: u32,
    tpr: u32,
    tcr: u32,
    tnpr: u32,
    tncr: u32,
    rxten: bool,
    txten: bool,
    /// True for half-duplex peripherals (SPI, TWI) where RX and TX DMA can
    /// never be enabled at the same time.
    half_duplex: bool,
}

impl Pdc {
    pub fn new(half_duplex: bool) -> Self {
        Self {
            rpr: 0,
            rcr: 0,
            rnpr: 0,
            rncr: 0,
            tpr: 0,
            tcr: 0,
            tnpr: 0,
            tncr: 0,
            rxten: false,
            txten: false,
            half_duplex,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.half_duplex);
    }

    pub fn read_rpr(&self) -> u32 {
        self.rpr
    }
    pub fn write_rpr(&mut self, value: u32) {
        self.rpr = value;
    }
    pub fn read_rcr(&self) -> u32 {
        self.rcr
    }
    pub fn read_rnpr(&self) -> u32 {
        self.rnpr
    }
    pub fn write_rnpr(&mut self, value: u32) {
        self.rnpr = value;
    }
    pub fn read_rncr(&self) -> u32 {
        self.rncr
    }
    pub fn read_tpr(&self) -> u32 {
        self.tpr
    }
    pub fn write_tpr(&mut self, value: u32) {
        self.tpr = value;
    }
    pub fn read_tcr(&self) -> u32 {
        self.tcr
    }
    pub fn read_tnpr(&self) -> u32 {
        self.tnpr
    }
    pub fn write_tnpr(&mut self, value: u32) {
        self.tnpr = value;
    }
    pub fn read_tncr(&self) -> u32 {
        self.tncr
    }

    /// Writing RCR is the one event that can start or stop receive DMA: a
    /// non-zero value while RXTEN is set starts it, zero while RXTEN is set
    /// stops it (spec.md §4.4).
    pub fn write_rcr(&mut self, value: u32) -> PdcAction {
        self.rcr = value;
        self.rx_action()
    }

    /// Writing RNCR never starts/stops DMA by itself, but if the current
    /// buffer is already exhausted it rolls the "next" pair into "current"
    /// immediately.
    pub fn write_rncr(&mut self, value: u32) {
        self.rncr = value;
        self.try_rollover_rx();
    }

    pub fn write_tcr(&mut self, value: u32) -> PdcAction {
        self.tcr = value;
        self.tx_action()
    }

    pub fn write_tncr(&mut self, value: u32) {
        self.tncr = value;
        self.try_rollover_tx();
    }

    pub fn write_ptcr(&mut self, value: u32) {
        if value & PTCR_RXTDIS != 0 {
            self.rxten = false;
        }
        if value & PTCR_RXTEN != 0 {
            self.rxten = true;
        }
        if value & PTCR_TXTDIS != 0 {
            self.txten = false;
        }
        if value & PTCR_TXTEN != 0 {
            self.txten = true;
        }
        if self.half_duplex && self.rxten && self.txten {
            panic!("half-duplex PDC channel cannot have RX and TX both enabled");
        }
    }

    pub fn read_ptsr(&self) -> u32 {
        let mut v = 0;
        if self.rxten {
            v |= PTCR_RXTEN;
        }
        if self.txten {
            v |= PTCR_TXTEN;
        }
        v
    }

    pub fn flags(&self) -> PdcFlags {
        PdcFlags {
            endrx: self.rxten && self.rcr == 0,
            rxbuff: self.rxten && self.rcr == 0 && self.rncr == 0,
            endtx: self.txten && self.tcr == 0,
            txbufe: self.txten && self.tcr == 0 && self.tncr == 0,
        }
    }

    fn rx_action(&self) -> PdcAction {
        if !self.rxten {
            PdcAction::None
        } else if self.rcr != 0 {
            PdcAction::StartRx
        } else {
            PdcAction::StopRx
        }
    }

    fn tx_action(&self) -> PdcAction {
        if !self.txten {
            PdcAction::None
        } else if self.tcr != 0 {
            PdcAction::StartTx
        } else {
            PdcAction::StopTx
        }
    }

    fn try_rollover_rx(&mut self) {
        if self.rcr == 0 && self.rncr != 0 {
            self.rpr = self.rnpr;
            self.rcr = self.rncr;
            self.rnpr = 0;
            self.rncr = 0;
        }
    }

    fn try_rollover_tx(&mut self) {
        if self.tcr == 0 && self.tncr != 0 {
            self.tpr = self.tnpr;
            self.tcr = self.tncr;
            self.tnpr = 0;
            self.tncr = 0;
        }
    }

    /// Pushes as many of `bytes` into `mem` as the current+next receive
    /// windows can absorb, advancing RPR/RCR (and rolling RNPR/RNCR in as
    /// current empties). Returns the number of bytes actually consumed;
    /// anything beyond that is left for the caller to keep buffering (or
    /// drop, per the calling peripheral's overrun policy) since the PDC
    /// itself has nowhere left to put it.
    pub fn rx_put(&mut self, mem: &dyn DmaTarget, bytes: &[u8]) -> usize {
        let mut consumed = 0;
        for &b in bytes {
            if !self.rxten || self.rcr == 0 {
                self.try_rollover_rx();
                if !self.rxten || self.rcr == 0 {
                    break;
                }
            }
            mem.write_u8(self.rpr, b);
            self.rpr = self.rpr.wrapping_add(1);
            self.rcr -= 1;
            consumed += 1;
            if self.rcr == 0 {
                self.try_rollover_rx();
            }
        }
        consumed
    }

    /// Pulls up to `max` bytes out of `mem` for transmission, advancing
    /// TPR/TCR (and rolling TNPR/TNCR in as current empties). Returns fewer
    /// than `max` bytes once both windows are exhausted.
    pub fn tx_take(&mut self, mem: &dyn DmaTarget, max: usize) -> Vec<u8> {
        let mut out = Vec::with_capacity(max);
        while out.len() < max {
            if !self.txten || self.tcr == 0 {
                self.try_rollover_tx();
                if !self.txten || self.tcr == 0 {
                    break;
                }
            }
            out.push(mem.read_u8(self.tpr));
            self.tpr = self.tpr.wrapping_add(1);
            self.tcr -= 1;
            if self.tcr == 0 {
                self.try_rollover_tx();
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct FlatMem(RefCell<Vec<u8>>);
    impl FlatMem {
        fn new(size: usize) -> Self {
            Self(RefCell::new(vec![0u8; size]))
        }
    }
    impl DmaTarget for FlatMem {
        fn read_u8(&self, addr: u32) -> u8 {
            self.0.borrow()[addr as usize]
        }
        fn write_u8(&self, addr: u32, value: u8) {
            self.0.borrow_mut()[addr as usize] = value;
        }
    }

    #[test]
    fn rcr_write_starts_and_stops_rx() {
        let mut pdc = Pdc::new(false);
        pdc.write_ptcr(PTCR_RXTEN);
        assert_eq!(pdc.write_rcr(4), PdcAction::StartRx);
        assert_eq!(pdc.write_rcr(0), PdcAction::StopRx);
    }

    #[test]
    fn end_of_transfer_sets_endrx_then_rxbuff() {
        let mem = FlatMem::new(16);
        let mut pdc = Pdc::new(false);
        pdc.write_rpr(0);
        pdc.write_ptcr(PTCR_RXTEN);
        pdc.write_rcr(4);

        let consumed = pdc.rx_put(&mem, &[1, 2, 3, 4]);
        assert_eq!(consumed, 4);
        let flags = pdc.flags();
        assert!(flags.endrx);
        assert!(flags.rxbuff, "RNCR was never set, so both empty together");

        // More bytes arrive but there is nowhere to put them: RNCR is 0.
        let consumed = pdc.rx_put(&mem, &[5, 6]);
        assert_eq!(consumed, 0);
        assert!(pdc.flags().rxbuff);
    }

    #[test]
    fn rncr_rolls_over_when_current_is_exhausted() {
        let mem = FlatMem::new(16);
        let mut pdc = Pdc::new(false);
        pdc.write_rpr(0);
        pdc.write_ptcr(PTCR_RXTEN);
        pdc.write_rcr(2);
        pdc.write_rnpr(8);
        pdc.write_rncr(2);

        let consumed = pdc.rx_put(&mem, &[1, 2, 3, 4]);
        assert_eq!(consumed, 4);
        assert_eq!(mem.read_u8(0), 1);
        assert_eq!(mem.read_u8(1), 2);
        assert_eq!(mem.read_u8(8), 3);
        assert_eq!(mem.read_u8(9), 4);
        assert!(pdc.flags().endrx);
        assert!(pdc.flags().rxbuff);
    }

    #[test]
    fn tx_take_drains_current_then_next() {
        let mem = FlatMem::new(16);
        mem.write_u8(0, 0xaa);
        mem.write_u8(1, 0xbb);
        mem.write_u8(8, 0xcc);

        let mut pdc = Pdc::new(false);
        pdc.write_tpr(0);
        pdc.write_ptcr(PTCR_TXTEN);
        pdc.write_tcr(2);
        pdc.write_tnpr(8);
        pdc.write_tncr(1);

        let out = pdc.tx_take(&mem, 10);
        assert_eq!(out, vec![0xaa, 0xbb, 0xcc]);
        assert!(pdc.flags().endtx);
        assert!(pdc.flags().txbufe);
    }

    #[test]
    fn half_duplex_rejects_simultaneous_rx_and_tx() {
        let mut pdc = Pdc::new(true);
        pdc.write_ptcr(PTCR_RXTEN);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            pdc.write_ptcr(PTCR_TXTEN);
        }));
        assert!(result.is_err());
    }

    #[test]
    fn ptsr_reflects_enable_bits() {
        let mut pdc = Pdc::new(false);
        assert_eq!(pdc.read_ptsr(), 0);
        pdc.write_ptcr(PTCR_RXTEN);
        assert_eq!(pdc.read_ptsr(), PTCR_RXTEN);
        pdc.write_ptcr(PTCR_RXTDIS);
        assert_eq!(pdc.read_ptsr(), 0);
    }
}
