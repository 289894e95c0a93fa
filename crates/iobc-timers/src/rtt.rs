//! Real-Time Timer: 32-bit counter at SLCK/prescaler, alarm on AR+1
//! (spec.md §4.10).

use iobc_aic::IrqLine;
use iobc_mmio::MmioDevice;

use crate::regs::*;
use crate::ClockTicks;

pub struct Rtt {
    mr: u32,
    ar: u32,
    vr: u32,
    alms: bool,
    rttinc: bool,
    accum: u64,
    irq: IrqLine,
}

impl Rtt {
    pub fn new(irq: IrqLine) -> Self {
        Self {
            mr: 0x8000, // RTPRES reset value is 0x8000 per datasheet
            ar: 0xFFFF_FFFF,
            vr: 0,
            alms: false,
            rttinc: false,
            accum: 0,
            irq,
        }
    }

    pub fn reset_registers(&mut self) {
        let irq = self.irq.clone();
        *self = Self::new(irq);
    }

    fn prescaler(&self) -> u64 {
        (self.mr & RTT_MR_RTPRES_MASK).max(1) as u64
    }

    fn update_irq(&mut self) {
        let fire = (self.alms && self.mr & RTT_MR_ALMIEN != 0) || (self.rttinc && self.mr & RTT_MR_RTTINCIEN != 0);
        self.irq.set(fire);
    }

    pub fn service(&mut self, ticks: ClockTicks) {
        self.accum += ticks.slck;
        let presc = self.prescaler();
        let advances = self.accum / presc;
        self.accum %= presc;
        for _ in 0..advances {
            self.vr = self.vr.wrapping_add(1);
            self.rttinc = true;
            if self.vr == self.ar.wrapping_add(1) {
                self.alms = true;
            }
        }
        if advances > 0 {
            self.update_irq();
        }
    }
}

impl MmioDevice for Rtt {
    fn read(&mut self, offset: u32) -> u32 {
        match offset {
            OFF_RTT_MR => self.mr,
            OFF_RTT_AR => self.ar,
            OFF_RTT_VR => self.vr,
            OFF_RTT_SR => {
                let v = (self.alms as u32) * RTT_SR_ALMS | (self.rttinc as u32) * RTT_SR_RTTINC;
                self.alms = false;
                self.rttinc = false;
                self.update_irq();
                v
            }
            _ => panic!("RTT: read of unimplemented register at +0x{offset:x}"),
        }
    }

    fn write(&mut self, offset: u32, value: u32) {
        match offset {
            OFF_RTT_MR => {
                self.mr = value;
                if value & RTT_MR_RTTRST != 0 {
                    self.vr = 0;
                    self.accum = 0;
                }
                self.update_irq();
            }
            OFF_RTT_AR => self.ar = value,
            OFF_RTT_VR | OFF_RTT_SR => panic!("RTT: write of read-only register at +0x{offset:x} (value=0x{value:x})"),
            _ => panic!("RTT: write of unimplemented register at +0x{offset:x} (value=0x{value:x})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iobc_aic::{Aic, AicHandle};

    fn rtt() -> Rtt {
        let handle = AicHandle::new(Aic::new());
        Rtt::new(handle.line(2))
    }

    #[test]
    fn default_prescaler_counts_one_hz() {
        let mut rtt = rtt();
        rtt.service(ClockTicks { mck: 0, slck: 32768 });
        assert_eq!(rtt.read(OFF_RTT_VR), 1);
    }

    #[test]
    fn alarm_fires_when_vr_passes_ar_plus_1() {
        let mut rtt = rtt();
        rtt.write(OFF_RTT_MR, 1); // prescaler = 1: every SLCK tick advances VR
        rtt.write(OFF_RTT_AR, 4);
        rtt.service(ClockTicks { mck: 0, slck: 5 });
        assert_eq!(rtt.read(OFF_RTT_SR) & RTT_SR_ALMS, RTT_SR_ALMS);
        assert_eq!(rtt.read(OFF_RTT_SR) & RTT_SR_ALMS, 0, "SR read clears ALMS");
    }
}
