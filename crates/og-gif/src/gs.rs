//! GS privileged registers seen by the GIF unit
//!
//! CSR and IMR belong to the GS state owner; the GIF unit reads and writes
//! them through a [`GsContext`] handed in by the caller, together with the
//! interrupt line it may raise.

use bitflags::bitflags;

bitflags! {
    /// GS_CSR event bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct GsCsr: u64 {
        /// SIGNAL event pending acknowledgement
        const SIGNAL = 1 << 0;
        /// FINISH event pending acknowledgement
        const FINISH = 1 << 1;
        const HSINT  = 1 << 2;
        const VSINT  = 1 << 3;
        const EDWINT = 1 << 4;

        const EVENTS = Self::SIGNAL.bits()
            | Self::FINISH.bits()
            | Self::HSINT.bits()
            | Self::VSINT.bits()
            | Self::EDWINT.bits();
    }
}

bitflags! {
    /// GS_IMR interrupt mask bits (set = masked)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct GsImr: u64 {
        const SIGMSK    = 1 << 8;
        const FINISHMSK = 1 << 9;
        const HSMSK     = 1 << 10;
        const VSMSK     = 1 << 11;
        const EDWMSK    = 1 << 12;

        const ALL = Self::SIGMSK.bits()
            | Self::FINISHMSK.bits()
            | Self::HSMSK.bits()
            | Self::VSMSK.bits()
            | Self::EDWMSK.bits();
    }
}

impl Default for GsImr {
    /// All interrupts masked after reset
    fn default() -> Self {
        Self::ALL
    }
}

/// CSR and IMR as owned by the GS state owner
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GsRegs {
    pub csr: GsCsr,
    pub imr: GsImr,
}

impl GsRegs {
    /// GS_IMR write; bits outside the mask field are ignored
    pub fn write_imr(&mut self, value: u64) {
        self.imr = GsImr::from_bits_truncate(value);
    }

    pub fn signal_masked(&self) -> bool {
        self.imr.contains(GsImr::SIGMSK)
    }

    pub fn finish_masked(&self) -> bool {
        self.imr.contains(GsImr::FINISHMSK)
    }
}

/// The GS interrupt line exposed to the rest of the machine
pub trait GsInterrupt {
    fn raise(&mut self);
}

/// Interrupt sink that only counts raises
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IrqCounter {
    pub raised: u32,
}

impl GsInterrupt for IrqCounter {
    fn raise(&mut self) {
        self.raised += 1;
    }
}

/// Per-call view of external GS state
pub struct GsContext<'a> {
    pub regs: &'a mut GsRegs,
    pub irq: &'a mut dyn GsInterrupt,
}

impl<'a> GsContext<'a> {
    pub fn new(regs: &'a mut GsRegs, irq: &'a mut dyn GsInterrupt) -> Self {
        Self { regs, irq }
    }

    pub fn raise_irq(&mut self) {
        self.irq.raise();
    }
}
