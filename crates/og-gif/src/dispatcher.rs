//! A+D register handling for paths consumed on the primary thread

use crate::gs::{GsContext, GsCsr};
use crate::registers::{AdRecord, AdRegister, Trxdir};
use crate::state::{TransferRegisters, UnitState};

/// Mutable state an A+D write may touch
pub struct DispatchContext<'a, 'b> {
    pub unit: &'a mut UnitState,
    pub transfer: &'a mut TransferRegisters,
    pub gs: &'a mut GsContext<'b>,
}

/// Interprets one A+D record at a time
#[derive(Debug, Clone, Copy, Default)]
pub struct RegisterDispatcher {
    log_unknown: bool,
}

impl RegisterDispatcher {
    pub fn new(log_unknown: bool) -> Self {
        Self { log_unknown }
    }

    /// Apply one record. Returns true when a SIGNAL stalls the path.
    pub fn dispatch(&self, record: &AdRecord, ctx: &mut DispatchContext<'_, '_>) -> bool {
        match record.register() {
            AdRegister::TransferSetup(slot) => {
                ctx.transfer.regs[slot] = record.data;
                false
            }
            AdRegister::TransferDirection => {
                if !ctx.transfer.start_transfer(Trxdir(record.data)) {
                    tracing::error!(
                        "Illegal format for GS upload: SPSM=0{:02o}",
                        ctx.transfer.bitbltbuf().spsm()
                    );
                }
                false
            }
            AdRegister::Signal => self.signal(record, ctx),
            AdRegister::Finish => {
                tracing::trace!("GIF Handler - FINISH");
                if ctx.unit.finish.pending {
                    tracing::warn!("GIF Handler - Double FINISH");
                }
                ctx.unit.finish.fired = false;
                ctx.unit.finish.pending = true;
                false
            }
            AdRegister::Label => {
                tracing::trace!("GIF Handler - LABEL");
                ctx.unit.sig_lbl_id.merge_lblid(record.lo(), record.hi());
                false
            }
            AdRegister::Undocumented(reg) => {
                self.log_unknown_write(reg);
                false
            }
            AdRegister::Nop | AdRegister::Passthrough(_) => false,
        }
    }

    fn signal(&self, record: &AdRecord, ctx: &mut DispatchContext<'_, '_>) -> bool {
        if ctx.gs.regs.csr.contains(GsCsr::SIGNAL) {
            tracing::warn!("GIF Handler - Stalling SIGNAL");
            if !ctx.unit.signal.queued {
                ctx.unit.signal.queued = true;
                ctx.unit.signal.data = [record.lo(), record.hi()];
                return true;
            }
            // A second stall while one is queued is dropped
            return false;
        }

        tracing::trace!("GIF Handler - SIGNAL");
        ctx.unit.sig_lbl_id.merge_sigid(record.lo(), record.hi());
        if !ctx.gs.regs.signal_masked() {
            ctx.gs.raise_irq();
        }
        ctx.gs.regs.csr.insert(GsCsr::SIGNAL);
        false
    }

    fn log_unknown_write(&self, reg: u8) {
        if self.log_unknown {
            tracing::debug!("GIF Handler - Write to unknown register! [reg={:x}]", reg);
        } else {
            tracing::trace!("GIF Handler - Write to unknown register! [reg={:x}]", reg);
        }
    }
}

/// Whether a record addresses a register that must pass through the GIF core
pub fn needs_core_processing(record: &AdRecord) -> bool {
    match AdRegister::from_id(record.reg & 0x7F) {
        // TRXPOS (slot 1) needs no unit-side handling
        AdRegister::TransferSetup(0)
        | AdRegister::TransferSetup(2)
        | AdRegister::TransferDirection
        | AdRegister::Signal
        | AdRegister::Finish
        | AdRegister::Label => {
            tracing::debug!("GIF Handler Debug - reg={:x}", record.reg & 0x7F);
            true
        }
        AdRegister::Undocumented(reg) => {
            tracing::warn!("GIF Handler Debug - Write to unknown register! [reg={:x}]", reg);
            false
        }
        AdRegister::TransferSetup(_) | AdRegister::Nop | AdRegister::Passthrough(_) => false,
    }
}
