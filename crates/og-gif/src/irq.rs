//! Deferred FINISH interrupt delivery
//!
//! A FINISH write only marks the event pending; the interrupt is raised by
//! the next [`IrqController::poll`]. This reproduces the one-poll delay
//! between the register write and the interrupt, and fires at most once per
//! pending cycle.

use crate::gs::{GsContext, GsCsr};
use crate::state::UnitState;

#[derive(Debug, Default, Clone, Copy)]
pub struct IrqController;

impl IrqController {
    /// Returns true if the interrupt line was raised
    pub fn poll(unit: &mut UnitState, gs: &mut GsContext<'_>) -> bool {
        if unit.finish.pending {
            gs.regs.csr.insert(GsCsr::FINISH);
            unit.finish.pending = false;
        }

        if gs.regs.csr.contains(GsCsr::FINISH) && !gs.regs.finish_masked() && !unit.finish.fired {
            gs.raise_irq();
            unit.finish.fired = true;
            return true;
        }
        false
    }
}
