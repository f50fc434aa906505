//! GIF (Graphics Interface) unit emulation for oxidized-gif
//!
//! The GIF serialises A+D register writes and image data from PATH1 (VU1
//! XGKICK), PATH2 (VIF1 DIRECT) and PATH3 (GIF DMA) toward the GS. This
//! crate models the parts of that flow with protocol state: SIGNAL stalls,
//! two-phase FINISH interrupts, LABEL merging, the lock-free handoff used
//! when VU1 runs on its own thread, and save states.

pub mod bridge;
pub mod dispatcher;
pub mod gs;
pub mod irq;
pub mod path;
pub mod registers;
pub mod savestate;
pub mod state;
pub mod unit;
pub mod worker;

pub use bridge::{GsEventChannel, GsEventFlags, VuGifBridge};
pub use dispatcher::{needs_core_processing, DispatchContext, RegisterDispatcher};
pub use gs::{GsContext, GsCsr, GsImr, GsInterrupt, GsRegs, IrqCounter};
pub use irq::IrqController;
pub use path::{GifPath, GifPathId, GsPacket, PacketDrain, PathOwner};
pub use registers::{AdRecord, AdRegister, RECORD_SIZE};
pub use savestate::ThawReport;
pub use state::{TransferRegisters, TransferType, UnitState};
pub use unit::{GifUnit, ProcessOutcome};
pub use worker::WorkerGifPath;
