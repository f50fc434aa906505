//! The assembled GIF unit

use crate::bridge::{GsEventChannel, GsEventFlags, VuGifBridge};
use crate::dispatcher::{DispatchContext, RegisterDispatcher};
use crate::gs::{GsContext, GsCsr};
use crate::irq::IrqController;
use crate::path::{GifPath, GifPathId, PathOwner};
use crate::state::{TransferRegisters, TransferType, UnitState};
use crate::worker::WorkerGifPath;
use og_core::config::GifConfig;
use og_core::PathError;
use parking_lot::Mutex;
use std::sync::Arc;

/// Storage for one path, by owning thread
#[derive(Debug)]
pub(crate) enum PathSlot {
    Primary(GifPath),
    Worker(Arc<Mutex<GifPath>>),
}

/// Result of draining a primary-owned path
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessOutcome {
    pub records: usize,
    pub stalled: bool,
}

/// GIF unit: three paths plus unit-level SIGNAL/FINISH/LABEL state
#[derive(Debug)]
pub struct GifUnit {
    pub state: UnitState,
    pub transfer: TransferRegisters,
    pub(crate) paths: [PathSlot; 3],
    channel: Arc<GsEventChannel>,
    dispatcher: RegisterDispatcher,
    mtvu: bool,
    log_unknown: bool,
}

impl GifUnit {
    pub fn new(config: &GifConfig) -> Self {
        let worker = config
            .mtvu
            .then(|| GifPathId::ALL[config.worker_path.index()]);

        let paths = GifPathId::ALL.map(|id| {
            if Some(id) == worker {
                let path = GifPath::new(id, config.path_buffer_size, PathOwner::Worker);
                PathSlot::Worker(Arc::new(Mutex::new(path)))
            } else {
                PathSlot::Primary(GifPath::new(id, config.path_buffer_size, PathOwner::Primary))
            }
        });

        Self {
            state: UnitState::new(),
            transfer: TransferRegisters::default(),
            paths,
            channel: Arc::new(GsEventChannel::new()),
            dispatcher: RegisterDispatcher::new(config.log_unknown_registers),
            mtvu: config.mtvu,
            log_unknown: config.log_unknown_registers,
        }
    }

    /// Whether a path runs on the VU1 worker thread
    pub fn is_mtvu(&self) -> bool {
        self.mtvu
    }

    pub fn channel(&self) -> &Arc<GsEventChannel> {
        &self.channel
    }

    /// Handle for the worker thread, if a path is worker-owned
    pub fn worker_path(&self) -> Option<WorkerGifPath> {
        self.paths.iter().find_map(|slot| match slot {
            PathSlot::Worker(path) => Some(WorkerGifPath::new(
                Arc::clone(path),
                VuGifBridge::new(Arc::clone(&self.channel), self.log_unknown),
            )),
            PathSlot::Primary(_) => None,
        })
    }

    /// Inspect a path, locking it if the worker owns it
    pub fn with_path<R>(&self, id: GifPathId, f: impl FnOnce(&GifPath) -> R) -> R {
        match &self.paths[id.index()] {
            PathSlot::Primary(path) => f(path),
            PathSlot::Worker(path) => f(&*path.lock()),
        }
    }

    pub(crate) fn with_path_mut<R>(&mut self, id: GifPathId, f: impl FnOnce(&mut GifPath) -> R) -> R {
        match &mut self.paths[id.index()] {
            PathSlot::Primary(path) => f(path),
            PathSlot::Worker(path) => f(&mut *path.lock()),
        }
    }

    fn primary_path(&mut self, id: GifPathId) -> Result<&mut GifPath, PathError> {
        match &mut self.paths[id.index()] {
            PathSlot::Primary(path) => Ok(path),
            PathSlot::Worker(_) => Err(PathError::WorkerOwned(id.number() as usize)),
        }
    }

    /// Deliver unpacked records into a primary-owned path
    pub fn append(&mut self, id: GifPathId, kind: TransferType, bytes: &[u8]) -> Result<(), PathError> {
        self.primary_path(id)?.append(bytes)?;
        self.state.last_transfer = kind;
        Ok(())
    }

    /// Consume records from a primary-owned path until it runs dry or a
    /// SIGNAL stalls it
    pub fn process_path(
        &mut self,
        id: GifPathId,
        gs: &mut GsContext<'_>,
    ) -> Result<ProcessOutcome, PathError> {
        let path = match &mut self.paths[id.index()] {
            PathSlot::Primary(path) => path,
            PathSlot::Worker(_) => return Err(PathError::WorkerOwned(id.number() as usize)),
        };

        let mut outcome = ProcessOutcome::default();
        if path.is_stalled() {
            outcome.stalled = true;
            return Ok(outcome);
        }

        self.state.stat.set_apath(id.number());
        let mut ctx = DispatchContext {
            unit: &mut self.state,
            transfer: &mut self.transfer,
            gs,
        };
        while let Some(record) = path.next_record() {
            outcome.records += 1;
            if self.dispatcher.dispatch(&record, &mut ctx) {
                path.set_stalled(true);
                outcome.stalled = true;
                break;
            }
        }
        self.state.stat.set_path_queued(id.number(), outcome.stalled);
        self.state.stat.set_apath(0);

        path.realign()?;
        Ok(outcome)
    }

    /// Primary-thread poll point: apply worker events, then deliver any
    /// owed FINISH interrupt
    pub fn poll(&mut self, gs: &mut GsContext<'_>) -> GsEventFlags {
        let events = self.channel.apply_pending(&mut self.state, gs);
        IrqController::poll(&mut self.state, gs);
        events
    }

    /// GS_CSR write-back from the GS state owner.
    ///
    /// Writing SIGNAL acknowledges the pending SIGNAL and releases a queued
    /// one; returns true when stalled paths became resumable.
    pub fn write_csr(&mut self, value: u64, gs: &mut GsContext<'_>) -> bool {
        let written = GsCsr::from_bits_truncate(value) & GsCsr::EVENTS;
        let mut resumed = false;

        if written.contains(GsCsr::SIGNAL) {
            gs.regs.csr.remove(GsCsr::SIGNAL);
            if self.state.signal.queued {
                let [data, mask] = self.state.signal.data;
                tracing::debug!("GIF: releasing queued SIGNAL");
                self.state.sig_lbl_id.merge_sigid(data, mask);
                if !gs.regs.signal_masked() {
                    gs.raise_irq();
                }
                gs.regs.csr.insert(GsCsr::SIGNAL);
                self.state.signal.queued = false;

                for slot in &mut self.paths {
                    if let PathSlot::Primary(path) = slot {
                        if path.is_stalled() {
                            path.set_stalled(false);
                            self.state.stat.set_path_queued(path.id().number(), false);
                            resumed = true;
                        }
                    }
                }
            }
        }

        gs.regs.csr.remove(written - GsCsr::SIGNAL);
        resumed
    }
}
