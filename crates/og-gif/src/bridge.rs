//! Worker-to-primary handoff of SIGNAL, FINISH and LABEL events
//!
//! When VU1 runs on its own thread, A+D records on its path are interpreted
//! there, but the canonical [`UnitState`] and the GS registers belong to the
//! primary thread. The worker therefore only publishes events into a
//! [`GsEventChannel`]; the primary picks them up at its poll points and
//! applies them with the same rules as the [`RegisterDispatcher`].
//!
//! Ordering: payload cells are written relaxed and published by a release
//! `fetch_or` on the pending-event word; the primary reads that word with
//! acquire before touching the payload.
//!
//! [`RegisterDispatcher`]: crate::dispatcher::RegisterDispatcher

use crate::gs::{GsContext, GsCsr};
use crate::registers::{merge_packed, pack_label, unpack_label, AdRecord, AdRegister};
use crate::state::UnitState;
use bitflags::bitflags;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

bitflags! {
    /// Events published by the worker and not yet consumed
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct GsEventFlags: u32 {
        const SIGNAL = 1 << 0;
        const FINISH = 1 << 1;
        const LABEL  = 1 << 2;
    }
}

/// Lock-free cells shared between the worker and primary threads
#[derive(Debug, Default)]
pub struct GsEventChannel {
    /// `mask << 32 | data` of the latest SIGNAL
    signal: AtomicU64,
    /// Accumulated `mask << 32 | data` of LABEL writes
    label: AtomicU64,
    pending: AtomicU32,
}

impl GsEventChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events currently waiting for the primary thread
    pub fn pending(&self) -> GsEventFlags {
        GsEventFlags::from_bits_truncate(self.pending.load(Ordering::Acquire))
    }

    /// Publish a SIGNAL. Returns false if one was already pending; the new
    /// payload replaces it.
    pub fn post_signal(&self, data: u32, mask: u32) -> bool {
        let double = self.pending().contains(GsEventFlags::SIGNAL);
        if double {
            tracing::error!("GIF Handler MTVU - Double SIGNAL Not Handled");
        }
        self.signal.store(pack_label(data, mask), Ordering::Relaxed);
        self.pending
            .fetch_or(GsEventFlags::SIGNAL.bits(), Ordering::Release);
        !double
    }

    /// Publish a FINISH. Returns false if one was already pending.
    pub fn post_finish(&self) -> bool {
        let old = self
            .pending
            .fetch_or(GsEventFlags::FINISH.bits(), Ordering::Release);
        if old & GsEventFlags::FINISH.bits() != 0 {
            tracing::error!("GIF Handler MTVU - Double FINISH Not Handled");
            return false;
        }
        true
    }

    /// Merge a LABEL write into the shared cell.
    ///
    /// The compare-exchange loop has no retry bound. It still terminates
    /// because the masked merge commutes and is idempotent, so every retry
    /// recomputes a valid result against whatever the other writer left.
    pub fn post_label(&self, data: u32, mask: u32) {
        let mut existing = self.label.load(Ordering::Relaxed);
        loop {
            let wanted = merge_packed(existing, data, mask);
            match self.label.compare_exchange_weak(
                existing,
                wanted,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => existing = actual,
            }
        }
        self.pending
            .fetch_or(GsEventFlags::LABEL.bits(), Ordering::Release);
    }

    /// Peek at the accumulated label without consuming it
    pub fn label(&self) -> (u32, u32) {
        unpack_label(self.label.load(Ordering::Acquire))
    }

    /// Consume every pending event on the primary thread.
    ///
    /// Returns the set of events applied.
    pub fn apply_pending(&self, unit: &mut UnitState, gs: &mut GsContext<'_>) -> GsEventFlags {
        let events = self.pending();
        if events.is_empty() {
            return events;
        }

        if events.contains(GsEventFlags::SIGNAL) {
            let (data, mask) = unpack_label(self.signal.load(Ordering::Relaxed));
            // Payload is read before the bit drops: a racing post either lands
            // before the read or sees the bit still set and reports a double
            self.pending
                .fetch_and(!GsEventFlags::SIGNAL.bits(), Ordering::Release);
            apply_signal(unit, gs, data, mask);
        }

        if events.contains(GsEventFlags::FINISH) {
            self.pending
                .fetch_and(!GsEventFlags::FINISH.bits(), Ordering::Relaxed);
            tracing::trace!("Finish firing");
            if unit.finish.pending {
                tracing::warn!("GIF Handler - Double FINISH");
            }
            unit.finish.fired = false;
            unit.finish.pending = true;
        }

        if events.contains(GsEventFlags::LABEL) {
            // Bit first, then the cell: a merge landing in between stays in
            // the cell with its bit set again for the next poll
            self.pending
                .fetch_and(!GsEventFlags::LABEL.bits(), Ordering::Acquire);
            let (data, mask) = unpack_label(self.label.swap(0, Ordering::Relaxed));
            unit.sig_lbl_id.merge_lblid(data, mask);
        }

        events
    }
}

fn apply_signal(unit: &mut UnitState, gs: &mut GsContext<'_>, data: u32, mask: u32) {
    if gs.regs.csr.contains(GsCsr::SIGNAL) {
        tracing::warn!("SIGNAL firing while previous SIGNAL unacknowledged");
        if !unit.signal.queued {
            unit.signal.queued = true;
            unit.signal.data = [data, mask];
        }
        return;
    }

    tracing::trace!("SIGNAL firing");
    unit.sig_lbl_id.merge_sigid(data, mask);
    if !gs.regs.signal_masked() {
        gs.raise_irq();
    }
    gs.regs.csr.insert(GsCsr::SIGNAL);
}

/// Worker-side A+D interpreter that only talks to the event channel
#[derive(Debug, Clone)]
pub struct VuGifBridge {
    channel: Arc<GsEventChannel>,
    log_unknown: bool,
}

impl VuGifBridge {
    pub fn new(channel: Arc<GsEventChannel>, log_unknown: bool) -> Self {
        Self {
            channel,
            log_unknown,
        }
    }

    pub fn channel(&self) -> &Arc<GsEventChannel> {
        &self.channel
    }

    /// Handle one record on the worker thread. Never stalls.
    pub fn dispatch(&self, record: &AdRecord) {
        match AdRegister::from_id(record.reg & 0x7F) {
            AdRegister::Signal => {
                tracing::trace!("GIF Handler - SIGNAL");
                self.channel.post_signal(record.lo(), record.hi());
            }
            AdRegister::Finish => {
                tracing::trace!("GIF Handler - FINISH");
                self.channel.post_finish();
            }
            AdRegister::Label => {
                tracing::trace!("GIF Handler - LABEL");
                self.channel.post_label(record.lo(), record.hi());
            }
            AdRegister::Undocumented(reg) => {
                if self.log_unknown {
                    tracing::debug!("GIF Handler MTVU - Write to unknown register! [reg={:x}]", reg);
                } else {
                    tracing::trace!("GIF Handler MTVU - Write to unknown register! [reg={:x}]", reg);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gs::{GsImr, GsRegs, IrqCounter};
    use crate::registers::ad_regs;

    fn unmasked() -> GsRegs {
        GsRegs {
            csr: GsCsr::empty(),
            imr: GsImr::empty(),
        }
    }

    struct LogSink(Arc<parking_lot::Mutex<Vec<u8>>>);

    impl std::io::Write for LogSink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    /// Run `f` under a trace-level subscriber and return what it logged
    fn captured_logs(f: impl FnOnce()) -> String {
        let buf = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = Arc::clone(&buf);
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .with_writer(move || LogSink(Arc::clone(&sink)))
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        let bytes = buf.lock().clone();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    #[test]
    fn test_signal_handoff() {
        let channel = GsEventChannel::new();
        assert!(channel.post_signal(0x0000_1234, 0x0000_FFFF));
        assert_eq!(channel.pending(), GsEventFlags::SIGNAL);

        let mut unit = UnitState::new();
        let mut regs = unmasked();
        let mut irq = IrqCounter::default();
        let applied = channel.apply_pending(&mut unit, &mut GsContext::new(&mut regs, &mut irq));

        assert_eq!(applied, GsEventFlags::SIGNAL);
        assert_eq!(unit.sig_lbl_id.sigid(), 0x0000_1234);
        assert!(regs.csr.contains(GsCsr::SIGNAL));
        assert_eq!(irq.raised, 1);
        assert!(channel.pending().is_empty());
    }

    #[test]
    fn test_double_signal_overwrites() {
        let channel = GsEventChannel::new();
        assert!(channel.post_signal(1, 0xFF));
        assert!(!channel.post_signal(2, 0xFF));

        let mut unit = UnitState::new();
        let mut regs = unmasked();
        let mut irq = IrqCounter::default();
        channel.apply_pending(&mut unit, &mut GsContext::new(&mut regs, &mut irq));
        assert_eq!(unit.sig_lbl_id.sigid(), 2);
        assert_eq!(irq.raised, 1);
    }

    #[test]
    fn test_signal_queued_when_csr_pending() {
        let channel = GsEventChannel::new();
        channel.post_signal(0xAB, 0xFF);

        let mut unit = UnitState::new();
        let mut regs = unmasked();
        regs.csr.insert(GsCsr::SIGNAL);
        let mut irq = IrqCounter::default();
        channel.apply_pending(&mut unit, &mut GsContext::new(&mut regs, &mut irq));

        assert!(unit.signal.queued);
        assert_eq!(unit.signal.data, [0xAB, 0xFF]);
        assert_eq!(irq.raised, 0);
    }

    #[test]
    fn test_double_finish_single_bit() {
        let channel = GsEventChannel::new();
        assert!(channel.post_finish());
        assert!(!channel.post_finish());
        assert_eq!(channel.pending(), GsEventFlags::FINISH);

        let mut unit = UnitState::new();
        let mut regs = unmasked();
        let mut irq = IrqCounter::default();
        channel.apply_pending(&mut unit, &mut GsContext::new(&mut regs, &mut irq));
        assert!(unit.finish.pending);
        assert!(!unit.finish.fired);
        assert_eq!(irq.raised, 0);
        assert!(channel.pending().is_empty());
    }

    #[test]
    fn test_labels_coalesce() {
        let channel = GsEventChannel::new();
        channel.post_label(0x0000_00AA, 0x0000_00FF);
        channel.post_label(0x0000_BB00, 0x0000_FF00);
        assert_eq!(channel.label(), (0x0000_BBAA, 0x0000_FFFF));

        let mut unit = UnitState::new();
        unit.sig_lbl_id.set_lblid(0x1111_1111);
        let mut regs = unmasked();
        let mut irq = IrqCounter::default();
        channel.apply_pending(&mut unit, &mut GsContext::new(&mut regs, &mut irq));

        assert_eq!(unit.sig_lbl_id.lblid(), 0x1111_BBAA);
        assert_eq!(channel.label(), (0, 0));
        assert_eq!(irq.raised, 0);
    }

    #[test]
    fn test_bridge_dispatch_masks_selector() {
        let channel = Arc::new(GsEventChannel::new());
        let bridge = VuGifBridge::new(Arc::clone(&channel), true);

        bridge.dispatch(&AdRecord::with_words(ad_regs::LABEL | 0x80, 5, 0xF));
        bridge.dispatch(&AdRecord::new(ad_regs::FINISH, 0));
        bridge.dispatch(&AdRecord::new(0x70, 0));
        bridge.dispatch(&AdRecord::new(ad_regs::BITBLTBUF, 0));

        assert_eq!(channel.pending(), GsEventFlags::LABEL | GsEventFlags::FINISH);
        assert_eq!(channel.label(), (5, 0xF));
    }

    #[test]
    fn test_apply_with_nothing_pending() {
        let channel = GsEventChannel::new();
        let mut unit = UnitState::new();
        let mut regs = unmasked();
        let mut irq = IrqCounter::default();
        let applied = channel.apply_pending(&mut unit, &mut GsContext::new(&mut regs, &mut irq));
        assert!(applied.is_empty());
        assert_eq!(unit, UnitState::new());
    }

    #[test]
    fn test_signal_applied_on_one_poll_only() {
        let channel = GsEventChannel::new();
        let mut unit = UnitState::new();
        let mut regs = unmasked();
        let mut irq = IrqCounter::default();

        channel.post_signal(0xA, 0xFF);
        channel.apply_pending(&mut unit, &mut GsContext::new(&mut regs, &mut irq));
        regs.csr.remove(GsCsr::SIGNAL);
        let again = channel.apply_pending(&mut unit, &mut GsContext::new(&mut regs, &mut irq));
        assert!(again.is_empty());
        assert_eq!(irq.raised, 1);
        assert!(!unit.signal.queued);

        channel.post_signal(0xB, 0xFF);
        channel.apply_pending(&mut unit, &mut GsContext::new(&mut regs, &mut irq));
        regs.csr.remove(GsCsr::SIGNAL);
        channel.apply_pending(&mut unit, &mut GsContext::new(&mut regs, &mut irq));
        assert_eq!(unit.sig_lbl_id.sigid(), 0xB);
        assert_eq!(irq.raised, 2);
    }

    #[test]
    fn test_worker_finish_over_pending_finish_warns() {
        let channel = GsEventChannel::new();
        let mut unit = UnitState::new();
        unit.finish.pending = true;
        let mut regs = unmasked();
        let mut irq = IrqCounter::default();
        channel.post_finish();

        let logs = captured_logs(|| {
            channel.apply_pending(&mut unit, &mut GsContext::new(&mut regs, &mut irq));
        });
        assert!(logs.contains("Double FINISH"), "{logs}");
        assert!(unit.finish.pending);
        assert!(!unit.finish.fired);
    }

    #[test]
    fn test_worker_unknown_register_traced_when_not_logged() {
        let bridge = VuGifBridge::new(Arc::new(GsEventChannel::new()), false);
        let logs = captured_logs(|| bridge.dispatch(&AdRecord::new(0x70, 0)));
        assert!(logs.contains("TRACE"), "{logs}");
        assert!(logs.contains("unknown register! [reg=70]"), "{logs}");
        assert!(bridge.channel().pending().is_empty());
    }
}
