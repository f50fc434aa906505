//! Worker-thread view of the VU1-owned path

use crate::bridge::VuGifBridge;
use crate::path::{GifPath, PacketDrain};
use og_core::PathError;
use parking_lot::Mutex;
use std::sync::Arc;

/// Handle moved onto the VU1 worker thread in MTVU mode.
///
/// The path mutex is only contended at quiescence points, when the primary
/// thread inspects the path for a save state.
#[derive(Debug, Clone)]
pub struct WorkerGifPath {
    path: Arc<Mutex<GifPath>>,
    bridge: VuGifBridge,
}

impl WorkerGifPath {
    pub(crate) fn new(path: Arc<Mutex<GifPath>>, bridge: VuGifBridge) -> Self {
        Self { path, bridge }
    }

    /// XGKICK: append `bytes`, interpret every complete record and hand the
    /// consumed span downstream as one packet.
    ///
    /// Returns the number of records handled.
    pub fn kick(&self, bytes: &[u8]) -> Result<usize, PathError> {
        let mut path = self.path.lock();
        path.retire_drained();
        path.append(bytes)?;

        let start = path.read_amount();
        let mut records = 0;
        while let Some(record) = path.next_record() {
            self.bridge.dispatch(&record);
            records += 1;
        }
        path.push_packet(start);
        Ok(records)
    }

    /// Reset the path once downstream has drained every packet
    pub fn retire_drained(&self) -> bool {
        self.path.lock().retire_drained()
    }

    /// Downstream handle for this path's packets
    pub fn packets(&self) -> PacketDrain {
        self.path.lock().packet_drain()
    }

    pub fn bridge(&self) -> &VuGifBridge {
        &self.bridge
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{GsEventChannel, GsEventFlags};
    use crate::path::{GifPathId, GsPacket, PathOwner};
    use crate::registers::{ad_regs, AdRecord};

    fn worker(capacity: usize) -> WorkerGifPath {
        let path = GifPath::new(GifPathId::Path1, capacity, PathOwner::Worker);
        WorkerGifPath::new(
            Arc::new(Mutex::new(path)),
            VuGifBridge::new(Arc::new(GsEventChannel::new()), false),
        )
    }

    #[test]
    fn test_kick_publishes_one_packet_per_call() {
        let worker = worker(64);
        let drain = worker.packets();
        let label = AdRecord::with_words(ad_regs::LABEL, 1, 1).to_qword();

        assert_eq!(worker.kick(&label).unwrap(), 1);
        assert_eq!(worker.kick(&label).unwrap(), 1);
        assert_eq!(
            drain.drain(),
            vec![GsPacket { offset: 0, size: 16 }, GsPacket { offset: 16, size: 16 }]
        );
        assert_eq!(worker.bridge().channel().pending(), GsEventFlags::LABEL);

        // Drained packets let the next kick start from an empty arena
        assert_eq!(worker.kick(&label).unwrap(), 1);
        assert_eq!(drain.pop(), Some(GsPacket { offset: 0, size: 16 }));
    }

    #[test]
    fn test_kick_overflow_leaves_path_untouched() {
        let worker = worker(32);
        let _drain = worker.packets();
        worker.kick(&[0u8; 32]).unwrap();

        let err = worker.kick(&[0u8; 16]).unwrap_err();
        assert!(matches!(err, PathError::Overflow { path: 1, needed: 48, capacity: 32 }));
        assert!(!worker.retire_drained());
    }
}
