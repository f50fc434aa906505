//! GIF transfer paths
//!
//! Each of PATH1..PATH3 owns a fixed-capacity arena holding A+D records that
//! have been delivered by the unpacking layer but not yet consumed. Records
//! are consumed strictly in append order.

use crate::registers::{AdRecord, RECORD_SIZE};
use crossbeam::queue::SegQueue;
use og_core::PathError;
use std::sync::Arc;

/// GIF path identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GifPathId {
    /// VU1 XGKICK
    Path1,
    /// VIF1 DIRECT/DIRECTHL
    Path2,
    /// GIF DMA / FIFO
    Path3,
}

impl GifPathId {
    pub const ALL: [GifPathId; 3] = [GifPathId::Path1, GifPathId::Path2, GifPathId::Path3];

    /// Zero-based index
    pub fn index(self) -> usize {
        self as usize
    }

    /// Path number as the hardware reports it in GIF_STAT.APATH
    pub fn number(self) -> u32 {
        self as u32 + 1
    }

    pub fn from_index(index: usize) -> Result<Self, PathError> {
        Self::ALL
            .get(index)
            .copied()
            .ok_or(PathError::InvalidPath(index))
    }
}

/// Thread that consumes a path's records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathOwner {
    Primary,
    Worker,
}

impl PathOwner {
    pub fn to_u8(self) -> u8 {
        match self {
            Self::Primary => 0,
            Self::Worker => 1,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Primary),
            1 => Some(Self::Worker),
            _ => None,
        }
    }
}

/// Span of arena bytes handed to the downstream transfer engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GsPacket {
    pub offset: usize,
    pub size: usize,
}

/// Downstream side of a path's pending packet queue
#[derive(Debug, Clone)]
pub struct PacketDrain {
    queue: Arc<SegQueue<GsPacket>>,
}

impl PacketDrain {
    pub fn pop(&self) -> Option<GsPacket> {
        self.queue.pop()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Take every queued packet
    pub fn drain(&self) -> Vec<GsPacket> {
        std::iter::from_fn(|| self.queue.pop()).collect()
    }
}

/// One transfer path and its record arena
#[derive(Debug)]
pub struct GifPath {
    id: GifPathId,
    owner: PathOwner,
    buffer: Box<[u8]>,
    cur_size: usize,
    read_amount: usize,
    /// Stopped on a queued SIGNAL until the CSR write-back
    stalled: bool,
    pending: Arc<SegQueue<GsPacket>>,
}

impl GifPath {
    pub fn new(id: GifPathId, capacity: usize, owner: PathOwner) -> Self {
        Self {
            id,
            owner,
            buffer: vec![0u8; capacity].into_boxed_slice(),
            cur_size: 0,
            read_amount: 0,
            stalled: false,
            pending: Arc::new(SegQueue::new()),
        }
    }

    pub fn id(&self) -> GifPathId {
        self.id
    }

    pub fn owner(&self) -> PathOwner {
        self.owner
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Bytes currently valid in the arena
    pub fn cur_size(&self) -> usize {
        self.cur_size
    }

    /// Bytes consumed but not yet compacted out
    pub fn read_amount(&self) -> usize {
        self.read_amount
    }

    /// Bytes appended but not yet consumed
    pub fn unread(&self) -> usize {
        self.cur_size - self.read_amount
    }

    pub fn is_stalled(&self) -> bool {
        self.stalled
    }

    pub(crate) fn set_stalled(&mut self, stalled: bool) {
        self.stalled = stalled;
    }

    /// Valid arena contents, including consumed bytes not yet compacted
    pub fn data(&self) -> &[u8] {
        &self.buffer[..self.cur_size]
    }

    /// Append delivered bytes after the current tail
    pub fn append(&mut self, bytes: &[u8]) -> Result<(), PathError> {
        let needed = self.cur_size + bytes.len();
        if needed > self.capacity() {
            return Err(PathError::Overflow {
                path: self.id.number() as usize,
                needed,
                capacity: self.capacity(),
            });
        }
        self.buffer[self.cur_size..needed].copy_from_slice(bytes);
        self.cur_size = needed;
        Ok(())
    }

    /// Consume the next complete record, if any
    pub fn next_record(&mut self) -> Option<AdRecord> {
        if self.unread() < RECORD_SIZE {
            return None;
        }
        let record = AdRecord::from_qword(&self.buffer[self.read_amount..self.cur_size])?;
        self.read_amount += RECORD_SIZE;
        Some(record)
    }

    /// Move unconsumed bytes to the arena start.
    ///
    /// Compaction under a running worker would tear its reads, so
    /// worker-owned paths are refused.
    pub fn realign(&mut self) -> Result<(), PathError> {
        if self.owner == PathOwner::Worker {
            return Err(PathError::WorkerOwned(self.id.number() as usize));
        }
        if self.read_amount == 0 {
            return Ok(());
        }
        self.buffer.copy_within(self.read_amount..self.cur_size, 0);
        self.cur_size -= self.read_amount;
        self.read_amount = 0;
        Ok(())
    }

    /// Packets handed downstream and not yet drained
    pub fn pending_packet_depth(&self) -> usize {
        self.pending.len()
    }

    /// Handle for the downstream engine to drain this path's packets
    pub fn packet_drain(&self) -> PacketDrain {
        PacketDrain {
            queue: Arc::clone(&self.pending),
        }
    }

    /// Hand everything consumed since the last packet downstream
    pub(crate) fn push_packet(&mut self, offset: usize) {
        let size = self.read_amount.saturating_sub(offset);
        if size > 0 {
            self.pending.push(GsPacket { offset, size });
        }
    }

    /// Reset a fully consumed path once downstream has drained it
    pub fn retire_drained(&mut self) -> bool {
        if self.pending.is_empty() && self.read_amount == self.cur_size && self.cur_size > 0 {
            self.cur_size = 0;
            self.read_amount = 0;
            true
        } else {
            false
        }
    }

    /// Replace the arena contents with persisted bytes.
    ///
    /// The consumption cursor and the packet queue are transient and
    /// always come back empty.
    pub(crate) fn restore(&mut self, bytes: &[u8], stalled: bool) {
        self.buffer[..bytes.len()].copy_from_slice(bytes);
        self.cur_size = bytes.len();
        self.read_amount = 0;
        self.stalled = stalled;
        while self.pending.pop().is_some() {}
    }
}
