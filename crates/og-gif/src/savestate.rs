//! GIF unit save states
//!
//! Binary format (little-endian, fixed width, in this order):
//!   tag         u32 length + "Gif Unit"
//!   version     u32
//!   mtvu        u8
//!   GIF_STAT    u32
//!   SIGNAL      queued u8, data u32, mask u32
//!   FINISH      fired u8, pending u8
//!   SIGLBLID    u64
//!   last type   u32
//!   PATH1..3    owner u8, stalled u8, capacity u32, curSize u32,
//!               readAmount u32, pending packets u32, curSize raw bytes
//!
//! readAmount and the pending packet count are written for diagnostics only
//! and are never restored.

use crate::path::{GifPath, GifPathId, PathOwner};
use crate::registers::{GifStat, SigLblId};
use crate::state::{PendingFinish, PendingSignal, TransferType, UnitState};
use crate::unit::{GifUnit, PathSlot};
use og_core::{Quiescence, SaveStateError};
use std::path::Path;

const SECTION_TAG: &str = "Gif Unit";
const VERSION: u32 = 1;

/// Outcome of a successful restore
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThawReport {
    /// Save state was taken with the other worker-mode setting
    pub mtvu_mismatch: bool,
}

struct StateWriter {
    buf: Vec<u8>,
}

impl StateWriter {
    fn new() -> Self {
        Self { buf: Vec::new() }
    }

    fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }
    fn write_bool(&mut self, v: bool) {
        self.buf.push(v as u8);
    }
    fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }
    fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }
    fn write_len(&mut self, v: usize) {
        self.write_u32(v as u32);
    }
    fn write_bytes(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

struct StateReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> StateReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], SaveStateError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or(SaveStateError::Truncated(self.pos))?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], SaveStateError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    fn read_u8(&mut self) -> Result<u8, SaveStateError> {
        Ok(self.read_array::<1>()?[0])
    }
    fn read_bool(&mut self, field: &'static str) -> Result<bool, SaveStateError> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            v => Err(SaveStateError::InvalidField {
                field,
                value: v as u64,
            }),
        }
    }
    fn read_u32(&mut self) -> Result<u32, SaveStateError> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }
    fn read_u64(&mut self) -> Result<u64, SaveStateError> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }
    fn read_len(&mut self) -> Result<usize, SaveStateError> {
        Ok(self.read_u32()? as usize)
    }
}

/// One path as read from the stream, before it is applied
struct StagedPath<'a> {
    stalled: bool,
    bytes: &'a [u8],
}

fn check_quiescent(path: &GifPath) -> Result<(), SaveStateError> {
    if path.read_amount() != 0 || path.pending_packet_depth() != 0 {
        return Err(SaveStateError::PathNotQuiescent {
            path: path.id().number() as usize,
            read_amount: path.read_amount(),
            pending: path.pending_packet_depth(),
        });
    }
    Ok(())
}

impl GifUnit {
    /// Snapshot the unit.
    ///
    /// Blocks until the worker is idle. Primary-owned paths are compacted
    /// first; a worker-owned path must already have nothing in flight.
    pub fn freeze(&mut self, quiesce: &dyn Quiescence) -> Result<Vec<u8>, SaveStateError> {
        quiesce.wait_idle();

        if !self.channel().pending().is_empty() {
            tracing::warn!(
                "GIF: freezing with unconsumed worker events {:?}",
                self.channel().pending()
            );
        }

        for slot in &mut self.paths {
            match slot {
                PathSlot::Primary(path) => path.realign()?,
                PathSlot::Worker(path) => check_quiescent(&path.lock())?,
            }
        }

        let mut w = StateWriter::new();
        w.write_len(SECTION_TAG.len());
        w.write_bytes(SECTION_TAG.as_bytes());
        w.write_u32(VERSION);

        w.write_bool(self.is_mtvu());
        write_unit_state(&mut w, &self.state);

        for id in GifPathId::ALL {
            self.with_path(id, |path| {
                w.write_u8(path.owner().to_u8());
                w.write_bool(path.is_stalled());
                w.write_len(path.capacity());
                w.write_len(path.cur_size());
                w.write_len(path.read_amount());
                w.write_len(path.pending_packet_depth());
                w.write_bytes(path.data());
            });
        }

        tracing::debug!("GIF: froze {} bytes", w.buf.len());
        Ok(w.into_bytes())
    }

    /// Restore a snapshot taken by [`GifUnit::freeze`].
    ///
    /// The stream is fully validated before any state is replaced. Path
    /// ownership follows the live configuration; a worker-mode mismatch is
    /// reported, not reconciled.
    pub fn thaw(
        &mut self,
        bytes: &[u8],
        quiesce: &dyn Quiescence,
    ) -> Result<ThawReport, SaveStateError> {
        quiesce.wait_idle();

        for id in GifPathId::ALL {
            self.with_path(id, check_quiescent)?;
        }

        let mut r = StateReader::new(bytes);
        let tag_len = r.read_len()?;
        let tag = r.read_bytes(tag_len)?;
        if tag != SECTION_TAG.as_bytes() {
            return Err(SaveStateError::BadTag {
                expected: SECTION_TAG.to_string(),
                found: String::from_utf8_lossy(tag).into_owned(),
            });
        }
        let version = r.read_u32()?;
        if version != VERSION {
            return Err(SaveStateError::UnsupportedVersion(version));
        }

        let saved_mtvu = r.read_bool("mtvu")?;
        let state = read_unit_state(&mut r)?;

        let mut staged = Vec::with_capacity(GifPathId::ALL.len());
        for id in GifPathId::ALL {
            let owner = r.read_u8()?;
            if PathOwner::from_u8(owner).is_none() {
                return Err(SaveStateError::InvalidField {
                    field: "path owner",
                    value: owner as u64,
                });
            }
            let stalled = r.read_bool("path stalled")?;
            let _saved_capacity = r.read_len()?;
            let cur_size = r.read_len()?;
            let _read_amount = r.read_len()?;
            let _pending = r.read_len()?;

            let capacity = self.with_path(id, |path| path.capacity());
            if cur_size > capacity {
                return Err(SaveStateError::CapacityExceeded {
                    path: id.number() as usize,
                    size: cur_size,
                    capacity,
                });
            }
            staged.push(StagedPath {
                stalled,
                bytes: r.read_bytes(cur_size)?,
            });
        }

        let mut report = ThawReport::default();
        if saved_mtvu != self.is_mtvu() {
            tracing::warn!("gifUnit: MTVU Mode has switched between save/load state");
            report.mtvu_mismatch = true;
        }

        self.state = state;
        for (id, path) in GifPathId::ALL.into_iter().zip(staged) {
            self.with_path_mut(id, |live| live.restore(path.bytes, path.stalled));
        }

        tracing::debug!("GIF: thawed {} bytes", r.pos);
        Ok(report)
    }

    /// Freeze the unit into a file
    pub fn save_state(&mut self, path: &Path, quiesce: &dyn Quiescence) -> og_core::Result<()> {
        let bytes = self.freeze(quiesce)?;
        std::fs::write(path, bytes)?;
        tracing::info!("GIF: saved state to {}", path.display());
        Ok(())
    }

    /// Thaw the unit from a file written by [`GifUnit::save_state`]
    pub fn load_state(
        &mut self,
        path: &Path,
        quiesce: &dyn Quiescence,
    ) -> og_core::Result<ThawReport> {
        let bytes = std::fs::read(path)?;
        let report = self.thaw(&bytes, quiesce)?;
        tracing::info!("GIF: loaded state from {}", path.display());
        Ok(report)
    }
}

fn write_unit_state(w: &mut StateWriter, state: &UnitState) {
    w.write_u32(state.stat.0);
    w.write_bool(state.signal.queued);
    w.write_u32(state.signal.data[0]);
    w.write_u32(state.signal.data[1]);
    w.write_bool(state.finish.fired);
    w.write_bool(state.finish.pending);
    w.write_u64(state.sig_lbl_id.0);
    w.write_u32(state.last_transfer.to_u32());
}

fn read_unit_state(r: &mut StateReader<'_>) -> Result<UnitState, SaveStateError> {
    let stat = GifStat(r.read_u32()?);
    let signal = PendingSignal {
        queued: r.read_bool("signal queued")?,
        data: [r.read_u32()?, r.read_u32()?],
    };
    let finish = PendingFinish {
        fired: r.read_bool("finish fired")?,
        pending: r.read_bool("finish pending")?,
    };
    let sig_lbl_id = SigLblId(r.read_u64()?);
    let raw_type = r.read_u32()?;
    let last_transfer =
        TransferType::from_u32(raw_type).ok_or(SaveStateError::InvalidField {
            field: "last transfer type",
            value: raw_type as u64,
        })?;

    Ok(UnitState {
        stat,
        signal,
        finish,
        sig_lbl_id,
        last_transfer,
    })
}
