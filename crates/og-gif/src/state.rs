//! Unit-level GIF state owned by the primary thread

use crate::registers::{
    Bitbltbuf, GifStat, SigLblId, Trxdir, Trxreg, TransferDirection, TRANSFER_REG_COUNT,
};

/// A SIGNAL held back while the previous one awaits acknowledgement
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingSignal {
    pub queued: bool,
    /// `[data, mask]`
    pub data: [u32; 2],
}

/// Two-phase FINISH tracking
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingFinish {
    /// Interrupt already raised for the current cycle
    pub fired: bool,
    /// FINISH written, not yet observed by the IRQ poll
    pub pending: bool,
}

/// Source of the most recent transfer into the unit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransferType {
    #[default]
    Invalid,
    Xgkick,
    DirectHl,
    Direct,
    Dma,
    Fifo,
    Mtvu,
}

impl TransferType {
    pub fn to_u32(self) -> u32 {
        match self {
            Self::Invalid => 0x000,
            Self::Xgkick => 0x100,
            Self::DirectHl => 0x200,
            Self::Direct => 0x300,
            Self::Dma => 0x400,
            Self::Fifo => 0x500,
            Self::Mtvu => 0x600,
        }
    }

    pub fn from_u32(value: u32) -> Option<Self> {
        Some(match value {
            0x000 => Self::Invalid,
            0x100 => Self::Xgkick,
            0x200 => Self::DirectHl,
            0x300 => Self::Direct,
            0x400 => Self::Dma,
            0x500 => Self::Fifo,
            0x600 => Self::Mtvu,
            _ => return None,
        })
    }
}

/// Canonical unit state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnitState {
    pub stat: GifStat,
    pub signal: PendingSignal,
    pub finish: PendingFinish,
    pub sig_lbl_id: SigLblId,
    pub last_transfer: TransferType,
}

impl UnitState {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Bulk-transfer setup registers captured from A+D writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferRegisters {
    /// Raw BITBLTBUF, TRXPOS, TRXREG
    pub regs: [u64; TRANSFER_REG_COUNT],
    pub direction: TransferDirection,
    /// Last valid source pixel depth
    pub bits_per_pixel: u32,
    /// Expected local->host transfer size in quad-words
    pub download_size: u32,
}

impl Default for TransferRegisters {
    fn default() -> Self {
        Self {
            regs: [0; TRANSFER_REG_COUNT],
            direction: TransferDirection::default(),
            bits_per_pixel: 32,
            download_size: 0,
        }
    }
}

impl TransferRegisters {
    pub fn bitbltbuf(&self) -> Bitbltbuf {
        Bitbltbuf(self.regs[0])
    }

    pub fn trxpos(&self) -> u64 {
        self.regs[1]
    }

    pub fn trxreg(&self) -> Trxreg {
        Trxreg(self.regs[2])
    }

    /// Apply a TRXDIR write.
    ///
    /// Returns false when the source pixel format is illegal; the previous
    /// pixel depth is kept in that case.
    pub fn start_transfer(&mut self, trxdir: Trxdir) -> bool {
        self.direction = trxdir.direction();
        if self.direction != TransferDirection::LocalToHost {
            return true;
        }

        let valid = match bits_per_pixel(self.bitbltbuf().spsm()) {
            Some(bpp) => {
                self.bits_per_pixel = bpp;
                true
            }
            None => false,
        };

        // Quad-word granularity, remainder dropped
        let rect = self.trxreg();
        let bits = rect.rrw() as u64 * rect.rrh() as u64 * self.bits_per_pixel as u64;
        self.download_size = (bits >> 7) as u32;
        valid
    }
}

/// Source pixel depth for the low three SPSM bits
pub fn bits_per_pixel(spsm: u32) -> Option<u32> {
    match spsm & 7 {
        0 => Some(32),
        1 => Some(24),
        2 => Some(16),
        3 => Some(8),
        _ => None,
    }
}
