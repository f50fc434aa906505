//! A+D register addresses and named-field accessor types
//!
//! Each accessor wraps a single integer and exposes its hardware fields
//! through explicit shift/mask getters and setters.

/// A+D register addresses handled by the GIF unit
pub mod ad_regs {
    pub const BITBLTBUF: u8 = 0x50;
    pub const TRXPOS: u8 = 0x51;
    pub const TRXREG: u8 = 0x52;
    pub const TRXDIR: u8 = 0x53;
    pub const SIGNAL: u8 = 0x60;
    pub const FINISH: u8 = 0x61;
    pub const LABEL: u8 = 0x62;
    /// First address past the documented GS registers
    pub const UNDOCUMENTED_START: u8 = 0x63;
    pub const NOP: u8 = 0x7F;
}

use ad_regs::*;

/// Size of one A+D record in the path arena (one quad-word)
pub const RECORD_SIZE: usize = 16;

/// Number of bulk-transfer setup registers (BITBLTBUF..=TRXREG)
pub const TRANSFER_REG_COUNT: usize = (TRXREG - BITBLTBUF + 1) as usize;

/// Decoded register selector of an A+D record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdRegister {
    /// BITBLTBUF, TRXPOS or TRXREG; carries the transfer table slot
    TransferSetup(usize),
    TransferDirection,
    Signal,
    Finish,
    Label,
    Nop,
    /// Ordinary GS register with no GIF-side effect
    Passthrough(u8),
    /// Address past the documented register file
    Undocumented(u8),
}

impl AdRegister {
    pub fn from_id(id: u8) -> Self {
        match id {
            BITBLTBUF..=TRXREG => Self::TransferSetup((id - BITBLTBUF) as usize),
            TRXDIR => Self::TransferDirection,
            SIGNAL => Self::Signal,
            FINISH => Self::Finish,
            LABEL => Self::Label,
            NOP => Self::Nop,
            UNDOCUMENTED_START.. => Self::Undocumented(id),
            _ => Self::Passthrough(id),
        }
    }
}

/// One A+D record: 64-bit payload plus register selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdRecord {
    pub data: u64,
    pub reg: u8,
}

impl AdRecord {
    pub fn new(reg: u8, data: u64) -> Self {
        Self { data, reg }
    }

    /// Build a record from a payload split into (data, mask) words
    pub fn with_words(reg: u8, lo: u32, hi: u32) -> Self {
        Self::new(reg, ((hi as u64) << 32) | lo as u64)
    }

    /// Decode a record from the first 16 bytes of `qword`
    pub fn from_qword(qword: &[u8]) -> Option<Self> {
        let bytes: &[u8; RECORD_SIZE] = qword.get(..RECORD_SIZE)?.try_into().ok()?;
        let mut data = [0u8; 8];
        data.copy_from_slice(&bytes[..8]);
        Some(Self {
            data: u64::from_le_bytes(data),
            reg: bytes[8],
        })
    }

    /// Encode as an arena quad-word
    pub fn to_qword(&self) -> [u8; RECORD_SIZE] {
        let mut qword = [0u8; RECORD_SIZE];
        qword[..8].copy_from_slice(&self.data.to_le_bytes());
        qword[8] = self.reg;
        qword
    }

    /// Low payload word (SIGNAL/LABEL data)
    pub fn lo(&self) -> u32 {
        self.data as u32
    }

    /// High payload word (SIGNAL/LABEL mask)
    pub fn hi(&self) -> u32 {
        (self.data >> 32) as u32
    }

    pub fn register(&self) -> AdRegister {
        AdRegister::from_id(self.reg)
    }
}

/// Masked merge used by SIGID and LBLID updates
#[inline]
pub fn merge_masked(existing: u32, data: u32, mask: u32) -> u32 {
    (existing & !mask) | (data & mask)
}

/// Pack a (data, mask) pair as `mask << 32 | data`
#[inline]
pub fn pack_label(data: u32, mask: u32) -> u64 {
    ((mask as u64) << 32) | data as u64
}

/// Split a packed (data, mask) pair
#[inline]
pub fn unpack_label(packed: u64) -> (u32, u32) {
    (packed as u32, (packed >> 32) as u32)
}

/// Merge (data, mask) into a packed pair, accumulating the mask
#[inline]
pub fn merge_packed(existing: u64, data: u32, mask: u32) -> u64 {
    let (old_data, old_mask) = unpack_label(existing);
    pack_label(merge_masked(old_data, data, mask), old_mask | mask)
}

#[inline]
fn field(value: u64, shift: u32, width: u32) -> u64 {
    (value >> shift) & ((1u64 << width) - 1)
}

#[inline]
fn with_field(value: u64, shift: u32, width: u32, field: u64) -> u64 {
    let mask = ((1u64 << width) - 1) << shift;
    (value & !mask) | ((field << shift) & mask)
}

/// BITBLTBUF: source/destination buffer setup for local/host transfers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Bitbltbuf(pub u64);

impl Bitbltbuf {
    pub fn sbp(&self) -> u32 {
        field(self.0, 0, 14) as u32
    }
    pub fn sbw(&self) -> u32 {
        field(self.0, 16, 6) as u32
    }
    pub fn spsm(&self) -> u32 {
        field(self.0, 24, 6) as u32
    }
    pub fn dbp(&self) -> u32 {
        field(self.0, 32, 14) as u32
    }
    pub fn dbw(&self) -> u32 {
        field(self.0, 48, 6) as u32
    }
    pub fn dpsm(&self) -> u32 {
        field(self.0, 56, 6) as u32
    }
    pub fn set_sbp(&mut self, v: u32) {
        self.0 = with_field(self.0, 0, 14, v as u64);
    }
    pub fn set_sbw(&mut self, v: u32) {
        self.0 = with_field(self.0, 16, 6, v as u64);
    }
    pub fn set_spsm(&mut self, v: u32) {
        self.0 = with_field(self.0, 24, 6, v as u64);
    }
    pub fn set_dbp(&mut self, v: u32) {
        self.0 = with_field(self.0, 32, 14, v as u64);
    }
    pub fn set_dbw(&mut self, v: u32) {
        self.0 = with_field(self.0, 48, 6, v as u64);
    }
    pub fn set_dpsm(&mut self, v: u32) {
        self.0 = with_field(self.0, 56, 6, v as u64);
    }
}

/// TRXREG: transfer rectangle in pixels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Trxreg(pub u64);

impl Trxreg {
    pub fn new(width: u32, height: u32) -> Self {
        let mut reg = Self(0);
        reg.set_rrw(width);
        reg.set_rrh(height);
        reg
    }
    pub fn rrw(&self) -> u32 {
        field(self.0, 0, 12) as u32
    }
    pub fn rrh(&self) -> u32 {
        field(self.0, 32, 12) as u32
    }
    pub fn set_rrw(&mut self, v: u32) {
        self.0 = with_field(self.0, 0, 12, v as u64);
    }
    pub fn set_rrh(&mut self, v: u32) {
        self.0 = with_field(self.0, 32, 12, v as u64);
    }
}

/// Direction encoded in TRXDIR.XDIR
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransferDirection {
    #[default]
    HostToLocal,
    LocalToHost,
    LocalToLocal,
    Deactivated,
}

/// TRXDIR: starts a transfer in the given direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Trxdir(pub u64);

impl Trxdir {
    pub fn xdir(&self) -> u32 {
        field(self.0, 0, 2) as u32
    }
    pub fn set_xdir(&mut self, v: u32) {
        self.0 = with_field(self.0, 0, 2, v as u64);
    }
    pub fn direction(&self) -> TransferDirection {
        match self.xdir() {
            0 => TransferDirection::HostToLocal,
            1 => TransferDirection::LocalToHost,
            2 => TransferDirection::LocalToLocal,
            _ => TransferDirection::Deactivated,
        }
    }
}

/// SIGLBLID: SIGNAL and LABEL identifiers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SigLblId(pub u64);

impl SigLblId {
    pub fn sigid(&self) -> u32 {
        field(self.0, 0, 32) as u32
    }
    pub fn lblid(&self) -> u32 {
        field(self.0, 32, 32) as u32
    }
    pub fn set_sigid(&mut self, v: u32) {
        self.0 = with_field(self.0, 0, 32, v as u64);
    }
    pub fn set_lblid(&mut self, v: u32) {
        self.0 = with_field(self.0, 32, 32, v as u64);
    }
    pub fn merge_sigid(&mut self, data: u32, mask: u32) {
        self.set_sigid(merge_masked(self.sigid(), data, mask));
    }
    pub fn merge_lblid(&mut self, data: u32, mask: u32) {
        self.set_lblid(merge_masked(self.lblid(), data, mask));
    }
}

/// GIF_STAT: GIF status register
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GifStat(pub u32);

impl GifStat {
    fn get(&self, shift: u32, width: u32) -> u32 {
        field(self.0 as u64, shift, width) as u32
    }
    fn set(&mut self, shift: u32, width: u32, v: u32) {
        self.0 = with_field(self.0 as u64, shift, width, v as u64) as u32;
    }

    /// Path currently transferring (0 = idle, 1..=3 = PATH1..PATH3)
    pub fn apath(&self) -> u32 {
        self.get(10, 2)
    }
    pub fn set_apath(&mut self, v: u32) {
        self.set(10, 2, v);
    }
    /// Queue-waiting bit for the 1-based path number
    pub fn path_queued(&self, path: u32) -> bool {
        match path {
            1 => self.get(8, 1) != 0,
            2 => self.get(7, 1) != 0,
            3 => self.get(6, 1) != 0,
            _ => false,
        }
    }
    pub fn set_path_queued(&mut self, path: u32, queued: bool) {
        let shift = match path {
            1 => 8,
            2 => 7,
            3 => 6,
            _ => return,
        };
        self.set(shift, 1, queued as u32);
    }
    pub fn oph(&self) -> bool {
        self.get(9, 1) != 0
    }
    pub fn set_oph(&mut self, v: bool) {
        self.set(9, 1, v as u32);
    }
    pub fn dir(&self) -> bool {
        self.get(12, 1) != 0
    }
    pub fn set_dir(&mut self, v: bool) {
        self.set(12, 1, v as u32);
    }
    pub fn fqc(&self) -> u32 {
        self.get(24, 5)
    }
    pub fn set_fqc(&mut self, v: u32) {
        self.set(24, 5, v);
    }
}
