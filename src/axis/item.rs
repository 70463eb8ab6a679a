use std::fmt;

use crate::axis::tdata_byte::ByteQualifier;
use crate::bits::BitVector;
use crate::range::Range;

/// How a driver finished an item.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransferStatus {
    Completed { beats: usize },
    /// Reset was asserted while the item was in flight.
    Dropped,
}

/// Request to send one packet.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SourceItem {
    pub payload: Vec<ByteQualifier>,
    pub tid: BitVector,
    pub tdest: BitVector,
    /// `tuser` of beat `n` is `tuser[n % tuser.len()]`; zero when empty.
    pub tuser: Vec<BitVector>,
    /// Idle cycles inserted before each beat.
    pub idle: Range,
    /// Stalled cycles tolerated before giving up, 0 waits forever.
    pub timeout: usize,
}

impl SourceItem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Item carrying `bytes` as payload bytes.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self::new().data(bytes)
    }

    pub fn data(mut self, bytes: &[u8]) -> Self {
        self.payload = bytes.iter().copied().map(ByteQualifier::from).collect();
        self
    }

    pub fn payload(mut self, payload: Vec<ByteQualifier>) -> Self {
        self.payload = payload;
        self
    }

    pub fn push(&mut self, byte: impl Into<ByteQualifier>) {
        self.payload.push(byte.into());
    }

    pub fn tid(mut self, tid: BitVector) -> Self {
        self.tid = tid;
        self
    }

    pub fn tdest(mut self, tdest: BitVector) -> Self {
        self.tdest = tdest;
        self
    }

    /// One `tuser` value shared by every beat.
    pub fn tuser(mut self, tuser: BitVector) -> Self {
        self.tuser = vec![tuser];
        self
    }

    pub fn tuser_per_beat(mut self, tuser: Vec<BitVector>) -> Self {
        self.tuser = tuser;
        self
    }

    pub fn idle(mut self, idle: impl Into<Range>) -> Self {
        self.idle = idle.into();
        self
    }

    pub fn timeout(mut self, cycles: usize) -> Self {
        self.timeout = cycles;
        self
    }

    pub fn tuser_for(&self, beat: usize) -> BitVector {
        match self.tuser.len() {
            0 => BitVector::default(),
            len => self.tuser[beat % len].clone(),
        }
    }

    /// Beats needed to send the payload over `lanes` lanes.
    pub fn beats(&self, lanes: usize) -> usize {
        let lanes = lanes.max(1);
        (self.payload.len() + lanes - 1) / lanes
    }
}

impl fmt::Display for SourceItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tid={} tdest={} data:", self.tid, self.tdest)?;
        for byte in &self.payload {
            write!(f, " {:02x}", byte.data)?;
        }
        Ok(())
    }
}

/// Request to accept `packets` packets under randomized backpressure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SinkItem {
    /// 0 makes an idle-only item: ready is held low for one drawn gap.
    pub packets: usize,
    /// Cycles with ready low between packets.
    pub idle: Range,
    /// Cycles with ready high and no valid tolerated, 0 waits forever.
    pub timeout: usize,
}

impl Default for SinkItem {
    fn default() -> Self {
        Self {
            packets: 1,
            idle: Range::default(),
            timeout: 0,
        }
    }
}

impl SinkItem {
    pub fn new(packets: usize) -> Self {
        Self {
            packets,
            ..Self::default()
        }
    }

    pub fn idle(mut self, idle: impl Into<Range>) -> Self {
        self.idle = idle.into();
        self
    }

    pub fn timeout(mut self, cycles: usize) -> Self {
        self.timeout = cycles;
        self
    }
}

/// Assert reset for `duration` cycles, then wait `idle` cycles.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResetItem {
    pub duration: usize,
    pub idle: usize,
}

impl ResetItem {
    pub fn new(duration: usize, idle: usize) -> Self {
        Self { duration, idle }
    }
}
