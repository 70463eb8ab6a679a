use std::fmt;

/// Classification of one data lane by its `tkeep`/`tstrb` qualifiers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ByteKind {
    /// `tkeep && tstrb`: payload byte.
    Data,
    /// `!tkeep && !tstrb`: lane carries nothing.
    Null,
    /// `tkeep && !tstrb`: position byte, occupies a slot but holds no data.
    Position,
    /// `!tkeep && tstrb`: reserved combination.
    Reserved,
}

impl ByteKind {
    pub const ALL: [ByteKind; 4] = [
        ByteKind::Data,
        ByteKind::Null,
        ByteKind::Position,
        ByteKind::Reserved,
    ];

    pub fn from_signals(keep: bool, strb: bool) -> Self {
        match (keep, strb) {
            (true, true) => ByteKind::Data,
            (true, false) => ByteKind::Position,
            (false, true) => ByteKind::Reserved,
            (false, false) => ByteKind::Null,
        }
    }

    /// `(tkeep, tstrb)` that put a byte of this kind on the bus.
    pub fn signals(self) -> (bool, bool) {
        match self {
            ByteKind::Data => (true, true),
            ByteKind::Position => (true, false),
            ByteKind::Reserved => (false, true),
            ByteKind::Null => (false, false),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ByteKind::Data => "data",
            ByteKind::Null => "null",
            ByteKind::Position => "position",
            ByteKind::Reserved => "reserved",
        }
    }
}

impl fmt::Display for ByteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A data byte together with its lane qualifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ByteQualifier {
    pub data: u8,
    pub kind: ByteKind,
}

impl ByteQualifier {
    pub fn new(data: u8, kind: ByteKind) -> Self {
        Self { data, kind }
    }

    pub fn from_signals(data: u8, keep: bool, strb: bool) -> Self {
        Self::new(data, ByteKind::from_signals(keep, strb))
    }

    /// Padding lane: `tkeep = tstrb = 0`, data zero.
    pub fn null() -> Self {
        Self::new(0, ByteKind::Null)
    }

    pub fn is_data(&self) -> bool {
        self.kind == ByteKind::Data
    }
}

/// Raw bytes are payload bytes.
impl From<u8> for ByteQualifier {
    fn from(data: u8) -> Self {
        Self::new(data, ByteKind::Data)
    }
}

impl fmt::Display for ByteQualifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02x} ({})", self.data, self.kind)
    }
}

/// Set of byte kinds that count toward the logical length of a packet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CountedKinds {
    pub data: bool,
    pub null: bool,
    pub position: bool,
    pub reserved: bool,
}

impl CountedKinds {
    pub const DATA_ONLY: Self = Self {
        data: true,
        null: false,
        position: false,
        reserved: false,
    };
    pub const DATA_AND_RESERVED: Self = Self {
        data: true,
        null: false,
        position: false,
        reserved: true,
    };
    pub const DATA_AND_POSITION: Self = Self {
        data: true,
        null: false,
        position: true,
        reserved: false,
    };
    pub const ALL: Self = Self {
        data: true,
        null: true,
        position: true,
        reserved: true,
    };

    pub fn counts(&self, kind: ByteKind) -> bool {
        match kind {
            ByteKind::Data => self.data,
            ByteKind::Null => self.null,
            ByteKind::Position => self.position,
            ByteKind::Reserved => self.reserved,
        }
    }
}

impl Default for CountedKinds {
    fn default() -> Self {
        Self::DATA_AND_RESERVED
    }
}
