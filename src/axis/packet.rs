use std::fmt;

use crate::axis::tdata_byte::{ByteQualifier, CountedKinds};
use crate::bits::BitVector;

/// Packet reconstructed from the beats observed on a bus.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Packet {
    pub tid: BitVector,
    pub tdest: BitVector,
    /// One entry per beat.
    pub tuser: Vec<BitVector>,
    /// Every lane of every beat, in bus order.
    pub tdata: Vec<ByteQualifier>,
    /// Capture time of each entry of `tdata`.
    pub tdata_timestamp: Vec<u64>,
    /// Capture time of each beat.
    pub transfer_timestamp: Vec<u64>,
    /// Lanes of the bus the packet was captured on.
    pub bus_size: usize,
}

impl Packet {
    pub fn new(tid: BitVector, tdest: BitVector) -> Self {
        Self {
            tid,
            tdest,
            ..Self::default()
        }
    }

    pub fn push_beat(&mut self, lanes: &[ByteQualifier], tuser: BitVector, time: u64) {
        self.bus_size = lanes.len();
        self.tuser.push(tuser);
        self.transfer_timestamp.push(time);
        self.tdata.extend_from_slice(lanes);
        self.tdata_timestamp.extend(std::iter::repeat(time).take(lanes.len()));
    }

    pub fn transfers(&self) -> usize {
        self.transfer_timestamp.len()
    }

    /// Counted bytes with their index into `tdata`.
    pub fn payload(&self, counted: CountedKinds) -> impl Iterator<Item = (usize, &ByteQualifier)> + '_ {
        self.tdata
            .iter()
            .enumerate()
            .filter(move |(_, byte)| counted.counts(byte.kind))
    }

    /// Logical length: number of counted bytes.
    pub fn len(&self, counted: CountedKinds) -> usize {
        self.payload(counted).count()
    }

    pub fn is_empty(&self) -> bool {
        self.tdata.is_empty()
    }

    /// Values of the counted bytes.
    pub fn bytes(&self, counted: CountedKinds) -> Vec<u8> {
        self.payload(counted).map(|(_, byte)| byte.data).collect()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tid={} tdest={} data:", self.tid, self.tdest)?;
        for (_, byte) in self.payload(CountedKinds::default()) {
            write!(f, " {:02x}", byte.data)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axis::tdata_byte::ByteKind;

    #[test]
    fn counted_length_skips_padding() {
        let mut packet = Packet::new(BitVector::from_value(1, 2), BitVector::new(1));
        packet.push_beat(&[ByteQualifier::from(1u8), ByteQualifier::from(2u8)], BitVector::new(1), 10);
        packet.push_beat(
            &[ByteQualifier::new(3, ByteKind::Reserved), ByteQualifier::null()],
            BitVector::new(1),
            20,
        );
        assert_eq!(packet.transfers(), 2);
        assert_eq!(packet.bus_size, 2);
        assert_eq!(packet.len(CountedKinds::default()), 3);
        assert_eq!(packet.len(CountedKinds::DATA_ONLY), 2);
        assert_eq!(packet.len(CountedKinds::ALL), 4);
        assert_eq!(packet.bytes(CountedKinds::default()), vec![1, 2, 3]);
        assert_eq!(packet.tdata_timestamp, vec![10, 10, 20, 20]);
        assert_eq!(packet.to_string(), "tid=2'h1 tdest=1'h0 data: 01 02 03");
    }
}
