//! Structured description of a packet pair that failed comparison.
//!
//! The scoreboard builds a [`MismatchReport`] and hands it to a
//! [`ReportPrinter`]; formatting is entirely the printer's business.

use prettytable::{format, Cell, Row, Table};

use crate::axis::packet::Packet;
use crate::axis::tdata_byte::{ByteKind, CountedKinds};
use crate::bits::BitVector;

/// Which fields take part in the packet comparison.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompareConfig {
    /// Byte kinds that make up the logical payload.
    pub counted: CountedKinds,
    /// Compare the kind of each counted byte, not only its value.
    pub strict_qualifiers: bool,
    /// Compare the per-beat `tuser` sequence.
    pub compare_tuser: bool,
}

impl Default for CompareConfig {
    fn default() -> Self {
        Self {
            counted: CountedKinds::default(),
            strict_qualifiers: true,
            compare_tuser: true,
        }
    }
}

/// Header of one side of the report.
#[derive(Clone, Debug, PartialEq)]
pub struct PacketSummary {
    pub first_timestamp: Option<u64>,
    pub last_timestamp: Option<u64>,
    pub transfers: usize,
    pub bus_width_bits: usize,
    pub tid: BitVector,
    pub tid_width: usize,
    pub tdest: BitVector,
    pub tdest_width: usize,
    pub tuser_width: usize,
    pub length: usize,
}

impl PacketSummary {
    pub fn new(packet: &Packet, counted: CountedKinds) -> Self {
        Self {
            first_timestamp: packet.transfer_timestamp.first().copied(),
            last_timestamp: packet.transfer_timestamp.last().copied(),
            transfers: packet.transfers(),
            bus_width_bits: 8 * packet.bus_size,
            tid: packet.tid.clone(),
            tid_width: packet.tid.width(),
            tdest: packet.tdest.clone(),
            tdest_width: packet.tdest.width(),
            tuser_width: packet.tuser.first().map_or(0, |t| t.width()),
            length: packet.len(counted),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ByteRecord {
    pub data: u8,
    pub kind: ByteKind,
    pub timestamp: u64,
}

/// Counted byte `index` of both packets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReportRow {
    pub index: usize,
    pub rx: Option<ByteRecord>,
    pub tx: Option<ByteRecord>,
    pub mismatch: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MismatchReport {
    /// Position of the pair in the compared streams.
    pub pair: usize,
    pub rx: PacketSummary,
    pub tx: PacketSummary,
    pub tid_mismatch: bool,
    pub tdest_mismatch: bool,
    pub tuser_mismatch: bool,
    pub rows: Vec<ReportRow>,
}

fn records(packet: &Packet, counted: CountedKinds) -> Vec<ByteRecord> {
    packet
        .payload(counted)
        .map(|(i, byte)| ByteRecord {
            data: byte.data,
            kind: byte.kind,
            timestamp: packet.tdata_timestamp[i],
        })
        .collect()
}

impl MismatchReport {
    /// Compares `rx` (reference) with `tx` (observed). `None` if they are equal.
    pub fn compare(pair: usize, rx: &Packet, tx: &Packet, config: &CompareConfig) -> Option<Self> {
        let rx_bytes = records(rx, config.counted);
        let tx_bytes = records(tx, config.counted);
        let rows: Vec<ReportRow> = (0..rx_bytes.len().max(tx_bytes.len()))
            .map(|index| {
                let rx = rx_bytes.get(index).copied();
                let tx = tx_bytes.get(index).copied();
                let mismatch = match (rx, tx) {
                    (Some(r), Some(t)) => {
                        r.data != t.data || (config.strict_qualifiers && r.kind != t.kind)
                    }
                    _ => true,
                };
                ReportRow {
                    index,
                    rx,
                    tx,
                    mismatch,
                }
            })
            .collect();

        let tid_mismatch = rx.tid != tx.tid;
        let tdest_mismatch = rx.tdest != tx.tdest;
        let tuser_mismatch = config.compare_tuser && rx.tuser != tx.tuser;
        if !(tid_mismatch || tdest_mismatch || tuser_mismatch || rows.iter().any(|r| r.mismatch)) {
            return None;
        }
        Some(Self {
            pair,
            rx: PacketSummary::new(rx, config.counted),
            tx: PacketSummary::new(tx, config.counted),
            tid_mismatch,
            tdest_mismatch,
            tuser_mismatch,
            rows,
        })
    }

    pub fn mismatched_rows(&self) -> impl Iterator<Item = &ReportRow> + '_ {
        self.rows.iter().filter(|row| row.mismatch)
    }

    /// Header table: one row per field, one column per side.
    pub fn summary_table(&self) -> Table {
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
        table.set_titles(Row::new(vec![
            Cell::new("field"),
            Cell::new("rx"),
            Cell::new("tx"),
        ]));
        let opt = |t: Option<u64>| t.map_or("-".to_string(), |t| t.to_string());
        let mut add = |field: &str, rx: String, tx: String| {
            table.add_row(Row::new(vec![Cell::new(field), Cell::new(&rx), Cell::new(&tx)]));
        };
        add("timestamp.start", opt(self.rx.first_timestamp), opt(self.tx.first_timestamp));
        add("timestamp.end", opt(self.rx.last_timestamp), opt(self.tx.last_timestamp));
        add("transfers", self.rx.transfers.to_string(), self.tx.transfers.to_string());
        add("bus.width", self.rx.bus_width_bits.to_string(), self.tx.bus_width_bits.to_string());
        add("tid", self.rx.tid.to_string(), self.tx.tid.to_string());
        add("tid.width", self.rx.tid_width.to_string(), self.tx.tid_width.to_string());
        add("tdest", self.rx.tdest.to_string(), self.tx.tdest.to_string());
        add("tdest.width", self.rx.tdest_width.to_string(), self.tx.tdest_width.to_string());
        add("tuser.width", self.rx.tuser_width.to_string(), self.tx.tuser_width.to_string());
        add("tdata.length", self.rx.length.to_string(), self.tx.length.to_string());
        table
    }

    /// Byte table with the mismatched rows only.
    pub fn rows_table(&self) -> Table {
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
        table.set_titles(Row::new(vec![
            Cell::new("index"),
            Cell::new("rx"),
            Cell::new("tx"),
        ]));
        let cell = |record: Option<ByteRecord>| match record {
            Some(b) => Cell::new(&format!("{}, 0x{:02x} ({})", b.timestamp, b.data, b.kind)),
            None => Cell::new("-"),
        };
        for row in self.mismatched_rows() {
            table.add_row(Row::new(vec![
                Cell::new(&row.index.to_string()),
                cell(row.rx),
                cell(row.tx),
            ]));
        }
        table
    }
}

/// Receives the report of every mismatched packet pair.
pub trait ReportPrinter {
    fn print(&mut self, report: &MismatchReport);
}

/// Renders reports as tables through `log::error!`.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogPrinter;

impl ReportPrinter for LogPrinter {
    fn print(&mut self, report: &MismatchReport) {
        let mut header = Vec::new();
        if report.tid_mismatch {
            header.push("tid");
        }
        if report.tdest_mismatch {
            header.push("tdest");
        }
        if report.tuser_mismatch {
            header.push("tuser");
        }
        log::error!(
            "Packets mismatch (pair {}{}):\n{}\n{}",
            report.pair,
            if header.is_empty() {
                String::new()
            } else {
                format!(", differing {}", header.join("/"))
            },
            report.summary_table(),
            report.rows_table()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axis::tdata_byte::ByteQualifier;

    fn packet(bytes: &[u8]) -> Packet {
        let mut packet = Packet::new(BitVector::new(1), BitVector::new(1));
        for (i, chunk) in bytes.chunks(4).enumerate() {
            let mut lanes: Vec<ByteQualifier> = chunk.iter().copied().map(ByteQualifier::from).collect();
            lanes.resize(4, ByteQualifier::null());
            packet.push_beat(&lanes, BitVector::new(1), 10 * i as u64);
        }
        packet
    }

    #[test]
    fn equal_packets_have_no_report() {
        let config = CompareConfig::default();
        assert_eq!(MismatchReport::compare(0, &packet(&[1, 2, 3]), &packet(&[1, 2, 3]), &config), None);
    }

    #[test]
    fn only_the_differing_index_is_flagged() {
        let rx = packet(&[0, 1, 2, 3, 4, 5]);
        let tx = packet(&[0, 1, 2, 3, 0xff, 5]);
        let report = MismatchReport::compare(3, &rx, &tx, &CompareConfig::default()).unwrap();
        let flagged: Vec<usize> = report.mismatched_rows().map(|r| r.index).collect();
        assert_eq!(flagged, vec![4]);
        assert_eq!(report.rows.len(), 6);
        assert_eq!(report.rows[4].tx.unwrap().timestamp, 10);
        assert!(!report.tid_mismatch && !report.tdest_mismatch);
        assert_eq!(report.rx.transfers, 2);
        assert_eq!(report.rx.bus_width_bits, 32);
        assert!(report.rows_table().to_string().contains("0xff"));
    }

    #[test]
    fn length_and_header_differences() {
        let rx = packet(&[1, 2, 3]);
        let mut tx = packet(&[1, 2]);
        tx.tdest = BitVector::from_value(1, 1);
        let report = MismatchReport::compare(0, &rx, &tx, &CompareConfig::default()).unwrap();
        assert!(report.tdest_mismatch);
        assert_eq!(report.rows.len(), 3);
        assert_eq!(report.rows[2].tx, None);
        assert!(report.rows[2].mismatch);
        assert_eq!((report.rx.length, report.tx.length), (3, 2));
        LogPrinter.print(&report);
    }

    #[test]
    fn qualifier_strictness_is_configurable() {
        let rx = packet(&[1, 2]);
        let mut tx = packet(&[1, 2]);
        tx.tdata[1].kind = ByteKind::Reserved;
        let strict = CompareConfig::default();
        assert!(MismatchReport::compare(0, &rx, &tx, &strict).is_some());
        let lenient = CompareConfig {
            strict_qualifiers: false,
            ..strict
        };
        assert_eq!(MismatchReport::compare(0, &rx, &tx, &lenient), None);
    }

    #[test]
    fn tuser_difference_is_flagged_unless_ignored() {
        let rx = packet(&[1, 2, 3, 4, 5]);
        let mut tx = packet(&[1, 2, 3, 4, 5]);
        tx.tuser[1] = BitVector::from_value(1, 1);
        let report = MismatchReport::compare(2, &rx, &tx, &CompareConfig::default()).unwrap();
        assert!(report.tuser_mismatch);
        assert!(!report.tid_mismatch && !report.tdest_mismatch);
        assert_eq!(report.mismatched_rows().count(), 0);
        let relaxed = CompareConfig {
            compare_tuser: false,
            ..CompareConfig::default()
        };
        assert_eq!(MismatchReport::compare(2, &rx, &tx, &relaxed), None);
    }

    #[test]
    fn log_printer_renders_with_logger_installed() {
        let _ = env_logger::builder().is_test(true).try_init();
        let rx = packet(&[7]);
        let tx = packet(&[8]);
        let report = MismatchReport::compare(0, &rx, &tx, &CompareConfig::default()).unwrap();
        LogPrinter.print(&report);
        let summary = report.summary_table().to_string();
        assert!(summary.contains("tdata.length"), "{}", summary);
        assert_eq!(report.mismatched_rows().count(), 1);
    }
}
