//! AXI4-Stream verification components.

pub mod bus_if;
pub mod item;
pub mod monitor;
pub mod packet;
pub mod report;
pub mod reset;
pub mod scoreboard;
pub mod sequence;
pub mod sink;
pub mod source;
pub mod tdata_byte;
pub mod testbench;

pub use bus_if::{AxisBus, Beat, BusConfig, BusSample, ResetIf};
pub use item::{ResetItem, SinkItem, SourceItem, TransferStatus};
pub use monitor::{Monitor, MonitorStats, PacketAssembler};
pub use packet::Packet;
pub use report::{CompareConfig, LogPrinter, MismatchReport, ReportPrinter};
pub use reset::ResetDriver;
pub use scoreboard::Scoreboard;
pub use sequence::{ResetSequence, SequenceStats, SinkSequence, SourceSequence, StreamSequence};
pub use sink::{SinkConfig, SinkDriver};
pub use source::SourceDriver;
pub use tdata_byte::{ByteKind, ByteQualifier, CountedKinds};
pub use testbench::{Testbench, TestbenchConfig};
