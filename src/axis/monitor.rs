use std::collections::HashMap;

use futures_channel::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::axis::bus_if::{AxisBus, BusSample};
use crate::axis::packet::Packet;
use crate::axis::tdata_byte::{ByteKind, CountedKinds};
use crate::bits::BitVector;
use crate::tb_obj::TbObj;
use crate::utils::sim_time_steps;

/// Rebuilds packets from bus samples, one accumulator per `(tid, tdest)`.
#[derive(Default)]
pub struct PacketAssembler {
    packets: HashMap<(BitVector, BitVector), Packet>,
}

impl PacketAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds the bus state of one edge. Returns the packet completed by it.
    pub fn sample(&mut self, sample: &BusSample, time: u64) -> Option<Packet> {
        if !sample.areset_n {
            self.packets.clear();
            return None;
        }
        if !sample.handshake() {
            return None;
        }
        let key = (sample.tid.clone(), sample.tdest.clone());
        let packet = self
            .packets
            .entry(key.clone())
            .or_insert_with(|| Packet::new(key.0.clone(), key.1.clone()));
        packet.push_beat(&sample.lanes, sample.tuser.clone(), time);
        if sample.tlast {
            self.packets.remove(&key)
        } else {
            None
        }
    }

    /// Packets started but not finished yet.
    pub fn in_flight(&self) -> usize {
        self.packets.len()
    }

    pub fn clear(&mut self) {
        self.packets.clear();
    }
}

/// Counters kept by a monitor.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MonitorStats {
    pub protocol_violations: usize,
    pub packets: usize,
    pub beats: usize,
    pub data_bytes: usize,
    pub null_bytes: usize,
    pub position_bytes: usize,
    pub reserved_bytes: usize,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
}

impl MonitorStats {
    fn count_kind(&mut self, kind: ByteKind) {
        match kind {
            ByteKind::Data => self.data_bytes += 1,
            ByteKind::Null => self.null_bytes += 1,
            ByteKind::Position => self.position_bytes += 1,
            ByteKind::Reserved => self.reserved_bytes += 1,
        }
    }

    fn count_packet(&mut self, packet: &Packet) {
        let len = packet.len(CountedKinds::default());
        self.packets += 1;
        self.min_length = Some(self.min_length.map_or(len, |m| m.min(len)));
        self.max_length = Some(self.max_length.map_or(len, |m| m.max(len)));
    }
}

struct MonitorInner {
    assembler: PacketAssembler,
    subscribers: Vec<UnboundedSender<Packet>>,
    stats: MonitorStats,
    // sample of the previous edge, for the stall checks
    prev: Option<BusSample>,
}

/// Passive agent: reconstructs packets from a bus and publishes them.
#[derive(Clone)]
pub struct Monitor {
    name: String,
    bus: AxisBus,
    checks_enable: bool,
    coverage_enable: bool,
    inner: TbObj<MonitorInner>,
}

impl Monitor {
    pub fn new(name: &str, bus: AxisBus) -> Self {
        Self {
            name: name.to_string(),
            bus,
            checks_enable: false,
            coverage_enable: false,
            inner: TbObj::new(MonitorInner {
                assembler: PacketAssembler::new(),
                subscribers: Vec::new(),
                stats: MonitorStats::default(),
                prev: None,
            }),
        }
    }

    pub fn checks_enable(mut self, enable: bool) -> Self {
        self.checks_enable = enable;
        self
    }

    pub fn coverage_enable(mut self, enable: bool) -> Self {
        self.coverage_enable = enable;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Analysis port: every reconstructed packet is sent to every subscriber
    /// in completion order.
    pub fn subscribe(&self) -> UnboundedReceiver<Packet> {
        let (tx, rx) = mpsc::unbounded();
        self.inner.get_mut().subscribers.push(tx);
        rx
    }

    pub fn stats(&self) -> MonitorStats {
        self.inner.get().stats.clone()
    }

    /// Samples the bus on every rising edge. Never returns.
    pub async fn run(self) {
        log::info!("{}: run phase", self.name);
        loop {
            self.bus.aclk_posedge().await;
            let sample = self.bus.sample();
            self.observe(sample, sim_time_steps());
        }
    }

    /// Processes the bus state of one edge.
    pub fn observe(&self, sample: BusSample, time: u64) {
        let mut inner = self.inner.get_mut();
        if self.checks_enable {
            self.check(&mut inner, &sample);
        }
        if self.coverage_enable && sample.handshake() {
            inner.stats.beats += 1;
            for byte in &sample.lanes {
                inner.stats.count_kind(byte.kind);
            }
        }
        if let Some(packet) = inner.assembler.sample(&sample, time) {
            log::debug!("{}: packet {}", self.name, packet);
            if self.coverage_enable {
                inner.stats.count_packet(&packet);
            }
            // drop closed ports
            inner
                .subscribers
                .retain(|tx| tx.unbounded_send(packet.clone()).is_ok());
        }
        inner.prev = Some(sample);
    }

    fn check(&self, inner: &mut MonitorInner, sample: &BusSample) {
        let mut violations = Vec::new();
        if sample.handshake() {
            if let Some(lane) = sample
                .lanes
                .iter()
                .position(|byte| byte.kind == ByteKind::Reserved)
            {
                violations.push(format!("reserved tkeep/tstrb combination on lane {}", lane));
            }
        }
        if let Some(prev) = inner.prev.as_ref() {
            let stalled = prev.areset_n && sample.areset_n && prev.tvalid && !prev.tready;
            if stalled && !sample.tvalid {
                violations.push("tvalid deasserted before handshake".to_string());
            } else if stalled && !prev.same_payload(sample) {
                violations.push("payload changed while stalled".to_string());
            }
        }
        for violation in violations {
            log::warn!("{}: protocol violation: {}", self.name, violation);
            inner.stats.protocol_violations += 1;
        }
    }
}
