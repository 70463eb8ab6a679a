use crate::axis::tdata_byte::ByteQualifier;
use crate::bits::BitVector;
use crate::error::SimResult;
use crate::signal::SimObject;
use crate::trigger::Trigger;

/// Signal widths of one bus instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BusConfig {
    /// Number of byte lanes in `tdata`.
    pub lanes: usize,
    pub tid_width: usize,
    pub tdest_width: usize,
    pub tuser_width: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            lanes: 4,
            tid_width: 1,
            tdest_width: 1,
            tuser_width: 1,
        }
    }
}

/// One beat as put on the bus by a source.
#[derive(Clone, Debug, PartialEq)]
pub struct Beat {
    /// One entry per lane.
    pub lanes: Vec<ByteQualifier>,
    pub last: bool,
    pub tid: BitVector,
    pub tdest: BitVector,
    pub tuser: BitVector,
}

/// Bus state at a clock edge.
#[derive(Clone, Debug, PartialEq)]
pub struct BusSample {
    pub areset_n: bool,
    pub tvalid: bool,
    pub tready: bool,
    pub tlast: bool,
    pub lanes: Vec<ByteQualifier>,
    pub tid: BitVector,
    pub tdest: BitVector,
    pub tuser: BitVector,
}

impl BusSample {
    pub fn handshake(&self) -> bool {
        self.areset_n && self.tvalid && self.tready
    }

    /// Everything a source must hold stable while stalled.
    pub fn same_payload(&self, other: &BusSample) -> bool {
        self.tlast == other.tlast
            && self.lanes == other.lanes
            && self.tid == other.tid
            && self.tdest == other.tdest
            && self.tuser == other.tuser
    }
}

/// Handle to the signals of one AXI4-Stream bus.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AxisBus {
    pub aclk: SimObject,
    pub areset_n: SimObject,
    pub tvalid: SimObject,
    pub tready: SimObject,
    pub tlast: SimObject,
    pub tkeep: SimObject,
    pub tstrb: SimObject,
    pub tdata: SimObject,
    pub tid: SimObject,
    pub tdest: SimObject,
    pub tuser: SimObject,
    lanes: usize,
}

impl AxisBus {
    /// Declares the bus signals as `<name>.tvalid`, `<name>.tdata`, ...
    pub fn new(name: &str, config: &BusConfig, aclk: SimObject, areset_n: SimObject) -> SimResult<Self> {
        let lanes = config.lanes.max(1);
        let sig = |field: &str, width: usize| SimObject::new(&format!("{}.{}", name, field), width);
        Ok(Self {
            aclk,
            areset_n,
            tvalid: sig("tvalid", 1)?,
            tready: sig("tready", 1)?,
            tlast: sig("tlast", 1)?,
            tkeep: sig("tkeep", lanes)?,
            tstrb: sig("tstrb", lanes)?,
            tdata: sig("tdata", 8 * lanes)?,
            tid: sig("tid", config.tid_width)?,
            tdest: sig("tdest", config.tdest_width)?,
            tuser: sig("tuser", config.tuser_width)?,
            lanes,
        })
    }

    /// Binds to signals already declared under `<name>.`.
    pub fn from_name(name: &str, aclk: SimObject, areset_n: SimObject) -> SimResult<Self> {
        let sig = |field: &str| SimObject::from_name(&format!("{}.{}", name, field));
        let tkeep = sig("tkeep")?;
        Ok(Self {
            aclk,
            areset_n,
            tvalid: sig("tvalid")?,
            tready: sig("tready")?,
            tlast: sig("tlast")?,
            tkeep,
            tstrb: sig("tstrb")?,
            tdata: sig("tdata")?,
            tid: sig("tid")?,
            tdest: sig("tdest")?,
            tuser: sig("tuser")?,
            lanes: tkeep.width().max(1),
        })
    }

    pub fn lane_count(&self) -> usize {
        self.lanes
    }

    pub fn aclk_posedge(&self) -> Trigger {
        self.aclk.rising_edge()
    }

    pub fn get_areset_n(&self) -> bool {
        self.areset_n.bool()
    }
    pub fn get_tvalid(&self) -> bool {
        self.tvalid.bool()
    }
    pub fn set_tvalid(&self, value: bool) {
        self.tvalid.set_bool(value)
    }
    pub fn get_tready(&self) -> bool {
        self.tready.bool()
    }
    pub fn set_tready(&self, value: bool) {
        self.tready.set_bool(value)
    }
    pub fn get_tlast(&self) -> bool {
        self.tlast.bool()
    }
    pub fn set_tlast(&self, value: bool) {
        self.tlast.set_bool(value)
    }

    pub fn get_tkeep(&self, lane: usize) -> bool {
        self.tkeep.bits().get(lane).unwrap_or(false)
    }
    pub fn set_tkeep(&self, lane: usize, value: bool) {
        set_lane_bit(self.tkeep, lane, value)
    }
    pub fn get_tstrb(&self, lane: usize) -> bool {
        self.tstrb.bits().get(lane).unwrap_or(false)
    }
    pub fn set_tstrb(&self, lane: usize, value: bool) {
        set_lane_bit(self.tstrb, lane, value)
    }
    pub fn get_tdata(&self, lane: usize) -> u8 {
        self.tdata.bits().byte(lane)
    }
    pub fn set_tdata(&self, lane: usize, value: u8) {
        // writes of the same delta accumulate
        let mut bits = self.tdata.next_bits();
        bits.set_byte(lane, value);
        self.tdata.set_bits(&bits)
    }

    pub fn get_tid(&self) -> BitVector {
        self.tid.bits()
    }
    pub fn set_tid(&self, value: &BitVector) {
        self.tid.set_bits(value)
    }
    pub fn get_tdest(&self) -> BitVector {
        self.tdest.bits()
    }
    pub fn set_tdest(&self, value: &BitVector) {
        self.tdest.set_bits(value)
    }
    pub fn get_tuser(&self) -> BitVector {
        self.tuser.bits()
    }
    pub fn set_tuser(&self, value: &BitVector) {
        self.tuser.set_bits(value)
    }

    /// Puts `beat` on the bus and asserts valid.
    pub fn drive(&self, beat: &Beat) {
        let mut keep = BitVector::new(self.lanes);
        let mut strb = BitVector::new(self.lanes);
        let mut data = BitVector::new(8 * self.lanes);
        for (lane, byte) in beat.lanes.iter().take(self.lanes).enumerate() {
            let (k, s) = byte.kind.signals();
            keep.set_bit(lane, k);
            strb.set_bit(lane, s);
            data.set_byte(lane, byte.data);
        }
        self.tkeep.set_bits(&keep);
        self.tstrb.set_bits(&strb);
        self.tdata.set_bits(&data);
        self.set_tlast(beat.last);
        self.set_tid(&beat.tid);
        self.set_tdest(&beat.tdest);
        self.set_tuser(&beat.tuser);
        self.set_tvalid(true);
    }

    /// Reads every signal of the bus at once.
    pub fn sample(&self) -> BusSample {
        let keep = self.tkeep.bits();
        let strb = self.tstrb.bits();
        let data = self.tdata.bits();
        let lanes = (0..self.lanes)
            .map(|lane| {
                ByteQualifier::from_signals(
                    data.byte(lane),
                    keep.get(lane).unwrap_or(false),
                    strb.get(lane).unwrap_or(false),
                )
            })
            .collect();
        BusSample {
            areset_n: self.get_areset_n(),
            tvalid: self.get_tvalid(),
            tready: self.get_tready(),
            tlast: self.get_tlast(),
            lanes,
            tid: self.get_tid(),
            tdest: self.get_tdest(),
            tuser: self.get_tuser(),
        }
    }
}

fn set_lane_bit(signal: SimObject, lane: usize, value: bool) {
    let mut bits = signal.next_bits();
    if lane < bits.width() {
        bits.set_bit(lane, value);
        signal.set_bits(&bits)
    }
}

/// Clock and active-low reset shared by all agents.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResetIf {
    pub aclk: SimObject,
    pub areset_n: SimObject,
}

impl ResetIf {
    pub fn new(aclk: SimObject, areset_n: SimObject) -> Self {
        Self { aclk, areset_n }
    }
    pub fn aclk_posedge(&self) -> Trigger {
        self.aclk.rising_edge()
    }
    pub fn get_areset_n(&self) -> bool {
        self.areset_n.bool()
    }
    pub fn set_areset_n(&self, value: bool) {
        self.areset_n.set_bool(value)
    }
}
