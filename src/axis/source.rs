use rand::rngs::StdRng;
use rand::Rng;

use crate::axis::bus_if::{AxisBus, Beat};
use crate::axis::item::{SourceItem, TransferStatus};
use crate::axis::tdata_byte::ByteQualifier;
use crate::error::{SimResult, VerifyError};
use crate::tb_obj::TbObj;
use crate::utils::agent_rng;

/// What the source does with the bus after an edge.
#[derive(Clone, Debug, PartialEq)]
pub enum SourceStep {
    /// Keep the outstanding beat on the bus.
    Hold,
    /// Idle cycle, valid low.
    Idle,
    Drive(Beat),
    Done(TransferStatus),
    /// The sink stalled longer than the item allows.
    Timeout { cycles: usize },
}

/// Per-item source state machine, advanced once per rising edge.
/// Idle gaps count down on every edge whether or not ready is high, so
/// valid never waits on ready.
pub struct SourceTransfer<'a> {
    item: &'a SourceItem,
    lanes: usize,
    // payload bytes already put on the bus
    offset: usize,
    beats_driven: usize,
    beats_accepted: usize,
    outstanding: bool,
    idle: usize,
    stall: usize,
    done: bool,
}

impl<'a> SourceTransfer<'a> {
    pub fn new(item: &'a SourceItem, lanes: usize, rng: &mut impl Rng) -> Self {
        Self {
            item,
            lanes: lanes.max(1),
            offset: 0,
            beats_driven: 0,
            beats_accepted: 0,
            outstanding: false,
            idle: item.idle.pick(rng),
            stall: item.timeout,
            done: false,
        }
    }

    pub fn beats_driven(&self) -> usize {
        self.beats_driven
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Advances the machine with the bus state sampled at this edge.
    pub fn step(&mut self, areset_n: bool, tready: bool, rng: &mut impl Rng) -> SourceStep {
        if self.done {
            return SourceStep::Done(TransferStatus::Completed {
                beats: self.beats_accepted,
            });
        }
        if !areset_n {
            self.done = true;
            return SourceStep::Done(TransferStatus::Dropped);
        }
        if self.outstanding {
            if tready {
                self.outstanding = false;
                self.stall = self.item.timeout;
                self.beats_accepted += 1;
            } else {
                if self.item.timeout > 0 {
                    if self.stall == 0 {
                        self.done = true;
                        return SourceStep::Timeout {
                            cycles: self.item.timeout,
                        };
                    }
                    self.stall -= 1;
                }
                return SourceStep::Hold;
            }
        }
        if self.offset >= self.item.payload.len() {
            self.done = true;
            return SourceStep::Done(TransferStatus::Completed {
                beats: self.beats_accepted,
            });
        }
        if self.idle > 0 {
            self.idle -= 1;
            return SourceStep::Idle;
        }
        let beat = self.next_beat();
        self.idle = self.item.idle.pick(rng);
        self.outstanding = true;
        SourceStep::Drive(beat)
    }

    fn next_beat(&mut self) -> Beat {
        let payload = &self.item.payload;
        let end = (self.offset + self.lanes).min(payload.len());
        let mut lanes = payload[self.offset..end].to_vec();
        lanes.resize(self.lanes, ByteQualifier::null());
        self.offset = end;
        let beat = Beat {
            lanes,
            last: end == payload.len(),
            tid: self.item.tid.clone(),
            tdest: self.item.tdest.clone(),
            tuser: self.item.tuser_for(self.beats_driven),
        };
        self.beats_driven += 1;
        beat
    }
}

/// Active agent turning `SourceItem`s into bus beats.
#[derive(Clone)]
pub struct SourceDriver {
    name: String,
    bus: AxisBus,
    rng: TbObj<StdRng>,
    errors: TbObj<Vec<VerifyError>>,
}

impl SourceDriver {
    pub fn new(name: &str, bus: AxisBus, seed: u64) -> Self {
        Self {
            name: name.to_string(),
            bus,
            rng: TbObj::new(agent_rng(seed, name)),
            errors: TbObj::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bus(&self) -> AxisBus {
        self.bus
    }

    /// Timeouts raised so far.
    pub fn errors(&self) -> Vec<VerifyError> {
        self.errors.get().clone()
    }

    /// Sends `item`, one state machine step per rising edge. Valid is low
    /// when this returns.
    pub async fn transfer(&self, item: &SourceItem) -> SimResult<TransferStatus> {
        log::debug!("{}: sending {}", self.name, item);
        let mut xfer = self
            .rng
            .with_mut(|rng| SourceTransfer::new(item, self.bus.lane_count(), rng));
        loop {
            let step = self.rng.with_mut(|rng| {
                xfer.step(self.bus.get_areset_n(), self.bus.get_tready(), rng)
            });
            match step {
                SourceStep::Hold => {}
                SourceStep::Idle => self.bus.set_tvalid(false),
                SourceStep::Drive(beat) => self.bus.drive(&beat),
                SourceStep::Done(status) => {
                    if xfer.beats_driven() > 0 {
                        self.bus.set_tvalid(false);
                    }
                    if status == TransferStatus::Dropped {
                        log::debug!("{}: transfer dropped by reset", self.name);
                    }
                    return Ok(status);
                }
                SourceStep::Timeout { cycles } => {
                    self.bus.set_tvalid(false);
                    let err = VerifyError::ProtocolTimeout {
                        agent: self.name.clone(),
                        cycles,
                    };
                    log::error!("{}", err);
                    self.errors.get_mut().push(err.clone());
                    return Err(err);
                }
            }
            self.bus.aclk_posedge().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bits::BitVector;
    use crate::range::Range;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(3)
    }

    fn drive(step: SourceStep) -> Beat {
        match step {
            SourceStep::Drive(beat) => beat,
            other => panic!("expected a beat, got {:?}", other),
        }
    }

    #[test]
    fn nine_bytes_over_four_lanes_take_three_beats() {
        let item = SourceItem::from_bytes(&[0, 1, 2, 3, 4, 5, 6, 7, 8]);
        let mut rng = rng();
        let mut xfer = SourceTransfer::new(&item, 4, &mut rng);

        let first = drive(xfer.step(true, false, &mut rng));
        assert!(!first.last);
        assert_eq!(first.lanes, [0u8, 1, 2, 3].map(ByteQualifier::from).to_vec());
        // valid does not wait for ready
        assert_eq!(xfer.step(true, false, &mut rng), SourceStep::Hold);
        let second = drive(xfer.step(true, true, &mut rng));
        assert!(!second.last);
        let third = drive(xfer.step(true, true, &mut rng));
        assert!(third.last);
        assert_eq!(third.lanes[0], ByteQualifier::from(8u8));
        assert_eq!(third.lanes[1..], [ByteQualifier::null(); 3]);
        assert_eq!(
            xfer.step(true, true, &mut rng),
            SourceStep::Done(TransferStatus::Completed { beats: 3 })
        );
    }

    #[test]
    fn stall_times_out_after_budget() {
        let item = SourceItem::from_bytes(&[1, 2]).timeout(3);
        let mut rng = rng();
        let mut xfer = SourceTransfer::new(&item, 4, &mut rng);
        drive(xfer.step(true, false, &mut rng));
        for _ in 0..3 {
            assert_eq!(xfer.step(true, false, &mut rng), SourceStep::Hold);
        }
        assert_eq!(
            xfer.step(true, false, &mut rng),
            SourceStep::Timeout { cycles: 3 }
        );
    }

    #[test]
    fn idle_cycles_precede_each_beat() {
        let item = SourceItem::from_bytes(&[1, 2, 3, 4, 5]).idle(Range::fixed(2));
        let mut rng = rng();
        let mut xfer = SourceTransfer::new(&item, 4, &mut rng);
        assert_eq!(xfer.step(true, true, &mut rng), SourceStep::Idle);
        assert_eq!(xfer.step(true, true, &mut rng), SourceStep::Idle);
        drive(xfer.step(true, true, &mut rng));
        assert_eq!(xfer.step(true, true, &mut rng), SourceStep::Idle);
        assert_eq!(xfer.step(true, true, &mut rng), SourceStep::Idle);
        assert!(drive(xfer.step(true, true, &mut rng)).last);
    }

    #[test]
    fn idle_gap_elapses_while_ready_is_low() {
        let item = SourceItem::from_bytes(&[1, 2]).idle(Range::fixed(2));
        let mut rng = rng();
        let mut xfer = SourceTransfer::new(&item, 4, &mut rng);
        assert_eq!(xfer.step(true, false, &mut rng), SourceStep::Idle);
        assert_eq!(xfer.step(true, false, &mut rng), SourceStep::Idle);
        assert!(drive(xfer.step(true, false, &mut rng)).last);
    }

    #[test]
    fn reset_drops_and_empty_payload_completes() {
        let item = SourceItem::from_bytes(&[1, 2, 3, 4, 5]);
        let mut rng = rng();
        let mut xfer = SourceTransfer::new(&item, 4, &mut rng);
        drive(xfer.step(true, true, &mut rng));
        assert_eq!(
            xfer.step(false, true, &mut rng),
            SourceStep::Done(TransferStatus::Dropped)
        );

        let empty = SourceItem::new();
        let mut xfer = SourceTransfer::new(&empty, 4, &mut rng);
        assert_eq!(
            xfer.step(true, false, &mut rng),
            SourceStep::Done(TransferStatus::Completed { beats: 0 })
        );
        assert_eq!(xfer.beats_driven(), 0);
    }

    #[test]
    fn side_channels_follow_the_item() {
        let item = SourceItem::from_bytes(&[1, 2, 3])
            .tid(BitVector::from_value(2, 2))
            .tuser_per_beat(vec![BitVector::from_value(1, 1), BitVector::from_value(0, 1)]);
        let mut rng = rng();
        let mut xfer = SourceTransfer::new(&item, 2, &mut rng);
        let first = drive(xfer.step(true, true, &mut rng));
        let second = drive(xfer.step(true, true, &mut rng));
        assert_eq!(first.tid.value(), 2);
        assert_eq!(first.tuser.value(), 1);
        assert_eq!(second.tuser.value(), 0);
    }
}
