use rand::rngs::StdRng;
use rand::Rng;

use crate::axis::bus_if::AxisBus;
use crate::axis::item::{SinkItem, TransferStatus};
use crate::error::{SimResult, VerifyError};
use crate::tb_obj::TbObj;
use crate::utils::agent_rng;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SinkConfig {
    /// Draw a ready-low gap after every accepted beat instead of only
    /// between packets.
    pub mid_packet_backpressure: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SinkStep {
    /// Level of ready until the next edge.
    Ready(bool),
    Done(TransferStatus),
    /// The source did not send anything for longer than the item allows.
    Timeout { cycles: usize },
}

/// Per-item sink state machine, advanced once per rising edge.
pub struct SinkTransfer {
    item: SinkItem,
    config: SinkConfig,
    packets_left: usize,
    beats: usize,
    gap: usize,
    stall: usize,
    done: bool,
}

impl SinkTransfer {
    pub fn new(item: SinkItem, config: SinkConfig, rng: &mut impl Rng) -> Self {
        Self {
            item,
            config,
            packets_left: item.packets,
            beats: 0,
            // gap before the first packet
            gap: item.idle.pick(rng),
            stall: item.timeout,
            done: false,
        }
    }

    pub fn beats(&self) -> usize {
        self.beats
    }

    pub fn packets_left(&self) -> usize {
        self.packets_left
    }

    /// Advances the machine with the bus state sampled at this edge.
    pub fn step(
        &mut self,
        areset_n: bool,
        tvalid: bool,
        tready: bool,
        tlast: bool,
        rng: &mut impl Rng,
    ) -> SinkStep {
        if self.done {
            return SinkStep::Done(TransferStatus::Completed { beats: self.beats });
        }
        if !areset_n {
            self.done = true;
            return SinkStep::Done(TransferStatus::Dropped);
        }
        if self.item.packets == 0 {
            // idle-only item
            if self.gap > 0 {
                self.gap -= 1;
                return SinkStep::Ready(false);
            }
            self.done = true;
            return SinkStep::Done(TransferStatus::Completed { beats: 0 });
        }
        if tvalid && tready {
            self.beats += 1;
            self.stall = self.item.timeout;
            if tlast {
                self.packets_left -= 1;
                if self.packets_left == 0 {
                    self.done = true;
                    return SinkStep::Done(TransferStatus::Completed { beats: self.beats });
                }
                self.gap = self.item.idle.pick(rng);
            } else if self.config.mid_packet_backpressure {
                self.gap = self.item.idle.pick(rng);
            }
        } else if tready && self.item.timeout > 0 {
            if self.stall == 0 {
                self.done = true;
                return SinkStep::Timeout {
                    cycles: self.item.timeout,
                };
            }
            self.stall -= 1;
        }
        if self.gap > 0 {
            self.gap -= 1;
            SinkStep::Ready(false)
        } else {
            SinkStep::Ready(true)
        }
    }
}

/// Active agent accepting packets under randomized backpressure.
#[derive(Clone)]
pub struct SinkDriver {
    name: String,
    bus: AxisBus,
    config: SinkConfig,
    rng: TbObj<StdRng>,
    errors: TbObj<Vec<VerifyError>>,
    // ready level to put back when a running transfer is abandoned
    restore: TbObj<Option<bool>>,
}

impl SinkDriver {
    pub fn new(name: &str, bus: AxisBus, config: SinkConfig, seed: u64) -> Self {
        Self {
            name: name.to_string(),
            bus,
            config,
            rng: TbObj::new(agent_rng(seed, name)),
            errors: TbObj::default(),
            restore: TbObj::default(),
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

    /// Accepts the packets of `item`, one state machine step per rising edge.
    /// Ready returns to its previous level when this returns.
    pub async fn transfer(&self, item: SinkItem) -> SimResult<TransferStatus> {
        log::debug!("{}: accepting {} packet(s)", self.name, item.packets);
        let tready_tmp = self.bus.tready.next_bits().to_bool();
        *self.restore.get_mut() = Some(tready_tmp);
        let mut xfer = self
            .rng
            .with_mut(|rng| SinkTransfer::new(item, self.config, rng));
        loop {
            let step = self.rng.with_mut(|rng| {
                xfer.step(
                    self.bus.get_areset_n(),
                    self.bus.get_tvalid(),
                    self.bus.get_tready(),
                    self.bus.get_tlast(),
                    rng,
                )
            });
            match step {
                SinkStep::Ready(level) => self.bus.set_tready(level),
                SinkStep::Done(status) => {
                    self.bus.set_tready(tready_tmp);
                    self.restore.get_mut().take();
                    if status == TransferStatus::Dropped {
                        log::debug!("{}: transfer dropped by reset", self.name);
                    }
                    return Ok(status);
                }
                SinkStep::Timeout { cycles } => {
                    self.bus.set_tready(tready_tmp);
                    self.restore.get_mut().take();
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

    /// Puts ready back to the level it had before a transfer whose future was
    /// dropped before completion. Does nothing when no transfer is pending.
    pub fn stop(&self) {
        let level = self.restore.get_mut().take();
        if let Some(level) = level {
            log::debug!("{}: transfer abandoned", self.name);
            self.bus.set_tready(level);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::range::Range;
    use rand::SeedableRng;

    #[test]
    fn ready_held_through_packet_and_gapped_between() {
        let mut rng = StdRng::seed_from_u64(5);
        let item = SinkItem::new(2).idle(Range::fixed(1));
        let mut xfer = SinkTransfer::new(item, SinkConfig::default(), &mut rng);
        // initial gap
        assert_eq!(xfer.step(true, false, false, false, &mut rng), SinkStep::Ready(false));
        assert_eq!(xfer.step(true, true, false, false, &mut rng), SinkStep::Ready(true));
        // first beat of packet 1, no gap mid packet
        assert_eq!(xfer.step(true, true, true, false, &mut rng), SinkStep::Ready(true));
        // last beat of packet 1
        assert_eq!(xfer.step(true, true, true, true, &mut rng), SinkStep::Ready(false));
        assert_eq!(xfer.step(true, true, false, false, &mut rng), SinkStep::Ready(true));
        assert_eq!(
            xfer.step(true, true, true, true, &mut rng),
            SinkStep::Done(TransferStatus::Completed { beats: 3 })
        );
    }

    #[test]
    fn mid_packet_backpressure_gaps_every_beat() {
        let mut rng = StdRng::seed_from_u64(5);
        let item = SinkItem::new(1).idle(Range::fixed(1));
        let config = SinkConfig {
            mid_packet_backpressure: true,
        };
        let mut xfer = SinkTransfer::new(item, config, &mut rng);
        assert_eq!(xfer.step(true, false, false, false, &mut rng), SinkStep::Ready(false));
        assert_eq!(xfer.step(true, true, false, false, &mut rng), SinkStep::Ready(true));
        assert_eq!(xfer.step(true, true, true, false, &mut rng), SinkStep::Ready(false));
    }

    #[test]
    fn idle_only_item_completes_after_gap() {
        let mut rng = StdRng::seed_from_u64(5);
        let item = SinkItem::new(0).idle(Range::fixed(2));
        let mut xfer = SinkTransfer::new(item, SinkConfig::default(), &mut rng);
        assert_eq!(xfer.step(true, false, false, false, &mut rng), SinkStep::Ready(false));
        assert_eq!(xfer.step(true, false, false, false, &mut rng), SinkStep::Ready(false));
        assert_eq!(
            xfer.step(true, false, false, false, &mut rng),
            SinkStep::Done(TransferStatus::Completed { beats: 0 })
        );
    }

    #[test]
    fn silent_source_times_out() {
        let mut rng = StdRng::seed_from_u64(5);
        let item = SinkItem::new(1).timeout(2);
        let mut xfer = SinkTransfer::new(item, SinkConfig::default(), &mut rng);
        // ready is not up yet on the first edge
        assert_eq!(xfer.step(true, false, false, false, &mut rng), SinkStep::Ready(true));
        assert_eq!(xfer.step(true, false, true, false, &mut rng), SinkStep::Ready(true));
        assert_eq!(xfer.step(true, false, true, false, &mut rng), SinkStep::Ready(true));
        assert_eq!(
            xfer.step(true, false, true, false, &mut rng),
            SinkStep::Timeout { cycles: 2 }
        );
        assert_eq!(
            SinkTransfer::new(item, SinkConfig::default(), &mut rng).step(false, true, true, true, &mut rng),
            SinkStep::Done(TransferStatus::Dropped)
        );
    }
}
