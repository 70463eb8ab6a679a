//! Randomized stimulus: sequences draw items and feed them to the drivers.

use futures::future::{self, Either, FutureExt};
use futures::join;
use futures_channel::oneshot;
use rand::rngs::StdRng;
use rand::Rng;

use crate::axis::item::{ResetItem, SinkItem, SourceItem, TransferStatus};
use crate::axis::reset::ResetDriver;
use crate::axis::sink::SinkDriver;
use crate::axis::source::SourceDriver;
use crate::bits::BitVector;
use crate::error::SimResult;
use crate::range::Range;
use crate::tb_obj::TbObj;
use crate::utils::rand_bytes;

/// Outcome counters of one sequence run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SequenceStats {
    pub completed: usize,
    pub dropped: usize,
    pub timeouts: usize,
}

impl SequenceStats {
    fn count(&mut self, result: &SimResult<TransferStatus>) {
        match result {
            Ok(TransferStatus::Completed { .. }) => self.completed += 1,
            Ok(TransferStatus::Dropped) => self.dropped += 1,
            Err(_) => self.timeouts += 1,
        }
    }

    fn merge(&mut self, other: SequenceStats) {
        self.completed += other.completed;
        self.dropped += other.dropped;
        self.timeouts += other.timeouts;
    }
}

/// Packets of random bytes for a source driver.
#[derive(Clone, Debug, PartialEq)]
pub struct SourceSequence {
    /// Payload bytes per packet, at least 1.
    pub length: Range,
    pub idle: Range,
    pub timeout: usize,
    pub tid: BitVector,
    pub tdest: BitVector,
}

impl Default for SourceSequence {
    fn default() -> Self {
        Self {
            length: Range::new(1, 16),
            idle: Range::default(),
            timeout: 0,
            tid: BitVector::default(),
            tdest: BitVector::default(),
        }
    }
}

impl SourceSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn length(mut self, length: impl Into<Range>) -> Self {
        self.length = length.into();
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

    pub fn tid(mut self, tid: BitVector) -> Self {
        self.tid = tid;
        self
    }

    pub fn tdest(mut self, tdest: BitVector) -> Self {
        self.tdest = tdest;
        self
    }

    /// Draws `packets` items.
    pub fn items(&self, packets: usize, rng: &mut impl Rng) -> Vec<SourceItem> {
        (0..packets)
            .map(|_| {
                let len = self.length.pick(rng).max(1);
                SourceItem::from_bytes(&rand_bytes(rng, len))
                    .tid(self.tid.clone())
                    .tdest(self.tdest.clone())
                    .idle(self.idle)
                    .timeout(self.timeout)
            })
            .collect()
    }

    /// Sends `packets` packets one after the other. Timeouts are recorded by
    /// the driver and do not stop the sequence.
    pub async fn run(&self, driver: &SourceDriver, packets: usize, rng: &TbObj<StdRng>) -> SequenceStats {
        log::debug!("{}: starting sequence of {} packet(s)", driver.name(), packets);
        let items = rng.with_mut(|rng| self.items(packets, rng));
        let mut stats = SequenceStats::default();
        for item in &items {
            stats.count(&driver.transfer(item).await);
        }
        log::debug!("{}: finishing sequence", driver.name());
        stats
    }
}

/// Backpressure scheme for a sink driver.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SinkSequence {
    pub idle: Range,
    pub timeout: usize,
}

impl SinkSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn idle(mut self, idle: impl Into<Range>) -> Self {
        self.idle = idle.into();
        self
    }

    pub fn timeout(mut self, cycles: usize) -> Self {
        self.timeout = cycles;
        self
    }

    pub fn item(&self, packets: usize) -> SinkItem {
        SinkItem::new(packets).idle(self.idle).timeout(self.timeout)
    }

    pub async fn run(&self, driver: &SinkDriver, packets: usize) -> SequenceStats {
        let mut stats = SequenceStats::default();
        stats.count(&driver.transfer(self.item(packets)).await);
        stats
    }
}

/// Reset pulses with random duration and recovery time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResetSequence {
    pub repeats: Range,
    pub duration: Range,
    pub idle: Range,
}

impl Default for ResetSequence {
    fn default() -> Self {
        Self {
            repeats: Range::fixed(1),
            duration: Range::fixed(2),
            idle: Range::fixed(1),
        }
    }
}

impl ResetSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn repeats(mut self, repeats: impl Into<Range>) -> Self {
        self.repeats = repeats.into();
        self
    }

    pub fn duration(mut self, duration: impl Into<Range>) -> Self {
        self.duration = duration.into();
        self
    }

    pub fn idle(mut self, idle: impl Into<Range>) -> Self {
        self.idle = idle.into();
        self
    }

    pub fn items(&self, rng: &mut impl Rng) -> Vec<ResetItem> {
        let resets = self.repeats.pick(rng);
        (0..resets)
            .map(|_| ResetItem::new(self.duration.pick(rng), self.idle.pick(rng)))
            .collect()
    }

    pub async fn run(&self, driver: &ResetDriver, rng: &TbObj<StdRng>) {
        let items = rng.with_mut(|rng| self.items(rng));
        for item in items {
            driver.transfer(item).await;
        }
    }
}

/// Full stimulus: `repeats` rounds of reset followed by `packets` packets
/// sent and accepted concurrently.
#[derive(Clone, Debug, PartialEq)]
pub struct StreamSequence {
    pub repeats: Range,
    pub packets: Range,
    /// Edges the sink keeps accepting after the source lost a packet.
    pub drain: usize,
    pub source: SourceSequence,
    pub sink: SinkSequence,
    pub reset: ResetSequence,
}

impl Default for StreamSequence {
    fn default() -> Self {
        Self {
            repeats: Range::fixed(1),
            packets: Range::new(1, 8),
            drain: 16,
            source: SourceSequence::default(),
            sink: SinkSequence::default(),
            reset: ResetSequence::default(),
        }
    }
}

impl StreamSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn repeats(mut self, repeats: impl Into<Range>) -> Self {
        self.repeats = repeats.into();
        self
    }

    pub fn packets(mut self, packets: impl Into<Range>) -> Self {
        self.packets = packets.into();
        self
    }

    pub fn drain(mut self, cycles: usize) -> Self {
        self.drain = cycles;
        self
    }

    pub fn source(mut self, source: SourceSequence) -> Self {
        self.source = source;
        self
    }

    pub fn sink(mut self, sink: SinkSequence) -> Self {
        self.sink = sink;
        self
    }

    pub fn reset(mut self, reset: ResetSequence) -> Self {
        self.reset = reset;
        self
    }

    /// Returns the merged counters of the source and sink handlers.
    pub async fn run(
        &self,
        source: &SourceDriver,
        sink: &SinkDriver,
        reset: &ResetDriver,
        rng: &TbObj<StdRng>,
    ) -> SequenceStats {
        log::info!("sequence: starting");
        let repeats = rng.with_mut(|rng| self.repeats.pick(rng));
        let mut stats = SequenceStats::default();
        for round in 0..repeats {
            self.reset.run(reset, rng).await;
            let packets = rng.with_mut(|rng| self.packets.pick(rng));
            log::debug!("sequence: round {} with {} packet(s)", round, packets);
            let (sent, accepted) = self.round(source, sink, packets, rng).await;
            stats.merge(sent);
            stats.merge(accepted);
        }
        log::info!("sequence: finished");
        stats
    }

    /// Sends and accepts `packets` packets. When the source times out or is
    /// reset, the sink gets `drain` more edges and is then stopped.
    async fn round(
        &self,
        source: &SourceDriver,
        sink: &SinkDriver,
        packets: usize,
        rng: &TbObj<StdRng>,
    ) -> (SequenceStats, SequenceStats) {
        let (lost_tx, lost_rx) = oneshot::channel();
        let sending = async {
            let sent = self.source.run(source, packets, rng).await;
            let _ = lost_tx.send(packets - sent.completed.min(packets));
            sent
        };
        let accepting = async {
            let accept = self.sink.run(sink, packets).boxed_local();
            let cutoff = async {
                match lost_rx.await {
                    Ok(lost) if lost > 0 => {
                        for _ in 0..self.drain {
                            sink.bus().aclk_posedge().await;
                        }
                        lost
                    }
                    _ => future::pending().await,
                }
            }
            .boxed_local();
            match future::select(accept, cutoff).await {
                Either::Left((accepted, _)) => accepted,
                Either::Right((lost, accept)) => {
                    drop(accept);
                    sink.stop();
                    log::warn!("{}: stopped, {} packet(s) never sent", sink.name(), lost);
                    SequenceStats::default()
                }
            }
        };
        join!(sending, accepting)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn source_items_follow_ranges() {
        let mut rng = StdRng::seed_from_u64(11);
        let seq = SourceSequence::new().length(Range::new(0, 5)).idle(Range::fixed(2)).timeout(7);
        let items = seq.items(20, &mut rng);
        assert_eq!(items.len(), 20);
        for item in &items {
            assert!((1..=5).contains(&item.payload.len()));
            assert_eq!(item.idle, Range::fixed(2));
            assert_eq!(item.timeout, 7);
        }
    }

    #[test]
    fn reset_items_are_reproducible() {
        let seq = ResetSequence::new().repeats(Range::new(1, 3)).duration(Range::new(1, 4));
        let a = seq.items(&mut StdRng::seed_from_u64(1));
        let b = seq.items(&mut StdRng::seed_from_u64(1));
        assert_eq!(a, b);
        assert!((1..=3).contains(&a.len()));
        assert!(a.iter().all(|item| (1..=4).contains(&item.duration) && item.idle == 1));
    }

    #[test]
    fn sink_item_carries_scheme() {
        let item = SinkSequence::new().idle(Range::new(0, 3)).timeout(9).item(4);
        assert_eq!(item.packets, 4);
        assert_eq!(item.idle, Range::new(0, 3));
        assert_eq!(item.timeout, 9);
    }
}
