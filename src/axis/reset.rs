use crate::axis::bus_if::ResetIf;
use crate::axis::item::ResetItem;

/// Drives the shared active-low reset.
#[derive(Clone, Copy, Debug)]
pub struct ResetDriver {
    vif: ResetIf,
}

impl ResetDriver {
    pub fn new(vif: ResetIf) -> Self {
        Self { vif }
    }

    pub fn vif(&self) -> ResetIf {
        self.vif
    }

    /// Holds reset for `item.duration` rising edges, then releases it and
    /// waits `item.idle` more.
    pub async fn transfer(&self, item: ResetItem) {
        log::debug!(
            "reset: asserting for {} cycle(s), idle {} cycle(s)",
            item.duration,
            item.idle
        );
        self.vif.set_areset_n(false);
        for _ in 0..item.duration {
            self.vif.aclk_posedge().await;
        }
        self.vif.set_areset_n(true);
        for _ in 0..item.idle {
            self.vif.aclk_posedge().await;
        }
    }
}
