//! In-process event scheduler.
//!
//! A minimal two-phase kernel: every write is deferred into a pending set
//! (last write wins) and applied as one delta, value changes raise edge
//! callbacks, a read-only callback runs once a time step has settled and
//! timers advance time to the next absolute timestamp.

use std::collections::{BTreeMap, HashMap, VecDeque};

use intmap::IntMap;

use crate::bits::BitVector;
use crate::error::{SimResult, VerifyError};
use crate::sim_if::{SimCallback, SimEvent, SimIf};
use crate::trigger::EdgeKind;

/// Deltas allowed within one time step before the kernel gives up.
pub const DEFAULT_DELTA_LIMIT: usize = 1000;

struct Signal {
    name: String,
    value: BitVector,
}

pub struct Kernel {
    signals: Vec<Signal>,
    names: HashMap<String, usize>,
    pending: BTreeMap<usize, BitVector>,
    time: u64,
    deltas: usize,
    delta_limit: usize,
    // live callbacks by handle
    callbacks: IntMap<SimCallback>,
    edge_cbs: HashMap<usize, Vec<usize>>,
    timers: BTreeMap<u64, Vec<usize>>,
    read_only: Vec<usize>,
    // raised but not yet delivered, with the handle that raised them
    events: VecDeque<(usize, SimEvent)>,
    next_cb: usize,
}

impl Default for Kernel {
    fn default() -> Self {
        Self::new()
    }
}

impl Kernel {
    pub fn new() -> Self {
        Self::with_delta_limit(DEFAULT_DELTA_LIMIT)
    }

    pub fn with_delta_limit(delta_limit: usize) -> Self {
        Self {
            signals: Vec::new(),
            names: HashMap::new(),
            pending: BTreeMap::new(),
            time: 0,
            deltas: 0,
            delta_limit,
            callbacks: IntMap::new(),
            edge_cbs: HashMap::new(),
            timers: BTreeMap::new(),
            read_only: Vec::new(),
            events: VecDeque::new(),
            next_cb: 0,
        }
    }

    fn signal(&self, handle: usize) -> SimResult<&Signal> {
        self.signals
            .get(handle)
            .ok_or(VerifyError::UnknownHandle(handle))
    }

    fn apply_pending(&mut self) -> SimResult<()> {
        self.deltas += 1;
        if self.deltas > self.delta_limit {
            return Err(VerifyError::DeltaOverflow { time: self.time });
        }
        let writes = std::mem::take(&mut self.pending);
        for (handle, value) in writes {
            let signal = &mut self.signals[handle];
            if signal.value == value {
                continue;
            }
            let edge = if value.width() == 1 {
                match (signal.value.to_bool(), value.to_bool()) {
                    (false, true) => EdgeKind::Rising,
                    (true, false) => EdgeKind::Falling,
                    _ => EdgeKind::Any,
                }
            } else {
                EdgeKind::Any
            };
            signal.value = value;
            if let Some(handles) = self.edge_cbs.get(&handle) {
                for cb_hdl in handles {
                    self.events.push_back((
                        *cb_hdl,
                        SimEvent {
                            cb: SimCallback::Edge(handle),
                            edge: Some(edge),
                        },
                    ));
                }
            }
        }
        Ok(())
    }
}

impl SimIf for Kernel {
    fn declare_signal(&mut self, name: &str, width: usize) -> SimResult<usize> {
        if self.names.contains_key(name) {
            return Err(VerifyError::DuplicateSignal(name.to_string()));
        }
        let handle = self.signals.len();
        self.signals.push(Signal {
            name: name.to_string(),
            value: BitVector::new(width),
        });
        self.names.insert(name.to_string(), handle);
        Ok(handle)
    }

    fn get_handle_by_name(&self, name: &str) -> SimResult<usize> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| VerifyError::UnknownSignal(name.to_string()))
    }

    fn get_full_name(&self, handle: usize) -> SimResult<String> {
        Ok(self.signal(handle)?.name.clone())
    }

    fn get_size(&self, handle: usize) -> SimResult<usize> {
        Ok(self.signal(handle)?.value.width())
    }

    fn get_value(&self, handle: usize) -> SimResult<BitVector> {
        Ok(self.signal(handle)?.value.clone())
    }

    fn get_next_value(&self, handle: usize) -> SimResult<BitVector> {
        let signal = self.signal(handle)?;
        Ok(self
            .pending
            .get(&handle)
            .unwrap_or(&signal.value)
            .clone())
    }

    fn set_value(&mut self, handle: usize, value: BitVector) -> SimResult<()> {
        let signal = self.signal(handle)?;
        if signal.value.width() != value.width() {
            return Err(VerifyError::WidthMismatch {
                name: signal.name.clone(),
                expected: signal.value.width(),
                actual: value.width(),
            });
        }
        self.pending.insert(handle, value);
        Ok(())
    }

    fn get_sim_time_steps(&self) -> u64 {
        self.time
    }

    fn get_sim_precision(&self) -> i8 {
        -12
    }

    fn register_callback(&mut self, cb: SimCallback) -> SimResult<usize> {
        let cb_hdl = self.next_cb;
        match cb {
            SimCallback::Time(delay) => {
                self.timers
                    .entry(self.time + delay)
                    .or_default()
                    .push(cb_hdl);
            }
            SimCallback::Edge(handle) => {
                self.signal(handle)?;
                self.edge_cbs.entry(handle).or_default().push(cb_hdl);
            }
            SimCallback::ReadOnly => self.read_only.push(cb_hdl),
        }
        self.next_cb += 1;
        self.callbacks.insert(cb_hdl as u64, cb);
        Ok(cb_hdl)
    }

    fn cancel_callback(&mut self, cb_hdl: usize) -> SimResult<()> {
        match self.callbacks.remove(cb_hdl as u64) {
            Some(SimCallback::Edge(handle)) => {
                if let Some(handles) = self.edge_cbs.get_mut(&handle) {
                    handles.retain(|h| *h != cb_hdl);
                    if handles.is_empty() {
                        self.edge_cbs.remove(&handle);
                    }
                }
                Ok(())
            }
            Some(SimCallback::ReadOnly) => {
                self.read_only.retain(|h| *h != cb_hdl);
                Ok(())
            }
            // stale timer entries are skipped when they come due
            Some(SimCallback::Time(_)) => Ok(()),
            None => Err(VerifyError::UnknownHandle(cb_hdl)),
        }
    }

    fn next_event(&mut self) -> SimResult<Option<SimEvent>> {
        loop {
            if let Some((cb_hdl, event)) = self.events.pop_front() {
                match event.cb {
                    // edge callbacks persist until cancelled
                    SimCallback::Edge(_) if self.callbacks.contains_key(cb_hdl as u64) => {
                        return Ok(Some(event))
                    }
                    SimCallback::Edge(_) => continue,
                    _ => {
                        if self.callbacks.remove(cb_hdl as u64).is_some() {
                            return Ok(Some(event));
                        }
                        continue;
                    }
                }
            }
            if !self.pending.is_empty() {
                self.apply_pending()?;
                continue;
            }
            if !self.read_only.is_empty() {
                for cb_hdl in std::mem::take(&mut self.read_only) {
                    self.events.push_back((
                        cb_hdl,
                        SimEvent {
                            cb: SimCallback::ReadOnly,
                            edge: None,
                        },
                    ));
                }
                continue;
            }
            match self.timers.pop_first() {
                Some((time, handles)) => {
                    let live: Vec<usize> = handles
                        .into_iter()
                        .filter(|h| self.callbacks.contains_key(*h as u64))
                        .collect();
                    if live.is_empty() {
                        continue;
                    }
                    if time != self.time {
                        self.time = time;
                        self.deltas = 0;
                    }
                    for cb_hdl in live {
                        self.events.push_back((
                            cb_hdl,
                            SimEvent {
                                cb: SimCallback::Time(time),
                                edge: None,
                            },
                        ));
                    }
                }
                None => return Ok(None),
            }
        }
    }
}
