use intmap::IntMap;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use crate::executor;
use crate::{
    error::SimResult,
    signal::SimObject,
    sim_if::{self, SimCallback},
};

// IntMap specializes on u64 keys, no hashing needed
thread_local! {
    // key is signal handle as u64
    static EDGE_MAP: RefCell<IntMap<CallbackHandles>> = RefCell::new(IntMap::new());
    // key is absolute callback time
    static TIMER_MAP: RefCell<IntMap<CallbackHandles>> = RefCell::new(IntMap::new());
    static READ_ONLY: RefCell<CallbackHandles> = RefCell::new(CallbackHandles::default());
}

#[derive(Default)]
struct CallbackHandles {
    handle: Option<usize>,
    callbacks: VecDeque<TrigShared>,
}

#[derive(PartialEq, Clone, Copy, Debug)]
pub enum EdgeKind {
    Any,
    Rising,
    Falling,
}

pub(crate) fn cancel_all_triggers() {
    // the scheduler is replaced after teardown, stale handles don't matter
    let ro = READ_ONLY.with(|r| std::mem::take(&mut *r.borrow_mut()));
    let timers: Vec<CallbackHandles> =
        TIMER_MAP.with(|m| m.borrow_mut().drain().map(|(_, cb)| cb).collect());
    let edges: Vec<CallbackHandles> =
        EDGE_MAP.with(|m| m.borrow_mut().drain().map(|(_, cb)| cb).collect());
    sim_if::with(|sim| {
        for cb in std::iter::once(&ro).chain(timers.iter()).chain(edges.iter()) {
            if let Some(handle) = cb.handle {
                let _ = sim.cancel_callback(handle);
            }
        }
    });
}

#[derive(Debug, Clone)]
struct TrigShared {
    waker: Waker,
    // If trigger is an edge, the react method needs to know if it is a rising or falling edge
    // so an existing callback does not have to be rescheduled.
    edge_kind: EdgeKind,
    fired: Rc<Cell<bool>>,
}

#[derive(Clone, Copy, Debug)]
pub enum TrigKind {
    Edge(usize, EdgeKind),
    Timer(u64),
    ReadOnly,
}

/// A future that completes on a scheduler callback.
#[derive(Clone)]
pub struct Trigger {
    kind: TrigKind,
    // set by `react`; the task may be polled for other reasons before that
    fired: Option<Rc<Cell<bool>>>,
}

impl Trigger {
    fn new(kind: TrigKind) -> Self {
        Trigger { kind, fired: None }
    }
    pub fn timer(time: u64, unit: &str) -> SimResult<Self> {
        let steps = sim_if::with(|sim| sim.get_sim_steps(time as f64, unit))?;
        Ok(Trigger::timer_steps(steps))
    }
    pub fn timer_steps(steps: u64) -> Self {
        Trigger::new(TrigKind::Timer(steps))
    }
    pub fn edge(signal: SimObject) -> Self {
        Trigger::new(TrigKind::Edge(signal.handle(), EdgeKind::Any))
    }
    pub fn rising_edge(signal: SimObject) -> Self {
        Trigger::new(TrigKind::Edge(signal.handle(), EdgeKind::Rising))
    }
    pub fn falling_edge(signal: SimObject) -> Self {
        Trigger::new(TrigKind::Edge(signal.handle(), EdgeKind::Falling))
    }
    pub fn read_only() -> Self {
        Trigger::new(TrigKind::ReadOnly)
    }
    pub fn kind(&self) -> TrigKind {
        self.kind
    }

    fn register(&self, shared: TrigShared) {
        let registered: SimResult<()> = match self.kind {
            TrigKind::ReadOnly => READ_ONLY.with(|ro| {
                let mut ro = ro.borrow_mut();
                ro.callbacks.push_back(shared);
                if ro.handle.is_none() {
                    ro.handle = Some(sim_if::with(|sim| {
                        sim.register_callback(SimCallback::ReadOnly)
                    })?);
                }
                Ok(())
            }),
            TrigKind::Timer(t) => {
                // Add current time to key since the scheduler sends back absolute time
                let abs_time = t + sim_if::with(|sim| sim.get_sim_time_steps());
                TIMER_MAP.with(|map| {
                    let mut map = map.borrow_mut();
                    if let Some(callbacks) = map.get_mut(abs_time) {
                        callbacks.callbacks.push_back(shared);
                    } else {
                        let handle =
                            sim_if::with(|sim| sim.register_callback(SimCallback::Time(t)))?;
                        let mut callbacks = VecDeque::new();
                        callbacks.push_back(shared);
                        map.insert(
                            abs_time,
                            CallbackHandles {
                                handle: Some(handle),
                                callbacks,
                            },
                        );
                    }
                    Ok(())
                })
            }
            TrigKind::Edge(sig_hdl, _) => EDGE_MAP.with(|map| {
                let mut map = map.borrow_mut();
                if let Some(callbacks) = map.get_mut(sig_hdl as u64) {
                    callbacks.callbacks.push_back(shared);
                } else {
                    let handle =
                        sim_if::with(|sim| sim.register_callback(SimCallback::Edge(sig_hdl)))?;
                    let mut callbacks = VecDeque::new();
                    callbacks.push_back(shared);
                    map.insert(
                        sig_hdl as u64,
                        CallbackHandles {
                            handle: Some(handle),
                            callbacks,
                        },
                    );
                }
                Ok(())
            }),
        };
        if let Err(e) = registered {
            // only reachable with a handle from another simulation
            panic!("Can't register trigger {:?}: {}", self.kind, e);
        }
    }
}

impl Future for Trigger {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if let Some(fired) = &self.fired {
            return match fired.get() {
                true => Poll::Ready(()),
                false => Poll::Pending,
            };
        }
        let fired = Rc::new(Cell::new(false));
        let edge_kind = match self.kind {
            TrigKind::Edge(_, edge_kind) => edge_kind,
            _ => EdgeKind::Any,
        };
        self.register(TrigShared {
            waker: cx.waker().clone(),
            edge_kind,
            fired: fired.clone(),
        });
        self.fired = Some(fired);
        Poll::Pending
    }
}

fn take_edge_waiters(sig_hdl: usize, edge: EdgeKind) -> Option<VecDeque<TrigShared>> {
    let mut callbacks = EDGE_MAP.with(|map| map.borrow_mut().remove(sig_hdl as u64))?;
    let (wake, resched): (VecDeque<TrigShared>, VecDeque<TrigShared>) = callbacks
        .callbacks
        .drain(..)
        .partition(|trig| trig.edge_kind == EdgeKind::Any || trig.edge_kind == edge);
    if resched.is_empty() {
        // no waiters left, stop listening to this signal
        if let Some(handle) = callbacks.handle {
            if let Err(e) = sim_if::with(|sim| sim.cancel_callback(handle)) {
                log::warn!("Couldn't cancel edge callback: {}", e);
            }
        }
    } else {
        callbacks.callbacks = resched;
        EDGE_MAP.with(|map| map.borrow_mut().insert(sig_hdl as u64, callbacks));
    }
    Some(wake)
}

/// Wakes every trigger waiting on `cb` and runs the woken tasks.
#[inline]
pub fn react(cb: SimCallback, edge: Option<EdgeKind>) {
    let vec_wake = match cb {
        SimCallback::ReadOnly => READ_ONLY.with(|ro| {
            let mut ro = ro.borrow_mut();
            ro.handle = None; // callback is done
            Some(std::mem::take(&mut ro.callbacks)).filter(|cbs| !cbs.is_empty())
        }),
        SimCallback::Time(t) => {
            TIMER_MAP.with(|map| map.borrow_mut().remove(t).map(|cb| cb.callbacks))
        }
        SimCallback::Edge(sig_hdl) => take_edge_waiters(sig_hdl, edge.unwrap_or(EdgeKind::Any)),
    };

    match vec_wake {
        Some(vec_wake) => {
            for shared in vec_wake {
                shared.fired.set(true);
                shared.waker.wake();
            }
        }
        None => log::warn!("Did not expect callback {:?}", cb),
    }
    // execute woken tasks
    executor::run_once();
}

#[cfg(test)]
pub(crate) fn pending_triggers() -> usize {
    let ro = READ_ONLY.with(|r| r.borrow().callbacks.len());
    let timers: usize = TIMER_MAP.with(|m| m.borrow().values().map(|c| c.callbacks.len()).sum());
    let edges: usize = EDGE_MAP.with(|m| m.borrow().values().map(|c| c.callbacks.len()).sum());
    ro + timers + edges
}
