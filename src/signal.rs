use crate::bits::BitVector;
use crate::error::SimResult;
use crate::sim_if;
use crate::trigger::Trigger;

/// Handle to a signal of the current simulation.
///
/// Accessors panic if the handle belongs to a simulation that was already
/// torn down, the way a simulator binding fails on a freed object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SimObject {
    pub(crate) handle: usize,
    pub(crate) width: usize,
}

#[inline]
fn checked<T>(result: SimResult<T>, what: &str, handle: usize) -> T {
    result.unwrap_or_else(|e| panic!("Couldn't {} of signal {}: {}", what, handle, e))
}

impl SimObject {
    /// Declares a new signal of `width` bits, initialised to zero.
    pub fn new(name: &str, width: usize) -> SimResult<Self> {
        let handle = sim_if::with(|sim| sim.declare_signal(name, width))?;
        Ok(SimObject { handle, width })
    }

    pub fn from_name(full_name: &str) -> SimResult<Self> {
        sim_if::with(|sim| {
            let handle = sim.get_handle_by_name(full_name)?;
            Ok(SimObject {
                handle,
                width: sim.get_size(handle)?,
            })
        })
    }

    pub fn handle(&self) -> usize {
        self.handle
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn name(&self) -> String {
        checked(
            sim_if::with(|sim| sim.get_full_name(self.handle)),
            "get name",
            self.handle,
        )
    }

    /// Settled value.
    pub fn bits(&self) -> BitVector {
        checked(
            sim_if::with(|sim| sim.get_value(self.handle)),
            "get value",
            self.handle,
        )
    }

    /// Value after the writes pending in this delta.
    pub fn next_bits(&self) -> BitVector {
        checked(
            sim_if::with(|sim| sim.get_next_value(self.handle)),
            "get next value",
            self.handle,
        )
    }

    pub fn u64(&self) -> u64 {
        self.bits().value()
    }

    pub fn bool(&self) -> bool {
        self.bits().to_bool()
    }

    /// Schedules `value` (resized to the signal width) for the next delta.
    pub fn set_bits(&self, value: &BitVector) {
        let value = value.clone().resized(self.width);
        checked(
            sim_if::with(|sim| sim.set_value(self.handle, value)),
            "set value",
            self.handle,
        )
    }

    pub fn set(&self, value: u64) {
        self.set_bits(&BitVector::from_value(value, self.width))
    }

    pub fn set_bool(&self, value: bool) {
        self.set(value as u64)
    }

    // convenience functions to get edge triggers for this signal
    pub fn rising_edge(self) -> Trigger {
        Trigger::rising_edge(self)
    }
    pub fn falling_edge(self) -> Trigger {
        Trigger::falling_edge(self)
    }
    pub fn edge(self) -> Trigger {
        Trigger::edge(self)
    }
}
