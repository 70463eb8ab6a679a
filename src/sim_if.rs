use std::cell::RefCell;

use crate::bits::BitVector;
use crate::error::{SimResult, VerifyError};
use crate::kernel::Kernel;
use crate::trigger::EdgeKind;

// One scheduler per thread. Replaced by `install` at the start of every simulation.
thread_local! {
    static SIM_IF: RefCell<Box<dyn SimIf>> = RefCell::new(Box::new(Kernel::new()));
}

/// Installs `sim` as the scheduler of the current thread and returns the previous one.
pub fn install(sim: Box<dyn SimIf>) -> Box<dyn SimIf> {
    SIM_IF.with(|s| std::mem::replace(&mut *s.borrow_mut(), sim))
}

/// Runs `f` on the scheduler of the current thread.
///
/// The scheduler is borrowed for the duration of `f`, so `f` must not wake
/// or poll tasks.
pub fn with<R>(f: impl FnOnce(&mut dyn SimIf) -> R) -> R {
    SIM_IF.with(|s| f(s.borrow_mut().as_mut()))
}

#[derive(Debug, Hash, Clone, Copy, Eq, PartialEq)]
pub enum SimCallback {
    /// Relative delay when registering, absolute time when delivered.
    Time(u64),
    /// Value change of the signal with this handle.
    Edge(usize),
    /// All writes of the current time step have settled.
    ReadOnly,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimEvent {
    pub cb: SimCallback,
    pub edge: Option<EdgeKind>,
}

/// Contract between the verification components and a clocked scheduler.
///
/// Writes are deferred: `set_value` schedules the value for the next delta
/// and `get_value` keeps returning the settled value until then.
pub trait SimIf {
    fn declare_signal(&mut self, name: &str, width: usize) -> SimResult<usize>;
    fn get_handle_by_name(&self, name: &str) -> SimResult<usize>;
    fn get_full_name(&self, handle: usize) -> SimResult<String>;
    fn get_size(&self, handle: usize) -> SimResult<usize>;
    fn get_value(&self, handle: usize) -> SimResult<BitVector>;
    /// Value the signal will take after the pending writes are applied.
    fn get_next_value(&self, handle: usize) -> SimResult<BitVector>;
    fn set_value(&mut self, handle: usize, value: BitVector) -> SimResult<()>;
    fn get_sim_time_steps(&self) -> u64;
    fn get_sim_precision(&self) -> i8;
    fn register_callback(&mut self, cb: SimCallback) -> SimResult<usize>;
    fn cancel_callback(&mut self, cb_hdl: usize) -> SimResult<()>;
    /// Advances the simulation to the next callback. `None` once nothing is left to do.
    fn next_event(&mut self) -> SimResult<Option<SimEvent>>;

    fn log(&self, s: &str) {
        log::info!("{}", s);
    }
    fn get_sim_time(&self, unit: &str) -> SimResult<f64> {
        // this function does not preserve precision, so don't use carelessly
        let t = self.get_sim_time_steps() as f64;
        let precision = self.get_sim_precision();
        Ok(ldexp10(t, precision - time_scale(unit)?))
    }
    fn get_sim_steps(&self, time: f64, unit: &str) -> SimResult<u64> {
        let precision = self.get_sim_precision();
        let steps = ldexp10(time, time_scale(unit)? - precision);
        if steps % 1.0 == 0.0 && steps >= 0.0 {
            Ok(steps as u64)
        } else {
            Err(VerifyError::TimeRounding {
                time,
                unit: unit.to_string(),
            })
        }
    }
}

pub(crate) fn time_scale(unit: &str) -> SimResult<i8> {
    match unit {
        "fs" => Ok(-15),
        "ps" => Ok(-12),
        "ns" => Ok(-9),
        "us" => Ok(-6),
        "ms" => Ok(-3),
        "sec" => Ok(0),
        _ => Err(VerifyError::InvalidTimeUnit(unit.to_string())),
    }
}

pub(crate) fn scale_time(unit: i8) -> SimResult<&'static str> {
    match unit {
        -15 => Ok("fs"),
        -12 => Ok("ps"),
        -9 => Ok("ns"),
        -6 => Ok("us"),
        -3 => Ok("ms"),
        0 => Ok("sec"),
        _ => Err(VerifyError::InvalidTimeUnit(format!("1e{}", unit))),
    }
}

fn ldexp10(frac: f64, exp: i8) -> f64 {
    // Like math.ldexp, but base 10
    if exp >= 0 {
        frac * 10_u64.pow(exp as u32) as f64
    } else {
        let div = 10_u64.pow(-exp as u32) as f64;
        frac / div
    }
}
