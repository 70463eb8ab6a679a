use std::future::Future;

use crate::error::{SimResult, VerifyError};
use crate::executor::{self, Task};
use crate::kernel::{Kernel, DEFAULT_DELTA_LIMIT};
use crate::sim_if::{self, SimIf};
use crate::trigger;

/// Runs one test future on a fresh scheduler of the current thread.
pub struct Simulation {
    time_limit: Option<u64>,
    delta_limit: usize,
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new()
    }
}

impl Simulation {
    pub fn new() -> Self {
        Self {
            time_limit: None,
            delta_limit: DEFAULT_DELTA_LIMIT,
        }
    }

    /// Fails the run with `SimulationTimeout` once time passes `steps`.
    pub fn with_time_limit(mut self, steps: u64) -> Self {
        self.time_limit = Some(steps);
        self
    }

    pub fn with_delta_limit(mut self, deltas: usize) -> Self {
        self.delta_limit = deltas;
        self
    }

    /// Runs `test` on the in-process kernel.
    pub fn run<T: 'static>(&self, test: impl Future<Output = SimResult<T>> + 'static) -> SimResult<T> {
        self.run_on(Box::new(Kernel::with_delta_limit(self.delta_limit)), test)
    }

    /// Runs `test` on `sim` until it completes. Every task and trigger still
    /// alive at that point is dropped.
    pub fn run_on<T: 'static>(
        &self,
        sim: Box<dyn SimIf>,
        test: impl Future<Output = SimResult<T>> + 'static,
    ) -> SimResult<T> {
        tear_down();
        sim_if::install(sim);
        sim_if::with(|sim| match sim_if::scale_time(sim.get_sim_precision()) {
            Ok(unit) => sim.log(&format!("Simulation precision is 1{}", unit)),
            Err(_) => sim.log(&format!("Simulation precision is 1e{}s", sim.get_sim_precision())),
        });
        let mut handle = Task::spawn(test, "test");
        // execute first simulation tick
        executor::run_once();

        let result = loop {
            if let Some(result) = handle.try_result() {
                break result;
            }
            match sim_if::with(|sim| sim.next_event()) {
                Ok(Some(event)) => {
                    let now = sim_if::with(|sim| sim.get_sim_time_steps());
                    if let Some(limit) = self.time_limit {
                        if now > limit {
                            break Err(VerifyError::SimulationTimeout { limit });
                        }
                    }
                    trigger::react(event.cb, event.edge);
                }
                Ok(None) => {
                    break Err(VerifyError::SimulationStalled {
                        time: sim_if::with(|sim| sim.get_sim_time_steps()),
                    })
                }
                Err(e) => break Err(e),
            }
        };
        tear_down();
        result
    }
}

fn tear_down() {
    trigger::cancel_all_triggers();
    executor::clear_tasks();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::SimObject;
    use crate::trigger::Trigger;
    use crate::utils::{clock, clock_cycles};

    #[test]
    fn clocked_counter_sees_pre_edge_values() {
        let result = Simulation::new().run(async {
            let clk = SimObject::new("clk", 1)?;
            let count = SimObject::new("count", 8)?;
            Task::fork(clock(clk, 10, "ns"));
            Task::fork(async move {
                loop {
                    clk.rising_edge().await;
                    count.set(count.u64() + 1);
                }
            });
            clock_cycles(clk, 5).await;
            // the write of the 5th edge is still pending
            let settled = count.u64();
            Trigger::read_only().await;
            Ok((settled, count.u64()))
        });
        assert_eq!(result, Ok((4, 5)));
        assert_eq!(executor::task_count(), 0);
        assert_eq!(trigger::pending_triggers(), 0);
    }

    #[test]
    fn stalled_and_timed_out_runs_fail() {
        let stalled = Simulation::new().run(async {
            let sig = SimObject::new("never", 1)?;
            sig.rising_edge().await;
            Ok(())
        });
        assert_eq!(stalled, Err(VerifyError::SimulationStalled { time: 0 }));

        let timed_out = Simulation::new().with_time_limit(1_000).run(async {
            let clk = SimObject::new("clk", 1)?;
            Task::fork(clock(clk, 2, "ns"));
            clock_cycles(clk, 10_000).await;
            Ok(())
        });
        assert_eq!(timed_out, Err(VerifyError::SimulationTimeout { limit: 1_000 }));
    }

    #[test]
    fn timers_fire_in_time_order() {
        let result = Simulation::new().run(async {
            let first = Task::fork(async {
                Trigger::timer(3, "ns")?.await;
                sim_if::with(|sim| sim.get_sim_time("ns"))
            });
            Trigger::timer_steps(1_000).await;
            let t = sim_if::with(|sim| sim.get_sim_time("ns"))?;
            Ok((t, first.await?))
        });
        assert_eq!(result, Ok((1.0, 3.0)));
    }
}
