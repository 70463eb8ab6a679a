use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::SimResult;
use crate::signal::SimObject;
use crate::sim_if;
use crate::trigger::Trigger;

/// Drives `clk` with a free-running clock, starting low. Only returns on error.
pub async fn clock(clk: SimObject, period: u64, unit: &'static str) -> SimResult<()> {
    let high_t = period / 2;
    let low_t = period - high_t;
    if period % 2 != 0 {
        log::warn!("Clock period {period}{unit} not dividable by 2. High time will be {high}{unit}; low time will be {low}{unit}.", period=period, unit=unit, high=high_t, low=low_t);
    }
    let (low, high) = sim_if::with(|sim| {
        Ok::<_, crate::error::VerifyError>((
            sim.get_sim_steps(low_t as f64, unit)?,
            sim.get_sim_steps(high_t as f64, unit)?,
        ))
    })?;
    loop {
        clk.set(0);
        Trigger::timer_steps(low).await;
        clk.set(1);
        Trigger::timer_steps(high).await;
    }
}

pub async fn clock_cycles(signal: SimObject, n_cycles: u32) {
    for _ in 0..n_cycles {
        signal.rising_edge().await;
    }
}

/// Current simulation time in steps.
pub fn sim_time_steps() -> u64 {
    sim_if::with(|sim| sim.get_sim_time_steps())
}

/// Random generator for one agent, derived from the testbench seed so that
/// agents draw independent but reproducible sequences.
pub fn agent_rng(seed: u64, agent: &str) -> StdRng {
    // FNV-1a over the agent name
    let salt = agent
        .bytes()
        .fold(0xcbf2_9ce4_8422_2325u64, |h, b| (h ^ b as u64).wrapping_mul(0x0100_0000_01b3));
    StdRng::seed_from_u64(seed ^ salt)
}

/// `count` random bytes.
pub fn rand_bytes(rng: &mut impl Rng, count: usize) -> Vec<u8> {
    (0..count).map(|_| rng.gen::<u8>()).collect()
}
