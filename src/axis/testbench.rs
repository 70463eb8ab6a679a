use rand::rngs::StdRng;

use crate::axis::bus_if::{AxisBus, ResetIf};
use crate::axis::monitor::{Monitor, MonitorStats};
use crate::axis::report::CompareConfig;
use crate::axis::reset::ResetDriver;
use crate::axis::scoreboard::Scoreboard;
use crate::axis::sequence::{SequenceStats, StreamSequence};
use crate::axis::sink::{SinkConfig, SinkDriver};
use crate::axis::source::SourceDriver;
use crate::error::{SimResult, TestResult, VerifyError};
use crate::executor::Task;
use crate::tb_obj::TbObj;
use crate::utils::agent_rng;

/// Everything a testbench needs, injected up front.
#[derive(Clone, Debug, Default)]
pub struct TestbenchConfig {
    /// Bus into the device: driven by the source, watched by the rx monitor.
    pub rx_bus: Option<AxisBus>,
    /// Bus out of the device: accepted by the sink, watched by the tx monitor.
    pub tx_bus: Option<AxisBus>,
    pub reset: Option<ResetIf>,
    pub checks_enable: bool,
    pub coverage_enable: bool,
    pub seed: u64,
    pub compare: CompareConfig,
    pub sink: SinkConfig,
}

impl TestbenchConfig {
    pub fn new(rx_bus: AxisBus, tx_bus: AxisBus, reset: ResetIf) -> Self {
        Self {
            rx_bus: Some(rx_bus),
            tx_bus: Some(tx_bus),
            reset: Some(reset),
            ..Self::default()
        }
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn checks_enable(mut self, enable: bool) -> Self {
        self.checks_enable = enable;
        self
    }

    pub fn coverage_enable(mut self, enable: bool) -> Self {
        self.coverage_enable = enable;
        self
    }

    pub fn compare(mut self, compare: CompareConfig) -> Self {
        self.compare = compare;
        self
    }

    pub fn sink(mut self, sink: SinkConfig) -> Self {
        self.sink = sink;
        self
    }
}

/// Source agent and rx monitor on one side of the device, sink agent and
/// tx monitor on the other, a reset agent and a scoreboard comparing both
/// monitors.
#[derive(Clone)]
pub struct Testbench {
    source: SourceDriver,
    sink: SinkDriver,
    reset: ResetDriver,
    rx_monitor: Monitor,
    tx_monitor: Monitor,
    scoreboard: Scoreboard,
    rng: TbObj<StdRng>,
}

impl Testbench {
    pub fn build(config: TestbenchConfig) -> SimResult<Self> {
        let missing = |what: &str| {
            let err = VerifyError::ConfigurationMissing(what.to_string());
            log::error!("testbench: {}", err);
            err
        };
        let rx_bus = config.rx_bus.ok_or_else(|| missing("rx bus"))?;
        let tx_bus = config.tx_bus.ok_or_else(|| missing("tx bus"))?;
        let reset = config.reset.ok_or_else(|| missing("reset interface"))?;

        log::info!("testbench: build phase, seed {}", config.seed);
        Ok(Self {
            source: SourceDriver::new("rx_driver", rx_bus, config.seed),
            sink: SinkDriver::new("tx_driver", tx_bus, config.sink, config.seed),
            reset: ResetDriver::new(reset),
            rx_monitor: Monitor::new("rx_monitor", rx_bus)
                .checks_enable(config.checks_enable)
                .coverage_enable(config.coverage_enable),
            tx_monitor: Monitor::new("tx_monitor", tx_bus)
                .checks_enable(config.checks_enable)
                .coverage_enable(config.coverage_enable),
            scoreboard: Scoreboard::new(config.compare),
            rng: TbObj::new(agent_rng(config.seed, "sequence")),
        })
    }

    /// Spawns both monitors and the scoreboard.
    pub fn start(&self) {
        let rx = self.rx_monitor.subscribe();
        let tx = self.tx_monitor.subscribe();
        Task::spawn(self.rx_monitor.clone().run(), "rx_monitor");
        Task::spawn(self.tx_monitor.clone().run(), "tx_monitor");
        Task::spawn(self.scoreboard.clone().run(rx, tx), "scoreboard");
    }

    /// Runs `sequence`, then waits one more edge so the monitors have
    /// published the last handshake.
    pub async fn run_sequence(&self, sequence: &StreamSequence) -> SequenceStats {
        let stats = sequence
            .run(&self.source, &self.sink, &self.reset, &self.rng)
            .await;
        self.reset.vif().aclk_posedge().await;
        stats
    }

    /// Protocol timeouts raised by either driver.
    pub fn driver_errors(&self) -> Vec<VerifyError> {
        let mut errors = self.source.errors();
        errors.extend(self.sink.errors());
        errors
    }

    pub fn passed(&self) -> bool {
        self.scoreboard.passed() && self.driver_errors().is_empty()
    }

    pub fn failed(&self) -> bool {
        !self.passed()
    }

    /// Scoreboard result, failed by the first driver timeout if any.
    pub fn result(&self) -> TestResult {
        match self.driver_errors().into_iter().next() {
            Some(err) => Err(err),
            None => self.scoreboard.result(),
        }
    }

    pub fn source(&self) -> &SourceDriver {
        &self.source
    }

    pub fn sink(&self) -> &SinkDriver {
        &self.sink
    }

    pub fn reset(&self) -> &ResetDriver {
        &self.reset
    }

    pub fn scoreboard(&self) -> &Scoreboard {
        &self.scoreboard
    }

    pub fn rx_monitor(&self) -> &Monitor {
        &self.rx_monitor
    }

    pub fn tx_monitor(&self) -> &Monitor {
        &self.tx_monitor
    }

    pub fn coverage(&self) -> (MonitorStats, MonitorStats) {
        (self.rx_monitor.stats(), self.tx_monitor.stats())
    }
}
