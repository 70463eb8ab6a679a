use futures::future::LocalBoxFuture;
use num_format::{Locale, ToFormattedString};
use prettytable::{format, Cell, Row, Table};
use std::path::PathBuf;
use std::time;

use crate::error::{TestResult, VerifyError};
use crate::junit;
use crate::sim_if;
use crate::simulation::Simulation;

pub type TestFn = fn() -> LocalBoxFuture<'static, TestResult>;

#[derive(Debug)]
pub struct Test {
    pub name: String,
    pub generator: TestFn,
    pub result: Option<TestResult>,
    pub time_secs: f64,
    pub sim_time_ns: f64,
}

impl Test {
    pub fn new(name: &str, generator: TestFn) -> Self {
        Self {
            name: name.to_string(),
            generator,
            result: None,
            time_secs: 0.0,
            sim_time_ns: 0.0,
        }
    }

    pub fn set_result(&mut self, result: TestResult) {
        self.result = Some(result);
    }

    pub fn passed(&self) -> bool {
        matches!(self.result, Some(Ok(_)))
    }
}

/// Runs registered tests one after the other, each on a fresh simulation.
pub struct TestRunner {
    suite: String,
    tests: Vec<Test>,
    simulation: Simulation,
    junit_path: Option<PathBuf>,
}

impl Default for TestRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl TestRunner {
    /// Suite named after `CRATE_NAME` if it was set.
    pub fn new() -> Self {
        let suite = crate::CRATE_NAME
            .get()
            .cloned()
            .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string());
        Self {
            suite,
            tests: Vec::new(),
            simulation: Simulation::new(),
            junit_path: Some(PathBuf::from("results.xml")),
        }
    }

    pub fn suite(mut self, name: &str) -> Self {
        self.suite = name.to_string();
        self
    }

    pub fn simulation(mut self, simulation: Simulation) -> Self {
        self.simulation = simulation;
        self
    }

    /// Where to write the JUnit report, `None` to skip it.
    pub fn junit(mut self, path: Option<PathBuf>) -> Self {
        self.junit_path = path;
        self
    }

    pub fn add(&mut self, name: &str, generator: TestFn) {
        self.tests.push(Test::new(name, generator));
    }

    pub fn tests(&self) -> &[Test] {
        &self.tests
    }

    /// Runs every test. True if all passed.
    pub fn run(&mut self) -> bool {
        let start = time::Instant::now();
        for test in self.tests.iter_mut() {
            log::info!("TEST {}: starting", test.name);
            let time_start = time::Instant::now();
            let result = self.simulation.run((test.generator)());
            test.time_secs = time_start.elapsed().as_secs_f64();
            // the kernel of the finished run stays installed
            test.sim_time_ns = sim_if::with(|sim| sim.get_sim_time("ns")).unwrap_or(0.0);
            match &result {
                Ok(msg) => log::info!("TEST {}: passed: {}", test.name, msg),
                Err(e) => log::error!("TEST {}: failed: {}", test.name, e),
            }
            test.set_result(result);
        }
        log::info!("{}", self.summary(start.elapsed().as_secs_f64()));
        if let Some(path) = self.junit_path.as_ref() {
            junit::create_junit_xml(&self.suite, &self.tests, path);
        }
        self.tests.iter().all(Test::passed)
    }

    /// Results table of the tests run so far.
    pub fn summary(&self, real_time_secs: f64) -> Table {
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
        table.set_titles(Row::new(vec![
            Cell::new("test"),
            Cell::new("result"),
            Cell::new("time [s]"),
            Cell::new("sim time [ns]"),
            Cell::new("sim speed [ns/s]"),
        ]));
        let mut total_sim_ns = 0u64;
        for test in &self.tests {
            let result = match test.result.as_ref() {
                Some(Ok(_)) => "passed",
                Some(Err(_)) => "failed",
                None => "not run",
            };
            let sim_ns = test.sim_time_ns as u64;
            total_sim_ns += sim_ns;
            table.add_row(Row::new(vec![
                Cell::new(&test.name),
                Cell::new(result),
                Cell::new(&format!("{:.3}", test.time_secs)),
                Cell::new(&sim_ns.to_formatted_string(&Locale::en)),
                Cell::new(&format!("{:.3}", speed(test.sim_time_ns, test.time_secs))),
            ]));
        }
        let failed = self.tests.iter().filter(|t| !t.passed()).count();
        table.add_row(Row::new(vec![
            Cell::new("TOTAL"),
            Cell::new(&format!("{} failed", failed)),
            Cell::new(&format!("{:.3}", real_time_secs)),
            Cell::new(&total_sim_ns.to_formatted_string(&Locale::en)),
            Cell::new(&format!("{:.3}", speed(total_sim_ns as f64, real_time_secs))),
        ]));
        table
    }
}

fn speed(sim_ns: f64, secs: f64) -> f64 {
    if secs > 0.0 {
        sim_ns / secs
    } else {
        0.0
    }
}

/// Turns a failing check into a test error.
pub fn check(condition: bool, msg: &str) -> TestResult {
    if condition {
        Ok(msg.to_string())
    } else {
        Err(VerifyError::TestFailed(msg.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::SimObject;
    use crate::trigger::Trigger;
    use futures::FutureExt;

    fn waits_ten_ns() -> LocalBoxFuture<'static, TestResult> {
        async {
            Trigger::timer(10, "ns")?.await;
            Ok("waited".to_string())
        }
        .boxed_local()
    }

    fn fails() -> LocalBoxFuture<'static, TestResult> {
        async {
            SimObject::new("a", 1)?;
            check(false, "always fails")
        }
        .boxed_local()
    }

    #[test]
    fn runner_records_results_and_sim_time() {
        let mut runner = TestRunner::new().suite("runner").junit(None);
        runner.add("waits_ten_ns", waits_ten_ns);
        runner.add("fails", fails);
        assert!(!runner.run());

        let tests = runner.tests();
        assert!(tests[0].passed());
        assert_eq!(tests[0].sim_time_ns, 10.0);
        assert_eq!(
            tests[1].result,
            Some(Err(VerifyError::TestFailed("always fails".to_string())))
        );
        let summary = runner.summary(1.0).to_string();
        assert!(summary.contains("waits_ten_ns"));
        assert!(summary.contains("1 failed"));
    }
}
