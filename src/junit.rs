use junit_report::{Duration, ReportBuilder, TestCaseBuilder, TestSuiteBuilder};
use std::path::Path;

use crate::test::Test;

pub(crate) fn create_junit_xml(suite: &str, tests: &[Test], path: &Path) {
    let mut test_cases = Vec::new();

    for t in tests.iter() {
        let tc = match t.result.as_ref() {
            Some(Ok(_)) => TestCaseBuilder::success(&t.name, Duration::seconds_f64(t.time_secs)),
            Some(Err(e)) => TestCaseBuilder::failure(
                &t.name,
                Duration::seconds_f64(t.time_secs),
                "failure",
                &e.to_string(),
            ),
            None => TestCaseBuilder::skipped(&t.name),
        }
        .build();
        test_cases.push(tc);
    }

    let test_suite = TestSuiteBuilder::new(suite)
        .add_testcases(test_cases)
        .build();
    let report = ReportBuilder::new().add_testsuite(test_suite).build();
    let file = match std::fs::File::create(path) {
        Ok(file) => file,
        Err(e) => {
            log::error!("Couldn't create {}: {}", path.display(), e);
            return;
        }
    };
    match report.write_xml(file) {
        Ok(()) => log::info!("JUnit report written to {}", path.display()),
        Err(e) => log::error!("Couldn't write {}: {:?}", path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VerifyError;
    use futures::future::{self, FutureExt};

    #[test]
    fn report_lists_every_test() {
        let mut passed = Test::new("passes", || future::ready(Ok(String::new())).boxed_local());
        passed.set_result(Ok("ok".to_string()));
        let mut failed = Test::new("fails", || future::ready(Ok(String::new())).boxed_local());
        failed.set_result(Err(VerifyError::TestFailed("bad byte".to_string())));

        let path = std::env::temp_dir().join(format!("axistb-junit-{}.xml", std::process::id()));
        create_junit_xml("suite", &[passed, failed], &path);
        let xml = std::fs::read_to_string(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert!(xml.contains("passes"));
        assert!(xml.contains("bad byte"));
    }
}
