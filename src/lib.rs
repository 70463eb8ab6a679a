//! AXI4-Stream conformance testbenches on a cooperative, in-process
//! event-driven simulation kernel.

pub mod axis;
pub mod bits;
pub mod error;
mod executor;
mod junit;
pub mod kernel;
pub mod prelude;
pub mod range;
pub mod signal;
pub mod sim_if;
pub mod simulation;
pub mod tb_obj;
pub mod test;
pub mod trigger;
pub mod utils;

use once_cell::sync::OnceCell;

pub use executor::{run_once, JoinHandle, Task};
pub use futures;

/// Suite name used by the test runner, set by `run_tests!`.
pub static CRATE_NAME: OnceCell<String> = OnceCell::new();

/// Generates `fn main` running the given async test functions on fresh
/// simulations. Exits with status 1 if any test fails.
///
/// ```ignore
/// async fn loopback() -> axistb::error::TestResult { ... }
/// axistb::run_tests!(loopback);
/// ```
#[macro_export]
macro_rules! run_tests {
    ($($test:ident),+ $(,)?) => {
        fn main() {
            use $crate::futures::FutureExt;
            let _ = $crate::CRATE_NAME.set(env!("CARGO_PKG_NAME").to_string());
            let mut runner = $crate::test::TestRunner::new();
            $(runner.add(stringify!($test), || $test().boxed_local());)+
            if !runner.run() {
                ::std::process::exit(1);
            }
        }
    };
}
