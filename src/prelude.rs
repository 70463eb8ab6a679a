pub use crate::axis::*;
pub use crate::bits::BitVector;
pub use crate::error::{SimResult, TestResult, VerifyError};
pub use crate::executor::{JoinHandle, Task};
pub use crate::kernel::Kernel;
pub use crate::range::Range;
pub use crate::signal::SimObject;
pub use crate::sim_if::{self, SimIf};
pub use crate::simulation::Simulation;
pub use crate::tb_obj::TbObj;
pub use crate::test::{check, TestRunner};
pub use crate::trigger::{EdgeKind, Trigger};
pub use crate::utils::{clock, clock_cycles, sim_time_steps};
pub use futures::future::FutureExt;
