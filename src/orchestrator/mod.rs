pub mod controller;
pub mod driver;
pub mod progress;

pub use controller::{IterationController, RunLock, RunOutcome, RunReport};
pub use driver::{DriveOutcome, PhaseDriver};
pub use progress::{ProgressEntry, ProgressLog};
