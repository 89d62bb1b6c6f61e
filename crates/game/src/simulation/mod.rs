mod scheduler;
mod tick;

pub use scheduler::{Task, TaskScheduler, EXPOSURE_TICK_SECS, INTERACT_STEP_SECS};
pub use tick::FixedTimestep;
