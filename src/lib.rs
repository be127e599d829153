#![crate_name = "agentry"]
#![deny(clippy::all)]
#![allow(clippy::new_without_default)]

mod config;
mod validate;

pub mod agent;
pub mod kernel;
pub mod logger;

pub use crate::config::{load_config, Config};

pub mod agents {
    pub use crate::agent::*;
    pub use crate::config::{load_config, Config};
    pub use crate::kernel::{
        Clock, Context, Mailbox, RealTimeClock, RunOptions, Scheduler, SchedulerBuilder,
        SchedulerError, SimulationClock,
    };
    pub use crate::logger::default_log;
}
