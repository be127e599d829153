mod clock;
mod context;
mod mailbox;
mod registry;
mod scheduler;

pub use self::clock::{Clock, RealTimeClock, SimulationClock};
pub use self::context::Context;
pub use self::mailbox::Mailbox;
pub use self::scheduler::{RunOptions, Scheduler, SchedulerBuilder, SchedulerConfig};

use std::error::Error;
use std::fmt;

use crate::agent::{AgentId, Topic};

/// Errors raised by the scheduler's public entry points.
///
/// Missing recipients and unknown removal targets are deliberately not
/// here; those are logged and skipped.
pub enum SchedulerError {
    /// `add` was given an agent whose identifier is already in use.
    AlreadyExists(AgentId),
    /// An operation that requires registration was invoked for an agent
    /// the scheduler does not know.
    NotRegistered(AgentId),
    /// A subscription with all three filters unset.
    EmptySubscription,
    /// A subscription with all three filters set.
    OverConstrained,
    /// A topic filter that spells out a registered agent's identifier.
    TopicCollision(Topic),
    /// An alarm time that is not a finite number of seconds.
    InvalidAlarmTime(f64),
    /// An alarm message without a receiver to register it under.
    MissingAlarmReceiver,
}

impl SchedulerError {
    fn reason(&self) -> String {
        match self {
            SchedulerError::AlreadyExists(id) => {
                format!("Agent identifier already in use ({})", id)
            }
            SchedulerError::NotRegistered(id) => {
                format!("Agent is not registered with this scheduler ({})", id)
            }
            SchedulerError::EmptySubscription => {
                "Subscription needs at least one of sender, receiver or topic".to_string()
            }
            SchedulerError::OverConstrained => {
                "Subscription may set at most two of sender, receiver and topic".to_string()
            }
            SchedulerError::TopicCollision(topic) => {
                format!("Topic collides with a registered agent identifier ({})", topic)
            }
            SchedulerError::InvalidAlarmTime(time) => {
                format!("Alarm time must be a finite number of seconds ({})", time)
            }
            SchedulerError::MissingAlarmReceiver => {
                "Alarm message has no receiver".to_string()
            }
        }
    }
}

impl Error for SchedulerError {}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.reason())
    }
}

impl fmt::Debug for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.reason())
    }
}
