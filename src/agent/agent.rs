use std::fmt;
use std::sync::Arc;

use crate::kernel::Context;

use super::Topic;

/// Stable identity of an agent within one scheduler.
///
/// Identifiers are either assigned by the scheduler from its own
/// monotonic counter, or supplied by the caller as a name. Callers that
/// need identifiers unique across schedulers supply their own.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AgentId {
    Seq(u64),
    Name(Arc<str>),
}

impl AgentId {
    /// Whether a topic filter spells out this identifier. Used to keep
    /// the topic namespace and the agent namespace apart.
    pub(crate) fn matches_topic(&self, topic: &Topic) -> bool {
        match self {
            AgentId::Seq(_) => false,
            AgentId::Name(name) => &**name == topic.as_str(),
        }
    }
}

impl<'a> From<&'a str> for AgentId {
    fn from(name: &str) -> Self {
        AgentId::Name(Arc::from(name))
    }
}

impl From<String> for AgentId {
    fn from(name: String) -> Self {
        AgentId::Name(Arc::from(name.as_str()))
    }
}

impl From<u64> for AgentId {
    fn from(seq: u64) -> Self {
        AgentId::Seq(seq)
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AgentId::Seq(seq) => write!(f, "#{}", seq),
            AgentId::Name(name) => f.write_str(name),
        }
    }
}

/// An autonomous unit of computation driven by the scheduler.
///
/// Agents hold their own state; the kernel owns their mailbox and hands
/// them a [`Context`] whenever a lifecycle hook runs. A typical `update`
/// drains the mailbox and dispatches on each message's topic:
///
/// ```
/// use agentry::agents::*;
///
/// struct Greeter;
///
/// impl Agent for Greeter {
///     fn update(&mut self, ctx: &mut Context) {
///         while let Some(msg) = ctx.receive() {
///             match msg.topic().as_str() {
///                 "hello" => slog::info!(ctx.log(), "greeted"),
///                 _ => {}
///             }
///         }
///     }
/// }
/// ```
///
/// Dispatching on topics is a convention of the agent, not of the
/// kernel; the kernel only ever calls `update`.
pub trait Agent {
    /// Fixed identifier for this agent. `None` lets the scheduler
    /// assign the next counter value on registration.
    fn id(&self) -> Option<AgentId> {
        None
    }

    /// When true the scheduler updates this agent every iteration,
    /// whether or not it has mail. Re-read after every `update`.
    fn keep_awake(&self) -> bool {
        false
    }

    /// Invoked when the agent is registered with a scheduler.
    fn setup(&mut self, _ctx: &mut Context) {}

    /// Invoked on every scheduler iteration in which the agent has
    /// inbound mail, was woken by an alarm, or is flagged keep-awake.
    /// Runs to completion; there is no preemption.
    fn update(&mut self, ctx: &mut Context);

    /// Invoked when the agent is removed from the scheduler.
    fn teardown(&mut self, _ctx: &mut Context) {}
}

/// The agent trait object.
pub type BoxAgent = Box<dyn Agent>;
