use slog::Logger;

use crate::agent::{Agent, AgentId, BoxMessage, Subscription, Topic};
use crate::kernel::mailbox::Mailbox;
use crate::kernel::scheduler::Scheduler;
use crate::kernel::SchedulerError;

/// The scheduler-facing API handed to an agent while one of its
/// lifecycle hooks runs.
///
/// Everything an agent may do to the outside world goes through here:
/// sending and receiving mail, setting and clearing alarms, managing
/// subscriptions, registering and removing agents, and asking the
/// scheduler to pause. A context only exists while the agent is
/// registered, so an agent never observes time or mail outside a
/// scheduler.
pub struct Context<'a> {
    scheduler: &'a mut Scheduler,
    id: AgentId,
    mailbox: &'a mut Mailbox,
    removed: bool,
}

impl<'a> Context<'a> {
    pub(crate) fn new(
        scheduler: &'a mut Scheduler,
        id: AgentId,
        mailbox: &'a mut Mailbox,
    ) -> Context<'a> {
        Context {
            scheduler,
            id,
            mailbox,
            removed: false,
        }
    }

    pub(crate) fn removal_requested(&self) -> bool {
        self.removed
    }

    /// The identifier this agent is registered under.
    pub fn id(&self) -> &AgentId {
        &self.id
    }

    /// Current clock time in seconds.
    pub fn time(&self) -> f64 {
        self.scheduler.time()
    }

    pub fn log(&self) -> &Logger {
        self.scheduler.log()
    }

    /// Enqueues a message; it is routed and delivered at the end of the
    /// current iteration.
    pub fn send(&mut self, message: impl Into<BoxMessage>) {
        self.scheduler.send(message);
    }

    /// Pops the oldest inbound message, if any.
    pub fn receive(&mut self) -> Option<BoxMessage> {
        self.mailbox.pop()
    }

    /// Whether there is unread mail in the mailbox.
    pub fn has_messages(&self) -> bool {
        !self.mailbox.is_empty()
    }

    /// Schedules a wakeup for the message's receiver. With `relative`
    /// the wakeup fires `time` seconds from now, otherwise at the
    /// absolute clock time `time`. Passing `ignore_if_idle = false`
    /// keeps the scheduler alive through idle periods until the alarm
    /// has fired.
    pub fn set_alarm(
        &mut self,
        time: f64,
        message: impl Into<BoxMessage>,
        relative: bool,
        ignore_if_idle: bool,
    ) -> Result<(), SchedulerError> {
        self.scheduler.set_alarm(time, message, relative, ignore_if_idle)
    }

    /// Pending alarms, this agent's own unless another receiver is
    /// given.
    pub fn list_alarms(&self, receiver: Option<&AgentId>) -> Vec<(f64, Vec<&BoxMessage>)> {
        self.scheduler.list_alarms(receiver.unwrap_or(&self.id))
    }

    /// Purges pending alarms, this agent's own unless another receiver
    /// is given, optionally only those carrying `topic`.
    pub fn clear_alarms(&mut self, receiver: Option<&AgentId>, topic: Option<&Topic>) {
        let receiver = receiver.or(Some(&self.id));
        self.scheduler.clear_alarms(receiver, topic);
    }

    /// Subscribes this agent to a `(sender, receiver, topic)` pattern;
    /// at most two of the three may be given.
    pub fn subscribe(
        &mut self,
        sender: Option<AgentId>,
        receiver: Option<AgentId>,
        topic: Option<Topic>,
    ) -> Result<(), SchedulerError> {
        let id = self.id.clone();
        self.scheduler.subscribe(&id, sender, receiver, topic)
    }

    /// Drops one exact subscription pattern.
    pub fn unsubscribe(
        &mut self,
        sender: Option<AgentId>,
        receiver: Option<AgentId>,
        topic: Option<Topic>,
    ) -> Result<(), SchedulerError> {
        let id = self.id.clone();
        self.scheduler.unsubscribe(&id, sender, receiver, topic)
    }

    /// Drops every subscription this agent owns.
    pub fn unsubscribe_all(&mut self) -> Result<(), SchedulerError> {
        let id = self.id.clone();
        self.scheduler.unsubscribe_all(&id)
    }

    /// The subscriptions this agent owns.
    pub fn subscriptions(&self) -> Vec<Subscription> {
        self.scheduler.subscriptions_of(&self.id)
    }

    /// Subscribers registered for exactly the given pattern.
    pub fn get_subscriber_list(
        &self,
        sender: Option<AgentId>,
        receiver: Option<AgentId>,
        topic: Option<Topic>,
    ) -> Vec<AgentId> {
        self.scheduler.get_subscriber_list(sender, receiver, topic)
    }

    /// Distinct topics present in the subscription directory.
    pub fn get_subscription_topics(&self) -> Vec<Topic> {
        self.scheduler.get_subscription_topics()
    }

    /// Asks the scheduler to stop at the end of the current iteration.
    pub fn pause(&mut self) {
        self.scheduler.pause();
    }

    /// Registers another agent; its `setup` runs before this returns.
    pub fn add(&mut self, agent: impl Agent + 'static) -> Result<AgentId, SchedulerError> {
        self.scheduler.add(agent)
    }

    /// Removes an agent. Removing any other agent takes effect
    /// immediately; removing oneself takes effect when the current hook
    /// returns.
    pub fn remove(&mut self, id: &AgentId) {
        if *id == self.id {
            self.removed = true;
        } else {
            self.scheduler.remove(id);
        }
    }
}
