use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::thread;
use std::time::Duration;

use indexmap::IndexSet;
use slog::Logger;
use uuid::Uuid;

use crate::agent::{Agent, AgentId, BoxAgent, BoxMessage, MailingList, Subscription, Topic};
use crate::config::{load_config, Config};
use crate::kernel::clock::{Clock, RealTimeClock, SimulationClock};
use crate::kernel::context::Context;
use crate::kernel::mailbox::Mailbox;
use crate::kernel::SchedulerError;
use crate::logger::default_log;
use crate::validate::{validate_alarm_time, validate_subscription};

/// Scheduler section of the configuration.
#[derive(Clone)]
pub struct SchedulerConfig {
    /// Operating frequency in Hz. While waiting for a required alarm on
    /// a real-time clock the scheduler sleeps one period per iteration.
    pub operating_frequency: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            operating_frequency: 1_000,
        }
    }
}

impl SchedulerConfig {
    pub(crate) fn merge(&mut self, v: &toml::Value) -> Option<()> {
        let v = v.as_table()?;
        if let Some(freq) = v.get("operating_frequency").and_then(toml::Value::as_integer) {
            self.operating_frequency = freq as u64;
        }
        Some(())
    }
}

/// Options for [`Scheduler::run`].
#[derive(Clone, Debug)]
pub struct RunOptions {
    /// Stop once this many seconds of clock time have elapsed.
    pub seconds: Option<f64>,
    /// Stop after this many iterations of the main loop. Zero returns
    /// before any agent is updated.
    pub iterations: Option<u64>,
    /// Stop when the mail queue runs dry and no required alarm is
    /// pending.
    pub pause_if_idle: bool,
    /// Purge all alarms when the run ends.
    pub clear_alarms_at_end: bool,
}

impl Default for RunOptions {
    fn default() -> RunOptions {
        RunOptions {
            seconds: None,
            iterations: None,
            pause_if_idle: true,
            clear_alarms_at_end: true,
        }
    }
}

impl RunOptions {
    pub fn seconds(seconds: f64) -> RunOptions {
        RunOptions {
            seconds: Some(seconds),
            ..RunOptions::default()
        }
    }

    pub fn iterations(iterations: u64) -> RunOptions {
        RunOptions {
            iterations: Some(iterations),
            ..RunOptions::default()
        }
    }
}

#[derive(Default)]
pub struct SchedulerBuilder {
    real_time: Option<bool>,
    cfg: Option<Config>,
    log: Option<Logger>,
}

impl SchedulerBuilder {
    pub fn new() -> Self {
        SchedulerBuilder::default()
    }

    pub fn real_time(self, real_time: bool) -> Self {
        SchedulerBuilder {
            real_time: Some(real_time),
            ..self
        }
    }

    pub fn cfg(self, cfg: Config) -> Self {
        SchedulerBuilder {
            cfg: Some(cfg),
            ..self
        }
    }

    pub fn log(self, log: Logger) -> Self {
        SchedulerBuilder {
            log: Some(log),
            ..self
        }
    }

    pub fn create(self) -> Scheduler {
        let cfg = self.cfg.unwrap_or_else(load_config);
        let log = self.log.unwrap_or_else(|| default_log(&cfg));
        let real_time = self.real_time.unwrap_or(true);

        Scheduler::create(real_time, log, cfg)
    }
}

struct AgentEntry {
    agent: BoxAgent,
    mailbox: Mailbox,
}

/// The runtime coordinating agents, mail and time.
///
/// A scheduler owns its agents, their mailboxes, the mail queue, the
/// subscription directory and the clock. Everything runs on the
/// caller's thread: `run` updates agents one at a time, advances the
/// clock, fires due alarms and routes mail until a halt condition is
/// met, then returns so the caller can inspect state or run again.
pub struct Scheduler {
    id: Uuid,
    log: Logger,
    clock: Box<dyn Clock>,
    agents: HashMap<AgentId, AgentEntry>,
    mailing_list: MailingList,
    mail_queue: VecDeque<BoxMessage>,
    needs_update: IndexSet<AgentId>,
    has_keep_awake: IndexSet<AgentId>,
    quit: bool,
    seq: u64,
    operating_frequency: u64,
    /// Identifier of the agent whose hook is currently running; it is
    /// detached from the registry for the duration of the call.
    active: Option<AgentId>,
}

impl Scheduler {
    /// Creates a real-time scheduler with default configuration.
    pub fn new() -> Scheduler {
        SchedulerBuilder::new().create()
    }

    /// Creates a scheduler on a simulation clock: deterministic, and
    /// time jumps to the next alarm whenever the system is quiet.
    pub fn simulated() -> Scheduler {
        SchedulerBuilder::new().real_time(false).create()
    }

    fn create(real_time: bool, log: Logger, cfg: Config) -> Scheduler {
        let id = Uuid::new_v4();
        if cfg.debug {
            slog::debug!(log, "Starting scheduler: Scheduler[{}]", id);
        }

        let clock: Box<dyn Clock> = if real_time {
            Box::new(RealTimeClock::new())
        } else {
            Box::new(SimulationClock::new())
        };

        Scheduler {
            id,
            log,
            clock,
            agents: HashMap::new(),
            mailing_list: MailingList::new(),
            mail_queue: VecDeque::new(),
            needs_update: IndexSet::new(),
            has_keep_awake: IndexSet::new(),
            quit: false,
            seq: 0,
            operating_frequency: cfg.scheduler.operating_frequency,
            active: None,
        }
    }

    /// Registers an agent: assigns an identifier if the agent brings
    /// none, runs `setup`, and schedules a first update.
    pub fn add(&mut self, agent: impl Agent + 'static) -> Result<AgentId, SchedulerError> {
        self.add_boxed(Box::new(agent))
    }

    pub fn add_boxed(&mut self, mut agent: BoxAgent) -> Result<AgentId, SchedulerError> {
        let id = match agent.id() {
            Some(id) => id,
            None => {
                self.seq += 1;
                AgentId::Seq(self.seq)
            }
        };
        if self.agents.contains_key(&id) || self.active.as_ref() == Some(&id) {
            return Err(SchedulerError::AlreadyExists(id));
        }

        slog::debug!(self.log, "Registering agent {}", id);
        let mut mailbox = Mailbox::new();
        let previous = self.active.replace(id.clone());
        {
            let mut ctx = Context::new(self, id.clone(), &mut mailbox);
            agent.setup(&mut ctx);
        }
        self.active = previous;

        if agent.keep_awake() {
            self.has_keep_awake.insert(id.clone());
        }
        self.needs_update.insert(id.clone());
        self.agents.insert(id.clone(), AgentEntry { agent, mailbox });
        Ok(id)
    }

    /// Removes an agent: runs `teardown`, drops its subscriptions and
    /// forgets it. Unknown identifiers are logged and skipped; pending
    /// alarms for the agent still fire but find no recipient.
    pub fn remove(&mut self, id: &AgentId) {
        let entry = match self.agents.remove(id) {
            Some(entry) => entry,
            None => {
                slog::debug!(self.log, "Agent not registered: {}", id);
                return;
            }
        };
        self.retire(id.clone(), entry);
    }

    fn retire(&mut self, id: AgentId, mut entry: AgentEntry) {
        slog::debug!(self.log, "Deregistering agent {}", id);
        let previous = self.active.replace(id.clone());
        {
            let mut ctx = Context::new(self, id.clone(), &mut entry.mailbox);
            entry.agent.teardown(&mut ctx);
        }
        self.active = previous;
        self.mailing_list.unsubscribe_all(&id);
        self.needs_update.shift_remove(&id);
        self.has_keep_awake.shift_remove(&id);
    }

    /// The main loop.
    ///
    /// Each iteration updates every agent owed a visit, advances the
    /// clock, fires due alarms, routes the mail queue, and evaluates
    /// the halt conditions in order: clock-time cap, iteration cap,
    /// required-alarm wait, idleness. Successive runs continue on the
    /// same clock.
    pub fn run(&mut self, opts: RunOptions) {
        let RunOptions {
            seconds,
            iterations,
            pause_if_idle,
            clear_alarms_at_end,
        } = opts;

        // refresh the clock so the deadline is measured from a current
        // reading; a no-op on simulation clocks
        self.clock.tick(None, true);
        let deadline = seconds.map(|seconds| self.clock.time() + seconds);
        let mut iterations_left = iterations;
        if iterations_left == Some(0) {
            return;
        }

        // catch up on mail and agents woken while the scheduler was paused
        let woken: Vec<AgentId> = self
            .agents
            .iter()
            .filter(|(_, entry)| !entry.mailbox.is_empty() || entry.agent.keep_awake())
            .map(|(id, _)| id.clone())
            .collect();
        self.needs_update.extend(woken);
        self.process_mail_queue();

        self.quit = false;
        while !self.quit {
            // 1. update every agent owed a visit
            self.update_round();

            // 2. advance the clock
            let work_pending = !self.mail_queue.is_empty() || !self.needs_update.is_empty();
            self.clock.tick(deadline, work_pending);

            // 3. fire due alarms into the mail queue
            self.clock.release_alarm_messages(&mut self.mail_queue);

            // 4. route and deliver
            let no_messages = self.mail_queue.is_empty();
            if !no_messages {
                self.process_mail_queue();
            }

            // 5. halt conditions
            if let Some(deadline) = deadline {
                if self.clock.time() >= deadline {
                    self.quit = true;
                }
            }
            if let Some(left) = iterations_left.as_mut() {
                *left -= 1;
                if *left == 0 {
                    self.quit = true;
                }
            }
            if no_messages {
                if self.clock.time() < self.clock.last_required_alarm() {
                    // idle, but a required alarm is still coming
                    thread::sleep(Duration::from_secs_f64(
                        1.0 / self.operating_frequency as f64,
                    ));
                } else if pause_if_idle {
                    self.quit = true;
                }
            }
        }

        if clear_alarms_at_end {
            self.clock.clear_alarms(None, None);
        }
    }

    fn update_round(&mut self) {
        let keep_awake: Vec<AgentId> = self.has_keep_awake.iter().cloned().collect();
        self.needs_update.extend(keep_awake);

        let round: Vec<AgentId> = self.needs_update.drain(..).collect();
        for id in round {
            let mut entry = match self.agents.remove(&id) {
                Some(entry) => entry,
                None => continue, // removed earlier in this round
            };
            let previous = self.active.replace(id.clone());
            let removed_self = {
                let mut ctx = Context::new(self, id.clone(), &mut entry.mailbox);
                entry.agent.update(&mut ctx);
                ctx.removal_requested()
            };
            self.active = previous;

            if removed_self {
                self.retire(id, entry);
            } else {
                if entry.agent.keep_awake() {
                    self.has_keep_awake.insert(id.clone());
                } else {
                    self.has_keep_awake.shift_remove(&id);
                }
                self.agents.insert(id, entry);
            }
        }
    }

    /// Asks the scheduler to stop at the end of the current iteration.
    /// In-flight updates always complete.
    pub fn pause(&mut self) {
        self.quit = true;
    }

    /// Enqueues a message for routing and delivery.
    pub fn send(&mut self, message: impl Into<BoxMessage>) {
        self.mail_queue.push_back(message.into());
    }

    /// Routes every queued message to its recipients and delivers:
    /// the original to the first live recipient, deep copies to the
    /// rest. Recipients that have been removed are skipped silently;
    /// every recipient that does get mail is marked for update. The
    /// queue is empty when this returns.
    pub fn process_mail_queue(&mut self) {
        while let Some(msg) = self.mail_queue.pop_front() {
            if msg.is_direct() && msg.receiver().is_none() {
                slog::warn!(
                    self.log,
                    "Discovered a direct message without receiver in the mail queue; dumped: {:?}",
                    msg
                );
                continue;
            }

            let recipients = self.mailing_list.get_mail_recipients(&*msg);
            let live: Vec<AgentId> = recipients
                .into_iter()
                .filter(|id| self.agents.contains_key(id))
                .collect();
            if live.is_empty() {
                slog::debug!(
                    self.log,
                    "No registered recipients for message (topic {})",
                    msg.topic()
                );
                continue;
            }

            for id in live.iter().skip(1) {
                let copy = msg.copy();
                if let Some(entry) = self.agents.get_mut(id) {
                    self.needs_update.insert(id.clone());
                    entry.mailbox.push(copy);
                }
            }
            if let Some(entry) = self.agents.get_mut(&live[0]) {
                self.needs_update.insert(live[0].clone());
                entry.mailbox.push(msg);
            }
        }
    }

    /// Validating wrapper over the mailing list: the subscriber must be
    /// registered, at most two filters may be set, and a topic filter
    /// must not spell out an agent identifier.
    pub fn subscribe(
        &mut self,
        subscriber: &AgentId,
        sender: Option<AgentId>,
        receiver: Option<AgentId>,
        topic: Option<Topic>,
    ) -> Result<(), SchedulerError> {
        self.ensure_registered(subscriber)?;
        validate_subscription(&sender, &receiver, &topic)?;
        if let Some(topic) = &topic {
            if self.id_matches_topic(topic) {
                return Err(SchedulerError::TopicCollision(topic.clone()));
            }
        }
        slog::debug!(
            self.log,
            "{} subscribing to sender: {:?}, receiver: {:?}, topic: {:?}",
            subscriber,
            sender,
            receiver,
            topic
        );
        self.mailing_list
            .subscribe(subscriber.clone(), sender, receiver, topic);
        Ok(())
    }

    /// Drops one exact subscription pattern of the subscriber.
    pub fn unsubscribe(
        &mut self,
        subscriber: &AgentId,
        sender: Option<AgentId>,
        receiver: Option<AgentId>,
        topic: Option<Topic>,
    ) -> Result<(), SchedulerError> {
        self.ensure_registered(subscriber)?;
        self.mailing_list
            .unsubscribe(subscriber, sender, receiver, topic);
        Ok(())
    }

    /// Drops every subscription the subscriber owns.
    pub fn unsubscribe_all(&mut self, subscriber: &AgentId) -> Result<(), SchedulerError> {
        self.ensure_registered(subscriber)?;
        self.mailing_list.unsubscribe_all(subscriber);
        Ok(())
    }

    pub fn get_subscriber_list(
        &self,
        sender: Option<AgentId>,
        receiver: Option<AgentId>,
        topic: Option<Topic>,
    ) -> Vec<AgentId> {
        self.mailing_list
            .get_subscriber_list(sender, receiver, topic)
    }

    pub fn get_subscription_topics(&self) -> Vec<Topic> {
        self.mailing_list.topics()
    }

    pub fn subscriptions_of(&self, subscriber: &AgentId) -> Vec<Subscription> {
        self.mailing_list.subscriptions_of(subscriber)
    }

    /// Schedules a wakeup for the message's receiver. `relative` makes
    /// `time` an offset from the current clock time, otherwise it is
    /// absolute.
    pub fn set_alarm(
        &mut self,
        time: f64,
        message: impl Into<BoxMessage>,
        relative: bool,
        ignore_if_idle: bool,
    ) -> Result<(), SchedulerError> {
        validate_alarm_time(time)?;
        let delay = if relative {
            time
        } else {
            time - self.clock.time()
        };
        self.clock.set_alarm(delay, message.into(), ignore_if_idle)
    }

    pub fn list_alarms(&self, receiver: &AgentId) -> Vec<(f64, Vec<&BoxMessage>)> {
        self.clock.list_alarms(receiver)
    }

    /// Purges alarms for one receiver, or all of them when `receiver`
    /// is `None`, optionally filtered by message topic.
    pub fn clear_alarms(&mut self, receiver: Option<&AgentId>, topic: Option<&Topic>) {
        self.clock.clear_alarms(receiver, topic);
    }

    pub fn clock(&self) -> &dyn Clock {
        &*self.clock
    }

    /// Current clock time in seconds.
    pub fn time(&self) -> f64 {
        self.clock.time()
    }

    #[inline]
    pub fn log(&self) -> &Logger {
        &self.log
    }

    /// Returns the UUID assigned to this scheduler instance.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_registered(&self, id: &AgentId) -> bool {
        self.agents.contains_key(id)
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    /// An agent's mailbox, for inspection between runs.
    pub fn mailbox(&self, id: &AgentId) -> Option<&Mailbox> {
        self.agents.get(id).map(|entry| &entry.mailbox)
    }

    pub fn mail_queue_len(&self) -> usize {
        self.mail_queue.len()
    }

    fn ensure_registered(&self, id: &AgentId) -> Result<(), SchedulerError> {
        if self.agents.contains_key(id) || self.active.as_ref() == Some(id) {
            Ok(())
        } else {
            Err(SchedulerError::NotRegistered(id.clone()))
        }
    }

    fn id_matches_topic(&self, topic: &Topic) -> bool {
        self.agents.keys().any(|id| id.matches_topic(topic))
            || self
                .active
                .as_ref()
                .map(|id| id.matches_topic(topic))
                .unwrap_or(false)
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Scheduler[{}, agents: {}, time: {}]",
            self.id,
            self.agents.len(),
            self.clock.time()
        )
    }
}
