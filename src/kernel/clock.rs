use std::collections::VecDeque;
use std::time::Instant;

use crate::agent::{AgentId, BoxMessage, Topic};
use crate::kernel::registry::AlarmSchedule;
use crate::kernel::SchedulerError;
use crate::validate::validate_alarm_time;

/// Time source and alarm store driving a scheduler.
///
/// The two variants share the alarm machinery and differ only in how
/// `tick` advances time: the real-time clock follows the host, the
/// simulation clock jumps.
pub trait Clock {
    /// Current time in seconds.
    fn time(&self) -> f64;

    /// Advances time. `limit` caps how far a simulated clock may jump;
    /// `work_pending` reports whether the scheduler still has mail to
    /// deliver or agents to update.
    fn tick(&mut self, limit: Option<f64>, work_pending: bool);

    /// Schedules `message` to fire `delay` seconds from now, registered
    /// under the message's receiver. With `ignore_if_idle` false the
    /// scheduler will not halt on idleness before the alarm has fired.
    fn set_alarm(
        &mut self,
        delay: f64,
        message: BoxMessage,
        ignore_if_idle: bool,
    ) -> Result<(), SchedulerError>;

    /// Moves every alarm message due at the current time into the mail
    /// queue.
    fn release_alarm_messages(&mut self, mail_queue: &mut VecDeque<BoxMessage>);

    /// Drops pending alarms for one receiver, or for all receivers when
    /// `receiver` is `None`, optionally filtered by message topic.
    fn clear_alarms(&mut self, receiver: Option<&AgentId>, topic: Option<&Topic>);

    /// Pending alarms for a receiver, in time order.
    fn list_alarms(&self, receiver: &AgentId) -> Vec<(f64, Vec<&BoxMessage>)>;

    fn has_alarm_at(&self, receiver: &AgentId, at: f64) -> bool;

    /// The pending wakeup times, ascending and deduplicated.
    fn wakeup_times(&self) -> Vec<f64>;

    /// The receivers registered to wake at `at`.
    fn receivers_at(&self, at: f64) -> Vec<AgentId>;

    fn next_wakeup(&self) -> Option<f64>;

    /// Highest wakeup time of any alarm that must not be dropped on
    /// idle; 0 when no such alarm is pending.
    fn last_required_alarm(&self) -> f64;
}

fn schedule_alarm(
    schedule: &mut AlarmSchedule,
    now: f64,
    delay: f64,
    message: BoxMessage,
    ignore_if_idle: bool,
) -> Result<(), SchedulerError> {
    validate_alarm_time(delay)?;
    let at = now + delay;
    validate_alarm_time(at)?;
    let receiver = match message.receiver() {
        Some(receiver) => receiver.clone(),
        None => return Err(SchedulerError::MissingAlarmReceiver),
    };
    schedule.insert(at, receiver, message, !ignore_if_idle);
    Ok(())
}

/// Wall-clock variant. `tick` reads the host monotonic clock; time is
/// seconds elapsed since the clock was created.
pub struct RealTimeClock {
    origin: Instant,
    time: f64,
    schedule: AlarmSchedule,
}

impl RealTimeClock {
    pub fn new() -> RealTimeClock {
        RealTimeClock {
            origin: Instant::now(),
            time: 0.0,
            schedule: AlarmSchedule::new(),
        }
    }
}

impl Clock for RealTimeClock {
    fn time(&self) -> f64 {
        self.time
    }

    fn tick(&mut self, _limit: Option<f64>, _work_pending: bool) {
        self.time = self.origin.elapsed().as_secs_f64();
    }

    fn set_alarm(
        &mut self,
        delay: f64,
        message: BoxMessage,
        ignore_if_idle: bool,
    ) -> Result<(), SchedulerError> {
        schedule_alarm(&mut self.schedule, self.time, delay, message, ignore_if_idle)
    }

    fn release_alarm_messages(&mut self, mail_queue: &mut VecDeque<BoxMessage>) {
        let mut fired = Vec::new();
        self.schedule.release_up_to(self.time, &mut fired);
        mail_queue.extend(fired);
    }

    fn clear_alarms(&mut self, receiver: Option<&AgentId>, topic: Option<&Topic>) {
        self.schedule.clear(receiver, topic);
    }

    fn list_alarms(&self, receiver: &AgentId) -> Vec<(f64, Vec<&BoxMessage>)> {
        self.schedule.list(receiver)
    }

    fn has_alarm_at(&self, receiver: &AgentId, at: f64) -> bool {
        self.schedule
            .registry(receiver)
            .map_or(false, |registry| registry.has_alarm_at(at))
    }

    fn wakeup_times(&self) -> Vec<f64> {
        self.schedule.wakeup_times()
    }

    fn receivers_at(&self, at: f64) -> Vec<AgentId> {
        self.schedule.receivers_at(at)
    }

    fn next_wakeup(&self) -> Option<f64> {
        self.schedule.next_wakeup()
    }

    fn last_required_alarm(&self) -> f64 {
        self.schedule.last_required_alarm()
    }
}

/// Deterministic variant. Time stands still while the scheduler has
/// work in flight; once the system is quiet, `tick` jumps straight to
/// the earliest pending alarm, or to `limit` if that comes first.
pub struct SimulationClock {
    time: f64,
    schedule: AlarmSchedule,
}

impl SimulationClock {
    pub fn new() -> SimulationClock {
        SimulationClock {
            time: 0.0,
            schedule: AlarmSchedule::new(),
        }
    }
}

impl Clock for SimulationClock {
    fn time(&self) -> f64 {
        self.time
    }

    fn tick(&mut self, limit: Option<f64>, work_pending: bool) {
        if work_pending {
            return;
        }
        let target = match (self.schedule.next_wakeup(), limit) {
            (Some(at), Some(limit)) => Some(at.min(limit)),
            (Some(at), None) => Some(at),
            (None, Some(limit)) => Some(limit),
            (None, None) => None,
        };
        if let Some(target) = target {
            if target > self.time {
                self.time = target;
            }
        }
    }

    fn set_alarm(
        &mut self,
        delay: f64,
        message: BoxMessage,
        ignore_if_idle: bool,
    ) -> Result<(), SchedulerError> {
        schedule_alarm(&mut self.schedule, self.time, delay, message, ignore_if_idle)
    }

    fn release_alarm_messages(&mut self, mail_queue: &mut VecDeque<BoxMessage>) {
        let mut fired = Vec::new();
        self.schedule.release_up_to(self.time, &mut fired);
        mail_queue.extend(fired);
    }

    fn clear_alarms(&mut self, receiver: Option<&AgentId>, topic: Option<&Topic>) {
        self.schedule.clear(receiver, topic);
    }

    fn list_alarms(&self, receiver: &AgentId) -> Vec<(f64, Vec<&BoxMessage>)> {
        self.schedule.list(receiver)
    }

    fn has_alarm_at(&self, receiver: &AgentId, at: f64) -> bool {
        self.schedule
            .registry(receiver)
            .map_or(false, |registry| registry.has_alarm_at(at))
    }

    fn wakeup_times(&self) -> Vec<f64> {
        self.schedule.wakeup_times()
    }

    fn receivers_at(&self, at: f64) -> Vec<AgentId> {
        self.schedule.receivers_at(at)
    }

    fn next_wakeup(&self) -> Option<f64> {
        self.schedule.next_wakeup()
    }

    fn last_required_alarm(&self) -> f64 {
        self.schedule.last_required_alarm()
    }
}
