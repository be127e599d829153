use crate::agent::{AgentId, Topic};
use crate::kernel::SchedulerError;

/// A subscription names at most two of (sender, receiver, topic). The
/// empty triple would match every message and is rejected; the full
/// triple is rejected as over-constrained.
pub(crate) fn validate_subscription(
    sender: &Option<AgentId>,
    receiver: &Option<AgentId>,
    topic: &Option<Topic>,
) -> Result<(), SchedulerError> {
    let filters = [sender.is_some(), receiver.is_some(), topic.is_some()];
    match filters.iter().filter(|set| **set).count() {
        0 => Err(SchedulerError::EmptySubscription),
        3 => Err(SchedulerError::OverConstrained),
        _ => Ok(()),
    }
}

/// Alarm times must be finite seconds.
pub(crate) fn validate_alarm_time(time: f64) -> Result<(), SchedulerError> {
    if time.is_finite() {
        Ok(())
    } else {
        Err(SchedulerError::InvalidAlarmTime(time))
    }
}
