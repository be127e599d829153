use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use indexmap::IndexSet;

use crate::agent::{AgentId, BoxMessage, Topic};

/// Wakeup times are plain seconds, but `f64` has no total order, so the
/// alarm maps key on this wrapper instead.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Timestamp(pub(crate) f64);

impl PartialEq for Timestamp {
    fn eq(&self, other: &Self) -> bool {
        self.0.total_cmp(&other.0) == Ordering::Equal
    }
}

impl Eq for Timestamp {}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

#[derive(Debug)]
struct AlarmEntry {
    message: BoxMessage,
    /// A required alarm keeps the scheduler alive through idle periods
    /// until it has fired.
    required: bool,
}

/// Pending alarms for one receiving agent, keyed by wakeup time.
///
/// Alarms with the same wakeup time fire in the order they were set.
#[derive(Debug)]
pub struct AlarmRegistry {
    alarms: BTreeMap<Timestamp, Vec<AlarmEntry>>,
}

impl AlarmRegistry {
    fn new() -> AlarmRegistry {
        AlarmRegistry {
            alarms: BTreeMap::new(),
        }
    }

    fn set(&mut self, at: f64, message: BoxMessage, required: bool) {
        self.alarms
            .entry(Timestamp(at))
            .or_insert_with(Vec::new)
            .push(AlarmEntry { message, required });
    }

    /// Pops every alarm with wakeup time `<= t`, appending the messages
    /// to `out` in time order.
    fn release_up_to(&mut self, t: f64, out: &mut Vec<BoxMessage>) {
        let due: Vec<Timestamp> = self
            .alarms
            .range(..=Timestamp(t))
            .map(|(at, _)| *at)
            .collect();
        for at in due {
            if let Some(entries) = self.alarms.remove(&at) {
                out.extend(entries.into_iter().map(|e| e.message));
            }
        }
    }

    pub fn has_alarm_at(&self, t: f64) -> bool {
        self.alarms.contains_key(&Timestamp(t))
    }

    /// Drops pending alarms, all of them or only those carrying the
    /// given topic. Returns the wakeup times that no longer hold any
    /// alarm for this receiver.
    fn clear(&mut self, topic: Option<&Topic>) -> Vec<f64> {
        match topic {
            None => {
                let emptied = self.alarms.keys().map(|at| at.0).collect();
                self.alarms.clear();
                emptied
            }
            Some(topic) => {
                let mut emptied = Vec::new();
                self.alarms.retain(|at, entries| {
                    entries.retain(|e| e.message.topic() != topic);
                    if entries.is_empty() {
                        emptied.push(at.0);
                        false
                    } else {
                        true
                    }
                });
                emptied
            }
        }
    }

    /// Pending alarms in time order, messages in insertion order.
    pub fn list(&self) -> Vec<(f64, Vec<&BoxMessage>)> {
        self.alarms
            .iter()
            .map(|(at, entries)| (at.0, entries.iter().map(|e| &e.message).collect()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.alarms.is_empty()
    }

    fn max_required(&self) -> Option<f64> {
        self.alarms
            .iter()
            .rev()
            .find_map(|(at, entries)| entries.iter().any(|e| e.required).then(|| at.0))
    }
}

/// Alarm state shared by both clock variants: one registry per
/// receiver, the global wakeup-time sequence, and the watermark of the
/// latest alarm that must not be dropped on idle.
///
/// The wakeup map is sorted ascending and deduplicated by construction;
/// its first key is always the earliest pending alarm, and every key
/// maps to a non-empty receiver set.
pub(crate) struct AlarmSchedule {
    registries: HashMap<AgentId, AlarmRegistry>,
    wakeup_times: BTreeMap<Timestamp, IndexSet<AgentId>>,
    last_required_alarm: f64,
}

impl AlarmSchedule {
    pub(crate) fn new() -> AlarmSchedule {
        AlarmSchedule {
            registries: HashMap::new(),
            wakeup_times: BTreeMap::new(),
            last_required_alarm: 0.0,
        }
    }

    pub(crate) fn insert(&mut self, at: f64, receiver: AgentId, message: BoxMessage, required: bool) {
        self.registries
            .entry(receiver.clone())
            .or_insert_with(AlarmRegistry::new)
            .set(at, message, required);
        self.wakeup_times
            .entry(Timestamp(at))
            .or_insert_with(IndexSet::new)
            .insert(receiver);
        if required && at > self.last_required_alarm {
            self.last_required_alarm = at;
        }
    }

    /// Walks the wakeup sequence from the front and appends every
    /// message due at or before `now` to `out`.
    pub(crate) fn release_up_to(&mut self, now: f64, out: &mut Vec<BoxMessage>) {
        let due: Vec<Timestamp> = self
            .wakeup_times
            .range(..=Timestamp(now))
            .map(|(at, _)| *at)
            .collect();
        if due.is_empty() {
            return;
        }
        for at in due {
            let receivers = self.wakeup_times.remove(&at).unwrap_or_default();
            for receiver in receivers {
                if let Some(registry) = self.registries.get_mut(&receiver) {
                    registry.release_up_to(at.0, out);
                    if registry.is_empty() {
                        self.registries.remove(&receiver);
                    }
                }
            }
        }
        self.recompute_required();
    }

    pub(crate) fn clear(&mut self, receiver: Option<&AgentId>, topic: Option<&Topic>) {
        match (receiver, topic) {
            (None, None) => {
                self.registries.clear();
                self.wakeup_times.clear();
            }
            (Some(receiver), topic) => {
                let mut emptied = Vec::new();
                let mut registry_empty = false;
                if let Some(registry) = self.registries.get_mut(receiver) {
                    emptied = registry.clear(topic);
                    registry_empty = registry.is_empty();
                }
                for at in emptied {
                    self.prune(at, receiver);
                }
                if registry_empty {
                    self.registries.remove(receiver);
                }
            }
            (None, Some(topic)) => {
                let mut pruned = Vec::new();
                self.registries.retain(|id, registry| {
                    for at in registry.clear(Some(topic)) {
                        pruned.push((at, id.clone()));
                    }
                    !registry.is_empty()
                });
                for (at, id) in pruned {
                    self.prune(at, &id);
                }
            }
        }
        self.recompute_required();
    }

    fn prune(&mut self, at: f64, receiver: &AgentId) {
        if let Some(receivers) = self.wakeup_times.get_mut(&Timestamp(at)) {
            receivers.shift_remove(receiver);
            if receivers.is_empty() {
                self.wakeup_times.remove(&Timestamp(at));
            }
        }
    }

    fn recompute_required(&mut self) {
        self.last_required_alarm = self
            .registries
            .values()
            .filter_map(AlarmRegistry::max_required)
            .fold(0.0, f64::max);
    }

    pub(crate) fn registry(&self, receiver: &AgentId) -> Option<&AlarmRegistry> {
        self.registries.get(receiver)
    }

    pub(crate) fn list(&self, receiver: &AgentId) -> Vec<(f64, Vec<&BoxMessage>)> {
        self.registries
            .get(receiver)
            .map(AlarmRegistry::list)
            .unwrap_or_default()
    }

    pub(crate) fn wakeup_times(&self) -> Vec<f64> {
        self.wakeup_times.keys().map(|at| at.0).collect()
    }

    pub(crate) fn receivers_at(&self, at: f64) -> Vec<AgentId> {
        self.wakeup_times
            .get(&Timestamp(at))
            .map(|receivers| receivers.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub(crate) fn next_wakeup(&self) -> Option<f64> {
        self.wakeup_times.keys().next().map(|at| at.0)
    }

    pub(crate) fn last_required_alarm(&self) -> f64 {
        self.last_required_alarm
    }
}
