use std::collections::HashMap;

use indexmap::IndexSet;

use crate::agent::{AgentId, Message, Topic};

/// One subscription pattern: `None` at any position means "any".
///
/// At most two of the three filters are ever set; the scheduler rejects
/// the remaining combinations before they reach the directory.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Subscription {
    pub sender: Option<AgentId>,
    pub receiver: Option<AgentId>,
    pub topic: Option<Topic>,
}

type TopicLevel = HashMap<Option<Topic>, IndexSet<AgentId>>;
type ReceiverLevel = HashMap<Option<AgentId>, TopicLevel>;

/// Subscription directory and recipient resolution.
///
/// The directory is a three-level mapping keyed by
/// `(sender, receiver, topic)` filters; a reverse index per subscriber
/// makes unsubscribing cheap. The mailing list applies no validation of
/// its own; the scheduler's `subscribe` wrapper is the checked entry
/// point.
pub struct MailingList {
    directory: HashMap<Option<AgentId>, ReceiverLevel>,
    index: HashMap<AgentId, IndexSet<Subscription>>,
}

impl MailingList {
    pub fn new() -> Self {
        MailingList {
            directory: HashMap::new(),
            index: HashMap::new(),
        }
    }

    /// Registers a subscription pattern. Subscribing twice to the same
    /// pattern is a no-op.
    pub fn subscribe(
        &mut self,
        subscriber: AgentId,
        sender: Option<AgentId>,
        receiver: Option<AgentId>,
        topic: Option<Topic>,
    ) {
        let subs = self
            .directory
            .entry(sender.clone())
            .or_insert_with(HashMap::new)
            .entry(receiver.clone())
            .or_insert_with(HashMap::new)
            .entry(topic.clone())
            .or_insert_with(IndexSet::new);
        subs.insert(subscriber.clone());

        self.index
            .entry(subscriber)
            .or_insert_with(IndexSet::new)
            .insert(Subscription {
                sender,
                receiver,
                topic,
            });
    }

    /// Removes one exact subscription pattern.
    pub fn unsubscribe(
        &mut self,
        subscriber: &AgentId,
        sender: Option<AgentId>,
        receiver: Option<AgentId>,
        topic: Option<Topic>,
    ) {
        let pattern = Subscription {
            sender,
            receiver,
            topic,
        };
        self.remove_pattern(subscriber, &pattern);

        if let Some(patterns) = self.index.get_mut(subscriber) {
            patterns.shift_remove(&pattern);
            if patterns.is_empty() {
                self.index.remove(subscriber);
            }
        }
    }

    /// Removes every subscription this subscriber owns.
    pub fn unsubscribe_all(&mut self, subscriber: &AgentId) {
        if let Some(patterns) = self.index.remove(subscriber) {
            for pattern in &patterns {
                self.remove_pattern(subscriber, pattern);
            }
        }
    }

    fn remove_pattern(&mut self, subscriber: &AgentId, pattern: &Subscription) {
        let mut prune_sender = false;
        if let Some(receivers) = self.directory.get_mut(&pattern.sender) {
            let mut prune_receiver = false;
            if let Some(topics) = receivers.get_mut(&pattern.receiver) {
                if let Some(subs) = topics.get_mut(&pattern.topic) {
                    subs.shift_remove(subscriber);
                    if subs.is_empty() {
                        topics.remove(&pattern.topic);
                    }
                }
                prune_receiver = topics.is_empty();
            }
            if prune_receiver {
                receivers.remove(&pattern.receiver);
            }
            prune_sender = receivers.is_empty();
        }
        if prune_sender {
            self.directory.remove(&pattern.sender);
        }
    }

    /// Subscribers registered for exactly this pattern. No wildcard
    /// expansion happens on the query side.
    pub fn get_subscriber_list(
        &self,
        sender: Option<AgentId>,
        receiver: Option<AgentId>,
        topic: Option<Topic>,
    ) -> Vec<AgentId> {
        self.lookup(&sender, &receiver, &topic)
            .map(|subs| subs.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// The subscriptions a given subscriber owns.
    pub fn subscriptions_of(&self, subscriber: &AgentId) -> Vec<Subscription> {
        self.index
            .get(subscriber)
            .map(|patterns| patterns.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Distinct topic filters present in the directory, sorted.
    pub fn topics(&self) -> Vec<Topic> {
        let mut topics = IndexSet::new();
        for receivers in self.directory.values() {
            for topic_level in receivers.values() {
                for topic in topic_level.keys().flatten() {
                    topics.insert(topic.clone());
                }
            }
        }
        let mut topics: Vec<Topic> = topics.into_iter().collect();
        topics.sort();
        topics
    }

    /// Resolves the recipient set for a message.
    ///
    /// Direct messages go to their receiver and nobody else. Everything
    /// else starts from the receiver (when there is one) and unions in
    /// the subscribers of each filter combination the message matches.
    /// The all-wildcard combination is never looked up.
    pub fn get_mail_recipients(&self, msg: &dyn Message) -> IndexSet<AgentId> {
        let mut recipients = IndexSet::new();

        if msg.is_direct() {
            if let Some(receiver) = msg.receiver() {
                recipients.insert(receiver.clone());
            }
            return recipients;
        }

        if let Some(receiver) = msg.receiver() {
            recipients.insert(receiver.clone());
        }

        let senders = [msg.sender().cloned(), None];
        let receivers = [msg.receiver().cloned(), None];
        let topics = [Some(msg.topic().clone()), None];
        for sender in &senders {
            for receiver in &receivers {
                for topic in &topics {
                    if sender.is_none() && receiver.is_none() && topic.is_none() {
                        continue;
                    }
                    if let Some(subs) = self.lookup(sender, receiver, topic) {
                        for sub in subs {
                            recipients.insert(sub.clone());
                        }
                    }
                }
            }
        }

        recipients
    }

    fn lookup(
        &self,
        sender: &Option<AgentId>,
        receiver: &Option<AgentId>,
        topic: &Option<Topic>,
    ) -> Option<&IndexSet<AgentId>> {
        self.directory.get(sender)?.get(receiver)?.get(topic)
    }
}
