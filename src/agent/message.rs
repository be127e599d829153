use std::any::Any;
use std::fmt;

use crate::agent::AgentId;

/// Topics allow subscribers to filter messages by interest.
///
/// Every message carries a topic; when none is given explicitly the
/// header defaults it to the message type's name.
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct Topic(String);

impl Topic {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'a> From<&'a str> for Topic {
    fn from(topic: &str) -> Self {
        Topic(topic.to_string())
    }
}

impl From<String> for Topic {
    fn from(topic: String) -> Self {
        Topic(topic)
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Routing metadata carried by every message: who sent it, who should
/// receive it, what it is about, and whether it bypasses topic routing.
///
/// A `None` receiver makes the message a broadcast, delivered solely
/// through subscriptions. The direct flag can only be set together with
/// a receiver, so a well-formed direct message always has somewhere to
/// go.
#[derive(Clone, Debug)]
pub struct Header {
    sender: Option<AgentId>,
    receiver: Option<AgentId>,
    topic: Topic,
    direct: bool,
}

impl Header {
    /// Creates a header for message type `M`, with `M`'s unqualified
    /// type name as the topic.
    pub fn new<M: 'static>(
        sender: impl Into<Option<AgentId>>,
        receiver: impl Into<Option<AgentId>>,
    ) -> Header {
        Header {
            sender: sender.into(),
            receiver: receiver.into(),
            topic: Topic::from(short_type_name::<M>()),
            direct: false,
        }
    }

    /// Creates a header for a direct message. Direct messages skip the
    /// subscription directory entirely, hence the mandatory receiver.
    pub fn direct<M: 'static>(sender: impl Into<Option<AgentId>>, receiver: AgentId) -> Header {
        Header {
            sender: sender.into(),
            receiver: Some(receiver),
            topic: Topic::from(short_type_name::<M>()),
            direct: true,
        }
    }

    /// Replaces the default topic.
    pub fn with_topic(mut self, topic: impl Into<Topic>) -> Header {
        self.topic = topic.into();
        self
    }

    pub fn sender(&self) -> Option<&AgentId> {
        self.sender.as_ref()
    }

    pub fn receiver(&self) -> Option<&AgentId> {
        self.receiver.as_ref()
    }

    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    pub fn is_direct(&self) -> bool {
        self.direct
    }

    pub fn set_sender(&mut self, sender: impl Into<Option<AgentId>>) {
        self.sender = sender.into();
    }

    pub fn set_receiver(&mut self, receiver: impl Into<Option<AgentId>>) {
        self.receiver = receiver.into();
    }

    pub fn set_topic(&mut self, topic: impl Into<Topic>) {
        self.topic = topic.into();
    }
}

fn short_type_name<M: ?Sized>() -> &'static str {
    let name = std::any::type_name::<M>();
    name.rsplit("::").next().unwrap_or(name)
}

/// The message contract.
///
/// Messages are transient: enqueued by the sender, consumed by the
/// recipient. When a message fans out to several recipients the kernel
/// hands the original to one of them and the output of `copy` to the
/// rest, so `copy` must produce a fully independent instance.
pub trait Message: fmt::Debug + 'static {
    fn header(&self) -> &Header;

    fn header_mut(&mut self) -> &mut Header;

    /// Deep copy used for fan-out delivery.
    fn copy(&self) -> BoxMessage;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn sender(&self) -> Option<&AgentId> {
        self.header().sender()
    }

    fn receiver(&self) -> Option<&AgentId> {
        self.header().receiver()
    }

    fn topic(&self) -> &Topic {
        self.header().topic()
    }

    fn is_direct(&self) -> bool {
        self.header().is_direct()
    }
}

/// The message trait object.
pub type BoxMessage = Box<dyn Message>;

impl<M: Message> From<M> for BoxMessage {
    fn from(msg: M) -> BoxMessage {
        Box::new(msg)
    }
}

impl dyn Message {
    pub fn is<M: Message>(&self) -> bool {
        self.as_any().is::<M>()
    }

    pub fn downcast_ref<M: Message>(&self) -> Option<&M> {
        self.as_any().downcast_ref()
    }

    pub fn downcast_mut<M: Message>(&mut self) -> Option<&mut M> {
        self.as_any_mut().downcast_mut()
    }
}
