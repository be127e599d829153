mod agent;
mod mailing_list;
mod message;

pub use self::agent::{Agent, AgentId, BoxAgent};
pub use self::mailing_list::{MailingList, Subscription};
pub use self::message::{BoxMessage, Header, Message, Topic};
