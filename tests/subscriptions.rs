use slog::{o, Logger};

use agentry::agents::*;

fn sim() -> Scheduler {
    SchedulerBuilder::new()
        .real_time(false)
        .log(Logger::root(slog::Discard, o!()))
        .create()
}

#[derive(Clone, Debug)]
struct Note {
    header: Header,
}

impl Note {
    fn new(sender: impl Into<Option<AgentId>>, receiver: impl Into<Option<AgentId>>) -> Self {
        Note {
            header: Header::new::<Note>(sender, receiver),
        }
    }

    fn with_topic(
        sender: impl Into<Option<AgentId>>,
        receiver: impl Into<Option<AgentId>>,
        topic: &str,
    ) -> Self {
        Note {
            header: Header::new::<Note>(sender, receiver).with_topic(topic),
        }
    }
}

impl Message for Note {
    fn header(&self) -> &Header {
        &self.header
    }

    fn header_mut(&mut self) -> &mut Header {
        &mut self.header
    }

    fn copy(&self) -> BoxMessage {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

/// Leaves every delivered message in its mailbox so tests can count
/// them between runs.
struct Sink {
    id: AgentId,
}

impl Sink {
    fn new(id: &str) -> Self {
        Sink {
            id: AgentId::from(id),
        }
    }
}

impl Agent for Sink {
    fn id(&self) -> Option<AgentId> {
        Some(self.id.clone())
    }

    fn update(&mut self, _ctx: &mut Context) {}
}

fn id(name: &str) -> AgentId {
    AgentId::from(name)
}

#[test]
fn directory_answers_exact_queries_only() {
    let mut m = MailingList::new();

    m.subscribe(AgentId::from(1u64), None, Some(AgentId::from(1u64)), None);
    m.subscribe(AgentId::from(1u64), None, None, Some(Topic::from("A")));
    assert_eq!(
        m.get_subscriber_list(None, Some(AgentId::from(1u64)), None),
        vec![AgentId::from(1u64)]
    );
    assert_eq!(
        m.get_subscriber_list(None, None, Some(Topic::from("A"))),
        vec![AgentId::from(1u64)]
    );

    m.subscribe(
        AgentId::from(2u64),
        None,
        Some(AgentId::from(1u64)),
        Some(Topic::from("B")),
    );
    assert_eq!(
        m.get_subscriber_list(None, Some(AgentId::from(1u64)), Some(Topic::from("B"))),
        vec![AgentId::from(2u64)]
    );
    // the broader pattern is untouched
    assert_eq!(
        m.get_subscriber_list(None, Some(AgentId::from(1u64)), None),
        vec![AgentId::from(1u64)]
    );

    m.subscribe(AgentId::from(3u64), None, Some(AgentId::from(1u64)), None);
    assert_eq!(
        m.get_subscriber_list(None, Some(AgentId::from(1u64)), None),
        vec![AgentId::from(1u64), AgentId::from(3u64)]
    );

    assert_eq!(
        m.get_subscriber_list(None, None, Some(Topic::from("C"))),
        Vec::<AgentId>::new()
    );
}

#[test]
fn subscribing_is_idempotent() {
    let mut m = MailingList::new();
    m.subscribe(id("s"), None, None, Some(Topic::from("T")));
    m.subscribe(id("s"), None, None, Some(Topic::from("T")));
    assert_eq!(
        m.get_subscriber_list(None, None, Some(Topic::from("T"))),
        vec![id("s")]
    );
    assert_eq!(m.subscriptions_of(&id("s")).len(), 1);
}

#[test]
fn unsubscribe_restores_prior_state() {
    let mut m = MailingList::new();
    m.subscribe(id("s"), Some(id("a")), None, Some(Topic::from("T")));
    m.unsubscribe(&id("s"), Some(id("a")), None, Some(Topic::from("T")));
    assert!(m.subscriptions_of(&id("s")).is_empty());
    assert!(m
        .get_subscriber_list(Some(id("a")), None, Some(Topic::from("T")))
        .is_empty());
    assert!(m.topics().is_empty());
}

#[test]
fn unsubscribe_everything() {
    let mut m = MailingList::new();
    m.subscribe(id("s"), None, Some(id("a")), None);
    m.subscribe(id("s"), None, None, Some(Topic::from("T")));
    m.subscribe(id("t"), None, None, Some(Topic::from("T")));
    m.unsubscribe_all(&id("s"));
    assert!(m.subscriptions_of(&id("s")).is_empty());
    assert_eq!(
        m.get_subscriber_list(None, None, Some(Topic::from("T"))),
        vec![id("t")]
    );
}

#[test]
fn direct_messages_bypass_subscriptions() {
    let mut m = MailingList::new();
    m.subscribe(id("spy"), None, None, Some(Topic::from("Note")));

    let msg = Note::new(id("a"), id("b"));
    assert_eq!(
        m.get_mail_recipients(&msg).into_iter().collect::<Vec<_>>(),
        vec![id("b"), id("spy")]
    );

    // same message marked direct: the spy no longer sees it
    struct DirectNote(Note);
    impl std::fmt::Debug for DirectNote {
        fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            self.0.fmt(f)
        }
    }
    impl Message for DirectNote {
        fn header(&self) -> &Header {
            self.0.header()
        }
        fn header_mut(&mut self) -> &mut Header {
            self.0.header_mut()
        }
        fn copy(&self) -> BoxMessage {
            Box::new(DirectNote(self.0.clone()))
        }
        fn as_any(&self) -> &dyn std::any::Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
            self
        }
        fn is_direct(&self) -> bool {
            true
        }
    }
    let direct = DirectNote(msg);
    assert_eq!(
        m.get_mail_recipients(&direct)
            .into_iter()
            .collect::<Vec<_>>(),
        vec![id("b")]
    );
}

/// The spy matrix from the original routing semantics: subscribers
/// watching a sender/receiver pair, a sender/topic pair, a bare topic
/// and a bare sender or receiver all see exactly the traffic their
/// pattern matches.
#[test]
fn wildcard_subscriptions_route_the_expected_traffic() {
    let mut s = sim();
    for name in &["a", "b", "c", "spy_a_b", "spy_b_hello", "spy_hello", "spy_all_c"] {
        s.add(Sink::new(name)).unwrap();
    }

    s.subscribe(&id("spy_a_b"), Some(id("a")), Some(id("b")), None)
        .unwrap();
    s.subscribe(&id("spy_b_hello"), Some(id("b")), None, Some(Topic::from("Hello")))
        .unwrap();
    s.subscribe(&id("spy_hello"), None, None, Some(Topic::from("Hello")))
        .unwrap();
    s.subscribe(&id("spy_all_c"), Some(id("c")), None, None)
        .unwrap();
    s.subscribe(&id("spy_all_c"), None, Some(id("c")), None)
        .unwrap();

    let count = |s: &Scheduler, name: &str| s.mailbox(&id(name)).unwrap().len();

    s.send(Note::with_topic(id("a"), id("b"), "Hello"));
    s.process_mail_queue();
    assert_eq!(count(&s, "a"), 0);
    assert_eq!(count(&s, "c"), 0);
    assert_eq!(count(&s, "spy_b_hello"), 0);
    assert_eq!(count(&s, "b"), 1);
    assert_eq!(count(&s, "spy_a_b"), 1);
    assert_eq!(count(&s, "spy_hello"), 1);

    s.send(Note::with_topic(id("b"), id("a"), "Hello"));
    s.process_mail_queue();
    assert_eq!(count(&s, "a"), 1);
    assert_eq!(count(&s, "spy_b_hello"), 1);
    assert_eq!(count(&s, "spy_hello"), 2);
    assert_eq!(count(&s, "spy_a_b"), 1);

    s.send(Note::with_topic(id("b"), id("c"), "Hello"));
    s.process_mail_queue();
    assert_eq!(count(&s, "c"), 1);
    assert_eq!(count(&s, "spy_b_hello"), 2);
    assert_eq!(count(&s, "spy_hello"), 3);
    assert_eq!(count(&s, "spy_all_c"), 1);

    // a broadcast: no receiver, routed purely by subscriptions
    s.send(Note::with_topic(id("c"), None, "Hello"));
    s.process_mail_queue();
    assert_eq!(count(&s, "a"), 1);
    assert_eq!(count(&s, "b"), 1);
    assert_eq!(count(&s, "c"), 1);
    assert_eq!(count(&s, "spy_hello"), 4);
    assert_eq!(count(&s, "spy_all_c"), 2);

    // a different topic from a to b
    s.send(Note::with_topic(id("a"), id("b"), "How are you?"));
    s.process_mail_queue();
    assert_eq!(count(&s, "b"), 2);
    assert_eq!(count(&s, "spy_a_b"), 2);
    assert_eq!(count(&s, "spy_hello"), 4);
    assert_eq!(count(&s, "spy_b_hello"), 2);
}

#[test]
fn sender_and_topic_filter_sees_only_matching_traffic() {
    let mut s = sim();
    for name in &["a", "b", "s"] {
        s.add(Sink::new(name)).unwrap();
    }
    s.subscribe(&id("s"), Some(id("a")), None, Some(Topic::from("hello")))
        .unwrap();

    s.send(Note::with_topic(id("a"), id("b"), "hello"));
    s.send(Note::with_topic(id("a"), id("b"), "world"));
    s.send(Note::with_topic(id("a"), id("b"), "hello"));
    s.process_mail_queue();

    assert_eq!(s.mailbox(&id("b")).unwrap().len(), 3);
    assert_eq!(s.mailbox(&id("s")).unwrap().len(), 2);
    assert_eq!(s.mailbox(&id("a")).unwrap().len(), 0);
}

#[derive(Clone, Debug)]
struct WeatherReport {
    header: Header,
    original: bool,
    degrees: i32,
}

impl WeatherReport {
    fn new(sender: AgentId) -> Self {
        WeatherReport {
            header: Header::new::<WeatherReport>(sender, None).with_topic("weather"),
            original: true,
            degrees: 21,
        }
    }
}

impl Message for WeatherReport {
    fn header(&self) -> &Header {
        &self.header
    }

    fn header_mut(&mut self) -> &mut Header {
        &mut self.header
    }

    fn copy(&self) -> BoxMessage {
        Box::new(WeatherReport {
            header: self.header.clone(),
            original: false,
            degrees: self.degrees,
        })
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

/// Fan-out delivery hands the original message to exactly one
/// recipient and equivalent copies to the rest.
#[test]
fn broadcast_fan_out_copies_for_all_but_one() {
    let mut s = sim();
    for name in &["a", "b", "c", "d"] {
        s.add(Sink::new(name)).unwrap();
    }
    for name in &["a", "b", "c"] {
        s.subscribe(&id(name), None, None, Some(Topic::from("weather")))
            .unwrap();
    }

    s.send(WeatherReport::new(id("d")));
    s.process_mail_queue();

    assert_eq!(s.mailbox(&id("d")).unwrap().len(), 0);
    let mut originals = 0;
    for name in &["a", "b", "c"] {
        let mailbox = s.mailbox(&id(name)).unwrap();
        assert_eq!(mailbox.len(), 1);
        let report = mailbox
            .iter()
            .next()
            .unwrap()
            .downcast_ref::<WeatherReport>()
            .unwrap();
        assert_eq!(report.degrees, 21);
        if report.original {
            originals += 1;
        }
    }
    assert_eq!(originals, 1);
}

#[test]
fn single_recipient_gets_the_original() {
    let mut s = sim();
    s.add(Sink::new("a")).unwrap();
    s.add(Sink::new("d")).unwrap();

    s.send(WeatherReport::new(id("d")));
    // nobody subscribed: the broadcast is dropped
    s.process_mail_queue();
    assert_eq!(s.mailbox(&id("a")).unwrap().len(), 0);

    s.subscribe(&id("a"), None, None, Some(Topic::from("weather")))
        .unwrap();
    s.send(WeatherReport::new(id("d")));
    s.process_mail_queue();

    let mailbox = s.mailbox(&id("a")).unwrap();
    assert_eq!(mailbox.len(), 1);
    let report = mailbox
        .iter()
        .next()
        .unwrap()
        .downcast_ref::<WeatherReport>()
        .unwrap();
    assert!(report.original);
}

#[test]
fn subscription_topics_are_tracked() {
    let mut s = sim();
    s.add(Sink::new("a")).unwrap();
    s.subscribe(&id("a"), None, None, Some(Topic::from("news")))
        .unwrap();
    s.subscribe(&id("a"), Some(id("a")), None, Some(Topic::from("weather")))
        .unwrap();
    s.subscribe(&id("a"), None, Some(id("a")), None).unwrap();

    let topics = s.get_subscription_topics();
    assert_eq!(topics, vec![Topic::from("news"), Topic::from("weather")]);

    assert_eq!(s.subscriptions_of(&id("a")).len(), 3);
}

#[test]
fn removal_drops_all_subscriptions() {
    let mut s = sim();
    s.add(Sink::new("a")).unwrap();
    s.add(Sink::new("b")).unwrap();
    s.subscribe(&id("a"), None, None, Some(Topic::from("news")))
        .unwrap();
    s.subscribe(&id("b"), None, None, Some(Topic::from("news")))
        .unwrap();

    s.remove(&id("a"));
    assert!(s.subscriptions_of(&id("a")).is_empty());
    assert_eq!(
        s.get_subscriber_list(None, None, Some(Topic::from("news"))),
        vec![id("b")]
    );
}
