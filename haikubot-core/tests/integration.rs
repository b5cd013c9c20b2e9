//! End-to-end tests: scripted feed → engine → pipeline → publisher
//!
//! The relay side is replaced by in-memory fakes; classification, signing,
//! the reply ledger and the engine state machine are the real ones.

use async_trait::async_trait;
use haikubot_core::classify::{Classifier, LexiconAnalyzer, PhoneticAnalyzer, Substitutions, Token};
use haikubot_core::db::Database;
use haikubot_core::ingest::{FeedConnector, FeedSession, FeedSignal};
use haikubot_core::keys::Keys;
use haikubot_core::publish::RelayTransport;
use haikubot_core::{
    EngineReport, EngineSettings, Error, Filter, IngestEngine, Kind, Message, Pipeline,
    ReplyPublisher, Result, Timestamp,
};
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const BOT_SECRET: &str = "0000000000000000000000000000000000000000000000000000000000000003";
const START: Timestamp = Timestamp(1_700_000_000);

// ============================================
// Fakes
// ============================================

/// Plays one script per connection. Once the scripts run out the next
/// connect cancels the engine.
#[derive(Clone)]
struct ScriptedFeed {
    scripts: Arc<Mutex<VecDeque<Vec<FeedSignal>>>>,
    filters: Arc<Mutex<Vec<Filter>>>,
    shutdown: CancellationToken,
}

impl ScriptedFeed {
    fn new(scripts: Vec<Vec<FeedSignal>>, shutdown: CancellationToken) -> Self {
        Self {
            scripts: Arc::new(Mutex::new(scripts.into())),
            filters: Arc::new(Mutex::new(Vec::new())),
            shutdown,
        }
    }

    fn filters(&self) -> Vec<Filter> {
        self.filters.lock().unwrap().clone()
    }
}

struct ScriptedSession {
    signals: VecDeque<FeedSignal>,
    filters: Arc<Mutex<Vec<Filter>>>,
}

#[async_trait]
impl FeedConnector for ScriptedFeed {
    type Session = ScriptedSession;

    fn endpoint(&self) -> &str {
        "scripted://feed"
    }

    async fn connect(&self) -> Result<ScriptedSession> {
        let next = self.scripts.lock().unwrap().pop_front();
        match next {
            Some(signals) => Ok(ScriptedSession {
                signals: signals.into(),
                filters: self.filters.clone(),
            }),
            None => {
                self.shutdown.cancel();
                Err(Error::transport("scripted://feed", "script exhausted"))
            }
        }
    }
}

#[async_trait]
impl FeedSession for ScriptedSession {
    async fn subscribe(&mut self, filter: &Filter) -> Result<()> {
        self.filters.lock().unwrap().push(filter.clone());
        Ok(())
    }

    async fn next_signal(&mut self) -> Option<FeedSignal> {
        match self.signals.pop_front() {
            Some(signal) => Some(signal),
            None => Some(FeedSignal::Closed("end of script".to_string())),
        }
    }

    async fn close(&mut self) {}
}

/// Accepts on the listed relays, refuses everywhere else.
struct FakeRelays {
    accepting: HashSet<String>,
    published: Mutex<Vec<(String, Message)>>,
}

impl FakeRelays {
    fn new(accepting: &[&str]) -> Self {
        Self {
            accepting: accepting.iter().map(|s| s.to_string()).collect(),
            published: Mutex::new(Vec::new()),
        }
    }

    fn published(&self) -> Vec<(String, Message)> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl RelayTransport for FakeRelays {
    async fn send(&self, relay: &str, event: &Message) -> Result<()> {
        if !self.accepting.contains(relay) {
            return Err(Error::transport(relay, "connection refused"));
        }
        self.published
            .lock()
            .unwrap()
            .push((relay.to_string(), event.clone()));
        Ok(())
    }
}

struct PanickingAnalyzer;

impl PhoneticAnalyzer for PanickingAnalyzer {
    fn analyze(&self, text: &str) -> Result<Vec<Token>> {
        panic!("analyzer must not run for {:?}", text)
    }
}

// ============================================
// Harness
// ============================================

const RELAYS: [&str; 3] = ["wss://a.example", "wss://b.example", "wss://c.example"];

struct Bot {
    db: Arc<Database>,
    relays: Arc<FakeRelays>,
    pipeline: Pipeline,
}

fn bot(accepting: &[&str], classifier: Classifier) -> Bot {
    let keys = Arc::new(Keys::parse(BOT_SECRET).unwrap());
    let relays = Arc::new(FakeRelays::new(accepting));
    let publisher = Arc::new(ReplyPublisher::new(
        keys,
        relays.clone(),
        RELAYS.iter().map(|s| s.to_string()).collect(),
    ));
    let db = Arc::new(Database::open_in_memory().unwrap());
    db.migrate().unwrap();

    Bot {
        pipeline: Pipeline::new(Arc::new(classifier), publisher, db.clone()),
        db,
        relays,
    }
}

fn builtin_classifier() -> Classifier {
    Classifier::new(
        Arc::new(LexiconAnalyzer::builtin().unwrap()),
        Substitutions::builtin().unwrap(),
    )
}

fn settings() -> EngineSettings {
    EngineSettings {
        reconnect_delay: Duration::from_millis(10),
        max_reconnect_delay: Duration::from_millis(10),
        ..Default::default()
    }
}

fn note(id_byte: &str, created_at: i64, content: &str) -> Message {
    Message {
        id: id_byte.repeat(32),
        author: "ab".repeat(32),
        created_at: Timestamp(created_at),
        kind: Kind::TEXT_NOTE,
        tags: vec![],
        content: content.to_string(),
        sig: String::new(),
    }
}

fn deliver(message: &Message) -> FeedSignal {
    FeedSignal::Message(Box::new(message.clone()))
}

async fn run(bot: Bot, scripts: Vec<Vec<FeedSignal>>) -> (EngineReport, ScriptedFeed, Arc<Database>, Arc<FakeRelays>) {
    let shutdown = CancellationToken::new();
    let feed = ScriptedFeed::new(scripts, shutdown.clone());
    let engine = IngestEngine::new(feed.clone(), Arc::new(bot.pipeline), settings(), START);

    let report = tokio::time::timeout(Duration::from_secs(30), engine.run(shutdown))
        .await
        .expect("engine did not stop");
    (report, feed, bot.db, bot.relays)
}

// ============================================
// Scenarios
// ============================================

#[tokio::test]
async fn test_haiku_is_answered_once_across_reconnects() {
    let haiku = note("11", 1_700_000_100, "古池や蛙飛び込む水の音 https://example.com #俳句");
    let scripts = vec![
        vec![
            FeedSignal::EndOfStoredEvents,
            deliver(&haiku),
            FeedSignal::TransportError("connection reset".to_string()),
        ],
        // the relay backfills the same message after resubscription
        vec![deliver(&haiku)],
    ];

    let (report, feed, db, relays) = run(bot(&RELAYS, builtin_classifier()), scripts).await;

    assert_eq!(report.replied, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.watermark, Timestamp(1_700_000_100));

    let filters = feed.filters();
    assert_eq!(filters.len(), 2);
    assert_eq!(filters[0].since, Some(START));
    assert_eq!(filters[1].since, Some(Timestamp(1_700_000_100)));

    let published = relays.published();
    assert_eq!(published.len(), 3, "one reply offered to each relay");
    let reply = &published[0].1;
    assert!(reply
        .content
        .starts_with("古池や蛙飛び込む水の音 #n575 #haiku\nnostr:nevent1"));
    assert_eq!(reply.tags[0].value(), Some(haiku.id.as_str()));
    assert_eq!(reply.created_at, Timestamp(1_700_000_101));

    assert!(db.has_replied(&haiku.id).unwrap());
    assert_eq!(db.load_watermark().unwrap(), Some(Timestamp(1_700_000_100)));
}

#[tokio::test]
async fn test_one_accepting_relay_is_enough() {
    let haiku = note("22", 1_700_000_200, "古池や蛙飛び込む水の音");

    let (report, _feed, db, relays) = run(
        bot(&["wss://b.example"], builtin_classifier()),
        vec![vec![deliver(&haiku)]],
    )
    .await;

    assert_eq!(report.replied, 1);
    assert_eq!(report.failed, 0);
    assert_eq!(relays.published().len(), 1);
    let record = db.get_reply(&haiku.id).unwrap().unwrap();
    assert_eq!(record.relays_accepted, 1);
}

#[tokio::test]
async fn test_undelivered_reply_keeps_watermark() {
    let haiku = note("33", 1_700_000_300, "古池や蛙飛び込む水の音");

    let (report, _feed, db, _relays) =
        run(bot(&[], builtin_classifier()), vec![vec![deliver(&haiku)]]).await;

    assert_eq!(report.failed, 1);
    assert_eq!(report.replied, 0);
    assert_eq!(report.watermark, START);
    assert!(!db.has_replied(&haiku.id).unwrap());
    assert_eq!(db.load_watermark().unwrap(), None);
}

#[tokio::test]
async fn test_links_and_hashtags_never_reach_the_analyzer() {
    let classifier = Classifier::new(Arc::new(PanickingAnalyzer), Substitutions::builtin().unwrap());
    let scripts = vec![vec![
        deliver(&note("44", 1_700_000_400, "https://example.com/photo.jpg #nostr")),
        deliver(&note("55", 1_700_000_401, "gm nostr")),
        deliver(&note("66", 1_700_000_402, "古池や蛙飛び込む水の音 #n575 #haiku")),
    ]];

    let (report, _feed, _db, relays) = run(bot(&RELAYS, classifier), scripts).await;

    assert_eq!(report.processed, 3);
    assert_eq!(report.skipped, 3);
    assert!(relays.published().is_empty());
    // skipped messages still move the watermark
    assert_eq!(report.watermark, Timestamp(1_700_000_402));
}

#[tokio::test]
async fn test_tanka_in_channel_is_threaded() {
    let channel = "cc".repeat(32);
    let mut tanka = note("77", 1_700_000_500, "春過ぎて夏来にけらし白妙の衣干すてふ天の香具山");
    tanka.kind = Kind::CHANNEL_MESSAGE;
    tanka.tags = vec![haikubot_core::Tag(vec![
        "e".to_string(),
        channel.clone(),
        String::new(),
        "root".to_string(),
    ])];

    let (report, _feed, _db, relays) = run(
        bot(&["wss://a.example"], builtin_classifier()),
        vec![vec![deliver(&tanka)]],
    )
    .await;

    assert_eq!(report.replied, 1);
    let reply = &relays.published()[0].1;
    assert_eq!(reply.kind, Kind::CHANNEL_MESSAGE);
    assert_eq!(reply.content, "春過ぎて夏来にけらし白妙の衣干すてふ天の香具山 #n57577 #tanka");
    assert_eq!(reply.tags[0].value(), Some(channel.as_str()));
    assert_eq!(reply.tags[1].marker(), Some("reply"));
    assert_eq!(reply.tags[1].value(), Some(tanka.id.as_str()));
}
