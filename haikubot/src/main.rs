//! haikubot - Nostr haiku/tanka bot
//!
//! Listens to a relay, and when a post reads as 5-7-5 or 5-7-5-7-7 it
//! replies with the poem and `#n575 #haiku` / `#n57577 #tanka`.
//!
//! Uses XDG Base Directory specification for file locations:
//! - Database: $XDG_DATA_HOME/haikubot/data.db (~/.local/share/haikubot/data.db)
//! - Logs: $XDG_STATE_HOME/haikubot/haikubot.log (~/.local/state/haikubot/haikubot.log)
//! - Config: $XDG_CONFIG_HOME/haikubot/config.toml (~/.config/haikubot/config.toml)

mod dump;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use haikubot_core::classify::Classifier;
use haikubot_core::heartbeat::{Heartbeat, HttpHeartbeat};
use haikubot_core::keys::Keys;
use haikubot_core::relay::{RelayConnector, WsRelayTransport};
use haikubot_core::{
    normalize, Config, Database, EngineSettings, IngestEngine, Meter, MessageProcessor, Pipeline,
    ReplyPublisher, Timestamp,
};
use tokio_util::sync::CancellationToken;

use crate::dump::DumpProcessor;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(name = "haikubot")]
#[command(about = "Reply to Nostr posts written in haiku or tanka meter")]
#[command(disable_version_flag = true)]
struct Args {
    /// Config file (default: $XDG_CONFIG_HOME/haikubot/config.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Debug logging and classifier traces
    #[arg(short = 'V', long)]
    verbose: bool,

    /// Print every received message as a JSON line
    #[arg(long)]
    dump: bool,

    /// Classify the given text and exit
    #[arg(short = 't', long = "test")]
    test: bool,

    /// Text for --test
    #[arg(value_name = "TEXT")]
    text: Vec<String>,

    /// Show version
    #[arg(long)]
    version: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.version {
        println!("haikubot {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    // Ensure XDG environment variables are set before using core library
    Config::ensure_xdg_env();

    let config = match &args.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("failed to load configuration")?;

    if args.test {
        return classify_once(&config, &args.text, args.verbose);
    }

    config.validate().context("invalid configuration")?;

    let _log_guard = haikubot_core::logging::init(&config.logging, args.verbose)
        .context("failed to initialize logging")?;

    run(config, &args).await
}

/// `-t`: print the normalized text, then the meter it fits.
///
/// With `-V` the per-variant trace for each meter goes to stderr.
fn classify_once(config: &Config, words: &[String], verbose: bool) -> Result<()> {
    let classifier =
        Classifier::from_config(&config.classifier).context("failed to load classifier")?;

    let text = normalize(&words.join(" "));
    println!("{}", text);
    if verbose {
        for meter in Meter::ALL {
            eprintln!("{}: {}", meter, classifier.explain(&text, meter.pattern()));
        }
    }
    match classifier.classify(&text) {
        Some(Meter::Haiku) => println!("HAIKU!"),
        Some(Meter::Tanka) => println!("TANKA!"),
        None => {}
    }
    Ok(())
}

async fn run(config: Config, args: &Args) -> Result<()> {
    let secret = config.secret_key().context("missing secret key")?;
    let keys = Arc::new(Keys::parse(&secret).context("invalid secret key")?);
    tracing::info!(npub = %keys.npub().unwrap_or_default(), "haikubot starting");

    let classifier = Arc::new(
        Classifier::from_config(&config.classifier).context("failed to load classifier")?,
    );

    let db_path = Config::database_path();
    tracing::info!(path = %db_path.display(), "Opening database");
    let db = Database::open(&db_path).context("failed to open database")?;
    db.migrate().context("failed to run database migrations")?;
    let db = Arc::new(db);

    let transport = Arc::new(WsRelayTransport::new(Duration::from_secs(
        config.publish.timeout_secs,
    )));
    let publisher = Arc::new(ReplyPublisher::new(
        keys,
        transport,
        config.publish.relays.clone(),
    ));

    let heartbeat: Option<Arc<dyn Heartbeat>> = HttpHeartbeat::from_config(&config.heartbeat)
        .context("failed to set up heartbeat")?
        .map(|h| {
            tracing::info!(url = %h.url(), "Heartbeat enabled");
            Arc::new(h) as Arc<dyn Heartbeat>
        });

    let start = db
        .resume_point(Timestamp::now(), config.engine.max_catchup_secs)
        .context("failed to read watermark")?;
    tracing::info!(since = %start, relay = %config.feed.relay, "Resuming feed");

    let pipeline = Pipeline::new(classifier, publisher, db.clone()).verbose(args.verbose);
    let settings = EngineSettings::from_config(&config);
    let connector = RelayConnector::new(config.feed.relay.clone(), CONNECT_TIMEOUT);

    let shutdown = CancellationToken::new();
    spawn_signal_handler(shutdown.clone());

    if args.dump {
        let processor = Arc::new(DumpProcessor::new(pipeline));
        run_engine(connector, processor, settings, start, heartbeat, shutdown).await;
    } else {
        run_engine(connector, Arc::new(pipeline), settings, start, heartbeat, shutdown).await;
    }

    match db.reply_count() {
        Ok(total) => tracing::info!(total_replies = total, "Reply ledger"),
        Err(e) => tracing::warn!(error = %e, "Failed to count ledger replies"),
    }
    Ok(())
}

async fn run_engine<P: MessageProcessor>(
    connector: RelayConnector,
    processor: Arc<P>,
    settings: EngineSettings,
    start: Timestamp,
    heartbeat: Option<Arc<dyn Heartbeat>>,
    shutdown: CancellationToken,
) {
    let mut engine = IngestEngine::new(connector, processor, settings, start);
    if let Some(heartbeat) = heartbeat {
        engine = engine.with_heartbeat(heartbeat);
    }

    let report = engine.run(shutdown).await;
    tracing::info!(
        sessions = report.sessions.len(),
        processed = report.processed,
        replied = report.replied,
        skipped = report.skipped,
        no_match = report.no_match,
        failed = report.failed,
        watermark = %report.watermark,
        "haikubot stopped"
    );
}

fn spawn_signal_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Received Ctrl+C, shutting down");
                shutdown.cancel();
            }
            Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl+C"),
        }
    });
}
