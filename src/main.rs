use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::info;

use hyperterm::app::App;
use hyperterm::error::Error;
use hyperterm::frame::FrameLoop;
use hyperterm::state::{Config, Shared};
use hyperterm::term::Term;
use hyperterm::transport::rest::InfoClient;
use hyperterm::transport::shutdown_fd;
use hyperterm::transport::ws::WsTransport;
use hyperterm::worker;

const MAINNET_HTTP: &str = "https://api.hyperliquid.xyz";
const MAINNET_WS: &str = "wss://api.hyperliquid.xyz/ws";
const TESTNET_HTTP: &str = "https://api.hyperliquid-testnet.xyz";
const TESTNET_WS: &str = "wss://api.hyperliquid-testnet.xyz/ws";

#[derive(Parser, Debug)]
#[command(name = "hyperterm", version, about = "Live terminal dashboard for Hyperliquid perpetuals")]
struct Cli {
    /// Coin to stream on startup
    #[arg(long, default_value = "BTC")]
    coin: String,

    /// Candle interval (1m, 5m, 15m, 1h, 4h, 1d)
    #[arg(long, default_value = "1m")]
    interval: String,

    /// Account address (0x…) to poll positions, orders and fills for
    #[arg(long)]
    user: Option<String>,

    /// Use the testnet endpoints
    #[arg(long)]
    testnet: bool,

    /// UI tick in milliseconds
    #[arg(long, default_value_t = 50)]
    tick_ms: u64,

    /// Append logs to this file (stderr would corrupt the display)
    #[arg(long)]
    log_file: Option<std::path::PathBuf>,
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("hyperterm: {err}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Error> {
    let log_file = cli
        .log_file
        .clone()
        .or_else(|| std::env::var("HYPERTERM_LOG").ok().map(Into::into));
    if let Some(path) = &log_file {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "hyperterm=info".into()),
            )
            .with_writer(Arc::new(file))
            .with_ansi(false)
            .init();
    }

    let (http_base, ws_url) = if cli.testnet {
        (TESTNET_HTTP, TESTNET_WS)
    } else {
        (MAINNET_HTTP, MAINNET_WS)
    };
    let http_base = std::env::var("HYPERTERM_HTTP_URL").unwrap_or_else(|_| http_base.to_string());
    let ws_url = std::env::var("HYPERTERM_WS_URL").unwrap_or_else(|_| ws_url.to_string());

    let shared = Arc::new(Shared::new(Config {
        coin: cli.coin.to_uppercase(),
        interval: cli.interval.clone(),
        ..Config::default()
    }));

    // Everything fallible happens before the workers exist.
    let transport = WsTransport::new(ws_url);
    let seed_client = InfoClient::new(http_base.clone())?;
    let poll_client = InfoClient::new(http_base)?;
    let term = Term::init()?;
    let mut frame = FrameLoop::new(term, Duration::from_millis(cli.tick_ms));

    info!(coin = %cli.coin, interval = %cli.interval, testnet = cli.testnet, "starting");

    let stream_worker = {
        let shared = Arc::clone(&shared);
        std::thread::spawn(move || worker::stream::run(shared, transport, seed_client))
    };
    let poll_worker = {
        let shared = Arc::clone(&shared);
        let user = cli.user.clone();
        std::thread::spawn(move || worker::poll::run(shared, poll_client, user))
    };

    // Order placement needs a signing collaborator; none ships here, so the
    // dashboard runs read-only.
    let mut app = App::new(Arc::clone(&shared), None);
    let result = app.run(&mut frame);

    // Shutdown: flag first, then force the blocked receive off its socket,
    // then join. The fd atomic is the live descriptor or NO_FD; either way
    // the shutdown call is safe.
    shared.stop();
    shutdown_fd(shared.ws_fd());
    if stream_worker.join().is_err() {
        tracing::error!("streaming worker panicked");
    }
    if poll_worker.join().is_err() {
        tracing::error!("polling worker panicked");
    }
    frame.shutdown();

    result
}
