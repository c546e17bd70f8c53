//! Streaming worker: owns the persistent push connection.
//!
//! State machine: resolve-config → (seed candles on coin/interval change) →
//! connect → publish fd → subscribe → receive loop → teardown → backoff →
//! resolve-config. A receive error is a normal loop exit: it is how both
//! forced cancellation (fd shutdown on a settings change) and network
//! failures re-enter config resolution. Only the `running` flag ends the
//! outer loop.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::error::Error;
use crate::state::{Candle, Config, Shared, CANDLE_CAP};
use crate::transport::rest::InfoClient;
use crate::transport::ws::{decode_message, StreamUpdate};
use crate::transport::{FeedEvent, PushConn, PushTransport, Subscription};

/// Backoff after a failed connect.
const CONNECT_RETRY: Duration = Duration::from_secs(1);
/// Keepalive interval on an otherwise idle receive loop.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// One-shot history fetch used to seed candles before streaming begins.
/// Abstracted so tests can drive the worker without a network.
pub trait CandleSource {
    fn fetch_candles(&self, coin: &str, interval: &str) -> Result<Vec<Candle>, Error>;
}

impl CandleSource for InfoClient {
    fn fetch_candles(&self, coin: &str, interval: &str) -> Result<Vec<Candle>, Error> {
        let now_ms = chrono::Utc::now().timestamp_millis().max(0) as u64;
        let span = interval_ms(interval).saturating_mul(CANDLE_CAP as u64);
        self.candle_snapshot(coin, interval, now_ms.saturating_sub(span), now_ms)
    }
}

/// Bucket length of a candle interval, in milliseconds. Unknown intervals
/// fall back to one minute (the seeding window is advisory only).
pub fn interval_ms(interval: &str) -> u64 {
    match interval {
        "1m" => 60_000,
        "3m" => 180_000,
        "5m" => 300_000,
        "15m" => 900_000,
        "30m" => 1_800_000,
        "1h" => 3_600_000,
        "4h" => 14_400_000,
        "12h" => 43_200_000,
        "1d" => 86_400_000,
        _ => 60_000,
    }
}

/// Worker entry point; runs until the shared `running` flag clears.
pub fn run<T, S>(shared: Arc<Shared>, transport: T, candles: S)
where
    T: PushTransport,
    S: CandleSource,
{
    // Sentinels force an initial seed on the first iteration.
    let mut last_coin_seq = u64::MAX;
    let mut last_interval_seq = u64::MAX;

    while shared.running() {
        let cfg = shared.config();

        if cfg.coin_seq != last_coin_seq || cfg.interval_seq != last_interval_seq {
            match candles.fetch_candles(&cfg.coin, &cfg.interval) {
                Ok(batch) => {
                    info!(coin = %cfg.coin, interval = %cfg.interval, n = batch.len(), "seeded candle history");
                    shared.apply_candle_snapshot(batch);
                }
                // Streamed candles still flow without the seed.
                Err(err) => warn!(%err, coin = %cfg.coin, "candle seed fetch failed"),
            }
            last_coin_seq = cfg.coin_seq;
            last_interval_seq = cfg.interval_seq;
        }

        let mut conn = match transport.connect() {
            Ok(conn) => conn,
            Err(err) => {
                warn!(%err, "stream connect failed, retrying");
                super::sleep_while_running(&shared, CONNECT_RETRY);
                continue;
            }
        };

        // Publish the descriptor before anything can block, so a settings
        // change or shutdown can always interrupt the receive below.
        shared.publish_ws_fd(conn.raw_fd());

        let subs = subscriptions(&cfg);
        if let Err(err) = subs.iter().try_for_each(|sub| conn.subscribe(sub)) {
            warn!(%err, "subscribe failed, reconnecting");
            shared.clear_ws_fd();
            conn.close();
            // Same backoff as a failed connect; a connection that accepts
            // but rejects the subscribe would otherwise retry hot.
            super::sleep_while_running(&shared, CONNECT_RETRY);
            continue;
        }

        info!(coin = %cfg.coin, interval = %cfg.interval, "streaming");
        receive_loop(&shared, &mut conn, &cfg);

        shared.clear_ws_fd();
        conn.close();
    }
    debug!("streaming worker stopped");
}

fn subscriptions(cfg: &Config) -> [Subscription; 4] {
    [
        Subscription::L2Book {
            coin: cfg.coin.clone(),
        },
        Subscription::Trades {
            coin: cfg.coin.clone(),
        },
        Subscription::Candle {
            coin: cfg.coin.clone(),
            interval: cfg.interval.clone(),
        },
        Subscription::ActiveAssetCtx {
            coin: cfg.coin.clone(),
        },
    ]
}

/// Receive until error, close, shutdown, or a settings change.
fn receive_loop<C: PushConn>(shared: &Arc<Shared>, conn: &mut C, cfg: &Config) {
    let mut last_ping = Instant::now();
    loop {
        if !shared.running() {
            return;
        }
        match conn.next() {
            Ok(FeedEvent::Message(raw)) => {
                // Decode outside the lock to bound lock hold time.
                if let Some(update) = decode_message(&raw, &cfg.coin, &cfg.interval) {
                    apply(shared, update);
                }
            }
            Ok(FeedEvent::Timeout) => {
                // Idle wakeup: notice settings changes even if the forced
                // shutdown raced with connection setup.
                let now = shared.config();
                if now.coin_seq != cfg.coin_seq || now.interval_seq != cfg.interval_seq {
                    debug!("settings changed, re-resolving");
                    return;
                }
            }
            Ok(FeedEvent::Closed) => {
                debug!("stream closed by peer or cancellation");
                return;
            }
            Err(err) => {
                debug!(%err, "stream receive error, reconnecting");
                return;
            }
        }
        if last_ping.elapsed() >= PING_INTERVAL {
            last_ping = Instant::now();
            if let Err(err) = conn.ping() {
                debug!(%err, "keepalive failed");
                return;
            }
        }
    }
}

fn apply(shared: &Arc<Shared>, update: StreamUpdate) {
    match update {
        StreamUpdate::Book { bids, asks } => shared.apply_book(bids, asks),
        StreamUpdate::Trades(trades) => shared.apply_trades(trades),
        StreamUpdate::Candle(candle) => shared.apply_candle(candle),
        StreamUpdate::Ctx(ctx) => shared.apply_info(ctx),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::shutdown_fd;
    use parking_lot::Mutex;
    use std::io::{BufRead, BufReader, Write};
    use std::net::{TcpListener, TcpStream};
    use std::os::fd::{AsRawFd, RawFd};

    /// Line-delimited push transport over localhost TCP: `subscribe` writes
    /// the request JSON as one line, `next` reads one line.
    struct TcpTransport {
        addr: std::net::SocketAddr,
    }

    struct TcpConn {
        reader: BufReader<TcpStream>,
        writer: TcpStream,
        fd: RawFd,
    }

    impl PushTransport for TcpTransport {
        type Conn = TcpConn;

        fn connect(&self) -> Result<TcpConn, Error> {
            let stream = TcpStream::connect(self.addr)?;
            let fd = stream.as_raw_fd();
            let writer = stream.try_clone()?;
            Ok(TcpConn {
                reader: BufReader::new(stream),
                writer,
                fd,
            })
        }
    }

    impl PushConn for TcpConn {
        fn subscribe(&mut self, sub: &Subscription) -> Result<(), Error> {
            let mut line = sub.request().to_string();
            line.push('\n');
            self.writer.write_all(line.as_bytes())?;
            Ok(())
        }

        fn next(&mut self) -> Result<FeedEvent, Error> {
            let mut line = String::new();
            let n = self.reader.read_line(&mut line)?;
            if n == 0 {
                return Ok(FeedEvent::Closed);
            }
            Ok(FeedEvent::Message(line))
        }

        fn raw_fd(&self) -> RawFd {
            self.fd
        }

        fn close(self) {
            shutdown_fd(self.fd);
        }
    }

    #[derive(Default)]
    struct RecordingCandles {
        calls: Mutex<Vec<(String, String)>>,
    }

    impl CandleSource for &RecordingCandles {
        fn fetch_candles(&self, coin: &str, interval: &str) -> Result<Vec<Candle>, Error> {
            self.calls.lock().push((coin.to_string(), interval.to_string()));
            Ok(Vec::new())
        }
    }

    /// Read the worker's subscribe lines from an accepted connection and
    /// return the coins they name.
    fn read_subscriptions(stream: &TcpStream) -> Vec<String> {
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        let mut coins = Vec::new();
        for _ in 0..4 {
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            let v: serde_json::Value = serde_json::from_str(&line).unwrap();
            coins.push(v["subscription"]["coin"].as_str().unwrap().to_string());
        }
        coins
    }

    #[test]
    fn settings_change_cancellation_resubscribes_with_new_coin() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let shared = Arc::new(Shared::default());
        let candles = Box::leak(Box::new(RecordingCandles::default()));

        let worker = {
            let shared = Arc::clone(&shared);
            let candles: &RecordingCandles = candles;
            std::thread::spawn(move || run(shared, TcpTransport { addr }, candles))
        };

        // First connection: worker subscribed to the default coin and is now
        // blocked receiving.
        let (first, _) = listener.accept().unwrap();
        let coins = read_subscriptions(&first);
        assert!(coins.iter().all(|c| c == "BTC"), "{coins:?}");

        // User switches coin; the orchestrator then force-closes the
        // published descriptor to interrupt the blocked receive.
        shared.set_coin("ETH");
        shutdown_fd(shared.ws_fd());

        // The worker treats the receive error as "re-resolve config" and
        // reconnects subscribed to the new coin.
        let (second, _) = listener.accept().unwrap();
        let coins = read_subscriptions(&second);
        assert!(coins.iter().all(|c| c == "ETH"), "{coins:?}");

        // Shutdown: flag first, then descriptor, then join.
        shared.stop();
        shutdown_fd(shared.ws_fd());
        worker.join().unwrap();

        // Candle history was seeded once per (coin, interval) resolution.
        let calls = candles.calls.lock();
        assert_eq!(calls[0], ("BTC".to_string(), "1m".to_string()));
        assert!(calls.contains(&("ETH".to_string(), "1m".to_string())));
    }

    #[test]
    fn shutdown_while_blocked_exits_without_reconnect() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let shared = Arc::new(Shared::default());
        let candles = Box::leak(Box::new(RecordingCandles::default()));

        let worker = {
            let shared = Arc::clone(&shared);
            let candles: &RecordingCandles = candles;
            std::thread::spawn(move || run(shared, TcpTransport { addr }, candles))
        };

        let (_conn, _) = listener.accept().unwrap();
        // Give the worker a beat to publish the descriptor and block.
        while shared.ws_fd() < 0 {
            std::thread::yield_now();
        }

        shared.stop();
        shutdown_fd(shared.ws_fd());
        worker.join().unwrap();
        assert_eq!(shared.ws_fd(), crate::state::NO_FD);
    }

    #[test]
    fn subscribe_failure_backs_off_instead_of_spinning() {
        use std::sync::atomic::{AtomicU32, Ordering};

        struct RejectingTransport {
            connects: &'static AtomicU32,
        }

        struct RejectingConn;

        impl PushTransport for RejectingTransport {
            type Conn = RejectingConn;

            fn connect(&self) -> Result<RejectingConn, Error> {
                self.connects.fetch_add(1, Ordering::SeqCst);
                Ok(RejectingConn)
            }
        }

        impl PushConn for RejectingConn {
            fn subscribe(&mut self, _sub: &Subscription) -> Result<(), Error> {
                Err(Error::ActionRejected("no subscriptions for you".into()))
            }

            fn next(&mut self) -> Result<FeedEvent, Error> {
                Ok(FeedEvent::Closed)
            }

            fn raw_fd(&self) -> std::os::fd::RawFd {
                -1
            }

            fn close(self) {}
        }

        let connects: &'static AtomicU32 = Box::leak(Box::new(AtomicU32::new(0)));
        let shared = Arc::new(Shared::default());
        let candles = Box::leak(Box::new(RecordingCandles::default()));

        let worker = {
            let shared = Arc::clone(&shared);
            let candles: &RecordingCandles = candles;
            std::thread::spawn(move || run(shared, RejectingTransport { connects }, candles))
        };

        while connects.load(Ordering::SeqCst) == 0 {
            std::thread::yield_now();
        }
        // The first subscribe already failed or is about to; a hot loop
        // would rack up hundreds of reconnects in this window.
        std::thread::sleep(Duration::from_millis(200));
        assert!(connects.load(Ordering::SeqCst) <= 2);

        shared.stop();
        worker.join().unwrap();
    }

    #[test]
    fn interval_ms_known_buckets() {
        assert_eq!(interval_ms("1m"), 60_000);
        assert_eq!(interval_ms("1h"), 3_600_000);
        assert_eq!(interval_ms("bogus"), 60_000);
    }
}
