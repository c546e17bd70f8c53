//! Push transport over a blocking websocket, plus the streamed message
//! schemas.
//!
//! The connection keeps a read timeout on the underlying socket so
//! [`PushConn::next`] periodically yields [`FeedEvent::Timeout`] instead of
//! blocking forever; forced cancellation (fd shutdown from another thread)
//! surfaces as a receive error, which callers treat as a normal loop exit.

use std::net::TcpStream;
use std::os::fd::{AsRawFd, RawFd};
use std::time::Duration;

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::debug;
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Message, WebSocket};

use super::{FeedEvent, PushConn, PushTransport, Subscription};
use crate::error::Error;
use crate::state::{BookLevel, Candle, InstrumentCtx, Side, Trade};

/// How long one blocking receive may wait before yielding a timeout.
const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Production push transport: one persistent websocket per worker loop.
#[derive(Debug, Clone)]
pub struct WsTransport {
    url: String,
}

impl WsTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl PushTransport for WsTransport {
    type Conn = WsConn;

    fn connect(&self) -> Result<WsConn, Error> {
        let (socket, _response) = tungstenite::connect(&self.url)?;
        let fd = stream_fd(&socket);
        if let Some(tcp) = tcp_stream(&socket) {
            tcp.set_read_timeout(Some(READ_TIMEOUT))?;
        }
        Ok(WsConn { socket, fd })
    }
}

pub struct WsConn {
    socket: WebSocket<MaybeTlsStream<TcpStream>>,
    fd: RawFd,
}

impl PushConn for WsConn {
    fn subscribe(&mut self, sub: &Subscription) -> Result<(), Error> {
        let request = sub.request();
        self.socket.send(Message::text(request.to_string()))?;
        Ok(())
    }

    fn next(&mut self) -> Result<FeedEvent, Error> {
        match self.socket.read() {
            Ok(Message::Text(text)) => Ok(FeedEvent::Message(text.to_string())),
            Ok(Message::Close(_)) => Ok(FeedEvent::Closed),
            Ok(_) => {
                // Ping/pong/binary frames carry no market data. Reading has
                // already queued any protocol reply; flush it opportunistically.
                let _ = self.socket.flush();
                Ok(FeedEvent::Timeout)
            }
            Err(tungstenite::Error::Io(err))
                if matches!(
                    err.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                ) =>
            {
                Ok(FeedEvent::Timeout)
            }
            Err(err) => Err(err.into()),
        }
    }

    fn raw_fd(&self) -> RawFd {
        self.fd
    }

    fn ping(&mut self) -> Result<(), Error> {
        self.socket
            .send(Message::text(r#"{"method":"ping"}"#.to_string()))?;
        Ok(())
    }

    fn close(mut self) {
        let _ = self.socket.close(None);
        let _ = self.socket.flush();
    }
}

fn tcp_stream(socket: &WebSocket<MaybeTlsStream<TcpStream>>) -> Option<&TcpStream> {
    match socket.get_ref() {
        MaybeTlsStream::Plain(tcp) => Some(tcp),
        MaybeTlsStream::Rustls(tls) => Some(tls.get_ref()),
        _ => None,
    }
}

fn stream_fd(socket: &WebSocket<MaybeTlsStream<TcpStream>>) -> RawFd {
    tcp_stream(socket).map(|tcp| tcp.as_raw_fd()).unwrap_or(-1)
}

// ============================================================================
// Streamed message schemas
// ============================================================================

#[derive(Debug, Deserialize)]
struct Envelope {
    channel: String,
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct WsLevel {
    px: Decimal,
    sz: Decimal,
}

#[derive(Debug, Deserialize)]
struct WsBook {
    coin: String,
    /// `levels[0]` bids, `levels[1]` asks, both best-first.
    levels: [Vec<WsLevel>; 2],
}

#[derive(Debug, Deserialize)]
struct WsTrade {
    coin: String,
    /// `"B"` buyer-initiated, `"A"` seller-initiated.
    side: String,
    px: Decimal,
    sz: Decimal,
    time: u64,
}

#[derive(Debug, Deserialize)]
struct WsCandle {
    #[serde(rename = "t")]
    open_time: u64,
    #[serde(rename = "s")]
    coin: String,
    #[serde(rename = "i")]
    interval: String,
    #[serde(rename = "o")]
    open: Decimal,
    #[serde(rename = "h")]
    high: Decimal,
    #[serde(rename = "l")]
    low: Decimal,
    #[serde(rename = "c")]
    close: Decimal,
    #[serde(rename = "v")]
    volume: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WsAssetCtx {
    funding: Decimal,
    open_interest: Decimal,
    prev_day_px: Decimal,
    day_ntl_vlm: Decimal,
    oracle_px: Decimal,
    mark_px: Decimal,
    #[serde(default)]
    mid_px: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
struct WsActiveAssetCtx {
    coin: String,
    ctx: WsAssetCtx,
}

/// A decoded market-data message, already filtered to the active
/// coin/interval.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamUpdate {
    Book {
        bids: Vec<BookLevel>,
        asks: Vec<BookLevel>,
    },
    Trades(Vec<Trade>),
    Candle(Candle),
    Ctx(InstrumentCtx),
}

/// Decode one raw text payload. Returns `None` for unrecognized channels,
/// messages for other instruments, and malformed payloads — all dropped
/// silently per the error-handling policy.
pub fn decode_message(raw: &str, coin: &str, interval: &str) -> Option<StreamUpdate> {
    let envelope: Envelope = match serde_json::from_str(raw) {
        Ok(env) => env,
        Err(err) => {
            debug!(%err, "undecodable stream message");
            return None;
        }
    };
    match envelope.channel.as_str() {
        "l2Book" => {
            let book: WsBook = serde_json::from_value(envelope.data).ok()?;
            if book.coin != coin {
                return None;
            }
            let [bids, asks] = book.levels;
            Some(StreamUpdate::Book {
                bids: bids.into_iter().map(level).collect(),
                asks: asks.into_iter().map(level).collect(),
            })
        }
        "trades" => {
            let trades: Vec<WsTrade> = serde_json::from_value(envelope.data).ok()?;
            let trades: Vec<Trade> = trades
                .into_iter()
                .filter(|t| t.coin == coin)
                .map(|t| Trade {
                    time: t.time,
                    side: if t.side == "B" { Side::Buy } else { Side::Sell },
                    px: t.px,
                    sz: t.sz,
                })
                .collect();
            if trades.is_empty() {
                return None;
            }
            Some(StreamUpdate::Trades(trades))
        }
        "candle" => {
            let c: WsCandle = serde_json::from_value(envelope.data).ok()?;
            if c.coin != coin || c.interval != interval {
                return None;
            }
            Some(StreamUpdate::Candle(Candle {
                time: c.open_time,
                open: c.open,
                high: c.high,
                low: c.low,
                close: c.close,
                volume: c.volume,
            }))
        }
        "activeAssetCtx" => {
            let ctx: WsActiveAssetCtx = serde_json::from_value(envelope.data).ok()?;
            if ctx.coin != coin {
                return None;
            }
            Some(StreamUpdate::Ctx(InstrumentCtx {
                mark_px: ctx.ctx.mark_px,
                oracle_px: ctx.ctx.oracle_px,
                mid_px: ctx.ctx.mid_px.unwrap_or_default(),
                prev_day_px: ctx.ctx.prev_day_px,
                day_ntl_volume: ctx.ctx.day_ntl_vlm,
                open_interest: ctx.ctx.open_interest,
                funding_rate: ctx.ctx.funding,
            }))
        }
        // subscriptionResponse, pong, notifications: nothing to apply.
        _ => None,
    }
}

fn level(l: WsLevel) -> BookLevel {
    BookLevel {
        px: l.px,
        sz: l.sz,
        cum: Decimal::ZERO,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_l2_book_for_active_coin() {
        let raw = r#"{"channel":"l2Book","data":{"coin":"BTC","time":1700000000000,
            "levels":[[{"px":"64000.0","sz":"1.5","n":3},{"px":"63999.0","sz":"2.0","n":1}],
                      [{"px":"64001.0","sz":"0.7","n":2}]]}}"#;
        match decode_message(raw, "BTC", "1m") {
            Some(StreamUpdate::Book { bids, asks }) => {
                assert_eq!(bids.len(), 2);
                assert_eq!(asks.len(), 1);
                assert_eq!(bids[0].px, Decimal::new(640000, 1));
            }
            other => panic!("unexpected decode: {other:?}"),
        }
    }

    #[test]
    fn book_for_other_coin_is_dropped() {
        let raw = r#"{"channel":"l2Book","data":{"coin":"ETH","time":1,"levels":[[],[]]}}"#;
        assert_eq!(decode_message(raw, "BTC", "1m"), None);
    }

    #[test]
    fn decodes_trades_batch() {
        let raw = r#"{"channel":"trades","data":[
            {"coin":"BTC","side":"B","px":"64000.5","sz":"0.01","time":1700000000001,"hash":"0x0","tid":1},
            {"coin":"BTC","side":"A","px":"64000.0","sz":"0.02","time":1700000000002,"hash":"0x1","tid":2}]}"#;
        match decode_message(raw, "BTC", "1m") {
            Some(StreamUpdate::Trades(trades)) => {
                assert_eq!(trades.len(), 2);
                assert_eq!(trades[0].side, Side::Buy);
                assert_eq!(trades[1].side, Side::Sell);
            }
            other => panic!("unexpected decode: {other:?}"),
        }
    }

    #[test]
    fn decodes_candle_matching_interval_only() {
        let raw = r#"{"channel":"candle","data":{"t":1700000000000,"T":1700000059999,
            "s":"BTC","i":"1m","o":"64000","c":"64010","h":"64020","l":"63990","v":"12.5","n":42}}"#;
        match decode_message(raw, "BTC", "1m") {
            Some(StreamUpdate::Candle(c)) => {
                assert_eq!(c.time, 1700000000000);
                assert_eq!(c.close, Decimal::from(64010));
            }
            other => panic!("unexpected decode: {other:?}"),
        }
        assert_eq!(decode_message(raw, "BTC", "5m"), None);
    }

    #[test]
    fn decodes_asset_ctx() {
        let raw = r#"{"channel":"activeAssetCtx","data":{"coin":"BTC","ctx":{
            "funding":"0.0000125","openInterest":"9000.5","prevDayPx":"63000",
            "dayNtlVlm":"1500000000","premium":"0.0001","oraclePx":"64005",
            "markPx":"64003","midPx":"64002.5","impactPxs":["64001","64004"]}}}"#;
        match decode_message(raw, "BTC", "1m") {
            Some(StreamUpdate::Ctx(ctx)) => {
                assert_eq!(ctx.mark_px, Decimal::from(64003));
                assert_eq!(ctx.funding_rate, Decimal::new(125, 7));
            }
            other => panic!("unexpected decode: {other:?}"),
        }
    }

    #[test]
    fn malformed_and_unknown_messages_are_dropped() {
        assert_eq!(decode_message("not json", "BTC", "1m"), None);
        assert_eq!(
            decode_message(r#"{"channel":"subscriptionResponse","data":{}}"#, "BTC", "1m"),
            None
        );
        assert_eq!(
            decode_message(r#"{"channel":"l2Book","data":{"bogus":true}}"#, "BTC", "1m"),
            None
        );
    }
}
