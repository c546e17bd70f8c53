//! Shared state block: the single source of truth for everything the
//! workers produce and the UI renders.
//!
//! All bulk state lives behind one mutex; every mutation bumps a monotonic
//! generation counter under the same lock acquisition, so a snapshot is
//! always "before" or "after" a write, never half of one. Two fields are
//! deliberately outside the lock: the `running` flag and the descriptor of
//! the live streaming connection, both atomics because they are touched from
//! cancellation paths that must not contend with a worker blocked in a
//! network call while holding the lock.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

use parking_lot::Mutex;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Most recent candles retained per coin/interval.
pub const CANDLE_CAP: usize = 128;
/// Trade tape rows, newest first.
pub const TRADE_CAP: usize = 32;
/// Rows retained in each account table (fills, funding, order history).
pub const TABLE_CAP: usize = 64;

/// Sentinel stored in the ws-fd atomic when no connection is live.
pub const NO_FD: i32 = -1;

// ============================================================================
// Market data
// ============================================================================

/// One OHLCV bucket. Timestamps are exchange epoch-millis bucket opens.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Candle {
    pub time: u64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

/// One price level with the running cumulative size from the top of book.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookLevel {
    pub px: Decimal,
    pub sz: Decimal,
    pub cum: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "Buy",
            Side::Sell => "Sell",
        }
    }
}

/// One tape row.
#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub time: u64,
    pub side: Side,
    pub px: Decimal,
    pub sz: Decimal,
}

/// Streamed instrument context for the active coin.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstrumentCtx {
    pub mark_px: Decimal,
    pub oracle_px: Decimal,
    pub mid_px: Decimal,
    pub prev_day_px: Decimal,
    pub day_ntl_volume: Decimal,
    pub open_interest: Decimal,
    pub funding_rate: Decimal,
}

impl InstrumentCtx {
    /// 24h change in percent, derived from mark vs previous-day price.
    pub fn day_change_pct(&self) -> f64 {
        if self.prev_day_px.is_zero() {
            return 0.0;
        }
        let change = (self.mark_px - self.prev_day_px) / self.prev_day_px;
        change.to_f64().unwrap_or(0.0) * 100.0
    }
}

#[derive(Debug, Clone)]
pub struct MarketData {
    /// Oldest..newest ring; see [`Shared::apply_candle`] for the
    /// upsert-or-append-or-evict policy.
    pub candles: VecDeque<Candle>,
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
    /// Newest-first tape, FIFO-evicted at [`TRADE_CAP`].
    pub trades: VecDeque<Trade>,
    pub ctx: InstrumentCtx,
}

// ============================================================================
// Account data
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Position {
    pub coin: String,
    /// Signed size: positive long, negative short.
    pub szi: Decimal,
    pub entry_px: Decimal,
    pub position_value: Decimal,
    pub unrealized_pnl: Decimal,
    pub liquidation_px: Option<Decimal>,
    pub margin_used: Decimal,
    pub leverage: u32,
    /// Cross margin when true, isolated otherwise.
    pub cross: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OpenOrder {
    pub oid: u64,
    pub coin: String,
    pub is_buy: bool,
    pub limit_px: Decimal,
    pub sz: Decimal,
    pub orig_sz: Decimal,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fill {
    pub coin: String,
    pub is_buy: bool,
    pub px: Decimal,
    pub sz: Decimal,
    pub time: u64,
    pub closed_pnl: Decimal,
    pub fee: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FundingEntry {
    pub coin: String,
    pub time: u64,
    pub usdc: Decimal,
    pub rate: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoricalOrder {
    pub oid: u64,
    pub coin: String,
    pub is_buy: bool,
    pub limit_px: Decimal,
    pub sz: Decimal,
    pub status: String,
    pub status_time: u64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Balances {
    pub account_value: Decimal,
    pub total_margin_used: Decimal,
    pub withdrawable: Decimal,
}

#[derive(Debug, Clone, Default)]
pub struct AccountData {
    pub positions: Vec<Position>,
    pub open_orders: Vec<OpenOrder>,
    pub fills: Vec<Fill>,
    pub funding: Vec<FundingEntry>,
    pub order_history: Vec<HistoricalOrder>,
    pub balances: Balances,
    /// Resolved index of the active instrument in the exchange universe.
    pub asset_index: Option<u32>,
    /// Leverage ceiling for the active instrument.
    pub max_leverage: u32,
}

/// Everything one polling cycle fetches, published as a single write so the
/// UI never observes fills without their matching positions.
#[derive(Debug, Clone, Default)]
pub struct AccountUpdate {
    pub positions: Vec<Position>,
    pub open_orders: Vec<OpenOrder>,
    pub fills: Vec<Fill>,
    pub funding: Vec<FundingEntry>,
    pub order_history: Vec<HistoricalOrder>,
    pub balances: Balances,
}

// ============================================================================
// Config
// ============================================================================

/// UI-controlled parameters. Each field pairs with a change counter so
/// workers detect edits with one integer compare instead of an equality
/// scan.
#[derive(Debug, Clone)]
pub struct Config {
    pub coin: String,
    pub coin_seq: u64,
    pub interval: String,
    pub interval_seq: u64,
    pub depth: usize,
    pub depth_seq: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            coin: "BTC".to_string(),
            coin_seq: 0,
            interval: "1m".to_string(),
            interval_seq: 0,
            depth: 10,
            depth_seq: 0,
        }
    }
}

// ============================================================================
// State block + snapshot
// ============================================================================

/// The lock-guarded state. [`Snapshot`] is a full value copy of this.
#[derive(Debug, Clone, Default)]
pub struct State {
    pub market: MarketData,
    pub account: AccountData,
    pub config: Config,
    /// Bumped by every mutation, under the same lock acquisition.
    pub generation: u64,
}

impl Default for MarketData {
    fn default() -> Self {
        Self {
            candles: VecDeque::with_capacity(CANDLE_CAP),
            bids: Vec::new(),
            asks: Vec::new(),
            trades: VecDeque::with_capacity(TRADE_CAP),
            ctx: InstrumentCtx::default(),
        }
    }
}

/// An owned, immutable copy of [`State`] taken in one lock acquisition.
/// Rendering reads this without any locking.
pub type Snapshot = State;

/// The shared block handed to the UI loop and both workers at startup.
#[derive(Debug)]
pub struct Shared {
    state: Mutex<State>,
    running: AtomicBool,
    ws_fd: AtomicI32,
}

impl Default for Shared {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl Shared {
    pub fn new(config: Config) -> Self {
        Self {
            state: Mutex::new(State {
                config,
                ..State::default()
            }),
            running: AtomicBool::new(true),
            ws_fd: AtomicI32::new(NO_FD),
        }
    }

    // --- coordination -------------------------------------------------------

    pub fn running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    /// Publish the live streaming connection's descriptor so cancellation
    /// paths can close it without taking the state lock.
    pub fn publish_ws_fd(&self, fd: i32) {
        self.ws_fd.store(fd, Ordering::Release);
    }

    pub fn clear_ws_fd(&self) {
        self.ws_fd.store(NO_FD, Ordering::Release);
    }

    pub fn ws_fd(&self) -> i32 {
        self.ws_fd.load(Ordering::Acquire)
    }

    // --- snapshot -----------------------------------------------------------

    /// Copy every field under one lock acquisition. The result aliases
    /// nothing inside the shared block.
    pub fn snapshot(&self) -> Snapshot {
        self.state.lock().clone()
    }

    /// Copy just the config partition (workers resolve their parameters
    /// from this at the top of each iteration).
    pub fn config(&self) -> Config {
        self.state.lock().config.clone()
    }

    // --- market mutations ---------------------------------------------------

    /// Replace both ladders. Cumulative sizes are recomputed here so every
    /// snapshot carries consistent running totals.
    pub fn apply_book(&self, mut bids: Vec<BookLevel>, mut asks: Vec<BookLevel>) {
        cumulate(&mut bids);
        cumulate(&mut asks);
        let mut st = self.state.lock();
        st.market.bids = bids;
        st.market.asks = asks;
        st.generation += 1;
    }

    pub fn apply_info(&self, ctx: InstrumentCtx) {
        let mut st = self.state.lock();
        st.market.ctx = ctx;
        st.generation += 1;
    }

    /// Upsert-or-append-or-evict:
    /// - same timestamp as the newest stored candle: replace in place
    ///   (same bucket, refreshed OHLCV);
    /// - new timestamp with room: append;
    /// - new timestamp at capacity: evict the oldest first.
    pub fn apply_candle(&self, candle: Candle) {
        let mut st = self.state.lock();
        let candles = &mut st.market.candles;
        match candles.back_mut() {
            Some(newest) if newest.time == candle.time => *newest = candle,
            _ => {
                if candles.len() == CANDLE_CAP {
                    candles.pop_front();
                }
                candles.push_back(candle);
            }
        }
        st.generation += 1;
    }

    /// Full overwrite from a one-shot history fetch; keeps the newest
    /// [`CANDLE_CAP`] buckets.
    pub fn apply_candle_snapshot(&self, mut candles: Vec<Candle>) {
        candles.sort_by_key(|c| c.time);
        let skip = candles.len().saturating_sub(CANDLE_CAP);
        let mut st = self.state.lock();
        st.market.candles.clear();
        st.market.candles.extend(candles.into_iter().skip(skip));
        st.generation += 1;
    }

    /// Insert a batch (oldest..newest) at the front of the tape, evicting
    /// from the back past capacity.
    pub fn apply_trades(&self, batch: Vec<Trade>) {
        let mut st = self.state.lock();
        for trade in batch {
            st.market.trades.push_front(trade);
        }
        st.market.trades.truncate(TRADE_CAP);
        st.generation += 1;
    }

    // --- account mutations --------------------------------------------------

    /// One combined write for the whole polling cycle: single lock, single
    /// generation bump.
    pub fn apply_account(&self, mut update: AccountUpdate) {
        update.fills.truncate(TABLE_CAP);
        update.funding.truncate(TABLE_CAP);
        update.order_history.truncate(TABLE_CAP);
        let mut st = self.state.lock();
        st.account.positions = update.positions;
        st.account.open_orders = update.open_orders;
        st.account.fills = update.fills;
        st.account.funding = update.funding;
        st.account.order_history = update.order_history;
        st.account.balances = update.balances;
        st.generation += 1;
    }

    pub fn apply_asset_resolution(&self, asset_index: Option<u32>, max_leverage: u32) {
        let mut st = self.state.lock();
        st.account.asset_index = asset_index;
        st.account.max_leverage = max_leverage;
        st.generation += 1;
    }

    // --- config mutations ---------------------------------------------------

    /// Switch the active coin. Market data from the previous coin is
    /// discarded so the UI never renders another instrument's book.
    pub fn set_coin(&self, coin: &str) {
        let mut st = self.state.lock();
        if st.config.coin == coin {
            return;
        }
        st.config.coin = coin.to_string();
        st.config.coin_seq += 1;
        st.market = MarketData::default();
        st.generation += 1;
    }

    pub fn set_interval(&self, interval: &str) {
        let mut st = self.state.lock();
        if st.config.interval == interval {
            return;
        }
        st.config.interval = interval.to_string();
        st.config.interval_seq += 1;
        st.market.candles.clear();
        st.generation += 1;
    }

    pub fn set_depth(&self, depth: usize) {
        let mut st = self.state.lock();
        if st.config.depth == depth {
            return;
        }
        st.config.depth = depth;
        st.config.depth_seq += 1;
        st.generation += 1;
    }
}

/// Recompute running cumulative size from the top of the ladder.
fn cumulate(levels: &mut [BookLevel]) {
    let mut cum = Decimal::ZERO;
    for level in levels.iter_mut() {
        cum += level.sz;
        level.cum = cum;
    }
}
