//! Render/input orchestration and the dashboard views.
//!
//! The UI thread owns the frame loop: it drains key events, folds them into
//! local UI state, mirrors config edits into the shared block (force-closing
//! the live stream so the worker re-resolves promptly), then takes a
//! snapshot and redraws — but only when the generation advanced or input
//! occurred, so a static screen costs nothing per tick.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::warn;

use crate::actions::ExchangeClient;
use crate::error::Error;
use crate::frame::FrameLoop;
use crate::render::{Buffer, Color, Rect, Style};
use crate::state::{Shared, Side, Snapshot};
use crate::term::Key;
use crate::transport::shutdown_fd;

/// Below this size the dashboard degrades to a placeholder.
pub const MIN_WIDTH: u16 = 60;
pub const MIN_HEIGHT: u16 = 16;

const STATUS_TTL: Duration = Duration::from_secs(3);
const INTERVALS: [&str; 6] = ["1m", "5m", "15m", "1h", "4h", "1d"];
const DEPTH_MIN: usize = 5;
const DEPTH_MAX: usize = 20;

const C_BID: Color = Color::Green;
const C_ASK: Color = Color::Red;
const C_DIM: Color = Color::DarkGrey;
const C_ACCENT: Color = Color::Cyan;
const C_WARN: Color = Color::Yellow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Book,
    Chart,
    Positions,
    Orders,
    Fills,
    Funding,
    History,
}

impl View {
    const ALL: [View; 7] = [
        View::Book,
        View::Chart,
        View::Positions,
        View::Orders,
        View::Fills,
        View::Funding,
        View::History,
    ];

    fn label(&self) -> &'static str {
        match self {
            View::Book => "Book",
            View::Chart => "Chart",
            View::Positions => "Positions",
            View::Orders => "Orders",
            View::Fills => "Fills",
            View::Funding => "Funding",
            View::History => "History",
        }
    }

    fn next(&self) -> View {
        let idx = View::ALL.iter().position(|v| v == self).unwrap_or(0);
        View::ALL[(idx + 1) % View::ALL.len()]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FormField {
    Price,
    Size,
}

#[derive(Debug, Clone)]
struct OrderForm {
    is_buy: bool,
    px: String,
    sz: String,
    field: FormField,
}

#[derive(Debug, Clone)]
enum Mode {
    Normal,
    CoinEntry(String),
    OrderEntry(OrderForm),
}

/// UI state plus the handles it needs: the shared block for config
/// mirroring and snapshots, and the optional authenticated action client.
pub struct App {
    shared: Arc<Shared>,
    actions: Option<ExchangeClient>,
    view: View,
    mode: Mode,
    selection: usize,
    last_gen: Option<u64>,
    status: Option<(String, Instant)>,
    quit: bool,
}

impl App {
    pub fn new(shared: Arc<Shared>, actions: Option<ExchangeClient>) -> Self {
        Self {
            shared,
            actions,
            view: View::Book,
            mode: Mode::Normal,
            selection: 0,
            last_gen: None,
            status: None,
            quit: false,
        }
    }

    /// The orchestrator loop. Returns when the user quits or `running`
    /// clears; terminal teardown is the caller's responsibility.
    pub fn run(&mut self, frame: &mut FrameLoop) -> Result<(), Error> {
        while self.shared.running() && !self.quit {
            let mut input = false;
            while let Some(key) = frame.poll_key() {
                input = true;
                self.handle_key(key);
                if self.quit {
                    break;
                }
            }
            if frame.poll_resize()? {
                input = true;
            }
            if self.expire_status() {
                input = true;
            }

            let snap = self.shared.snapshot();
            self.clamp_selection(&snap);

            if input || self.last_gen != Some(snap.generation) {
                let buf = frame.begin_frame()?;
                self.draw(buf, &snap);
                frame.end_frame()?;
                self.last_gen = Some(snap.generation);
            }
            frame.tick();
        }
        Ok(())
    }

    /// Drop an expired status message; returns true when a redraw is owed.
    fn expire_status(&mut self) -> bool {
        if let Some((_, since)) = &self.status {
            if since.elapsed() >= STATUS_TTL {
                self.status = None;
                return true;
            }
        }
        false
    }

    fn set_status(&mut self, msg: impl Into<String>) {
        self.status = Some((msg.into(), Instant::now()));
    }

    /// Interrupt the streaming worker's blocked receive so it picks up new
    /// settings promptly instead of waiting out its own poll.
    fn force_stream_refresh(&self) {
        shutdown_fd(self.shared.ws_fd());
    }

    // --- input --------------------------------------------------------------

    pub(crate) fn handle_key(&mut self, key: Key) {
        match std::mem::replace(&mut self.mode, Mode::Normal) {
            Mode::Normal => self.handle_normal(key),
            Mode::CoinEntry(buf) => self.handle_coin_entry(buf, key),
            Mode::OrderEntry(form) => self.handle_order_entry(form, key),
        }
    }

    fn handle_normal(&mut self, key: Key) {
        match key {
            Key::Char('q') | Key::Esc => self.quit = true,
            Key::Tab => {
                self.view = self.view.next();
                self.selection = 0;
            }
            Key::Up => self.selection = self.selection.saturating_sub(1),
            Key::Down => self.selection = self.selection.saturating_add(1),
            Key::Char('c') => self.mode = Mode::CoinEntry(String::new()),
            Key::Char('i') => {
                let cfg = self.shared.config();
                let idx = INTERVALS
                    .iter()
                    .position(|i| *i == cfg.interval)
                    .unwrap_or(0);
                let next = INTERVALS[(idx + 1) % INTERVALS.len()];
                self.shared.set_interval(next);
                self.force_stream_refresh();
            }
            Key::Char('+') | Key::Char('=') => self.adjust_depth(1),
            Key::Char('-') => self.adjust_depth(-1),
            Key::Char('o') => {
                if self.actions.is_none() {
                    self.set_status("no signer configured");
                } else {
                    let mark = self.shared.snapshot().market.ctx.mark_px;
                    self.mode = Mode::OrderEntry(OrderForm {
                        is_buy: true,
                        px: if mark.is_zero() {
                            String::new()
                        } else {
                            mark.normalize().to_string()
                        },
                        sz: String::new(),
                        field: FormField::Size,
                    });
                }
            }
            Key::Char('x') => self.cancel_selected(),
            Key::Char('[') => self.adjust_leverage(-1),
            Key::Char(']') => self.adjust_leverage(1),
            _ => {}
        }
    }

    fn handle_coin_entry(&mut self, mut buf: String, key: Key) {
        match key {
            Key::Enter => {
                let coin = buf.trim().to_uppercase();
                if !coin.is_empty() {
                    self.shared.set_coin(&coin);
                    self.force_stream_refresh();
                }
            }
            Key::Esc => {}
            Key::Backspace => {
                buf.pop();
                self.mode = Mode::CoinEntry(buf);
            }
            Key::Char(c) if c.is_ascii_alphanumeric() || c == '/' || c == '-' => {
                buf.push(c.to_ascii_uppercase());
                self.mode = Mode::CoinEntry(buf);
            }
            _ => self.mode = Mode::CoinEntry(buf),
        }
    }

    fn handle_order_entry(&mut self, mut form: OrderForm, key: Key) {
        match key {
            Key::Esc => {}
            Key::Enter => self.submit_order(form),
            Key::Tab | Key::Up | Key::Down => {
                form.field = match form.field {
                    FormField::Price => FormField::Size,
                    FormField::Size => FormField::Price,
                };
                self.mode = Mode::OrderEntry(form);
            }
            Key::Char('b') => {
                form.is_buy = true;
                self.mode = Mode::OrderEntry(form);
            }
            Key::Char('s') => {
                form.is_buy = false;
                self.mode = Mode::OrderEntry(form);
            }
            Key::Backspace => {
                match form.field {
                    FormField::Price => form.px.pop(),
                    FormField::Size => form.sz.pop(),
                };
                self.mode = Mode::OrderEntry(form);
            }
            Key::Char(c) if c.is_ascii_digit() || c == '.' => {
                match form.field {
                    FormField::Price => form.px.push(c),
                    FormField::Size => form.sz.push(c),
                }
                self.mode = Mode::OrderEntry(form);
            }
            _ => self.mode = Mode::OrderEntry(form),
        }
    }

    fn submit_order(&mut self, form: OrderForm) {
        let snap = self.shared.snapshot();
        let Some(asset) = snap.account.asset_index else {
            self.set_status("asset not resolved yet");
            return;
        };
        let (Ok(px), Ok(sz)) = (form.px.parse::<Decimal>(), form.sz.parse::<Decimal>()) else {
            self.set_status("invalid price/size");
            self.mode = Mode::OrderEntry(form);
            return;
        };
        let Some(client) = &self.actions else {
            self.set_status("no signer configured");
            return;
        };
        match client.place_order(asset, form.is_buy, px, sz, false) {
            Ok(()) => self.set_status(format!(
                "{} {} @ {} submitted",
                if form.is_buy { "buy" } else { "sell" },
                sz.normalize(),
                px.normalize()
            )),
            Err(err) => {
                warn!(%err, "order placement failed");
                self.set_status(format!("order failed: {err}"));
            }
        }
    }

    fn cancel_selected(&mut self) {
        if self.view != View::Orders {
            return;
        }
        let snap = self.shared.snapshot();
        let Some(order) = snap.account.open_orders.get(self.selection) else {
            return;
        };
        let Some(asset) = snap.account.asset_index else {
            self.set_status("asset not resolved yet");
            return;
        };
        let Some(client) = &self.actions else {
            self.set_status("no signer configured");
            return;
        };
        match client.cancel_order(asset, order.oid) {
            Ok(()) => self.set_status(format!("cancel {} submitted", order.oid)),
            Err(err) => {
                warn!(%err, oid = order.oid, "cancel failed");
                self.set_status(format!("cancel failed: {err}"));
            }
        }
    }

    fn adjust_depth(&mut self, delta: i64) {
        let cfg = self.shared.config();
        let depth = (cfg.depth as i64 + delta).clamp(DEPTH_MIN as i64, DEPTH_MAX as i64) as usize;
        self.shared.set_depth(depth);
    }

    fn adjust_leverage(&mut self, delta: i64) {
        let snap = self.shared.snapshot();
        let Some(asset) = snap.account.asset_index else {
            self.set_status("asset not resolved yet");
            return;
        };
        let Some(client) = &self.actions else {
            self.set_status("no signer configured");
            return;
        };
        let (target, cross) = leverage_request(&snap, delta);
        match client.update_leverage(asset, target, cross) {
            Ok(()) => self.set_status(format!("leverage set to {target}x")),
            Err(err) => self.set_status(format!("leverage failed: {err}")),
        }
    }

    /// Keep the selection inside the active table. Row counts come from the
    /// snapshot so a shrinking table cannot leave a dangling selection.
    fn clamp_selection(&mut self, snap: &Snapshot) {
        let rows = match self.view {
            View::Book | View::Chart => 0,
            View::Positions => snap.account.positions.len(),
            View::Orders => snap.account.open_orders.len(),
            View::Fills => snap.account.fills.len(),
            View::Funding => snap.account.funding.len(),
            View::History => snap.account.order_history.len(),
        };
        self.selection = self.selection.min(rows.saturating_sub(1));
    }

    // --- drawing ------------------------------------------------------------

    fn draw(&self, buf: &mut Buffer, snap: &Snapshot) {
        let (w, h) = (buf.width(), buf.height());
        if w < MIN_WIDTH || h < MIN_HEIGHT {
            buf.put_str(0, 0, "terminal too small", Style::new().fg(C_WARN));
            buf.put_str(
                0,
                1,
                &format!("need at least {MIN_WIDTH}x{MIN_HEIGHT}"),
                Style::new().fg(C_DIM),
            );
            return;
        }

        let area = Rect::new(0, 0, w, h);
        let (header, rest) = area.split_v(2);
        let (body, status) = rest.split_v(rest.h - 1);

        self.draw_header(buf, header, snap);
        match self.view {
            View::Book => self.draw_book_view(buf, body, snap),
            View::Chart => draw_chart(buf, body, snap),
            View::Positions => self.draw_positions(buf, body, snap),
            View::Orders => self.draw_orders(buf, body, snap),
            View::Fills => self.draw_fills(buf, body, snap),
            View::Funding => self.draw_funding(buf, body, snap),
            View::History => self.draw_history(buf, body, snap),
        }
        self.draw_status(buf, status, snap);
    }

    fn draw_header(&self, buf: &mut Buffer, area: Rect, snap: &Snapshot) {
        let ctx = &snap.market.ctx;
        let cfg = &snap.config;
        let bold = Style::new().fg(C_ACCENT).bold();

        buf.put_str(area.x, area.y, &format!("{} {}", cfg.coin, cfg.interval), bold);
        let change = ctx.day_change_pct();
        let change_style = if change < 0.0 {
            Style::new().fg(C_ASK)
        } else {
            Style::new().fg(C_BID)
        };
        buf.put_str(
            area.x + 14,
            area.y,
            &format!("mark {}", ctx.mark_px.normalize()),
            Style::default(),
        );
        buf.put_str(
            area.x + 34,
            area.y,
            &format!("{change:+.2}%"),
            change_style,
        );
        buf.put_str_right(
            area.right().saturating_sub(1),
            area.y,
            &format!("acct {}", snap.account.balances.account_value.normalize()),
            Style::new().fg(C_DIM),
        );

        let line2 = format!(
            "oracle {}  oi {}  vol24h {}  funding {}",
            ctx.oracle_px.normalize(),
            ctx.open_interest.normalize(),
            ctx.day_ntl_volume.normalize(),
            ctx.funding_rate.normalize(),
        );
        buf.put_str(area.x, area.y + 1, &line2, Style::new().fg(C_DIM));
        buf.put_str_right(
            area.right().saturating_sub(1),
            area.y + 1,
            self.view.label(),
            Style::new().fg(C_ACCENT),
        );
    }

    fn draw_book_view(&self, buf: &mut Buffer, area: Rect, snap: &Snapshot) {
        let (ladder, tape) = area.split_h(area.w * 3 / 5);
        draw_ladder(buf, ladder, snap);
        draw_tape(buf, tape, snap);
    }

    fn draw_status(&self, buf: &mut Buffer, area: Rect, snap: &Snapshot) {
        let text = match &self.mode {
            Mode::CoinEntry(entry) => format!("coin: {entry}_"),
            Mode::OrderEntry(form) => {
                let side = if form.is_buy { "BUY" } else { "SELL" };
                let (pm, sm) = match form.field {
                    FormField::Price => (">", " "),
                    FormField::Size => (" ", ">"),
                };
                format!(
                    "{side}  {pm}px {}  {sm}sz {}   enter=submit b/s=side esc=abort",
                    form.px, form.sz
                )
            }
            Mode::Normal => match &self.status {
                Some((msg, _)) => msg.clone(),
                None => format!(
                    "q quit  tab view  c coin  i interval  +/- depth({})  o order  x cancel",
                    snap.config.depth
                ),
            },
        };
        let style = match (&self.mode, &self.status) {
            (Mode::Normal, Some(_)) => Style::new().fg(C_WARN),
            (Mode::Normal, None) => Style::new().fg(C_DIM),
            _ => Style::new().fg(C_ACCENT),
        };
        buf.put_str(area.x, area.y, &text, style);
    }

    fn draw_positions(&self, buf: &mut Buffer, area: Rect, snap: &Snapshot) {
        draw_table(
            buf,
            area,
            "coin      size        entry       value        upnl       liq",
            snap.account.positions.len(),
            self.selection,
            |i| {
                let p = &snap.account.positions[i];
                (
                    format!(
                        "{:<8}{:>9}{:>13}{:>12}{:>12}{:>12}",
                        p.coin,
                        p.szi.normalize(),
                        p.entry_px.normalize(),
                        p.position_value.normalize(),
                        p.unrealized_pnl.normalize(),
                        p.liquidation_px
                            .map(|px| px.normalize().to_string())
                            .unwrap_or_else(|| "-".into()),
                    ),
                    if p.unrealized_pnl < Decimal::ZERO {
                        C_ASK
                    } else {
                        C_BID
                    },
                )
            },
        );
    }

    fn draw_orders(&self, buf: &mut Buffer, area: Rect, snap: &Snapshot) {
        draw_table(
            buf,
            area,
            "oid         coin     side     price         size",
            snap.account.open_orders.len(),
            self.selection,
            |i| {
                let o = &snap.account.open_orders[i];
                (
                    format!(
                        "{:<12}{:<9}{:<6}{:>12}{:>12}",
                        o.oid,
                        o.coin,
                        if o.is_buy { "buy" } else { "sell" },
                        o.limit_px.normalize(),
                        o.sz.normalize(),
                    ),
                    if o.is_buy { C_BID } else { C_ASK },
                )
            },
        );
    }

    fn draw_fills(&self, buf: &mut Buffer, area: Rect, snap: &Snapshot) {
        draw_table(
            buf,
            area,
            "time      coin     side     price         size        pnl",
            snap.account.fills.len(),
            self.selection,
            |i| {
                let f = &snap.account.fills[i];
                (
                    format!(
                        "{}  {:<7}{:<6}{:>12}{:>12}{:>11}",
                        fmt_time(f.time),
                        f.coin,
                        if f.is_buy { "buy" } else { "sell" },
                        f.px.normalize(),
                        f.sz.normalize(),
                        f.closed_pnl.normalize(),
                    ),
                    if f.is_buy { C_BID } else { C_ASK },
                )
            },
        );
    }

    fn draw_funding(&self, buf: &mut Buffer, area: Rect, snap: &Snapshot) {
        draw_table(
            buf,
            area,
            "time      coin         usdc          rate",
            snap.account.funding.len(),
            self.selection,
            |i| {
                let e = &snap.account.funding[i];
                (
                    format!(
                        "{}  {:<7}{:>12}{:>14}",
                        fmt_time(e.time),
                        e.coin,
                        e.usdc.normalize(),
                        e.rate.normalize(),
                    ),
                    if e.usdc < Decimal::ZERO { C_ASK } else { C_BID },
                )
            },
        );
    }

    fn draw_history(&self, buf: &mut Buffer, area: Rect, snap: &Snapshot) {
        draw_table(
            buf,
            area,
            "time      coin     side     price         size    status",
            snap.account.order_history.len(),
            self.selection,
            |i| {
                let o = &snap.account.order_history[i];
                (
                    format!(
                        "{}  {:<7}{:<6}{:>12}{:>10}    {}",
                        fmt_time(o.status_time),
                        o.coin,
                        if o.is_buy { "buy" } else { "sell" },
                        o.limit_px.normalize(),
                        o.sz.normalize(),
                        o.status,
                    ),
                    Color::Reset,
                )
            },
        );
    }
}

/// Leverage update for the active coin: the step starts from that coin's
/// position (not whichever position the exchange lists first) and keeps its
/// margin mode. Without a position the step starts from 1x cross.
fn leverage_request(snap: &Snapshot, delta: i64) -> (u32, bool) {
    let position = snap
        .account
        .positions
        .iter()
        .find(|p| p.coin == snap.config.coin);
    let current = position.map(|p| p.leverage).unwrap_or(1) as i64;
    let cross = position.map(|p| p.cross).unwrap_or(true);
    let max = snap.account.max_leverage.max(1) as i64;
    ((current + delta).clamp(1, max) as u32, cross)
}

// ============================================================================
// View helpers (leaf consumers of the render primitives)
// ============================================================================

fn fmt_time(epoch_ms: u64) -> String {
    chrono::DateTime::from_timestamp_millis(epoch_ms as i64)
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".into())
}

fn draw_table(
    buf: &mut Buffer,
    area: Rect,
    header: &str,
    rows: usize,
    selection: usize,
    row: impl Fn(usize) -> (String, Color),
) {
    if area.h < 2 {
        return;
    }
    buf.put_str(area.x, area.y, header, Style::new().fg(C_DIM).bold());
    let visible = (area.h - 1) as usize;
    // Scroll so the selection stays on screen.
    let first = selection.saturating_sub(visible.saturating_sub(1));
    for (line, i) in (first..rows.min(first + visible)).enumerate() {
        let (text, color) = row(i);
        let mut style = Style::new().fg(color);
        if i == selection {
            style = style.bg(Color::DarkGrey).bold();
        }
        buf.put_str(area.x, area.y + 1 + line as u16, &text, style);
    }
    if rows == 0 {
        buf.put_str(area.x, area.y + 1, "(empty)", Style::new().fg(C_DIM));
    }
}

fn draw_ladder(buf: &mut Buffer, area: Rect, snap: &Snapshot) {
    let depth = snap.config.depth;
    let half = (area.h as usize).saturating_sub(1) / 2;
    let rows = depth.min(half);
    if rows == 0 {
        return;
    }
    let bids = &snap.market.bids;
    let asks = &snap.market.asks;
    let max_cum = bids
        .iter()
        .take(rows)
        .chain(asks.iter().take(rows))
        .map(|l| l.cum)
        .max()
        .unwrap_or(Decimal::ONE)
        .max(Decimal::ONE);

    // Asks above the spread row, best ask nearest the middle.
    let mid = area.y + rows as u16;
    for (i, level) in asks.iter().take(rows).enumerate() {
        let y = mid - 1 - i as u16;
        let frac = (level.cum / max_cum).to_f64().unwrap_or(0.0);
        buf.put_bg_bar(area.x, y, area.w, frac, Color::Rgb(60, 20, 20));
        buf.put_str(
            area.x,
            y,
            &format!("{:>12}", level.px.normalize()),
            Style::new().fg(C_ASK),
        );
        buf.put_str_right(
            area.right().saturating_sub(1),
            y,
            &format!("{}", level.sz.normalize()),
            Style::default(),
        );
    }

    let spread = match (bids.first(), asks.first()) {
        (Some(b), Some(a)) => format!("spread {}", (a.px - b.px).normalize()),
        _ => "spread -".to_string(),
    };
    buf.put_str(area.x, mid, &spread, Style::new().fg(C_DIM));

    for (i, level) in bids.iter().take(rows).enumerate() {
        let y = mid + 1 + i as u16;
        if y >= area.bottom() {
            break;
        }
        let frac = (level.cum / max_cum).to_f64().unwrap_or(0.0);
        buf.put_bg_bar(area.x, y, area.w, frac, Color::Rgb(20, 50, 20));
        buf.put_str(
            area.x,
            y,
            &format!("{:>12}", level.px.normalize()),
            Style::new().fg(C_BID),
        );
        buf.put_str_right(
            area.right().saturating_sub(1),
            y,
            &format!("{}", level.sz.normalize()),
            Style::default(),
        );
    }
}

fn draw_tape(buf: &mut Buffer, area: Rect, snap: &Snapshot) {
    buf.put_str(area.x + 1, area.y, "trades", Style::new().fg(C_DIM).bold());
    for (i, trade) in snap
        .market
        .trades
        .iter()
        .take(area.h.saturating_sub(1) as usize)
        .enumerate()
    {
        let style = match trade.side {
            Side::Buy => Style::new().fg(C_BID),
            Side::Sell => Style::new().fg(C_ASK),
        };
        buf.put_str(
            area.x + 1,
            area.y + 1 + i as u16,
            &format!(
                "{} {:>11} {:>9}",
                fmt_time(trade.time),
                trade.px.normalize(),
                trade.sz.normalize()
            ),
            style,
        );
    }
}

fn draw_chart(buf: &mut Buffer, area: Rect, snap: &Snapshot) {
    let candles = &snap.market.candles;
    if candles.is_empty() || area.h < 3 {
        buf.put_str(area.x + 1, area.y + 1, "no candles", Style::new().fg(C_DIM));
        return;
    }
    let shown = candles.len().min(area.w as usize);
    let slice: Vec<_> = candles.iter().skip(candles.len() - shown).collect();

    let mut lo = Decimal::MAX;
    let mut hi = Decimal::MIN;
    for c in &slice {
        lo = lo.min(c.low);
        hi = hi.max(c.high);
    }
    if hi <= lo {
        return;
    }
    let span = (hi - lo).to_f64().unwrap_or(1.0);
    let scale = |px: Decimal| -> u16 {
        let frac = (px - lo).to_f64().unwrap_or(0.0) / span;
        let row = ((1.0 - frac) * (area.h - 1) as f64).round() as u16;
        area.y + row.min(area.h - 1)
    };

    for (i, c) in slice.iter().enumerate() {
        let x = area.x + i as u16;
        let (color, body_top, body_bot) = if c.close >= c.open {
            (C_BID, scale(c.close), scale(c.open))
        } else {
            (C_ASK, scale(c.open), scale(c.close))
        };
        // Wick spans high..low, body overdraws it.
        for y in scale(c.high)..=scale(c.low) {
            buf.put(x, y, '│', Style::new().fg(color).dim());
        }
        for y in body_top..=body_bot {
            buf.put(x, y, '█', Style::new().fg(color));
        }
    }
    buf.put_str_right(
        area.right().saturating_sub(1),
        area.y,
        &format!("hi {}", hi.normalize()),
        Style::new().fg(C_DIM),
    );
    buf.put_str_right(
        area.right().saturating_sub(1),
        area.bottom().saturating_sub(1),
        &format!("lo {}", lo.normalize()),
        Style::new().fg(C_DIM),
    );
}
