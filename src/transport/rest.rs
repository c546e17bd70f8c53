//! Pull transport: typed request/response calls against the exchange `info`
//! endpoint.
//!
//! Every financial quantity arrives as a decimal string and is parsed into
//! `rust_decimal::Decimal`; floats never touch account or price data.

use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

use crate::error::Error;
use crate::state::{
    AccountUpdate, Balances, Candle, Fill, FundingEntry, HistoricalOrder, OpenOrder, Position,
};

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Offset added to spot universe indices per the exchange's asset-id
/// convention.
const SPOT_ASSET_OFFSET: u32 = 10_000;

/// Blocking client for the `info` endpoint.
#[derive(Debug, Clone)]
pub struct InfoClient {
    http: reqwest::blocking::Client,
    base_url: String,
}

/// Outcome of resolving a coin against the perp/spot universes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetResolution {
    pub index: Option<u32>,
    pub max_leverage: u32,
}

impl InfoClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, Error> {
        let http = reqwest::blocking::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    fn info<T: DeserializeOwned>(&self, body: serde_json::Value) -> Result<T, Error> {
        let response = self
            .http
            .post(format!("{}/info", self.base_url))
            .json(&body)
            .send()?
            .error_for_status()?;
        Ok(response.json()?)
    }

    /// Historical candles for one coin/interval, oldest..newest.
    pub fn candle_snapshot(
        &self,
        coin: &str,
        interval: &str,
        start_ms: u64,
        end_ms: u64,
    ) -> Result<Vec<Candle>, Error> {
        let wire: Vec<CandleWire> = self.info(serde_json::json!({
            "type": "candleSnapshot",
            "req": {
                "coin": coin,
                "interval": interval,
                "startTime": start_ms,
                "endTime": end_ms,
            },
        }))?;
        Ok(wire.into_iter().map(Candle::from).collect())
    }

    /// Resolve a coin to its universe index and leverage ceiling: perp
    /// universe first, then the spot universe (offset convention, leverage
    /// fixed at 1).
    pub fn resolve_asset(&self, coin: &str) -> Result<AssetResolution, Error> {
        let meta: PerpMeta = self.info(serde_json::json!({ "type": "meta" }))?;
        if let Some((idx, asset)) = meta
            .universe
            .iter()
            .enumerate()
            .find(|(_, a)| a.name == coin)
        {
            return Ok(AssetResolution {
                index: Some(idx as u32),
                max_leverage: asset.max_leverage,
            });
        }

        let spot: SpotMeta = self.info(serde_json::json!({ "type": "spotMeta" }))?;
        if let Some(pair) = spot.universe.iter().find(|p| p.name == coin) {
            return Ok(AssetResolution {
                index: Some(SPOT_ASSET_OFFSET + pair.index),
                max_leverage: 1,
            });
        }

        Ok(AssetResolution {
            index: None,
            max_leverage: 1,
        })
    }

    /// Fetch the whole account partition in one polling cycle. The caller
    /// publishes the result as a single combined write.
    pub fn account_update(&self, user: &str, funding_start_ms: u64) -> Result<AccountUpdate, Error> {
        let clearinghouse: ClearinghouseState =
            self.info(serde_json::json!({ "type": "clearinghouseState", "user": user }))?;
        let open_orders: Vec<OpenOrderWire> =
            self.info(serde_json::json!({ "type": "openOrders", "user": user }))?;
        let fills: Vec<FillWire> =
            self.info(serde_json::json!({ "type": "userFills", "user": user }))?;
        let funding: Vec<FundingWire> = self.info(serde_json::json!({
            "type": "userFunding", "user": user, "startTime": funding_start_ms,
        }))?;
        let history: Vec<HistoricalOrderWire> =
            self.info(serde_json::json!({ "type": "historicalOrders", "user": user }))?;

        let mut fills: Vec<Fill> = fills.into_iter().map(Fill::from).collect();
        fills.sort_by(|a, b| b.time.cmp(&a.time));
        let mut funding: Vec<FundingEntry> =
            funding.into_iter().map(FundingEntry::from).collect();
        funding.sort_by(|a, b| b.time.cmp(&a.time));
        let mut history: Vec<HistoricalOrder> =
            history.into_iter().map(HistoricalOrder::from).collect();
        history.sort_by(|a, b| b.status_time.cmp(&a.status_time));

        Ok(AccountUpdate {
            balances: Balances {
                account_value: clearinghouse.margin_summary.account_value,
                total_margin_used: clearinghouse.margin_summary.total_margin_used,
                withdrawable: clearinghouse.withdrawable,
            },
            positions: clearinghouse
                .asset_positions
                .into_iter()
                .map(|ap| Position::from(ap.position))
                .collect(),
            open_orders: open_orders.into_iter().map(OpenOrder::from).collect(),
            fills,
            funding,
            order_history: history,
        })
    }
}

// ============================================================================
// Wire schemas
// ============================================================================

#[derive(Debug, Deserialize)]
struct CandleWire {
    #[serde(rename = "t")]
    open_time: u64,
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

impl From<CandleWire> for Candle {
    fn from(w: CandleWire) -> Self {
        Candle {
            time: w.open_time,
            open: w.open,
            high: w.high,
            low: w.low,
            close: w.close,
            volume: w.volume,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PerpAsset {
    name: String,
    max_leverage: u32,
}

#[derive(Debug, Deserialize)]
struct PerpMeta {
    universe: Vec<PerpAsset>,
}

#[derive(Debug, Deserialize)]
struct SpotPair {
    name: String,
    index: u32,
}

#[derive(Debug, Deserialize)]
struct SpotMeta {
    universe: Vec<SpotPair>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MarginSummary {
    account_value: Decimal,
    total_margin_used: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LeverageWire {
    #[serde(rename = "type")]
    kind: String,
    value: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PositionWire {
    coin: String,
    szi: Decimal,
    #[serde(default)]
    entry_px: Option<Decimal>,
    position_value: Decimal,
    unrealized_pnl: Decimal,
    #[serde(default)]
    liquidation_px: Option<Decimal>,
    margin_used: Decimal,
    leverage: LeverageWire,
}

impl From<PositionWire> for Position {
    fn from(w: PositionWire) -> Self {
        Position {
            coin: w.coin,
            szi: w.szi,
            entry_px: w.entry_px.unwrap_or_default(),
            position_value: w.position_value,
            unrealized_pnl: w.unrealized_pnl,
            liquidation_px: w.liquidation_px,
            margin_used: w.margin_used,
            leverage: w.leverage.value,
            cross: w.leverage.kind == "cross",
        }
    }
}

#[derive(Debug, Deserialize)]
struct AssetPositionWire {
    position: PositionWire,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClearinghouseState {
    margin_summary: MarginSummary,
    withdrawable: Decimal,
    #[serde(default)]
    asset_positions: Vec<AssetPositionWire>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OpenOrderWire {
    coin: String,
    side: String,
    limit_px: Decimal,
    sz: Decimal,
    oid: u64,
    timestamp: u64,
    orig_sz: Decimal,
}

impl From<OpenOrderWire> for OpenOrder {
    fn from(w: OpenOrderWire) -> Self {
        OpenOrder {
            oid: w.oid,
            coin: w.coin,
            is_buy: w.side == "B",
            limit_px: w.limit_px,
            sz: w.sz,
            orig_sz: w.orig_sz,
            timestamp: w.timestamp,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FillWire {
    coin: String,
    px: Decimal,
    sz: Decimal,
    side: String,
    time: u64,
    closed_pnl: Decimal,
    fee: Decimal,
}

impl From<FillWire> for Fill {
    fn from(w: FillWire) -> Self {
        Fill {
            coin: w.coin,
            is_buy: w.side == "B",
            px: w.px,
            sz: w.sz,
            time: w.time,
            closed_pnl: w.closed_pnl,
            fee: w.fee,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FundingDeltaWire {
    coin: String,
    usdc: Decimal,
    funding_rate: Decimal,
}

#[derive(Debug, Deserialize)]
struct FundingWire {
    time: u64,
    delta: FundingDeltaWire,
}

impl From<FundingWire> for FundingEntry {
    fn from(w: FundingWire) -> Self {
        FundingEntry {
            coin: w.delta.coin,
            time: w.time,
            usdc: w.delta.usdc,
            rate: w.delta.funding_rate,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoricalOrderWire {
    order: OpenOrderWire,
    status: String,
    status_timestamp: u64,
}

impl From<HistoricalOrderWire> for HistoricalOrder {
    fn from(w: HistoricalOrderWire) -> Self {
        HistoricalOrder {
            oid: w.order.oid,
            coin: w.order.coin,
            is_buy: w.order.side == "B",
            limit_px: w.order.limit_px,
            sz: w.order.sz,
            status: w.status,
            status_time: w.status_timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candle_wire_converts_with_exact_decimals() {
        let raw = r#"[{"t":1700000000000,"T":1700000059999,"s":"BTC","i":"1m",
            "o":"64000.1","c":"64010.2","h":"64020.3","l":"63990.4","v":"12.5","n":42}]"#;
        let wire: Vec<CandleWire> = serde_json::from_str(raw).unwrap();
        let candle = Candle::from(wire.into_iter().next().unwrap());
        assert_eq!(candle.time, 1700000000000);
        assert_eq!(candle.open, Decimal::new(640001, 1));
        assert_eq!(candle.volume, Decimal::new(125, 1));
    }

    #[test]
    fn clearinghouse_state_decodes_positions_and_balances() {
        let raw = r#"{
            "marginSummary":{"accountValue":"10432.1","totalNtlPos":"5000","totalRawUsd":"10000","totalMarginUsed":"250.5"},
            "crossMarginSummary":{"accountValue":"10432.1","totalNtlPos":"5000","totalRawUsd":"10000","totalMarginUsed":"250.5"},
            "withdrawable":"9000.0",
            "assetPositions":[{"type":"oneWay","position":{
                "coin":"BTC","szi":"0.5","entryPx":"60000","positionValue":"32000",
                "unrealizedPnl":"2000","liquidationPx":"40000","marginUsed":"250.5",
                "leverage":{"type":"cross","value":20},"maxLeverage":50,
                "returnOnEquity":"0.1","cumFunding":{"allTime":"1","sinceOpen":"0.5","sinceChange":"0.1"}}}],
            "time":1700000000000}"#;
        let state: ClearinghouseState = serde_json::from_str(raw).unwrap();
        assert_eq!(state.margin_summary.account_value, Decimal::new(104321, 1));
        let pos = Position::from(
            state
                .asset_positions
                .into_iter()
                .next()
                .unwrap()
                .position,
        );
        assert_eq!(pos.coin, "BTC");
        assert_eq!(pos.leverage, 20);
        assert!(pos.cross);
        assert_eq!(pos.liquidation_px, Some(Decimal::from(40000)));
    }

    #[test]
    fn null_liquidation_px_is_tolerated() {
        let raw = r#"{"coin":"ETH","szi":"-1","entryPx":null,"positionValue":"3000",
            "unrealizedPnl":"-12","liquidationPx":null,"marginUsed":"100",
            "leverage":{"type":"isolated","value":5}}"#;
        let pos = Position::from(serde_json::from_str::<PositionWire>(raw).unwrap());
        assert_eq!(pos.liquidation_px, None);
        assert_eq!(pos.entry_px, Decimal::ZERO);
        assert!(pos.szi < Decimal::ZERO);
        assert!(!pos.cross);
    }

    #[test]
    fn open_order_side_maps_to_is_buy() {
        let raw = r#"[{"coin":"BTC","side":"B","limitPx":"63000","sz":"0.1",
            "oid":77,"timestamp":1700000000000,"origSz":"0.2"}]"#;
        let wire: Vec<OpenOrderWire> = serde_json::from_str(raw).unwrap();
        let order = OpenOrder::from(wire.into_iter().next().unwrap());
        assert!(order.is_buy);
        assert_eq!(order.oid, 77);
        assert_eq!(order.orig_sz, Decimal::new(2, 1));
    }

    #[test]
    fn funding_delta_flattens() {
        let raw = r#"[{"time":1700000000000,"hash":"0xabc","delta":{
            "type":"funding","coin":"BTC","usdc":"-1.25","szi":"0.5","fundingRate":"0.0000125"}}]"#;
        let wire: Vec<FundingWire> = serde_json::from_str(raw).unwrap();
        let entry = FundingEntry::from(wire.into_iter().next().unwrap());
        assert_eq!(entry.coin, "BTC");
        assert_eq!(entry.usdc, Decimal::new(-125, 2));
    }

    #[test]
    fn historical_order_carries_status() {
        let raw = r#"[{"order":{"coin":"SOL","side":"A","limitPx":"150","sz":"0",
            "oid":9,"timestamp":1700000000000,"origSz":"10"},
            "status":"filled","statusTimestamp":1700000001000}]"#;
        let wire: Vec<HistoricalOrderWire> = serde_json::from_str(raw).unwrap();
        let order = HistoricalOrder::from(wire.into_iter().next().unwrap());
        assert_eq!(order.status, "filled");
        assert!(!order.is_buy);
        assert_eq!(order.status_time, 1700000001000);
    }

    #[test]
    fn perp_meta_resolution_shapes() {
        let raw = r#"{"universe":[
            {"name":"BTC","szDecimals":5,"maxLeverage":50},
            {"name":"ETH","szDecimals":4,"maxLeverage":50,"onlyIsolated":false}]}"#;
        let meta: PerpMeta = serde_json::from_str(raw).unwrap();
        assert_eq!(meta.universe[1].name, "ETH");
        assert_eq!(meta.universe[0].max_leverage, 50);
    }
}
