//! Polling worker: account state and asset resolution over the pull
//! transport.
//!
//! Fixed-cadence loop; every iteration re-reads the active coin and
//! re-resolves the instrument when it changed. Account data is fetched on a
//! slower timer and published as one combined write so the UI never sees
//! fills without their matching positions. All fetch errors skip silently
//! to the next cycle.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::error::Error;
use crate::state::{AccountUpdate, Shared};
use crate::transport::rest::{AssetResolution, InfoClient};

/// Pause between iterations; the sole backpressure mechanism.
const ITERATION_SLEEP: Duration = Duration::from_millis(500);
/// Minimum spacing of full account fetches.
const ACCOUNT_INTERVAL: Duration = Duration::from_secs(3);
/// Funding history lookback window.
const FUNDING_LOOKBACK_MS: u64 = 7 * 24 * 3_600_000;

/// Pull-transport surface the worker needs; [`InfoClient`] in production,
/// a stub in tests.
pub trait AccountSource {
    fn resolve_asset(&self, coin: &str) -> Result<AssetResolution, Error>;
    fn account_update(&self, user: &str, funding_start_ms: u64) -> Result<AccountUpdate, Error>;
}

impl AccountSource for InfoClient {
    fn resolve_asset(&self, coin: &str) -> Result<AssetResolution, Error> {
        InfoClient::resolve_asset(self, coin)
    }

    fn account_update(&self, user: &str, funding_start_ms: u64) -> Result<AccountUpdate, Error> {
        InfoClient::account_update(self, user, funding_start_ms)
    }
}

/// Worker entry point; runs until the shared `running` flag clears.
/// `user` is the optional authenticated account address.
pub fn run<C: AccountSource>(shared: Arc<Shared>, client: C, user: Option<String>) {
    let mut resolved_coin: Option<String> = None;
    let mut last_account_fetch: Option<Instant> = None;

    while shared.running() {
        let cfg = shared.config();

        if resolved_coin.as_deref() != Some(cfg.coin.as_str()) {
            match client.resolve_asset(&cfg.coin) {
                Ok(resolution) => {
                    info!(coin = %cfg.coin, index = ?resolution.index, max_leverage = resolution.max_leverage, "resolved asset");
                    shared.apply_asset_resolution(resolution.index, resolution.max_leverage);
                    resolved_coin = Some(cfg.coin.clone());
                }
                // Leave resolved_coin unset so the next cycle retries.
                Err(err) => warn!(%err, coin = %cfg.coin, "asset resolution failed"),
            }
        }

        if let Some(user) = user.as_deref() {
            let due = last_account_fetch
                .map(|t| t.elapsed() >= ACCOUNT_INTERVAL)
                .unwrap_or(true);
            if due {
                last_account_fetch = Some(Instant::now());
                let start = chrono::Utc::now().timestamp_millis().max(0) as u64;
                let start = start.saturating_sub(FUNDING_LOOKBACK_MS);
                match client.account_update(user, start) {
                    Ok(update) => shared.apply_account(update),
                    Err(err) => debug!(%err, "account fetch failed, retrying next cycle"),
                }
            }
        }

        super::sleep_while_running(&shared, ITERATION_SLEEP);
    }
    debug!("polling worker stopped");
}
