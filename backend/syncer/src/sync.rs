//! Background refresh of the in-memory snapshot.
//!
//! Every refresh takes a ticket from [`SyncState::begin`]. Results are only
//! applied if no newer refresh has already landed, so a slow response can
//! never overwrite fresher data. A failed subscription fetch installs the
//! fail-closed status; failed data fetches leave the previous data in place.
//!
//! Logout ends the session: the snapshot is dropped and nothing is applied,
//! scheduled or not, until [`SyncState::resume`] starts a new one.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use kanemane_core::{Currency, ExchangeRate, LineItem, SubscriptionStatus};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::client::BackendClient;
use crate::errors::Result;
use crate::models;

/// What the service currently knows. `status == None` means still loading.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub status: Option<SubscriptionStatus>,
    pub assets: Vec<LineItem>,
    pub transactions: Vec<LineItem>,
    pub rate: ExchangeRate,
    applied_ticket: u64,
}

/// Raw outcome of one round of backend calls.
pub struct Fetched {
    pub status: Result<SubscriptionStatus>,
    pub assets: Result<Vec<LineItem>>,
    pub transactions: Result<Vec<LineItem>>,
    pub rate: Result<ExchangeRate>,
}

pub struct SyncState {
    snapshot: RwLock<Snapshot>,
    tickets: AtomicU64,
    session_active: AtomicBool,
}

impl Default for SyncState {
    fn default() -> Self {
        Self {
            snapshot: RwLock::default(),
            tickets: AtomicU64::new(0),
            session_active: AtomicBool::new(true),
        }
    }
}

impl SyncState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.session_active.load(Ordering::SeqCst)
    }

    /// Start a new session after logout. Refreshes apply again from here on.
    pub fn resume(&self) {
        if !self.session_active.swap(true, Ordering::SeqCst) {
            info!("Session resumed");
        }
    }

    /// Issue a ticket for a refresh that is about to start.
    pub fn begin(&self) -> u64 {
        self.tickets.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub async fn snapshot(&self) -> Snapshot {
        self.snapshot.read().await.clone()
    }

    pub async fn status(&self) -> Option<SubscriptionStatus> {
        self.snapshot.read().await.status
    }

    /// Apply a finished refresh. Returns `false` if a newer one already landed.
    pub async fn apply(&self, ticket: u64, fetched: Fetched) -> bool {
        let mut snap = self.snapshot.write().await;
        if !self.is_active() {
            debug!("Discarding refresh #{ticket}: logged out");
            return false;
        }
        if ticket <= snap.applied_ticket {
            warn!("Discarding stale refresh #{ticket} (#{} already applied)", snap.applied_ticket);
            return false;
        }
        snap.applied_ticket = ticket;

        snap.status = Some(match fetched.status {
            Ok(status) => status,
            Err(e) => {
                warn!("Subscription fetch failed, denying access until next refresh: {e}");
                SubscriptionStatus::fail_closed()
            }
        });

        match fetched.assets {
            Ok(assets) => snap.assets = assets,
            Err(e) => warn!("Asset fetch failed, keeping previous data: {e}"),
        }
        match fetched.transactions {
            Ok(transactions) => snap.transactions = transactions,
            Err(e) => warn!("Transaction fetch failed, keeping previous data: {e}"),
        }
        match fetched.rate {
            Ok(rate) => snap.rate = rate,
            Err(e) => warn!("Exchange rate fetch failed, keeping {}: {e}", snap.rate.rate()),
        }
        true
    }

    /// Drop everything and end the session (logout). In-flight refreshes
    /// become stale and polling pauses until [`SyncState::resume`].
    pub async fn clear(&self) {
        let ticket = self.begin();
        let mut snap = self.snapshot.write().await;
        self.session_active.store(false, Ordering::SeqCst);
        *snap = Snapshot {
            applied_ticket: ticket,
            ..Snapshot::default()
        };
    }
}

/// Fetch everything once and apply it.
pub async fn refresh(state: &SyncState, client: &BackendClient) -> bool {
    let ticket = state.begin();
    let (status, assets, transactions, summary) = tokio::join!(
        client.subscription_status(),
        client.assets(),
        client.transactions(),
        client.dashboard_summary(Currency::Jpy),
    );
    let rate = summary.and_then(|summary| Ok(models::exchange_rate(&summary)?));
    let applied = state
        .apply(
            ticket,
            Fetched {
                status,
                assets,
                transactions,
                rate,
            },
        )
        .await;
    if applied {
        if let Some(status) = state.status().await {
            info!(
                "Refresh #{ticket} applied (subscribed: {}, plan: {:?})",
                status.has_subscription, status.current_plan
            );
        }
    }
    applied
}

/// One scheduled tick. Skipped entirely while logged out.
pub async fn scheduled_refresh(state: &SyncState, client: &BackendClient) -> bool {
    if !state.is_active() {
        debug!("Logged out, skipping scheduled refresh");
        return false;
    }
    let applied = refresh(state, client).await;
    if !applied {
        debug!("Scheduled refresh superseded by a newer one");
    }
    applied
}

/// Poll the backend forever.
pub async fn run(state: Arc<SyncState>, client: BackendClient, interval: Duration) {
    info!("Sync loop starting, polling every {}s", interval.as_secs());
    loop {
        scheduled_refresh(&state, &client).await;
        tokio::time::sleep(interval).await;
    }
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────
