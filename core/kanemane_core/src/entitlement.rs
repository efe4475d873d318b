//! # Entitlement gate
//!
//! Pure decisions over a [`SubscriptionStatus`]:
//!
//! | Question                               | Function                 |
//! |----------------------------------------|--------------------------|
//! | Does the user have any plan at all?    | [`has_active_plan`]      |
//! | May the user use feature `f`?          | [`can_access_feature`]   |
//! | Should this route redirect?            | [`route_decision`]       |
//!
//! [`policy`] is the only place that knows which tier unlocks which feature.
//! Nothing else compares tiers.
//!
//! ## Gate lifecycle (per gated view)
//!
//! ```text
//! Loading ──► Allowed
//!     └─────► RedirectPending ──► (navigation fires once)
//! ```
//!
//! `Loading` is "status not fetched yet" and is never read as denial or as
//! access. Navigation itself belongs to the caller; [`RedirectTracker`] tells
//! it when a redirect is new rather than a repeat of the last one.

use serde::Serialize;

use crate::types::{FeatureKey, SubscriptionStatus, Tier};

pub const DEFAULT_SUBSCRIPTION_PATH: &str = "/dashboard/subscription";
pub const DEFAULT_PROFILE_PATH: &str = "/dashboard/profile";

const PRO_FEATURES: &[FeatureKey] = &[FeatureKey::Export, FeatureKey::Scan, FeatureKey::Whatsapp];

// ─────────────────────────────────────────────────────────
// Policy
// ─────────────────────────────────────────────────────────

/// Features unlocked by `tier`.
pub fn policy(tier: Option<Tier>) -> &'static [FeatureKey] {
    match tier {
        Some(Tier::Pro) => PRO_FEATURES,
        Some(Tier::Basic) | Some(Tier::Unknown) | None => &[],
    }
}

pub fn has_active_plan(status: &SubscriptionStatus) -> bool {
    status.has_subscription && status.current_plan.is_some()
}

pub fn can_access_feature(status: &SubscriptionStatus, feature: FeatureKey) -> bool {
    if !has_active_plan(status) {
        return false;
    }
    policy(status.current_plan).contains(&feature)
}

/// Per-feature access flags, as rendered by the dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FeatureAccess {
    pub export: bool,
    pub scan: bool,
    pub whatsapp: bool,
}

pub fn feature_access(status: &SubscriptionStatus) -> FeatureAccess {
    FeatureAccess {
        export: can_access_feature(status, FeatureKey::Export),
        scan: can_access_feature(status, FeatureKey::Scan),
        whatsapp: can_access_feature(status, FeatureKey::Whatsapp),
    }
}

/// Outcome of an in-page feature guard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum FeatureCheck {
    Granted { feature: FeatureKey },
    UpgradeRequired {
        feature: FeatureKey,
        label: &'static str,
        current_plan: Option<Tier>,
    },
}

impl FeatureCheck {
    pub fn is_granted(&self) -> bool {
        matches!(self, FeatureCheck::Granted { .. })
    }
}

pub fn check_feature(status: &SubscriptionStatus, feature: FeatureKey) -> FeatureCheck {
    if can_access_feature(status, feature) {
        FeatureCheck::Granted { feature }
    } else {
        FeatureCheck::UpgradeRequired {
            feature,
            label: feature.label(),
            current_plan: status.current_plan,
        }
    }
}

// ─────────────────────────────────────────────────────────
// Routing
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "decision", content = "to", rename_all = "snake_case")]
pub enum RouteDecision {
    Allow,
    RedirectTo(String),
}

/// Decide whether `current_path` may render for `status`.
///
/// `subscription_path` is always exempt, whether or not `exempt_paths`
/// lists it; redirecting there from itself would loop.
pub fn route_decision(
    status: &SubscriptionStatus,
    current_path: &str,
    exempt_paths: &[String],
    subscription_path: &str,
) -> RouteDecision {
    if has_active_plan(status) {
        return RouteDecision::Allow;
    }

    let path = normalize_path(current_path);
    if path == normalize_path(subscription_path)
        || exempt_paths.iter().any(|p| normalize_path(p) == path)
    {
        return RouteDecision::Allow;
    }

    RouteDecision::RedirectTo(subscription_path.to_string())
}

/// Strip a trailing slash so `/dashboard/profile/` matches `/dashboard/profile`.
fn normalize_path(path: &str) -> &str {
    let trimmed = path.trim();
    if trimmed.len() > 1 {
        trimmed.trim_end_matches('/')
    } else {
        trimmed
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum GateState {
    Loading,
    Allowed,
    RedirectPending { to: String },
}

/// Route gating configuration for the dashboard area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteGuard {
    subscription_path: String,
    exempt_paths: Vec<String>,
}

impl RouteGuard {
    pub fn new(subscription_path: impl Into<String>, exempt_paths: Vec<String>) -> Self {
        Self {
            subscription_path: subscription_path.into(),
            exempt_paths,
        }
    }

    pub fn subscription_path(&self) -> &str {
        &self.subscription_path
    }

    pub fn exempt_paths(&self) -> &[String] {
        &self.exempt_paths
    }

    pub fn decide(&self, status: &SubscriptionStatus, path: &str) -> RouteDecision {
        route_decision(status, path, &self.exempt_paths, &self.subscription_path)
    }

    /// `None` means the status is still being fetched.
    pub fn state(&self, status: Option<&SubscriptionStatus>, path: &str) -> GateState {
        match status {
            None => GateState::Loading,
            Some(status) => match self.decide(status, path) {
                RouteDecision::Allow => GateState::Allowed,
                RouteDecision::RedirectTo(to) => GateState::RedirectPending { to },
            },
        }
    }
}

impl Default for RouteGuard {
    fn default() -> Self {
        Self::new(
            DEFAULT_SUBSCRIPTION_PATH,
            vec![
                DEFAULT_SUBSCRIPTION_PATH.to_string(),
                DEFAULT_PROFILE_PATH.to_string(),
            ],
        )
    }
}

/// Remembers the last redirect that was acted on.
///
/// [`observe`](RedirectTracker::observe) yields a navigation target only on a
/// transition into `RedirectPending` for a new `(status, path)` pair;
/// re-observing the same pending redirect yields nothing.
#[derive(Debug, Clone, Default)]
pub struct RedirectTracker {
    last: Option<(SubscriptionStatus, String)>,
}

impl RedirectTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(
        &mut self,
        state: &GateState,
        status: &SubscriptionStatus,
        path: &str,
    ) -> Option<String> {
        match state {
            GateState::Loading => None,
            GateState::Allowed => {
                self.last = None;
                None
            }
            GateState::RedirectPending { to } => {
                let key = (*status, path.to_string());
                if self.last.as_ref() == Some(&key) {
                    return None;
                }
                self.last = Some(key);
                Some(to.clone())
            }
        }
    }

    /// Forget everything, e.g. on logout.
    pub fn reset(&mut self) {
        self.last = None;
    }
}
