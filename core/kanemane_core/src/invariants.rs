#![allow(dead_code)]

use crate::entitlement::{can_access_feature, has_active_plan, policy, RouteDecision};
use crate::types::{FeatureKey, SubscriptionStatus};

const TOLERANCE: f64 = 1e-9;

/// INV-1: Without an active plan no feature is granted.
pub fn assert_inactive_denies_all(status: &SubscriptionStatus) {
    if !has_active_plan(status) {
        for feature in FeatureKey::ALL {
            assert!(
                !can_access_feature(status, feature),
                "INV-1 violated: {feature} granted to inactive status {status:?}"
            );
        }
    }
}

/// INV-2: Access never exceeds what the policy table lists for the tier.
pub fn assert_access_within_policy(status: &SubscriptionStatus) {
    let allowed = policy(status.current_plan);
    for feature in FeatureKey::ALL {
        if can_access_feature(status, feature) {
            assert!(
                allowed.contains(&feature),
                "INV-2 violated: {feature} granted outside policy for {:?}",
                status.current_plan
            );
        }
    }
}

/// INV-3: An active plan is never redirected.
pub fn assert_active_never_redirected(status: &SubscriptionStatus, decision: &RouteDecision) {
    if has_active_plan(status) {
        assert_eq!(
            decision,
            &RouteDecision::Allow,
            "INV-3 violated: active status {status:?} redirected"
        );
    }
}

/// INV-4: A redirect never targets the path being redirected from.
pub fn assert_no_self_redirect(path: &str, decision: &RouteDecision) {
    if let RouteDecision::RedirectTo(to) = decision {
        assert_ne!(to, path, "INV-4 violated: redirect loop on {path}");
    }
}

/// INV-5: The expense ratio of finite inputs lies in `[0, 1]`.
pub fn assert_ratio_in_unit_interval(ratio: f64) {
    assert!(
        (0.0..=1.0).contains(&ratio),
        "INV-5 violated: expense ratio {ratio} outside [0, 1]"
    );
}

pub fn assert_close(actual: f64, expected: f64) {
    let scale = expected.abs().max(1.0);
    assert!(
        (actual - expected).abs() <= TOLERANCE * scale,
        "expected {expected}, got {actual}"
    );
}
