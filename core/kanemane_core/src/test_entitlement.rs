use crate::entitlement::{
    can_access_feature, check_feature, feature_access, has_active_plan, policy, route_decision,
    FeatureAccess, FeatureCheck, GateState, RedirectTracker, RouteDecision, RouteGuard,
    DEFAULT_SUBSCRIPTION_PATH,
};
use crate::invariants::{
    assert_access_within_policy, assert_active_never_redirected, assert_inactive_denies_all,
    assert_no_self_redirect,
};
use crate::types::{FeatureKey, SubscriptionStatus, Tier};

fn none() -> SubscriptionStatus {
    SubscriptionStatus::fail_closed()
}

fn basic() -> SubscriptionStatus {
    SubscriptionStatus::new(true, Some(Tier::Basic))
}

fn pro() -> SubscriptionStatus {
    SubscriptionStatus::new(true, Some(Tier::Pro))
}

fn all_statuses() -> Vec<SubscriptionStatus> {
    let mut out = Vec::new();
    for has in [false, true] {
        for plan in [None, Some(Tier::Basic), Some(Tier::Pro), Some(Tier::Unknown)] {
            out.push(SubscriptionStatus::new(has, plan));
        }
    }
    out
}

fn exempt() -> Vec<String> {
    vec![
        "/dashboard/subscription".to_string(),
        "/dashboard/profile".to_string(),
    ]
}

// ── Feature access ───────────────────────────────────────────────────

#[test]
fn test_no_plan_denies_every_feature() {
    for feature in FeatureKey::ALL {
        assert!(!can_access_feature(&none(), feature));
    }
}

#[test]
fn test_basic_plan_denies_every_feature() {
    for feature in FeatureKey::ALL {
        assert!(!can_access_feature(&basic(), feature));
    }
}

#[test]
fn test_pro_plan_grants_every_feature() {
    for feature in FeatureKey::ALL {
        assert!(can_access_feature(&pro(), feature));
    }
}

#[test]
fn test_pro_plan_without_subscription_flag_is_denied() {
    let inconsistent = SubscriptionStatus::new(false, Some(Tier::Pro));
    assert!(!has_active_plan(&inconsistent));
    for feature in FeatureKey::ALL {
        assert!(!can_access_feature(&inconsistent, feature));
    }
}

#[test]
fn test_unknown_tier_is_active_but_grants_nothing() {
    let future = SubscriptionStatus::new(true, Some(Tier::Unknown));
    assert!(has_active_plan(&future));
    for feature in FeatureKey::ALL {
        assert!(!can_access_feature(&future, feature));
    }
}

#[test]
fn test_unknown_tier_parses_from_backend_json() {
    let status: SubscriptionStatus =
        serde_json::from_str(r#"{"has_subscription":true,"current_plan":"enterprise"}"#).unwrap();
    assert_eq!(status.current_plan, Some(Tier::Unknown));
    assert!(!can_access_feature(&status, FeatureKey::Export));
}

#[test]
fn test_null_plan_parses_from_backend_json() {
    let status: SubscriptionStatus =
        serde_json::from_str(r#"{"has_subscription":false,"current_plan":null}"#).unwrap();
    assert_eq!(status, none());

    let missing: SubscriptionStatus = serde_json::from_str(r#"{"has_subscription":false}"#).unwrap();
    assert_eq!(missing.current_plan, None);
}

#[test]
fn test_basic_is_active_plan() {
    assert!(has_active_plan(&basic()));
    assert!(has_active_plan(&pro()));
    assert!(!has_active_plan(&none()));
    assert!(!has_active_plan(&SubscriptionStatus::new(true, None)));
}

#[test]
fn test_policy_table() {
    assert!(policy(None).is_empty());
    assert!(policy(Some(Tier::Basic)).is_empty());
    assert!(policy(Some(Tier::Unknown)).is_empty());
    assert_eq!(policy(Some(Tier::Pro)).len(), 3);
}

#[test]
fn test_feature_access_flags() {
    assert_eq!(feature_access(&basic()), FeatureAccess::default());
    assert_eq!(
        feature_access(&pro()),
        FeatureAccess {
            export: true,
            scan: true,
            whatsapp: true,
        }
    );
}

#[test]
fn test_check_feature_reports_upgrade_for_basic() {
    let check = check_feature(&basic(), FeatureKey::Scan);
    assert_eq!(
        check,
        FeatureCheck::UpgradeRequired {
            feature: FeatureKey::Scan,
            label: "Scan Resi",
            current_plan: Some(Tier::Basic),
        }
    );
    assert!(!check.is_granted());
    assert!(check_feature(&pro(), FeatureKey::Scan).is_granted());
}

#[test]
fn test_feature_key_parsing() {
    assert_eq!("export".parse::<FeatureKey>().unwrap(), FeatureKey::Export);
    assert_eq!("WhatsApp".parse::<FeatureKey>().unwrap(), FeatureKey::Whatsapp);
    assert!("budget".parse::<FeatureKey>().is_err());
}

#[test]
fn test_access_is_idempotent() {
    for status in all_statuses() {
        for feature in FeatureKey::ALL {
            assert_eq!(
                can_access_feature(&status, feature),
                can_access_feature(&status, feature)
            );
        }
    }
}

#[test]
fn test_access_invariants_hold_for_all_statuses() {
    for status in all_statuses() {
        assert_inactive_denies_all(&status);
        assert_access_within_policy(&status);
    }
}

// ── Routing ──────────────────────────────────────────────────────────

#[test]
fn test_subscription_page_never_redirects() {
    for status in all_statuses() {
        let decision = route_decision(
            &status,
            "/dashboard/subscription",
            &exempt(),
            DEFAULT_SUBSCRIPTION_PATH,
        );
        assert_eq!(decision, RouteDecision::Allow);
    }
}

#[test]
fn test_subscription_page_exempt_even_if_not_listed() {
    let decision = route_decision(&none(), "/dashboard/subscription", &[], DEFAULT_SUBSCRIPTION_PATH);
    assert_eq!(decision, RouteDecision::Allow);
}

#[test]
fn test_profile_page_exempt() {
    let decision = route_decision(&none(), "/dashboard/profile/", &exempt(), DEFAULT_SUBSCRIPTION_PATH);
    assert_eq!(decision, RouteDecision::Allow);
}

#[test]
fn test_gated_page_redirects_without_plan() {
    let decision = route_decision(&none(), "/dashboard/assets", &exempt(), DEFAULT_SUBSCRIPTION_PATH);
    assert_eq!(
        decision,
        RouteDecision::RedirectTo("/dashboard/subscription".to_string())
    );
}

#[test]
fn test_basic_plan_reaches_dashboard() {
    let decision = route_decision(&basic(), "/dashboard", &exempt(), DEFAULT_SUBSCRIPTION_PATH);
    assert_eq!(decision, RouteDecision::Allow);
}

#[test]
fn test_route_invariants_hold() {
    let guard = RouteGuard::default();
    for status in all_statuses() {
        for path in ["/dashboard", "/dashboard/reports", "/dashboard/subscription"] {
            let decision = guard.decide(&status, path);
            assert_active_never_redirected(&status, &decision);
            assert_no_self_redirect(path, &decision);
        }
    }
}

#[test]
fn test_gate_state_loading_when_status_unknown() {
    let guard = RouteGuard::default();
    assert_eq!(guard.state(None, "/dashboard"), GateState::Loading);
    assert_eq!(guard.state(Some(&pro()), "/dashboard"), GateState::Allowed);
    assert_eq!(
        guard.state(Some(&none()), "/dashboard"),
        GateState::RedirectPending {
            to: "/dashboard/subscription".to_string()
        }
    );
}

// ── Redirect tracking ────────────────────────────────────────────────

#[test]
fn test_redirect_fires_once_per_status_and_path() {
    let guard = RouteGuard::default();
    let mut tracker = RedirectTracker::new();
    let status = none();

    let state = guard.state(Some(&status), "/dashboard");
    assert_eq!(
        tracker.observe(&state, &status, "/dashboard").as_deref(),
        Some("/dashboard/subscription")
    );
    // Re-render with the same inputs.
    assert_eq!(tracker.observe(&state, &status, "/dashboard"), None);
    assert_eq!(tracker.observe(&state, &status, "/dashboard"), None);
}

#[test]
fn test_redirect_fires_again_for_new_path() {
    let guard = RouteGuard::default();
    let mut tracker = RedirectTracker::new();
    let status = none();

    let first = guard.state(Some(&status), "/dashboard");
    assert!(tracker.observe(&first, &status, "/dashboard").is_some());

    let second = guard.state(Some(&status), "/dashboard/assets");
    assert!(tracker.observe(&second, &status, "/dashboard/assets").is_some());
}

#[test]
fn test_loading_and_allowed_never_navigate() {
    let mut tracker = RedirectTracker::new();
    assert_eq!(tracker.observe(&GateState::Loading, &none(), "/dashboard"), None);
    assert_eq!(tracker.observe(&GateState::Allowed, &pro(), "/dashboard"), None);
}

#[test]
fn test_redirect_fires_again_after_allowed_transition() {
    let guard = RouteGuard::default();
    let mut tracker = RedirectTracker::new();
    let status = none();

    let pending = guard.state(Some(&status), "/dashboard");
    assert!(tracker.observe(&pending, &status, "/dashboard").is_some());

    let allowed = guard.state(Some(&status), "/dashboard/subscription");
    assert_eq!(tracker.observe(&allowed, &status, "/dashboard/subscription"), None);

    assert!(tracker.observe(&pending, &status, "/dashboard").is_some());
}

#[test]
fn test_tracker_reset() {
    let mut tracker = RedirectTracker::new();
    let pending = GateState::RedirectPending {
        to: "/dashboard/subscription".to_string(),
    };
    assert!(tracker.observe(&pending, &none(), "/dashboard").is_some());
    tracker.reset();
    assert!(tracker.observe(&pending, &none(), "/dashboard").is_some());
}

#[test]
fn test_tier_from_plan_name() {
    assert_eq!(Tier::from("Pro"), Tier::Pro);
    assert_eq!(Tier::from(" basic "), Tier::Basic);
    assert_eq!(Tier::from("family_plus"), Tier::Unknown);
}
