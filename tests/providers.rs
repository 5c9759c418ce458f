//! Shared context providers over a scripted backend.

mod support;

use caseflow::env::HasHttp;
use caseflow::http::Method;
use caseflow::provider::{
    current_referral, current_user, ProviderError, ProviderState, ReferralState,
};
use serde_json::{json, Value};
use std::sync::Arc;
use support::{harness, Reply};
use uuid::Uuid;

fn whoami(first_name: &str) -> Value {
    json!({
        "id": Uuid::nil(),
        "first_name": first_name,
        "last_name": "Martin",
        "email": "jo.martin@cases.example",
        "memberships": [],
    })
}

#[tokio::test]
async fn current_user_loads_whoami_once() {
    let h = harness();
    h.transport.push(Reply::ok(whoami("Jo")));

    let provider = current_user(h.env.http().clone());
    let user = provider.ready().await.unwrap();

    assert_eq!(user.full_name(), "Jo Martin");
    assert_eq!(h.transport.calls(), 1);
    let sent = &h.transport.requests()[0];
    assert_eq!(sent.method, Method::GET);
    assert_eq!(sent.url.as_str(), "https://cases.example/api/users/whoami/");
}

#[tokio::test]
async fn unchanged_refetch_notifies_nobody() {
    let h = harness();
    h.transport.push(Reply::ok(whoami("Jo")));
    h.transport.push(Reply::ok(whoami("Jo")));

    let provider = current_user(h.env.http().clone());
    let before = provider.ready().await.unwrap();
    let consumer = provider.handle();
    let mut updates = consumer.subscribe();
    let _ = updates.borrow_and_update();

    let after = provider.refetch().await.unwrap();

    assert!(Arc::ptr_eq(&before, &after));
    assert_eq!(*consumer.value().unwrap(), *before);
    assert!(!updates.has_changed().unwrap());
    assert_eq!(h.transport.calls(), 2);
}

#[tokio::test]
async fn failed_refetch_keeps_serving_the_loaded_value() {
    let h = harness();
    h.transport.push(Reply::ok(json!({"id": 42, "state": "received", "object": "Zoning"})));
    h.transport.push(Reply::Json(503, json!({"detail": "maintenance"})));

    let provider = current_referral(h.env.http().clone(), 42);
    let referral = provider.ready().await.unwrap();
    assert_eq!(referral.state, ReferralState::Received);
    assert!(h.transport.requests()[0].url.as_str().ends_with("/referrals/42/"));

    let error = provider.refetch().await.unwrap_err();

    assert!(matches!(error, ProviderError::Fetch(ref e) if e.status() == Some(503)));
    assert!(matches!(provider.state(), ProviderState::Ready(_)));
    assert_eq!(provider.value().unwrap().object, "Zoning");
}

#[tokio::test]
async fn failed_first_load_is_visible_to_consumers() {
    let h = harness();
    h.transport.push(Reply::Fail("offline"));

    let provider = current_user(h.env.http().clone());

    assert!(provider.ready().await.is_none());
    assert!(matches!(provider.state(), ProviderState::Failed(_)));
}

#[tokio::test]
async fn set_value_replaces_for_every_consumer() {
    let h = harness();
    h.transport.push(Reply::ok(json!({"id": 42, "state": "received"})));

    let provider = current_referral(h.env.http().clone(), 42);
    let original = provider.ready().await.unwrap();
    let consumer = provider.handle();

    let mut closed = (*original).clone();
    closed.state = ReferralState::Closed;
    provider.set_value(closed);

    assert_eq!(consumer.value().unwrap().state, ReferralState::Closed);
    assert_eq!(h.transport.calls(), 1);
}
