mod support;

use std::sync::Arc;
use std::time::{Duration, Instant};

use ambisql::config::SessionConfig;
use ambisql::error::ClarifyError;
use ambisql::models::DetectionResult;
use ambisql::rewriter::{Rewriter, RoundState};
use ambisql::session::{Conversation, InMemorySessionStore, SessionId, SessionStore};

use support::{
    FailingOracle, ScriptedOracle, VIETNAM_QUESTION, choices_reply, detection_reply,
    drivers_schema, vietnam_item,
};

fn store_with_ttl(ttl: Duration) -> InMemorySessionStore {
    InMemorySessionStore::new(&SessionConfig { ttl })
}

#[test]
fn sessions_are_isolated_and_evictable() {
    let store = InMemorySessionStore::default();
    let first = store.create(Rewriter::new("Q1", "schema"));
    let second = store.create(Rewriter::new("Q2", "schema"));

    assert_ne!(first, second);
    assert_eq!(store.len(), 2);
    let handle = store.get(first).expect("session should exist");
    assert!(!Arc::ptr_eq(
        &handle,
        &store.get(second).expect("session should exist")
    ));
    assert!(Arc::ptr_eq(&handle, &store.get(first).expect("session should exist")));

    assert!(store.evict(first));
    assert!(!store.evict(first));
    assert!(store.get(first).is_none());
    assert_eq!(store.len(), 1);
}

#[test]
fn idle_sessions_expire() {
    let store = store_with_ttl(Duration::from_secs(60));
    store.create(Rewriter::new("Q1", "schema"));
    store.create(Rewriter::new("Q2", "schema"));

    assert_eq!(store.evict_expired(Instant::now()), 0);
    assert_eq!(
        store.evict_expired(Instant::now() + Duration::from_secs(61)),
        2
    );
    assert!(store.is_empty());
}

#[test]
fn zero_ttl_session_is_gone_on_next_access() {
    let store = store_with_ttl(Duration::ZERO);
    let id = store.create(Rewriter::new("Q1", "schema"));
    std::thread::sleep(Duration::from_millis(5));

    assert!(store.get(id).is_none());
    assert_eq!(store.len(), 0);
}

#[tokio::test]
async fn conversation_runs_start_then_answer() {
    let oracle = Arc::new(ScriptedOracle::new([
        detection_reply(&[vietnam_item()]),
        choices_reply(&["End Day: April 30, 1975.", "End Year: Dec 31, 1975."]),
    ]));
    let store = Arc::new(InMemorySessionStore::default());
    let conversation = Conversation::new(store.clone(), oracle.clone());

    let started = conversation
        .start(VIETNAM_QUESTION, &drivers_schema())
        .await
        .expect("start should succeed");
    let answers: Vec<_> = started
        .result
        .question_set()
        .expect("start should be ambiguous")
        .iter()
        .map(|item| item.answered("End Year: 1975"))
        .collect();
    assert_eq!(store.len(), 1);

    let answered = conversation
        .answer(started.session_id, &answers, "")
        .await
        .expect("answer should succeed");

    assert_eq!(answered.session_id, started.session_id);
    match &answered.result {
        DetectionResult::Resolved(handoff) => assert!(handoff.evidence.contains("End Year: 1975")),
        DetectionResult::Ambiguous { .. } => panic!("answer should resolve"),
    }
    let encoded = serde_json::to_value(&answered).expect("turn should serialize");
    assert_eq!(encoded["ambiguous"], false);
    assert_eq!(encoded["session_id"], started.session_id.to_string());

    let handle = store.get(started.session_id).expect("session should exist");
    assert_eq!(handle.lock().await.state(), RoundState::Resolved);

    assert!(conversation.close(started.session_id));
    assert!(store.is_empty());
}

#[tokio::test]
async fn answering_unknown_session_is_not_found() {
    let conversation = Conversation::new(
        Arc::new(InMemorySessionStore::default()),
        Arc::new(FailingOracle),
    );
    let missing = SessionId::new();

    let error = conversation
        .answer(missing, &[], "")
        .await
        .expect_err("unknown session must fail");

    assert!(matches!(error, ClarifyError::SessionNotFound(id) if id == missing));
}

#[tokio::test]
async fn failed_start_registers_no_session() {
    let store = Arc::new(InMemorySessionStore::default());
    let conversation = Conversation::new(store.clone(), Arc::new(FailingOracle));

    let error = conversation
        .start(VIETNAM_QUESTION, &drivers_schema())
        .await
        .expect_err("oracle failure must surface");

    assert_eq!(error.code(), "oracle_unavailable");
    assert!(store.is_empty());
}
