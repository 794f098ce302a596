//! Behaviour every `ConversationStore` backend must share.

use std::sync::Arc;

use babysquad_common::{Message, MessageRole, RoutingDecision};
use babysquad_sessions::{ConversationStore, InMemoryConversationStore, SqliteConversationStore};
use tempfile::TempDir;

async fn backends(dir: &TempDir) -> Vec<(&'static str, Arc<dyn ConversationStore>)> {
    vec![
        ("memory", Arc::new(InMemoryConversationStore::new()) as Arc<dyn ConversationStore>),
        (
            "sqlite",
            Arc::new(
                SqliteConversationStore::open(&dir.path().join("sessions.sqlite"))
                    .await
                    .unwrap(),
            ) as Arc<dyn ConversationStore>,
        ),
    ]
}

async fn turn(store: &dyn ConversationStore, session: &str, n: usize) {
    store
        .append_turn(
            session,
            Message::user(format!("question {n}")),
            Message::assistant(format!("answer {n}")),
            if n % 2 == 0 {
                RoutingDecision::SleepExpert
            } else {
                RoutingDecision::NutritionExpert
            },
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn n_turns_give_two_n_messages_in_append_order() {
    let dir = TempDir::new().unwrap();
    for (name, store) in backends(&dir).await {
        for n in 0..5 {
            turn(store.as_ref(), "abc", n).await;
        }

        let state = store.load("abc").await.unwrap().unwrap();
        assert_eq!(state.history().len(), 10, "{name}");
        for (i, message) in state.history().iter().enumerate() {
            let n = i / 2;
            if i % 2 == 0 {
                assert_eq!(message.role(), MessageRole::User, "{name}");
                assert_eq!(message.text(), format!("question {n}"), "{name}");
            } else {
                assert_eq!(message.role(), MessageRole::Assistant, "{name}");
                assert_eq!(message.text(), format!("answer {n}"), "{name}");
            }
        }
        assert_eq!(
            state.last_routing_decision(),
            Some(RoutingDecision::SleepExpert),
            "{name}"
        );
    }
}

#[tokio::test]
async fn concurrent_get_or_create_converges() {
    let dir = TempDir::new().unwrap();
    for (name, store) in backends(&dir).await {
        let tasks = (0..8).map(|_| {
            let store = store.clone();
            tokio::spawn(async move { store.get_or_create("brand-new").await })
        });
        for result in futures::future::join_all(tasks).await {
            let state = result.unwrap().unwrap();
            assert!(state.history().is_empty(), "{name}");
        }

        let sessions = store.list_sessions().await.unwrap();
        assert_eq!(sessions.len(), 1, "{name}");
        assert_eq!(sessions[0].session_id, "brand-new", "{name}");
    }
}

#[tokio::test]
async fn get_or_create_does_not_reset_existing_history() {
    let dir = TempDir::new().unwrap();
    for (name, store) in backends(&dir).await {
        turn(store.as_ref(), "abc", 1).await;
        let state = store.get_or_create("abc").await.unwrap();
        assert_eq!(state.history().len(), 2, "{name}");
    }
}

#[tokio::test]
async fn concurrent_sessions_are_isolated() {
    let dir = TempDir::new().unwrap();
    for (name, store) in backends(&dir).await {
        let tasks = (0..6).map(|s| {
            let store = store.clone();
            tokio::spawn(async move {
                let session = format!("session-{s}");
                for n in 0..3 {
                    turn(store.as_ref(), &session, n).await;
                }
            })
        });
        for result in futures::future::join_all(tasks).await {
            result.unwrap();
        }

        for s in 0..6 {
            let state = store.load(&format!("session-{s}")).await.unwrap().unwrap();
            let texts: Vec<&str> = state.history().iter().map(Message::text).collect();
            assert_eq!(
                texts,
                vec!["question 0", "answer 0", "question 1", "answer 1", "question 2", "answer 2"],
                "{name}"
            );
        }
        assert_eq!(store.list_sessions().await.unwrap().len(), 6, "{name}");
    }
}

#[tokio::test]
async fn sqlite_history_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("sessions.sqlite");

    let store = SqliteConversationStore::open(&path).await.unwrap();
    turn(&store, "abc", 0).await;
    store.close().await.unwrap();

    let reopened = SqliteConversationStore::open(&path).await.unwrap();
    let state = reopened.load("abc").await.unwrap().unwrap();
    assert_eq!(state.history().len(), 2);
    assert_eq!(state.last_routing_decision(), Some(RoutingDecision::SleepExpert));

    turn(&reopened, "abc", 1).await;
    let summary = &reopened.list_sessions().await.unwrap()[0];
    assert_eq!(summary.message_count, 4);
    assert_eq!(summary.last_routing_decision, Some(RoutingDecision::NutritionExpert));
}
