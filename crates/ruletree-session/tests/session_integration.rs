//! Session behaviour under virtual time: debounce, out-of-order replies,
//! transport failures

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::{FutureExt, StreamExt};
use ruletree::names::{AND, GREATER, IS_IN_LIST};
use ruletree::validate::response::PathError;
use ruletree::{
    EditError, EditIntent, Editor, EditorConfig, EditorMode, ErrorCode, EvaluationError, Node, NodePath,
    Revision, RootKind, ValidationResponse, ValidationStatus, WireNode,
};
use ruletree_session::{EditorSession, SessionConfig, SessionUpdate, ValidatorError};
use tokio::sync::Mutex;
use tokio::time::sleep;

const DEBOUNCE: Duration = Duration::from_millis(300);

fn amount_check() -> Arc<Node> {
    Node::binary(GREATER, Node::payload("amount"), Node::constant(1000))
}

fn country_check() -> Arc<Node> {
    Node::binary(IS_IN_LIST, Node::payload("country"), Node::constant(vec!["FR", "DE"]))
}

fn editor() -> Editor {
    Editor::new(
        Node::n_ary(AND, vec![amount_check()]),
        EditorConfig::new().with_root_kind(RootKind::Trigger),
    )
}

fn config() -> SessionConfig {
    SessionConfig::new().with_debounce(DEBOUNCE)
}

fn append() -> EditIntent {
    EditIntent::AppendChild {
        path: NodePath::root(),
        node: country_check(),
    }
}

fn error_at(path: &str, code: ErrorCode) -> ValidationResponse {
    ValidationResponse {
        errors: vec![PathError {
            path: path.to_string(),
            error: EvaluationError::new(code),
        }],
        evaluation: Vec::new(),
    }
}

#[tokio::test(start_paused = true)]
async fn edits_within_the_window_coalesce_into_one_request() {
    let seen: Arc<Mutex<Vec<usize>>> = Arc::default();
    let recorder = seen.clone();
    let validator = move |tree: WireNode| {
        let recorder = recorder.clone();
        async move {
            recorder.lock().await.push(tree.children.len());
            Ok::<_, ValidatorError>(ValidationResponse::default())
        }
    };
    let session = EditorSession::start(editor(), validator, config());

    for _ in 0..3 {
        session.apply(append()).await.unwrap();
        sleep(Duration::from_millis(100)).await;
    }
    assert!(seen.lock().await.is_empty());

    sleep(Duration::from_secs(1)).await;
    // One request, carrying the tree after the last edit
    assert_eq!(*seen.lock().await, [4]);

    let snapshot = session.snapshot().await;
    assert_eq!(snapshot.revision, Revision(3));
    assert_eq!(snapshot.status, ValidationStatus::Validated);
    assert!(snapshot.can_save);
    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn slow_reply_for_an_older_tree_loses() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let validator = move |_tree: WireNode| {
        let call = counter.fetch_add(1, Ordering::SeqCst);
        async move {
            if call == 0 {
                sleep(Duration::from_secs(2)).await;
                Ok::<_, ValidatorError>(error_at("root.children.1", ErrorCode::ListNotFound))
            } else {
                Ok(ValidationResponse::default())
            }
        }
    };
    let session = EditorSession::start(editor(), validator, config());
    let mut updates = session.updates();

    session.apply(append()).await.unwrap();
    sleep(Duration::from_millis(400)).await;
    session
        .apply(EditIntent::Remove {
            path: NodePath::root().child(0),
        })
        .await
        .unwrap();
    sleep(Duration::from_millis(400)).await;
    assert_eq!(session.read(|e| e.validation().server_revision()).await, Some(Revision(2)));

    // The first request completes now and must be dropped
    sleep(Duration::from_secs(3)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let snapshot = session.snapshot().await;
    assert_eq!(snapshot.status, ValidationStatus::Validated);
    assert!(session.view().await.errors_in_subtree().is_empty());
    assert!(snapshot.can_save);

    let events: Vec<SessionUpdate> = {
        let mut events = Vec::new();
        while let Some(Some(update)) = updates.next().now_or_never() {
            events.push(update);
        }
        events
    };
    assert_eq!(
        events,
        [
            SessionUpdate::Edited { revision: Revision(1) },
            SessionUpdate::ValidationStarted { revision: Revision(1) },
            SessionUpdate::Edited { revision: Revision(2) },
            SessionUpdate::ValidationStarted { revision: Revision(2) },
            SessionUpdate::Validated {
                revision: Revision(2),
                errors: 0
            },
        ]
    );
    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn transport_failure_keeps_last_known_errors() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let validator = move |_tree: WireNode| {
        let call = counter.fetch_add(1, Ordering::SeqCst);
        async move {
            match call {
                0 => Ok(error_at("root.children.0", ErrorCode::FormulaIncorrectReturnType)),
                1 => Err(ValidatorError::Transport("connection reset".into())),
                _ => Ok(ValidationResponse::default()),
            }
        }
    };
    let session = EditorSession::start(editor(), validator, config());
    let mut events = session.subscribe();

    session.revalidate();
    sleep(Duration::from_millis(400)).await;
    assert_eq!(session.snapshot().await.status, ValidationStatus::Validated);

    session.apply(append()).await.unwrap();
    sleep(Duration::from_millis(400)).await;

    let snapshot = session.snapshot().await;
    assert_eq!(snapshot.status, ValidationStatus::Failed);
    assert!(!snapshot.can_save);
    let view = session.view().await;
    assert_eq!(view.children[0].errors[0].code, ErrorCode::FormulaIncorrectReturnType);

    let mut failed = None;
    while let Ok(update) = events.try_recv() {
        if let SessionUpdate::ValidationFailed { revision, error } = update {
            failed = Some((revision, error));
        }
    }
    let (revision, error) = failed.expect("failure should be broadcast");
    assert_eq!(revision, Revision(1));
    assert!(error.contains("connection reset"));

    // Retrying recovers once the transport answers again
    session.revalidate();
    sleep(Duration::from_millis(400)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    let snapshot = session.snapshot().await;
    assert_eq!(snapshot.status, ValidationStatus::Validated);
    assert!(snapshot.can_save);
    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn slow_failure_for_an_older_tree_is_dropped() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let validator = move |_tree: WireNode| {
        let call = counter.fetch_add(1, Ordering::SeqCst);
        async move {
            if call == 0 {
                sleep(Duration::from_secs(2)).await;
                Err(ValidatorError::Transport("timed out".into()))
            } else {
                Ok(ValidationResponse::default())
            }
        }
    };
    let session = EditorSession::start(editor(), validator, config());
    let mut events = session.subscribe();

    session.apply(append()).await.unwrap();
    sleep(Duration::from_millis(400)).await;
    session.apply(append()).await.unwrap();
    sleep(Duration::from_millis(400)).await;
    assert_eq!(session.read(|e| e.validation().server_revision()).await, Some(Revision(2)));

    // The first request fails only now, after the second one was merged
    sleep(Duration::from_secs(3)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let snapshot = session.snapshot().await;
    assert_eq!(snapshot.status, ValidationStatus::Validated);
    assert!(snapshot.can_save);

    let mut updates = Vec::new();
    while let Ok(update) = events.try_recv() {
        updates.push(update);
    }
    assert!(
        !updates
            .iter()
            .any(|update| matches!(update, SessionUpdate::ValidationFailed { .. }))
    );
    assert_eq!(
        updates.last(),
        Some(&SessionUpdate::Validated {
            revision: Revision(2),
            errors: 0
        })
    );
    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn evaluation_errors_are_counted() {
    let validator = |_tree: WireNode| async {
        serde_json::from_value::<ValidationResponse>(serde_json::json!({
            "evaluation": [
                {"path": "root", "returnValue": false},
                {"path": "root.children.0", "errors": [{"error": "ARGUMENT_MUST_BE_BOOLEAN"}]}
            ]
        }))
        .map_err(|e| ValidatorError::BadResponse(e.to_string()))
    };
    let session = EditorSession::start(editor(), validator, config());
    let mut events = session.subscribe();

    session.revalidate();
    sleep(Duration::from_millis(400)).await;

    let mut validated = None;
    while let Ok(update) = events.try_recv() {
        if let SessionUpdate::Validated { errors, .. } = update {
            validated = Some(errors);
        }
    }
    assert_eq!(validated, Some(1));
    assert!(!session.snapshot().await.can_save);
    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn view_mode_session_rejects_edits() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let validator = move |_tree: WireNode| {
        counter.fetch_add(1, Ordering::SeqCst);
        async { Ok::<_, ValidatorError>(ValidationResponse::default()) }
    };
    let editor = Editor::new(
        Node::n_ary(AND, vec![amount_check()]),
        EditorConfig::new()
            .with_root_kind(RootKind::Trigger)
            .with_mode(EditorMode::View),
    );
    let session = EditorSession::start(editor, validator, config());

    let err = session.apply(append()).await.unwrap_err();
    assert!(matches!(err, EditError::ReadOnly));
    assert!(session.offered(&NodePath::root()).await.is_empty());

    sleep(Duration::from_secs(1)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(session.snapshot().await.revision, Revision(0));
    session.shutdown().await;
}
