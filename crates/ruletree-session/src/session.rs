//! Editor session with debounced server revalidation
//!
//! The session owns one [`Editor`] behind a lock. Edits apply immediately
//! and in order; each successful edit nudges a debouncer task, which sends
//! the latest tree to the [`Validator`] once the debounce window has passed
//! without further edits. Responses are merged by revision, so a slow reply
//! for an older tree never overwrites a newer one.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use futures::stream::BoxStream;
use log::{debug, info, warn};
use ruletree::classify::Layout;
use ruletree::editor::IntentKind;
use ruletree::{EditError, EditIntent, Editor, Node, NodePath, Revision, ValidationStatus, ViewNode};
use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::BroadcastStream;

use crate::validator::Validator;

const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);
const UPDATE_CAPACITY: usize = 64;

// ============ Configuration ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Quiet period after the last edit before a validation request goes out
    #[serde(rename = "debounce_ms", with = "millis")]
    pub debounce: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }
}

/// Durations as integer milliseconds
pub(crate) mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

// ============ Updates ============

/// Session event broadcast to subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate {
    /// An edit was applied; the tree is now at `revision`
    Edited { revision: Revision },
    /// The tree at `revision` was sent to the validator
    ValidationStarted { revision: Revision },
    /// Server annotations for `revision` were merged
    Validated { revision: Revision, errors: usize },
    /// The request for `revision` failed; earlier annotations are kept
    ValidationFailed { revision: Revision, error: String },
}

/// Point-in-time summary of the session
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub root: Arc<Node>,
    pub revision: Revision,
    pub status: ValidationStatus,
    pub can_save: bool,
}

// ============ Session ============

struct Shared {
    editor: RwLock<Editor>,
    update_tx: broadcast::Sender<SessionUpdate>,
}

impl Shared {
    fn notify(&self, update: SessionUpdate) {
        // No subscribers is fine
        let _ = self.update_tx.send(update);
    }
}

pub struct EditorSession {
    shared: Arc<Shared>,
    trigger_tx: mpsc::UnboundedSender<()>,
    debouncer: JoinHandle<()>,
}

impl EditorSession {
    /// Start a session over `editor`. Must be called inside a tokio runtime.
    pub fn start(editor: Editor, validator: impl Validator, config: SessionConfig) -> Self {
        let (update_tx, _) = broadcast::channel(UPDATE_CAPACITY);
        let (trigger_tx, trigger_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            editor: RwLock::new(editor),
            update_tx,
        });

        info!("Editor session started (debounce {:?})", config.debounce);
        let debouncer = tokio::spawn(run_debouncer(
            shared.clone(),
            Arc::new(validator),
            trigger_rx,
            config.debounce,
        ));

        Self {
            shared,
            trigger_tx,
            debouncer,
        }
    }

    /// Apply one edit and schedule revalidation
    pub async fn apply(&self, intent: EditIntent) -> Result<Revision, EditError> {
        let revision = self.shared.editor.write().await.apply(intent)?;
        self.shared.notify(SessionUpdate::Edited { revision });
        self.schedule();
        Ok(revision)
    }

    /// Replace the whole tree and schedule revalidation
    pub async fn load(&self, root: Arc<Node>) -> Revision {
        let revision = self.shared.editor.write().await.load(root);
        self.shared.notify(SessionUpdate::Edited { revision });
        self.schedule();
        revision
    }

    /// Ask for a validation of the current tree, e.g. after a transport failure
    pub fn revalidate(&self) {
        self.schedule();
    }

    pub async fn view(&self) -> ViewNode {
        self.shared.editor.read().await.view()
    }

    pub async fn layout(&self) -> Layout {
        self.shared.editor.read().await.layout()
    }

    /// Intents the editor offers for the node at `path`; empty in view mode
    pub async fn offered(&self, path: &NodePath) -> Vec<IntentKind> {
        let editor = self.shared.editor.read().await;
        editor
            .intents()
            .map(|intents| intents.offered(path))
            .unwrap_or_default()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let editor = self.shared.editor.read().await;
        SessionSnapshot {
            root: editor.root().clone(),
            revision: editor.revision(),
            status: editor.status(),
            can_save: editor.can_save(),
        }
    }

    /// Run `f` against the editor under the read lock
    pub async fn read<R>(&self, f: impl FnOnce(&Editor) -> R) -> R {
        f(&*self.shared.editor.read().await)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionUpdate> {
        self.shared.update_tx.subscribe()
    }

    /// Session events as a stream; lagged events are skipped
    pub fn updates(&self) -> BoxStream<'static, SessionUpdate> {
        BroadcastStream::new(self.subscribe())
            .filter_map(|update| async move { update.ok() })
            .boxed()
    }

    /// Stop the debouncer. Requests already in flight still merge.
    pub async fn shutdown(self) {
        let Self {
            trigger_tx,
            debouncer,
            ..
        } = self;
        drop(trigger_tx);
        if let Err(e) = debouncer.await {
            warn!("Debouncer task failed: {}", e);
        }
        info!("Editor session stopped");
    }

    fn schedule(&self) {
        if self.trigger_tx.send(()).is_err() {
            debug!("Revalidation requested after the debouncer stopped");
        }
    }
}

// ============ Debouncer ============

/// Trailing-edge debounce: every trigger restarts the window
async fn run_debouncer(
    shared: Arc<Shared>,
    validator: Arc<dyn Validator>,
    mut trigger_rx: mpsc::UnboundedReceiver<()>,
    debounce: Duration,
) {
    let mut pending = false;
    loop {
        tokio::select! {
            trigger = trigger_rx.recv() => match trigger {
                Some(()) => pending = true,
                None => break,
            },
            _ = tokio::time::sleep(debounce), if pending => {
                pending = false;
                dispatch(&shared, &validator).await;
            }
        }
    }
}

/// Send the current tree and merge the answer when it arrives
async fn dispatch(shared: &Arc<Shared>, validator: &Arc<dyn Validator>) {
    let (revision, request) = {
        let mut editor = shared.editor.write().await;
        (editor.revision(), editor.begin_validation())
    };
    let request = match request {
        Ok(request) => request,
        Err(e) => {
            warn!("Tree at {} cannot be sent for validation: {}", revision, e);
            shared.notify(SessionUpdate::ValidationFailed {
                revision,
                error: e.to_string(),
            });
            return;
        }
    };
    debug!("Validating tree at {}", revision);
    shared.notify(SessionUpdate::ValidationStarted { revision });

    let response = validator.validate(request.tree);
    let shared = shared.clone();
    tokio::spawn(async move {
        match response.await {
            Ok(response) => {
                let errors = response.annotations().error_count();
                let accepted = shared
                    .editor
                    .write()
                    .await
                    .accept_validation(revision, &response);
                if accepted {
                    shared.notify(SessionUpdate::Validated { revision, errors });
                }
            }
            Err(e) => {
                let recorded = shared.editor.write().await.validation_failed(revision);
                if !recorded {
                    debug!("Dropping failure of superseded request {}: {}", revision, e);
                    return;
                }
                warn!("Validation of {} failed: {}", revision, e);
                shared.notify(SessionUpdate::ValidationFailed {
                    revision,
                    error: e.to_string(),
                });
            }
        }
    });
}
