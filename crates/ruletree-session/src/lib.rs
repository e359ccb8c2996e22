//! ruletree-session - asynchronous editing session for rule trees
//!
//! Wraps a [`ruletree::Editor`] with debounced server revalidation:
//!
//! ```ignore
//! use ruletree_session::{EditorSession, SessionConfig};
//!
//! let session = EditorSession::start(editor, validator, SessionConfig::default());
//! session.apply(intent).await?;
//!
//! let mut updates = session.updates();
//! while let Some(update) = updates.next().await {
//!     // re-render from session.view().await
//! }
//! ```
//!
//! Edits land in the tree immediately and in order. Validation requests
//! are coalesced over the debounce window, and responses for trees older
//! than the merged one are dropped.

pub mod session;
pub mod validator;

#[cfg(feature = "http")]
pub mod http;

pub use session::{EditorSession, SessionConfig, SessionSnapshot, SessionUpdate};
pub use validator::{ValidationFuture, Validator, ValidatorError};

#[cfg(feature = "http")]
pub use http::{HttpValidator, HttpValidatorConfig};
