//! Server validation seam
//!
//! A [`Validator`] takes the serialized tree and eventually answers with
//! path-addressed errors and evaluations. The session never looks inside
//! the transport; any async closure of the right shape is a validator.

use std::future::Future;

use futures::future::BoxFuture;
use ruletree::{ValidationResponse, WireNode};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ValidatorError {
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Bad validator response: {0}")]
    BadResponse(String),
    #[cfg(feature = "http")]
    #[error("Validator returned HTTP {0}")]
    Status(u16),
    #[cfg(feature = "http")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type ValidationFuture = BoxFuture<'static, Result<ValidationResponse, ValidatorError>>;

/// Validates a full tree snapshot against the server
pub trait Validator: Send + Sync + 'static {
    fn validate(&self, tree: WireNode) -> ValidationFuture;
}

impl<F, Fut> Validator for F
where
    F: Fn(WireNode) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ValidationResponse, ValidatorError>> + Send + 'static,
{
    fn validate(&self, tree: WireNode) -> ValidationFuture {
        Box::pin(self(tree))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ruletree::names::GREATER;
    use ruletree::{Node, wire};

    #[tokio::test]
    async fn closures_are_validators() {
        let validator = |tree: WireNode| async move {
            if tree.name.as_deref() == Some(GREATER) {
                Ok(ValidationResponse::default())
            } else {
                Err(ValidatorError::BadResponse("unexpected root".into()))
            }
        };
        let boxed: Box<dyn Validator> = Box::new(validator);

        let tree = wire::to_wire(&Node::binary(GREATER, Node::payload("amount"), Node::constant(1))).unwrap();
        assert_eq!(boxed.validate(tree).await.unwrap(), ValidationResponse::default());

        let err = boxed.validate(wire::to_wire(&Node::undefined()).unwrap()).await.unwrap_err();
        assert!(matches!(err, ValidatorError::BadResponse(_)));
    }
}
