//! Error types for Vigil.

use crate::entity::EntityId;
use crate::NodeId;
use alloc::string::String;
use core::fmt;

/// Result type alias for Vigil operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Error types for entity and query operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// Mutation or removal of an entity that does not exist.
    UnknownEntity {
        id: EntityId,
    },
    /// A node handle with no materialized source behind it.
    UnattachedQuery {
        node: NodeId,
    },
    /// A predicate failed while being evaluated for an entity.
    PredicateFailure {
        node: NodeId,
        entity: EntityId,
        message: String,
    },
    /// Invalid operation.
    InvalidOperation {
        message: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnknownEntity { id } => {
                write!(f, "Unknown entity: {}", id)
            }
            Error::UnattachedQuery { node } => {
                write!(f, "Query node {} is not attached to this graph", node)
            }
            Error::PredicateFailure {
                node,
                entity,
                message,
            } => {
                write!(
                    f,
                    "Predicate of node {} failed for entity {}: {}",
                    node, entity, message
                )
            }
            Error::InvalidOperation { message } => {
                write!(f, "Invalid operation: {}", message)
            }
        }
    }
}

impl Error {
    /// Creates an unknown entity error.
    pub fn unknown_entity(id: EntityId) -> Self {
        Error::UnknownEntity { id }
    }

    /// Creates an unattached query error.
    pub fn unattached_query(node: NodeId) -> Self {
        Error::UnattachedQuery { node }
    }

    /// Creates a predicate failure error.
    pub fn predicate_failure(node: NodeId, entity: EntityId, message: impl Into<String>) -> Self {
        Error::PredicateFailure {
            node,
            entity,
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Error::InvalidOperation {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn test_error_display() {
        let err = Error::unknown_entity(7);
        assert!(err.to_string().contains("Unknown entity: 7"));

        let err = Error::unattached_query(3);
        assert!(err.to_string().contains("node 3"));

        let err = Error::predicate_failure(2, 9, "boom");
        let text = err.to_string();
        assert!(text.contains("node 2"));
        assert!(text.contains("entity 9"));
        assert!(text.contains("boom"));
    }

    #[test]
    fn test_error_constructors() {
        let err = Error::invalid_operation("compose needs two inputs");
        match err {
            Error::InvalidOperation { message } => assert_eq!(message, "compose needs two inputs"),
            _ => panic!("Wrong error type"),
        }
    }
}
