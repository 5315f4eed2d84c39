//! Error types for the entity store.

use ludus_protocol::ErrorKind;

/// Failures the store can signal. The three conditions are deliberately
/// distinct so callers can map them onto the wire taxonomy.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No entity with the given id (or unique field value) exists.
    #[error("{entity} {key} not found")]
    NotFound {
        entity: &'static str,
        key: String,
    },

    /// A unique field already holds this value.
    #[error("{entity} with {field} {value:?} already exists")]
    UniqueViolation {
        entity: &'static str,
        field: &'static str,
        value: String,
    },

    /// The entity's lock could not be acquired within the bounded timeout.
    #[error("timed out waiting for the {entity} lock")]
    LockContended { entity: &'static str },
}

impl StoreError {
    pub(crate) fn not_found(entity: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    /// The wire error kind a broker failure reply should carry.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { entity, .. } => match *entity {
                "player" => ErrorKind::NoSuchPlayer,
                _ => ErrorKind::NoSuchRoom,
            },
            Self::UniqueViolation { .. } => ErrorKind::InputValidationError,
            Self::LockContended { .. } => ErrorKind::LockContended,
        }
    }
}
