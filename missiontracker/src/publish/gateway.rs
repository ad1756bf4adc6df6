//! Remote write boundary.
//!
//! The document store is an external collaborator. The engine only needs
//! "apply this mutation, tell me whether it worked", which is what
//! [`WriteGateway`] expresses.

use serde_json::{json, Value};
use thiserror::Error;

use crate::flight::BoxFuture;
use crate::geo::GeoPoint;

/// Default shared locations document.
pub const DEFAULT_LOCATIONS_DOCUMENT: &str = "missiondata/locations";

/// Default field holding the team position in the shared document.
pub const DEFAULT_TEAM_FIELD: &str = "team";

/// Default collection holding one document per team member.
pub const DEFAULT_MEMBERS_COLLECTION: &str = "missiondata/locations/team_members";

/// Errors reported by a write gateway.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GatewayError {
    /// The backend could not be reached.
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// A field update targeted a document that does not exist.
    #[error("Document not found: {path}")]
    NotFound { path: String },

    /// The caller is not allowed to write the document.
    #[error("Permission denied: {path}")]
    PermissionDenied { path: String },
}

/// How a write changes the target document.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteKind {
    /// Update a single field of an existing document.
    UpdateField { field: String, value: Value },
    /// Replace (or create) the whole document.
    Set(Value),
}

/// A single document mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentWrite {
    /// Slash-separated document path.
    pub path: String,
    /// The mutation to apply.
    pub kind: WriteKind,
}

/// Applies document mutations against the remote store.
///
/// Implementations must be `Send + Sync`; the publisher calls them from its
/// own task and awaits one write at a time.
pub trait WriteGateway: Send + Sync {
    /// Apply `write`, resolving once the backend has acknowledged or rejected it.
    fn write(&self, write: DocumentWrite) -> BoxFuture<'_, Result<(), GatewayError>>;
}

/// Where positions are published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishTarget {
    /// One field of a shared document (the team position seen by command).
    SharedField { document: String, field: String },
    /// One document per member, keyed by the member's identity.
    MemberDocument { collection: String },
}

impl Default for PublishTarget {
    fn default() -> Self {
        PublishTarget::SharedField {
            document: DEFAULT_LOCATIONS_DOCUMENT.to_string(),
            field: DEFAULT_TEAM_FIELD.to_string(),
        }
    }
}

impl PublishTarget {
    /// Member-document target on the default collection.
    pub fn member_default() -> Self {
        PublishTarget::MemberDocument {
            collection: DEFAULT_MEMBERS_COLLECTION.to_string(),
        }
    }

    /// Whether writes need a caller identity.
    pub fn requires_identity(&self) -> bool {
        matches!(self, PublishTarget::MemberDocument { .. })
    }

    /// Build the mutation publishing `location`.
    ///
    /// Returns `None` if the target needs an identity and none is known.
    pub fn mutation(&self, location: GeoPoint, identity: Option<&str>) -> Option<DocumentWrite> {
        let point = json!({
            "latitude": location.latitude,
            "longitude": location.longitude,
        });

        match self {
            PublishTarget::SharedField { document, field } => Some(DocumentWrite {
                path: document.clone(),
                kind: WriteKind::UpdateField {
                    field: field.clone(),
                    value: point,
                },
            }),
            PublishTarget::MemberDocument { collection } => {
                let identity = identity?;
                Some(DocumentWrite {
                    path: format!("{}/{}", collection, identity),
                    kind: WriteKind::Set(json!({ "location": point })),
                })
            }
        }
    }
}
