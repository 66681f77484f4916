//! Resource identity and the managed-resource seam.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Identity of a platform object: a name plus an optional namespace.
///
/// Identity is what makes a resource unique within a batch; two descriptors
/// with the same name and namespace refer to the same remote object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceId {
    pub name: String,
    pub namespace: Option<String>,
}

impl ResourceId {
    /// Cluster-scoped identity (no namespace).
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
        }
    }

    /// Namespaced identity.
    pub fn namespaced(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: Some(namespace.into()),
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(namespace) => write!(f, "{}/{}", namespace, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Status token a resource reports, e.g. `Active` or `Running`.
///
/// The harness never interprets the token beyond equality with a wait
/// target; the set of meaningful values belongs to the implementation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceStatus(String);

impl ResourceStatus {
    pub fn new(status: impl Into<String>) -> Self {
        Self(status.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ResourceStatus {
    fn from(status: &str) -> Self {
        Self(status.to_string())
    }
}

impl From<ResourceStatus> for String {
    fn from(status: ResourceStatus) -> Self {
        status.0
    }
}

/// Errors surfaced by resource operations against the platform API.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ResourceError {
    /// The API rejected or failed the request.
    #[error("api request for {id} failed: {message}")]
    Api { id: ResourceId, message: String },

    /// The remote object does not exist.
    #[error("resource {0} not found")]
    NotFound(ResourceId),

    /// Creation collided with an existing object of the same identity.
    #[error("resource {0} already exists")]
    AlreadyExists(ResourceId),
}

/// A platform object the harness can create, observe and delete in bulk.
///
/// Implementations wrap the real platform client (namespaces, quota
/// requests, virtual machines). The engine drives fleets of these through
/// their lifecycle; it never talks to an API server directly.
#[async_trait]
pub trait ManagedResource: Send + Sync {
    /// Identity, unique within a batch.
    fn id(&self) -> ResourceId;

    /// Human-readable kind for logs and diagnostics, e.g. `"VirtualMachine"`.
    fn kind(&self) -> &str;

    /// Create the remote object.
    async fn create(&self) -> Result<(), ResourceError>;

    /// Current status token. `Ok(None)` means the object exists but has not
    /// reported a status yet; an absent object is `Err(NotFound)`.
    async fn current_status(&self) -> Result<Option<ResourceStatus>, ResourceError>;

    /// Delete the remote object.
    async fn delete(&self) -> Result<(), ResourceError>;

    /// Whether the remote object currently exists.
    async fn exists(&self) -> Result<bool, ResourceError> {
        match self.current_status().await {
            Ok(_) => Ok(true),
            Err(ResourceError::NotFound(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StatusOnly(Option<ResourceStatus>, bool);

    #[async_trait]
    impl ManagedResource for StatusOnly {
        fn id(&self) -> ResourceId {
            ResourceId::new("status-only")
        }

        fn kind(&self) -> &str {
            "Test"
        }

        async fn create(&self) -> Result<(), ResourceError> {
            Ok(())
        }

        async fn current_status(&self) -> Result<Option<ResourceStatus>, ResourceError> {
            if self.1 {
                Err(ResourceError::NotFound(self.id()))
            } else {
                Ok(self.0.clone())
            }
        }

        async fn delete(&self) -> Result<(), ResourceError> {
            Ok(())
        }
    }

    #[test]
    fn display_includes_namespace_when_present() {
        let namespaced = ResourceId::namespaced("vm-0001", "scale-test");
        assert_eq!(namespaced.to_string(), "scale-test/vm-0001");

        let cluster_scoped = ResourceId::new("quota-project");
        assert_eq!(cluster_scoped.to_string(), "quota-project");
    }

    #[test]
    fn identity_is_name_plus_namespace() {
        let a = ResourceId::namespaced("vm", "ns-a");
        let b = ResourceId::namespaced("vm", "ns-b");
        let c = ResourceId::namespaced("vm", "ns-a");
        assert_ne!(a, b);
        assert_eq!(a, c);
    }

    #[tokio::test]
    async fn exists_derives_from_status() {
        let present = StatusOnly(Some(ResourceStatus::from("Running")), false);
        assert!(present.exists().await.unwrap());

        let no_status_yet = StatusOnly(None, false);
        assert!(no_status_yet.exists().await.unwrap());

        let absent = StatusOnly(None, true);
        assert!(!absent.exists().await.unwrap());
    }
}
