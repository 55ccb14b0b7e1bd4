use serde::{Deserialize, Serialize};

/// A named persistence tier of the host store.
///
/// Each area has its own durability and visibility semantics:
///
/// - [`Local`](StorageArea::Local) — persisted on the local machine until the
///   owning application is removed. The default.
/// - [`Sync`](StorageArea::Sync) — synced through the user's account across
///   machines; quota limits apply.
/// - [`Managed`](StorageArea::Managed) — read-only policy configuration
///   provisioned by an administrator.
/// - [`Session`](StorageArea::Session) — kept only for the lifetime of the
///   host session.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageArea {
    Local,
    Sync,
    Managed,
    Session,
}

impl StorageArea {
    /// The host's name for this area.
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageArea::Local => "local",
            StorageArea::Sync => "sync",
            StorageArea::Managed => "managed",
            StorageArea::Session => "session",
        }
    }

    /// All areas, in declaration order.
    pub fn all() -> [StorageArea; 4] {
        [
            StorageArea::Local,
            StorageArea::Sync,
            StorageArea::Managed,
            StorageArea::Session,
        ]
    }
}

impl Default for StorageArea {
    fn default() -> Self {
        StorageArea::Local
    }
}

impl std::fmt::Display for StorageArea {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Access level for the [session area](StorageArea::Session).
///
/// Session storage is only visible to trusted contexts until a handle
/// escalates it for untrusted (content-script) contexts as well.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AccessLevel {
    /// Only trusted (application-page) contexts may read the area.
    TrustedContexts,
    /// Trusted and untrusted (content-script) contexts may read the area.
    TrustedAndUntrustedContexts,
}

impl AccessLevel {
    /// The host's wire name for this level.
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessLevel::TrustedContexts => "TRUSTED_CONTEXTS",
            AccessLevel::TrustedAndUntrustedContexts => "TRUSTED_AND_UNTRUSTED_CONTEXTS",
        }
    }
}

impl std::fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
