use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// The three kinds of artifact store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreType {
    /// Writable, locally-originated content. No upstream.
    Hosted,
    /// Read-through proxy over an upstream URL.
    Remote,
    /// Virtual store defined as an ordered list of constituents.
    Group,
}

impl StoreType {
    /// Lowercase string form, as used in serialized keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hosted => "hosted",
            Self::Remote => "remote",
            Self::Group => "group",
        }
    }
}

impl fmt::Display for StoreType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hosted" => Ok(Self::Hosted),
            "remote" => Ok(Self::Remote),
            "group" => Ok(Self::Group),
            other => Err(ModelError::UnknownStoreType(other.to_string())),
        }
    }
}

/// Identity of an artifact store: `(package_type, store_type, name)`.
///
/// A `StoreKey` is the universal map key of the system. It is immutable
/// once a store is created, compares and orders over all three fields,
/// and serializes to `packageType:storeType:name`.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StoreKey {
    /// Package ecosystem this store serves (e.g. `maven`, `npm`, `generic`).
    pub package_type: String,
    /// Which kind of store this key names.
    pub store_type: StoreType,
    /// Store name, unique within `(package_type, store_type)`.
    pub name: String,
}

impl StoreKey {
    /// Create a key from its three parts.
    pub fn new(
        package_type: impl Into<String>,
        store_type: StoreType,
        name: impl Into<String>,
    ) -> Self {
        Self {
            package_type: package_type.into(),
            store_type,
            name: name.into(),
        }
    }

    /// Shorthand for a hosted-store key.
    pub fn hosted(package_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(package_type, StoreType::Hosted, name)
    }

    /// Shorthand for a remote-store key.
    pub fn remote(package_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(package_type, StoreType::Remote, name)
    }

    /// Shorthand for a group-store key.
    pub fn group(package_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(package_type, StoreType::Group, name)
    }

    /// Returns `true` if this key names a group store.
    pub fn is_group(&self) -> bool {
        self.store_type == StoreType::Group
    }
}

impl fmt::Debug for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StoreKey({self})")
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.package_type, self.store_type, self.name)
    }
}

impl FromStr for StoreKey {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');
        let (package_type, store_type, name) = match (parts.next(), parts.next(), parts.next()) {
            (Some(p), Some(t), Some(n)) if !p.is_empty() && !n.is_empty() => (p, t, n),
            _ => return Err(ModelError::InvalidStoreKey(s.to_string())),
        };
        Ok(Self {
            package_type: package_type.to_string(),
            store_type: store_type.parse()?,
            name: name.to_string(),
        })
    }
}
