//! Permission identifiers and ordered permission sets.

use std::fmt;

use serde::{Deserialize, Serialize};

/// An opaque platform permission identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(String);

impl Permission {
    /// Create a permission from its platform identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Camera capture.
    pub fn camera() -> Self {
        Self::new("android.permission.CAMERA")
    }

    /// Microphone capture.
    pub fn record_audio() -> Self {
        Self::new("android.permission.RECORD_AUDIO")
    }

    /// The platform identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Dotted platform ids are displayed by their last segment.
        let short = self.0.rsplit('.').next().unwrap_or(&self.0);
        f.write_str(short)
    }
}

impl From<&str> for Permission {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Insertion-ordered set of permissions.
///
/// Inserting a permission twice keeps the first occurrence, so a set never
/// leads to duplicate platform requests.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Permission>", into = "Vec<Permission>")]
pub struct PermissionSet {
    items: Vec<Permission>,
}

impl PermissionSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a permission. Returns false if it was already present.
    pub fn insert(&mut self, permission: Permission) -> bool {
        if self.contains(&permission) {
            return false;
        }
        self.items.push(permission);
        true
    }

    /// Insert every permission of another set.
    pub fn extend_from(&mut self, other: &PermissionSet) {
        for permission in other.iter() {
            self.insert(permission.clone());
        }
    }

    /// Whether the set contains the permission.
    pub fn contains(&self, permission: &Permission) -> bool {
        self.items.contains(permission)
    }

    /// Number of permissions.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterate in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Permission> {
        self.items.iter()
    }

    /// The subset matching a predicate, order preserved.
    pub fn filter(&self, mut predicate: impl FnMut(&Permission) -> bool) -> Self {
        self.items
            .iter()
            .filter(|permission| predicate(permission))
            .cloned()
            .collect()
    }

    /// Permissions in `self` that are not in `other`.
    pub fn difference(&self, other: &PermissionSet) -> Self {
        self.filter(|permission| !other.contains(permission))
    }
}

impl PartialEq for PermissionSet {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|permission| other.contains(permission))
    }
}

impl Eq for PermissionSet {}

impl FromIterator<Permission> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self {
        let mut set = Self::new();
        for permission in iter {
            set.insert(permission);
        }
        set
    }
}

impl IntoIterator for PermissionSet {
    type Item = Permission;
    type IntoIter = std::vec::IntoIter<Permission>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl From<Vec<Permission>> for PermissionSet {
    fn from(items: Vec<Permission>) -> Self {
        items.into_iter().collect()
    }
}

impl From<PermissionSet> for Vec<Permission> {
    fn from(set: PermissionSet) -> Self {
        set.items
    }
}

impl fmt::Display for PermissionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, permission) in self.items.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{permission}")?;
        }
        f.write_str("]")
    }
}
