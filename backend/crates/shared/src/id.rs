//! Typed Identifiers
//!
//! UUID-backed ids that carry a marker type, so a user id can never be passed
//! where an activity entry id is expected.

use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;
use uuid::Uuid;

/// Generic typed ID wrapper
///
/// ```
/// use kernel::id::{Id, markers};
/// type UserId = Id<markers::User>;
/// let id = UserId::new();
/// assert_eq!(id.as_uuid().get_version_num(), 4);
/// ```
pub struct Id<T> {
    value: Uuid,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Id<T> {
    /// Create a new random ID (UUID v4)
    pub fn new() -> Self {
        Self::from_uuid(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self {
            value: uuid,
            _marker: PhantomData,
        }
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.value
    }

    pub fn into_uuid(self) -> Uuid {
        self.value
    }
}

// Manual impls: deriving would put bounds on the marker type.
impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Id<T> {}

impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T> Eq for Id<T> {}

impl<T> std::hash::Hash for Id<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl<T> Default for Id<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", self.value)
    }
}

impl<T> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl<T> FromStr for Id<T> {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self::from_uuid)
    }
}

impl<T> From<Uuid> for Id<T> {
    fn from(uuid: Uuid) -> Self {
        Self::from_uuid(uuid)
    }
}

impl<T> From<Id<T>> for Uuid {
    fn from(id: Id<T>) -> Self {
        id.value
    }
}

/// Marker types for entity IDs
pub mod markers {
    /// Household member account
    pub struct User;

    /// Row in the activity (audit) log
    pub struct ActivityEntry;
}

pub type UserId = Id<markers::User>;
pub type ActivityEntryId = Id<markers::ActivityEntry>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_ids_are_v4_and_distinct() {
        let a = UserId::new();
        let b = UserId::new();
        assert_eq!(a.as_uuid().get_version_num(), 4);
        assert_ne!(a, b);
    }

    #[test]
    fn test_from_str() {
        let uuid = Uuid::new_v4();
        let id: UserId = uuid.to_string().parse().unwrap();
        assert_eq!(id.into_uuid(), uuid);
        assert!("not-a-uuid".parse::<ActivityEntryId>().is_err());
    }

    #[test]
    fn test_copy_without_marker_bounds() {
        let id = UserId::new();
        let copy = id;
        assert_eq!(id, copy);
    }
}
