//! Permission values and the matching rules applied to them.
//!
//! The permission space is open: any string names a permission. Structure
//! comes from the rendered form `subsystem:module:action`, and matching is
//! exact string identity, never wildcard or hierarchy expansion.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Unique identifier for a registered permission row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PermissionId(i64);

impl PermissionId {
    /// Creates a permission identifier from a storage value.
    #[must_use]
    pub fn from_i64(value: i64) -> Self {
        Self(value)
    }

    /// Returns the underlying integer value.
    #[must_use]
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for PermissionId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// A permission triple rendered as `subsystem:module:action`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(String);

impl Permission {
    /// Creates a permission from its rendered form.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Splits the rendered form into subsystem, module and action.
    ///
    /// Shorter values degrade from the left: the empty permission is three
    /// empty segments, a single segment is an action, two segments are module
    /// and action. Segments past the third are dropped.
    #[must_use]
    pub fn split(&self) -> (&str, &str, &str) {
        if self.0.is_empty() {
            return ("", "", "");
        }

        let parts: Vec<&str> = self.0.split(':').collect();
        match parts.len() {
            1 => ("", "", parts[0]),
            2 => ("", parts[0], parts[1]),
            _ => (parts[0], parts[1], parts[2]),
        }
    }

    /// Returns the subsystem segment.
    #[must_use]
    pub fn subsystem(&self) -> &str {
        self.split().0
    }

    /// Returns the module segment.
    #[must_use]
    pub fn module(&self) -> &str {
        self.split().1
    }

    /// Returns the action segment.
    #[must_use]
    pub fn action(&self) -> &str {
        self.split().2
    }

    /// Returns the rendered form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl AsRef<str> for Permission {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl From<&str> for Permission {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for Permission {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Display for Permission {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// The permissions held by an actor or offered for matching.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permissions(Vec<Permission>);

impl Permissions {
    /// Creates a set from already constructed permissions.
    #[must_use]
    pub fn new(values: Vec<Permission>) -> Self {
        Self(values)
    }

    /// Creates a set from rendered permission strings.
    pub fn from_strings<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(values.into_iter().map(Permission::new).collect())
    }

    /// Returns true when any candidate matches a held permission exactly.
    ///
    /// An empty candidate list never matches, even against a non-empty set.
    #[must_use]
    pub fn contains_any<C: AsRef<str>>(&self, candidates: &[C]) -> bool {
        self.0.iter().any(|held| {
            candidates
                .iter()
                .any(|candidate| held.as_str() == candidate.as_ref())
        })
    }

    /// Returns the number of held permissions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true when no permissions are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the held permissions.
    pub fn iter(&self) -> std::slice::Iter<'_, Permission> {
        self.0.iter()
    }

    /// Appends a permission to the set.
    pub fn push(&mut self, permission: Permission) {
        self.0.push(permission);
    }
}

impl From<&str> for Permissions {
    /// Parses the comma-joined rendering. Empty chunks are skipped, so the
    /// empty string parses into the empty set.
    fn from(value: &str) -> Self {
        Self(
            value
                .split(',')
                .filter(|chunk| !chunk.is_empty())
                .map(Permission::from)
                .collect(),
        )
    }
}

impl Display for Permissions {
    /// Renders the set as a comma-joined list.
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        let joined = self
            .0
            .iter()
            .map(Permission::as_str)
            .collect::<Vec<_>>()
            .join(",");
        write!(formatter, "{joined}")
    }
}

impl FromIterator<Permission> for Permissions {
    fn from_iter<I: IntoIterator<Item = Permission>>(values: I) -> Self {
        Self(values.into_iter().collect())
    }
}

impl IntoIterator for Permissions {
    type Item = Permission;
    type IntoIter = std::vec::IntoIter<Permission>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Permissions {
    type Item = &'a Permission;
    type IntoIter = std::slice::Iter<'a, Permission>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::{Permission, Permissions};

    #[test]
    fn empty_permission_splits_into_empty_segments() {
        assert_eq!(Permission::new("").split(), ("", "", ""));
    }

    #[test]
    fn single_segment_is_an_action() {
        assert_eq!(Permission::new("delete").split(), ("", "", "delete"));
    }

    #[test]
    fn two_segments_are_module_and_action() {
        assert_eq!(Permission::new("user:delete").split(), ("", "user", "delete"));
    }

    #[test]
    fn three_segments_fill_the_triple() {
        let permission = Permission::new("gateward:user:can create");
        assert_eq!(permission.subsystem(), "gateward");
        assert_eq!(permission.module(), "user");
        assert_eq!(permission.action(), "can create");
    }

    #[test]
    fn segments_past_the_third_are_dropped() {
        assert_eq!(Permission::new("a:b:c:d").split(), ("a", "b", "c"));
    }

    #[test]
    fn empty_candidates_never_match() {
        let held = Permissions::from_strings(["gateward:user:can create"]);
        let candidates: [&str; 0] = [];
        assert!(!held.contains_any(&candidates));
    }

    #[test]
    fn empty_set_never_matches() {
        let held = Permissions::default();
        assert!(!held.contains_any(&["gateward:user:can create"]));
    }

    #[test]
    fn matching_is_exact_identity() {
        let held = Permissions::from_strings(["gateward:user:can create"]);
        assert!(held.contains_any(&["gateward:user:can create"]));
        assert!(!held.contains_any(&["gateward:user:can create staff"]));
        assert!(!held.contains_any(&["gateward:user"]));
    }

    #[test]
    fn any_candidate_suffices() {
        let held = Permissions::from_strings(["a:b:c", "d:e:f"]);
        assert!(held.contains_any(&["x:y:z", "d:e:f"]));
    }

    #[test]
    fn renders_comma_joined() {
        let held = Permissions::from_strings(["a:b:c", "d:e:f"]);
        assert_eq!(held.to_string(), "a:b:c,d:e:f");
    }

    #[test]
    fn parses_comma_joined_rendering() {
        let held = Permissions::from("a:b:c,d:e:f");
        assert_eq!(held.len(), 2);
        assert!(held.contains_any(&["a:b:c"]));
        assert!(held.contains_any(&["d:e:f"]));
    }

    #[test]
    fn empty_rendering_parses_into_empty_set() {
        assert!(Permissions::from("").is_empty());
    }

    #[test]
    fn serializes_as_a_plain_json_string() {
        let permission = Permission::new("gateward:user:can create");
        let encoded = serde_json::to_string(&permission);
        assert_eq!(encoded.ok().as_deref(), Some("\"gateward:user:can create\""));
    }

    proptest! {
        #[test]
        fn colon_free_segments_split_losslessly(
            subsystem in "[a-z ]{1,12}",
            module in "[a-z ]{1,12}",
            action in "[a-z ]{1,12}",
        ) {
            let permission = Permission::new(format!("{subsystem}:{module}:{action}"));
            prop_assert_eq!(
                permission.split(),
                (subsystem.as_str(), module.as_str(), action.as_str())
            );
        }

        #[test]
        fn split_never_panics(value in ".*") {
            let _ = Permission::new(value).split();
        }
    }
}
