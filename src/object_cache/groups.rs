//! Group registry: which groups are global and which never leave the process.

/// Group used when a caller passes an empty group name.
pub const DEFAULT_GROUP: &str = "default";

/// Bookkeeping group holding per-site flush numbers.
pub const FLUSH_GROUP: &str = "ObjectCache";

/// Bookkeeping group holding the network-wide flush number.
pub const GLOBAL_FLUSH_GROUP: &str = "ObjectCache_global";

/// Key under which a scope's flush number is stored.
pub const FLUSH_KEY: &str = "flush_nr_v1";

/// Whether a group shares keys across every site of the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupScope {
    Global,
    Site,
}

/// Whether a group's entries reach the remote tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persistence {
    Persistent,
    NonPersistent,
}

/// The two registration flags of a group, resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupKind {
    pub scope: GroupScope,
    pub persistence: Persistence,
}

impl GroupKind {
    pub fn is_global(&self) -> bool {
        self.scope == GroupScope::Global
    }

    pub fn is_persistent(&self) -> bool {
        self.persistence == Persistence::Persistent
    }
}

/// Normalizes an empty group name to [`DEFAULT_GROUP`].
pub fn group_name(group: &str) -> &str {
    if group.is_empty() {
        DEFAULT_GROUP
    } else {
        group
    }
}

/// True for the groups that store flush numbers themselves.
pub fn is_flush_group(group: &str) -> bool {
    group == FLUSH_GROUP || group == GLOBAL_FLUSH_GROUP
}

// == Group Registry ==
/// Append-only sets of global and non-persistent group names.
///
/// Registering a group as non-persistent always wins: nothing can make it
/// persistent again for the lifetime of the registry.
#[derive(Debug, Clone)]
pub struct GroupRegistry {
    global: Vec<String>,
    non_persistent: Vec<String>,
}

impl GroupRegistry {
    pub fn new() -> Self {
        Self {
            global: vec![GLOBAL_FLUSH_GROUP.to_string()],
            non_persistent: Vec::new(),
        }
    }

    /// Adds groups to the global set, skipping ones already present.
    pub fn add_global<I, S>(&mut self, groups: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        merge_unique(&mut self.global, groups);
    }

    /// Adds groups to the non-persistent set, skipping ones already present.
    pub fn add_non_persistent<I, S>(&mut self, groups: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        merge_unique(&mut self.non_persistent, groups);
    }

    pub fn is_global(&self, group: &str) -> bool {
        self.global.iter().any(|g| g == group)
    }

    pub fn is_non_persistent(&self, group: &str) -> bool {
        // Flush numbers must always be shared between processes.
        !is_flush_group(group) && self.non_persistent.iter().any(|g| g == group)
    }

    pub fn kind(&self, group: &str) -> GroupKind {
        GroupKind {
            scope: if self.is_global(group) {
                GroupScope::Global
            } else {
                GroupScope::Site
            },
            persistence: if self.is_non_persistent(group) {
                Persistence::NonPersistent
            } else {
                Persistence::Persistent
            },
        }
    }

    pub fn global_groups(&self) -> &[String] {
        &self.global
    }

    pub fn non_persistent_groups(&self) -> &[String] {
        &self.non_persistent
    }
}

impl Default for GroupRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn merge_unique<I, S>(target: &mut Vec<String>, groups: I)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    for group in groups {
        let group = group.as_ref();
        if !target.iter().any(|g| g == group) {
            target.push(group.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_flush_group_is_registered_global() {
        let registry = GroupRegistry::new();
        assert!(registry.is_global(GLOBAL_FLUSH_GROUP));
        assert!(!registry.is_global(FLUSH_GROUP));
    }

    #[test]
    fn test_add_global_groups_single_and_many() {
        let mut registry = GroupRegistry::new();
        registry.add_global(["users"]);
        registry.add_global(vec!["site-options".to_string(), "networks".to_string()]);

        assert!(registry.is_global("users"));
        assert!(registry.is_global("networks"));
        assert_eq!(registry.global_groups().len(), 4);
    }

    #[test]
    fn test_add_groups_does_not_allow_duplicates() {
        let mut registry = GroupRegistry::new();
        registry.add_global(["users", "users"]);
        registry.add_global(["users"]);
        registry.add_non_persistent(["counts", "counts"]);
        registry.add_non_persistent(["counts"]);

        assert_eq!(registry.global_groups(), [GLOBAL_FLUSH_GROUP, "users"]);
        assert_eq!(registry.non_persistent_groups(), ["counts"]);
    }

    #[test]
    fn test_group_kind_combinations() {
        let mut registry = GroupRegistry::new();
        registry.add_global(["g", "g-np"]);
        registry.add_non_persistent(["np", "g-np"]);

        assert_eq!(
            registry.kind("g-np"),
            GroupKind {
                scope: GroupScope::Global,
                persistence: Persistence::NonPersistent
            }
        );
        assert!(registry.kind("g").is_persistent());
        assert!(!registry.kind("np").is_global());
        assert!(!registry.kind("np").is_persistent());
        assert!(registry.kind("plain").is_persistent());
    }

    #[test]
    fn test_flush_groups_stay_persistent() {
        let mut registry = GroupRegistry::new();
        registry.add_non_persistent([FLUSH_GROUP, GLOBAL_FLUSH_GROUP]);
        assert!(registry.kind(FLUSH_GROUP).is_persistent());
        assert!(registry.kind(GLOBAL_FLUSH_GROUP).is_persistent());
    }

    #[test]
    fn test_group_name_defaults() {
        assert_eq!(group_name(""), DEFAULT_GROUP);
        assert_eq!(group_name("posts"), "posts");
    }
}
