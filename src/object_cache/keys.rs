//! Key construction.
//!
//! A fully-qualified key is
//! `{prefix}:{flush prefix}{salt}{group}:{raw key}` with all whitespace
//! removed, where the prefix is the global or site prefix of the group and
//! the flush prefix is `{epoch}:` (or `_:` for the bookkeeping groups).

/// Flush prefix of the bookkeeping groups, which cannot be versioned by the
/// number they store.
pub const UNVERSIONED_PREFIX: &str = "_:";

/// Turns a configured salt into its key fragment.
pub fn salt_keys(salt: &str) -> String {
    if salt.is_empty() {
        String::new()
    } else {
        format!("{salt}:")
    }
}

/// Flush prefix for an epoch.
pub fn versioned_prefix(epoch: u64) -> String {
    format!("{epoch}:")
}

/// Builds fully-qualified keys from already-resolved parts.
#[derive(Debug, Clone, Default)]
pub struct KeyBuilder {
    salt: String,
}

impl KeyBuilder {
    /// Creates a builder for the raw configured salt.
    pub fn new(salt: &str) -> Self {
        Self {
            salt: salt_keys(salt),
        }
    }

    /// The salt fragment, `""` or `"{salt}:"`.
    pub fn salt(&self) -> &str {
        &self.salt
    }

    pub fn build(&self, prefix: &str, flush_prefix: &str, group: &str, raw_key: &str) -> String {
        format!("{prefix}:{flush_prefix}{}{group}:{raw_key}", self.salt)
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_salt_keys() {
        assert_eq!(salt_keys("foo"), "foo:");
        assert_eq!(salt_keys(""), "");
    }

    #[test]
    fn test_build_layout() {
        let builder = KeyBuilder::new("salt");
        let key = builder.build("wp_", &versioned_prefix(1700), "default", "foo");
        assert_eq!(key, "wp_:1700:salt:default:foo");
    }

    #[test]
    fn test_build_without_salt() {
        let builder = KeyBuilder::default();
        let key = builder.build("3", UNVERSIONED_PREFIX, "ObjectCache", "flush_nr_v1");
        assert_eq!(key, "3:_:ObjectCache:flush_nr_v1");
    }

    #[test]
    fn test_build_strips_whitespace() {
        let builder = KeyBuilder::new("");
        let key = builder.build("wp_", "1:", "my group", "a key\twith\nspace");
        assert_eq!(key, "wp_:1:mygroup:akeywithspace");
    }

    #[test]
    fn test_prefixes_separate_site_and_epoch() {
        let builder = KeyBuilder::new("");
        let site_1 = builder.build("1", &versioned_prefix(17), "g", "k");
        let site_11 = builder.build("11", &versioned_prefix(7), "g", "k");
        assert_ne!(site_1, site_11);
    }
}
