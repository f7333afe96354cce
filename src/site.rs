//! Site context: which site the cache is serving and the key prefixes that follow.

use serde::Serialize;

/// Current site and network layout.
///
/// On a multisite network the site prefix is the numeric site id and global
/// groups share an empty prefix. A single site uses its table prefix for both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SiteContext {
    pub site_id: u64,
    pub main_site_id: u64,
    pub multisite: bool,
    pub table_prefix: String,
}

impl SiteContext {
    pub fn new(site_id: u64, multisite: bool, table_prefix: impl Into<String>) -> Self {
        Self {
            site_id,
            main_site_id: 1,
            multisite,
            table_prefix: table_prefix.into(),
        }
    }

    /// Single-site context with the given table prefix.
    pub fn single(table_prefix: impl Into<String>) -> Self {
        Self::new(1, false, table_prefix)
    }

    pub fn with_main_site(mut self, main_site_id: u64) -> Self {
        self.main_site_id = main_site_id;
        self
    }

    /// Prefix for site-scoped groups.
    pub fn site_prefix(&self) -> String {
        if self.multisite {
            self.site_id.to_string()
        } else {
            self.table_prefix.clone()
        }
    }

    /// Prefix for global groups.
    pub fn global_prefix(&self) -> String {
        if self.multisite {
            String::new()
        } else {
            self.table_prefix.clone()
        }
    }

    /// Whether this site owns the network-wide flush.
    pub fn is_main_site(&self) -> bool {
        !self.multisite || self.site_id == self.main_site_id
    }

    /// Points the context at another site of the network.
    pub fn switch_to(&mut self, site_id: u64) {
        self.site_id = site_id;
    }
}

impl Default for SiteContext {
    fn default() -> Self {
        Self::single("wp_")
    }
}
