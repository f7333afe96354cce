//! Stored Item Module
//!
//! Defines the structure for items held by a memory node, with memcached
//! style expiration.

use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value;

/// Expiration values above this many seconds are absolute Unix timestamps.
pub const RELATIVE_EXPIRATION_LIMIT: u64 = 60 * 60 * 24 * 30;

// == Stored Item ==
/// Represents a single item on a node with its value and metadata.
#[derive(Debug, Clone)]
pub struct StoredItem {
    /// The stored value
    pub value: Value,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Expiration timestamp (Unix milliseconds), None = no expiration
    pub expires_at: Option<u64>,
}

impl StoredItem {
    /// `expire` is 0 for no expiration, seconds up to 30 days, else a Unix
    /// timestamp.
    pub fn new(value: Value, expire: u64) -> Self {
        let now = current_timestamp_ms();
        Self {
            value,
            created_at: now,
            expires_at: expires_at_ms(expire, now),
        }
    }

    /// An item is expired from its deadline on.
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires) => current_timestamp_ms() >= expires,
            None => false,
        }
    }

    /// Whole seconds left, `None` for items that never expire.
    pub fn ttl_remaining(&self) -> Option<u64> {
        self.expires_at
            .map(|expires| expires.saturating_sub(current_timestamp_ms()) / 1000)
    }
}

/// Converts a memcached expiration into an absolute deadline.
pub fn expires_at_ms(expire: u64, now_ms: u64) -> Option<u64> {
    match expire {
        0 => None,
        secs if secs <= RELATIVE_EXPIRATION_LIMIT => Some(now_ms + secs * 1000),
        timestamp => Some(timestamp.saturating_mul(1000)),
    }
}

/// Current Unix time in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn test_item_without_expiration() {
        let item = StoredItem::new(json!({"id": 7}), 0);

        assert_eq!(item.value, json!({"id": 7}));
        assert!(item.expires_at.is_none());
        assert!(!item.is_expired());
        assert!(item.ttl_remaining().is_none());
    }

    #[test]
    fn test_item_relative_expiration() {
        let item = StoredItem::new(json!(1), 10);

        let remaining = item.ttl_remaining().unwrap();
        assert!(remaining <= 10);
        assert!(remaining >= 9);
    }

    #[test]
    fn test_item_expiration() {
        let item = StoredItem::new(json!("v"), 1);
        assert!(!item.is_expired());

        sleep(Duration::from_millis(1100));

        assert!(item.is_expired());
        assert_eq!(item.ttl_remaining(), Some(0));
    }

    #[test]
    fn test_absolute_timestamp_in_the_past_is_expired() {
        // One second past the relative window is 1970, long gone.
        let item = StoredItem::new(json!("v"), RELATIVE_EXPIRATION_LIMIT + 1);
        assert!(item.is_expired());
    }

    #[test]
    fn test_item_is_expired_at_its_deadline() {
        let now = current_timestamp_ms();
        let item = StoredItem {
            value: json!(null),
            created_at: now,
            expires_at: Some(now),
        };
        assert!(item.is_expired());
    }

    #[test]
    fn test_expires_at_ms_modes() {
        assert_eq!(expires_at_ms(0, 5_000), None);
        assert_eq!(expires_at_ms(2, 5_000), Some(7_000));
        assert_eq!(
            expires_at_ms(1_900_000_000, 5_000),
            Some(1_900_000_000_000)
        );
    }
}
