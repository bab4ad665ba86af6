//! Identity types for setting records

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Record identifier using UUIDv7 for timestamp-sortable IDs.
/// UUIDv7 embeds a Unix timestamp, making IDs naturally sortable by creation time.
pub type RecordId = Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Generate a new UUIDv7 RecordId (timestamp-sortable).
pub fn new_record_id() -> RecordId {
    Uuid::now_v7()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_ids_are_v7_and_sortable() {
        let first = new_record_id();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = new_record_id();

        assert_eq!(first.get_version_num(), 7);
        assert!(first < second);
    }
}
