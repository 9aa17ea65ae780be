//! Verified-purchase rules for reviews.

use crate::OrderStatus;

/// Database spellings of the statuses that count as a completed purchase.
#[must_use]
pub fn completed_purchase_statuses() -> Vec<String> {
    OrderStatus::COMPLETED_PURCHASE
        .iter()
        .map(|s| s.as_str().to_owned())
        .collect()
}

/// A verification result that differs from what is stored.
///
/// Returns `Some(new)` only when the flag must be written.
#[must_use]
pub const fn verification_change(stored: bool, purchased: bool) -> Option<bool> {
    if stored == purchased { None } else { Some(purchased) }
}

/// Ratings are whole stars from 1 to 5.
#[must_use]
pub fn is_valid_rating(rating: i16) -> bool {
    (1..=5).contains(&rating)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completed_statuses() {
        let statuses = completed_purchase_statuses();
        assert!(statuses.contains(&"delivered".to_owned()));
        assert!(statuses.contains(&"shipped".to_owned()));
        assert!(statuses.contains(&"paid".to_owned()));
        assert!(!statuses.contains(&"pending".to_owned()));
    }

    #[test]
    fn test_only_changes_are_written() {
        assert_eq!(verification_change(false, true), Some(true));
        assert_eq!(verification_change(true, false), Some(false));
        assert_eq!(verification_change(true, true), None);
    }

    #[test]
    fn test_rating_bounds() {
        assert!(is_valid_rating(1));
        assert!(is_valid_rating(5));
        assert!(!is_valid_rating(0));
        assert!(!is_valid_rating(6));
    }
}
