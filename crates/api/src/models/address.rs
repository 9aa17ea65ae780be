//! Shipping addresses: the user's address book and per-order snapshots.

use cartwright_core::{AddressId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A saved shipping address.
#[derive(Debug, Clone, Serialize)]
pub struct ShippingAddress {
    pub id: AddressId,
    pub user_id: UserId,
    pub full_name: String,
    pub address_line_1: String,
    pub address_line_2: Option<String>,
    pub city: String,
    pub state: Option<String>,
    pub postal_code: String,
    pub country: String,
    pub phone_number: Option<String>,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

/// Request body for saving an address.
#[derive(Debug, Clone, Deserialize)]
pub struct NewAddress {
    pub full_name: String,
    pub address_line_1: String,
    pub address_line_2: Option<String>,
    pub city: String,
    pub state: Option<String>,
    pub postal_code: String,
    pub country: String,
    pub phone_number: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

impl NewAddress {
    /// Names the first required field that is blank, if any.
    #[must_use]
    pub fn missing_field(&self) -> Option<&'static str> {
        [
            ("full_name", &self.full_name),
            ("address_line_1", &self.address_line_1),
            ("city", &self.city),
            ("postal_code", &self.postal_code),
            ("country", &self.country),
        ]
        .into_iter()
        .find(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
    }
}

/// Immutable copy of the shipping address taken at checkout.
#[derive(Debug, Clone, Serialize)]
pub struct OrderShippingAddress {
    pub full_name: String,
    pub address_line_1: String,
    pub address_line_2: Option<String>,
    pub city: String,
    pub state: Option<String>,
    pub postal_code: String,
    pub country: String,
    pub phone_number: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_field() {
        let mut address = NewAddress {
            full_name: "Ada Lovelace".to_string(),
            address_line_1: "12 St James's Square".to_string(),
            address_line_2: None,
            city: "London".to_string(),
            state: None,
            postal_code: "SW1Y 4JH".to_string(),
            country: "GB".to_string(),
            phone_number: None,
            is_default: true,
        };
        assert_eq!(address.missing_field(), None);

        address.city = "  ".to_string();
        assert_eq!(address.missing_field(), Some("city"));
    }
}
