use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::SHORT_ID_LEN;
use crate::error::ParseError;

/// Account role chosen at registration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Role {
    Buyer,
    Seller,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Buyer => "Buyer",
            Role::Seller => "Seller",
            Role::Admin => "Admin",
        }
    }

    /// Whether this role may publish listings.
    pub fn can_list_pets(&self) -> bool {
        matches!(self, Role::Seller | Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Buyer" => Ok(Role::Buyer),
            "Seller" => Ok(Role::Seller),
            "Admin" => Ok(Role::Admin),
            other => Err(ParseError::Role(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum PetType {
    Dog,
    Cat,
    Bird,
    Rabbit,
    Other,
}

impl PetType {
    pub const ALL: [PetType; 5] = [
        PetType::Dog,
        PetType::Cat,
        PetType::Bird,
        PetType::Rabbit,
        PetType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PetType::Dog => "Dog",
            PetType::Cat => "Cat",
            PetType::Bird => "Bird",
            PetType::Rabbit => "Rabbit",
            PetType::Other => "Other",
        }
    }
}

impl fmt::Display for PetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PetType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PetType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ParseError::PetType(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    Available,
    Adopted,
}

impl ListingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingStatus::Available => "available",
            ListingStatus::Adopted => "adopted",
        }
    }
}

impl fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ListingStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(ListingStatus::Available),
            "adopted" => Ok(ListingStatus::Adopted),
            other => Err(ParseError::ListingStatus(other.to_string())),
        }
    }
}

/// First [`SHORT_ID_LEN`] characters of an identity, used in fallback labels.
pub fn short_id(id: &str) -> &str {
    match id.char_indices().nth(SHORT_ID_LEN) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}

/// Local part of an email address, if it has a non-empty one.
pub fn email_local_part(email: &str) -> Option<&str> {
    email.split('@').next().filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_display() {
        for role in [Role::Buyer, Role::Seller, Role::Admin] {
            assert_eq!(role.to_string().parse::<Role>().unwrap(), role);
        }
        assert!("buyer".parse::<Role>().is_err());
    }

    #[test]
    fn only_sellers_and_admins_list_pets() {
        assert!(!Role::Buyer.can_list_pets());
        assert!(Role::Seller.can_list_pets());
        assert!(Role::Admin.can_list_pets());
    }

    #[test]
    fn listing_status_serializes_lowercase() {
        let json = serde_json::to_string(&ListingStatus::Available).unwrap();
        assert_eq!(json, "\"available\"");
    }

    #[test]
    fn short_id_truncates_on_char_boundary() {
        assert_eq!(short_id("abcdefghij"), "abcdef");
        assert_eq!(short_id("abc"), "abc");
        assert_eq!(short_id("éééééééé"), "éééééé");
    }

    #[test]
    fn email_local_part_requires_content() {
        assert_eq!(email_local_part("sam@example.com"), Some("sam"));
        assert_eq!(email_local_part("@example.com"), None);
        assert_eq!(email_local_part("plain"), Some("plain"));
    }
}
