//! Cart item identity.

use core::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Errors that can occur when parsing an [`ItemId`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ItemIdError {
    /// The input is empty or whitespace only.
    #[error("item id cannot be empty")]
    Empty,
    /// The input is too long.
    #[error("item id must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
}

/// Canonical identity of a cart line item.
///
/// Derived from the product's server id (e.g. a document id such as
/// `"65f1c0ffee..."`) or from a local numeric id. Both forms are accepted
/// when deserializing; the id always serializes as a string so that `7`
/// and `"7"` denote the same item.
///
/// ## Examples
///
/// ```
/// use pantry_core::ItemId;
///
/// assert!(ItemId::parse("65f1c0ffee").is_ok());
/// assert!(ItemId::parse("   ").is_err());
///
/// let numeric: ItemId = serde_json::from_str("42").unwrap();
/// assert_eq!(numeric, ItemId::parse("42").unwrap());
/// ```
#[derive(Debug, Clone, Serialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    /// Maximum length of an item id.
    pub const MAX_LENGTH: usize = 128;

    /// Parse an `ItemId` from a string, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns an error if the trimmed input is empty or longer than
    /// [`ItemId::MAX_LENGTH`].
    pub fn parse(s: &str) -> Result<Self, ItemIdError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ItemIdError::Empty);
        }
        if trimmed.len() > Self::MAX_LENGTH {
            return Err(ItemIdError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `ItemId` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for ItemId {
    type Err = ItemIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for ItemId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<u64> for ItemId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawItemId {
    Text(String),
    Unsigned(u64),
    Signed(i64),
}

impl<'de> Deserialize<'de> for ItemId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = match RawItemId::deserialize(deserializer)? {
            RawItemId::Text(s) => s,
            RawItemId::Unsigned(n) => n.to_string(),
            RawItemId::Signed(n) => n.to_string(),
        };
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
