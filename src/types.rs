use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::ListingError;

/// Database used when an item reference carries no database of its own.
pub const DEFAULT_DATABASE: &str = "master";

const URI_SCHEME: &str = "cms://";

/// Content item identifier.
///
/// Rendered in the CMS brace form `{8A80477B-A5E9-4A4C-B2E3-6F0D8F3C1D2E}`.
/// Parsing accepts braced or bare GUIDs in either case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(Uuid);

impl ItemId {
    pub fn new(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn nil() -> Self {
        Self(Uuid::nil())
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{:X}}}", self.0)
    }
}

impl FromStr for ItemId {
    type Err = ListingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let bare = trimmed
            .strip_prefix('{')
            .and_then(|rest| rest.strip_suffix('}'))
            .unwrap_or(trimmed);
        Uuid::parse_str(bare)
            .map(ItemId)
            .map_err(|_| ListingError::InvalidItemUri(s.to_string()))
    }
}

impl Serialize for ItemId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ItemId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Coordinates of one content item: database, id and optionally the language
/// and version the reference is pinned to.
///
/// The string form is `cms://{database}/{id}?lang={language}&ver={version}`;
/// query parameters are omitted when unset.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItemUri {
    pub database: String,
    pub id: ItemId,
    pub language: Option<String>,
    pub version: Option<u32>,
}

impl ItemUri {
    pub fn new(database: impl Into<String>, id: ItemId) -> Self {
        Self {
            database: database.into(),
            id,
            language: None,
            version: None,
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = Some(version);
        self
    }

    /// True when both references point at the same item, whatever language
    /// or version each one is pinned to.
    pub fn same_item(&self, other: &ItemUri) -> bool {
        self.id == other.id && self.database.eq_ignore_ascii_case(&other.database)
    }

    /// Parse either the full `cms://` form or a bare item id. A bare id is
    /// placed in `default_database`.
    pub fn parse_with_default(input: &str, default_database: &str) -> Result<Self, ListingError> {
        let trimmed = input.trim();
        let invalid = || ListingError::InvalidItemUri(input.to_string());

        let Some(rest) = trimmed.strip_prefix(URI_SCHEME) else {
            let id = trimmed.parse()?;
            return Ok(ItemUri::new(default_database, id));
        };

        let (path, query) = match rest.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (rest, None),
        };
        let (database, id) = path.split_once('/').ok_or_else(invalid)?;
        if database.is_empty() {
            return Err(invalid());
        }
        let mut uri = ItemUri::new(database, id.parse()?);

        for pair in query.into_iter().flat_map(|q| q.split('&')) {
            let Some((key, value)) = pair.split_once('=') else {
                continue;
            };
            match key {
                "lang" if !value.is_empty() => {
                    let language = urlencoding::decode(value).map_err(|_| invalid())?;
                    uri.language = Some(language.into_owned());
                }
                "ver" if !value.is_empty() => {
                    uri.version = Some(value.parse().map_err(|_| invalid())?);
                }
                _ => {}
            }
        }
        Ok(uri)
    }
}

impl fmt::Display for ItemUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}/{}", URI_SCHEME, self.database, self.id)?;
        let mut separator = '?';
        if let Some(language) = &self.language {
            write!(f, "{separator}lang={}", urlencoding::encode(language))?;
            separator = '&';
        }
        if let Some(version) = self.version {
            write!(f, "{separator}ver={version}")?;
        }
        Ok(())
    }
}

impl FromStr for ItemUri {
    type Err = ListingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ItemUri::parse_with_default(s, DEFAULT_DATABASE)
    }
}

impl Serialize for ItemUri {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ItemUri {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
