//! Entity records as returned by the WordPress REST API.
//!
//! A record is an opaque JSON object. The cache only relies on two fields:
//! a numeric identifier and an optional slug, whose names come from the
//! resource's [`RecordShape`].

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::client::FetchError;
use crate::resource::RecordShape;

/// Backend identifier of a record.
pub type RecordId = u64;

/// A single entity received from the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    id: RecordId,
    slug: Option<String>,
    fields: Map<String, Value>,
}

impl Record {
    /// Decode a record from a JSON value using the given field shape.
    pub fn from_value(value: Value, shape: &RecordShape) -> Result<Self, FetchError> {
        let Value::Object(fields) = value else {
            return Err(FetchError::decode("record is not a JSON object"));
        };

        let id = fields
            .get(shape.id_field())
            .and_then(Value::as_u64)
            .ok_or_else(|| FetchError::missing_field(shape.id_field()))?;

        let slug = fields
            .get(shape.slug_field())
            .and_then(Value::as_str)
            .filter(|slug| !slug.is_empty())
            .map(str::to_owned);

        Ok(Self { id, slug, fields })
    }

    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn slug(&self) -> Option<&str> {
        self.slug.as_deref()
    }

    /// Look up an arbitrary field of the record.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}

/// Page count for a collection query, kept in the representation it arrived in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PageCount {
    Number(i64),
    Text(String),
}

impl PageCount {
    /// Interpret the stored value as a base-10 page count.
    ///
    /// Zero, empty, negative or unparseable values yield `None`.
    pub fn parse(&self) -> Option<u64> {
        let value = match self {
            Self::Number(value) => *value,
            Self::Text(text) => parse_int(text)?,
        };
        u64::try_from(value).ok().filter(|pages| *pages > 0)
    }
}

impl Default for PageCount {
    fn default() -> Self {
        Self::Number(1)
    }
}

impl From<u64> for PageCount {
    fn from(value: u64) -> Self {
        Self::Number(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<&str> for PageCount {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

/// Parse the leading base-10 integer of `text`, ignoring leading whitespace
/// and any trailing garbage (`"3 pages"` is 3, `"x3"` is nothing).
pub(crate) fn parse_int(text: &str) -> Option<i64> {
    let trimmed = text.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }

    let magnitude: i64 = digits[..end].parse().ok()?;
    Some(if negative { -magnitude } else { magnitude })
}
