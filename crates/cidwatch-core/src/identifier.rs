//! Content identifiers and their extraction from message bodies.
//!
//! A message body is a JSON object with a handful of known fields. Two of
//! them can carry identifiers:
//!
//! 1. `cid`: taken verbatim when it is a non-empty string
//! 2. `image`: scanned against [`IMAGE_PATTERNS`] in order; the first match
//!    wins. When nothing matches but the trimmed value itself looks like a
//!    bare identifier (`Qm…` or `bafy…`), the trimmed value is used.
//!
//! Results are deduplicated in first-seen order.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An opaque content-addressing token. Equality is exact string equality.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identifier(String);

impl Identifier {
    /// Wrap a raw token.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The token as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the wrapper, returning the token.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Identifier {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Identifier {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Patterns tried against the `image` field, in priority order. Each has a
/// named `cid` capture group.
static IMAGE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // ipfs://<cid>
        r"(?i)ipfs://(?P<cid>[A-Za-z0-9]+)",
        // .../ipfs/<cid>
        r"(?i)/ipfs/(?P<cid>[A-Za-z0-9]+)",
        // bare CIDv0: "Qm" + 44 base58 characters
        r"^(?P<cid>Qm[1-9A-HJ-NP-Za-km-z]{44})$",
        // bare CIDv1: "bafy" + base32-ish tail
        r"(?i)^(?P<cid>bafy\w{20,})$",
    ]
    .into_iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

/// The known fields of a message body.
///
/// Unknown fields are discarded. Known fields keep their raw JSON value so a
/// field of an unexpected type (e.g. a numeric `cid`) never fails decoding; it
/// simply yields no identifier.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct MessageBody {
    /// Direct identifier field.
    #[serde(default)]
    pub cid: Option<Value>,
    /// Token mint address (logged, never dispatched).
    #[serde(default)]
    pub mint: Option<Value>,
    /// Image reference: an `ipfs://` URL, a gateway URL, or a bare token.
    #[serde(default)]
    pub image: Option<Value>,
}

impl MessageBody {
    /// Build from an already-decoded JSON object.
    pub fn from_object(object: &Map<String, Value>) -> Self {
        Self {
            cid: object.get("cid").filter(|v| !v.is_null()).cloned(),
            mint: object.get("mint").filter(|v| !v.is_null()).cloned(),
            image: object.get("image").filter(|v| !v.is_null()).cloned(),
        }
    }

    /// `cid` when it is a string.
    pub fn cid_str(&self) -> Option<&str> {
        self.cid.as_ref().and_then(Value::as_str)
    }

    /// `mint` when it is a string.
    pub fn mint_str(&self) -> Option<&str> {
        self.mint.as_ref().and_then(Value::as_str)
    }

    /// `image` when it is a string.
    pub fn image_str(&self) -> Option<&str> {
        self.image.as_ref().and_then(Value::as_str)
    }

    /// Identifiers carried by this body, direct field first.
    pub fn identifiers(&self) -> Vec<Identifier> {
        let mut found: Vec<Identifier> = Vec::with_capacity(2);

        if let Some(direct) = self.cid_str().filter(|s| !s.is_empty()) {
            found.push(Identifier::new(direct));
        }

        if let Some(image) = self.image_str().filter(|s| !s.is_empty()) {
            if let Some(cid) = extract_from_image(image) {
                if !found.contains(&cid) {
                    found.push(cid);
                }
            }
        }

        found
    }
}

/// Extract the identifiers from a decoded JSON object.
pub fn extract_identifiers(object: &Map<String, Value>) -> Vec<Identifier> {
    MessageBody::from_object(object).identifiers()
}

/// Resolve an `image` field value to an identifier, if it references one.
pub fn extract_from_image(image: &str) -> Option<Identifier> {
    for pattern in IMAGE_PATTERNS.iter() {
        if let Some(m) = pattern.captures(image).and_then(|caps| caps.name("cid")) {
            return Some(Identifier::new(m.as_str()));
        }
    }

    let token = image.trim();
    let looks_bare = token.starts_with("Qm") || token.to_ascii_lowercase().starts_with("bafy");
    (!token.is_empty() && looks_bare).then(|| Identifier::new(token))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
