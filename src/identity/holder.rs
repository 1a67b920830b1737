use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Maximum length of a holder (and coin) name
pub const MAX_HOLDER_LEN: usize = 20;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HolderIdError {
    #[error("Holder name cannot be empty")]
    Empty,

    #[error("Holder name too long: {len} characters (max {max})")]
    TooLong { len: usize, max: usize },

    #[error("Holder name must start with a lowercase letter, got '{0}'")]
    InvalidStart(char),

    #[error("Invalid character '{0}' in holder name")]
    InvalidCharacter(char),
}

/// Identity of a holder. A holder is also the issuer of the coin with the
/// same name, so the same type names coins.
///
/// Names are letters (any script, but never uppercase), ASCII digits and `-`,
/// starting with a letter. `/` is never allowed; it separates storage keys.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HolderId(String);

impl HolderId {
    /// Parse and validate a holder name
    pub fn parse(s: &str) -> Result<Self, HolderIdError> {
        let mut chars = s.chars();
        let first = chars.next().ok_or(HolderIdError::Empty)?;

        let len = s.chars().count();
        if len > MAX_HOLDER_LEN {
            return Err(HolderIdError::TooLong {
                len,
                max: MAX_HOLDER_LEN,
            });
        }

        if !is_name_letter(first) {
            return Err(HolderIdError::InvalidStart(first));
        }

        if let Some(bad) = chars.find(|c| !(is_name_letter(*c) || c.is_ascii_digit() || *c == '-')) {
            return Err(HolderIdError::InvalidCharacter(bad));
        }

        Ok(Self(s.to_string()))
    }

    /// Turn user input into a holder name: trim, lowercase, and join the
    /// words with `-` ("  Grey Heron " becomes "grey-heron"), then validate.
    pub fn normalize(raw: &str) -> Result<Self, HolderIdError> {
        let joined = raw.split_whitespace().collect::<Vec<_>>().join("-");
        Self::parse(&joined.to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

/// Caseless scripts count as lowercase
fn is_name_letter(c: char) -> bool {
    c.is_alphabetic() && !c.is_uppercase()
}

impl fmt::Display for HolderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for HolderId {
    type Err = HolderIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for HolderId {
    type Error = HolderIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<HolderId> for String {
    fn from(id: HolderId) -> Self {
        id.0
    }
}
