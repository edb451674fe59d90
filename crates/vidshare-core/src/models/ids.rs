//! Opaque identifiers that double as object-storage path segments.
//!
//! A video id and its owner's id are embedded verbatim in storage keys
//! (`{ownerId}/{videoId}/...`) and in the scratch directory path, so both are
//! validated as a single safe path segment on construction.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

const MAX_ID_LEN: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    #[error("identifier is empty")]
    Empty,

    #[error("identifier exceeds {MAX_ID_LEN} characters")]
    TooLong,

    #[error("identifier is not a safe path segment: {0:?}")]
    UnsafeSegment(String),
}

fn validate_segment(value: &str) -> Result<(), IdError> {
    if value.is_empty() {
        return Err(IdError::Empty);
    }
    if value.len() > MAX_ID_LEN {
        return Err(IdError::TooLong);
    }
    if value == "." || value == ".." || value.contains("..") {
        return Err(IdError::UnsafeSegment(value.to_string()));
    }
    if value
        .chars()
        .any(|c| c == '/' || c == '\\' || c.is_control() || c.is_whitespace())
    {
        return Err(IdError::UnsafeSegment(value.to_string()));
    }
    Ok(())
}

macro_rules! segment_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
        #[cfg_attr(feature = "sqlx", sqlx(transparent))]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            pub fn parse(value: impl Into<String>) -> Result<Self, IdError> {
                let value = value.into();
                validate_segment(&value)?;
                Ok(Self(value))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::parse(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
                f.write_str(&self.0)
            }
        }
    };
}

segment_id!(
    /// Identity of a video; used as DB key, storage path segment and scratch folder name.
    VideoId
);

segment_id!(
    /// Identity of the user owning a video.
    UserId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_and_uuid_ids() {
        assert_eq!(VideoId::parse("v1").unwrap().as_str(), "v1");
        assert!(VideoId::parse("0b6f1c9e-5a7d-4d2c-9a53-3c1f4a2b8e10").is_ok());
        assert!(UserId::parse("user_42").is_ok());
    }

    #[test]
    fn rejects_path_escapes() {
        assert_eq!(VideoId::parse(""), Err(IdError::Empty));
        assert!(matches!(VideoId::parse(".."), Err(IdError::UnsafeSegment(_))));
        assert!(matches!(VideoId::parse("a/b"), Err(IdError::UnsafeSegment(_))));
        assert!(matches!(VideoId::parse("a\\b"), Err(IdError::UnsafeSegment(_))));
        assert!(matches!(VideoId::parse("a b"), Err(IdError::UnsafeSegment(_))));
        assert!(matches!(
            VideoId::parse("x".repeat(MAX_ID_LEN + 1)),
            Err(IdError::TooLong)
        ));
    }

    #[test]
    fn deserialization_validates() {
        let ok: VideoId = serde_json::from_str("\"v1\"").unwrap();
        assert_eq!(ok.to_string(), "v1");
        assert!(serde_json::from_str::<VideoId>("\"../etc\"").is_err());
    }
}
