//! Video URL validation.
//!
//! Validation is pure and synchronous: it never touches the network. A
//! [`VideoUrl`] can only be obtained through [`validate`], so holding one
//! proves the string parsed, uses http(s) and names an accepted file type.

use std::fmt;

use serde::{Serialize, Serializer};
use thiserror::Error;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please enter a video URL")]
    Empty,
    #[error("Invalid URL format")]
    InvalidFormat,
    #[error("Only http and https URLs are supported")]
    UnsupportedScheme { scheme: String },
    #[error("URL must point to {expected} file")]
    UnsupportedExtension { expected: String },
}

/// An absolute http(s) URL whose path ends in an accepted video extension.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VideoUrl(Url);

impl VideoUrl {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn as_url(&self) -> &Url {
        &self.0
    }
}

impl fmt::Display for VideoUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

impl AsRef<str> for VideoUrl {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl Serialize for VideoUrl {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.0.as_str())
    }
}

pub fn validate(raw: &str, accepted_extensions: &[String]) -> Result<VideoUrl, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty);
    }

    let parsed = Url::parse(trimmed).map_err(|_| ValidationError::InvalidFormat)?;

    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(ValidationError::UnsupportedScheme {
                scheme: other.to_string(),
            })
        }
    }

    let path = parsed.path().to_ascii_lowercase();
    let accepted = accepted_extensions
        .iter()
        .any(|ext| path.ends_with(&ext.to_ascii_lowercase()));
    if !accepted {
        return Err(ValidationError::UnsupportedExtension {
            expected: describe_extensions(accepted_extensions),
        });
    }

    Ok(VideoUrl(parsed))
}

fn describe_extensions(extensions: &[String]) -> String {
    match extensions {
        [] => "a video".to_string(),
        many => format!("an {}", many.join(" or ")),
    }
}
