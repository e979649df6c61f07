pub mod check;
pub mod videos;

use serde::Deserialize;

/// Body of every endpoint that takes a single link.
#[derive(Debug, Deserialize)]
pub struct UrlRequest {
    pub url: String,
}
