use url::Url;

/// Body of one fetched page, used by the crawler to harvest links.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseData {
    pub body: String,
    /// Final URL after redirects; relative links resolve against it.
    pub url: Url,
}

impl ResponseData {
    pub fn new(body: String, url: Url) -> Self {
        Self { body, url }
    }
}
