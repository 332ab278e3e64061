// Request targets and their measured variants

use crate::error::Result;
use std::fmt;
use url::Url;

/// Decoded query parameters in the order they first appear in the URL.
pub type UrlParams = Vec<(String, String)>;

/// An HTTP method + absolute URL that can be fetched or measured.
///
/// Two endpoints are the same target iff both the serialized URL and the
/// method match exactly.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub url: Url,
    pub http_method: String,
}

impl Endpoint {
    pub fn new(url: Url, http_method: impl Into<String>) -> Self {
        Self {
            url,
            http_method: http_method.into(),
        }
    }

    /// GET endpoint for `url`.
    pub fn get(url: Url) -> Self {
        Self::new(url, "GET")
    }

    pub fn parse(url: &str, http_method: &str) -> Result<Self> {
        Ok(Self::new(Url::parse(url)?, http_method))
    }

    /// Parses the query string into decoded `(name, value)` pairs.
    ///
    /// A repeated name keeps its first position and its last value.
    pub fn get_url_params(&self) -> UrlParams {
        let mut params: UrlParams = Vec::new();
        for (key, value) in self.url.query_pairs() {
            match params.iter_mut().find(|(k, _)| *k == key) {
                Some(entry) => entry.1 = value.into_owned(),
                None => params.push((key.into_owned(), value.into_owned())),
            }
        }
        params
    }

    /// Re-encodes `params` as the query string. Scheme, host, path and
    /// fragment are untouched; an empty slice removes the query.
    pub fn set_url_params(&mut self, params: &[(String, String)]) {
        if params.is_empty() {
            self.url.set_query(None);
            return;
        }
        self.url
            .query_pairs_mut()
            .clear()
            .extend_pairs(params.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    }

    /// Copy of this endpoint with `key` set to `value`. The parameter is
    /// appended when it is not present yet.
    pub fn with_param(&self, key: &str, value: &str) -> Self {
        let mut params = self.get_url_params();
        match params.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value.to_string(),
            None => params.push((key.to_string(), value.to_string())),
        }
        let mut endpoint = self.clone();
        endpoint.set_url_params(&params);
        endpoint
    }

    pub fn has_url_params(&self) -> bool {
        self.url.query_pairs().next().is_some()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.http_method, self.url)
    }
}

/// Latency of one endpoint, averaged over several samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Measurement {
    /// Mean response time in microseconds. Timed out samples count as the
    /// timeout ceiling.
    Micros(u64),
    /// Every sample failed before a response arrived (connection, DNS, TLS).
    Failed,
}

impl Measurement {
    pub fn micros(self) -> Option<u64> {
        match self {
            Measurement::Micros(us) => Some(us),
            Measurement::Failed => None,
        }
    }

    pub fn is_failed(self) -> bool {
        matches!(self, Measurement::Failed)
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Measurement::Micros(us) => write!(f, "{}μs", us),
            Measurement::Failed => write!(f, "failed"),
        }
    }
}

/// An endpoint together with the latency observed for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeasuredEndpoint {
    pub endpoint: Endpoint,
    pub measurement: Measurement,
}

impl MeasuredEndpoint {
    pub fn new(endpoint: Endpoint, measurement: Measurement) -> Self {
        Self {
            endpoint,
            measurement,
        }
    }
}

impl fmt::Display for MeasuredEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Response time: {} {}", self.measurement, self.endpoint)
    }
}

/// An individual of the genetic mutator's population.
///
/// Only the parameter named by `mutated_param_key` evolves; no lineage is
/// kept beyond the current generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneticEndpoint {
    pub endpoint: Endpoint,
    pub measurement: Option<Measurement>,
    pub mutated_param_key: String,
}

impl GeneticEndpoint {
    pub fn new(endpoint: Endpoint, mutated_param_key: impl Into<String>) -> Self {
        Self {
            endpoint,
            measurement: None,
            mutated_param_key: mutated_param_key.into(),
        }
    }

    /// Current value of the tracked parameter, empty if it is absent.
    pub fn param_value(&self) -> String {
        self.endpoint
            .get_url_params()
            .into_iter()
            .find(|(k, _)| *k == self.mutated_param_key)
            .map(|(_, v)| v)
            .unwrap_or_default()
    }

    /// Replaces the tracked parameter's value and forgets any measurement,
    /// since it no longer describes this URL.
    pub fn set_param_value(&mut self, value: &str) {
        self.endpoint = self.endpoint.with_param(&self.mutated_param_key, value);
        self.measurement = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(url: &str) -> Endpoint {
        Endpoint::parse(url, "GET").unwrap()
    }

    #[test]
    fn test_get_url_params_decodes_values() {
        let e = endpoint("http://example.test/search?q=a%20b&page=2");
        assert_eq!(
            e.get_url_params(),
            vec![
                ("q".to_string(), "a b".to_string()),
                ("page".to_string(), "2".to_string())
            ]
        );
    }

    #[test]
    fn test_get_url_params_repeated_key_keeps_last_value() {
        let e = endpoint("http://example.test/?a=1&b=2&a=3");
        assert_eq!(
            e.get_url_params(),
            vec![
                ("a".to_string(), "3".to_string()),
                ("b".to_string(), "2".to_string())
            ]
        );
    }

    #[test]
    fn test_set_url_params_preserves_path_and_fragment() {
        let mut e = endpoint("https://example.test:8443/api/items?id=1#top");
        e.set_url_params(&[("id".to_string(), "'".to_string())]);
        assert_eq!(e.url.as_str(), "https://example.test:8443/api/items?id=%27#top");
    }

    #[test]
    fn test_set_url_params_empty_removes_query() {
        let mut e = endpoint("http://example.test/x?id=1");
        e.set_url_params(&[]);
        assert_eq!(e.url.as_str(), "http://example.test/x");
        assert!(!e.has_url_params());
    }

    #[test]
    fn test_with_param_appends_missing_key() {
        let e = endpoint("http://example.test/?a=1");
        let e2 = e.with_param("b", "2");
        assert_eq!(e2.url.as_str(), "http://example.test/?a=1&b=2");
        // original untouched
        assert_eq!(e.url.as_str(), "http://example.test/?a=1");
    }

    #[test]
    fn test_genetic_endpoint_tracks_single_param() {
        let mut g = GeneticEndpoint::new(endpoint("http://example.test/?id=7&sort=asc"), "id");
        g.measurement = Some(Measurement::Micros(10));
        assert_eq!(g.param_value(), "7");

        g.set_param_value("77");
        assert_eq!(g.param_value(), "77");
        assert_eq!(g.measurement, None);
        assert_eq!(g.endpoint.url.as_str(), "http://example.test/?id=77&sort=asc");
    }

    #[test]
    fn test_display() {
        let m = MeasuredEndpoint::new(endpoint("http://example.test/"), Measurement::Micros(42));
        assert_eq!(m.to_string(), "Response time: 42μs GET http://example.test/");
        assert_eq!(Measurement::Failed.to_string(), "failed");
    }
}
