// JSON report of a finished scan

use crate::error::Result;
use crate::model::{Endpoint, MeasuredEndpoint};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VulnerableEntry {
    pub http_method: String,
    pub url: String,
    /// Microseconds
    pub response_time: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawledEntry {
    pub http_method: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanReport {
    pub vulnerable_endpoints: Vec<VulnerableEntry>,
    pub crawled_endpoints: Vec<CrawledEntry>,
}

impl ScanReport {
    /// Findings without a successful measurement carry no latency and are
    /// left out of `vulnerable_endpoints`.
    pub fn new(vulnerable: &[MeasuredEndpoint], crawled: &[Endpoint]) -> Self {
        let vulnerable_endpoints = vulnerable
            .iter()
            .filter_map(|m| {
                m.measurement.micros().map(|us| VulnerableEntry {
                    http_method: m.endpoint.http_method.clone(),
                    url: m.endpoint.url.to_string(),
                    response_time: us,
                })
            })
            .collect();

        let crawled_endpoints = crawled
            .iter()
            .map(|e| CrawledEntry {
                http_method: e.http_method.clone(),
                url: e.url.to_string(),
            })
            .collect();

        Self {
            vulnerable_endpoints,
            crawled_endpoints,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(self.to_json()?.as_bytes())?;
        file.write_all(b"\n")?;
        Ok(())
    }
}
