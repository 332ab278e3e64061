use crate::crawler::EndpointCrawler;
use crate::error::{Result, ScanError};
use crate::mutation::Mutator;
use crate::requestor::Requestor;
use lagprobe_core::stats::coefficient_of_variation;
use lagprobe_core::{Endpoint, MeasuredEndpoint};
use std::sync::Arc;
use tracing::{debug, error, info, trace};

pub const DEFAULT_CV_THRESHOLD: f64 = 0.6;

/// Called before each endpoint is scanned with `(index, total, endpoint)`.
pub type ScanProgressCallback = Arc<dyn Fn(usize, usize, &Endpoint) + Send + Sync>;

/// Where the scanner gets its endpoints from.
pub enum EndpointSource {
    Crawl {
        crawler: EndpointCrawler,
        seeds: Vec<Endpoint>,
    },
    /// A fixed list, scanned as given without crawling.
    List(Vec<Endpoint>),
}

#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    pub vulnerable: Vec<MeasuredEndpoint>,
    pub crawled: Vec<Endpoint>,
}

/// Drives every endpoint with query parameters through the mutator and the
/// requestor, one endpoint at a time.
pub struct DosScanner {
    requestor: Arc<Requestor>,
    mutator: Mutator,
    source: EndpointSource,
    threshold: f64,
    progress_callback: Option<ScanProgressCallback>,
}

impl DosScanner {
    pub fn new(requestor: Arc<Requestor>, mutator: Mutator, source: EndpointSource) -> Self {
        Self {
            requestor,
            mutator,
            source,
            threshold: DEFAULT_CV_THRESHOLD,
            progress_callback: None,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_progress_callback(mut self, callback: ScanProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub async fn scan_target(self) -> Result<ScanOutcome> {
        let crawled = match self.source {
            EndpointSource::Crawl { ref crawler, ref seeds } => crawler.crawl(seeds.clone()).await,
            EndpointSource::List(ref endpoints) => endpoints.clone(),
        };

        let targets: Vec<&Endpoint> = crawled.iter().filter(|e| e.has_url_params()).collect();
        info!(
            "Scanning {} of {} endpoints with the {} mutator",
            targets.len(),
            crawled.len(),
            self.mutator.name()
        );

        let mut vulnerable = Vec::new();
        for (index, endpoint) in targets.iter().enumerate() {
            if let Some(ref callback) = self.progress_callback {
                callback(index, targets.len(), endpoint);
            }

            let measurements = match self.evaluate_endpoint(endpoint).await {
                Ok(measurements) => measurements,
                Err(e @ ScanError::MutationProtocol(_)) => {
                    error!("Skipping {}: {}", endpoint, e);
                    continue;
                }
                Err(e) => return Err(e),
            };

            if let Some(finding) = find_vulnerability(&measurements, self.threshold) {
                info!("Potentially vulnerable: {}", finding);
                vulnerable.push(finding);
            }
        }

        info!("Scan complete. {} vulnerable endpoint(s)", vulnerable.len());
        Ok(ScanOutcome { vulnerable, crawled })
    }

    /// Runs the mutation stream of `endpoint` to completion and returns every
    /// measurement taken along the way.
    pub async fn evaluate_endpoint(&self, endpoint: &Endpoint) -> Result<Vec<MeasuredEndpoint>> {
        debug!("Evaluating {}", endpoint);
        let mut stream = self.mutator.stream(endpoint);
        let mut measurements = Vec::new();

        while let Some(candidate) = stream.next_candidate()? {
            trace!("Candidate {} (batch end: {})", candidate.endpoint, candidate.batch_end);
            self.requestor.enqueue(candidate.endpoint).await;

            if candidate.batch_end {
                for measured in self.requestor.evaluate_response_time().await {
                    stream.feedback(&measured.endpoint, measured.measurement)?;
                    measurements.push(measured);
                }
            }
        }

        // A stream must close its last batch; anything left is measured
        // without feedback so the queue starts empty for the next endpoint
        if self.requestor.queued().await > 0 {
            debug!("Stream for {} ended with an open batch", endpoint);
            measurements.extend(self.requestor.evaluate_response_time().await);
        }

        Ok(measurements)
    }
}

/// The slowest measurement when the coefficient of variation of all
/// successful measurements exceeds `threshold`.
pub fn find_vulnerability(
    measurements: &[MeasuredEndpoint],
    threshold: f64,
) -> Option<MeasuredEndpoint> {
    let successful: Vec<(&MeasuredEndpoint, u64)> = measurements
        .iter()
        .filter_map(|m| m.measurement.micros().map(|us| (m, us)))
        .collect();

    let samples: Vec<f64> = successful.iter().map(|(_, us)| *us as f64).collect();
    let cv = coefficient_of_variation(&samples);
    debug!("Coefficient of variation {:.3} over {} measurements", cv, samples.len());

    if cv <= threshold {
        return None;
    }

    successful
        .into_iter()
        .max_by_key(|(_, us)| *us)
        .map(|(m, _)| m.clone())
}
