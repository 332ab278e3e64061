use crate::config::{RequestConfig, RequestorSettings};
use crate::error::{Result, ScanError};
use crate::result::ResponseData;
use futures::future::join_all;
use governor::{Quota, RateLimiter, clock::DefaultClock, state::InMemoryState, state::NotKeyed};
use lagprobe_core::{Endpoint, MeasuredEndpoint, Measurement};
use reqwest::{Client, Method};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinError;
use tracing::{debug, trace, warn};
use url::Url;

pub type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Executes queued endpoints in batches.
///
/// Crawler and scanner share one instance, so every request of the process
/// passes through the same queue and the same rate limiter. Each evaluate
/// call drains the whole queue; results come back in enqueue order.
pub struct Requestor {
    probe: Probe,
    connectivity_timeout: Duration,
    queue: Mutex<Vec<Endpoint>>,
}

/// Everything a spawned request task needs, cheap to clone.
#[derive(Clone)]
struct Probe {
    client: Client,
    rate_limiter: Arc<DirectRateLimiter>,
    settings: Arc<RequestorSettings>,
    timeout: Duration,
}

impl Requestor {
    pub fn new(config: RequestConfig, settings: RequestorSettings) -> Result<Self> {
        let client = config.build_client()?;
        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_second(settings.rate_limit)));

        Ok(Self {
            probe: Probe {
                client,
                rate_limiter,
                settings: Arc::new(settings),
                timeout: config.timeout,
            },
            connectivity_timeout: config.connectivity_timeout,
            queue: Mutex::new(Vec::new()),
        })
    }

    pub fn settings(&self) -> &RequestorSettings {
        &self.probe.settings
    }

    /// Appends to the pending batch. No deduplication is performed.
    pub async fn enqueue(&self, endpoint: Endpoint) {
        self.queue.lock().await.push(endpoint);
    }

    pub async fn enqueue_all<I>(&self, endpoints: I)
    where
        I: IntoIterator<Item = Endpoint>,
    {
        self.queue.lock().await.extend(endpoints);
    }

    pub async fn queued(&self) -> usize {
        self.queue.lock().await.len()
    }

    /// Single probe with the short connectivity timeout. Any HTTP response,
    /// whatever its status, counts as reachable. Does not touch the queue.
    pub async fn check_connectivity(&self, endpoint: &Endpoint) -> Result<()> {
        let method = parse_method(&endpoint.http_method)?;
        let response = self
            .probe
            .client
            .request(method, endpoint.url.clone())
            .timeout(self.connectivity_timeout)
            .send()
            .await
            .map_err(|e| ScanError::Connectivity(e.to_string()))?;

        debug!(
            "Connectivity check to {} answered with {}",
            endpoint.url,
            response.status()
        );
        Ok(())
    }

    /// Drains the queue and measures every endpoint in it.
    ///
    /// Returns one entry per queued endpoint, in enqueue order. Failed
    /// requests become [`Measurement::Failed`] instead of aborting the batch.
    pub async fn evaluate_response_time(&self) -> Vec<MeasuredEndpoint> {
        let batch = self.take_batch().await;
        debug!("Measuring batch of {} endpoints", batch.len());

        self.run_batch(batch, Probe::measure, |endpoint, e| {
            warn!("Measurement task for {} failed: {}", endpoint, e);
            MeasuredEndpoint::new(endpoint, Measurement::Failed)
        })
        .await
    }

    /// Drains the queue and fetches every page in it, in enqueue order.
    pub async fn evaluate_response_data(&self) -> Vec<Result<ResponseData>> {
        let batch = self.take_batch().await;
        debug!("Fetching batch of {} pages", batch.len());

        self.run_batch(batch, Probe::fetch, |_endpoint, e| Err(ScanError::JoinError(e)))
            .await
    }

    /// The queue is emptied here, before any request runs, so a failing
    /// batch can never leave stale entries behind.
    async fn take_batch(&self) -> Vec<Endpoint> {
        std::mem::take(&mut *self.queue.lock().await)
    }

    async fn run_batch<T, F, Fut>(
        &self,
        batch: Vec<Endpoint>,
        job: F,
        on_join_error: impl Fn(Endpoint, JoinError) -> T,
    ) -> Vec<T>
    where
        F: Fn(Probe, Endpoint) -> Fut + Copy + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let settings = &self.probe.settings;

        // Pool setup would dominate for tiny batches
        if batch.len() <= settings.inline_batch_limit {
            let mut results = Vec::with_capacity(batch.len());
            for endpoint in batch {
                results.push(job(self.probe.clone(), endpoint).await);
            }
            return results;
        }

        let semaphore = Arc::new(Semaphore::new(settings.workers.max(1)));
        let handles: Vec<_> = batch
            .iter()
            .cloned()
            .map(|endpoint| {
                let probe = self.probe.clone();
                let semaphore = semaphore.clone();
                tokio::spawn(async move {
                    let _permit = semaphore.acquire_owned().await.ok();
                    job(probe, endpoint).await
                })
            })
            .collect();

        join_all(handles)
            .await
            .into_iter()
            .zip(batch)
            .map(|(joined, endpoint)| match joined {
                Ok(result) => result,
                Err(e) => on_join_error(endpoint, e),
            })
            .collect()
    }
}

impl Probe {
    async fn measure(self, endpoint: Endpoint) -> MeasuredEndpoint {
        let method = match parse_method(&endpoint.http_method) {
            Ok(method) => method,
            Err(e) => {
                warn!("Skipping {}: {}", endpoint, e);
                return MeasuredEndpoint::new(endpoint, Measurement::Failed);
            }
        };

        let samples = self.settings.samples.max(1);
        let mut latencies = Vec::with_capacity(samples);
        for round in 0..self.settings.warmup + samples {
            let latency = self.sample(&method, &endpoint.url).await;
            if round < self.settings.warmup {
                continue;
            }
            if let Some(us) = latency {
                latencies.push(us as f64);
            }
        }

        let measurement = if latencies.is_empty() {
            Measurement::Failed
        } else {
            Measurement::Micros(self.settings.mean.mean(&latencies).round() as u64)
        };
        trace!("{} measured as {}", endpoint, measurement);

        MeasuredEndpoint::new(endpoint, measurement)
    }

    /// Time until the response headers arrive, in microseconds. A timeout
    /// counts as the timeout ceiling; other failures yield `None`.
    async fn sample(&self, method: &Method, url: &Url) -> Option<u64> {
        self.rate_limiter.until_ready().await;

        let start = Instant::now();
        match self.client.request(method.clone(), url.clone()).send().await {
            Ok(_) => Some(as_micros(start.elapsed())),
            Err(e) if e.is_timeout() => {
                debug!("Request to {} timed out", url);
                Some(as_micros(self.timeout))
            }
            Err(e) => {
                debug!("Request to {} failed: {}", url, e);
                None
            }
        }
    }

    async fn fetch(self, endpoint: Endpoint) -> Result<ResponseData> {
        let method = parse_method(&endpoint.http_method)?;
        self.rate_limiter.until_ready().await;

        trace!("Fetching {}", endpoint);
        let response = self.client.request(method, endpoint.url).send().await?;
        let url = response.url().clone();
        let body = response.text().await?;

        Ok(ResponseData::new(body, url))
    }
}

fn parse_method(method: &str) -> Result<Method> {
    Method::from_bytes(method.as_bytes()).map_err(|_| ScanError::InvalidMethod(method.to_string()))
}

fn as_micros(duration: Duration) -> u64 {
    u64::try_from(duration.as_micros()).unwrap_or(u64::MAX)
}
