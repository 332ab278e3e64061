use crate::links::{authority, extract_links, resolve_link};
use crate::requestor::Requestor;
use crate::result::ResponseData;
use lagprobe_core::Endpoint;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, trace};
use url::Url;

/// Called after every crawl round with `(round, endpoints discovered so far)`.
pub type ProgressCallback = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// Breadth-first, domain-scoped link harvester.
///
/// Each round drains the whole frontier through the shared [`Requestor`] as
/// one batch. Depth is the number of rounds: once `max_depth` rounds have run
/// the remaining frontier is dropped, but the endpoints already discovered
/// are kept.
pub struct EndpointCrawler {
    requestor: Arc<Requestor>,
    allowed_domains: HashSet<String>,
    max_depth: usize,
    progress_callback: Option<ProgressCallback>,
}

impl EndpointCrawler {
    pub fn new(requestor: Arc<Requestor>) -> Self {
        Self {
            requestor,
            allowed_domains: HashSet::new(),
            max_depth: 5,
            progress_callback: None,
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// `host[:port]` entries links must match to be followed. When empty the
    /// authorities of the seeds are used.
    pub fn with_allowed_domains<I, S>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_domains = domains.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Crawls from `seeds` and returns every in-scope endpoint discovered,
    /// seeds first, each URL once.
    pub async fn crawl(&self, seeds: Vec<Endpoint>) -> Vec<Endpoint> {
        let allowed_domains = if self.allowed_domains.is_empty() {
            seeds.iter().filter_map(|s| authority(&s.url)).collect()
        } else {
            self.allowed_domains.clone()
        };
        info!(
            "Starting crawl of {} seed(s), scope: {:?}",
            seeds.len(),
            allowed_domains
        );

        let mut visited: HashSet<String> = HashSet::new();
        let mut discovered = Vec::new();
        let mut frontier = Vec::new();
        for seed in seeds {
            if visited.insert(seed.url.to_string()) {
                discovered.push(seed.clone());
                frontier.push(seed);
            }
        }

        // A depth of zero still fetches the seeds once
        let max_rounds = self.max_depth.max(1);
        let mut round = 0;

        while !frontier.is_empty() {
            if round >= max_rounds {
                debug!(
                    "Maximum crawl depth {} reached, dropping {} queued pages",
                    max_rounds,
                    frontier.len()
                );
                break;
            }
            debug!("Crawl round {}: fetching {} pages", round + 1, frontier.len());

            self.requestor.enqueue_all(std::mem::take(&mut frontier)).await;
            for page in self.requestor.evaluate_response_data().await {
                let page = match page {
                    Ok(page) => page,
                    Err(e) => {
                        debug!("Crawl error: {}", e);
                        continue;
                    }
                };

                for url in in_scope_links(&page, &allowed_domains) {
                    if visited.insert(url.to_string()) {
                        trace!("Discovered {}", url);
                        let endpoint = Endpoint::get(url);
                        discovered.push(endpoint.clone());
                        frontier.push(endpoint);
                    }
                }
            }

            round += 1;
            if let Some(ref callback) = self.progress_callback {
                callback(round, discovered.len());
            }
        }

        info!("Crawl complete. Discovered {} endpoints", discovered.len());
        discovered
    }
}

/// Absolute links of `page` whose authority is in `allowed_domains`.
pub fn in_scope_links(page: &ResponseData, allowed_domains: &HashSet<String>) -> Vec<Url> {
    extract_links(&page.body)
        .iter()
        .filter_map(|href| resolve_link(&page.url, href))
        .filter(|url| authority(url).is_some_and(|a| allowed_domains.contains(&a)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RequestConfig, RequestorSettings};
    use std::num::NonZeroU32;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    fn shared_requestor() -> Arc<Requestor> {
        let settings = RequestorSettings {
            rate_limit: NonZeroU32::new(1000).unwrap(),
            ..RequestorSettings::default()
        };
        Arc::new(Requestor::new(RequestConfig::new(), settings).unwrap())
    }

    async fn mount_page(server: &MockServer, route: &str, html: String) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string(html),
            )
            .mount(server)
            .await;
    }

    fn urls(endpoints: &[Endpoint]) -> Vec<String> {
        endpoints.iter().map(|e| e.url.to_string()).collect()
    }

    #[test]
    fn test_in_scope_links_filters_and_resolves() {
        let page = ResponseData::new(
            r#"<a href="/x">x</a><a href="http://b.test/y">y</a><img src="pic.png">"#
                .to_string(),
            Url::parse("http://a.test/dir/").unwrap(),
        );
        let allowed: HashSet<String> = ["a.test".to_string()].into_iter().collect();

        let links = in_scope_links(&page, &allowed);
        let links: Vec<&str> = links.iter().map(Url::as_str).collect();
        assert_eq!(links, vec!["http://a.test/x", "http://a.test/dir/pic.png"]);
    }

    #[tokio::test]
    async fn test_scope_and_deduplication() {
        let mock_server = MockServer::start().await;
        let root = format!(
            r#"<html><body>
                <a href="{0}/x">X</a>
                <a href="http://b.test/y">out of scope</a>
                <a href="{0}/x">X again</a>
            </body></html>"#,
            mock_server.uri()
        );
        mount_page(&mock_server, "/", root).await;
        mount_page(&mock_server, "/x", "<html><a href='/'>home</a></html>".to_string()).await;

        let requestor = shared_requestor();
        let crawler = EndpointCrawler::new(requestor.clone());
        let seed = Endpoint::parse(&format!("{}/", mock_server.uri()), "GET").unwrap();

        let found = crawler.crawl(vec![seed]).await;

        assert_eq!(
            urls(&found),
            vec![
                format!("{}/", mock_server.uri()),
                format!("{}/x", mock_server.uri())
            ]
        );
        assert!(found.iter().all(|e| e.http_method == "GET"));
        // each page fetched exactly once
        assert_eq!(mock_server.received_requests().await.unwrap().len(), 2);
        assert_eq!(requestor.queued().await, 0);
    }

    #[tokio::test]
    async fn test_depth_caps_rounds_but_keeps_discoveries() {
        let mock_server = MockServer::start().await;
        mount_page(&mock_server, "/", "<a href='/1'>1</a>".to_string()).await;
        mount_page(&mock_server, "/1", "<a href='/2'>2</a>".to_string()).await;
        mount_page(&mock_server, "/2", "<a href='/3'>3</a>".to_string()).await;

        let rounds = Arc::new(AtomicUsize::new(0));
        let rounds_clone = rounds.clone();
        let crawler = EndpointCrawler::new(shared_requestor())
            .with_max_depth(2)
            .with_progress_callback(Arc::new(move |round, _| {
                rounds_clone.store(round, Ordering::SeqCst);
            }));
        let seed = Endpoint::parse(&format!("{}/", mock_server.uri()), "GET").unwrap();

        let found = crawler.crawl(vec![seed]).await;

        // /2 was discovered in the last round but never fetched
        assert_eq!(found.len(), 3);
        assert!(found[2].url.path() == "/2");
        assert_eq!(rounds.load(Ordering::SeqCst), 2);
        let fetched: Vec<String> = mock_server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .map(|r| r.url.path().to_string())
            .collect();
        assert_eq!(fetched.len(), 2);
        assert!(!fetched.contains(&"/2".to_string()));
    }

    #[tokio::test]
    async fn test_failed_seed_does_not_stop_crawl() {
        let mock_server = MockServer::start().await;
        mount_page(&mock_server, "/", "<a href='/search?q=1'>search</a>".to_string()).await;
        mount_page(&mock_server, "/search", String::new()).await;

        let crawler = EndpointCrawler::new(shared_requestor());
        let seeds = vec![
            Endpoint::parse("http://127.0.0.1:1/", "GET").unwrap(),
            Endpoint::parse(&format!("{}/", mock_server.uri()), "GET").unwrap(),
        ];

        let found = crawler.crawl(seeds).await;

        assert_eq!(found.len(), 3);
        assert_eq!(found[2].url.query(), Some("q=1"));
    }

    #[tokio::test]
    async fn test_explicit_allowed_domains() {
        let mock_server = MockServer::start().await;
        mount_page(&mock_server, "/", "<a href='/next'>next</a>".to_string()).await;

        let crawler =
            EndpointCrawler::new(shared_requestor()).with_allowed_domains(["elsewhere.test"]);
        let seed = Endpoint::parse(&format!("{}/", mock_server.uri()), "GET").unwrap();

        let found = crawler.crawl(vec![seed]).await;
        assert_eq!(found.len(), 1);
    }
}
