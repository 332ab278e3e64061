use lagprobe::handlers::*;
use lagprobe::command_argument_builder;
use lagprobe_core::{MeanAlgorithm, ScanReport};
use lagprobe_scanner::Mutator;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::{NamedTempFile, TempDir};
use tracing::Level;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path, query_param},
};

fn sub_matches(args: &[&str]) -> (String, clap::ArgMatches) {
    let mut argv = vec!["lagprobe"];
    argv.extend_from_slice(args);
    let matches = command_argument_builder()
        .try_get_matches_from(argv)
        .unwrap();
    let (name, sub) = matches.subcommand().unwrap();
    (name.to_string(), sub.clone())
}

fn lines_file(dir: &TempDir, name: &str, lines: &[&str]) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, lines.join("\n")).unwrap();
    path
}

#[test]
fn test_parse_url_line_with_scheme() {
    let result = parse_url_line("https://example.com");
    assert_eq!(result, Some("https://example.com".to_string()));
}

#[test]
fn test_parse_url_line_without_scheme() {
    assert_eq!(
        parse_url_line("example.com"),
        Some("http://example.com".to_string())
    );
    assert_eq!(
        parse_url_line("localhost:8080/search?q=1"),
        Some("http://localhost:8080/search?q=1".to_string())
    );
}

#[test]
fn test_parse_url_line_invalid() {
    let result = parse_url_line("not a valid url!!!");
    assert_eq!(result, None);
}

#[test]
fn test_load_urls_from_file() -> Result<(), Box<dyn std::error::Error>> {
    let mut temp_file = NamedTempFile::new()?;
    writeln!(temp_file, "https://example.com/?id=1")?;
    writeln!(temp_file, "httpbin.org/get?a=b")?;
    writeln!(temp_file)?; // Empty line
    writeln!(temp_file, "https://api.example.com")?;

    let urls = load_urls_from_file(temp_file.path())?;

    assert_eq!(urls.len(), 3);
    assert_eq!(urls[0], "https://example.com/?id=1");
    assert_eq!(urls[1], "http://httpbin.org/get?a=b");
    assert_eq!(urls[2], "https://api.example.com");

    Ok(())
}

#[test]
fn test_load_urls_from_file_empty() {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(temp_file).unwrap();
    writeln!(temp_file, "   ").unwrap();

    let result = load_urls_from_file(temp_file.path());

    assert!(result.is_err());
    assert!(result.unwrap_err().contains("No valid URLs"));
}

#[test]
fn test_load_endpoints_from_file() {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(temp_file, "example.com/search?q=1").unwrap();

    let endpoints = load_endpoints_from_file(temp_file.path()).unwrap();

    assert_eq!(endpoints.len(), 1);
    assert_eq!(endpoints[0].http_method, "GET");
    assert_eq!(endpoints[0].url.as_str(), "http://example.com/search?q=1");
}

#[test]
fn test_log_level() {
    assert_eq!(log_level(0), Level::WARN);
    assert_eq!(log_level(1), Level::INFO);
    assert_eq!(log_level(2), Level::DEBUG);
    assert_eq!(log_level(3), Level::TRACE);
    assert_eq!(log_level(9), Level::TRACE);
}

#[test]
fn test_request_config_from_flags() {
    let (_, args) = sub_matches(&[
        "genetic",
        "-t",
        "http://example.test/",
        "-H",
        "Cookie: session=abc",
        "-H",
        "X-Api-Key:  secret ",
        "-n",
        "-P",
        "http://127.0.0.1:8080",
        "--timeout",
        "7",
    ]);

    let config = request_config(&args).unwrap();

    assert_eq!(config.headers.get("cookie").unwrap(), "session=abc");
    assert_eq!(config.headers.get("x-api-key").unwrap(), "secret");
    assert!(!config.validate_certificates);
    assert_eq!(config.proxy.as_deref(), Some("http://127.0.0.1:8080"));
    assert_eq!(config.timeout, Duration::from_secs(7));
}

#[test]
fn test_malformed_header_is_rejected() {
    let (_, args) = sub_matches(&["genetic", "-t", "http://example.test/", "-H", "NoColon"]);
    assert!(request_config(&args).is_err());
}

#[test]
fn test_requestor_settings_from_flags() {
    let (_, args) = sub_matches(&[
        "genetic",
        "-t",
        "http://example.test/",
        "-r",
        "50",
        "--workers",
        "4",
        "--samples",
        "3",
        "--mean",
        "Harmonic",
    ]);

    let settings = requestor_settings(&args).unwrap();

    assert_eq!(settings.rate_limit.get(), 50);
    assert_eq!(settings.workers, 4);
    assert_eq!(settings.samples, 3);
    assert_eq!(settings.mean, MeanAlgorithm::Harmonic);
}

#[test]
fn test_unsupported_mean_is_rejected() {
    let (_, args) = sub_matches(&["genetic", "-t", "http://example.test/", "--mean", "median"]);
    let err = requestor_settings(&args).unwrap_err();
    assert!(err.to_string().contains("median"));
}

#[test]
fn test_build_mutators() {
    let dir = TempDir::new().unwrap();
    let words = lines_file(&dir, "words.txt", &["1", " 2 ", "", "'"]);
    let params = lines_file(&dir, "params.txt", &["id"]);

    let (kind, args) = sub_matches(&[
        "wordlist",
        "-t",
        "http://example.test/",
        "-w",
        words.to_str().unwrap(),
        "-p",
        params.to_str().unwrap(),
    ]);
    assert!(matches!(
        build_mutator(&kind, &args).unwrap(),
        Mutator::Wordlist(_)
    ));

    let (kind, args) = sub_matches(&["genetic", "-t", "http://example.test/", "-p", "4"]);
    match build_mutator(&kind, &args).unwrap() {
        Mutator::Genetic(m) => assert_eq!(m.config().population_size, 4),
        other => panic!("expected genetic mutator, got {}", other.name()),
    }

    let (kind, args) = sub_matches(&[
        "genetic",
        "-t",
        "http://example.test/",
        "--mutation-rate",
        "1.5",
    ]);
    assert!(build_mutator(&kind, &args).is_err());
}

#[test]
fn test_missing_wordlist_file() {
    let (kind, args) = sub_matches(&[
        "wordlist",
        "-t",
        "http://example.test/",
        "-w",
        "/nonexistent/words.txt",
        "-p",
        "/nonexistent/params.txt",
    ]);
    assert!(build_mutator(&kind, &args).is_err());
}

#[test]
fn test_write_report_to_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("report.json");
    let report = ScanReport::new(&[], &[]);

    write_report(&report, Some(&path)).unwrap();

    let written: ScanReport =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(written, report);
}

#[tokio::test]
async fn test_unreachable_target_aborts() {
    let (kind, args) = sub_matches(&["genetic", "-t", "http://127.0.0.1:1/"]);

    let err = handle_scan(&kind, &args, true).await.unwrap_err();

    assert!(err.to_string().contains("not reachable"));
}

#[tokio::test]
async fn test_wordlist_scan_end_to_end() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(400)))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(20)))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string("<a href='/search?q=x'>search</a>"),
        )
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let words = lines_file(&dir, "words.txt", &["a", "b", "c", "slow"]);
    let params = lines_file(&dir, "params.txt", &["q"]);
    let output = dir.path().join("report.json");
    let target = format!("{}/", mock_server.uri());

    let (kind, args) = sub_matches(&[
        "wordlist",
        "-t",
        &target,
        "-w",
        words.to_str().unwrap(),
        "-p",
        params.to_str().unwrap(),
        "--samples",
        "1",
        "-o",
        output.to_str().unwrap(),
    ]);

    handle_scan(&kind, &args, true).await.unwrap();

    let report: ScanReport =
        serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(report.crawled_endpoints.len(), 2);
    assert_eq!(report.vulnerable_endpoints.len(), 1);
    assert!(report.vulnerable_endpoints[0].url.ends_with("/search?q=slow"));
    assert!(report.vulnerable_endpoints[0].response_time >= 400_000);
}
