use anyhow::{Context, Result, anyhow, bail};
use clap::ArgMatches;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use lagprobe_core::{Endpoint, MeanAlgorithm, ScanReport};
use lagprobe_scanner::crawler::ProgressCallback;
use lagprobe_scanner::scanner::ScanProgressCallback;
use lagprobe_scanner::{
    DosScanner, EndpointCrawler, EndpointSource, GeneticConfig, GeneticMutator, Mutator,
    RequestConfig, Requestor, RequestorSettings, ScanOutcome, WordlistMutator,
};
use std::fs;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{Level, info, warn};
use url::Url;

/// Max log level for a `-v` count.
pub fn log_level(verbosity: u8) -> Level {
    match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

pub fn init_logging(verbosity: u8) {
    tracing_subscriber::fmt()
        .with_max_level(log_level(verbosity))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Expands a leading `~` in user supplied paths.
pub fn expand_path(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).as_ref())
}

/// Load and parse URLs from a file
pub fn load_urls_from_file(path: &Path) -> Result<Vec<String>, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read endpoints file {}: {}", path.display(), e))?;

    let urls: Vec<String> = content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| parse_url_line(line.trim()))
        .collect();

    if urls.is_empty() {
        return Err(format!("No valid URLs found in {}", path.display()));
    }

    Ok(urls)
}

/// Parse a single line as a URL, trying to add http:// if needed
pub fn parse_url_line(line: &str) -> Option<String> {
    if let Ok(url) = Url::parse(line)
        && url.has_host()
    {
        return Some(line.to_string());
    }

    let with_scheme = format!("http://{}", line);
    if Url::parse(&with_scheme).is_ok() {
        return Some(with_scheme);
    }

    warn!("Skipping invalid URL '{}'", line);
    None
}

/// GET endpoints for every URL of an endpoints file.
pub fn load_endpoints_from_file(path: &Path) -> Result<Vec<Endpoint>> {
    load_urls_from_file(path)
        .map_err(|e| anyhow!(e))?
        .iter()
        .map(|url| Endpoint::parse(url, "GET").with_context(|| format!("Invalid URL {}", url)))
        .collect()
}

pub fn request_config(args: &ArgMatches) -> Result<RequestConfig> {
    let headers: Vec<&String> = args
        .get_many::<String>("header")
        .map(|values| values.collect())
        .unwrap_or_default();
    let timeout = *args.get_one::<u64>("timeout").unwrap_or(&120);

    let mut config = RequestConfig::new()
        .with_header_lines(&headers)
        .context("Invalid --header")?
        .with_certificate_validation(!args.get_flag("no-cert-validation"))
        .with_timeout(Duration::from_secs(timeout));
    if let Some(proxy) = args.get_one::<String>("proxy") {
        config = config.with_proxy(proxy);
    }
    Ok(config)
}

pub fn requestor_settings(args: &ArgMatches) -> Result<RequestorSettings> {
    let defaults = RequestorSettings::default();
    let rate_limit = args
        .get_one::<u32>("rate-limit")
        .and_then(|&rps| NonZeroU32::new(rps))
        .unwrap_or(defaults.rate_limit);
    let mean = match args.get_one::<String>("mean") {
        Some(name) => name.parse::<MeanAlgorithm>()?,
        None => defaults.mean,
    };

    Ok(RequestorSettings {
        rate_limit,
        workers: (*args.get_one::<usize>("workers").unwrap_or(&defaults.workers)).max(1),
        samples: (*args.get_one::<usize>("samples").unwrap_or(&defaults.samples)).max(1),
        warmup: *args.get_one::<usize>("warmup").unwrap_or(&defaults.warmup),
        mean,
        ..defaults
    })
}

pub fn build_mutator(kind: &str, args: &ArgMatches) -> Result<Mutator> {
    match kind {
        "genetic" => {
            let defaults = GeneticConfig::default();
            let mutation_rate = *args
                .get_one::<f64>("mutation-rate")
                .unwrap_or(&defaults.mutation_rate);
            if !(0.0..=1.0).contains(&mutation_rate) {
                bail!("--mutation-rate must be between 0.0 and 1.0, got {}", mutation_rate);
            }
            let config = GeneticConfig {
                population_size: *args
                    .get_one::<usize>("population-size")
                    .unwrap_or(&defaults.population_size),
                max_evolutions: *args
                    .get_one::<usize>("evolutions")
                    .unwrap_or(&defaults.max_evolutions),
                mutation_rate,
                seed: args.get_one::<u64>("seed").copied(),
            };
            Ok(GeneticMutator::new(config).into())
        }
        "wordlist" => {
            let wordlist = args
                .get_one::<PathBuf>("wordlist")
                .context("--wordlist is required")?;
            let paramlist = args
                .get_one::<PathBuf>("paramlist")
                .context("--paramlist is required")?;
            let batch_size = *args.get_one::<usize>("batch-size").unwrap_or(&200);

            let mutator =
                WordlistMutator::from_files(&expand_path(wordlist), &expand_path(paramlist))?
                    .with_batch_size(batch_size);
            Ok(mutator.into())
        }
        other => bail!("Unknown mutator '{}'", other),
    }
}

fn spinner(quiet: bool) -> Result<ProgressBar> {
    if quiet {
        return Ok(ProgressBar::hidden());
    }
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
    spinner.enable_steady_tick(Duration::from_millis(100));
    Ok(spinner)
}

/// Runs one scan subcommand end to end.
pub async fn handle_scan(kind: &str, args: &ArgMatches, quiet: bool) -> Result<()> {
    let target = args
        .get_one::<Url>("target")
        .context("--target is required")?
        .clone();
    let depth = *args.get_one::<usize>("crawl-depth").unwrap_or(&5);
    let threshold = *args.get_one::<f64>("threshold").unwrap_or(&0.6);
    let output = args.get_one::<PathBuf>("output").map(|p| expand_path(p));

    let mutator = build_mutator(kind, args)?;
    let requestor = Arc::new(Requestor::new(request_config(args)?, requestor_settings(args)?)?);
    let seed = Endpoint::get(target.clone());

    let progress = spinner(quiet)?;
    progress.set_message(format!("Checking connectivity to {}", target));
    if let Err(e) = requestor.check_connectivity(&seed).await {
        progress.finish_and_clear();
        return Err(e).with_context(|| format!("{} is not reachable", target));
    }
    info!("{} is reachable", target);

    let source = match args.get_one::<PathBuf>("endpoints-file") {
        Some(path) => EndpointSource::List(load_endpoints_from_file(&expand_path(path))?),
        None => {
            let bar = progress.clone();
            let crawl_progress: ProgressCallback = Arc::new(move |round, found| {
                bar.set_message(format!("Crawling: round {}, {} endpoints found", round, found));
            });
            progress.set_message(format!("Crawling {}", target));
            EndpointSource::Crawl {
                crawler: EndpointCrawler::new(requestor.clone())
                    .with_max_depth(depth)
                    .with_progress_callback(crawl_progress),
                seeds: vec![seed],
            }
        }
    };

    let bar = progress.clone();
    let scan_progress: ScanProgressCallback =
        Arc::new(move |index: usize, total: usize, endpoint: &Endpoint| {
            bar.set_message(format!("[{}/{}] {}", index + 1, total, endpoint.url));
        });

    let outcome = DosScanner::new(requestor, mutator, source)
        .with_threshold(threshold)
        .with_progress_callback(scan_progress)
        .scan_target()
        .await;
    progress.finish_and_clear();
    let outcome = outcome.context("Scan failed")?;

    let report = ScanReport::new(&outcome.vulnerable, &outcome.crawled);
    write_report(&report, output.as_deref())?;

    if !quiet {
        print_summary(&outcome, output.as_deref());
    }
    Ok(())
}

/// Writes the JSON report to `output`, or to stdout when absent.
pub fn write_report(report: &ScanReport, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => report
            .write_to_file(path)
            .with_context(|| format!("Failed to write report to {}", path.display())),
        None => {
            println!("{}", report.to_json()?);
            Ok(())
        }
    }
}

fn print_summary(outcome: &ScanOutcome, output: Option<&Path>) {
    let with_params = outcome.crawled.iter().filter(|e| e.has_url_params()).count();

    eprintln!();
    eprintln!("{} Scan complete", "✓".green().bold());
    eprintln!(
        "  {} Endpoints crawled: {}",
        "→".blue(),
        outcome.crawled.len().to_string().bright_white()
    );
    eprintln!(
        "  {} With query parameters: {}",
        "→".blue(),
        with_params.to_string().bright_white()
    );

    if outcome.vulnerable.is_empty() {
        eprintln!("  {} No vulnerable endpoints found", "✓".green());
    } else {
        eprintln!(
            "  {} Potentially vulnerable: {}",
            "⚠".yellow().bold(),
            outcome.vulnerable.len().to_string().red().bold()
        );
        for finding in &outcome.vulnerable {
            eprintln!("    {} {}", "•".yellow(), finding);
        }
    }

    if let Some(path) = output {
        eprintln!(
            "  {} Report: {}",
            "→".blue(),
            path.display().to_string().bright_white()
        );
    }
}
