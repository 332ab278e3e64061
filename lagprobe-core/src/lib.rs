pub mod error;
pub mod model;
pub mod report;
pub mod stats;
pub mod wordlist;

pub use error::CoreError;
pub use model::{Endpoint, GeneticEndpoint, MeasuredEndpoint, Measurement, UrlParams};
pub use report::ScanReport;
pub use stats::MeanAlgorithm;

use colored::Colorize;

const BANNER: &str = r#"
  _                                 _
 | | __ _  __ _ _ __  _ __ ___  ___| |__   ___
 | |/ _` |/ _` | '_ \| '__/ _ \/ _ \ '_ \ / _ \
 | | (_| | (_| | |_) | | | (_) | (_) | |_) |  __/
 |_|\__,_|\__, | .__/|_|  \___/ \___/|_.__/ \___|
          |___/|_|
"#;

/// Prints the banner to stderr so stdout stays clean for the JSON report.
pub fn print_banner() {
    eprintln!("{}", BANNER.bright_cyan().bold());
    eprintln!(
        "  {} {}\n",
        "algorithmic-complexity DoS scanner".bright_white(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
}
