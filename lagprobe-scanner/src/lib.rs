pub mod config;
pub mod crawler;
pub mod error;
pub mod links;
pub mod mutation;
pub mod requestor;
pub mod result;
pub mod scanner;

pub use config::{RequestConfig, RequestorSettings};
pub use crawler::EndpointCrawler;
pub use error::ScanError;
pub use mutation::{GeneticConfig, GeneticMutator, Mutator, WordlistMutator};
pub use requestor::Requestor;
pub use result::ResponseData;
pub use scanner::{DEFAULT_CV_THRESHOLD, DosScanner, EndpointSource, ScanOutcome};
