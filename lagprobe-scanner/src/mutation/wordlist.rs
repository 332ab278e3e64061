use super::{BatchTracker, Candidate};
use crate::error::Result;
use lagprobe_core::wordlist::load_wordlist;
use lagprobe_core::{Endpoint, Measurement};
use std::path::Path;
use std::sync::Arc;

pub const DEFAULT_BATCH_SIZE: usize = 200;

/// Replaces allow-listed query parameters with every entry of a value
/// wordlist. Needs no feedback.
#[derive(Debug, Clone)]
pub struct WordlistMutator {
    wordlist: Arc<Vec<String>>,
    param_list: Arc<Vec<String>>,
    batch_size: usize,
}

impl WordlistMutator {
    pub fn new(wordlist: Vec<String>, param_list: Vec<String>) -> Self {
        Self {
            wordlist: Arc::new(wordlist),
            param_list: Arc::new(param_list),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn from_files(wordlist_path: &Path, param_list_path: &Path) -> Result<Self> {
        Ok(Self::new(
            load_wordlist(wordlist_path)?,
            load_wordlist(param_list_path)?,
        ))
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn stream(&self, endpoint: &Endpoint) -> WordlistStream {
        let targets = if self.wordlist.is_empty() {
            Vec::new()
        } else {
            endpoint
                .get_url_params()
                .into_iter()
                .map(|(key, _)| key)
                .filter(|key| self.param_list.contains(key))
                .collect()
        };

        WordlistStream {
            base: endpoint.clone(),
            wordlist: self.wordlist.clone(),
            targets,
            batch_size: self.batch_size,
            baseline_sent: false,
            param_index: 0,
            word_index: 0,
            since_boundary: 0,
            tracker: BatchTracker::default(),
        }
    }
}

/// Baseline first, then one sweep over the wordlist per targeted parameter.
///
/// A batch closes every `batch_size` candidates and at the end of each
/// sweep, so batches never span two parameters.
pub struct WordlistStream {
    base: Endpoint,
    wordlist: Arc<Vec<String>>,
    targets: Vec<String>,
    batch_size: usize,
    baseline_sent: bool,
    param_index: usize,
    word_index: usize,
    since_boundary: usize,
    tracker: BatchTracker,
}

impl WordlistStream {
    pub fn next_candidate(&mut self) -> Result<Option<Candidate>> {
        self.tracker.check_pull()?;

        if !self.baseline_sent {
            self.baseline_sent = true;
            // The baseline closes the batch only when nothing follows it
            let last = self.targets.is_empty();
            return Ok(Some(self.emit(self.base.clone(), last)));
        }

        let Some(key) = self.targets.get(self.param_index) else {
            return Ok(None);
        };

        let word = &self.wordlist[self.word_index];
        let endpoint = self.base.with_param(key, word);
        let sweep_end = self.word_index + 1 == self.wordlist.len();

        if sweep_end {
            self.param_index += 1;
            self.word_index = 0;
        } else {
            self.word_index += 1;
        }

        Ok(Some(self.emit(endpoint, sweep_end)))
    }

    pub fn feedback(&mut self, endpoint: &Endpoint, _measurement: Measurement) -> Result<()> {
        self.tracker.accept(endpoint).map(|_| ())
    }

    fn emit(&mut self, endpoint: Endpoint, force_boundary: bool) -> Candidate {
        self.since_boundary += 1;
        let batch_end = force_boundary || self.since_boundary >= self.batch_size;
        if batch_end {
            self.since_boundary = 0;
        }
        self.tracker.record(Candidate::new(endpoint, batch_end))
    }
}
