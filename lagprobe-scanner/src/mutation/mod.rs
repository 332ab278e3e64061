//! Mutation strategies that turn one endpoint into a stream of candidates.
//!
//! A stream yields [`Candidate`]s one at a time. When a candidate closes a
//! batch the caller measures everything yielded since the previous batch and
//! reports each measurement back through [`MutationStream::feedback`], in
//! yield order, before pulling again. The [`BatchTracker`] enforces that
//! contract: pulling early or feeding back out of order is a
//! [`ScanError::MutationProtocol`].

pub mod genetic;
pub mod wordlist;

pub use genetic::{GeneticConfig, GeneticMutator, GeneticStream, MutationOperator};
pub use wordlist::{WordlistMutator, WordlistStream};

use crate::error::{Result, ScanError};
use lagprobe_core::{Endpoint, Measurement};

/// One yielded endpoint and whether it closes the current batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub endpoint: Endpoint,
    pub batch_end: bool,
}

impl Candidate {
    pub fn new(endpoint: Endpoint, batch_end: bool) -> Self {
        Self {
            endpoint,
            batch_end,
        }
    }
}

/// The implemented mutation strategies.
#[derive(Debug, Clone)]
pub enum Mutator {
    Wordlist(WordlistMutator),
    Genetic(GeneticMutator),
}

impl Mutator {
    pub fn stream(&self, endpoint: &Endpoint) -> MutationStream {
        match self {
            Mutator::Wordlist(m) => MutationStream::Wordlist(m.stream(endpoint)),
            Mutator::Genetic(m) => MutationStream::Genetic(m.stream(endpoint)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Mutator::Wordlist(_) => "wordlist",
            Mutator::Genetic(_) => "genetic",
        }
    }
}

impl From<WordlistMutator> for Mutator {
    fn from(m: WordlistMutator) -> Self {
        Mutator::Wordlist(m)
    }
}

impl From<GeneticMutator> for Mutator {
    fn from(m: GeneticMutator) -> Self {
        Mutator::Genetic(m)
    }
}

/// Candidate stream for a single endpoint.
pub enum MutationStream {
    Wordlist(WordlistStream),
    Genetic(GeneticStream),
}

impl MutationStream {
    /// Next candidate, or `None` once the endpoint is exhausted.
    pub fn next_candidate(&mut self) -> Result<Option<Candidate>> {
        match self {
            MutationStream::Wordlist(s) => s.next_candidate(),
            MutationStream::Genetic(s) => s.next_candidate(),
        }
    }

    /// Latency observed for a candidate of the batch just closed.
    pub fn feedback(&mut self, endpoint: &Endpoint, measurement: Measurement) -> Result<()> {
        match self {
            MutationStream::Wordlist(s) => s.feedback(endpoint, measurement),
            MutationStream::Genetic(s) => s.feedback(endpoint, measurement),
        }
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
enum BatchPhase {
    #[default]
    Yielding,
    AwaitingFeedback {
        received: usize,
    },
}

/// Phase marker shared by every stream implementation.
#[derive(Debug, Default)]
pub(crate) struct BatchTracker {
    phase: BatchPhase,
    batch: Vec<Endpoint>,
}

impl BatchTracker {
    /// Fails while feedback for the last closed batch is outstanding.
    pub(crate) fn check_pull(&self) -> Result<()> {
        match self.phase {
            BatchPhase::Yielding => Ok(()),
            BatchPhase::AwaitingFeedback { received } => Err(ScanError::MutationProtocol(format!(
                "pulled a candidate with {} of {} feedback calls outstanding",
                self.batch.len() - received,
                self.batch.len()
            ))),
        }
    }

    pub(crate) fn record(&mut self, candidate: Candidate) -> Candidate {
        self.batch.push(candidate.endpoint.clone());
        if candidate.batch_end {
            self.phase = BatchPhase::AwaitingFeedback { received: 0 };
        }
        candidate
    }

    /// Position of `endpoint` in the closed batch. Feedback must arrive in
    /// yield order.
    pub(crate) fn accept(&mut self, endpoint: &Endpoint) -> Result<usize> {
        let BatchPhase::AwaitingFeedback { received } = self.phase else {
            return Err(ScanError::MutationProtocol(format!(
                "feedback for {} while no batch is closed",
                endpoint
            )));
        };

        let expected = &self.batch[received];
        if expected != endpoint {
            return Err(ScanError::MutationProtocol(format!(
                "feedback for {} but {} was yielded at position {}",
                endpoint, expected, received
            )));
        }

        if received + 1 == self.batch.len() {
            self.phase = BatchPhase::Yielding;
            self.batch.clear();
        } else {
            self.phase = BatchPhase::AwaitingFeedback {
                received: received + 1,
            };
        }
        Ok(received)
    }
}
