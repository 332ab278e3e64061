use super::{BatchTracker, Candidate};
use crate::error::Result;
use lagprobe_core::{Endpoint, GeneticEndpoint, Measurement};
use rand::distr::Distribution;
use rand::distr::weighted::WeightedIndex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, trace};

const SPECIAL_CHARACTERS: &[char] = &[
    '.', ',', ':', ';', '-', '+', '_', '#', '*', '~', '?', '!', '/', '\\', '<', '>',
];

#[derive(Debug, Clone, PartialEq)]
pub struct GeneticConfig {
    pub population_size: usize,
    pub max_evolutions: usize,
    /// Probability that an individual is touched by one operator per
    /// generation.
    pub mutation_rate: f64,
    /// Fixed seed for reproducible runs. Every endpoint's stream starts from
    /// the same seed.
    pub seed: Option<u64>,
}

impl Default for GeneticConfig {
    fn default() -> Self {
        Self {
            population_size: 20,
            max_evolutions: 5,
            mutation_rate: 0.3,
            seed: None,
        }
    }
}

/// Evolves the value of each query parameter towards slower responses.
#[derive(Debug, Clone)]
pub struct GeneticMutator {
    config: GeneticConfig,
}

impl GeneticMutator {
    pub fn new(mut config: GeneticConfig) -> Self {
        config.population_size = config.population_size.max(1);
        config.mutation_rate = if config.mutation_rate.is_nan() {
            0.0
        } else {
            config.mutation_rate.clamp(0.0, 1.0)
        };
        Self { config }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    pub fn config(&self) -> &GeneticConfig {
        &self.config
    }

    pub fn stream(&self, endpoint: &Endpoint) -> GeneticStream {
        let rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        };

        GeneticStream {
            base: endpoint.clone(),
            params: endpoint
                .get_url_params()
                .into_iter()
                .map(|(key, _)| key)
                .collect(),
            param_index: 0,
            config: self.config.clone(),
            rng,
            state: StreamState::NextParam,
            tracker: BatchTracker::default(),
        }
    }
}

enum StreamState {
    NextParam,
    /// Unmodified endpoint yielded as its own batch.
    Baseline {
        key: String,
        initial: Option<Measurement>,
    },
    Generation {
        key: String,
        initial: Measurement,
        evolution: usize,
        population: Vec<GeneticEndpoint>,
        yielded: usize,
    },
    Done,
}

/// Per parameter: one baseline batch, then one batch per generation.
pub struct GeneticStream {
    base: Endpoint,
    params: Vec<String>,
    param_index: usize,
    config: GeneticConfig,
    rng: StdRng,
    state: StreamState,
    tracker: BatchTracker,
}

impl GeneticStream {
    pub fn next_candidate(&mut self) -> Result<Option<Candidate>> {
        self.tracker.check_pull()?;

        loop {
            match std::mem::replace(&mut self.state, StreamState::Done) {
                StreamState::NextParam => {
                    let Some(key) = self.params.get(self.param_index).cloned() else {
                        return Ok(None);
                    };
                    self.param_index += 1;
                    debug!("Evolving parameter {} of {}", key, self.base);
                    self.state = StreamState::Baseline { key, initial: None };
                    let candidate = Candidate::new(self.base.clone(), true);
                    return Ok(Some(self.tracker.record(candidate)));
                }
                StreamState::Baseline { key, initial } => {
                    if self.config.max_evolutions == 0 {
                        self.state = StreamState::NextParam;
                        continue;
                    }
                    let mut population = vec![
                        GeneticEndpoint::new(self.base.clone(), key.clone());
                        self.config.population_size
                    ];
                    self.mutate_population(&mut population);
                    self.state = StreamState::Generation {
                        key,
                        initial: initial.unwrap_or(Measurement::Failed),
                        evolution: 0,
                        population,
                        yielded: 0,
                    };
                }
                StreamState::Generation {
                    key,
                    initial,
                    evolution,
                    population,
                    yielded,
                } if yielded < population.len() => {
                    let endpoint = population[yielded].endpoint.clone();
                    let batch_end = yielded + 1 == population.len();
                    self.state = StreamState::Generation {
                        key,
                        initial,
                        evolution,
                        population,
                        yielded: yielded + 1,
                    };
                    return Ok(Some(self.tracker.record(Candidate::new(endpoint, batch_end))));
                }
                StreamState::Generation {
                    key,
                    initial,
                    evolution,
                    population,
                    ..
                } => {
                    let evolution = evolution + 1;
                    if evolution >= self.config.max_evolutions {
                        debug!("Finished {} generations for {}", evolution, key);
                        self.state = StreamState::NextParam;
                        continue;
                    }

                    let survivors = select_survivors(
                        &population,
                        initial,
                        survivor_count(self.config.population_size),
                        &mut self.rng,
                    );
                    let mut population =
                        breed(survivors, self.config.population_size, &mut self.rng);
                    self.mutate_population(&mut population);
                    self.state = StreamState::Generation {
                        key,
                        initial,
                        evolution,
                        population,
                        yielded: 0,
                    };
                }
                StreamState::Done => return Ok(None),
            }
        }
    }

    pub fn feedback(&mut self, endpoint: &Endpoint, measurement: Measurement) -> Result<()> {
        let index = self.tracker.accept(endpoint)?;
        match &mut self.state {
            StreamState::Baseline { initial, .. } => *initial = Some(measurement),
            StreamState::Generation { population, .. } => {
                if let Some(individual) = population.get_mut(index) {
                    individual.measurement = Some(measurement);
                }
            }
            StreamState::NextParam | StreamState::Done => {}
        }
        Ok(())
    }

    fn mutate_population(&mut self, population: &mut [GeneticEndpoint]) {
        for individual in population.iter_mut() {
            if self.rng.random_bool(self.config.mutation_rate) {
                let operator = MutationOperator::random(&mut self.rng);
                let value = operator.apply(&individual.param_value(), &mut self.rng);
                trace!("{:?} -> {:?}", operator, value);
                individual.set_param_value(&value);
            }
        }
    }
}

fn survivor_count(population_size: usize) -> usize {
    (population_size / 2).max(1)
}

/// Single-step edits applied to the tracked parameter value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOperator {
    AppendDigit,
    Negate,
    AppendLowercase,
    AppendUppercase,
    AppendSpecial,
    AppendNonPrintable,
    Duplicate,
    DropFirst,
    DropLast,
}

impl MutationOperator {
    pub const ALL: [MutationOperator; 9] = [
        MutationOperator::AppendDigit,
        MutationOperator::Negate,
        MutationOperator::AppendLowercase,
        MutationOperator::AppendUppercase,
        MutationOperator::AppendSpecial,
        MutationOperator::AppendNonPrintable,
        MutationOperator::Duplicate,
        MutationOperator::DropFirst,
        MutationOperator::DropLast,
    ];

    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::ALL[rng.random_range(0..Self::ALL.len())]
    }

    /// Drop operators leave values of one character or less untouched.
    pub fn apply<R: Rng + ?Sized>(self, value: &str, rng: &mut R) -> String {
        match self {
            MutationOperator::AppendDigit => {
                format!("{}{}", value, rng.random_range(0..10u8))
            }
            MutationOperator::Negate => format!("-{}", value),
            MutationOperator::AppendLowercase => {
                format!("{}{}", value, rng.random_range('a'..='z'))
            }
            MutationOperator::AppendUppercase => {
                format!("{}{}", value, rng.random_range('A'..='Z'))
            }
            MutationOperator::AppendSpecial => {
                let c = SPECIAL_CHARACTERS[rng.random_range(0..SPECIAL_CHARACTERS.len())];
                format!("{}{}", value, c)
            }
            MutationOperator::AppendNonPrintable => {
                // 0x00..=0x1F plus DEL
                let code = rng.random_range(0..=0x20u8);
                let c = if code == 0x20 { 0x7F } else { code };
                format!("{}{}", value, c as char)
            }
            MutationOperator::Duplicate => value.repeat(2),
            MutationOperator::DropFirst if value.chars().count() > 1 => {
                value.chars().skip(1).collect()
            }
            MutationOperator::DropLast if value.chars().count() > 1 => {
                let mut chars = value.chars();
                chars.next_back();
                chars.as_str().to_string()
            }
            MutationOperator::DropFirst | MutationOperator::DropLast => value.to_string(),
        }
    }
}

/// Latency gained over the baseline. Failed measurements count as zero
/// latency.
fn fitness(individual: &GeneticEndpoint, initial: Measurement) -> i128 {
    let latency = |m: Option<Measurement>| m.and_then(Measurement::micros).unwrap_or(0) as i128;
    latency(individual.measurement) - latency(Some(initial))
}

/// Draws `count` survivors with replacement, weighting rank `r` (best first)
/// by `1 / (r + 0.5)`.
pub fn select_survivors<R: Rng + ?Sized>(
    population: &[GeneticEndpoint],
    initial: Measurement,
    count: usize,
    rng: &mut R,
) -> Vec<GeneticEndpoint> {
    let mut ranked: Vec<&GeneticEndpoint> = population.iter().collect();
    ranked.sort_by_key(|individual| std::cmp::Reverse(fitness(individual, initial)));

    let weights: Vec<f64> = (0..ranked.len()).map(|rank| 1.0 / (rank as f64 + 0.5)).collect();
    let Ok(distribution) = WeightedIndex::new(&weights) else {
        return Vec::new();
    };

    (0..count)
        .map(|_| ranked[distribution.sample(rng)].clone())
        .collect()
}

/// Splices `parent1[..split] + parent2[split..]` at a random split within the
/// shorter value. The child tracks `parent1`'s parameter.
pub fn crossover<R: Rng + ?Sized>(
    parent1: &GeneticEndpoint,
    parent2: &GeneticEndpoint,
    rng: &mut R,
) -> GeneticEndpoint {
    let first: Vec<char> = parent1.param_value().chars().collect();
    let second: Vec<char> = parent2.param_value().chars().collect();
    let split = rng.random_range(0..=first.len().min(second.len()));

    let value: String = first[..split].iter().chain(&second[split..]).collect();
    let mut child = parent1.clone();
    child.set_param_value(&value);
    child
}

/// Refills the population to `size` with children of distinct survivor pairs.
pub fn breed<R: Rng + ?Sized>(
    mut survivors: Vec<GeneticEndpoint>,
    size: usize,
    rng: &mut R,
) -> Vec<GeneticEndpoint> {
    survivors.truncate(size);
    let parents = survivors.len();
    if parents == 0 {
        return survivors;
    }

    let mut population = survivors;
    while population.len() < size {
        let child = if parents == 1 {
            population[0].clone()
        } else {
            let i = rng.random_range(0..parents);
            let mut j = rng.random_range(0..parents - 1);
            if j >= i {
                j += 1;
            }
            crossover(&population[i], &population[j], rng)
        };
        population.push(child);
    }
    population
}
