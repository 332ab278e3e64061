use crate::CLAP_STYLING;
use clap::{Arg, ArgAction, arg, command};
use std::path::PathBuf;
use url::Url;

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("lagprobe")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("lagprobe")
        .about("Finds query parameters whose values make a web application disproportionately slow")
        .styles(CLAP_STYLING)
        .arg(
            arg!(-q --"quiet" "Suppress banner, progress and summary output")
                .required(false)
                .global(true),
        )
        .arg(
            arg!(-v --"verbose" "Log verbosity (-v info, -vv debug, -vvv trace)")
                .action(ArgAction::Count)
                .global(true),
        )
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            command!("genetic")
                .about(
                    "Evolve parameter values with a genetic algorithm, selecting for the values \
                that increase response time the most",
                )
                .args(general_args())
                .arg(
                    arg!(-p --"population-size" <SIZE>)
                        .required(false)
                        .help("Individuals per generation")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("20"),
                )
                .arg(
                    arg!(-e --"evolutions" <COUNT>)
                        .required(false)
                        .help("Generations evaluated per parameter")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("5"),
                )
                .arg(
                    arg!(--"mutation-rate" <PROBABILITY>)
                        .required(false)
                        .help("Chance that an individual is mutated each generation (0.0 - 1.0)")
                        .value_parser(clap::value_parser!(f64))
                        .default_value("0.3"),
                )
                .arg(
                    arg!(--"seed" <SEED>)
                        .required(false)
                        .help("Seed the random generator for reproducible runs")
                        .value_parser(clap::value_parser!(u64)),
                ),
        )
        .subcommand(
            command!("wordlist")
                .about("Replace matching parameters with every value of a wordlist")
                .args(general_args())
                .arg(
                    arg!(-w --"wordlist" <PATH>)
                        .required(true)
                        .help("Newline-delimited parameter values to try")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(-p --"paramlist" <PATH>)
                        .required(true)
                        .help("Newline-delimited parameter names to mutate")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(--"batch-size" <SIZE>)
                        .required(false)
                        .help("Candidates measured per batch")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("200"),
                ),
        )
}

/// Flags shared by every scan subcommand.
fn general_args() -> Vec<Arg> {
    vec![
        arg!(-t --"target" <URL>)
            .required(true)
            .help("The URL to start crawling from")
            .value_parser(clap::value_parser!(Url)),
        arg!(-c --"crawl-depth" <DEPTH>)
            .required(false)
            .help("Maximum number of crawl rounds")
            .value_parser(clap::value_parser!(usize))
            .default_value("5"),
        arg!(-E --"endpoints-file" <PATH>)
            .required(false)
            .help("Scan the newline-delimited URLs in this file instead of crawling")
            .value_parser(clap::value_parser!(PathBuf)),
        arg!(-r --"rate-limit" <RPS>)
            .required(false)
            .help("Maximum requests per second")
            .value_parser(clap::value_parser!(u32).range(1..))
            .default_value("200"),
        arg!(-H --"header" <HEADER>)
            .required(false)
            .help("Additional request header as \"Key: Value\", repeatable")
            .action(ArgAction::Append),
        arg!(-n --"no-cert-validation")
            .required(false)
            .help("Accept invalid TLS certificates")
            .action(ArgAction::SetTrue),
        arg!(-P --"proxy" <URL>)
            .required(false)
            .help("Send all requests through this proxy"),
        arg!(-o --"output" <PATH>)
            .required(false)
            .help("Write the JSON report to a file (default: stdout)")
            .value_parser(clap::value_parser!(PathBuf)),
        arg!(--"workers" <NUM_WORKERS>)
            .required(false)
            .help("Maximum concurrent requests per batch")
            .value_parser(clap::value_parser!(usize))
            .default_value("10"),
        arg!(--"samples" <COUNT>)
            .required(false)
            .help("Requests averaged into one measurement")
            .value_parser(clap::value_parser!(usize))
            .default_value("5"),
        arg!(--"warmup" <COUNT>)
            .required(false)
            .help("Leading requests discarded before sampling")
            .value_parser(clap::value_parser!(usize))
            .default_value("0"),
        arg!(--"mean" <ALGORITHM>)
            .required(false)
            .help("Mean used to combine samples: arithmetic, geometric, harmonic or quadratic")
            .default_value("arithmetic"),
        arg!(--"timeout" <SECONDS>)
            .required(false)
            .help("Request timeout in seconds, counted as the measurement on timeout")
            .value_parser(clap::value_parser!(u64))
            .default_value("120"),
        arg!(--"threshold" <CV>)
            .required(false)
            .help("Coefficient of variation above which an endpoint is reported")
            .value_parser(clap::value_parser!(f64))
            .default_value("0.6"),
    ]
}
