//! Exact branch-and-bound solver for weighted partial MAX-SAT and QUBO models

use bbmax_common::{
    comment, config, die,
    formula::WeightedFormula,
    output::{install_signal_handler, print_key_value, print_objective, print_solution, print_values, Timer},
    parser::parse_formula_file,
    qubo::{QuadraticModel, QuboEncoding},
    report::Report,
    search::{SearchConfig, SearchMode},
    solver::solve,
};
use clap::{Arg, ArgMatches};
use std::cmp;

/// Run `bbmax`.
fn main() {
    std::process::exit(run_frontend());
}

/// Command line settings.
pub struct Flags {
    /// Input formula, or quadratic model with `qubo`
    pub input_filename: String,
    /// The input is a TOML quadratic model instead of DIMACS
    pub qubo: bool,
    /// Present when we want to write a report
    pub report_filename: Option<String>,
    pub print_values: bool,
    pub memory_usage_breakdown: bool,
    pub config: SearchConfig,
}

impl Flags {
    /// Create a flags instance from commandline arguments.
    pub fn new(matches: ArgMatches) -> Flags {
        let mut config = match matches.value_of("CONFIG_FILE") {
            Some(filename) => SearchConfig::load(filename).unwrap_or_else(|err| die!("{}", err)),
            None => SearchConfig::default(),
        };
        if matches.is_present("BEST_FIRST") {
            config.mode = SearchMode::BestFirst;
        }
        let verbosity = cmp::min(matches.occurrences_of("v"), u64::from(u8::max_value())) as u8;
        config.verbosity = cmp::max(config.verbosity, verbosity);
        Flags {
            input_filename: matches.value_of("INPUT").unwrap().to_string(),
            qubo: matches.is_present("QUBO"),
            report_filename: matches.value_of("REPORT_FILE").map(String::from),
            print_values: !matches.is_present("NO_VALUES"),
            memory_usage_breakdown: matches.is_present("MEMORY_USAGE_BREAKDOWN"),
            config,
        }
    }
}

/// Read the input, encoding quadratic models on the way.
fn read_input(flags: &Flags) -> (WeightedFormula, Option<QuboEncoding>) {
    let _timer = Timer::name("parse time");
    if flags.qubo {
        let encoding = QuadraticModel::load(&flags.input_filename)
            .and_then(|model| model.encode())
            .unwrap_or_else(|err| die!("{}", err));
        (encoding.formula.clone(), Some(encoding))
    } else {
        let formula = parse_formula_file(&flags.input_filename).unwrap_or_else(|err| die!("{}", err));
        (formula, None)
    }
}

/// Run `bbmax`, returning its exit code.
///
/// This is a separate function because `std::process::exit` does not
/// call destructors.
fn run_frontend() -> i32 {
    install_signal_handler();
    let mut app = clap::App::new("bbmax")
        .version(env!("CARGO_PKG_VERSION"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .after_help(
            "Input files may be compressed - supported file extensions are: zst, gz, bz2, xz and lz4.
Use \"-\" as INPUT to read a DIMACS formula from standard input.",
        )
        .arg(Arg::with_name("INPUT").required(true).help("input file in DIMACS CNF or WCNF format"))
        .arg(Arg::with_name("BEST_FIRST").short("b").long("best-first")
             .help("Use best-first search instead of depth-first search."))
        .arg(Arg::with_name("QUBO").short("q").long("qubo")
             .help("Read INPUT as a QUBO or Ising model in TOML format."))
        .arg(Arg::with_name("CONFIG_FILE").takes_value(true).short("c").long("config")
             .help("Read search settings from this TOML file."))
        .arg(Arg::with_name("REPORT_FILE").takes_value(true).short("r").long("report")
             .help("Write a report that bbmax-check can verify to this file."))
        .arg(Arg::with_name("NO_VALUES").short("n").long("no-values")
             .help("Do not print the assignment."))
        .arg(Arg::with_name("MEMORY_USAGE_BREAKDOWN").short("m").long("memory-breakdown")
             .help("Output detailed memory usage metrics."));

    if config::ENABLE_LOGGING {
        app = app.arg(
            Arg::with_name("v")
                .short("v")
                .multiple(true)
                .help("Verbose output. Repeat for more detail."),
        );
    }

    let flags = Flags::new(app.get_matches());
    let timer = Timer::name("total time");
    let (formula, encoding) = read_input(&flags);
    comment!(
        "{} variables, {} clauses, {} search",
        formula.maxvar,
        formula.clauses.len(),
        match flags.config.mode {
            SearchMode::DepthFirst => "depth-first",
            SearchMode::BestFirst => "best-first",
        }
    );
    let search_timer = Timer::name("search time");
    let outcome = solve(&formula, &flags.config);
    drop(search_timer);
    outcome.statistics.print();
    let mut report = Report::new(&outcome);
    if let Some(encoding) = &encoding {
        let energy = encoding.energy(outcome.cost);
        print_key_value("energy", energy);
        report.energy = Some(energy);
    }
    drop(timer);
    if flags.memory_usage_breakdown {
        outcome.print_memory_breakdown();
    }
    if let Some(filename) = &flags.report_filename {
        report
            .write(filename)
            .unwrap_or_else(|err| die!("failed to write report: {}", err));
    }
    if outcome.is_satisfiable() && !outcome.objective_reported {
        print_objective(outcome.cost);
    }
    print_solution(report.status.verdict());
    if flags.print_values {
        print_values(&outcome.literals());
    }
    0
}
