//! Verify solution reports produced by bbmax

use bbmax_common::{
    comment, die,
    formula::WeightedFormula,
    output::{install_signal_handler, print_solution},
    parser::parse_formula_file,
    qubo::{QuadraticModel, QuboEncoding},
    report::Report,
    search::SearchConfig,
    solver::solve,
};
use clap::Arg;

fn main() {
    std::process::exit(run_frontend());
}

fn read_input(filename: &str, qubo: bool) -> (WeightedFormula, Option<QuboEncoding>) {
    if qubo {
        let encoding = QuadraticModel::load(filename)
            .and_then(|model| model.encode())
            .unwrap_or_else(|err| die!("{}", err));
        (encoding.formula.clone(), Some(encoding))
    } else {
        let formula = parse_formula_file(filename).unwrap_or_else(|err| die!("{}", err));
        (formula, None)
    }
}

/// Compare the reported energy with the one implied by the reported cost.
fn check_energy(report: &Report, encoding: &QuboEncoding) -> Result<(), String> {
    let expected = encoding.energy(report.cost);
    match report.energy {
        None => Err("the report has no energy".to_string()),
        Some(energy) if (energy - expected).abs() > 1e-9 * expected.abs().max(1.0) => Err(format!(
            "the reported energy {} differs from {}",
            energy, expected
        )),
        Some(_) => Ok(()),
    }
}

fn run_frontend() -> i32 {
    install_signal_handler();
    let app = clap::App::new("bbmax-check")
        .version(env!("CARGO_PKG_VERSION"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .arg(
            Arg::with_name("INPUT")
                .required(true)
                .help("input file in DIMACS CNF or WCNF format"),
        )
        .arg(
            Arg::with_name("REPORT")
                .required(true)
                .help("report file written by bbmax --report"),
        )
        .arg(
            Arg::with_name("QUBO")
                .short("q")
                .long("qubo")
                .help("Read INPUT as a QUBO or Ising model in TOML format."),
        )
        .arg(
            Arg::with_name("SOLVE")
                .short("s")
                .long("solve")
                .help("Also solve the formula and check that the reported cost is optimal."),
        );
    let matches = app.get_matches();
    let input_filename = matches.value_of("INPUT").unwrap();
    let report_filename = matches.value_of("REPORT").unwrap();

    let (formula, encoding) = read_input(input_filename, matches.is_present("QUBO"));
    let report = Report::load(report_filename).unwrap_or_else(|err| die!("{}", err));
    let mut result = if matches.is_present("SOLVE") {
        let config = SearchConfig {
            report_improvements: false,
            ..SearchConfig::default()
        };
        let optimum = solve(&formula, &config).cost;
        report.check_optimum(&formula, optimum)
    } else {
        report.check(&formula)
    };
    if let Some(encoding) = &encoding {
        result = result.and_then(|()| check_energy(&report, encoding));
    }
    match result {
        Ok(()) => {
            print_solution("VERIFIED");
            0
        }
        Err(reason) => {
            comment!("{}", reason);
            print_solution("NOT VERIFIED");
            1
        }
    }
}
