//! DIMACS CNF and WCNF parser

use crate::{
    clause::{Weight, MAXWEIGHT},
    formula::WeightedFormula,
    input::Input,
    literal::Literal,
    memory::Vector,
};
use std::{
    fs::File,
    io::{self, BufReader, BufWriter, Error, Read, Result, StdinLock},
};

/// File extension of Zstandard archives.
const ZSTD: &str = ".zst";
/// File extension of Gzip archives.
const GZIP: &str = ".gz";
/// File extension of Bzip2 archives.
const BZIP2: &str = ".bz2";
/// File extension of XZ archives.
const XZ: &str = ".xz";
/// File extension of LZ4 archives.
const LZ4: &str = ".lz4";

/// Open a file for reading, naming it in the error.
pub fn open_file(filename: &str) -> Result<File> {
    File::open(filename)
        .map_err(|err| Error::new(err.kind(), format!("cannot open {}: {}", filename, err)))
}

/// Open a file for writing, naming it in the error.
pub fn open_file_for_writing(filename: &str) -> Result<BufWriter<File>> {
    File::create(filename)
        .map(BufWriter::new)
        .map_err(|err| {
            Error::new(
                err.kind(),
                format!("cannot open {} for writing: {}", filename, err),
            )
        })
}

/// Strip the compression format off a filename.
///
/// If the filename ends with a known archive extension,
/// return the filename without extension and the extension.
/// Otherwise return the unmodified filename and the empty string.
pub fn compression_format_by_extension(filename: &str) -> (&str, &str) {
    for extension in &[ZSTD, GZIP, BZIP2, LZ4, XZ] {
        if filename.ends_with(extension) {
            return (&filename[0..filename.len() - extension.len()], *extension);
        }
    }
    (filename, "")
}

/// Return an [Input](../input/struct.Input.html) to read from a possibly
/// compressed file, or from stdin if the filename is "-".
pub fn read_compressed_file_or_stdin<'a>(filename: &str, stdin: StdinLock<'a>) -> Result<Input<'a>> {
    match filename {
        "-" => Ok(Input::new(Box::new(stdin.bytes().map(panic_on_error)))),
        filename => read_compressed_file(filename),
    }
}

/// Return an [Input](../input/struct.Input.html) to read from a possibly
/// compressed file.
pub fn read_compressed_file<'a>(filename: &str) -> Result<Input<'a>> {
    let file = open_file(filename)?;
    Ok(Input::new(read_from_compressed_file(file, filename)?))
}

/// Return an Iterator to read from a possibly compressed file.
///
/// If the file is compressed it is transparently uncompressed.
fn read_from_compressed_file<'a>(
    file: File,
    filename: &str,
) -> Result<Box<dyn Iterator<Item = u8> + 'a>> {
    let (_basename, compression_format) = compression_format_by_extension(filename);
    let source: Box<dyn Iterator<Item = u8> + 'a> = match compression_format {
        ZSTD => Box::new(
            zstd::stream::read::Decoder::new(file)?
                .bytes()
                .map(panic_on_error),
        ),
        GZIP => Box::new(flate2::read::GzDecoder::new(file).bytes().map(panic_on_error)),
        BZIP2 => Box::new(bzip2::read::BzDecoder::new(file).bytes().map(panic_on_error)),
        XZ => Box::new(xz2::read::XzDecoder::new(file).bytes().map(panic_on_error)),
        LZ4 => Box::new(lz4::Decoder::new(file)?.bytes().map(panic_on_error)),
        _ => Box::new(BufReader::new(file).bytes().map(panic_on_error)),
    };
    Ok(source)
}

/// Unwraps a result, exiting on error.
pub fn panic_on_error<T>(result: Result<T>) -> T {
    result.unwrap_or_else(|error| die!("{}", error))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    /// Every clause has weight one.
    Cnf,
    /// Every clause starts with its weight; weights of at least `top` are hard.
    Wcnf { top: Option<Weight> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Header {
    format: Format,
    maxvar: usize,
    clauses: Option<u64>,
}

/// Parse the problem line, if any.
///
/// A file without a problem line is read as WCNF without a top weight,
/// where hard clauses are marked with `h`.
fn parse_header(input: &mut Input) -> Result<Header> {
    loop {
        input.skip_any_whitespace();
        match input.peek() {
            Some(b'c') => input.skip_line(),
            Some(b'p') => break,
            _ => {
                return Ok(Header {
                    format: Format::Wcnf { top: None },
                    maxvar: 0,
                    clauses: None,
                })
            }
        }
    }
    input.expect(b"p", Input::HEADER)?;
    input.skip_blanks();
    let wcnf = input.peek() == Some(b'w');
    if wcnf {
        input.next();
    }
    input.expect(b"cnf", Input::HEADER)?;
    input.skip_blanks();
    let maxvar = input.parse_unsigned()?;
    if maxvar > i32::max_value() as u64 {
        return Err(input.error(Input::VARIABLE));
    }
    input.skip_blanks();
    let clauses = input.parse_unsigned()?;
    input.skip_blanks();
    let mut top = None;
    if wcnf && input.peek().map_or(false, Input::is_digit) {
        top = Some(input.parse_unsigned()?);
        input.skip_blanks();
    }
    match input.peek() {
        None | Some(b'\n') | Some(b'\r') => (),
        Some(_) => return Err(input.error(Input::HEADER)),
    }
    Ok(Header {
        format: if wcnf { Format::Wcnf { top } } else { Format::Cnf },
        maxvar: maxvar as usize,
        clauses: Some(clauses),
    })
}

/// Parse the weight that starts a clause line.
fn parse_weight(input: &mut Input, format: Format) -> Result<Weight> {
    if input.peek() == Some(b'h') {
        input.next();
        input.skip_some_whitespace()?;
        return Ok(MAXWEIGHT);
    }
    match format {
        Format::Cnf => Ok(1),
        Format::Wcnf { top } => {
            let weight = input.parse_unsigned()?;
            input.skip_some_whitespace()?;
            Ok(match top {
                Some(top) if weight >= top => MAXWEIGHT,
                _ => weight,
            })
        }
    }
}

/// Parse a zero-terminated clause; it may span several lines.
fn parse_literals(input: &mut Input, literals: &mut Vector<Literal>) -> Result<()> {
    literals.clear();
    loop {
        input.skip_any_whitespace();
        if input.peek().is_none() {
            return Err(input.error(Input::EOF));
        }
        let value = input.parse_signed()?;
        input.skip_some_whitespace()?;
        if value == 0 {
            return Ok(());
        }
        literals.push(Literal::new(value));
    }
}

/// Parse a DIMACS CNF or WCNF formula.
pub fn parse_formula(mut input: Input) -> Result<WeightedFormula> {
    let header = parse_header(&mut input)?;
    let mut formula = WeightedFormula::new(header.maxvar);
    let mut literals = Vector::new();
    loop {
        input.skip_any_whitespace();
        match input.peek() {
            None => break,
            Some(b'c') => {
                input.skip_line();
                continue;
            }
            Some(_) => (),
        }
        let weight = parse_weight(&mut input, header.format)?;
        parse_literals(&mut input, &mut literals)?;
        formula.push(literals.clone(), weight);
    }
    if let Some(expected) = header.clauses {
        if expected != formula.clauses.len() as u64 {
            warn!(
                "header announces {} clauses, found {}",
                expected,
                formula.clauses.len()
            );
        }
    }
    Ok(formula)
}

/// Read and parse a formula from a possibly compressed file, or stdin for "-".
pub fn parse_formula_file(filename: &str) -> Result<WeightedFormula> {
    let stdin = io::stdin();
    let input = read_compressed_file_or_stdin(filename, stdin.lock())?;
    parse_formula(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{env, fs, io::ErrorKind, io::Write, process};

    fn parse(text: &str) -> Result<WeightedFormula> {
        parse_formula(Input::from_bytes(text.as_bytes()))
    }

    fn clauses(formula: &WeightedFormula) -> Vec<(Vec<i32>, Weight)> {
        formula
            .clauses
            .iter()
            .map(|clause| {
                (
                    clause.literals.iter().map(|literal| literal.decode()).collect(),
                    clause.weight,
                )
            })
            .collect()
    }

    #[test]
    fn plain_cnf() {
        let formula = parse("c comment\np cnf 3 2\n1 -2 0\nc inner\n3\n -1 0\n").unwrap();
        assert_eq!(formula.maxvar, 3);
        assert_eq!(clauses(&formula), vec![(vec![1, -2], 1), (vec![3, -1], 1)]);
    }

    #[test]
    fn weighted_with_top() {
        let formula = parse("p wcnf 2 3 10\n10 1 2 0\n3 -1 0\n11 -2 0\n").unwrap();
        assert_eq!(
            clauses(&formula),
            vec![(vec![1, 2], MAXWEIGHT), (vec![-1], 3), (vec![-2], MAXWEIGHT)]
        );
    }

    #[test]
    fn hard_marker_and_missing_header() {
        let formula = parse("c no header\nh 1 2 0\n4 -1 0\n").unwrap();
        assert_eq!(formula.maxvar, 2);
        assert_eq!(clauses(&formula), vec![(vec![1, 2], MAXWEIGHT), (vec![-1], 4)]);
        let formula = parse("p cnf 1 1\nh 1 0\n").unwrap();
        assert_eq!(clauses(&formula), vec![(vec![1], MAXWEIGHT)]);
    }

    #[test]
    fn variables_extend_the_header() {
        let formula = parse("p cnf 1 1\n1 5 0\n").unwrap();
        assert_eq!(formula.maxvar, 5);
    }

    #[test]
    fn empty_clause() {
        let formula = parse("p wcnf 1 1\n7 0\n").unwrap();
        assert_eq!(clauses(&formula), vec![(vec![], 7)]);
    }

    #[test]
    fn errors_carry_positions() {
        let error = parse("p dnf 1 1\n").unwrap_err();
        assert_eq!(error.kind(), ErrorKind::InvalidData);
        assert!(error.to_string().contains("line 1"));
        let error = parse("p cnf 2 1\n1 2").unwrap_err();
        assert!(error.to_string().starts_with(Input::EOF));
        let error = parse("p cnf 2 1\n1 x 0\n").unwrap_err();
        assert_eq!(error.to_string(), "expected number at line 2 column 3");
        assert!(parse("p cnf 1 1\n1-2 0\n").is_err());
        assert!(parse("p cnf 1 1 extra\n").is_err());
        assert!(parse("p cnf 1 1\n2147483648 0\n").is_err());
    }

    #[test]
    fn compression_extensions() {
        assert_eq!(compression_format_by_extension("a.wcnf.xz"), ("a.wcnf", XZ));
        assert_eq!(compression_format_by_extension("a.cnf.zst"), ("a.cnf", ZSTD));
        assert_eq!(compression_format_by_extension("a.cnf"), ("a.cnf", ""));
    }

    #[test]
    fn gzip_file() {
        let path = env::temp_dir().join(format!("bbmax-parser-{}.wcnf.gz", process::id()));
        let filename = path.to_str().unwrap();
        let file = File::create(&path).unwrap();
        let mut encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        encoder.write_all(b"p wcnf 2 2 5\n5 1 2 0\n2 -1 0\n").unwrap();
        encoder.finish().unwrap();
        let formula = parse_formula_file(filename).unwrap();
        fs::remove_file(&path).unwrap();
        assert_eq!(clauses(&formula), vec![(vec![1, 2], MAXWEIGHT), (vec![-1], 2)]);
        assert!(parse_formula_file("/nonexistent/bbmax.cnf").is_err());
    }

    #[test]
    fn plain_file_next_to_stdin() {
        let path = env::temp_dir().join(format!("bbmax-parser-{}.cnf", process::id()));
        let filename = path.to_str().unwrap();
        fs::write(&path, "p cnf 2 1
-1 2 0
").unwrap();
        let stdin = std::io::stdin();
        let input = read_compressed_file_or_stdin(filename, stdin.lock()).unwrap();
        let formula = parse_formula(input).unwrap();
        fs::remove_file(&path).unwrap();
        assert_eq!(clauses(&formula), vec![(vec![-1, 2], 1)]);
    }
}
