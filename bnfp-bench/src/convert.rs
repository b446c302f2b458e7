//! `.bnet` to `.bn` model conversion
//!
//! A `.bnet` model is a `targets,factors` CSV with one update rule per row.
//! A `.bn` model has one `name = formula` line per variable. Conversion
//! either keeps the variable names or renames every identifier to `x<k>` in
//! order of first appearance.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Operators that are never renamed
const KEYWORDS: [&str; 3] = ["and", "or", "not"];

/// Error type for conversion
#[derive(Error, Debug)]
pub enum ConvertError {
    /// IO error
    #[error("IO error on {path}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },
    /// Malformed `.bnet` content
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    /// Input file is not a `.bnet` model
    #[error("Input file must have .bnet extension: {0}")]
    InvalidInput(PathBuf),
    /// Input path does not exist
    #[error("Input path does not exist: {0}")]
    NotFound(PathBuf),
    /// Walk directory error
    #[error("Directory walk error: {0}")]
    WalkDir(#[from] walkdir::Error),
    /// `.bnet` record without a factors column
    #[error("Line {line}: expected `target, factors`")]
    MissingFactors {
        /// 1-based line number
        line: u64,
    },
    /// Malformed `.bn` line
    #[error("Line {line}: expected `name = formula`")]
    MalformedRule {
        /// 1-based line number
        line: usize,
    },
}

/// Result type for conversion
pub type ConvertResult<T> = Result<T, ConvertError>;

/// Variable naming of the output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConvertMode {
    /// Keep the original names
    #[default]
    Verbatim,
    /// Rename identifiers to `x1`, `x2`, ...
    Canonical,
}

/// One update rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Updated variable
    pub target: String,
    /// Update formula
    pub formula: String,
}

impl Rule {
    /// Create a rule
    #[must_use]
    pub fn new(target: impl Into<String>, formula: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            formula: formula.into(),
        }
    }
}

/// A finished conversion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversion {
    /// Source `.bnet` file
    pub input: PathBuf,
    /// Written `.bn` file
    pub output: PathBuf,
    /// Number of rules
    pub rules: usize,
}

/// Parse `.bnet` content
///
/// The first record is the header. Blank lines and `#` comments are skipped.
pub fn read_bnet<R: Read>(reader: R) -> ConvertResult<Vec<Rule>> {
    let mut reader = csv::ReaderBuilder::new()
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut rules = Vec::new();
    for record in reader.records() {
        let record = record?;
        match (record.get(0), record.get(1)) {
            (Some(target), Some(formula)) => rules.push(Rule::new(target, formula)),
            _ => {
                return Err(ConvertError::MissingFactors {
                    line: record.position().map_or(0, |p| p.line()),
                });
            }
        }
    }
    Ok(rules)
}

/// Parse `.bn` content
pub fn read_bn(content: &str) -> ConvertResult<Vec<Rule>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty())
        .map(|(i, l)| {
            l.split_once(" = ")
                .map(|(t, f)| Rule::new(t.trim(), f.trim()))
                .ok_or(ConvertError::MalformedRule { line: i + 1 })
        })
        .collect()
}

/// Write rules as `.bn` lines
pub fn write_bn<W: Write>(mut writer: W, rules: &[Rule]) -> std::io::Result<()> {
    for rule in rules {
        writeln!(writer, "{} = {}", rule.target, rule.formula)?;
    }
    writer.flush()
}

/// Split text into words and separators
///
/// Words are maximal runs of ASCII alphanumerics and underscores.
fn tokens(text: &str) -> impl Iterator<Item = &str> {
    let mut rest = text;
    std::iter::from_fn(move || {
        let first = rest.chars().next()?;
        let is_word = |c: char| c.is_ascii_alphanumeric() || c == '_';
        let len = if is_word(first) {
            rest.find(|c: char| !is_word(c)).unwrap_or(rest.len())
        } else {
            first.len_utf8()
        };
        let (token, tail) = rest.split_at(len);
        rest = tail;
        Some(token)
    })
}

fn is_identifier(token: &str) -> bool {
    token.starts_with(|c: char| c.is_ascii_alphabetic())
        && !KEYWORDS.iter().any(|k| k.eq_ignore_ascii_case(token))
}

/// Identifiers in order of first appearance, with their `x<k>` names
///
/// Each rule contributes its target, then the identifiers of its formula.
#[must_use]
pub fn canonical_names(rules: &[Rule]) -> Vec<(String, String)> {
    let mut seen = HashSet::new();
    let mut names = Vec::new();
    for rule in rules {
        let words = tokens(&rule.target).chain(tokens(&rule.formula));
        for word in words.filter(|w| is_identifier(w)) {
            if seen.insert(word) {
                names.push((word.to_string(), format!("x{}", names.len() + 1)));
            }
        }
    }
    names
}

/// Rename whole identifiers of `text`
#[must_use]
pub fn rename_identifiers(text: &str, names: &HashMap<&str, &str>) -> String {
    tokens(text)
        .map(|t| names.get(t).copied().unwrap_or(t))
        .collect()
}

/// Rename every identifier of a model to its `x<k>` name
#[must_use]
pub fn canonicalize(rules: &[Rule]) -> Vec<Rule> {
    let names = canonical_names(rules);
    let lookup: HashMap<&str, &str> = names
        .iter()
        .map(|(old, new)| (old.as_str(), new.as_str()))
        .collect();
    rules
        .iter()
        .map(|r| {
            Rule::new(
                rename_identifiers(&r.target, &lookup),
                rename_identifiers(&r.formula, &lookup),
            )
        })
        .collect()
}

/// Convert one `.bnet` file next to itself
pub fn convert_file(input: &Path, mode: ConvertMode) -> ConvertResult<Conversion> {
    if input.extension().is_none_or(|e| e != "bnet") {
        return Err(ConvertError::InvalidInput(input.to_path_buf()));
    }
    let file = File::open(input).map_err(io_error(input))?;
    let mut rules = read_bnet(file)?;
    if mode == ConvertMode::Canonical {
        rules = canonicalize(&rules);
    }

    let output = input.with_extension("bn");
    let out = File::create(&output).map_err(io_error(&output))?;
    write_bn(BufWriter::new(out), &rules).map_err(io_error(&output))?;
    debug!("{} -> {} ({} rules)", input.display(), output.display(), rules.len());

    Ok(Conversion {
        input: input.to_path_buf(),
        output,
        rules: rules.len(),
    })
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> ConvertError + use<> {
    let path = path.to_path_buf();
    move |source| ConvertError::Io { path, source }
}

/// Convert a `.bnet` file, or every `.bnet` file under a directory
///
/// A directory without models yields no conversions and a warning.
pub fn convert_path(path: &Path, mode: ConvertMode) -> ConvertResult<Vec<Conversion>> {
    if path.is_file() {
        return Ok(vec![convert_file(path, mode)?]);
    }
    if !path.is_dir() {
        return Err(ConvertError::NotFound(path.to_path_buf()));
    }

    let mut conversions = Vec::new();
    for entry in WalkDir::new(path).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file() && entry.path().extension().is_some_and(|e| e == "bnet") {
            conversions.push(convert_file(entry.path(), mode)?);
        }
    }

    if conversions.is_empty() {
        warn!("No .bnet files found under {}", path.display());
    }
    Ok(conversions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::fs;
    use tempfile::tempdir;

    const MODEL: &str = "# toy model\ntargets,factors\n\nCycD, CycD\nRb, !CycD & !p27 | Rb and not E2F\np27, p27\n";

    #[test]
    fn test_read_bnet() {
        let rules = read_bnet(MODEL.as_bytes()).unwrap();
        assert_eq!(rules.len(), 3);
        assert_eq!(rules[1], Rule::new("Rb", "!CycD & !p27 | Rb and not E2F"));
    }

    #[test]
    fn test_read_bnet_rejects_ragged_rows() {
        assert!(read_bnet("targets,factors\na, b, c\n".as_bytes()).is_err());
    }

    #[test]
    fn test_read_bnet_single_column_is_error() {
        let err = read_bnet("targets\nA\n".as_bytes()).unwrap_err();
        assert!(matches!(err, ConvertError::MissingFactors { line: 2 }));
    }

    #[test]
    fn test_tokens_roundtrip() {
        let text = "!a1 & (b_2|x10) or é";
        assert_eq!(tokens(text).collect::<String>(), text);
        assert_eq!(
            tokens("a1&b").collect::<Vec<_>>(),
            ["a1", "&", "b"]
        );
    }

    #[test]
    fn test_canonical_names_order() {
        let rules = read_bnet(MODEL.as_bytes()).unwrap();
        let names = canonical_names(&rules);
        let olds: Vec<&str> = names.iter().map(|(o, _)| o.as_str()).collect();
        assert_eq!(olds, ["CycD", "Rb", "p27", "E2F"]);
        assert_eq!(names[3].1, "x4");
    }

    #[test]
    fn test_keywords_and_constants_kept() {
        let rules = vec![Rule::new("A", "A AND 1 Or NOT _b")];
        let out = canonicalize(&rules);
        assert_eq!(out[0], Rule::new("x1", "x1 AND 1 Or NOT _b"));
    }

    #[test]
    fn test_no_substring_rewrite() {
        let rules = vec![
            Rule::new("x10", "x1 & x10"),
            Rule::new("x1", "!x10"),
        ];
        let out = canonicalize(&rules);
        assert_eq!(out[0], Rule::new("x1", "x2 & x1"));
        assert_eq!(out[1], Rule::new("x2", "!x1"));
    }

    #[test]
    fn test_read_bn() {
        let rules = read_bn("a = b & c\n\nb = !a\n").unwrap();
        assert_eq!(rules, vec![Rule::new("a", "b & c"), Rule::new("b", "!a")]);
        assert!(matches!(
            read_bn("a := b\n"),
            Err(ConvertError::MalformedRule { line: 1 })
        ));
    }

    #[test]
    fn test_convert_file() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("toy.bnet");
        fs::write(&input, MODEL).unwrap();

        let conversion = convert_file(&input, ConvertMode::Verbatim).unwrap();
        assert_eq!(conversion.output, dir.path().join("toy.bn"));
        assert_eq!(conversion.rules, 3);
        let content = fs::read_to_string(&conversion.output).unwrap();
        assert_eq!(content.lines().next(), Some("CycD = CycD"));

        convert_file(&input, ConvertMode::Canonical).unwrap();
        let rules = read_bn(&fs::read_to_string(dir.path().join("toy.bn")).unwrap()).unwrap();
        assert_eq!(rules[2], Rule::new("x3", "x3"));
    }

    #[test]
    fn test_convert_path_errors() {
        let dir = tempdir().unwrap();
        let txt = dir.path().join("model.txt");
        fs::write(&txt, "targets,factors\n").unwrap();
        assert!(matches!(
            convert_path(&txt, ConvertMode::Verbatim),
            Err(ConvertError::InvalidInput(_))
        ));
        assert!(matches!(
            convert_path(&dir.path().join("missing"), ConvertMode::Verbatim),
            Err(ConvertError::NotFound(_))
        ));
    }

    #[test]
    fn test_convert_directory() {
        let dir = tempdir().unwrap();
        assert!(convert_path(dir.path(), ConvertMode::Verbatim).unwrap().is_empty());

        fs::create_dir_all(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("a.bnet"), MODEL).unwrap();
        fs::write(dir.path().join("sub/b.bnet"), MODEL).unwrap();
        fs::write(dir.path().join("sub/notes.txt"), "").unwrap();

        let conversions = convert_path(dir.path(), ConvertMode::Canonical).unwrap();
        assert_eq!(conversions.len(), 2);
        assert!(dir.path().join("sub/b.bn").is_file());
    }

    fn identifier() -> impl Strategy<Value = String> {
        "[a-zA-Z][a-zA-Z0-9_]{0,6}"
            .prop_filter("keyword", |s| !KEYWORDS.iter().any(|k| k.eq_ignore_ascii_case(s)))
    }

    proptest! {
        #[test]
        fn prop_renaming_is_bijective(names in prop::collection::hash_set(identifier(), 1..12)) {
            let names: Vec<String> = names.into_iter().collect();
            let rules: Vec<Rule> = names
                .iter()
                .enumerate()
                .map(|(i, n)| Rule::new(n.clone(), format!("!{} & {}", names[(i + 1) % names.len()], n)))
                .collect();

            let mapping = canonical_names(&rules);
            prop_assert_eq!(mapping.len(), names.len());
            let fresh: HashSet<&str> = mapping.iter().map(|(_, n)| n.as_str()).collect();
            prop_assert_eq!(fresh.len(), names.len());

            let out = canonicalize(&rules);
            let text: String = out.iter().map(|r| format!("{} = {}\n", r.target, r.formula)).collect();
            let parsed = read_bn(&text).unwrap();
            prop_assert_eq!(parsed.len(), rules.len());
            for (before, after) in rules.iter().zip(&parsed) {
                let lookup: HashMap<&str, &str> = mapping.iter().map(|(o, n)| (o.as_str(), n.as_str())).collect();
                prop_assert_eq!(&after.target, lookup[before.target.as_str()]);
            }
        }
    }
}
