//! Per-gene display overrides read from a headerless `id,label,color` CSV.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use log::debug;
use rustc_hash::FxHashMap;
use thiserror::Error;

/// Errors that can occur while loading the override table.
#[derive(Error, Debug)]
pub enum OptionsError {
    #[error("Failed to open options file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Malformed options CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("line {line}: expected 3 columns (id,label,color), found {found}")]
    MissingColumn { line: u64, found: usize },
}

/// Display values replacing a feature's defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverrideRecord {
    pub label: String,
    pub color: String,
}

/// Identifier (verbatim first column) to override.
pub type OverrideTable = FxHashMap<String, OverrideRecord>;

/// Loads the override table from `path`.
pub fn load_options<P: AsRef<Path>>(path: P) -> Result<OverrideTable, OptionsError> {
    let file = File::open(path.as_ref())?;
    read_options(file)
}

/// Reads override rows in file order; a repeated identifier keeps the last row.
pub fn read_options<R: Read>(reader: R) -> Result<OverrideTable, OptionsError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut table = OverrideTable::default();
    for (idx, result) in csv_reader.records().enumerate() {
        let record = result?;
        if record.len() < 3 {
            let line = record.position().map_or(idx as u64 + 1, |p| p.line());
            return Err(OptionsError::MissingColumn { line, found: record.len() });
        }

        let id = record[0].to_string();
        let entry = OverrideRecord {
            label: record[1].to_string(),
            color: record[2].to_string(),
        };
        if table.insert(id.clone(), entry).is_some() {
            debug!("Override for '{}' replaced by a later row", id);
        }
    }

    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_rows_are_keyed_by_first_column() {
        let table = read_options("g1,Gene1,#ff0000\ng2,Gene2,blue\n".as_bytes()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(
            table["g2"],
            OverrideRecord { label: "Gene2".to_string(), color: "blue".to_string() }
        );
    }

    #[test]
    fn test_last_write_wins() {
        let table = read_options("g1,Gene1,#ff0000\ng1,Gene1-dup,#00ff00\n".as_bytes()).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table["g1"].label, "Gene1-dup");
        assert_eq!(table["g1"].color, "#00ff00");
    }

    #[test]
    fn test_keys_are_verbatim() {
        let table = read_options("GeneA,A,red\n".as_bytes()).unwrap();
        assert!(table.contains_key("GeneA"));
        assert!(!table.contains_key("genea"));
    }

    #[test]
    fn test_short_row_fails() {
        let err = read_options("g1,Gene1,red\ng2,Gene2\n".as_bytes()).unwrap_err();
        assert!(matches!(err, OptionsError::MissingColumn { line: 2, found: 2 }));
    }

    #[test]
    fn test_quoted_label_and_extra_columns() {
        let table = read_options("g1,\"dnaA, initiator\",#112233,ignored\n".as_bytes()).unwrap();
        assert_eq!(table["g1"].label, "dnaA, initiator");
        assert_eq!(table["g1"].color, "#112233");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "locus_1,lacZ,green").unwrap();
        let table = load_options(file.path()).unwrap();
        assert_eq!(table["locus_1"].label, "lacZ");
    }

    #[test]
    fn test_missing_file() {
        let err = load_options("/nonexistent/options.csv").unwrap_err();
        assert!(matches!(err, OptionsError::IoError(_)));
    }
}
