//! Loading model responses and benchmark questions.
//!
//! Responses come from a two-column CSV (index, response). Questions come
//! from every `*.jsonl` file in the dataset directory, read in filename
//! order and concatenated. The response with index `i` belongs to question
//! row `i`.

use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fs;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use verity_core::error::DatasetError;

/// Model responses keyed by question index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseSet {
    entries: Vec<(usize, String)>,
}

impl ResponseSet {
    /// Responses for rows `0..responses.len()` in order.
    pub fn from_responses(responses: Vec<String>) -> Self {
        Self {
            entries: responses.into_iter().enumerate().collect(),
        }
    }

    pub fn from_pairs(entries: Vec<(usize, String)>) -> Self {
        Self { entries }
    }

    /// Read a CSV file with a header row and exactly two columns.
    pub fn from_csv_path(path: &Path) -> Result<Self, DatasetError> {
        info!(path = %path.display(), "Reading the LLM responses");
        let file = fs::File::open(path).map_err(|source| DatasetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_csv_reader(file, path)
    }

    /// Parse CSV content; `origin` only labels errors.
    pub fn from_csv_reader<R: Read>(reader: R, origin: &Path) -> Result<Self, DatasetError> {
        let csv_error = |e: csv::Error| DatasetError::Csv {
            path: origin.to_path_buf(),
            message: e.to_string(),
        };
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let columns = reader.headers().map_err(csv_error)?.len();
        if columns != 2 {
            return Err(DatasetError::ColumnCount { found: columns });
        }

        let mut entries = Vec::new();
        for record in reader.records() {
            let record = record.map_err(csv_error)?;
            if record.len() != 2 {
                return Err(DatasetError::ColumnCount {
                    found: record.len(),
                });
            }
            let raw_index = record[0].trim();
            let index = raw_index
                .parse::<usize>()
                .map_err(|_| DatasetError::InvalidIndex {
                    index: raw_index.to_string(),
                    reason: "not a non-negative integer".to_string(),
                })?;
            entries.push((index, record[1].to_string()));
        }
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[(usize, String)] {
        &self.entries
    }
}

/// One benchmark question joined with the model's response.
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedRow {
    pub index: usize,
    pub record: Map<String, Value>,
    pub response: String,
}

impl CombinedRow {
    /// The `source` field, or an empty string when absent.
    pub fn source(&self) -> &str {
        self.record
            .get("source")
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    /// A required field rendered as text; arrays are joined with `"; "`.
    pub fn text_field(&self, field: &str) -> Result<String, DatasetError> {
        match self.record.get(field) {
            None | Some(Value::Null) => Err(DatasetError::MissingField {
                row: self.index,
                source_name: self.source().to_string(),
                field: field.to_string(),
            }),
            Some(Value::String(s)) => Ok(s.clone()),
            Some(Value::Array(items)) => Ok(items
                .iter()
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join("; ")),
            Some(other) => Ok(other.to_string()),
        }
    }
}

/// Every record of every `*.jsonl` file under `dir`, in filename order.
pub fn load_dataset_dir(dir: &Path) -> Result<Vec<Map<String, Value>>, DatasetError> {
    if !dir.is_dir() {
        return Err(DatasetError::DirectoryNotFound {
            path: dir.to_path_buf(),
        });
    }
    info!(path = %dir.display(), "Reading the dataset");

    let io_error = |source| DatasetError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(io_error)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "jsonl"))
        .collect();
    files.sort();

    let mut records = Vec::new();
    for path in files {
        let before = records.len();
        read_jsonl(&path, &mut records)?;
        debug!(
            file = %path.display(),
            rows = records.len() - before,
            "Read dataset file"
        );
    }
    Ok(records)
}

fn read_jsonl(path: &Path, out: &mut Vec<Map<String, Value>>) -> Result<(), DatasetError> {
    let file = fs::File::open(path).map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    for (i, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|source| DatasetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let parse_error = |message: String| DatasetError::Parse {
            path: path.to_path_buf(),
            line: i + 1,
            message,
        };
        match serde_json::from_str::<Value>(&line).map_err(|e| parse_error(e.to_string()))? {
            Value::Object(map) => out.push(map),
            other => return Err(parse_error(format!("expected a JSON object, got {}", other))),
        }
    }
    Ok(())
}

/// Attach each response to the question row its index names.
///
/// Every row must receive exactly one response.
pub fn combine(
    responses: &ResponseSet,
    records: Vec<Map<String, Value>>,
) -> Result<Vec<CombinedRow>, DatasetError> {
    if responses.len() != records.len() {
        return Err(DatasetError::LengthMismatch {
            responses: responses.len(),
            questions: records.len(),
        });
    }

    let mut by_index: Vec<Option<String>> = vec![None; records.len()];
    let mut seen = HashSet::new();
    for (index, response) in responses.entries() {
        if !seen.insert(*index) {
            return Err(DatasetError::InvalidIndex {
                index: index.to_string(),
                reason: "duplicate index".to_string(),
            });
        }
        let slot = by_index
            .get_mut(*index)
            .ok_or_else(|| DatasetError::InvalidIndex {
                index: index.to_string(),
                reason: format!("out of range for {} questions", records.len()),
            })?;
        *slot = Some(response.clone());
    }

    records
        .into_iter()
        .zip(by_index)
        .enumerate()
        .map(|(index, (record, response))| {
            let response = response.ok_or_else(|| DatasetError::InvalidIndex {
                index: index.to_string(),
                reason: "no response for this question".to_string(),
            })?;
            Ok(CombinedRow {
                index,
                record,
                response,
            })
        })
        .collect()
}

/// Load questions from `dataset_dir` and join them with `responses`.
pub fn read_input(
    responses: &ResponseSet,
    dataset_dir: &Path,
) -> Result<Vec<CombinedRow>, DatasetError> {
    let records = load_dataset_dir(dataset_dir)?;
    combine(responses, records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::TempDir;

    fn record(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_csv_two_columns() {
        let csv = "index,response\n0,Yes it is prime.\n1,\"No, never.\"\n";
        let set = ResponseSet::from_csv_reader(csv.as_bytes(), Path::new("r.csv")).unwrap();
        assert_eq!(
            set.entries(),
            &[(0, "Yes it is prime.".to_string()), (1, "No, never.".to_string())]
        );
    }

    #[test]
    fn test_csv_wrong_column_count() {
        let csv = "index,response,extra\n0,a,b\n";
        let err = ResponseSet::from_csv_reader(csv.as_bytes(), Path::new("r.csv")).unwrap_err();
        assert!(matches!(err, DatasetError::ColumnCount { found: 3 }));
    }

    #[test]
    fn test_csv_bad_index() {
        let csv = "index,response\nfirst,a\n";
        let err = ResponseSet::from_csv_reader(csv.as_bytes(), Path::new("r.csv")).unwrap_err();
        assert!(matches!(err, DatasetError::InvalidIndex { .. }));
    }

    #[test]
    fn test_dataset_dir_reads_jsonl_in_name_order() {
        let dir = TempDir::new().unwrap();
        let mut b = fs::File::create(dir.path().join("b.jsonl")).unwrap();
        writeln!(b, r#"{{"source": "freshqa", "question": "q2"}}"#).unwrap();
        let mut a = fs::File::create(dir.path().join("a.jsonl")).unwrap();
        writeln!(a, r#"{{"source": "snowballing", "topic": "Primality Testing"}}"#).unwrap();
        writeln!(a).unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let records = load_dataset_dir(dir.path()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["source"], "snowballing");
        assert_eq!(records[1]["source"], "freshqa");
    }

    #[test]
    fn test_dataset_dir_parse_error_names_line() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.jsonl"), "{\"source\": \"x\"}\nnot json\n").unwrap();
        match load_dataset_dir(dir.path()).unwrap_err() {
            DatasetError::Parse { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_missing_dataset_dir() {
        let err = load_dataset_dir(Path::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, DatasetError::DirectoryNotFound { .. }));
    }

    #[test]
    fn test_combine_aligns_by_index() {
        let responses =
            ResponseSet::from_pairs(vec![(1, "second".to_string()), (0, "first".to_string())]);
        let rows = combine(
            &responses,
            vec![record(json!({"source": "a"})), record(json!({"source": "b"}))],
        )
        .unwrap();
        assert_eq!(rows[0].response, "first");
        assert_eq!(rows[1].response, "second");
        assert_eq!(rows[1].source(), "b");
    }

    #[test]
    fn test_combine_length_mismatch() {
        let responses = ResponseSet::from_responses(vec!["only one".into()]);
        let err = combine(&responses, vec![]).unwrap_err();
        assert!(matches!(
            err,
            DatasetError::LengthMismatch {
                responses: 1,
                questions: 0
            }
        ));
    }

    #[test]
    fn test_combine_rejects_duplicate_and_out_of_range() {
        let records = || vec![record(json!({})), record(json!({}))];
        let dup = ResponseSet::from_pairs(vec![(0, "a".into()), (0, "b".into())]);
        assert!(matches!(
            combine(&dup, records()),
            Err(DatasetError::InvalidIndex { .. })
        ));
        let far = ResponseSet::from_pairs(vec![(0, "a".into()), (5, "b".into())]);
        assert!(matches!(
            combine(&far, records()),
            Err(DatasetError::InvalidIndex { .. })
        ));
    }

    #[test]
    fn test_text_field_variants() {
        let row = CombinedRow {
            index: 3,
            record: record(json!({"source": "freshqa", "reference_answer": ["a", "b"], "n": 4})),
            response: String::new(),
        };
        assert_eq!(row.text_field("reference_answer").unwrap(), "a; b");
        assert_eq!(row.text_field("n").unwrap(), "4");
        match row.text_field("question").unwrap_err() {
            DatasetError::MissingField {
                row, source_name, ..
            } => {
                assert_eq!(row, 3);
                assert_eq!(source_name, "freshqa");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
