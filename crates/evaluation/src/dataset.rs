//! Evaluation dataset resolution
//!
//! A dataset is found by trying an ordered chain of sources, each of which
//! either matches or passes. The target column is found the same way, over
//! a fixed list of candidate names, and textual labels are mapped through a
//! fixed table.

use crate::errors::{EvaluationError, Result};
use bcdash_model_core::FeatureSchema;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info};

/// Target column names, tried in order
pub const TARGET_CANDIDATES: [&str; 3] = ["diagnosis", "target", "y"];

/// Textual label → class
pub const LABEL_MAPPING: [(&str, u8); 6] = [
    ("B", 0),
    ("M", 1),
    ("benign", 0),
    ("malignant", 1),
    ("Benign", 0),
    ("Malignant", 1),
];

/// A header-first CSV file held as strings
#[derive(Debug, Clone, PartialEq)]
pub struct CsvTable {
    pub path: PathBuf,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl CsvTable {
    pub fn from_csv_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let reader = reader_builder()
            .from_path(path)
            .map_err(|e| csv_error(path, e))?;
        Self::from_reader(path, reader)
    }

    /// Parse in-memory CSV text as if it had been read from `path`
    pub fn parse(path: &Path, content: &str) -> Result<Self> {
        Self::from_reader(path, reader_builder().from_reader(content.as_bytes()))
    }

    /// First record is the header; blank records are skipped and every
    /// other record must have as many fields as the header.
    fn from_reader<R: std::io::Read>(path: &Path, mut reader: csv::Reader<R>) -> Result<Self> {
        let invalid = |reason: String| EvaluationError::InvalidDataset {
            path: path.to_path_buf(),
            reason,
        };

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| csv_error(path, e))?
            .iter()
            .enumerate()
            .map(|(i, h)| {
                if i == 0 {
                    h.trim_start_matches('\u{feff}').to_string()
                } else {
                    h.to_string()
                }
            })
            .collect();
        if headers.iter().all(|h| h.is_empty()) {
            return Err(invalid("file is empty".to_string()));
        }

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| csv_error(path, e))?;
            if record.iter().all(|field| field.is_empty()) {
                continue;
            }
            if record.len() != headers.len() {
                let line = record.position().map_or(0, |p| p.line());
                return Err(invalid(format!(
                    "line {}: expected {} columns, got {}",
                    line,
                    headers.len(),
                    record.len()
                )));
            }
            rows.push(record.iter().map(str::to_string).collect());
        }

        if rows.is_empty() {
            return Err(invalid("no data rows".to_string()));
        }

        Ok(Self {
            path: path.to_path_buf(),
            headers,
            rows,
        })
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    fn display_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

fn reader_builder() -> csv::ReaderBuilder {
    let mut builder = csv::ReaderBuilder::new();
    builder.trim(csv::Trim::All).flexible(true);
    builder
}

fn csv_error(path: &Path, err: csv::Error) -> EvaluationError {
    if matches!(err.kind(), csv::ErrorKind::Io(_)) {
        EvaluationError::Io {
            path: path.to_path_buf(),
            source: err.into(),
        }
    } else {
        EvaluationError::InvalidDataset {
            path: path.to_path_buf(),
            reason: err.to_string(),
        }
    }
}

/// A matched dataset source
#[derive(Debug, Clone)]
pub struct ResolvedDataset {
    pub table: CsvTable,
    /// Provenance, e.g. `csv:wdbc.csv` or `bundled:reference_dataset.csv`
    pub source: String,
}

/// One link of the dataset fallback chain
pub trait DatasetStrategy: Debug {
    fn describe(&self) -> String;

    /// `Ok(None)` means "no match, try the next source"
    fn resolve(&self) -> Result<Option<ResolvedDataset>>;
}

/// The most recently modified `*.csv` in a directory
#[derive(Debug, Clone)]
pub struct LatestCsvIn {
    pub dir: PathBuf,
}

impl DatasetStrategy for LatestCsvIn {
    fn describe(&self) -> String {
        format!("latest *.csv in {}", self.dir.display())
    }

    fn resolve(&self) -> Result<Option<ResolvedDataset>> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(EvaluationError::Io {
                    path: self.dir.clone(),
                    source,
                })
            }
        };

        let mut latest: Option<(SystemTime, PathBuf)> = None;
        for entry in entries {
            let entry = entry.map_err(|source| EvaluationError::Io {
                path: self.dir.clone(),
                source,
            })?;
            let path = entry.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("csv") {
                continue;
            }
            let modified = entry
                .metadata()
                .and_then(|m| m.modified())
                .map_err(|source| EvaluationError::Io {
                    path: path.clone(),
                    source,
                })?;
            // newest wins; equal times fall back to the larger name
            let newer = match &latest {
                None => true,
                Some((time, best)) => (modified, &path) > (*time, best),
            };
            if newer {
                latest = Some((modified, path));
            }
        }

        let Some((_, path)) = latest else {
            return Ok(None);
        };
        let table = CsvTable::from_csv_file(&path)?;
        let source = format!("csv:{}", table.display_name());
        Ok(Some(ResolvedDataset { table, source }))
    }
}

/// The reference dataset shipped with the artifacts
#[derive(Debug, Clone)]
pub struct BundledReference {
    pub path: PathBuf,
}

impl DatasetStrategy for BundledReference {
    fn describe(&self) -> String {
        format!("bundled reference {}", self.path.display())
    }

    fn resolve(&self) -> Result<Option<ResolvedDataset>> {
        if !self.path.is_file() {
            return Ok(None);
        }
        let table = CsvTable::from_csv_file(&self.path)?;
        let source = format!("bundled:{}", table.display_name());
        Ok(Some(ResolvedDataset { table, source }))
    }
}

/// First matching source in chain order
pub fn resolve_dataset(chain: &[Box<dyn DatasetStrategy>]) -> Result<ResolvedDataset> {
    for strategy in chain {
        debug!("Trying dataset source: {}", strategy.describe());
        if let Some(resolved) = strategy.resolve()? {
            info!(
                "Using dataset {} ({} rows)",
                resolved.source,
                resolved.table.rows.len()
            );
            return Ok(resolved);
        }
    }

    let tried: Vec<String> = chain.iter().map(|s| s.describe()).collect();
    Err(EvaluationError::DatasetResolution(format!(
        "no dataset found (tried: {})",
        tried.join("; ")
    )))
}

/// First candidate present in `headers`
pub fn resolve_target_column<'a>(headers: &[String], candidates: &[&'a str]) -> Option<(usize, &'a str)> {
    candidates
        .iter()
        .find_map(|c| headers.iter().position(|h| h == c).map(|i| (i, *c)))
}

/// Map raw target values to classes.
///
/// A column with any non-numeric value is textual and goes through
/// [`LABEL_MAPPING`]; a numeric column must hold only 0 and 1.
pub fn map_labels(values: &[&str]) -> std::result::Result<Vec<u8>, String> {
    let textual = values.iter().any(|v| v.parse::<f64>().is_err());

    let mut unmapped: Vec<String> = Vec::new();
    let labels: Vec<u8> = values
        .iter()
        .map(|raw| {
            let label = if textual {
                LABEL_MAPPING
                    .iter()
                    .find(|(text, _)| text == raw)
                    .map(|(_, class)| *class)
            } else {
                match raw.parse::<f64>() {
                    Ok(v) if v == 0.0 => Some(0),
                    Ok(v) if v == 1.0 => Some(1),
                    _ => None,
                }
            };
            label.unwrap_or_else(|| {
                if !unmapped.iter().any(|u| u == raw) {
                    unmapped.push(raw.to_string());
                }
                0
            })
        })
        .collect();

    if unmapped.is_empty() {
        Ok(labels)
    } else {
        unmapped.sort();
        Err(format!("unmapped target values {unmapped:?}"))
    }
}

/// Rows in schema order with binary labels
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledDataset {
    pub source: String,
    pub feature_names: Vec<String>,
    pub rows: Vec<Vec<f64>>,
    pub labels: Vec<u8>,
}

impl LabeledDataset {
    pub fn from_resolved(resolved: ResolvedDataset, schema: &FeatureSchema) -> Result<Self> {
        let ResolvedDataset { table, source } = resolved;

        let (target_idx, target) = resolve_target_column(&table.headers, &TARGET_CANDIDATES)
            .ok_or_else(|| {
                EvaluationError::DatasetResolution(format!(
                    "found {} but no target column ({})",
                    table.path.display(),
                    TARGET_CANDIDATES.join("/")
                ))
            })?;

        let raw: Vec<&str> = table.rows.iter().map(|r| r[target_idx].as_str()).collect();
        let labels = map_labels(&raw).map_err(|reason| {
            EvaluationError::DatasetResolution(format!(
                "{reason} in column '{target}' of {}",
                table.path.display()
            ))
        })?;

        let missing = schema.missing_from(table.headers.iter().map(String::as_str));
        if !missing.is_empty() {
            return Err(EvaluationError::MissingFeatures(missing));
        }
        let columns: Vec<usize> = schema
            .names()
            .iter()
            .filter_map(|name| table.column(name))
            .collect();

        let mut rows = Vec::with_capacity(table.rows.len());
        for (row_idx, record) in table.rows.iter().enumerate() {
            let row = columns
                .iter()
                .map(|&c| {
                    record[c].parse::<f64>().map_err(|_| EvaluationError::InvalidDataset {
                        path: table.path.clone(),
                        reason: format!(
                            "row {}: column '{}' is not numeric ('{}')",
                            row_idx + 1,
                            table.headers[c],
                            record[c]
                        ),
                    })
                })
                .collect::<Result<Vec<f64>>>()?;
            rows.push(row);
        }

        Ok(Self {
            source,
            feature_names: schema.names().to_vec(),
            rows,
            labels,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn schema() -> FeatureSchema {
        FeatureSchema::new(vec!["radius".into(), "texture".into()]).unwrap()
    }

    fn resolved(content: &str) -> ResolvedDataset {
        ResolvedDataset {
            table: CsvTable::parse(Path::new("data.csv"), content).unwrap(),
            source: "csv:data.csv".to_string(),
        }
    }

    #[test]
    fn test_quoted_fields_and_blank_lines() {
        let content = "\u{feff}id, notes ,diagnosis,radius,texture\n\
                       1,\"first line\nsecond line\",M,20.0,10.5\n\
                       \n\
                       2,\"a,b\",B,12.5,11.0\n\
                       3,\"say \"\"hi\"\"\",B,13.0,12.0\n";
        let table = CsvTable::parse(Path::new("data.csv"), content).unwrap();

        assert_eq!(table.headers, vec!["id", "notes", "diagnosis", "radius", "texture"]);
        assert_eq!(table.rows.len(), 3);
        assert_eq!(table.rows[0][1], "first line\nsecond line");
        assert_eq!(table.rows[1][1], "a,b");
        assert_eq!(table.rows[2][1], r#"say "hi""#);

        let dataset = LabeledDataset::from_resolved(
            ResolvedDataset {
                table,
                source: "csv:data.csv".to_string(),
            },
            &schema(),
        )
        .unwrap();
        assert_eq!(dataset.labels, vec![1, 0, 0]);
    }

    #[test]
    fn test_ragged_rows_are_rejected() {
        let err = CsvTable::parse(Path::new("data.csv"), "a,b,c\n1,2,3\n4,5\n").unwrap_err();
        match err {
            EvaluationError::InvalidDataset { reason, .. } => {
                assert!(reason.contains("expected 3 columns, got 2"), "{reason}")
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(CsvTable::parse(Path::new("data.csv"), "a,b\n").is_err());
    }

    #[test]
    fn test_reorders_to_schema_and_maps_labels() {
        let data = resolved("id,texture,diagnosis,radius\n1,10.5,M,20.0\n2,11.0,B,12.5\n");
        let dataset = LabeledDataset::from_resolved(data, &schema()).unwrap();
        assert_eq!(dataset.rows, vec![vec![20.0, 10.5], vec![12.5, 11.0]]);
        assert_eq!(dataset.labels, vec![1, 0]);
        assert_eq!(dataset.source, "csv:data.csv");
    }

    #[test]
    fn test_target_candidates_in_order() {
        let headers: Vec<String> = ["y", "target", "radius"].iter().map(|s| s.to_string()).collect();
        assert_eq!(
            resolve_target_column(&headers, &TARGET_CANDIDATES),
            Some((1, "target"))
        );

        let data = resolved("radius,texture,label\n1,2,M\n");
        let err = LabeledDataset::from_resolved(data, &schema()).unwrap_err();
        assert!(matches!(err, EvaluationError::DatasetResolution(_)));
    }

    #[test]
    fn test_label_mapping() {
        assert_eq!(
            map_labels(&["benign", "Malignant", "M", "B"]).unwrap(),
            vec![0, 1, 1, 0]
        );
        assert_eq!(map_labels(&["0", "1.0", "1"]).unwrap(), vec![0, 1, 1]);

        let err = map_labels(&["M", "MALIGNANT", "unknown", "MALIGNANT"]).unwrap_err();
        assert!(err.contains(r#"["MALIGNANT", "unknown"]"#), "{err}");
        assert!(map_labels(&["0", "2"]).is_err());
    }

    #[test]
    fn test_missing_feature_columns() {
        let data = resolved("radius,diagnosis\n1,M\n");
        match LabeledDataset::from_resolved(data, &schema()).unwrap_err() {
            EvaluationError::MissingFeatures(missing) => assert_eq!(missing, vec!["texture"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_fallback_chain() {
        let dir = TempDir::new().unwrap();
        let data_dir = dir.path().join("data");
        let bundled = dir.path().join("reference_dataset.csv");
        fs::write(&bundled, "radius,texture,target\n1,2,0\n").unwrap();

        let chain: Vec<Box<dyn DatasetStrategy>> = vec![
            Box::new(LatestCsvIn {
                dir: data_dir.clone(),
            }),
            Box::new(BundledReference {
                path: bundled.clone(),
            }),
        ];
        assert_eq!(
            resolve_dataset(&chain).unwrap().source,
            "bundled:reference_dataset.csv"
        );

        fs::create_dir(&data_dir).unwrap();
        fs::write(data_dir.join("notes.txt"), "ignored").unwrap();
        fs::write(data_dir.join("wdbc.csv"), "radius,texture,diagnosis\n1,2,B\n").unwrap();
        assert_eq!(resolve_dataset(&chain).unwrap().source, "csv:wdbc.csv");

        let empty: Vec<Box<dyn DatasetStrategy>> = vec![Box::new(LatestCsvIn {
            dir: dir.path().join("nowhere"),
        })];
        assert!(matches!(
            resolve_dataset(&empty),
            Err(EvaluationError::DatasetResolution(_))
        ));
    }

    #[test]
    fn test_non_numeric_feature_is_rejected() {
        let data = resolved("radius,texture,diagnosis\n1,abc,B\n");
        assert!(matches!(
            LabeledDataset::from_resolved(data, &schema()),
            Err(EvaluationError::InvalidDataset { .. })
        ));
    }
}
