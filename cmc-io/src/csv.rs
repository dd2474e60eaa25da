//! CSV similarity-matrix loading and CMC curve export.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use ::csv::{ReaderBuilder, WriterBuilder};
use cmc_core::{CmcError, Result};
use cmc_stats::{CmcCurve, SimilarityMatrix};
use tracing::debug;

/// How a similarity-matrix CSV is laid out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvMatrixOptions {
    /// Header of the identifier column. `None` uses the first column.
    pub id_column: Option<String>,
    /// Field delimiter.
    pub delimiter: u8,
    /// Canonicalize integer identifiers (`"007"` and `"7"` both become `"7"`).
    pub numeric_ids: bool,
}

impl Default for CsvMatrixOptions {
    fn default() -> Self {
        Self {
            id_column: None,
            delimiter: b',',
            numeric_ids: true,
        }
    }
}

impl CsvMatrixOptions {
    pub fn with_id_column(mut self, column: impl Into<String>) -> Self {
        self.id_column = Some(column.into());
        self
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_numeric_ids(mut self, numeric_ids: bool) -> Self {
        self.numeric_ids = numeric_ids;
        self
    }

    fn canonical_id(&self, raw: &str) -> String {
        let id = raw.trim();
        if self.numeric_ids {
            if let Ok(n) = id.parse::<i64>() {
                return n.to_string();
            }
        }
        id.to_string()
    }
}

/// Read a similarity matrix from a CSV file.
///
/// The file has one header row. The identifier column holds user ids; every
/// other column header is an enrollee id and every cell a similarity score.
pub fn read_similarity_matrix(
    path: impl AsRef<Path>,
    options: &CsvMatrixOptions,
) -> Result<SimilarityMatrix> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        CmcError::Io(std::io::Error::new(
            e.kind(),
            format!("{}: {}", path.display(), e),
        ))
    })?;
    let matrix = parse_similarity_matrix(file, options)?;
    debug!(
        path = %path.display(),
        users = matrix.n_users(),
        enrollees = matrix.n_enrollees(),
        "loaded similarity matrix"
    );
    Ok(matrix)
}

/// Parse a similarity matrix from any CSV source.
pub fn parse_similarity_matrix<R: Read>(
    reader: R,
    options: &CsvMatrixOptions,
) -> Result<SimilarityMatrix> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .delimiter(options.delimiter)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| CmcError::Parse(e.to_string()))?
        .clone();

    let id_idx = match &options.id_column {
        Some(name) => headers
            .iter()
            .position(|h| h.trim() == name.as_str())
            .ok_or_else(|| CmcError::Parse(format!("id column {name:?} not found in header")))?,
        None => 0,
    };
    if headers.len() < 2 {
        return Err(CmcError::Parse(
            "header needs an id column and at least one enrollee column".into(),
        ));
    }

    let enrollees: Vec<String> = headers
        .iter()
        .enumerate()
        .filter(|&(i, _)| i != id_idx)
        .map(|(_, h)| options.canonical_id(h))
        .collect();

    let mut users = Vec::new();
    let mut data = Vec::new();
    for (line, result) in reader.records().enumerate() {
        let record = result.map_err(|e| CmcError::Parse(e.to_string()))?;
        // header is line 1
        let row_no = line + 2;
        if record.len() != headers.len() {
            return Err(CmcError::Parse(format!(
                "row {}: {} fields, expected {}",
                row_no,
                record.len(),
                headers.len()
            )));
        }
        for (i, field) in record.iter().enumerate() {
            if i == id_idx {
                users.push(options.canonical_id(field));
                continue;
            }
            let score: f64 = field.trim().parse().map_err(|_| {
                CmcError::Parse(format!(
                    "row {}, column {:?}: invalid score {:?}",
                    row_no, &headers[i], field
                ))
            })?;
            data.push(score);
        }
    }

    SimilarityMatrix::from_flat(users, enrollees, data)
}

/// Write the curve as `rank,recognition_rate` rows.
pub fn write_curve_csv(path: impl AsRef<Path>, curve: &CmcCurve) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| {
        CmcError::Io(std::io::Error::new(
            e.kind(),
            format!("{}: {}", path.display(), e),
        ))
    })?;
    let mut writer = WriterBuilder::new().has_headers(true).from_writer(file);
    for point in curve.points() {
        writer
            .serialize(point)
            .map_err(|e| CmcError::Other(e.to_string()))?;
    }
    writer.flush()?;
    debug!(path = %path.display(), points = curve.n_ranks(), "wrote CMC curve");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MATRIX: &str = "\
subject_id,1,2,3
1,0.9,0.1,0.2
2,0.3,0.8,0.1
3,0.2,0.4,0.7
";

    #[test]
    fn parse_basic_matrix() {
        let m = parse_similarity_matrix(MATRIX.as_bytes(), &CsvMatrixOptions::default()).unwrap();
        assert_eq!(m.n_users(), 3);
        assert_eq!(m.n_enrollees(), 3);
        assert_eq!(m.users(), &["1", "2", "3"]);
        assert_eq!(m.row(2), &[0.2, 0.4, 0.7]);
        assert_eq!(m.genuine_column(1), 1);
    }

    #[test]
    fn id_column_by_name() {
        let text = "a,b,subject_id\n0.9,0.1,a\n0.2,0.8,b\n";
        let opts = CsvMatrixOptions::default().with_id_column("subject_id");
        let m = parse_similarity_matrix(text.as_bytes(), &opts).unwrap();
        assert_eq!(m.enrollees(), &["a", "b"]);
        assert_eq!(m.users(), &["a", "b"]);
        assert_eq!(m.row(0), &[0.9, 0.1]);
    }

    #[test]
    fn numeric_ids_canonicalized() {
        let text = "id,001,002\n1,0.9,0.1\n2,0.1,0.9\n";
        let m = parse_similarity_matrix(text.as_bytes(), &CsvMatrixOptions::default()).unwrap();
        assert_eq!(m.enrollees(), &["1", "2"]);

        let exact = CsvMatrixOptions::default().with_numeric_ids(false);
        let err = parse_similarity_matrix(text.as_bytes(), &exact).unwrap_err();
        assert!(matches!(err, CmcError::InvalidMatrix(_)));
    }

    #[test]
    fn semicolon_delimiter() {
        let text = "id;a;b\na;1.0;0.0\nb;0.0;1.0\n";
        let opts = CsvMatrixOptions::default().with_delimiter(b';');
        let m = parse_similarity_matrix(text.as_bytes(), &opts).unwrap();
        assert_eq!(m.n_enrollees(), 2);
    }

    #[test]
    fn bad_score_reports_location() {
        let text = "id,1,2\n1,0.9,abc\n2,0.1,0.9\n";
        let err = parse_similarity_matrix(text.as_bytes(), &CsvMatrixOptions::default()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("row 2"));
        assert!(msg.contains("abc"));
    }

    #[test]
    fn short_row_reports_field_count() {
        let text = "id,1,2\n1,0.9,0.1\n2,0.1\n";
        let err = parse_similarity_matrix(text.as_bytes(), &CsvMatrixOptions::default()).unwrap_err();
        assert!(matches!(err, CmcError::Parse(_)));
        assert_eq!(err.to_string(), "parse error: row 3: 2 fields, expected 3");
    }

    #[test]
    fn long_row_rejected() {
        let text = "id,1,2\n1,0.9,0.1,0.5\n2,0.1,0.9\n";
        let err = parse_similarity_matrix(text.as_bytes(), &CsvMatrixOptions::default()).unwrap_err();
        assert!(err.to_string().contains("row 2: 4 fields, expected 3"));
    }

    #[test]
    fn missing_id_column() {
        let opts = CsvMatrixOptions::default().with_id_column("subject_id");
        let err = parse_similarity_matrix("id,1\n1,0.5\n".as_bytes(), &opts).unwrap_err();
        assert!(matches!(err, CmcError::Parse(_)));
    }

    #[test]
    fn header_only_is_invalid() {
        let err = parse_similarity_matrix("id,1,2\n".as_bytes(), &CsvMatrixOptions::default())
            .unwrap_err();
        assert!(matches!(err, CmcError::InvalidMatrix(_)));
    }

    #[test]
    fn read_from_file() {
        let mut file = NamedTempFile::with_suffix(".csv").unwrap();
        write!(file, "{MATRIX}").unwrap();
        file.flush().unwrap();

        let m = read_similarity_matrix(file.path(), &CsvMatrixOptions::default()).unwrap();
        assert_eq!(m.n_users(), 3);
    }

    #[test]
    fn file_not_found() {
        let result = read_similarity_matrix("/nonexistent/matrix.csv", &CsvMatrixOptions::default());
        assert!(matches!(result, Err(CmcError::Io(_))));
    }

    #[test]
    fn write_curve() {
        let m = parse_similarity_matrix(MATRIX.as_bytes(), &CsvMatrixOptions::default()).unwrap();
        let curve = cmc_stats::cmc_curve(&m, &cmc_stats::CmcConfig::new(3));
        let out = NamedTempFile::with_suffix(".csv").unwrap();
        write_curve_csv(out.path(), &curve).unwrap();

        let text = std::fs::read_to_string(out.path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "rank,recognition_rate");
        assert_eq!(lines[1], "1,1.0");
        assert_eq!(lines.len(), 4);
    }
}
