use std::path::Path;

use tracing::info;

use super::defaults::sample_occupations;
use super::{RawOccupation, TaxonomyError};

/// Marker that opens annotation rows in exported classification tables.
const NOTE_PREFIX: char = '※';

/// Reads raw occupations from a JSON array of `{code, name, description}`.
/// With no path, the built-in sample taxonomy is returned.
pub fn load(path: Option<&Path>) -> Result<Vec<RawOccupation>, TaxonomyError> {
    let Some(path) = path else {
        info!("No TAXONOMY_PATH configured; using the built-in sample taxonomy");
        return Ok(sample_occupations());
    };

    info!("Reading taxonomy from {}", path.display());
    let raw = std::fs::read_to_string(path).map_err(|source| TaxonomyError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&raw).map_err(|source| TaxonomyError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Parses and cleans a JSON taxonomy document. Note rows and rows with a
/// blank code are dropped; surrounding whitespace (including full-width
/// spaces) is trimmed from every field.
pub fn parse(json: &str) -> Result<Vec<RawOccupation>, serde_json::Error> {
    let rows: Vec<RawOccupation> = serde_json::from_str(json)?;

    Ok(rows
        .into_iter()
        .map(|row| RawOccupation {
            code: row.code.trim().to_string(),
            name: row.name.trim().to_string(),
            description: row.description.trim().to_string(),
        })
        .filter(|row| !row.code.is_empty() && !row.name.starts_with(NOTE_PREFIX))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_trims_and_drops_note_rows() {
        let json = r#"[
            {"code": " 011 ", "name": "管理的公務員　", "description": " 国会議員 "},
            {"code": "　", "name": "blank code", "description": "x"},
            {"code": "999", "name": "※ 注記", "description": "note"}
        ]"#;
        let rows = parse(json).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].code, "011");
        assert_eq!(rows[0].name, "管理的公務員");
        assert_eq!(rows[0].description, "国会議員");
    }

    #[test]
    fn test_missing_description_defaults_to_empty() {
        let rows = parse(r#"[{"code": "11", "name": "a"}]"#).unwrap();
        assert_eq!(rows[0].description, "");
    }

    #[test]
    fn test_load_without_path_uses_sample() {
        let rows = load(None).unwrap();
        assert_eq!(rows.len(), 16);
    }

    #[test]
    fn test_load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"code": "32", "name": "消防", "description": "消火活動"}}]"#
        )
        .unwrap();

        let rows = load(Some(file.path())).unwrap();
        assert_eq!(rows[0].code, "32");
    }

    #[test]
    fn test_load_reports_missing_file() {
        let err = load(Some(Path::new("/nonexistent/taxonomy.json"))).unwrap_err();
        assert!(matches!(err, TaxonomyError::Io { .. }));
    }

    #[test]
    fn test_load_reports_bad_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let err = load(Some(file.path())).unwrap_err();
        assert!(matches!(err, TaxonomyError::Parse { .. }));
    }
}
