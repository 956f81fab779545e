//! Tabular codec: the persisted CSV form of a requirements table.
//!
//! The canonical on-disk form is RFC 4180 CSV with snake_case headers, the
//! core columns in fixed order, extension columns appended in sorted order,
//! pipe-delimited sorted list cells, and `True`/`False` boolean literals.
//! Legacy tables with `Req_ID`-style PascalCase headers are detected on load
//! and written back in the same case.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::{Result, RtmError};
use crate::model::{Priority, Requirement, Status};
use crate::refs::{join_id_set, parse_id_set};

/// Known columns, canonical order: the twenty core columns, then the
/// external-system id. Extension columns follow in sorted order.
pub const CANONICAL_COLUMNS: [&str; 21] = [
    "req_id",
    "category",
    "subcategory",
    "requirement_text",
    "target_value",
    "test_module",
    "test_function",
    "validation_method",
    "status",
    "priority",
    "phase",
    "notes",
    "effort_weeks",
    "dependencies",
    "blocks",
    "assignee",
    "sprint",
    "started_date",
    "completed_date",
    "requirement_file",
    "external_id",
];

/// Header spelling of a persisted table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HeaderCase {
    /// `req_id`, `requirement_text`, … (canonical).
    #[default]
    Snake,
    /// `Req_ID`, `Requirement_Text`, … (legacy).
    Pascal,
}

impl HeaderCase {
    /// Detect the case used by a header row.
    pub fn detect<'a>(headers: impl IntoIterator<Item = &'a str>) -> Self {
        for header in headers {
            if header.chars().any(|c| c.is_ascii_uppercase()) {
                return Self::Pascal;
            }
        }
        Self::Snake
    }

    /// Render a canonical snake_case column name in this case.
    pub fn render(&self, name: &str) -> String {
        match self {
            Self::Snake => name.to_string(),
            Self::Pascal => name
                .split('_')
                .map(|segment| {
                    if segment == "id" {
                        "ID".to_string()
                    } else {
                        let mut chars = segment.chars();
                        match chars.next() {
                            Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                            None => String::new(),
                        }
                    }
                })
                .collect::<Vec<_>>()
                .join("_"),
        }
    }
}

/// A loaded table: records in file order plus the header case it was
/// persisted with.
#[derive(Debug, Clone)]
pub struct TableFile {
    pub records: Vec<Requirement>,
    pub header_case: HeaderCase,
}

/// Parse a boolean cell. Accepts any case of `true`/`false`.
pub fn parse_bool_cell(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

/// Canonical boolean literal.
pub fn format_bool_cell(value: bool) -> &'static str {
    if value { "True" } else { "False" }
}

fn bad_table(path: &Path, line: Option<u64>, message: impl Into<String>) -> RtmError {
    RtmError::BadTable {
        path: path.to_path_buf(),
        line,
        message: message.into(),
    }
}

/// Load a requirements table.
///
/// Fails with [`RtmError::BadTable`] when the header is missing, no data rows
/// follow it, or a row is malformed beyond CSV recovery. Diagnostics carry
/// 1-based line numbers.
pub fn load_table(path: &Path) -> Result<TableFile> {
    let content = fs::read_to_string(path)
        .map_err(|e| bad_table(path, None, format!("cannot read table: {e}")))?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let raw_headers = reader
        .headers()
        .map_err(|e| bad_table(path, Some(1), format!("unreadable header: {e}")))?
        .clone();

    let headers: Vec<String> = raw_headers.iter().map(|h| h.trim().to_string()).collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(bad_table(path, Some(1), "missing header row"));
    }

    let header_case = HeaderCase::detect(headers.iter().map(String::as_str));
    let normalized: Vec<String> = headers.iter().map(|h| h.to_lowercase()).collect();
    if !normalized.iter().any(|h| h == "req_id") {
        return Err(bad_table(path, Some(1), "header has no req_id column"));
    }

    let mut records = Vec::new();
    for (idx, row) in reader.records().enumerate() {
        let line = idx as u64 + 2;
        let row = row.map_err(|e| bad_table(path, Some(line), format!("malformed row: {e}")))?;
        let cells: BTreeMap<String, String> = normalized
            .iter()
            .zip(row.iter())
            .map(|(name, cell)| (name.clone(), cell.trim().to_string()))
            .collect();
        records.push(record_from_row(&cells));
    }

    if records.is_empty() {
        return Err(bad_table(path, None, "table is empty after the header"));
    }

    debug!(
        path = %path.display(),
        records = records.len(),
        case = ?header_case,
        "loaded requirements table"
    );
    Ok(TableFile {
        records,
        header_case,
    })
}

/// Decode one normalized row into a requirement. Unknown columns land in
/// `extra`; empty numeric cells decode as absent.
pub fn record_from_row(row: &BTreeMap<String, String>) -> Requirement {
    let cell = |name: &str| row.get(name).cloned().unwrap_or_default();

    let phase = match cell("phase").as_str() {
        "" => None,
        raw => raw.parse::<i64>().ok(),
    };
    let effort_weeks = match cell("effort_weeks").as_str() {
        "" => None,
        raw => raw.parse::<f64>().ok(),
    };

    let extra: BTreeMap<String, String> = row
        .iter()
        .filter(|(name, _)| !CANONICAL_COLUMNS.contains(&name.as_str()))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();

    Requirement {
        req_id: cell("req_id"),
        category: cell("category"),
        subcategory: cell("subcategory"),
        requirement_text: cell("requirement_text"),
        target_value: cell("target_value"),
        test_module: cell("test_module"),
        test_function: cell("test_function"),
        validation_method: cell("validation_method"),
        status: Status::from_str_lossy(&cell("status")),
        priority: match cell("priority").as_str() {
            "" => Priority::Medium,
            raw => Priority::from_str_lossy(raw),
        },
        phase,
        notes: cell("notes"),
        effort_weeks,
        dependencies: parse_id_set(&cell("dependencies")),
        blocks: parse_id_set(&cell("blocks")),
        assignee: cell("assignee"),
        sprint: cell("sprint"),
        started_date: cell("started_date"),
        completed_date: cell("completed_date"),
        requirement_file: cell("requirement_file"),
        external_id: cell("external_id"),
        extra,
    }
}

/// Encode one requirement as a normalized row (snake_case keys).
pub fn record_to_row(req: &Requirement) -> BTreeMap<String, String> {
    let mut row = BTreeMap::new();
    row.insert("req_id".to_string(), req.req_id.clone());
    row.insert("category".to_string(), req.category.clone());
    row.insert("subcategory".to_string(), req.subcategory.clone());
    row.insert("requirement_text".to_string(), req.requirement_text.clone());
    row.insert("target_value".to_string(), req.target_value.clone());
    row.insert("test_module".to_string(), req.test_module.clone());
    row.insert("test_function".to_string(), req.test_function.clone());
    row.insert(
        "validation_method".to_string(),
        req.validation_method.clone(),
    );
    row.insert("status".to_string(), req.status.as_str().to_string());
    row.insert("priority".to_string(), req.priority.as_str().to_string());
    row.insert(
        "phase".to_string(),
        req.phase.map(|p| p.to_string()).unwrap_or_default(),
    );
    row.insert("notes".to_string(), req.notes.clone());
    row.insert(
        "effort_weeks".to_string(),
        req.effort_weeks.map(|e| e.to_string()).unwrap_or_default(),
    );
    row.insert("dependencies".to_string(), join_id_set(&req.dependencies));
    row.insert("blocks".to_string(), join_id_set(&req.blocks));
    row.insert("assignee".to_string(), req.assignee.clone());
    row.insert("sprint".to_string(), req.sprint.clone());
    row.insert("started_date".to_string(), req.started_date.clone());
    row.insert("completed_date".to_string(), req.completed_date.clone());
    row.insert("requirement_file".to_string(), req.requirement_file.clone());
    row.insert("external_id".to_string(), req.external_id.clone());
    for (key, value) in &req.extra {
        row.insert(key.clone(), value.clone());
    }
    row
}

/// Save a requirements table in canonical form.
///
/// Creates missing parent directories and writes atomically: the content goes
/// to a temporary file in the target directory which is then renamed over the
/// destination.
pub fn save_table(records: &[Requirement], path: &Path, case: HeaderCase) -> Result<()> {
    let mut extension_columns: BTreeSet<String> = BTreeSet::new();
    for req in records {
        extension_columns.extend(req.extra.keys().cloned());
    }

    let mut columns: Vec<String> = CANONICAL_COLUMNS.iter().map(|c| c.to_string()).collect();
    columns.extend(extension_columns);

    let mut writer = csv::Writer::from_writer(Vec::new());
    let header: Vec<String> = columns.iter().map(|c| case.render(c)).collect();
    writer.write_record(&header)?;
    for req in records {
        let row = record_to_row(req);
        let cells: Vec<&str> = columns
            .iter()
            .map(|c| row.get(c).map(String::as_str).unwrap_or(""))
            .collect();
        writer.write_record(&cells)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| bad_table(path, None, format!("flush failed: {e}")))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let tmp = path.with_extension("csv.tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;

    debug!(path = %path.display(), records = records.len(), "saved requirements table");
    Ok(())
}
