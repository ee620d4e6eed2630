//! Spreadsheet parsing and row validation for integration bulk uploads.
//!
//! Everything here is pure: the service layer looks up which keys and users
//! already exist and hands those sets to [`plan_import`], which decides the
//! fate of each row. Nothing touches the store.

use calamine::{Data, Reader, open_workbook_auto_from_rs};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::io::Cursor;
use thiserror::Error;

use crate::db::NewIntegration;
use crate::domain::{IntegrationStatus, UserId};

pub const KEY_COLUMN: &str = "Integration Key";
pub const USER_ID_COLUMN: &str = "User ID";
pub const ACCOUNT_ID_COLUMN: &str = "Account ID";
pub const EMAIL_COLUMN: &str = "Email";

/// Headers every upload must carry, matched exactly.
pub const REQUIRED_COLUMNS: [&str; 4] = [KEY_COLUMN, USER_ID_COLUMN, ACCOUNT_ID_COLUMN, EMAIL_COLUMN];

const WORKBOOK_EXTENSIONS: [&str; 5] = ["xlsx", "xlsm", "xlsb", "xls", "ods"];
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const OLE_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Structural failures. Any of these aborts the upload before a row is looked at.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ImportError {
    #[error("Invalid file: {0}")]
    InvalidFile(String),

    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
}

/// One spreadsheet cell, reduced to what validation cares about.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
}

impl Cell {
    fn from_workbook(data: &Data) -> Self {
        match data {
            Data::Empty => Self::Empty,
            Data::Int(i) => Self::Int(*i),
            Data::Float(f) => Self::Float(*f),
            Data::Bool(b) => Self::Bool(*b),
            Data::String(s) if s.is_empty() => Self::Empty,
            Data::String(s) => Self::Text(s.clone()),
            other => Self::Text(other.to_string()),
        }
    }

    fn from_csv(field: &str) -> Self {
        if field.is_empty() {
            Self::Empty
        } else {
            Self::Text(field.to_string())
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Trimmed textual form. Integral floats render without a fraction.
    #[must_use]
    pub fn trimmed_text(&self) -> String {
        self.to_string().trim().to_string()
    }

    /// Coerces the cell into a 32-bit id.
    pub fn to_id(&self, column: &str) -> Result<i32, String> {
        let wide = match self {
            Self::Int(i) => Some(*i),
            Self::Float(f) if f.is_finite() && f.fract() == 0.0 => {
                #[allow(clippy::cast_possible_truncation)]
                let truncated = *f as i64;
                Some(truncated)
            }
            Self::Text(s) => s.trim().parse::<i64>().ok(),
            Self::Float(_) | Self::Bool(_) | Self::Empty => None,
        };

        let Some(wide) = wide else {
            return Err(format!("{column} must be an integer, got '{self}'"));
        };

        i32::try_from(wide)
            .map_err(|_| format!("{column} {} is out of range", self.trimmed_text()))
    }

    fn to_json(&self) -> Value {
        match self {
            Self::Empty => Value::Null,
            Self::Int(i) => Value::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(*f).map_or(Value::Null, Value::Number),
            Self::Text(s) => Value::String(s.clone()),
            Self::Bool(b) => Value::Bool(*b),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => Ok(()),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e15 => {
                write!(f, "{v:.0}")
            }
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(s) => f.write_str(s),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetFormat {
    Workbook,
    Csv,
}

impl SheetFormat {
    /// Picks a reader from the file extension, sniffing the content when the
    /// name says nothing useful.
    pub fn detect(filename: Option<&str>, bytes: &[u8]) -> Result<Self, ImportError> {
        let extension = filename
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext.to_ascii_lowercase());

        match extension.as_deref() {
            Some(ext) if WORKBOOK_EXTENSIONS.contains(&ext) => Ok(Self::Workbook),
            Some("csv") => Ok(Self::Csv),
            _ if bytes.starts_with(ZIP_MAGIC) || bytes.starts_with(OLE_MAGIC) => Ok(Self::Workbook),
            None | Some("txt") => Ok(Self::Csv),
            Some(ext) => Err(ImportError::InvalidFile(format!(
                "unsupported file type '.{ext}'"
            ))),
        }
    }
}

/// A sheet as read from disk: one header row and the data rows beneath it.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSheet {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

fn read_workbook(bytes: &[u8]) -> Result<RawSheet, ImportError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| ImportError::InvalidFile(format!("could not read workbook: {e}")))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ImportError::InvalidFile("workbook has no sheets".to_string()))?
        .map_err(|e| ImportError::InvalidFile(format!("could not read first sheet: {e}")))?;

    let mut rows = range.rows();
    let headers = rows
        .next()
        .map(|header| header.iter().map(ToString::to_string).collect::<Vec<_>>())
        .unwrap_or_default();

    let rows = rows
        .map(|row| row.iter().map(Cell::from_workbook).collect())
        .collect();

    Ok(RawSheet { headers, rows })
}

fn read_csv(bytes: &[u8]) -> Result<RawSheet, ImportError> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let header_record = reader
        .headers()
        .map_err(|e| ImportError::InvalidFile(format!("could not read CSV header: {e}")))?
        .clone();
    let headers = header_record.iter().map(ToString::to_string).collect();

    let mut next_line = line_after(&header_record, 1);
    let mut rows = Vec::new();
    for record in reader.records() {
        let record =
            record.map_err(|e| ImportError::InvalidFile(format!("could not read CSV row: {e}")))?;

        // The reader drops blank lines; they still occupy a row of the file.
        let line = record.position().map_or(next_line, csv::Position::line);
        for _ in next_line..line {
            rows.push(Vec::new());
        }
        next_line = line_after(&record, line);

        rows.push(record.iter().map(Cell::from_csv).collect());
    }

    Ok(RawSheet { headers, rows })
}

/// First line past `record`, counting newlines embedded in quoted fields.
fn line_after(record: &csv::StringRecord, fallback_start: u64) -> u64 {
    let start = record.position().map_or(fallback_start, csv::Position::line);
    let embedded: usize = record.iter().map(|field| field.matches('\n').count()).sum();
    start + 1 + u64::try_from(embedded).unwrap_or_default()
}

/// Reads the first sheet of an uploaded file.
pub fn read_sheet(filename: Option<&str>, bytes: &[u8]) -> Result<RawSheet, ImportError> {
    if bytes.is_empty() {
        return Err(ImportError::InvalidFile("uploaded file is empty".to_string()));
    }

    let sheet = match SheetFormat::detect(filename, bytes)? {
        SheetFormat::Workbook => read_workbook(bytes)?,
        SheetFormat::Csv => read_csv(bytes)?,
    };

    if sheet.headers.iter().all(String::is_empty) {
        return Err(ImportError::InvalidFile("sheet has no header row".to_string()));
    }

    Ok(sheet)
}

/// Required headers absent from `headers`, in canonical order.
#[must_use]
pub fn missing_columns(headers: &[String]) -> Vec<String> {
    REQUIRED_COLUMNS
        .iter()
        .filter(|required| !headers.iter().any(|h| h == *required))
        .map(|required| (*required).to_string())
        .collect()
}

/// One data row: the four required cells plus whatever else the sheet carried.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkImportRow {
    /// 1-based position below the header row.
    pub row_number: usize,
    pub integration_key: Cell,
    pub user_id: Cell,
    pub account_id: Cell,
    pub email: Cell,
    pub extra: Vec<(String, Cell)>,
}

/// Row fields after coercion, before store-level checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRow {
    pub integration_key: String,
    pub user_id: i32,
    pub account_id: i32,
    pub email: String,
}

impl BulkImportRow {
    fn from_cells(row_number: usize, headers: &[String], cells: Vec<Cell>) -> Self {
        let mut by_header: HashMap<&str, Cell> = HashMap::new();
        let mut extra = Vec::new();

        for (index, header) in headers.iter().enumerate() {
            let cell = cells.get(index).cloned().unwrap_or(Cell::Empty);
            if REQUIRED_COLUMNS.contains(&header.as_str()) {
                // First occurrence of a repeated header wins.
                by_header.entry(header.as_str()).or_insert(cell);
            } else {
                extra.push((header.clone(), cell));
            }
        }

        let mut take = |column: &str| by_header.remove(column).unwrap_or(Cell::Empty);

        Self {
            row_number,
            integration_key: take(KEY_COLUMN),
            user_id: take(USER_ID_COLUMN),
            account_id: take(ACCOUNT_ID_COLUMN),
            email: take(EMAIL_COLUMN),
            extra,
        }
    }

    /// Field checks that need no store access, first failure wins.
    pub fn validate(&self) -> Result<ValidatedRow, String> {
        let integration_key = self.integration_key.trimmed_text();
        if integration_key.is_empty() {
            return Err(format!("{KEY_COLUMN} is empty"));
        }

        let email = self.email.trimmed_text();
        if email.is_empty() {
            return Err(format!("{EMAIL_COLUMN} is empty"));
        }

        let user_id = self.user_id.to_id(USER_ID_COLUMN)?;
        let account_id = self.account_id.to_id(ACCOUNT_ID_COLUMN)?;

        Ok(ValidatedRow {
            integration_key,
            user_id,
            account_id,
            email,
        })
    }

    /// The row as uploaded, keyed by header.
    #[must_use]
    pub fn original(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert(KEY_COLUMN.to_string(), self.integration_key.to_json());
        map.insert(USER_ID_COLUMN.to_string(), self.user_id.to_json());
        map.insert(ACCOUNT_ID_COLUMN.to_string(), self.account_id.to_json());
        map.insert(EMAIL_COLUMN.to_string(), self.email.to_json());
        for (header, cell) in &self.extra {
            map.entry(header.clone()).or_insert_with(|| cell.to_json());
        }
        map
    }
}

/// Turns a raw sheet into typed rows, enforcing headers and the row limit.
pub fn into_rows(sheet: RawSheet, max_rows: usize) -> Result<Vec<BulkImportRow>, ImportError> {
    let missing = missing_columns(&sheet.headers);
    if !missing.is_empty() {
        return Err(ImportError::MissingColumns(missing));
    }

    let rows: Vec<BulkImportRow> = sheet
        .rows
        .into_iter()
        .enumerate()
        .filter(|(_, cells)| !cells.iter().all(Cell::is_empty))
        .map(|(index, cells)| BulkImportRow::from_cells(index + 1, &sheet.headers, cells))
        .collect();

    if rows.len() > max_rows {
        return Err(ImportError::InvalidFile(format!(
            "sheet has {} data rows, the limit is {max_rows}",
            rows.len()
        )));
    }

    Ok(rows)
}

/// Reads, checks and types an upload in one go.
pub fn parse_upload(
    filename: Option<&str>,
    bytes: &[u8],
    max_rows: usize,
) -> Result<Vec<BulkImportRow>, ImportError> {
    into_rows(read_sheet(filename, bytes)?, max_rows)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedRecord {
    pub row_number: usize,
    pub row: Map<String, Value>,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BulkImportResult {
    pub success_count: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed_records: Vec<FailedRecord>,
}

/// Outcome of the validation pass: rows to insert and rows rejected, both in file order.
#[derive(Debug, Clone, Default)]
pub struct ImportPlan {
    pub staged: Vec<NewIntegration>,
    pub failed_records: Vec<FailedRecord>,
}

impl ImportPlan {
    #[must_use]
    pub fn result(&self) -> BulkImportResult {
        BulkImportResult {
            success_count: self.staged.len(),
            failed_records: self.failed_records.clone(),
        }
    }
}

/// Decides every row. `stored_keys` and `known_users` come from the store.
#[must_use]
pub fn plan_import(
    rows: &[BulkImportRow],
    stored_keys: &HashSet<String>,
    known_users: &HashSet<i32>,
) -> ImportPlan {
    let mut plan = ImportPlan::default();
    let mut seen: HashMap<String, usize> = HashMap::new();

    for row in rows {
        let checked = row.validate().and_then(|valid| {
            if let Some(first) = seen.get(&valid.integration_key) {
                return Err(format!(
                    "Duplicate {KEY_COLUMN} '{}' (first seen in row {first})",
                    valid.integration_key
                ));
            }
            if stored_keys.contains(&valid.integration_key) {
                return Err(format!(
                    "{KEY_COLUMN} '{}' already exists",
                    valid.integration_key
                ));
            }
            if !known_users.contains(&valid.user_id) {
                return Err(format!("User {} does not exist", valid.user_id));
            }
            Ok(valid)
        });

        match checked {
            Ok(valid) => {
                seen.insert(valid.integration_key.clone(), row.row_number);
                plan.staged.push(NewIntegration {
                    integration_key: valid.integration_key,
                    user_id: UserId::new(valid.user_id),
                    account_id: valid.account_id,
                    private_key_file: None,
                    email: valid.email,
                    status: IntegrationStatus::Active,
                });
            }
            Err(error) => {
                tracing::debug!(row = row.row_number, %error, "Rejected bulk import row");
                plan.failed_records.push(FailedRecord {
                    row_number: row.row_number,
                    row: row.original(),
                    error,
                });
            }
        }
    }

    plan
}
