//! Spreadsheet input: one row per SKU with its final settlement price.
//!
//! File-level problems fail the whole load. Row-level problems are returned
//! in place so the batch can report them as failed tasks and keep going.

use calamine::{open_workbook_auto, Data, Reader};
use std::path::Path;
use tracing::{debug, info};

use crate::config::InputConfig;
use crate::errors::InputError;
use crate::types::PriceTask;

/// A parsed row: either a task or the reason it could not become one.
pub type TaskRow = Result<PriceTask, InputError>;

/// Load all rows from a CSV file or a workbook, in file order.
pub fn load_tasks(path: &Path, config: &InputConfig) -> Result<Vec<TaskRow>, InputError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    let (headers, rows) = match extension.as_str() {
        "csv" => {
            let content = std::fs::read_to_string(path).map_err(|e| InputError::Open {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
            parse_csv(&content)?
        }
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => parse_workbook(path, config.sheet.as_deref())?,
        other => {
            return Err(InputError::Open {
                path: path.display().to_string(),
                reason: format!("unsupported file type '{other}' (expected csv, xlsx, xls or ods)"),
            })
        }
    };

    let tasks = tasks_from_table(&headers, &rows, config)?;
    info!(
        path = %path.display(),
        rows = tasks.len(),
        invalid = tasks.iter().filter(|t| t.is_err()).count(),
        "Loaded input rows"
    );
    Ok(tasks)
}

/// Parse CSV content into headers and rows
pub fn parse_csv(content: &str) -> Result<(Vec<String>, Vec<Vec<String>>), InputError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(|s| s.to_string()).collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(|s| s.to_string()).collect());
    }
    Ok((headers, rows))
}

fn parse_workbook(
    path: &Path,
    sheet_name: Option<&str>,
) -> Result<(Vec<String>, Vec<Vec<String>>), InputError> {
    let open_error = |reason: String| InputError::Open {
        path: path.display().to_string(),
        reason,
    };

    let mut workbook = open_workbook_auto(path).map_err(|e| open_error(e.to_string()))?;

    let sheet_names = workbook.sheet_names().to_vec();
    let target_sheet = match sheet_name {
        Some(name) => {
            if !sheet_names.iter().any(|s| s == name) {
                return Err(open_error(format!(
                    "sheet '{}' not found. Available: {}",
                    name,
                    sheet_names.join(", ")
                )));
            }
            name.to_string()
        }
        None => sheet_names
            .first()
            .cloned()
            .ok_or_else(|| open_error("workbook has no sheets".to_string()))?,
    };
    debug!(sheet = %target_sheet, "Reading worksheet");

    let range = workbook
        .worksheet_range(&target_sheet)
        .map_err(|e| open_error(format!("failed to read sheet '{target_sheet}': {e}")))?;

    let mut all_rows: Vec<Vec<String>> = range
        .rows()
        .map(|row| row.iter().map(cell_to_string).collect())
        .collect();

    if all_rows.is_empty() {
        return Err(InputError::EmptySheet(target_sheet));
    }
    let headers = all_rows.remove(0);
    Ok((headers, all_rows))
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) => {
            // SKUs typed as numbers come back as floats
            if f.fract() == 0.0 && f.abs() < 1e15 {
                (*f as i64).to_string()
            } else {
                f.to_string()
            }
        }
        Data::Int(i) => i.to_string(),
        other => other.to_string(),
    }
}

fn find_column(headers: &[String], wanted: &str) -> Result<usize, InputError> {
    let wanted = wanted.trim();
    headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(wanted))
        .ok_or_else(|| InputError::MissingColumn(wanted.to_string()))
}

/// Turn a header row plus data rows into task rows.
///
/// Row numbers in errors are 1-based spreadsheet rows, the header being row 1.
/// Rows with every cell blank are skipped.
pub fn tasks_from_table(
    headers: &[String],
    rows: &[Vec<String>],
    config: &InputConfig,
) -> Result<Vec<TaskRow>, InputError> {
    let sku_col = find_column(headers, &config.sku_column)?;
    let price_col = find_column(headers, &config.price_column)?;

    let tasks = rows
        .iter()
        .enumerate()
        .filter(|(_, row)| row.iter().any(|cell| !cell.trim().is_empty()))
        .map(|(idx, row)| {
            let row_number = idx + 2;
            let sku = row.get(sku_col).map(|s| s.trim()).unwrap_or("");
            let raw_price = row.get(price_col).map(|s| s.trim()).unwrap_or("");
            parse_row(sku, raw_price).map_err(|reason| InputError::Row {
                row: row_number,
                sku: sku.to_string(),
                reason,
            })
        })
        .collect();
    Ok(tasks)
}

fn parse_row(sku: &str, raw_price: &str) -> Result<PriceTask, String> {
    if raw_price.is_empty() {
        return Err("price is blank".to_string());
    }
    let price: f64 = raw_price
        .replace(',', "")
        .parse()
        .map_err(|_| format!("price '{raw_price}' is not a number"))?;
    PriceTask::new(sku, price).map_err(|e| match e {
        InputError::Row { reason, .. } => reason,
        other => other.to_string(),
    })
}
