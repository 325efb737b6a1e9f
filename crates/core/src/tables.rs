//! Table validation, emptiness, Markdown rendering and side export.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::options::TableExportFormat;
use crate::types::{BBox, CellValue, TableGrid, TableUnit};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("CSV export failed: {0}")]
    Csv(String),
    #[error("JSON export failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<csv::Error> for ExportError {
    fn from(e: csv::Error) -> Self {
        ExportError::Csv(e.to_string())
    }
}

/// A table is valid only when it lies entirely within its page.
pub fn is_valid_table(table: &BBox, page: &BBox) -> bool {
    page.contains(table)
}

/// Decide whether a table carries no content.
///
/// A table whose grid could not be extracted is treated as non-empty so
/// that an extraction hiccup never hides real content.
pub fn is_empty_table(table: &TableUnit) -> bool {
    if table.cell_count == 0 {
        return true;
    }
    let Some(grid) = &table.grid else {
        return false;
    };
    if grid.is_empty() || grid.iter().all(|row| !row.iter().any(is_truthy)) {
        return true;
    }
    grid.iter().flatten().all(|cell| is_blank(cell.as_ref()))
}

fn is_truthy(cell: &Option<CellValue>) -> bool {
    match cell {
        None => false,
        Some(CellValue::Number(_)) => true,
        Some(CellValue::Text(s)) => !s.is_empty(),
    }
}

fn is_blank(cell: Option<&CellValue>) -> bool {
    match cell {
        None => true,
        Some(CellValue::Number(_)) => false,
        Some(CellValue::Text(s)) => s.trim().is_empty(),
    }
}

/// Clean a cell for Markdown: missing cells become empty, and runs of
/// whitespace (including newlines) collapse to single spaces.
pub fn sanitize_cell(cell: Option<&CellValue>) -> String {
    match cell {
        None => String::new(),
        Some(value) => value
            .to_string()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" "),
    }
}

/// Render a grid as a Markdown table.
///
/// The first row is the header row. `header` is emitted above the table only
/// when the first cell is non-blank. Returns an empty string for an empty
/// grid.
pub fn render_table(grid: &TableGrid, header: &str) -> String {
    let rows: Vec<Vec<String>> = grid
        .iter()
        .map(|row| row.iter().map(|c| sanitize_cell(c.as_ref())).collect())
        .collect();

    let Some(first) = rows.first() else {
        return String::new();
    };

    let mut lines: Vec<String> = Vec::with_capacity(rows.len() + 3);
    if first.first().is_some_and(|cell| !cell.trim().is_empty()) {
        lines.push(header.to_string());
        lines.push(String::new());
    }

    lines.push(format!("| {} |", first.join(" | ")));
    lines.push(format!(
        "|{}|",
        first.iter().map(|_| ":---:").collect::<Vec<_>>().join("|")
    ));
    for row in &rows[1..] {
        lines.push(format!("| {} |", row.join(" | ")));
    }

    lines.join("\n") + "\n\n"
}

/// Serialize the raw grid in the given side-export format.
///
/// Returns `Ok(None)` for [`TableExportFormat::None`].
pub fn export_table(
    grid: &TableGrid,
    format: TableExportFormat,
) -> Result<Option<String>, ExportError> {
    match format {
        TableExportFormat::None => Ok(None),
        TableExportFormat::Csv => export_csv(grid).map(Some),
        TableExportFormat::Json => export_json(grid).map(Some),
    }
}

fn raw_cell(cell: &Option<CellValue>) -> String {
    cell.as_ref().map(|c| c.to_string()).unwrap_or_default()
}

fn export_csv(grid: &TableGrid) -> Result<String, ExportError> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());
    for row in grid {
        writer.write_record(row.iter().map(raw_cell))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| ExportError::Csv(e.to_string()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Records keyed by the first row. Numbers stay numbers, missing cells
/// become `null`.
fn export_json(grid: &TableGrid) -> Result<String, ExportError> {
    let Some((header, body)) = grid.split_first() else {
        return Ok(serde_json::to_string_pretty(&Vec::<Value>::new())?);
    };
    let keys: Vec<String> = header.iter().map(raw_cell).collect();

    let records: Vec<Value> = body
        .iter()
        .map(|row| {
            let record: Map<String, Value> = keys
                .iter()
                .zip(row.iter())
                .map(|(key, cell)| (key.clone(), cell_to_json(cell)))
                .collect();
            Value::Object(record)
        })
        .collect();

    Ok(serde_json::to_string_pretty(&records)?)
}

fn cell_to_json(cell: &Option<CellValue>) -> Value {
    match cell {
        None => Value::Null,
        Some(CellValue::Text(s)) => Value::String(s.clone()),
        Some(CellValue::Number(n)) => serde_json::Number::from_f64(*n)
            .map(Value::Number)
            .unwrap_or(Value::Null),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Option<CellValue> {
        Some(CellValue::Text(s.to_string()))
    }

    fn unit(grid: Option<TableGrid>, cell_count: usize) -> TableUnit {
        TableUnit {
            bbox: BBox::new(10.0, 10.0, 100.0, 100.0),
            page: 1,
            cell_count,
            grid,
        }
    }

    // -- validity -------------------------------------------------------------

    #[test]
    fn test_table_inside_page_is_valid() {
        let page = BBox::new(0.0, 0.0, 612.0, 792.0);
        assert!(is_valid_table(&BBox::new(50.0, 50.0, 500.0, 300.0), &page));
    }

    #[test]
    fn test_table_past_right_edge_is_invalid() {
        let page = BBox::new(0.0, 0.0, 612.0, 792.0);
        assert!(!is_valid_table(&BBox::new(50.0, 50.0, 612.5, 300.0), &page));
    }

    #[test]
    fn test_table_above_page_is_invalid() {
        let page = BBox::new(0.0, 0.0, 612.0, 792.0);
        assert!(!is_valid_table(&BBox::new(50.0, -2.0, 500.0, 300.0), &page));
    }

    // -- emptiness ------------------------------------------------------------

    #[test]
    fn test_blank_strings_are_empty() {
        let grid = vec![vec![text(""), text("")], vec![text(""), text("")]];
        assert!(is_empty_table(&unit(Some(grid), 4)));
    }

    #[test]
    fn test_zero_string_is_not_empty() {
        let grid = vec![vec![text("0"), text("")]];
        assert!(!is_empty_table(&unit(Some(grid), 2)));
    }

    #[test]
    fn test_whitespace_only_cells_are_empty() {
        let grid = vec![vec![text("  "), None], vec![text("\n"), text(" ")]];
        assert!(is_empty_table(&unit(Some(grid), 4)));
    }

    #[test]
    fn test_numeric_cells_are_never_blank() {
        let grid = vec![vec![Some(CellValue::Number(0.0)), None]];
        assert!(!is_empty_table(&unit(Some(grid), 2)));
    }

    #[test]
    fn test_no_cells_is_empty() {
        assert!(is_empty_table(&unit(Some(vec![vec![text("x")]]), 0)));
    }

    #[test]
    fn test_empty_grid_is_empty() {
        assert!(is_empty_table(&unit(Some(vec![]), 3)));
        assert!(is_empty_table(&unit(Some(vec![vec![None, None]]), 2)));
    }

    #[test]
    fn test_failed_extraction_fails_open() {
        assert!(!is_empty_table(&unit(None, 4)));
    }

    // -- sanitize_cell --------------------------------------------------------

    #[test]
    fn test_sanitize_collapses_whitespace() {
        assert_eq!(sanitize_cell(text("  a \n b\tc ").as_ref()), "a b c");
        assert_eq!(sanitize_cell(None), "");
        assert_eq!(sanitize_cell(Some(&CellValue::Number(4.5))), "4.5");
    }

    // -- render_table ---------------------------------------------------------

    #[test]
    fn test_render_with_header() {
        let grid = vec![
            vec![text("Name"), text("Age")],
            vec![text("Alice"), text("30")],
        ];
        let md = render_table(&grid, "### Table");
        assert_eq!(
            md,
            "### Table\n\n| Name | Age |\n|:---:|:---:|\n| Alice | 30 |\n\n"
        );
    }

    #[test]
    fn test_render_without_header_when_first_cell_blank() {
        let grid = vec![vec![None, text("B")], vec![text("1"), text("2")]];
        let md = render_table(&grid, "###");
        assert_eq!(md, "|  | B |\n|:---:|:---:|\n| 1 | 2 |\n\n");
    }

    #[test]
    fn test_render_empty_grid() {
        assert_eq!(render_table(&vec![], "###"), "");
    }

    // -- export_table ---------------------------------------------------------

    #[test]
    fn test_export_none() {
        let grid = vec![vec![text("a")]];
        assert!(export_table(&grid, TableExportFormat::None)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_export_csv_quotes_and_missing_cells() {
        let grid = vec![
            vec![text("Name"), text("Note")],
            vec![text("Bob"), text("a, b")],
            vec![text("Eve"), None],
        ];
        let csv = export_table(&grid, TableExportFormat::Csv).unwrap().unwrap();
        assert_eq!(csv, "Name,Note\nBob,\"a, b\"\nEve,\n");
    }

    #[test]
    fn test_export_json_records_keep_column_order() {
        let grid = vec![
            vec![text("Zeta"), text("Alpha")],
            vec![text("1"), Some(CellValue::Number(2.0))],
            vec![None, text("x")],
        ];
        let json = export_table(&grid, TableExportFormat::Json)
            .unwrap()
            .unwrap();
        let parsed: Value = serde_json::from_str(&json).unwrap();
        let records = parsed.as_array().unwrap();
        assert_eq!(records.len(), 2);
        let keys: Vec<&String> = records[0].as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["Zeta", "Alpha"]);
        assert_eq!(records[0]["Alpha"], Value::from(2.0));
        assert_eq!(records[1]["Zeta"], Value::Null);
    }

    #[test]
    fn test_export_json_empty_grid() {
        let json = export_table(&vec![], TableExportFormat::Json)
            .unwrap()
            .unwrap();
        assert_eq!(json, "[]");
    }
}
