//! Pipe-table nodes.
//!
//! A table node's rows come from the first source that holds a table: a pipe
//! table in the node text, then one in the note, then the structured `table`
//! field. The first row is the header and is measured bold.

use crate::font::{FontSpec, MeasurementService};
use crate::model::{Node, Size};
use crate::text::line_height;
use crate::text::markup::strip_markup;

pub const CELL_PADDING: f64 = 16.0;
pub const ROW_PADDING: f64 = 8.0;
pub const BORDER: f64 = 1.0;
pub const MIN_WIDTH: f64 = 80.0;

fn is_separator_cell(cell: &str) -> bool {
    let core = cell.trim().trim_start_matches(':').trim_end_matches(':');
    !core.is_empty() && core.chars().all(|c| c == '-')
}

fn split_row(line: &str) -> Vec<String> {
    let trimmed = line.trim();
    let inner = trimmed.strip_prefix('|').unwrap_or(trimmed);
    let inner = inner.strip_suffix('|').unwrap_or(inner);
    inner.split('|').map(|c| c.trim().to_string()).collect()
}

/// Rows of a pipe table, or `None` when `text` holds no table line.
/// Separator rows (`|---|:-:|`) are skipped.
pub fn parse_pipe_table(text: &str) -> Option<Vec<Vec<String>>> {
    let rows: Vec<Vec<String>> = text
        .lines()
        .filter(|line| line.trim_start().starts_with('|'))
        .map(split_row)
        .filter(|cells| !cells.iter().all(|c| is_separator_cell(c)))
        .collect();
    if rows.is_empty() {
        None
    } else {
        Some(rows)
    }
}

/// Table rows for `node`, ragged rows padded to the widest.
pub fn table_rows(node: &Node) -> Vec<Vec<String>> {
    let mut rows = parse_pipe_table(&node.text)
        .or_else(|| node.note.as_deref().and_then(parse_pipe_table))
        .or_else(|| node.table.clone())
        .unwrap_or_default();
    let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
    for row in &mut rows {
        row.resize(columns, String::new());
    }
    rows
}

/// Rendered size of a table with `rows` in `font`.
pub fn measure_table(
    rows: &[Vec<String>],
    measurer: &MeasurementService,
    font: &FontSpec<'_>,
) -> Size {
    let row_height = line_height(font.size) + ROW_PADDING;
    if rows.is_empty() || rows[0].is_empty() {
        return Size::new(MIN_WIDTH, row_height + 2.0 * BORDER);
    }

    let columns = rows[0].len();
    let mut widths = vec![0.0f64; columns];
    for (r, row) in rows.iter().enumerate() {
        let cell_font = if r == 0 { font.bold() } else { *font };
        for (c, cell) in row.iter().enumerate() {
            let w = measurer.measure(&strip_markup(cell), &cell_font);
            widths[c] = widths[c].max(w);
        }
    }

    let width = widths.iter().map(|w| w + CELL_PADDING).sum::<f64>() + BORDER * columns as f64 + BORDER;
    let height = rows.len() as f64 * (row_height + BORDER) + BORDER;
    Size::new(width.max(MIN_WIDTH), height)
}
