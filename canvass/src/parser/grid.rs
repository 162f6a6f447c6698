//! Grid block extraction
//!
//! `|grid ID|args|shared text|rows|responses|` blocks are compiled straight into
//! a `GridTable` and replaced by a placeholder boundary `[ID,grid,...]`, so the
//! segmenter sees an ordinary question and never re-parses the table.

use crate::ast::is_identifier;
use crate::error::SurveyError;
use crate::syntax::{GridColumn, GridColumnKind, GridRow, GridTable};
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

pub(crate) static GRID_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*\|grid[ \t]+([A-Z_][A-Z0-9_]*)\|([^|]*)\|([^|]*)\|([^|]*)\|([^|]*)\|")
        .expect("valid grid regex")
});

/// Definition text with every grid replaced by its placeholder, plus the tables
#[derive(Debug, Default)]
pub struct GridExtraction {
    pub content: String,
    pub tables: HashMap<String, GridTable>,
}

pub fn extract_grids(content: &str, source_id: &str) -> Result<GridExtraction, SurveyError> {
    let mut extraction = GridExtraction::default();
    let mut last_end = 0;

    for captures in GRID_BLOCK.captures_iter(content) {
        let Some(whole) = captures.get(0) else {
            continue;
        };
        let id = captures[1].to_string();
        let error_at = |message: String| {
            let line = content[..whole.start()].matches('\n').count() + 1;
            SurveyError::parse_with_suggestion(
                message,
                crate::ast::Span {
                    start: whole.start(),
                    end: whole.end(),
                    line,
                    col: 1,
                },
                source_id,
                Arc::from(content),
                "Grid blocks look like |grid ID|args|shared text|ROW=prompt;...|value=label;...|",
            )
        };

        let rows = parse_rows(&captures[4]).map_err(&error_at)?;
        let columns = parse_columns(&captures[5]).map_err(&error_at)?;
        if rows.is_empty() || columns.is_empty() {
            return Err(error_at(format!(
                "Grid {} needs at least one row and one response column",
                id
            )));
        }

        extraction.content.push_str(&content[last_end..whole.start()]);
        extraction.content.push_str(&placeholder(&id, &captures[2]));
        last_end = whole.end();

        extraction.tables.insert(
            id.clone(),
            GridTable {
                id,
                shared_text: captures[3].trim().to_string(),
                rows,
                columns,
            },
        );
    }

    extraction.content.push_str(&content[last_end..]);
    Ok(extraction)
}

/// Row ids declared in a grid's row field
pub(crate) fn row_ids(rows: &str) -> Vec<String> {
    rows.split(';')
        .filter_map(|row| row.split_once('='))
        .map(|(id, _)| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .collect()
}

fn parse_rows(field: &str) -> Result<Vec<GridRow>, String> {
    field
        .split(';')
        .map(str::trim)
        .filter(|row| !row.is_empty())
        .map(|row| {
            let (id, prompt) = row
                .split_once('=')
                .ok_or_else(|| format!("Grid row '{}' must look like ROWID=prompt", row))?;
            let id = id.trim();
            if !is_identifier(id) || id.contains('.') {
                return Err(format!("Grid row id '{}' is not a valid identifier", id));
            }
            Ok(GridRow {
                id: id.to_string(),
                prompt: prompt.trim().to_string(),
            })
        })
        .collect()
}

fn parse_columns(field: &str) -> Result<Vec<GridColumn>, String> {
    field
        .split(';')
        .map(str::trim)
        .filter(|column| !column.is_empty())
        .map(|column| {
            let (kind, rest) = match column.split_once(':') {
                Some(("radio", rest)) => (GridColumnKind::Radio, rest),
                Some(("checkbox", rest)) => (GridColumnKind::Checkbox, rest),
                Some(("text", rest)) => (GridColumnKind::Text, rest),
                _ => (GridColumnKind::Radio, column),
            };
            let (value, label) = rest
                .split_once('=')
                .ok_or_else(|| format!("Grid response '{}' must look like value=label", column))?;
            Ok(GridColumn {
                value: value.trim().to_string(),
                label: label.trim().to_string(),
                kind,
            })
        })
        .collect()
}

/// Boundary line standing in for the grid during segmentation
fn placeholder(id: &str, args: &str) -> String {
    let args = args.trim();
    let (mandate, rest) = match args.chars().next() {
        Some(marker @ ('!' | '?')) => (marker.to_string(), args[1..].trim_start_matches([',', ' '])),
        _ => (String::new(), args),
    };
    let mut boundary = format!("[{}{},grid", id, mandate);
    for option in split_top_level(rest) {
        boundary.push(',');
        boundary.push_str(option);
    }
    boundary.push_str("]\n");
    boundary
}

/// Split on commas that are not inside parentheses
fn split_top_level(args: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (index, c) in args.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(args[start..index].trim());
                start = index + 1;
            }
            _ => {}
        }
    }
    parts.push(args[start..].trim());
    parts.retain(|part| !part.is_empty());
    parts
}
