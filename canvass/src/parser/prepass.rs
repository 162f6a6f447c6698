//! Text-level passes that run before segmentation
//!
//! 1. Comment lines are blanked (line numbers stay stable for error reporting).
//! 2. Every `<loop bound=ID max=N>` block is unrolled into `N` independent copies,
//!    each followed by a continuation marker, with one end-of-loop marker after
//!    the final iteration. Ids declared in the body become `ID_i_i` in copy `i`
//!    wherever they appear in code positions; question text keeps its words.

use crate::ast::{iteration_id, LoopMarker, Span, LOOP_INDEX_TOKEN};
use crate::error::SurveyError;
use crate::resource_limits::ResourceLimits;
use regex::{Captures, Regex};
use std::collections::BTreeSet;
use std::sync::{Arc, LazyLock};

static LOOP_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<loop\b([^>]*)>(.*?)</loop>").expect("valid loop regex"));
static LOOP_ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(\w+)\s*=\s*"?([^"\s>]+)"?"#).expect("valid attribute regex")
});
static DECLARED_QUESTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*\[([A-Z_][A-Z0-9_]*)[\]!?,]").expect("valid boundary regex")
});
static FIRST_BOUNDARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*\[([A-Z_][A-Z0-9_]*)([!?]?)[\],]").expect("valid boundary regex")
});

static CODE_REGION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*\[[^\]\n]*\]|->[^\n]*|\{[^}\n]*\}").expect("valid code region regex")
});

const PREVIOUS_INDEX_TOKEN: &str = "$prev";

/// Blank every line whose first non-blank characters are `//`
pub fn strip_comments(content: &str) -> String {
    content
        .split_inclusive('\n')
        .map(|line| {
            if line.trim_start().starts_with("//") {
                if line.ends_with("\r\n") {
                    "\r\n"
                } else if line.ends_with('\n') {
                    "\n"
                } else {
                    ""
                }
            } else {
                line
            }
        })
        .collect()
}

/// Unroll every loop block in `content`
pub fn expand_loops(
    content: &str,
    source_id: &str,
    limits: &ResourceLimits,
) -> Result<String, SurveyError> {
    let mut output = String::with_capacity(content.len());
    let mut last_end = 0;

    for (loop_index, captures) in LOOP_BLOCK.captures_iter(content).enumerate() {
        let (Some(whole), Some(attributes), Some(body)) =
            (captures.get(0), captures.get(1), captures.get(2))
        else {
            continue;
        };
        let error_at = |message: String| {
            SurveyError::parse(
                message,
                span_at(content, whole.start(), whole.end()),
                source_id,
                Arc::from(content),
            )
        };

        if body.as_str().contains("<loop") {
            return Err(error_at("Loop blocks cannot be nested".to_string()));
        }

        let mut bound_source = None;
        let mut hard_max = None;
        for attribute in LOOP_ATTRIBUTE.captures_iter(attributes.as_str()) {
            match (&attribute[1], &attribute[2]) {
                ("bound", value) => bound_source = Some(value.to_string()),
                ("max", value) => hard_max = value.parse::<u32>().ok(),
                _ => {}
            }
        }
        let bound_source = bound_source
            .ok_or_else(|| error_at("Loop block is missing its bound=ID attribute".to_string()))?;
        let hard_max = hard_max
            .ok_or_else(|| error_at("Loop block needs a numeric max=N attribute".to_string()))?;
        if hard_max > limits.max_loop_iterations {
            return Err(SurveyError::ResourceLimitExceeded {
                limit_name: "max_loop_iterations".to_string(),
                limit_value: limits.max_loop_iterations.to_string(),
                actual_value: hard_max.to_string(),
                suggestion: "Lower the loop's max attribute".to_string(),
            });
        }

        output.push_str(&content[last_end..whole.start()]);
        output.push_str(&unroll(
            body.as_str(),
            loop_index,
            &bound_source,
            hard_max,
        )
        .ok_or_else(|| error_at("Loop body must begin with a question boundary or a grid".to_string()))?);
        last_end = whole.end();
    }

    output.push_str(&content[last_end..]);
    Ok(output)
}

fn unroll(body: &str, loop_index: usize, bound_source: &str, hard_max: u32) -> Option<String> {
    let declared = declared_ids(body);
    let renames: Vec<(Regex, &str)> = declared
        .iter()
        .filter_map(|id| {
            Regex::new(&format!(r"\b{}\b", regex::escape(id)))
                .ok()
                .map(|re| (re, id.as_str()))
        })
        .collect();

    let mut expanded = String::new();
    for iteration in 1..=hard_max {
        let copy = body
            .replace(PREVIOUS_INDEX_TOKEN, &(iteration - 1).to_string())
            .replace(LOOP_INDEX_TOKEN, &iteration.to_string());
        let mut copy = rename_declared(&copy, &renames, iteration);

        let (first_id, insert_at) = first_entry(&copy)?;
        let suffix = format!("_{}_{}", iteration, iteration);
        let base_id = first_id
            .strip_suffix(&suffix)
            .unwrap_or(&first_id)
            .to_string();
        let annotation = format!(
            ",loop={},bound={},max={},iteration={},base={}",
            loop_index, bound_source, hard_max, iteration, base_id
        );
        copy.insert_str(insert_at, &annotation);

        expanded.push_str(&copy);
        if !copy.ends_with('\n') {
            expanded.push('\n');
        }
        expanded.push_str(&format!(
            "[{}]\n",
            LoopMarker::Continuation {
                loop_index,
                iteration
            }
        ));
    }
    expanded.push_str(&format!("[{}]\n", LoopMarker::EndOfLoop { loop_index }));
    Some(expanded)
}

/// Id of the first question or grid in `copy` and the offset where its loop
/// annotation goes: after the mandate marker of a boundary, or at the end of
/// a grid's args field
fn first_entry(copy: &str) -> Option<(String, usize)> {
    let boundary = FIRST_BOUNDARY
        .captures(copy)
        .and_then(|c| Some((c.get(0)?.start(), c.get(1)?.as_str(), c.get(2)?.end())));
    let grid = super::grid::GRID_BLOCK
        .captures(copy)
        .and_then(|c| Some((c.get(0)?.start(), c.get(1)?.as_str(), c.get(2)?.end())));

    let (_, id, insert_at) = match (boundary, grid) {
        (Some(boundary), Some(grid)) if grid.0 < boundary.0 => grid,
        (Some(boundary), _) => boundary,
        (None, grid) => grid?,
    };
    Some((id.to_string(), insert_at))
}

/// Rename declared ids to their iteration form where they act as ids:
/// boundary headers, skip directives, `{...}` spans and the id, args and row
/// keys of a grid. Prose is left alone.
fn rename_declared(copy: &str, renames: &[(Regex, &str)], iteration: u32) -> String {
    let rename = |text: &str| {
        renames.iter().fold(text.to_string(), |text, (pattern, id)| {
            pattern
                .replace_all(&text, iteration_id(id, iteration).as_str())
                .into_owned()
        })
    };

    let copy = super::grid::GRID_BLOCK.replace_all(copy, |grid: &Captures| {
        let Some(whole) = grid.get(0) else {
            return String::new();
        };
        let mut rebuilt = String::new();
        let mut last = whole.start();
        for index in [1, 2, 4] {
            let Some(group) = grid.get(index) else {
                continue;
            };
            rebuilt.push_str(&whole.as_str()[last - whole.start()..group.start() - whole.start()]);
            if index == 4 {
                let rows: Vec<String> = group
                    .as_str()
                    .split(';')
                    .map(|row| match row.split_once('=') {
                        Some((key, prompt)) => format!("{}={}", rename(key), prompt),
                        None => row.to_string(),
                    })
                    .collect();
                rebuilt.push_str(&rows.join(";"));
            } else {
                rebuilt.push_str(&rename(group.as_str()));
            }
            last = group.end();
        }
        rebuilt.push_str(&whole.as_str()[last - whole.start()..]);
        rebuilt
    });

    CODE_REGION
        .replace_all(&copy, |region: &Captures| rename(&region[0]))
        .into_owned()
}

/// Question, grid and grid-row ids declared inside a loop body
fn declared_ids(body: &str) -> BTreeSet<String> {
    let mut ids: BTreeSet<String> = DECLARED_QUESTION
        .captures_iter(body)
        .map(|c| c[1].to_string())
        .collect();
    for grid in super::grid::GRID_BLOCK.captures_iter(body) {
        ids.insert(grid[1].to_string());
        ids.extend(super::grid::row_ids(&grid[4]));
    }
    ids
}

fn span_at(content: &str, start: usize, end: usize) -> Span {
    let before = &content[..start];
    let line = before.matches('\n').count() + 1;
    let col = before.rfind('\n').map_or(start, |nl| start - nl - 1) + 1;
    Span {
        start,
        end,
        line,
        col,
    }
}
