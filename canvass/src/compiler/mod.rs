//! Survey compilation
//!
//! Definition text goes through the pre-passes (comments, loop unrolling, grid
//! extraction), is segmented into questions, and becomes an ordered
//! `QuestionSequence`. Bodies are parsed up front; markup is rendered lazily.

pub mod context;
pub mod loops;
pub mod record;
pub mod render;
pub mod worker;

use crate::ast::{LoopMarker, Span};
use crate::error::SurveyError;
use crate::parser::grid::{extract_grids, GridExtraction};
use crate::parser::prepass::{expand_loops, strip_comments};
use crate::parser::{parse_body, parse_definition};
use crate::resource_limits::ResourceLimits;
use crate::syntax::{BodyLine, Directives, Inline, ParsedQuestion, QuestionBody, SkipTarget};
use crate::SurveyResult;
use std::collections::HashMap;
use tracing::{debug, warn};

pub use context::SurveyContext;
pub use loops::LoopDescriptor;
pub use record::{FieldShape, FieldSpec, GridMembership, QuestionRecord, RecordContent};

/// Compile a definition into its question sequence
pub fn compile(
    definition: &str,
    source_id: &str,
    limits: &ResourceLimits,
) -> SurveyResult<QuestionSequence> {
    if definition.len() > limits.max_definition_bytes {
        return Err(SurveyError::ResourceLimitExceeded {
            limit_name: "max_definition_bytes".to_string(),
            limit_value: limits.max_definition_bytes.to_string(),
            actual_value: definition.len().to_string(),
            suggestion: "Split the survey into several definitions".to_string(),
        });
    }

    let content = strip_comments(definition);
    let content = expand_loops(&content, source_id, limits)?;
    let GridExtraction { content, mut tables } = extract_grids(&content, source_id)?;
    let parsed = parse_definition(&content, source_id)?;

    let mut sequence = QuestionSequence::new(source_id);
    for question in parsed {
        let grid_table = if question.directives.grid {
            tables.remove(&question.id)
        } else {
            None
        };
        let record = match grid_table {
            Some(table) => {
                sequence.add_grid_rows(&table, &question.span);
                QuestionRecord::new(
                    question.id,
                    None,
                    question.directives,
                    RecordContent::Grid(table),
                    question.span,
                )
            }
            None => build_record(question),
        };
        sequence.push(record);
    }

    if sequence.is_empty() {
        return Err(SurveyError::EmptySurvey(source_id.to_string()));
    }
    sequence.link_loops();
    sequence.check_skip_targets();
    debug!(
        survey = source_id,
        questions = sequence.len(),
        loops = sequence.loops.len(),
        "compiled survey"
    );
    Ok(sequence)
}

fn build_record(question: ParsedQuestion) -> QuestionRecord {
    let ParsedQuestion {
        id,
        mut directives,
        body,
        span,
    } = question;

    if let Some(marker) = LoopMarker::parse(&id) {
        return QuestionRecord::new(id, None, directives, RecordContent::Marker(marker), span);
    }

    let parsed_body = parse_body(&body).unwrap_or_else(|err| {
        warn!(question = %id, error = %err, "body did not parse, keeping it as plain text");
        QuestionBody {
            lines: vec![BodyLine::Text(vec![Inline::Text(body.trim().to_string())])],
        }
    });
    collect_skip_targets(&mut directives, &parsed_body);
    QuestionRecord::new(
        id,
        Some(body),
        directives,
        RecordContent::Body(parsed_body),
        span,
    )
}

fn collect_skip_targets(directives: &mut Directives, body: &QuestionBody) {
    for line in &body.lines {
        if let BodyLine::Choice(option) = line {
            directives
                .skip_targets
                .extend(option.skips.iter().map(|directive| SkipTarget {
                    option_value: option.value.clone(),
                    directive: directive.clone(),
                }));
        }
    }
}

/// Ordered question records plus the loop descriptors found while compiling
#[derive(Debug, Clone)]
pub struct QuestionSequence {
    name: String,
    records: Vec<QuestionRecord>,
    index: HashMap<String, usize>,
    rows: Vec<QuestionRecord>,
    row_index: HashMap<String, usize>,
    loops: Vec<LoopDescriptor>,
}

impl QuestionSequence {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            records: Vec::new(),
            index: HashMap::new(),
            rows: Vec::new(),
            row_index: HashMap::new(),
            loops: Vec::new(),
        }
    }

    fn push(&mut self, record: QuestionRecord) {
        if self.index.contains_key(&record.id) || self.row_index.contains_key(&record.id) {
            warn!(question = %record.id, line = record.span.line, "dropping duplicate question id");
            return;
        }
        self.index.insert(record.id.clone(), self.records.len());
        self.records.push(record);
    }

    fn add_grid_rows(&mut self, table: &crate::syntax::GridTable, span: &Span) {
        for (row_index, row) in table.rows.iter().enumerate() {
            let mut record = QuestionRecord::new(
                row.id.clone(),
                None,
                Directives::default(),
                RecordContent::GridRow {
                    row: row.clone(),
                    columns: table.columns.clone(),
                },
                *span,
            );
            record.grid_membership = Some(GridMembership {
                grid_id: table.id.clone(),
                row_index,
            });
            self.row_index.insert(row.id.clone(), self.rows.len());
            self.rows.push(record);
        }
    }

    /// Build one descriptor per loop from its first-iteration record
    fn link_loops(&mut self) {
        let mut loops = Vec::new();
        for (position, record) in self.records.iter().enumerate() {
            let Some(entry) = &record.directives.loop_entry else {
                continue;
            };
            if entry.iteration != 1 {
                continue;
            }
            let end_marker = LoopMarker::EndOfLoop {
                loop_index: entry.loop_index,
            }
            .id();
            let Some(end_marker_index) = self.index.get(&end_marker).copied() else {
                warn!(loop_index = entry.loop_index, "loop has no end marker");
                continue;
            };
            loops.push(LoopDescriptor {
                loop_index: entry.loop_index,
                location_index: position,
                bound_source_id: entry.bound_source.clone(),
                hard_max: entry.hard_max,
                current_bound: None,
                first_question_base_id: entry.base_id.clone(),
                end_marker_index,
            });
        }
        self.loops = loops;
    }

    fn check_skip_targets(&self) {
        for record in &self.records {
            for skip in &record.directives.skip_targets {
                if !self.index.contains_key(&skip.directive.target) {
                    warn!(
                        question = %record.id,
                        target = %skip.directive.target,
                        "skip target does not exist"
                    );
                }
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Navigable record or grid row
    pub fn get(&self, id: &str) -> Option<&QuestionRecord> {
        self.index
            .get(id)
            .map(|&i| &self.records[i])
            .or_else(|| self.row_index.get(id).map(|&i| &self.rows[i]))
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn at(&self, position: usize) -> Option<&QuestionRecord> {
        self.records.get(position)
    }

    pub fn first(&self) -> Option<&QuestionRecord> {
        self.records.first()
    }

    /// Record that follows `id` in compiled order
    pub fn successor(&self, id: &str) -> Option<&QuestionRecord> {
        self.position(id).and_then(|p| self.records.get(p + 1))
    }

    pub fn iter(&self) -> impl Iterator<Item = &QuestionRecord> {
        self.records.iter()
    }

    pub fn loops(&self) -> &[LoopDescriptor] {
        &self.loops
    }

    /// Grid that owns a row id
    pub fn row_owner(&self, row_id: &str) -> Option<&str> {
        self.row_index
            .get(row_id)
            .and_then(|&i| self.rows[i].grid_membership.as_ref())
            .map(|m| m.grid_id.as_str())
    }

    pub fn row_owners(&self) -> HashMap<String, String> {
        self.rows
            .iter()
            .filter_map(|row| {
                row.grid_membership
                    .as_ref()
                    .map(|m| (row.id.clone(), m.grid_id.clone()))
            })
            .collect()
    }
}
