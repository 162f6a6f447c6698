//! Question records: one compiled unit of the survey

use super::context::SurveyContext;
use super::render;
use crate::ast::{LoopMarker, Span, TERMINAL_ID};
use crate::syntax::{
    BodyLine, ChoiceKind, Directives, FieldKind, GridColumn, GridColumnKind, GridRow, GridTable,
    Inline, QuestionBody,
};
use serde::Serialize;
use std::sync::OnceLock;

/// What a record was compiled from
#[derive(Debug, Clone, PartialEq)]
pub enum RecordContent {
    Body(QuestionBody),
    Grid(GridTable),
    /// One row of a grid, addressable on its own but never navigated to
    GridRow {
        row: GridRow,
        columns: Vec<GridColumn>,
    },
    Marker(LoopMarker),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GridMembership {
    pub grid_id: String,
    pub row_index: usize,
}

#[derive(Debug, Clone)]
pub struct QuestionRecord {
    pub id: String,
    /// Uncompiled body text; `None` for records built from a grid table
    pub raw_body: Option<String>,
    pub directives: Directives,
    pub content: RecordContent,
    pub grid_membership: Option<GridMembership>,
    pub span: Span,
    markup: OnceLock<String>,
}

impl QuestionRecord {
    pub fn new(
        id: impl Into<String>,
        raw_body: Option<String>,
        directives: Directives,
        content: RecordContent,
        span: Span,
    ) -> Self {
        Self {
            id: id.into(),
            raw_body,
            directives,
            content,
            grid_membership: None,
            span,
            markup: OnceLock::new(),
        }
    }

    /// Rendered markup, produced on first access and cached for the session
    pub fn markup(&self, context: &SurveyContext) -> &str {
        self.markup
            .get_or_init(|| render::render_record(self, context))
    }

    pub fn is_compiled(&self) -> bool {
        self.markup.get().is_some()
    }

    pub fn loop_marker(&self) -> Option<LoopMarker> {
        match &self.content {
            RecordContent::Marker(marker) => Some(*marker),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.directives.is_end || self.id == TERMINAL_ID
    }

    /// Answerable fields in render order
    pub fn fields(&self) -> Vec<FieldSpec> {
        match &self.content {
            RecordContent::Body(body) => body_fields(body),
            RecordContent::Grid(table) => table
                .rows
                .iter()
                .flat_map(|row| row_fields(row, &table.columns))
                .collect(),
            RecordContent::GridRow { row, columns } => row_fields(row, columns),
            RecordContent::Marker(_) => Vec::new(),
        }
    }

    /// Values of options that clear the rest of their checkbox group
    pub fn sole_values(&self) -> Vec<&str> {
        self.choices()
            .filter(|(kind, _)| *kind == ChoiceKind::Sole)
            .map(|(_, value)| value)
            .collect()
    }

    fn choices(&self) -> impl Iterator<Item = (ChoiceKind, &str)> {
        let lines: &[BodyLine] = match &self.content {
            RecordContent::Body(body) => &body.lines,
            _ => &[],
        };
        lines.iter().filter_map(|line| match line {
            BodyLine::Choice(option) => Some((option.kind, option.value.as_str())),
            BodyLine::Text(_) => None,
        })
    }

    /// Computed-span expressions in document order
    pub fn computed_expressions(&self) -> Vec<&str> {
        let RecordContent::Body(body) = &self.content else {
            return Vec::new();
        };
        body.lines
            .iter()
            .flat_map(|line| match line {
                BodyLine::Text(inlines) => inlines.as_slice(),
                BodyLine::Choice(option) => option.label.as_slice(),
            })
            .filter_map(|inline| match inline {
                Inline::Computed(expr) => Some(expr.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// How a field is answered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldShape {
    Input(FieldKind),
    /// Radio group (`multiple == false`) or checkbox group
    Choice { multiple: bool },
    Grid(GridColumnKind),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSpec {
    pub key: String,
    pub shape: FieldShape,
    pub display_if: Option<String>,
    pub disabled: bool,
    pub xor_group: Option<String>,
    pub min: Option<String>,
    pub max: Option<String>,
}

impl FieldSpec {
    fn plain(key: impl Into<String>, shape: FieldShape) -> Self {
        Self {
            key: key.into(),
            shape,
            display_if: None,
            disabled: false,
            xor_group: None,
            min: None,
            max: None,
        }
    }
}

pub const RADIO_KEY: &str = "choice";
pub const CHECKBOX_KEY: &str = "choices";

fn body_fields(body: &QuestionBody) -> Vec<FieldSpec> {
    let mut fields = Vec::new();
    let mut radio = false;
    let mut checkbox = false;

    for line in &body.lines {
        let inlines = match line {
            BodyLine::Text(inlines) => inlines,
            BodyLine::Choice(option) => {
                match option.kind {
                    ChoiceKind::Exclusive if !radio => {
                        radio = true;
                        fields.push(FieldSpec::plain(
                            RADIO_KEY,
                            FieldShape::Choice { multiple: false },
                        ));
                    }
                    ChoiceKind::Inclusive | ChoiceKind::Sole if !checkbox => {
                        checkbox = true;
                        fields.push(FieldSpec::plain(
                            CHECKBOX_KEY,
                            FieldShape::Choice { multiple: true },
                        ));
                    }
                    _ => {}
                }
                &option.label
            }
        };
        for inline in inlines {
            if let Inline::Field(marker) = inline {
                fields.push(FieldSpec {
                    key: marker.key.clone(),
                    shape: FieldShape::Input(marker.kind),
                    display_if: marker.display_if.clone(),
                    disabled: marker.disabled,
                    xor_group: marker.xor_group.clone(),
                    min: marker.min.clone(),
                    max: marker.max.clone(),
                });
            }
        }
    }
    fields
}

/// Choice columns share one field per row; each text column is its own field
fn row_fields(row: &GridRow, columns: &[GridColumn]) -> Vec<FieldSpec> {
    let mut fields = Vec::new();
    let mut choice_added = false;
    for column in columns {
        match column.kind {
            GridColumnKind::Text => fields.push(FieldSpec::plain(
                grid_text_key(&row.id, &column.value),
                FieldShape::Grid(GridColumnKind::Text),
            )),
            kind if !choice_added => {
                choice_added = true;
                fields.push(FieldSpec::plain(row.id.clone(), FieldShape::Grid(kind)));
            }
            _ => {}
        }
    }
    fields
}

pub fn grid_text_key(row_id: &str, column_value: &str) -> String {
    format!("{}_{}", row_id, column_value)
}
