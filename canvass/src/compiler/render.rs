//! Markup rendering
//!
//! Every element identifier is `{question}_{suffix}` and every field name is
//! `{question}_{key}`, so fields can be located from an id alone.

use super::context::SurveyContext;
use super::record::{grid_text_key, QuestionRecord, RecordContent, CHECKBOX_KEY, RADIO_KEY};
use crate::ast::TERMINAL_ID;
use crate::syntax::{
    BodyLine, ChoiceKind, ChoiceOption, FieldKind, FieldMarker, GridColumnKind, GridRow,
    GridColumn, GridTable, Inline, Mandate, QuestionBody,
};
use std::fmt::Write;
use tracing::warn;

pub fn render_record(record: &QuestionRecord, context: &SurveyContext) -> String {
    let mut out = String::new();
    match &record.content {
        RecordContent::Marker(_) => return out,
        RecordContent::Body(body) => {
            open_section(&mut out, record);
            BodyRenderer::new(&record.id, context, &mut out).body(body);
        }
        RecordContent::Grid(table) => {
            open_section(&mut out, record);
            grid(&mut out, table);
        }
        RecordContent::GridRow { row, columns } => {
            let grid_id = record
                .grid_membership
                .as_ref()
                .map_or(record.id.as_str(), |m| m.grid_id.as_str());
            out.push_str("<table class=\"grid\"><tbody>");
            grid_row(&mut out, grid_id, row, columns);
            out.push_str("</tbody></table>");
            return out;
        }
    }
    if record.is_terminal() {
        let _ = write!(
            out,
            "<button type=\"submit\" id=\"{0}_submit\" name=\"{0}_submit\">Submit</button>",
            TERMINAL_ID
        );
    }
    out.push_str("</section>");
    out
}

fn open_section(out: &mut String, record: &QuestionRecord) {
    let _ = write!(out, "<section class=\"question\" id=\"{}\"", escape(&record.id));
    match record.directives.mandate {
        Mandate::Hard => out.push_str(" data-mandate=\"hard\""),
        Mandate::Soft => out.push_str(" data-mandate=\"soft\""),
        Mandate::Optional => {}
    }
    out.push('>');
}

struct BodyRenderer<'a> {
    question: &'a str,
    context: &'a SurveyContext,
    out: &'a mut String,
    computed: usize,
}

impl<'a> BodyRenderer<'a> {
    fn new(question: &'a str, context: &'a SurveyContext, out: &'a mut String) -> Self {
        Self {
            question,
            context,
            out,
            computed: 0,
        }
    }

    fn body(&mut self, body: &QuestionBody) {
        for line in &body.lines {
            match line {
                BodyLine::Text(inlines) => {
                    self.out.push_str("<p>");
                    self.inlines(inlines);
                    self.out.push_str("</p>");
                }
                BodyLine::Choice(option) => self.option(option),
            }
        }
    }

    fn option(&mut self, option: &ChoiceOption) {
        let q = escape(self.question);
        let value = escape(&option.value);
        let (input_type, key) = match option.kind {
            ChoiceKind::Exclusive => ("radio", RADIO_KEY),
            ChoiceKind::Inclusive | ChoiceKind::Sole => ("checkbox", CHECKBOX_KEY),
        };
        let _ = write!(
            self.out,
            "<div class=\"option\"><input type=\"{t}\" id=\"{q}_{k}_{v}\" name=\"{q}_{k}\" value=\"{v}\"",
            t = input_type,
            q = q,
            k = key,
            v = value
        );
        if option.kind == ChoiceKind::Sole {
            self.out.push_str(" data-exclusive=\"true\"");
        }
        if !option.skips.is_empty() {
            let targets: Vec<&str> = option.skips.iter().map(|s| s.target.as_str()).collect();
            let _ = write!(self.out, " data-skip=\"{}\"", escape(&targets.join(" ")));
        }
        let _ = write!(self.out, "><label for=\"{}_{}_{}\">", q, key, value);
        self.inlines(&option.label);
        self.out.push_str("</label></div>");
    }

    fn inlines(&mut self, inlines: &[Inline]) {
        for inline in inlines {
            match inline {
                Inline::Text(text) => self.out.push_str(&escape(text)),
                Inline::ContextVar(name) => match self.context.get(name) {
                    Some(value) => self.out.push_str(&escape(value)),
                    None => warn!(question = self.question, name = %name, "unknown context variable"),
                },
                Inline::Computed(expr) => {
                    self.computed += 1;
                    let _ = write!(
                        self.out,
                        "<span class=\"computed\" id=\"{}_computed_{}\" data-expr=\"{}\"></span>",
                        escape(self.question),
                        self.computed,
                        escape(expr)
                    );
                }
                Inline::Field(marker) => self.field(marker),
            }
        }
    }

    fn field(&mut self, marker: &FieldMarker) {
        let name = format!("{}_{}", escape(self.question), escape(&marker.key));
        let mut attributes = format!("id=\"{0}\" name=\"{0}\"", name);
        if let Some(min) = &marker.min {
            let _ = write!(attributes, " data-min-expr=\"{}\"", escape(min));
        }
        if let Some(max) = &marker.max {
            let _ = write!(attributes, " data-max-expr=\"{}\"", escape(max));
        }
        if let Some(condition) = &marker.display_if {
            let _ = write!(attributes, " data-displayif=\"{}\"", escape(condition));
        }
        if let Some(group) = &marker.xor_group {
            let _ = write!(attributes, " data-xor=\"{}\"", escape(group));
        }
        if marker.disabled {
            attributes.push_str(" disabled");
        }

        let _ = match marker.kind {
            FieldKind::TextArea => write!(self.out, "<textarea {}></textarea>", attributes),
            FieldKind::Other => write!(
                self.out,
                "<input type=\"text\" class=\"other\" {}>",
                attributes
            ),
            kind => write!(self.out, "<input type=\"{}\" {}>", input_type(kind), attributes),
        };
    }
}

fn input_type(kind: FieldKind) -> &'static str {
    match kind {
        FieldKind::Number => "number",
        FieldKind::Date => "date",
        FieldKind::Month => "month",
        _ => "text",
    }
}

fn grid(out: &mut String, table: &GridTable) {
    if !table.shared_text.trim().is_empty() {
        let _ = write!(out, "<p>{}</p>", escape(table.shared_text.trim()));
    }
    let _ = write!(
        out,
        "<table class=\"grid\" id=\"{}_table\"><thead><tr><th></th>",
        escape(&table.id)
    );
    for column in &table.columns {
        let _ = write!(out, "<th>{}</th>", escape(&column.label));
    }
    out.push_str("</tr></thead><tbody>");
    for row in &table.rows {
        grid_row(out, &table.id, row, &table.columns);
    }
    out.push_str("</tbody></table>");
}

fn grid_row(out: &mut String, grid_id: &str, row: &GridRow, columns: &[GridColumn]) {
    let g = escape(grid_id);
    let r = escape(&row.id);
    let _ = write!(
        out,
        "<tr id=\"{g}_{r}_row\"><th>{}</th>",
        escape(&row.prompt),
        g = g,
        r = r
    );
    for column in columns {
        let v = escape(&column.value);
        let _ = match column.kind {
            GridColumnKind::Text => {
                let name = escape(&grid_text_key(&row.id, &column.value));
                write!(
                    out,
                    "<td><input type=\"text\" id=\"{g}_{n}\" name=\"{g}_{n}\"></td>",
                    g = g,
                    n = name
                )
            }
            kind => write!(
                out,
                "<td><input type=\"{t}\" id=\"{g}_{r}_{v}\" name=\"{g}_{r}\" value=\"{v}\"></td>",
                t = if kind == GridColumnKind::Checkbox {
                    "checkbox"
                } else {
                    "radio"
                },
                g = g,
                r = r,
                v = v
            ),
        };
    }
    out.push_str("</tr>");
}

pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
