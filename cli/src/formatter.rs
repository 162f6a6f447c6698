use canvass::compiler::{FieldShape, FieldSpec, RecordContent};
use canvass::syntax::{BodyLine, Inline, Mandate};
use canvass::{QuestionRecord, QuestionSequence, Transition, Value};
use comfy_table::{presets::UTF8_FULL, Cell, CellAlignment, Row, Table};

pub struct Formatter {}

impl Default for Formatter {
    fn default() -> Self {
        Self::new()
    }
}

impl Formatter {
    pub fn new() -> Self {
        Self {}
    }

    /// Table of every compiled record plus one line per loop
    pub fn format_sequence(&self, sequence: &QuestionSequence) -> String {
        let mut output = String::new();
        output.push_str(&format!(
            "Survey '{}': {} records, {} loop(s)\n",
            sequence.name(),
            sequence.len(),
            sequence.loops().len()
        ));

        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(Row::from(vec![
            Cell::new("Id").set_alignment(CellAlignment::Left),
            Cell::new("Kind").set_alignment(CellAlignment::Left),
            Cell::new("Mandate").set_alignment(CellAlignment::Left),
            Cell::new("Fields").set_alignment(CellAlignment::Left),
            Cell::new("Shown if").set_alignment(CellAlignment::Left),
            Cell::new("Skips").set_alignment(CellAlignment::Left),
        ]));

        for record in sequence.iter() {
            let skips = record
                .directives
                .skip_targets
                .iter()
                .map(|skip| match &skip.directive.guard {
                    Some(guard) => format!("{} -> {} if {}", skip.option_value, skip.directive.target, guard),
                    None => format!("{} -> {}", skip.option_value, skip.directive.target),
                })
                .collect::<Vec<_>>()
                .join("\n");
            table.add_row(vec![
                Cell::new(&record.id),
                Cell::new(record_kind(record)),
                Cell::new(mandate_label(record.directives.mandate)),
                Cell::new(
                    record
                        .fields()
                        .iter()
                        .map(field_label)
                        .collect::<Vec<_>>()
                        .join(", "),
                ),
                Cell::new(record.directives.display_if.as_deref().unwrap_or("")),
                Cell::new(skips),
            ]);
        }
        output.push_str(&table.to_string());
        output.push('\n');

        for descriptor in sequence.loops() {
            output.push_str(&format!(
                "Loop {}: {} x up to {} (bound by {})\n",
                descriptor.loop_index,
                descriptor.first_question_base_id,
                descriptor.hard_max,
                descriptor.bound_source_id
            ));
        }
        output
    }

    /// Question text for a terminal prompt, with computed spans filled in
    pub fn format_prompt(
        &self,
        record: &QuestionRecord,
        computed: &[Option<Value>],
        context: impl Fn(&str) -> String,
    ) -> String {
        let mut computed = computed.iter();
        let mut output = String::new();
        let mut push_inlines = |inlines: &[Inline], output: &mut String| {
            for inline in inlines {
                match inline {
                    Inline::Text(text) => output.push_str(text),
                    Inline::Computed(_) => match computed.next() {
                        Some(Some(value)) => output.push_str(&value.to_string()),
                        _ => output.push('?'),
                    },
                    Inline::ContextVar(name) => output.push_str(&context(name)),
                    Inline::Field(marker) => output.push_str(&format!("[{}]", marker.key)),
                }
            }
        };

        match &record.content {
            RecordContent::Body(body) => {
                for line in &body.lines {
                    match line {
                        BodyLine::Text(inlines) => push_inlines(inlines, &mut output),
                        BodyLine::Choice(option) => {
                            output.push_str(&format!("  ({}) ", option.value));
                            push_inlines(&option.label, &mut output);
                        }
                    }
                    output.push('\n');
                }
            }
            RecordContent::Grid(table) => {
                output.push_str(&table.shared_text);
                output.push('\n');
            }
            RecordContent::GridRow { row, .. } => {
                output.push_str(&row.prompt);
                output.push('\n');
            }
            RecordContent::Marker(_) => {}
        }
        output.trim().to_string()
    }

    pub fn format_transition(&self, transition: &Transition) -> String {
        match transition {
            Transition::Moved { to, .. } => format!("-> {}", to),
            Transition::Terminal { at } => format!("-> {} (end of survey)", at),
            Transition::Submitted { completed_at, .. } => {
                format!("Submitted at {}", completed_at.format("%Y-%m-%d %H:%M:%S UTC"))
            }
            Transition::Blocked {
                unanswered,
                overridable: false,
            } => format!("This question needs an answer ({} field(s) blank)", unanswered),
            Transition::Blocked { unanswered, .. } => {
                format!("{} field(s) left blank", unanswered)
            }
            Transition::Unchanged => "Nowhere to go from here".to_string(),
            Transition::RolledBack { notice, .. } => notice.message.clone(),
        }
    }

    /// `ids` one per line, then the final state
    pub fn format_walk(&self, ids: &[String], finished: bool) -> String {
        let mut output = String::new();
        for id in ids {
            output.push_str(id);
            output.push('\n');
        }
        if finished {
            output.push_str("(end of survey)\n");
        }
        output
    }
}

fn record_kind(record: &QuestionRecord) -> &'static str {
    match &record.content {
        RecordContent::Grid(_) => "grid",
        RecordContent::GridRow { .. } => "grid row",
        RecordContent::Marker(_) => "marker",
        RecordContent::Body(_) if record.is_terminal() => "end",
        RecordContent::Body(_) if record.directives.loop_entry.is_some() => "loop entry",
        RecordContent::Body(_) => "question",
    }
}

fn mandate_label(mandate: Mandate) -> &'static str {
    match mandate {
        Mandate::Optional => "",
        Mandate::Soft => "soft",
        Mandate::Hard => "hard",
    }
}

fn field_label(field: &FieldSpec) -> String {
    let shape = match field.shape {
        FieldShape::Input(kind) => kind.keyword(),
        FieldShape::Choice { multiple: false } => "radio",
        FieldShape::Choice { multiple: true } => "checkbox",
        FieldShape::Grid(_) => "cell",
    };
    format!("{}:{}", field.key, shape)
}
