use crate::error_formatter;
use crate::formatter::Formatter;
use anyhow::{Context, Result};
use canvass::compiler::{FieldShape, FieldSpec, RecordContent};
use canvass::syntax::{BodyLine, FieldKind, GridColumn, GridColumnKind, GridRow, Inline};
use canvass::{QuestionRecord, ResponseValue, SurveyError, SurveySession, Transition, Value};
use inquire::{Confirm, CustomType, DateSelect, MultiSelect, Select, Text};
use rust_decimal::Decimal;

/// Everything needed to prompt for one question without holding a borrow
/// of the session
struct QuestionView {
    id: String,
    terminal: bool,
    prompt: String,
    fields: Vec<FieldSpec>,
    options: Vec<(String, String)>,
    rows: Vec<GridRow>,
    columns: Vec<GridColumn>,
}

/// Walk the respondent through the survey until it is submitted or they quit
pub fn run_survey(session: &mut SurveySession) -> Result<()> {
    let formatter = Formatter::new();

    loop {
        let view = view_current(session, &formatter)?;
        println!("\n[{}] {}", view.id, view.prompt);

        if view.terminal {
            let submit = Confirm::new("Submit your answers?")
                .with_default(true)
                .prompt()
                .context("Failed to get confirmation")?;
            let transition = if submit {
                session.submit()?
            } else {
                session.retreat()?
            };
            println!("{}", formatter.format_transition(&transition));
            if matches!(transition, Transition::Submitted { .. }) {
                return Ok(());
            }
            continue;
        }

        for field in &view.fields {
            if session.is_field_visible(&view.id, &field.key) {
                ask_field(session, &view, field)?;
            }
        }

        let action = Select::new("Next step:", vec!["Next", "Back", "Save and quit"])
            .with_help_message("Use arrow keys to navigate, Enter to select")
            .prompt()
            .context("Failed to get navigation choice")?;
        let result = match action {
            "Next" => session.advance(),
            "Back" => session.retreat(),
            _ => {
                println!("Progress saved.");
                return Ok(());
            }
        };

        let transition = match result {
            Ok(Transition::Blocked {
                overridable: true, ..
            }) => {
                let anyway = Confirm::new("Some answers are missing. Continue anyway?")
                    .with_default(false)
                    .prompt()
                    .context("Failed to get confirmation")?;
                if anyway {
                    session.advance_anyway()?
                } else {
                    continue;
                }
            }
            Ok(transition) => transition,
            Err(err @ SurveyError::LoopBound { .. }) => {
                eprintln!("{}", error_formatter::format_error(&err));
                continue;
            }
            Err(err) => return Err(err.into()),
        };
        println!("{}", formatter.format_transition(&transition));
    }
}

fn view_current(session: &SurveySession, formatter: &Formatter) -> Result<QuestionView> {
    let record = session
        .current()
        .context("The survey has not started")?;
    let computed: Vec<Option<Value>> = session
        .computed_values(&record.id)
        .into_iter()
        .map(|c| c.value)
        .collect();
    let prompt = formatter.format_prompt(record, &computed, |name| {
        session.context().get(name).unwrap_or_default().to_string()
    });
    let (rows, columns) = match &record.content {
        RecordContent::Grid(table) => (table.rows.clone(), table.columns.clone()),
        RecordContent::GridRow { row, columns } => (vec![row.clone()], columns.clone()),
        _ => (Vec::new(), Vec::new()),
    };

    Ok(QuestionView {
        id: record.id.clone(),
        terminal: record.is_terminal(),
        prompt,
        fields: record.fields(),
        options: choice_options(record),
        rows,
        columns,
    })
}

fn choice_options(record: &QuestionRecord) -> Vec<(String, String)> {
    let RecordContent::Body(body) = &record.content else {
        return Vec::new();
    };
    body.lines
        .iter()
        .filter_map(|line| match line {
            BodyLine::Choice(option) => Some((option.value.clone(), plain_label(&option.label))),
            BodyLine::Text(_) => None,
        })
        .collect()
}

fn plain_label(inlines: &[Inline]) -> String {
    inlines
        .iter()
        .filter_map(|inline| match inline {
            Inline::Text(text) => Some(text.as_str()),
            _ => None,
        })
        .collect::<String>()
        .trim()
        .to_string()
}

fn ask_field(session: &mut SurveySession, view: &QuestionView, field: &FieldSpec) -> Result<()> {
    let current = session.find_response_value(&field.key, &view.id);

    let answer = match field.shape {
        FieldShape::Choice { multiple } => {
            let options = view.options.clone();
            choose(&field.key, &options, current.as_ref(), multiple)?
        }
        FieldShape::Grid(kind @ (GridColumnKind::Radio | GridColumnKind::Checkbox)) => {
            let prompt = grid_row_prompt(view, &field.key);
            let options: Vec<(String, String)> = view
                .columns
                .iter()
                .filter(|c| c.kind == kind)
                .map(|c| (c.value.clone(), c.label.clone()))
                .collect();
            choose(&prompt, &options, current.as_ref(), kind == GridColumnKind::Checkbox)?
        }
        FieldShape::Grid(GridColumnKind::Text) => {
            let prompt = grid_row_prompt(view, &field.key);
            ask_text(&prompt, current.as_ref())?
        }
        FieldShape::Input(FieldKind::Other) => {
            if !other_selected(session, &view.id, &field.key) {
                return Ok(());
            }
            ask_text("Please specify:", current.as_ref())?
        }
        FieldShape::Input(FieldKind::Number) => ask_number(session, &view.id, field, current.as_ref())?,
        FieldShape::Input(FieldKind::Date) => {
            let mut prompt = DateSelect::new(&field.key)
                .with_help_message("Use arrow keys to navigate, Enter to select");
            if let Some(date) = current
                .as_ref()
                .and_then(|v| chrono::NaiveDate::parse_from_str(&v.values().join(""), "%Y-%m-%d").ok())
            {
                prompt = prompt.with_default(date);
            }
            prompt
                .prompt_skippable()
                .context(format!("Failed to get date for {}", field.key))?
                .map(|date| ResponseValue::scalar(date.format("%Y-%m-%d").to_string()))
        }
        FieldShape::Input(FieldKind::Month) => ask_text(&format!("{} [YYYY-MM]", field.key), current.as_ref())?,
        FieldShape::Input(FieldKind::Text | FieldKind::TextArea) => ask_text(&field.key, current.as_ref())?,
    };

    if let Some(value) = answer {
        session.set_field(&field.key, value)?;
    }
    Ok(())
}

fn choose(
    message: &str,
    options: &[(String, String)],
    current: Option<&ResponseValue>,
    multiple: bool,
) -> Result<Option<ResponseValue>> {
    if options.is_empty() {
        return Ok(None);
    }
    let display_options: Vec<String> = options
        .iter()
        .map(|(value, label)| format!("({}) {}", value, label))
        .collect();
    let selected: Vec<usize> = options
        .iter()
        .enumerate()
        .filter(|(_, (value, _))| current.is_some_and(|c| c.contains(value)))
        .map(|(index, _)| index)
        .collect();

    let to_value = |label: &String| {
        display_options
            .iter()
            .position(|d| d == label)
            .map(|index| options[index].0.clone())
    };

    if multiple {
        let picked = MultiSelect::new(message, display_options.clone())
            .with_default(&selected)
            .prompt_skippable()
            .context("Failed to get selection")?;
        Ok(picked.map(|labels| ResponseValue::list(labels.iter().filter_map(to_value))))
    } else {
        let picked = Select::new(message, display_options.clone())
            .with_starting_cursor(selected.first().copied().unwrap_or(0))
            .prompt_skippable()
            .context("Failed to get selection")?;
        Ok(picked.as_ref().and_then(to_value).map(ResponseValue::scalar))
    }
}

fn ask_text(message: &str, current: Option<&ResponseValue>) -> Result<Option<ResponseValue>> {
    let default = current.map(|v| v.values().join(",")).unwrap_or_default();
    let answer = Text::new(message)
        .with_default(&default)
        .prompt_skippable()
        .context(format!("Failed to get value for {}", message))?;
    Ok(answer.map(|text| ResponseValue::scalar(text.trim())))
}

fn ask_number(
    session: &SurveySession,
    question: &str,
    field: &FieldSpec,
    current: Option<&ResponseValue>,
) -> Result<Option<ResponseValue>> {
    let bounds = session.numeric_bounds(question, &field.key);
    let help = match (bounds.min, bounds.max) {
        (Some(min), Some(max)) => format!("Between {} and {}", min, max),
        (Some(min), None) => format!("At least {}", min),
        (None, Some(max)) => format!("At most {}", max),
        (None, None) => "A number".to_string(),
    };

    loop {
        let mut prompt = CustomType::<Decimal>::new(&field.key)
            .with_help_message(&help)
            .with_error_message("Please type a number");
        if let Some(existing) = current.and_then(|v| v.values().join("").parse::<Decimal>().ok()) {
            prompt = prompt.with_default(existing);
        }
        let Some(number) = prompt
            .prompt_skippable()
            .context(format!("Failed to get number for {}", field.key))?
        else {
            return Ok(None);
        };
        let below = bounds.min.is_some_and(|min| number < min);
        let above = bounds.max.is_some_and(|max| number > max);
        if below || above {
            println!("{}", help);
            continue;
        }
        return Ok(Some(ResponseValue::scalar(number.to_string())));
    }
}

/// `other_N` inputs are only asked for when option `N` is selected
fn other_selected(session: &SurveySession, question: &str, key: &str) -> bool {
    let Some(value) = key.strip_prefix("other_") else {
        return true;
    };
    ["choice", "choices"].iter().any(|group| {
        session
            .find_response_value(group, question)
            .is_some_and(|selected| selected.contains(value))
    })
}

fn grid_row_prompt(view: &QuestionView, key: &str) -> String {
    view.rows
        .iter()
        .find_map(|row| {
            if row.id == key {
                return Some(row.prompt.clone());
            }
            let column = key.strip_prefix(&row.id)?.strip_prefix('_')?;
            let label = view
                .columns
                .iter()
                .find(|c| c.value == column)
                .map_or(column, |c| c.label.as_str());
            Some(format!("{}: {}", row.prompt, label))
        })
        .unwrap_or_else(|| key.to_string())
}
