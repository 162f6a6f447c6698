use crate::ast::Span;
use crate::error::SurveyError;
use crate::syntax::*;
use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;
use std::sync::Arc;
use tracing::{debug, warn};

pub mod expressions;
pub mod grid;
pub mod prepass;

#[derive(Parser)]
#[grammar = "src/parser/survey.pest"]
pub struct SurveyParser;

/// Segment pre-processed definition text into one `ParsedQuestion` per boundary.
///
/// Boundaries that never close are dropped with a warning; the caller decides
/// whether the remaining sequence is usable.
pub fn parse_definition(content: &str, source_id: &str) -> Result<Vec<ParsedQuestion>, SurveyError> {
    let pairs = SurveyParser::parse(Rule::definition, content)
        .map_err(|e| pest_error(e, source_id, content))?;

    let mut questions = Vec::new();
    for pair in pairs.flatten() {
        match pair.as_rule() {
            Rule::question => questions.push(parse_question(pair)?),
            Rule::malformed => {
                let span = Span::from_pest_span(pair.as_span());
                let header = pair.as_str().lines().next().unwrap_or_default();
                warn!(
                    line = span.line,
                    header, "dropping question with unterminated boundary"
                );
            }
            Rule::preamble if !pair.as_str().trim().is_empty() => {
                debug!("ignoring text before the first question boundary");
            }
            _ => {}
        }
    }
    Ok(questions)
}

fn parse_question(pair: Pair<Rule>) -> Result<ParsedQuestion, SurveyError> {
    let span = Span::from_pest_span(pair.as_span());
    let mut id = None;
    let mut directives = Directives::default();
    let mut body = String::new();

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::question_id => id = Some(inner.as_str().to_string()),
            Rule::mandate => {
                directives.mandate = match inner.as_str() {
                    "!" => Mandate::Hard,
                    _ => Mandate::Soft,
                }
            }
            Rule::boundary_option => {
                let mut key = String::new();
                let mut value = None;
                for part in inner.into_inner() {
                    match part.as_rule() {
                        Rule::option_key => key = part.as_str().to_ascii_lowercase(),
                        Rule::option_value => value = Some(part.as_str().trim().to_string()),
                        _ => {}
                    }
                }
                apply_option(&mut directives, key, value);
            }
            Rule::body => body = inner.as_str().to_string(),
            _ => {}
        }
    }

    let id = id.ok_or_else(|| {
        SurveyError::State("Grammar error: question missing question_id".to_string())
    })?;
    directives.loop_entry = take_loop_entry(&mut directives.extra, &id);
    if id == crate::ast::TERMINAL_ID {
        directives.is_end = true;
    }

    Ok(ParsedQuestion {
        id,
        directives,
        body,
        span,
    })
}

fn apply_option(directives: &mut Directives, key: String, value: Option<String>) {
    match key.as_str() {
        "displayif" => directives.display_if = value.filter(|v| !v.is_empty()),
        "end" => directives.is_end = true,
        "grid" => directives.grid = true,
        _ => directives.extra.push((key, value)),
    }
}

/// Pull the loop annotation written by loop expansion out of the raw options
fn take_loop_entry(extra: &mut Vec<(String, Option<String>)>, id: &str) -> Option<LoopEntry> {
    const KEYS: [&str; 5] = ["loop", "bound", "max", "iteration", "base"];
    let lookup = |key: &str| {
        extra
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, v)| v.clone())
    };

    let loop_index = lookup("loop")?.parse::<usize>().ok();
    let bound_source = lookup("bound");
    let hard_max = lookup("max").and_then(|v| v.parse::<u32>().ok());
    let iteration = lookup("iteration").and_then(|v| v.parse::<u32>().ok());
    let base_id = lookup("base");
    extra.retain(|(k, _)| !KEYS.contains(&k.as_str()));

    match (loop_index, bound_source, hard_max, iteration, base_id) {
        (Some(loop_index), Some(bound_source), Some(hard_max), Some(iteration), Some(base_id)) => {
            Some(LoopEntry {
                loop_index,
                bound_source,
                hard_max,
                iteration,
                base_id,
            })
        }
        _ => {
            warn!(question = id, "ignoring incomplete loop annotation");
            None
        }
    }
}

/// Parse a question body into typed lines, resolving field keys as it goes.
pub fn parse_body(content: &str) -> Result<QuestionBody, SurveyError> {
    let pairs = SurveyParser::parse(Rule::question_body, content)
        .map_err(|e| pest_error(e, "<body>", content))?;

    let mut keys = KeyAllocator::default();
    let mut lines = Vec::new();
    for pair in pairs.flatten() {
        match pair.as_rule() {
            Rule::option_line => lines.push(BodyLine::Choice(parse_option_line(pair, &mut keys)?)),
            Rule::text_line => {
                let inlines = trim_inlines(parse_inlines(pair, &mut keys, None)?);
                if !inlines.is_empty() {
                    lines.push(BodyLine::Text(inlines));
                }
            }
            _ => {}
        }
    }
    Ok(QuestionBody { lines })
}

fn parse_option_line(pair: Pair<Rule>, keys: &mut KeyAllocator) -> Result<ChoiceOption, SurveyError> {
    let mut kind = ChoiceKind::Exclusive;
    let mut value = String::new();
    let mut label_pair = None;
    let mut skips = Vec::new();

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::choice_marker => {
                for part in inner.into_inner() {
                    match part.as_rule() {
                        Rule::choice_kind => {
                            kind = match part.as_str() {
                                "+" => ChoiceKind::Inclusive,
                                _ => ChoiceKind::Sole,
                            }
                        }
                        Rule::choice_value => value = part.as_str().to_string(),
                        _ => {}
                    }
                }
            }
            Rule::label => label_pair = Some(inner),
            Rule::skip_directive => skips.push(parse_skip_directive(inner)),
            _ => {}
        }
    }

    let label = match label_pair {
        Some(p) => parse_inlines(p, keys, Some(&value))?,
        None => Vec::new(),
    };
    Ok(ChoiceOption {
        kind,
        value,
        label: trim_inlines(label),
        skips,
    })
}

fn parse_skip_directive(pair: Pair<Rule>) -> SkipDirective {
    let mut target = String::new();
    let mut guard = None;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::question_id => target = inner.as_str().to_string(),
            Rule::skip_guard => {
                guard = inner
                    .into_inner()
                    .find(|p| p.as_rule() == Rule::guard_expr)
                    .map(|p| p.as_str().trim().to_string())
            }
            _ => {}
        }
    }
    SkipDirective { target, guard }
}

fn parse_inlines(
    pair: Pair<Rule>,
    keys: &mut KeyAllocator,
    option_value: Option<&str>,
) -> Result<Vec<Inline>, SurveyError> {
    let mut inlines: Vec<Inline> = Vec::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::line_text | Rule::label_text | Rule::stray_brace => {
                push_text(&mut inlines, inner.as_str());
            }
            Rule::computed_span => {
                let expr = inner
                    .into_inner()
                    .next()
                    .map(|p| p.as_str().trim().to_string())
                    .unwrap_or_default();
                inlines.push(Inline::Computed(expr));
            }
            Rule::context_var => {
                let name = inner
                    .into_inner()
                    .next()
                    .map(|p| p.as_str().to_string())
                    .unwrap_or_default();
                inlines.push(Inline::ContextVar(name));
            }
            Rule::field_marker => {
                inlines.push(Inline::Field(parse_field_marker(inner, keys, option_value)?));
            }
            _ => {}
        }
    }
    Ok(inlines)
}

fn parse_field_marker(
    pair: Pair<Rule>,
    keys: &mut KeyAllocator,
    option_value: Option<&str>,
) -> Result<FieldMarker, SurveyError> {
    let mut kind = None;
    let mut explicit_key = None;
    let mut marker = FieldMarker {
        kind: FieldKind::Text,
        key: String::new(),
        min: None,
        max: None,
        display_if: None,
        disabled: false,
        xor_group: None,
    };

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::field_kind => kind = FieldKind::from_keyword(inner.as_str()),
            Rule::field_key => explicit_key = Some(inner.as_str().to_string()),
            Rule::field_attr => {
                let mut name = String::new();
                let mut value = None;
                for part in inner.into_inner() {
                    match part.as_rule() {
                        Rule::attr_name => name = part.as_str().to_ascii_lowercase(),
                        Rule::attr_value => value = Some(part.as_str().to_string()),
                        _ => {}
                    }
                }
                match name.as_str() {
                    "min" => marker.min = value,
                    "max" => marker.max = value,
                    "displayif" => marker.display_if = value,
                    "disabled" => marker.disabled = true,
                    "xor" => marker.xor_group = value,
                    other => debug!(attribute = other, "ignoring unknown field attribute"),
                }
            }
            _ => {}
        }
    }

    marker.kind = kind.ok_or_else(|| {
        SurveyError::State("Grammar error: field_marker missing field_kind".to_string())
    })?;
    marker.key = match (explicit_key, marker.kind, option_value) {
        (Some(key), _, _) => key,
        (None, FieldKind::Other, Some(value)) => format!("other_{}", value),
        (None, kind, _) => keys.next(kind),
    };
    Ok(marker)
}

/// Hands out `text`, `text2`, `text3`, ... per field kind
#[derive(Default)]
struct KeyAllocator {
    counts: std::collections::HashMap<FieldKind, usize>,
}

impl KeyAllocator {
    fn next(&mut self, kind: FieldKind) -> String {
        let count = self.counts.entry(kind).or_insert(0);
        *count += 1;
        if *count == 1 {
            kind.keyword().to_string()
        } else {
            format!("{}{}", kind.keyword(), count)
        }
    }
}

fn push_text(inlines: &mut Vec<Inline>, text: &str) {
    if let Some(Inline::Text(previous)) = inlines.last_mut() {
        previous.push_str(text);
    } else {
        inlines.push(Inline::Text(text.to_string()));
    }
}

fn trim_inlines(mut inlines: Vec<Inline>) -> Vec<Inline> {
    if let Some(Inline::Text(first)) = inlines.first_mut() {
        *first = first.trim_start().to_string();
    }
    if let Some(Inline::Text(last)) = inlines.last_mut() {
        let trimmed = last.trim_end().len();
        last.truncate(trimmed);
    }
    inlines.retain(|inline| !matches!(inline, Inline::Text(t) if t.is_empty()));
    inlines
}

fn pest_error<R: pest::RuleType>(
    error: pest::error::Error<R>,
    source_id: &str,
    content: &str,
) -> SurveyError {
    let (line, col) = match error.line_col {
        pest::error::LineColLocation::Pos((line, col)) => (line, col),
        pest::error::LineColLocation::Span((line, col), _) => (line, col),
    };
    let start = match error.location {
        pest::error::InputLocation::Pos(pos) => pos,
        pest::error::InputLocation::Span((start, _)) => start,
    };
    SurveyError::parse(
        format!("{}", error.variant.message()),
        Span {
            start,
            end: start,
            line,
            col,
        },
        source_id,
        Arc::from(content),
    )
}
