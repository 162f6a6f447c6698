use ariadne::{Color, Label, Report, ReportKind, Source};
use canvass::SurveyError;

/// Format a SurveyError with fancy terminal output using Ariadne
pub fn format_error(error: &SurveyError) -> String {
    match error {
        SurveyError::Parse(details) => {
            let mut output = Vec::new();
            let message = format!(
                "Parse error: {} (in {} at line {}, column {})",
                details.message, details.source_id, details.span.line, details.span.col
            );
            let end = details.span.end.max(details.span.start + 1);

            let mut report = Report::build(ReportKind::Error, &details.source_id, details.span.start)
                .with_message(message)
                .with_label(
                    Label::new((&details.source_id, details.span.start..end))
                        .with_message("")
                        .with_color(Color::Red),
                );
            if let Some(suggestion) = &details.suggestion {
                report = report.with_help(suggestion);
            }

            match report.finish().write(
                (
                    &details.source_id,
                    Source::from(details.source_text.as_ref()),
                ),
                &mut output,
            ) {
                Ok(_) => String::from_utf8_lossy(&output).to_string(),
                Err(_) => format!("{}", error),
            }
        }
        SurveyError::EmptySurvey(name) => {
            format!("Survey '{}' has no questions.\n  Questions start with [ID] at the beginning of a line.", name)
        }
        SurveyError::Expression {
            expression,
            message,
        } => format!("Expression error: {}\n  Expression: {}", message, expression),
        SurveyError::LoopBound {
            loop_index,
            source_id,
            found,
        } => format!(
            "Loop {} cannot run: '{}' must hold a whole number, found '{}'",
            loop_index, source_id, found
        ),
        SurveyError::Navigation(msg) => format!("Navigation error: {}", msg),
        SurveyError::Persistence(msg) => format!("Persistence error: {}", msg),
        SurveyError::State(msg) => format!("State error: {}", msg),
        SurveyError::ResourceLimitExceeded {
            limit_name,
            limit_value,
            actual_value,
            suggestion,
        } => {
            format!(
                "Resource limit exceeded: {}\n  Limit: {}\n  Actual: {}\n  {}",
                limit_name, limit_value, actual_value, suggestion
            )
        }
    }
}
