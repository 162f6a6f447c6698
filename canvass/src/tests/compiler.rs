use crate::ast::LoopMarker;
use crate::compiler::worker::compile_on_worker;
use crate::compiler::{compile, FieldShape, RecordContent, SurveyContext};
use crate::error::SurveyError;
use crate::resource_limits::ResourceLimits;
use crate::syntax::{FieldKind, GridColumnKind, Mandate};
use chrono::NaiveDate;
use std::time::Duration;

const HOUSEHOLD: &str = "[COUNT] How many people live here?
{number}
<loop bound=COUNT max=3>
[NAME] Name of person $i
{text}
[AGE] Age of person $i
{number}
</loop>
[END] Done";

fn ids(sequence: &crate::compiler::QuestionSequence) -> Vec<&str> {
    sequence.iter().map(|r| r.id.as_str()).collect()
}

fn fixed_context() -> SurveyContext {
    let now = NaiveDate::from_ymd_opt(2024, 3, 15)
        .unwrap()
        .and_hms_opt(9, 30, 0)
        .unwrap();
    SurveyContext::at(now, Some("tester"))
}

#[test]
fn test_records_follow_definition_order() {
    let sequence = compile("[Q1] a\n[Q2] b\n[END] c", "simple", &ResourceLimits::default()).unwrap();
    assert_eq!(ids(&sequence), vec!["Q1", "Q2", "END"]);
    assert_eq!(sequence.name(), "simple");
    assert_eq!(sequence.first().unwrap().id, "Q1");
    assert_eq!(sequence.successor("Q1").unwrap().id, "Q2");
    assert!(sequence.successor("END").is_none());
}

#[test]
fn test_loop_unrolls_into_records() {
    let sequence = compile(HOUSEHOLD, "household", &ResourceLimits::default()).unwrap();
    assert_eq!(
        ids(&sequence),
        vec![
            "COUNT",
            "NAME_1_1",
            "AGE_1_1",
            "__CONT_0_1",
            "NAME_2_2",
            "AGE_2_2",
            "__CONT_0_2",
            "NAME_3_3",
            "AGE_3_3",
            "__CONT_0_3",
            "__ENDLOOP_0",
            "END",
        ]
    );
}

#[test]
fn test_loop_descriptor() {
    let sequence = compile(HOUSEHOLD, "household", &ResourceLimits::default()).unwrap();
    let loops = sequence.loops();
    assert_eq!(loops.len(), 1);

    let descriptor = &loops[0];
    assert_eq!(descriptor.loop_index, 0);
    assert_eq!(descriptor.bound_source_id, "COUNT");
    assert_eq!(descriptor.hard_max, 3);
    assert_eq!(descriptor.current_bound, None);
    assert_eq!(descriptor.first_question_base_id, "NAME");
    assert_eq!(descriptor.location_index, sequence.position("NAME_1_1").unwrap());
    assert_eq!(descriptor.end_marker_index, sequence.position("__ENDLOOP_0").unwrap());
    assert_eq!(descriptor.iteration_entry(2), "NAME_2_2");
}

#[test]
fn test_marker_records() {
    let sequence = compile(HOUSEHOLD, "household", &ResourceLimits::default()).unwrap();
    let marker = sequence.get("__CONT_0_2").unwrap();
    assert_eq!(
        marker.loop_marker(),
        Some(LoopMarker::Continuation {
            loop_index: 0,
            iteration: 2
        })
    );
    assert_eq!(marker.markup(&fixed_context()), "");
    assert!(marker.fields().is_empty());
}

#[test]
fn test_iteration_text_is_substituted() {
    let sequence = compile(HOUSEHOLD, "household", &ResourceLimits::default()).unwrap();
    let markup = sequence.get("NAME_2_2").unwrap().markup(&fixed_context());
    assert!(markup.contains("Name of person 2"));
    assert!(markup.contains("name=\"NAME_2_2_text\""));
}

#[test]
fn test_markup_is_rendered_lazily_once() {
    let sequence = compile("[Q1] Hello {@user}\n{text}\n[END] Bye", "lazy", &ResourceLimits::default()).unwrap();
    let record = sequence.get("Q1").unwrap();

    assert!(!record.is_compiled());
    let first = record.markup(&fixed_context());
    assert!(record.is_compiled());
    let second = record.markup(&SurveyContext::default());
    assert!(std::ptr::eq(first, second));
    assert!(second.contains("Hello tester"));
    assert!(!sequence.get("END").unwrap().is_compiled());
}

#[test]
fn test_skip_targets_are_collected() {
    let definition = "[Q1] Smoke?\n(1) Yes\n(2) No -> Q3\n[Q2] How much?\n{number}\n[Q3] Done";
    let sequence = compile(definition, "skips", &ResourceLimits::default()).unwrap();
    let skips = &sequence.get("Q1").unwrap().directives.skip_targets;

    assert_eq!(skips.len(), 1);
    assert_eq!(skips[0].option_value, "2");
    assert_eq!(skips[0].directive.target, "Q3");
}

#[test]
fn test_fields_of_a_question() {
    let definition = "[Q1] Transport?
(1) Bus
(2) Car
(3) Other {other}
Distance {number:km min=0 max=500}
[Q2] Which apply?
(+1) Dog
(+2) Cat
(!9) None";
    let sequence = compile(definition, "fields", &ResourceLimits::default()).unwrap();

    let fields = sequence.get("Q1").unwrap().fields();
    let keys: Vec<&str> = fields.iter().map(|f| f.key.as_str()).collect();
    assert_eq!(keys, vec!["choice", "other_3", "km"]);
    assert_eq!(fields[0].shape, FieldShape::Choice { multiple: false });
    assert_eq!(fields[2].shape, FieldShape::Input(FieldKind::Number));
    assert_eq!(fields[2].max.as_deref(), Some("500"));

    let q2 = sequence.get("Q2").unwrap();
    let fields = q2.fields();
    assert_eq!(fields.len(), 1);
    assert_eq!(fields[0].shape, FieldShape::Choice { multiple: true });
    assert_eq!(q2.sole_values(), vec!["9"]);
}

#[test]
fn test_grid_compiles_to_table_and_rows() {
    let definition = "[Q1] Intro
|grid G1|!|Rate your visit|FOOD=Food;SERVICE=Service|1=Poor;2=Good;text:why=Why?|
[END] Done";
    let sequence = compile(definition, "grid", &ResourceLimits::default()).unwrap();

    assert_eq!(ids(&sequence), vec!["Q1", "G1", "END"]);
    let grid = sequence.get("G1").unwrap();
    assert!(matches!(grid.content, RecordContent::Grid(_)));
    assert_eq!(grid.directives.mandate, Mandate::Hard);
    assert!(grid.raw_body.is_none());

    let row = sequence.get("SERVICE").unwrap();
    let membership = row.grid_membership.as_ref().unwrap();
    assert_eq!(membership.grid_id, "G1");
    assert_eq!(membership.row_index, 1);
    assert_eq!(sequence.row_owner("FOOD"), Some("G1"));
    assert!(sequence.position("FOOD").is_none());

    let keys: Vec<String> = grid.fields().into_iter().map(|f| f.key).collect();
    assert_eq!(keys, vec!["FOOD", "FOOD_why", "SERVICE", "SERVICE_why"]);
    assert_eq!(
        grid.fields()[1].shape,
        FieldShape::Grid(GridColumnKind::Text)
    );
}

#[test]
fn test_loop_starting_with_a_grid() {
    let definition = "[N] How many meals?
<loop bound=N max=2>
|grid MEAL||Rate meal $i|TASTE=Taste|1=Bad;2=Good|
[NOTE] Anything else?
{text}
</loop>
[END] Done";
    let sequence = compile(definition, "meals", &ResourceLimits::default()).unwrap();

    let descriptor = &sequence.loops()[0];
    assert_eq!(descriptor.first_question_base_id, "MEAL");
    assert_eq!(descriptor.location_index, sequence.position("MEAL_1_1").unwrap());
    assert_eq!(descriptor.iteration_entry(2), "MEAL_2_2");
    assert_eq!(sequence.row_owner("TASTE_2_2"), Some("MEAL_2_2"));
}

#[test]
fn test_grid_inside_a_loop() {
    let definition = "[N] How many cars?
<loop bound=N max=2>
[CAR] Car $i
{text}
|grid USE|?|How is car $i used?|WORK=Work;LEISURE=Leisure|1=Never;2=Often|
</loop>
[END] Done";
    let sequence = compile(definition, "cars", &ResourceLimits::default()).unwrap();

    assert!(sequence.get("USE_1_1").is_some());
    assert!(sequence.get("USE_2_2").is_some());
    assert_eq!(sequence.row_owner("WORK_2_2"), Some("USE_2_2"));
}

#[test]
fn test_duplicate_ids_keep_the_first() {
    let sequence = compile("[Q1] first\n[Q1] second\n[END] x", "dupes", &ResourceLimits::default()).unwrap();
    assert_eq!(ids(&sequence), vec!["Q1", "END"]);
    assert_eq!(
        sequence.get("Q1").unwrap().raw_body.as_deref().map(str::trim),
        Some("first")
    );
}

#[test]
fn test_empty_definition() {
    let result = compile("// only a comment\n", "empty", &ResourceLimits::default());
    assert!(matches!(result, Err(SurveyError::EmptySurvey(name)) if name == "empty"));
}

#[test]
fn test_definition_size_limit() {
    let limits = ResourceLimits {
        max_definition_bytes: 10,
        ..ResourceLimits::default()
    };
    let result = compile("[Q1] far too long for the limit", "big", &limits);
    assert!(matches!(
        result,
        Err(SurveyError::ResourceLimitExceeded { ref limit_name, .. }) if limit_name == "max_definition_bytes"
    ));
}

#[test]
fn test_comments_are_ignored() {
    let sequence = compile("// intro\n[Q1] a\n// [Q2] commented out\n[END] b", "comments", &ResourceLimits::default()).unwrap();
    assert_eq!(ids(&sequence), vec!["Q1", "END"]);
}

#[test]
fn test_worker_compile_matches_inline() {
    let limits = ResourceLimits::default();
    let inline = compile(HOUSEHOLD, "household", &limits).unwrap();
    let worker = compile_on_worker(HOUSEHOLD, "household", &limits, Duration::from_secs(5)).unwrap();

    assert_eq!(ids(&inline), ids(&worker));
    assert_eq!(inline.loops(), worker.loops());
}

#[test]
fn test_worker_reports_compile_errors() {
    let result = compile_on_worker("", "blank", &ResourceLimits::default(), Duration::from_secs(5));
    assert!(matches!(result, Err(SurveyError::EmptySurvey(_))));
}

#[test]
fn test_context_values() {
    let context = fixed_context();
    assert_eq!(context.get("today"), Some("2024-03-15"));
    assert_eq!(context.get("year"), Some("2024"));
    assert_eq!(context.get("month"), Some("3"));
    assert_eq!(context.get("month_name"), Some("March"));
    assert_eq!(context.get("yearmonth"), Some("2024-03"));
    assert_eq!(context.get("weekday"), Some("Friday"));
    assert_eq!(context.get("time"), Some("09:30"));
    assert_eq!(context.get("user"), Some("tester"));

    let context = context.with("wave", "spring");
    assert_eq!(context.get("wave"), Some("spring"));
}
