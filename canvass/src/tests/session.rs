use crate::compiler::SurveyContext;
use crate::config::SessionConfig;
use crate::error::SurveyError;
use crate::evaluator::Value;
use crate::navigation::{GateOutcome, NavigationState};
use crate::session::{Deferred, SurveySession, Transition};
use crate::store::{MemoryPersistence, ResponseEntry, ResponseValue, StoreReceipt};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;

const TRAVEL: &str = "[Q1] How do you travel?
(1) Bus
(2) Car
[Q2,displayif=Q1 == 1] Which line?
{text}
[Q3] Pets?
(+1) Dog
(+2) Cat
(!9) None
[END] Thank you";

fn config() -> SessionConfig {
    SessionConfig::new()
        .with_survey_name("trip")
        .with_worker_timeout(None)
}

fn session_with(definition: &str, persistence: MemoryPersistence) -> SurveySession {
    SurveySession::compile(definition, "test", config(), persistence).unwrap()
}

fn started(definition: &str) -> (SurveySession, MemoryPersistence) {
    let persistence = MemoryPersistence::new();
    let mut session = session_with(definition, persistence.clone());
    session.start().unwrap();
    (session, persistence)
}

fn scalar(s: &str) -> ResponseValue {
    ResponseValue::scalar(s)
}

fn moved_to(transition: &Transition) -> Option<&str> {
    match transition {
        Transition::Moved { to, .. } => Some(to),
        _ => None,
    }
}

#[test]
fn test_survey_name_defaults_to_source_id() {
    let session = SurveySession::compile(
        TRAVEL,
        "travel",
        SessionConfig::new().with_worker_timeout(None),
        MemoryPersistence::new(),
    )
    .unwrap();
    assert_eq!(session.survey_name(), "travel");

    let named = session_with(TRAVEL, MemoryPersistence::new());
    assert_eq!(named.survey_name(), "trip");
}

#[test]
fn test_compiles_on_worker_by_default() {
    let session = SurveySession::compile(TRAVEL, "travel", SessionConfig::default(), MemoryPersistence::new()).unwrap();
    assert_eq!(session.sequence().len(), 4);
    assert_eq!(session.state(), &NavigationState::Idle);
}

#[test]
fn test_start_and_markup() {
    let (session, _) = started(TRAVEL);
    assert_eq!(session.current().unwrap().id, "Q1");
    let markup = session.markup("Q1").unwrap();
    assert!(markup.contains("name=\"Q1_choice\""));
    assert!(session.markup("NOPE").is_none());
}

#[test]
fn test_markup_uses_pinned_context() {
    let now = NaiveDate::from_ymd_opt(2025, 1, 2)
        .unwrap()
        .and_hms_opt(8, 0, 0)
        .unwrap();
    let session = session_with("[Q1] Today is {@today} for {@wave}", MemoryPersistence::new())
        .with_context(SurveyContext::at(now, None).with("wave", "winter"));
    assert!(session.markup("Q1").unwrap().contains("Today is 2025-01-02 for winter"));
}

#[test]
fn test_advance_stores_answers_and_history() {
    let (mut session, persistence) = started(TRAVEL);
    session.set_field("choice", scalar("1")).unwrap();

    let transition = session.advance().unwrap();
    assert_eq!(moved_to(&transition), Some("Q2"));

    let saved = persistence.saved();
    assert_eq!(saved.get("trip.Q1"), Some(&json!("1")));
    assert_eq!(saved.get("trip.__history"), Some(&json!(["Q1", "Q2"])));
    assert!(saved.contains_key("trip.__history_frames"));
    assert_eq!(
        session.store().committed_entry("Q1"),
        Some(&ResponseEntry::Single(scalar("1")))
    );
    assert!(!session.store().has_pending());
}

#[test]
fn test_other_option_keeps_both_fields() {
    let (mut session, persistence) = started("[Q1] How do you travel?\n(1) Bus\n(3) Other {other}\n[Q2] next");
    session.set_field("choice", scalar("3")).unwrap();
    session.set_field("other_3", scalar("Ferry")).unwrap();
    session.advance().unwrap();

    assert_eq!(
        persistence.saved().get("trip.Q1"),
        Some(&json!({"choice": "3", "other_3": "Ferry"}))
    );
    assert_eq!(session.find_response_value("other_3", "Q1"), Some(scalar("Ferry")));
}

#[test]
fn test_display_condition_skips_question() {
    let (mut session, _) = started(TRAVEL);
    session.set_field("choice", scalar("2")).unwrap();
    assert!(!session.is_visible("Q2"));
    assert_eq!(moved_to(&session.advance().unwrap()), Some("Q3"));
}

#[test]
fn test_single_row_grid_answer_drives_display() {
    let (mut session, _) = started(
        "|grid G|!|Rate|R1=Food|1=Poor;2=Good|\n[Q2,displayif=R1 == 2] Why good?\n{text}\n[END] Bye",
    );
    assert_eq!(session.current().unwrap().id, "G");
    session.set_field("R1", scalar("2")).unwrap();

    assert_eq!(session.find_response_value("R1", "R1"), Some(scalar("2")));
    assert_eq!(session.evaluate("R1 == 2").unwrap(), Value::Bool(true));
    assert!(session.is_visible("Q2"));
    assert_eq!(moved_to(&session.advance().unwrap()), Some("Q2"));
}

#[test]
fn test_unknown_field_is_rejected() {
    let (mut session, _) = started(TRAVEL);
    assert!(matches!(
        session.set_field("colour", scalar("red")),
        Err(SurveyError::State(_))
    ));
}

#[test]
fn test_set_field_before_start() {
    let mut session = session_with(TRAVEL, MemoryPersistence::new());
    assert!(matches!(
        session.set_field("choice", scalar("1")),
        Err(SurveyError::Navigation(_))
    ));
}

#[test]
fn test_hard_mandate_blocks() {
    let (mut session, persistence) = started("[Q1!] Name?\n{text}\n[Q2] next");
    assert_eq!(
        session.gate(),
        GateOutcome::Blocked {
            unanswered: 1,
            overridable: false
        }
    );
    assert_eq!(
        session.advance().unwrap(),
        Transition::Blocked {
            unanswered: 1,
            overridable: false
        }
    );
    assert!(matches!(session.advance_anyway().unwrap(), Transition::Blocked { .. }));
    assert_eq!(persistence.calls(), 0);

    session.set_field("text", scalar("Ada")).unwrap();
    assert_eq!(moved_to(&session.advance().unwrap()), Some("Q2"));
}

#[test]
fn test_soft_mandate_can_be_overridden() {
    let (mut session, _) = started("[Q1?] Age?\n{number}\n[Q2] next");
    assert_eq!(
        session.advance().unwrap(),
        Transition::Blocked {
            unanswered: 1,
            overridable: true
        }
    );
    assert_eq!(moved_to(&session.advance_anyway().unwrap()), Some("Q2"));
}

#[test]
fn test_failed_store_rolls_back() {
    let (mut session, persistence) = started(TRAVEL);
    session.set_field("choice", scalar("1")).unwrap();
    persistence.fail_with("network down");

    match session.advance().unwrap() {
        Transition::RolledBack {
            active,
            restored,
            notice,
        } => {
            assert_eq!(active, "Q1");
            assert_eq!(restored, Some(ResponseEntry::Single(scalar("1"))));
            assert_eq!(notice.message, "Your answers could not be saved. Please try again.");
            assert_eq!(notice.dismiss_after, Duration::from_millis(4000));
        }
        other => panic!("expected a rollback, got {:?}", other),
    }
    assert_eq!(session.current().unwrap().id, "Q1");
    assert!(session.store().committed().is_empty());
    assert!(session.store().has_pending());
    assert_eq!(session.history().ids().collect::<Vec<_>>(), vec!["Q1"]);

    persistence.recover();
    assert_eq!(moved_to(&session.advance().unwrap()), Some("Q2"));
    assert_eq!(persistence.saved().get("trip.Q1"), Some(&json!("1")));
}

#[test]
fn test_non_success_code_rolls_back() {
    let (mut session, persistence) = started(TRAVEL);
    session.set_field("choice", scalar("2")).unwrap();
    persistence.respond_with(500);

    assert!(matches!(
        session.advance().unwrap(),
        Transition::RolledBack { ref active, .. } if active == "Q1"
    ));
    assert!(persistence.saved().is_empty());
}

#[test]
fn test_notice_duration_is_configurable() {
    let persistence = MemoryPersistence::new();
    let mut session = SurveySession::compile(
        TRAVEL,
        "test",
        config().with_notice_duration(Duration::from_secs(1)),
        persistence.clone(),
    )
    .unwrap();
    session.start().unwrap();
    persistence.fail_with("offline");

    match session.advance().unwrap() {
        Transition::RolledBack { notice, .. } => {
            assert_eq!(notice.dismiss_after, Duration::from_secs(1))
        }
        other => panic!("expected a rollback, got {:?}", other),
    }
}

#[test]
fn test_retreat_restores_previous_answers() {
    let (mut session, _) = started(TRAVEL);
    session.set_field("choice", scalar("1")).unwrap();
    session.advance().unwrap();

    assert_eq!(
        session.retreat().unwrap(),
        Transition::Moved {
            to: "Q1".to_string(),
            restored: Some(ResponseEntry::Single(scalar("1")))
        }
    );
    assert_eq!(session.retreat().unwrap(), Transition::Unchanged);
}

#[test]
fn test_sole_option_clears_others() {
    let (mut session, _) = started(TRAVEL);
    session.set_field("choice", scalar("2")).unwrap();
    session.advance().unwrap();
    assert_eq!(session.current().unwrap().id, "Q3");

    session.set_field("choices", ResponseValue::list(["1", "2"])).unwrap();
    session
        .set_field("choices", ResponseValue::list(["1", "2", "9"]))
        .unwrap();
    assert_eq!(session.store().lookup("Q3"), Some(ResponseValue::list(["9"])));

    session.set_field("choices", ResponseValue::list(["9", "1"])).unwrap();
    assert_eq!(session.store().lookup("Q3"), Some(ResponseValue::list(["1"])));
}

#[test]
fn test_xor_fields_clear_each_other() {
    let (mut session, _) = started("[Q1] Hours {number:hours xor=h} or unsure {text:unsure xor=h}\n[Q2] next");
    session.set_field("hours", scalar("3")).unwrap();
    session.set_field("unsure", scalar("no idea")).unwrap();

    assert_eq!(session.find_response_value("hours", "Q1"), None);
    assert_eq!(session.find_response_value("unsure", "Q1"), Some(scalar("no idea")));
}

#[test]
fn test_clear_field_removes_answer() {
    let (mut session, _) = started("[Q1] Name {text}\n[Q2] next");
    session.set_field("text", scalar("Ada")).unwrap();
    session.clear_field("text").unwrap();
    assert!(session.store().entry("Q1").is_none());
}

#[test]
fn test_loop_bound_follows_answers() {
    let (mut session, _) = started("[COUNT] How many?
{number}
<loop bound=COUNT max=4>
[NAME] Person $i
{text}
</loop>
[END] Done");
    session.set_field("number", scalar("2")).unwrap();
    assert_eq!(moved_to(&session.advance().unwrap()), Some("NAME_1_1"));
    session.advance().unwrap();
    assert_eq!(session.current().unwrap().id, "NAME_2_2");
    assert!(matches!(session.advance().unwrap(), Transition::Terminal { ref at } if at == "END"));
}

#[test]
fn test_submit_from_end() {
    let (mut session, persistence) = started("[Q1] Name {text}\n[END] Thanks");
    assert!(matches!(session.submit(), Err(SurveyError::Navigation(_))));

    session.set_field("text", scalar("Ada")).unwrap();
    assert_eq!(
        session.advance().unwrap(),
        Transition::Terminal {
            at: "END".to_string()
        }
    );
    assert!(matches!(session.submit().unwrap(), Transition::Submitted { ref at, .. } if at == "END"));

    let saved = persistence.saved();
    assert_eq!(saved.get("trip.__completed"), Some(&json!(true)));
    assert!(saved.get("trip.__completed_at").is_some_and(|v| v.is_string()));
    assert_eq!(saved.get("trip.Q1"), Some(&json!("Ada")));
}

#[test]
fn test_resume_from_stored_state() {
    let persistence = MemoryPersistence::new();
    persistence.seed("trip.Q1", json!("1"));
    persistence.seed("trip.__history", json!(["Q1", "Q2"]));
    persistence.seed("other.Q9", json!("x"));

    let mut session = session_with(TRAVEL, persistence);
    assert_eq!(session.resume().unwrap(), "Q2");
    assert_eq!(session.store().lookup("Q1"), Some(scalar("1")));
    assert_eq!(session.store().lookup("Q9"), Some(scalar("x")));

    assert!(matches!(
        session.retreat().unwrap(),
        Transition::Moved { ref to, .. } if to == "Q1"
    ));
}

#[test]
fn test_resume_keeps_queued_skip_targets() {
    let definition = "[Q1] Pick\n(+1) A -> Q3\n(+2) B -> Q5\n[Q2] two\n{text}\n[Q3] three\n{text}\n[Q4] four\n{text}\n[Q5] five\n{text}\n[END] Bye";
    let (mut first, persistence) = started(definition);
    first
        .set_field("choices", ResponseValue::list(["1", "2"]))
        .unwrap();
    assert_eq!(moved_to(&first.advance().unwrap()), Some("Q3"));
    assert_eq!(
        persistence.saved().get("trip.__history"),
        Some(&json!(["Q1", "Q3"]))
    );

    let mut second = session_with(definition, persistence);
    assert_eq!(second.resume().unwrap(), "Q3");
    assert_eq!(moved_to(&second.advance().unwrap()), Some("Q5"));
}

#[test]
fn test_resume_without_state_starts() {
    let mut session = session_with(TRAVEL, MemoryPersistence::new());
    assert_eq!(session.resume().unwrap(), "Q1");
}

#[test]
fn test_deferred_commit_settles_later() {
    let (mut session, _) = started(TRAVEL);
    session.set_field("choice", scalar("1")).unwrap();

    let Deferred::Ready(commit) = session.advance_deferred().unwrap() else {
        panic!("expected a commit to store");
    };
    assert!(commit.changes.get("trip.Q1").is_some());
    assert_eq!(session.current().unwrap().id, "Q2");

    let transition = session.settle(commit, Ok(StoreReceipt::ok()));
    assert_eq!(moved_to(&transition), Some("Q2"));
    assert_eq!(session.current().unwrap().id, "Q2");
}

#[test]
fn test_deferred_failure_restores_snapshot() {
    let (mut session, _) = started(TRAVEL);
    session.set_field("choice", scalar("1")).unwrap();

    let Deferred::Ready(commit) = session.advance_deferred().unwrap() else {
        panic!("expected a commit to store");
    };
    let transition = session.settle(commit, Err(SurveyError::Persistence("timeout".to_string())));
    assert!(matches!(transition, Transition::RolledBack { ref active, .. } if active == "Q1"));
    assert_eq!(session.current().unwrap().id, "Q1");
    assert!(session.store().committed().is_empty());
}

#[test]
fn test_deferred_blocked_is_settled() {
    let (mut session, _) = started("[Q1!] a {text}\n[Q2] b");
    assert!(matches!(
        session.advance_deferred().unwrap(),
        Deferred::Settled(Transition::Blocked { .. })
    ));
    assert!(matches!(
        session.retreat_deferred().unwrap(),
        Deferred::Settled(Transition::Unchanged)
    ));
}

#[test]
fn test_computed_values() {
    let (mut session, _) = started("[Q1] You have {#A * B} of {#1 / 0} here");
    let mut prior = HashMap::new();
    prior.insert("A".to_string(), scalar("2"));
    prior.insert("B".to_string(), scalar("3"));
    session.set_prior_results(prior);

    let values = session.computed_values("Q1");
    assert_eq!(values.len(), 2);
    assert_eq!(values[0].element_id, "Q1_computed_1");
    assert_eq!(values[0].value, Some(Value::Number(Decimal::from(6))));
    assert_eq!(values[1].element_id, "Q1_computed_2");
    assert_eq!(values[1].value, None);
    assert!(session.computed_values("NOPE").is_empty());
}

#[test]
fn test_numeric_bounds() {
    let (mut session, _) = started("[Q1] Hours {number:hours min=0 max=LIMIT*2}\n[Q2] next");
    let mut prior = HashMap::new();
    prior.insert("LIMIT".to_string(), scalar("4"));
    session.set_prior_results(prior);

    let bounds = session.numeric_bounds("Q1", "hours");
    assert_eq!(bounds.min, Some(Decimal::ZERO));
    assert_eq!(bounds.max, Some(Decimal::from(8)));
    assert_eq!(session.numeric_bounds("Q1", "missing").max, None);
}

#[test]
fn test_field_visibility() {
    let (mut session, _) = started("[Q1] Pick
(1) Yes
(2) No
Why {text:why displayif=answered(Q1)}
Locked {text:locked disabled}
[Q2] next");
    assert!(!session.is_field_visible("Q1", "why"));
    assert!(!session.is_field_visible("Q1", "locked"));
    assert!(session.is_field_visible("Q1", "choice"));

    session.set_field("choice", scalar("2")).unwrap();
    assert!(session.is_field_visible("Q1", "why"));
}

#[test]
fn test_evaluate_against_answers() {
    let (mut session, _) = started(TRAVEL);
    session.set_field("choice", scalar("2")).unwrap();
    assert_eq!(session.evaluate("Q1 == 2").unwrap(), Value::Bool(true));
    assert_eq!(
        session.evaluate("equals(Q1, 2)").unwrap(),
        Value::Bool(true)
    );
}
