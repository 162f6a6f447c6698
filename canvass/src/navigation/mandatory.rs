//! Mandatory-answer gate
//!
//! A mandated question may not be left while none of its qualifying fields is
//! answered. Hidden and disabled fields do not qualify. Blank fields of an
//! `xor=` group are left out of the reported count.
//!
//! Only answers given in this session count; prior-session results and
//! legacy keys never satisfy a mandate.

use crate::compiler::QuestionRecord;
use crate::evaluator::Evaluator;
use crate::store::ResponseStore;
use crate::syntax::Mandate;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum GateOutcome {
    Open,
    Blocked { unanswered: usize, overridable: bool },
}

pub fn check(record: &QuestionRecord, evaluator: &Evaluator, store: &ResponseStore) -> GateOutcome {
    let overridable = match record.directives.mandate {
        Mandate::Optional => return GateOutcome::Open,
        Mandate::Soft => true,
        Mandate::Hard => false,
    };

    let mut qualifying = 0;
    let mut answered = 0;
    let mut blank = 0;
    for field in record.fields() {
        if field.disabled {
            continue;
        }
        if let Some(condition) = &field.display_if {
            if !evaluator.condition(condition, store) {
                continue;
            }
        }
        qualifying += 1;
        let filled = store
            .live_value(&field.key, &record.id)
            .is_some_and(|value| !value.is_empty());
        if filled {
            answered += 1;
        } else if field.xor_group.is_none() {
            blank += 1;
        }
    }

    if answered > 0 || qualifying == 0 {
        GateOutcome::Open
    } else {
        GateOutcome::Blocked {
            unanswered: blank,
            overridable,
        }
    }
}
