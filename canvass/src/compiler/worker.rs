//! Compilation on a worker thread
//!
//! The worker gets a bounded time to finish. If it cannot be spawned, times
//! out, or dies, the definition is compiled inline instead; the result is the
//! same either way.

use super::{compile, QuestionSequence};
use crate::resource_limits::ResourceLimits;
use crate::SurveyResult;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;
use tracing::warn;

pub fn compile_on_worker(
    definition: &str,
    source_id: &str,
    limits: &ResourceLimits,
    timeout: Duration,
) -> SurveyResult<QuestionSequence> {
    let (sender, receiver) = mpsc::channel();
    let spawned = {
        let definition = definition.to_string();
        let source_id = source_id.to_string();
        let limits = limits.clone();
        thread::Builder::new()
            .name("canvass-compile".to_string())
            .spawn(move || {
                let _ = sender.send(compile(&definition, &source_id, &limits));
            })
    };

    if let Err(err) = spawned {
        warn!(error = %err, "could not start compile worker, compiling inline");
        return compile(definition, source_id, limits);
    }

    match receiver.recv_timeout(timeout) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => {
            warn!(
                timeout_ms = timeout.as_millis() as u64,
                "compile worker timed out, compiling inline"
            );
            compile(definition, source_id, limits)
        }
        Err(RecvTimeoutError::Disconnected) => {
            warn!("compile worker stopped without a result, compiling inline");
            compile(definition, source_id, limits)
        }
    }
}
