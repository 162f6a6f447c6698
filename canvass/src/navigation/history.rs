use crate::ast::LoopMarker;
use crate::SurveyResult;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// A visited id and the queue as it stood when the id was reached
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    pub id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub queued: Vec<String>,
}

/// Visited ids plus ids queued to be shown next
///
/// Stepping back restores the queue of the frame it lands on, so targets
/// queued from a later answer do not survive a change of that answer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationHistory {
    visited: Vec<Frame>,
    upcoming: VecDeque<String>,
}

impl NavigationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset to a single visited id
    pub fn start(&mut self, id: impl Into<String>) {
        self.visited.clear();
        self.upcoming.clear();
        self.visit(id);
    }

    pub fn is_empty(&self) -> bool {
        self.visited.is_empty()
    }

    pub fn current(&self) -> Option<&str> {
        self.visited.last().map(|frame| frame.id.as_str())
    }

    /// Queue ids ahead of anything already queued, keeping their order
    pub fn enqueue<I, S>(&mut self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids: Vec<String> = ids.into_iter().map(Into::into).collect();
        for id in ids.into_iter().rev() {
            self.upcoming.push_front(id);
        }
    }

    pub fn pop_upcoming(&mut self) -> Option<String> {
        self.upcoming.pop_front()
    }

    pub fn upcoming(&self) -> impl Iterator<Item = &str> {
        self.upcoming.iter().map(String::as_str)
    }

    pub fn visit(&mut self, id: impl Into<String>) {
        self.visited.push(Frame {
            id: id.into(),
            queued: self.upcoming.iter().cloned().collect(),
        });
    }

    /// Step back to the previous visited id, passing over continuation markers.
    ///
    /// Nothing changes when there is no earlier id to land on.
    pub fn back(&mut self) -> Option<String> {
        let landing = self.visited[..self.visited.len().saturating_sub(1)]
            .iter()
            .rposition(|frame| !LoopMarker::is_continuation(&frame.id))?;
        self.visited.truncate(landing + 1);
        let frame = &self.visited[landing];
        self.upcoming = frame.queued.iter().cloned().collect();
        Some(frame.id.clone())
    }

    /// Visited ids in order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.visited.iter().map(|frame| frame.id.as_str())
    }

    /// Visited ids as a plain ordered list, the portable form hosts persist
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::from(self.ids().collect::<Vec<_>>())
    }

    /// Frames with their queues, stored next to the plain list so a resume
    /// keeps targets queued by earlier answers
    pub fn frames_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// Accepts the plain id list or the framed form
    pub fn from_json(value: &serde_json::Value) -> SurveyResult<Self> {
        if let Some(items) = value.as_array() {
            let mut history = Self::new();
            for id in items.iter().filter_map(serde_json::Value::as_str) {
                history.visit(id);
            }
            return Ok(history);
        }
        Ok(serde_json::from_value(value.clone())?)
    }

    /// Rebuild from the stored id list, taking queues from `frames` only when
    /// they describe the same visited ids
    pub fn restore(ids: &serde_json::Value, frames: Option<&serde_json::Value>) -> SurveyResult<Self> {
        let history = Self::from_json(ids)?;
        let framed = frames.and_then(|frames| serde_json::from_value::<Self>(frames.clone()).ok());
        match framed {
            Some(framed) if framed.ids().eq(history.ids()) => Ok(framed),
            _ => Ok(history),
        }
    }
}
