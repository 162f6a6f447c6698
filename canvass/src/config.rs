use crate::resource_limits::ResourceLimits;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Default lifetime of a recoverable-error notice
pub const DEFAULT_NOTICE_MS: u64 = 4_000;

/// Default time a compile worker gets before compiling inline
pub const DEFAULT_WORKER_TIMEOUT_MS: u64 = 2_000;

/// Per-session settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Prefix of every persisted key; empty means the definition's source id
    pub survey_name: String,
    pub limits: ResourceLimits,
    pub notice_ms: u64,
    /// `None` compiles on the calling thread
    pub worker_timeout_ms: Option<u64>,
    pub user: Option<String>,
    /// Extra or overriding `{@name}` values
    pub context: BTreeMap<String, String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            survey_name: String::new(),
            limits: ResourceLimits::default(),
            notice_ms: DEFAULT_NOTICE_MS,
            worker_timeout_ms: Some(DEFAULT_WORKER_TIMEOUT_MS),
            user: None,
            context: BTreeMap::new(),
        }
    }
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_survey_name(mut self, name: impl Into<String>) -> Self {
        self.survey_name = name.into();
        self
    }

    pub fn with_limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_notice_duration(mut self, duration: Duration) -> Self {
        self.notice_ms = duration.as_millis() as u64;
        self
    }

    pub fn with_worker_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.worker_timeout_ms = timeout.map(|t| t.as_millis() as u64);
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_context_value(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(name.into(), value.into());
        self
    }

    pub fn notice_duration(&self) -> Duration {
        Duration::from_millis(self.notice_ms)
    }

    pub fn worker_timeout(&self) -> Option<Duration> {
        self.worker_timeout_ms.map(Duration::from_millis)
    }
}
