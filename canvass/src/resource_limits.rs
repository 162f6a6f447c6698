/// Resource limits to keep hostile or runaway definitions bounded
///
/// These limits protect against pathological inputs while being generous enough
/// for every real questionnaire.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct ResourceLimits {
    /// Maximum definition size in bytes
    /// Real usage: ~50KB, Limit: 5MB
    pub max_definition_bytes: usize,

    /// Maximum expression nesting depth
    /// Real usage: ~4 levels, Limit: 64
    pub max_expression_depth: usize,

    /// Maximum `max=` attribute of a loop block
    /// Every iteration is unrolled, so this bounds the compiled sequence
    pub max_loop_iterations: u32,

    /// Maximum candidates considered by a single Advance
    /// Hidden questions are skipped one by one; this stops authoring cycles
    pub max_navigation_steps: usize,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_definition_bytes: 5 * 1024 * 1024, // 5 MB
            max_expression_depth: 64,
            max_loop_iterations: 100,
            max_navigation_steps: 10_000,
        }
    }
}

impl ResourceLimits {
    pub fn new() -> Self {
        Self::default()
    }
}
