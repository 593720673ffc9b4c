use crate::domain::sql::DEFAULT_MAX_CELL_CHARS;

/// Configuration for the SQL agent
#[derive(Debug, Clone)]
pub struct SqlAgentConfig {
    /// Model name, or deployment name for Azure
    pub model: String,

    /// Sampling temperature for every model call
    pub temperature: Option<f32>,

    /// Query attempts per turn before giving up with the fixed fallback
    /// answer. 0 removes the limit, which leaves `max_steps` as the only
    /// bound: a run that keeps failing then ends in `StepBudget` instead.
    pub max_query_attempts: u32,

    /// Maximum number of nodes a single run may execute
    pub max_steps: usize,

    /// Cell truncation for rendered query results
    pub max_cell_chars: usize,
}

impl Default for SqlAgentConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            temperature: Some(0.0),
            max_query_attempts: 5,
            max_steps: 100,
            max_cell_chars: DEFAULT_MAX_CELL_CHARS,
        }
    }
}

impl SqlAgentConfig {
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_query_attempts(mut self, attempts: u32) -> Self {
        self.max_query_attempts = attempts;
        self
    }

    pub fn with_max_steps(mut self, steps: usize) -> Self {
        self.max_steps = steps;
        self
    }

    pub fn with_max_cell_chars(mut self, chars: usize) -> Self {
        self.max_cell_chars = chars;
        self
    }

    /// Whether `attempts` failed queries use up the budget
    pub fn attempts_exhausted(&self, attempts: u32) -> bool {
        self.max_query_attempts > 0 && attempts >= self.max_query_attempts
    }
}
