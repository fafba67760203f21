/// Result of running one admission plugin against one node
#[derive(Debug, Clone)]
pub struct FilterResult {
    /// Node name
    pub node_name: String,
    /// Whether the node passed the filter
    pub passed: bool,
    /// Reason for rejection (if any)
    pub reason: Option<String>,
}

impl FilterResult {
    /// Create a passing filter result
    pub fn pass(node_name: impl Into<String>) -> Self {
        Self {
            node_name: node_name.into(),
            passed: true,
            reason: None,
        }
    }

    /// Create a failing filter result
    pub fn fail(node_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            node_name: node_name.into(),
            passed: false,
            reason: Some(reason.into()),
        }
    }
}

/// Result of running one ranking plugin against one feasible node
#[derive(Debug, Clone)]
pub struct ScoreResult {
    /// Node name
    pub node_name: String,
    /// Score (0-100, higher is better)
    pub score: i64,
}

impl ScoreResult {
    /// Create a new score result
    pub fn new(node_name: impl Into<String>, score: i64) -> Self {
        Self {
            node_name: node_name.into(),
            score,
        }
    }
}
