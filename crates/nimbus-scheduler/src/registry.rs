use crate::error::{Result, SchedulerError};
use crate::filter::{FilterPlugin, NodeUnschedulable};
use crate::score::{LeastPods, ScorePlugin};
use std::fmt;

/// Declarative plugin selection.
///
/// Capability is declared statically here: a name listed under `filters`
/// must resolve to an admission plugin, one under `scorers` to a ranking
/// plugin. The registry never infers capability from a plugin handle.
#[derive(Debug, Clone)]
pub struct PluginSet {
    /// Admission plugins, in evaluation order
    pub filters: Vec<String>,
    /// Ranking plugins, in evaluation order
    pub scorers: Vec<String>,
}

impl Default for PluginSet {
    fn default() -> Self {
        Self {
            filters: vec!["NodeUnschedulable".to_string()],
            scorers: vec!["LeastPods".to_string()],
        }
    }
}

/// Ordered, immutable-after-initialization plugin lists.
///
/// Construction fails fast on an unknown plugin name so the engine never
/// starts in a partially configured state.
pub struct PluginRegistry {
    filters: Vec<Box<dyn FilterPlugin>>,
    scorers: Vec<Box<dyn ScorePlugin>>,
}

impl PluginRegistry {
    /// Build a registry from a declarative plugin set
    pub fn from_set(set: &PluginSet) -> Result<Self> {
        let mut filters: Vec<Box<dyn FilterPlugin>> = Vec::with_capacity(set.filters.len());
        for name in &set.filters {
            filters.push(create_filter_plugin(name)?);
        }

        let mut scorers: Vec<Box<dyn ScorePlugin>> = Vec::with_capacity(set.scorers.len());
        for name in &set.scorers {
            scorers.push(create_score_plugin(name)?);
        }

        Ok(Self { filters, scorers })
    }

    /// Build a registry from already-constructed plugins (used by tests
    /// to inject instrumented plugins)
    pub fn with_plugins(
        filters: Vec<Box<dyn FilterPlugin>>,
        scorers: Vec<Box<dyn ScorePlugin>>,
    ) -> Self {
        Self { filters, scorers }
    }

    /// Admission plugins in registered order
    pub fn filters(&self) -> &[Box<dyn FilterPlugin>] {
        &self.filters
    }

    /// Ranking plugins in registered order
    pub fn scorers(&self) -> &[Box<dyn ScorePlugin>] {
        &self.scorers
    }
}

impl fmt::Debug for PluginRegistry {
    // The boxed plugins carry no state worth printing; their names do
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistry")
            .field(
                "filters",
                &self.filters.iter().map(|p| p.name()).collect::<Vec<_>>(),
            )
            .field(
                "scorers",
                &self.scorers.iter().map(|p| p.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

fn create_filter_plugin(name: &str) -> Result<Box<dyn FilterPlugin>> {
    match name {
        "NodeUnschedulable" => Ok(Box::new(NodeUnschedulable)),
        other => Err(SchedulerError::plugin_init(
            other,
            "unknown filter plugin name",
        )),
    }
}

fn create_score_plugin(name: &str) -> Result<Box<dyn ScorePlugin>> {
    match name {
        "LeastPods" => Ok(Box::new(LeastPods)),
        other => Err(SchedulerError::plugin_init(
            other,
            "unknown score plugin name",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_set_constructs() {
        let registry = PluginRegistry::from_set(&PluginSet::default()).unwrap();
        assert_eq!(registry.filters().len(), 1);
        assert_eq!(registry.scorers().len(), 1);
        assert_eq!(registry.filters()[0].name(), "NodeUnschedulable");
        assert_eq!(registry.scorers()[0].name(), "LeastPods");
    }

    #[test]
    fn test_unknown_filter_fails_fast() {
        let set = PluginSet {
            filters: vec!["NoSuchPlugin".to_string()],
            scorers: vec![],
        };
        let err = PluginRegistry::from_set(&set).unwrap_err();
        assert!(matches!(err, SchedulerError::PluginInit { .. }));
    }

    #[test]
    fn test_unknown_scorer_fails_fast() {
        let set = PluginSet {
            filters: vec![],
            scorers: vec!["NoSuchPlugin".to_string()],
        };
        let err = PluginRegistry::from_set(&set).unwrap_err();
        assert!(matches!(err, SchedulerError::PluginInit { .. }));
    }

    #[test]
    fn test_debug_lists_plugin_names() {
        let registry = PluginRegistry::from_set(&PluginSet::default()).unwrap();
        let rendered = format!("{:?}", registry);
        assert!(rendered.contains("NodeUnschedulable"));
        assert!(rendered.contains("LeastPods"));
    }

    #[test]
    fn test_capability_is_not_interchangeable() {
        // A scorer name declared as a filter must fail, not be coerced
        let set = PluginSet {
            filters: vec!["LeastPods".to_string()],
            scorers: vec![],
        };
        assert!(PluginRegistry::from_set(&set).is_err());
    }
}
