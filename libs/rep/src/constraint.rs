//! Placement constraints attached to start requests.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Hard and soft placement requirements for one request.
///
/// `stack` and `volume_drivers` and `required_tags` are hard filters: a
/// cell that fails any of them is not a candidate. `optional_tags` are a
/// soft preference - cells carrying them score better, cells lacking them
/// are still eligible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementConstraint {
    /// Root-filesystem stack the workload needs (e.g. "linux").
    pub stack: String,

    /// Volume drivers the cell must provide.
    #[serde(default)]
    pub volume_drivers: BTreeSet<String>,

    /// Placement tags the cell must carry.
    #[serde(default)]
    pub required_tags: BTreeSet<String>,

    /// Placement tags the cell should carry.
    #[serde(default)]
    pub optional_tags: BTreeSet<String>,
}

impl PlacementConstraint {
    pub fn new(stack: impl Into<String>) -> Self {
        Self {
            stack: stack.into(),
            volume_drivers: BTreeSet::new(),
            required_tags: BTreeSet::new(),
            optional_tags: BTreeSet::new(),
        }
    }

    pub fn with_volume_drivers<I, S>(mut self, drivers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.volume_drivers = drivers.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_required_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_optional_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.optional_tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// A constraint must at least name a stack.
    pub fn is_valid(&self) -> bool {
        !self.stack.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validity_requires_stack() {
        assert!(PlacementConstraint::new("linux").is_valid());
        assert!(!PlacementConstraint::new("").is_valid());
    }

    #[test]
    fn test_builder_collects_sets() {
        let pc = PlacementConstraint::new("linux")
            .with_volume_drivers(["nfs", "nfs"])
            .with_required_tags(["gpu"])
            .with_optional_tags(["ssd"]);

        assert_eq!(pc.volume_drivers.len(), 1);
        assert!(pc.required_tags.contains("gpu"));
        assert!(pc.optional_tags.contains("ssd"));
    }

    #[test]
    fn test_wire_defaults() {
        let pc: PlacementConstraint = serde_json::from_str(r#"{"stack":"linux"}"#).unwrap();
        assert!(pc.volume_drivers.is_empty());
        assert!(pc.required_tags.is_empty());
        assert!(pc.optional_tags.is_empty());
    }
}
