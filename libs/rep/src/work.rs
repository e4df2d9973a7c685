//! Workload units and start requests.

use serde::{Deserialize, Serialize};

use crate::constraint::PlacementConstraint;
use crate::error::ValidationError;
use crate::resources::Resource;

/// One instance of a long-running process, identified by (guid, index).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lrp {
    pub process_guid: String,
    pub index: i32,
    pub domain: String,
    pub resource: Resource,
    pub constraint: PlacementConstraint,
}

impl Lrp {
    pub fn identifier(&self) -> String {
        format!("{}.{}", self.process_guid, self.index)
    }
}

/// A one-shot workload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub task_guid: String,
    pub domain: String,
    pub resource: Resource,
    pub constraint: PlacementConstraint,
}

impl Task {
    pub fn identifier(&self) -> &str {
        &self.task_guid
    }
}

/// The batch of reservations handed to one cell at commit time.
///
/// The cell answers `perform` with another `Work` holding the subset it
/// rejected; an empty answer means everything was accepted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Work {
    #[serde(default)]
    pub lrps: Vec<Lrp>,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl Work {
    pub fn is_empty(&self) -> bool {
        self.lrps.is_empty() && self.tasks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lrps.len() + self.tasks.len()
    }
}

/// A client request to start one or more instances of a process.
///
/// Indices distinguish the instances; each index becomes its own [`Lrp`]
/// auction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LrpStartRequest {
    pub process_guid: String,
    pub domain: String,
    pub indices: Vec<i32>,
    pub resource: Resource,
    pub constraint: PlacementConstraint,
}

impl LrpStartRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.process_guid.is_empty() {
            return Err(ValidationError::MissingProcessGuid);
        }
        if self.domain.is_empty() {
            return Err(ValidationError::MissingDomain);
        }
        if self.indices.is_empty() {
            return Err(ValidationError::NoIndices);
        }
        let mut seen = std::collections::BTreeSet::new();
        for &index in &self.indices {
            if index < 0 {
                return Err(ValidationError::NegativeIndex(index));
            }
            if !seen.insert(index) {
                return Err(ValidationError::DuplicateIndex(index));
            }
        }
        validate_resource(&self.resource)?;
        if !self.constraint.is_valid() {
            return Err(ValidationError::MissingStack);
        }
        Ok(())
    }

    /// Expand into one [`Lrp`] per requested index.
    pub fn lrps(&self) -> Vec<Lrp> {
        self.indices
            .iter()
            .map(|&index| Lrp {
                process_guid: self.process_guid.clone(),
                index,
                domain: self.domain.clone(),
                resource: self.resource,
                constraint: self.constraint.clone(),
            })
            .collect()
    }
}

/// A client request to run one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStartRequest {
    pub task_guid: String,
    pub domain: String,
    pub resource: Resource,
    pub constraint: PlacementConstraint,
}

impl TaskStartRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.task_guid.is_empty() {
            return Err(ValidationError::MissingTaskGuid);
        }
        if self.domain.is_empty() {
            return Err(ValidationError::MissingDomain);
        }
        validate_resource(&self.resource)?;
        if !self.constraint.is_valid() {
            return Err(ValidationError::MissingStack);
        }
        Ok(())
    }

    pub fn task(&self) -> Task {
        Task {
            task_guid: self.task_guid.clone(),
            domain: self.domain.clone(),
            resource: self.resource,
            constraint: self.constraint.clone(),
        }
    }
}

fn validate_resource(resource: &Resource) -> Result<(), ValidationError> {
    if !resource.is_non_negative() {
        return Err(ValidationError::NegativeResource);
    }
    if resource.is_zero() {
        return Err(ValidationError::ZeroResource);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lrp_request() -> LrpStartRequest {
        LrpStartRequest {
            process_guid: "pg-1".to_string(),
            domain: "domain".to_string(),
            indices: vec![0, 1, 2],
            resource: Resource::new(10, 10, 1),
            constraint: PlacementConstraint::new("linux"),
        }
    }

    #[test]
    fn test_lrp_request_expands_per_index() {
        let lrps = lrp_request().lrps();
        assert_eq!(lrps.len(), 3);
        assert_eq!(lrps[0].identifier(), "pg-1.0");
        assert_eq!(lrps[2].identifier(), "pg-1.2");
    }

    #[test]
    fn test_lrp_request_validation() {
        assert!(lrp_request().validate().is_ok());

        let mut request = lrp_request();
        request.process_guid.clear();
        assert_eq!(request.validate(), Err(ValidationError::MissingProcessGuid));

        let mut request = lrp_request();
        request.indices = vec![0, 1, 1];
        assert_eq!(request.validate(), Err(ValidationError::DuplicateIndex(1)));

        let mut request = lrp_request();
        request.indices = vec![-2];
        assert_eq!(request.validate(), Err(ValidationError::NegativeIndex(-2)));

        let mut request = lrp_request();
        request.resource = Resource::new(0, 0, 0);
        assert_eq!(request.validate(), Err(ValidationError::ZeroResource));

        let mut request = lrp_request();
        request.resource = Resource::new(-10, 10, 1);
        assert_eq!(request.validate(), Err(ValidationError::NegativeResource));

        let mut request = lrp_request();
        request.constraint.stack.clear();
        assert_eq!(request.validate(), Err(ValidationError::MissingStack));
    }

    #[test]
    fn test_task_request_validation() {
        let request = TaskStartRequest {
            task_guid: "tg-1".to_string(),
            domain: "domain".to_string(),
            resource: Resource::new(10, 10, 1),
            constraint: PlacementConstraint::new("linux"),
        };
        assert!(request.validate().is_ok());
        assert_eq!(request.task().identifier(), "tg-1");

        let mut missing_guid = request.clone();
        missing_guid.task_guid.clear();
        assert_eq!(
            missing_guid.validate(),
            Err(ValidationError::MissingTaskGuid)
        );

        let mut missing_domain = request;
        missing_domain.domain.clear();
        assert_eq!(
            missing_domain.validate(),
            Err(ValidationError::MissingDomain)
        );
    }
}
