//! Resource amounts, used both as request costs and as cell capacity.

use serde::{Deserialize, Serialize};

fn default_container_slots() -> i32 {
    1
}

/// A resource amount: memory, disk, and container slots.
///
/// Used in two roles. As a request cost, `containers` is the slot cost of
/// the request (default 1). As cell capacity, `containers` is the number of
/// container slots the cell offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub memory_mb: i32,
    pub disk_mb: i32,
    #[serde(default = "default_container_slots")]
    pub containers: i32,
}

impl Resource {
    pub fn new(memory_mb: i32, disk_mb: i32, containers: i32) -> Self {
        Self {
            memory_mb,
            disk_mb,
            containers,
        }
    }

    /// All dimensions are non-negative.
    pub fn is_non_negative(&self) -> bool {
        self.memory_mb >= 0 && self.disk_mb >= 0 && self.containers >= 0
    }

    /// All dimensions are zero - a no-op request, rejected at ingestion.
    pub fn is_zero(&self) -> bool {
        self.memory_mb == 0 && self.disk_mb == 0 && self.containers == 0
    }

    /// Whether `cost` fits within this amount on every dimension.
    pub fn can_fit(&self, cost: &Resource) -> bool {
        self.memory_mb >= cost.memory_mb
            && self.disk_mb >= cost.disk_mb
            && self.containers >= cost.containers
    }

    /// Subtract a cost from this amount.
    pub fn subtract(&mut self, cost: &Resource) {
        self.memory_mb -= cost.memory_mb;
        self.disk_mb -= cost.disk_mb;
        self.containers -= cost.containers;
    }

    /// Average used-capacity fraction, treating `self` as what remains of
    /// `total`. This is the balanced-fill input to cell scoring: emptier
    /// cells score lower.
    pub fn used_fraction(&self, total: &Resource) -> f64 {
        let memory = fraction_used(self.memory_mb, total.memory_mb);
        let disk = fraction_used(self.disk_mb, total.disk_mb);
        let containers = fraction_used(self.containers, total.containers);
        (memory + disk + containers) / 3.0
    }
}

fn fraction_used(remaining: i32, total: i32) -> f64 {
    if total <= 0 {
        return 1.0;
    }
    1.0 - f64::from(remaining) / f64::from(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subtract() {
        let mut available = Resource::new(100, 200, 50);
        available.subtract(&Resource::new(10, 20, 1));
        assert_eq!(available, Resource::new(90, 180, 49));
    }

    #[test]
    fn test_can_fit() {
        let available = Resource::new(100, 200, 50);
        assert!(available.can_fit(&Resource::new(100, 200, 50)));
        assert!(available.can_fit(&Resource::new(10, 10, 1)));
        assert!(!available.can_fit(&Resource::new(101, 10, 1)));
        assert!(!available.can_fit(&Resource::new(10, 201, 1)));
        assert!(!available.can_fit(&Resource::new(10, 10, 51)));
    }

    #[test]
    fn test_used_fraction_scales_with_load() {
        let total = Resource::new(100, 100, 100);
        let empty = Resource::new(100, 100, 100);
        let half = Resource::new(50, 50, 50);
        let full = Resource::new(0, 0, 0);

        assert!(empty.used_fraction(&total) < half.used_fraction(&total));
        assert!(half.used_fraction(&total) < full.used_fraction(&total));
        assert!((empty.used_fraction(&total) - 0.0).abs() < f64::EPSILON);
        assert!((full.used_fraction(&total) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_used_fraction_zero_total_is_saturated() {
        let total = Resource::new(0, 0, 0);
        let remaining = Resource::new(0, 0, 0);
        assert!((remaining.used_fraction(&total) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_container_slots_default_on_wire() {
        let cost: Resource = serde_json::from_str(r#"{"memory_mb":64,"disk_mb":128}"#).unwrap();
        assert_eq!(cost.containers, 1);
    }

    #[test]
    fn test_zero_and_negative() {
        assert!(Resource::new(0, 0, 0).is_zero());
        assert!(!Resource::new(1, 0, 0).is_zero());
        assert!(Resource::new(0, 0, 0).is_non_negative());
        assert!(!Resource::new(-1, 0, 0).is_non_negative());
    }
}
