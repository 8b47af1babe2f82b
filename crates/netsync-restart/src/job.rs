//! Restart jobs and their deduplication key.

use netsync_core::{dedup_units, DeployableUnit};

/// A deduplicated set of units recreated together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestartJob {
    units: Vec<DeployableUnit>,
    key: String,
}

impl RestartJob {
    /// Build a job, collapsing units that share a container name.
    ///
    /// Returns `None` when there is nothing to restart.
    pub fn new(units: Vec<DeployableUnit>) -> Option<Self> {
        let units = dedup_units(units);
        if units.is_empty() {
            return None;
        }
        let key = job_key(&units);
        Some(Self { units, key })
    }

    /// Sorted, comma-joined container names.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn units(&self) -> &[DeployableUnit] {
        &self.units
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

/// Order-independent identity of a set of units.
pub fn job_key(units: &[DeployableUnit]) -> String {
    let mut names: Vec<&str> = units.iter().map(|u| u.container.as_str()).collect();
    names.sort_unstable();
    names.dedup();
    names.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(name: &str) -> DeployableUnit {
        DeployableUnit::new(name, format!("{name}-1"))
    }

    #[test]
    fn empty_job_is_none() {
        assert!(RestartJob::new(vec![]).is_none());
    }

    #[test]
    fn key_ignores_order_and_duplicates() {
        let a = RestartJob::new(vec![unit("stats"), unit("backend"), unit("frontend")]).unwrap();
        let b = RestartJob::new(vec![
            unit("frontend"),
            unit("stats"),
            unit("backend"),
            unit("frontend"),
        ])
        .unwrap();
        assert_eq!(a.key(), "backend-1,frontend-1,stats-1");
        assert_eq!(a.key(), b.key());
        assert_eq!(b.len(), 3);
    }

    #[test]
    fn different_sets_have_different_keys() {
        let a = RestartJob::new(vec![unit("frontend")]).unwrap();
        let b = RestartJob::new(vec![unit("frontend"), unit("backend")]).unwrap();
        assert_ne!(a.key(), b.key());
    }
}
