use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use depot_model::StoreKey;

/// A request to promote content from one store to another.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PromotionRequest {
    pub source: StoreKey,
    pub target: StoreKey,
    /// Explicit path set; `None` promotes everything under the source.
    pub paths: Option<BTreeSet<String>>,
    /// Named validation rule-set; `None` uses the configured default.
    pub rule_set: Option<String>,
    /// Delete promoted paths from the source after a fully clean run.
    pub purge_source: bool,
    /// Validate and report only; copy nothing.
    pub dry_run: bool,
}

impl PromotionRequest {
    pub fn new(source: StoreKey, target: StoreKey) -> Self {
        Self {
            source,
            target,
            paths: None,
            rule_set: None,
            purge_source: false,
            dry_run: false,
        }
    }

    pub fn with_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.paths = Some(
            paths
                .into_iter()
                .map(|p| depot_model::path::normalize(&p.into()))
                .collect(),
        );
        self
    }

    pub fn with_rule_set(mut self, name: impl Into<String>) -> Self {
        self.rule_set = Some(name.into());
        self
    }

    pub fn purging_source(mut self) -> Self {
        self.purge_source = true;
        self
    }

    pub fn dry(mut self) -> Self {
        self.dry_run = true;
        self
    }
}

/// Outcome of the validation phase.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// path -> first failure message. Failed paths never enter the copy
    /// phase.
    pub errors: BTreeMap<String, String>,
    /// Set when a blocking rule failed: the whole run was aborted before
    /// any copy. Carries the rule name.
    pub aborted_by: Option<String>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.aborted_by.is_none()
    }
}

/// Per-path accounting for one promotion run.
///
/// `completed`, `skipped`, and `errors` are pairwise disjoint and their
/// union is exactly the path set that survived validation and entered the
/// copy phase.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PromotionResult {
    /// Paths copied to the target in this run.
    pub completed: BTreeSet<String>,
    /// Paths already present at the target with identical content.
    pub skipped: BTreeSet<String>,
    /// path -> reason, for copy and rollback failures.
    pub errors: BTreeMap<String, String>,
    /// Paths that passed validation but were not copied (dry run, or a
    /// run cut short by its deadline).
    pub pending: BTreeSet<String>,
    /// Validation-phase outcome.
    pub validation: ValidationReport,
    /// path -> reason for purge-source failures. Purge failures never
    /// undo the promotion itself.
    pub purge_failures: BTreeMap<String, String>,
    /// The run's deadline expired before every path was attempted. The
    /// unattempted remainder is in `pending`, not `errors`: nothing was
    /// confirmed to fail.
    pub timed_out: bool,
}

impl PromotionResult {
    /// A promotion succeeded when nothing failed validation or copy and
    /// the run was not cut short.
    pub fn succeeded(&self) -> bool {
        self.errors.is_empty() && self.validation.is_clean() && !self.timed_out
    }

    /// Every path that entered the copy phase.
    pub fn accounted_paths(&self) -> BTreeSet<String> {
        let mut all = self.completed.clone();
        all.extend(self.skipped.iter().cloned());
        all.extend(self.errors.keys().cloned());
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_builder_normalizes_paths() {
        let request = PromotionRequest::new(
            StoreKey::hosted("maven", "src"),
            StoreKey::hosted("maven", "dst"),
        )
        .with_paths(["a/b.jar", "/c//d.jar"]);
        let paths = request.paths.unwrap();
        assert!(paths.contains("/a/b.jar"));
        assert!(paths.contains("/c/d.jar"));
    }

    #[test]
    fn success_requires_clean_validation_and_copy() {
        let mut result = PromotionResult::default();
        assert!(result.succeeded());

        result.validation.errors.insert("/x".into(), "nope".into());
        assert!(!result.succeeded());

        let mut result = PromotionResult::default();
        result.errors.insert("/y".into(), "io".into());
        assert!(!result.succeeded());

        let mut result = PromotionResult::default();
        result.timed_out = true;
        assert!(!result.succeeded());
    }
}
