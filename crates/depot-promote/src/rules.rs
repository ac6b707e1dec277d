//! The promotion validation pipeline.
//!
//! A [`RuleSet`] is an ordered list of [`ValidationRule`]s. Rules judge
//! individual paths: the first rule to fail a path removes it from the
//! candidate set. A rule registered as *blocking* escalates any failure
//! into aborting the whole promotion before any copy happens.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use depot_content::Transfer;

use crate::error::{PromoteError, PromoteResult};
use crate::model::PromotionRequest;

/// What a rule gets to look at: the request and the transfer boundary.
pub struct RuleContext<'a> {
    pub request: &'a PromotionRequest,
    pub transfer: &'a dyn Transfer,
}

/// One pluggable promotion check.
///
/// Rules are pure over their inputs and independently testable. A rule
/// returns `Some(reason)` to fail a path, `None` to pass it.
#[async_trait]
pub trait ValidationRule: Send + Sync {
    fn name(&self) -> &str;

    async fn validate(&self, path: &str, ctx: &RuleContext<'_>) -> Option<String>;
}

struct RuleEntry {
    rule: Arc<dyn ValidationRule>,
    blocking: bool,
}

/// An ordered, named list of rules.
#[derive(Default)]
pub struct RuleSet {
    rules: Vec<RuleEntry>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a per-path rule.
    pub fn with_rule(mut self, rule: Arc<dyn ValidationRule>) -> Self {
        self.rules.push(RuleEntry {
            rule,
            blocking: false,
        });
        self
    }

    /// Append a blocking rule: any failure aborts the whole promotion.
    pub fn with_blocking_rule(mut self, rule: Arc<dyn ValidationRule>) -> Self {
        self.rules.push(RuleEntry {
            rule,
            blocking: true,
        });
        self
    }

    /// Judge one path. Returns the first failure, with the failing rule's
    /// name and whether it was blocking.
    pub(crate) async fn judge(
        &self,
        path: &str,
        ctx: &RuleContext<'_>,
    ) -> Option<(String, String, bool)> {
        for entry in &self.rules {
            if let Some(reason) = entry.rule.validate(path, ctx).await {
                return Some((entry.rule.name().to_string(), reason, entry.blocking));
            }
        }
        None
    }
}

/// Registry of named rule-sets.
#[derive(Default)]
pub struct PromotionValidator {
    rule_sets: HashMap<String, RuleSet>,
}

impl PromotionValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, rule_set: RuleSet) {
        self.rule_sets.insert(name.into(), rule_set);
    }

    pub fn get(&self, name: &str) -> PromoteResult<&RuleSet> {
        self.rule_sets
            .get(name)
            .ok_or_else(|| PromoteError::UnknownRuleSet(name.to_string()))
    }
}

/// Rejects snapshot-versioned paths, so only release artifacts promote.
#[derive(Clone, Copy, Debug, Default)]
pub struct ReleaseOnlyRule;

#[async_trait]
impl ValidationRule for ReleaseOnlyRule {
    fn name(&self) -> &str {
        "release-only"
    }

    async fn validate(&self, path: &str, _ctx: &RuleContext<'_>) -> Option<String> {
        if path.contains("-SNAPSHOT") {
            Some(format!("{path} is snapshot-versioned"))
        } else {
            None
        }
    }
}

/// Rejects paths matching any configured deny fragment.
#[derive(Clone, Debug)]
pub struct PathPatternRule {
    deny: Vec<String>,
}

impl PathPatternRule {
    pub fn new<I, S>(deny: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            deny: deny.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl ValidationRule for PathPatternRule {
    fn name(&self) -> &str {
        "path-filter"
    }

    async fn validate(&self, path: &str, _ctx: &RuleContext<'_>) -> Option<String> {
        self.deny
            .iter()
            .find(|fragment| path.contains(fragment.as_str()))
            .map(|fragment| format!("{path} matches denied fragment {fragment:?}"))
    }
}

/// Requires the path to actually exist in the source store.
///
/// An inconclusive transfer answer fails the path: a promotion cannot
/// proceed on content it cannot confirm.
#[derive(Clone, Copy, Debug, Default)]
pub struct SourcePresentRule;

#[async_trait]
impl ValidationRule for SourcePresentRule {
    fn name(&self) -> &str {
        "source-present"
    }

    async fn validate(&self, path: &str, ctx: &RuleContext<'_>) -> Option<String> {
        match ctx.transfer.exists(&ctx.request.source, path).await {
            Ok(true) => None,
            Ok(false) => Some(format!("{path} is not present in the source store")),
            Err(e) => Some(format!("cannot confirm {path} in the source store: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use depot_content::MemoryTransfer;
    use depot_model::StoreKey;

    fn request() -> PromotionRequest {
        PromotionRequest::new(
            StoreKey::hosted("maven", "src"),
            StoreKey::hosted("maven", "dst"),
        )
    }

    #[tokio::test]
    async fn release_only_rejects_snapshots() {
        let transfer = MemoryTransfer::new();
        let request = request();
        let ctx = RuleContext {
            request: &request,
            transfer: &transfer,
        };

        assert!(ReleaseOnlyRule
            .validate("/org/foo/1.0/foo-1.0.jar", &ctx)
            .await
            .is_none());
        assert!(ReleaseOnlyRule
            .validate("/org/foo/1.0-SNAPSHOT/foo-1.0-SNAPSHOT.jar", &ctx)
            .await
            .is_some());
    }

    #[tokio::test]
    async fn path_filter_uses_deny_fragments() {
        let transfer = MemoryTransfer::new();
        let request = request();
        let ctx = RuleContext {
            request: &request,
            transfer: &transfer,
        };
        let rule = PathPatternRule::new(["/internal/"]);

        assert!(rule.validate("/org/foo/foo.jar", &ctx).await.is_none());
        assert!(rule.validate("/internal/secret.jar", &ctx).await.is_some());
    }

    #[tokio::test]
    async fn source_present_checks_the_transfer() {
        let transfer = MemoryTransfer::new();
        let request = request();
        transfer.seed(&request.source, "/there.jar", b"x".to_vec());
        let ctx = RuleContext {
            request: &request,
            transfer: &transfer,
        };

        assert!(SourcePresentRule.validate("/there.jar", &ctx).await.is_none());
        assert!(SourcePresentRule.validate("/gone.jar", &ctx).await.is_some());
    }

    #[tokio::test]
    async fn first_failing_rule_wins() {
        let transfer = MemoryTransfer::new();
        let request = request();
        let ctx = RuleContext {
            request: &request,
            transfer: &transfer,
        };
        let rule_set = RuleSet::new()
            .with_rule(Arc::new(PathPatternRule::new(["-SNAPSHOT"])))
            .with_rule(Arc::new(ReleaseOnlyRule));

        let (rule, _, blocking) = rule_set
            .judge("/a/1.0-SNAPSHOT/a.jar", &ctx)
            .await
            .unwrap();
        assert_eq!(rule, "path-filter");
        assert!(!blocking);
    }

    #[tokio::test]
    async fn unknown_rule_set_is_an_error() {
        let validator = PromotionValidator::new();
        assert!(matches!(
            validator.get("nope"),
            Err(PromoteError::UnknownRuleSet(_))
        ));
    }
}
