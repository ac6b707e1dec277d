//! The promotion engine: validate, copy, account, and undo.

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use depot_content::{ContentResolver, Listing, Resolution, Transfer};
use depot_model::{ArtifactStore, StoreKey};
use depot_registry::StoreRegistry;

use crate::error::{PromoteError, PromoteResult};
use crate::model::{PromotionRequest, PromotionResult};
use crate::rules::{PromotionValidator, RuleContext, RuleSet};

/// Engine-level promotion settings.
#[derive(Clone, Debug)]
pub struct PromoteConfig {
    /// Rule-set applied when a request names none. A request without a
    /// rule-set promotes unvalidated if this set is not registered.
    pub default_rule_set: String,
}

impl Default for PromoteConfig {
    fn default() -> Self {
        Self {
            default_rule_set: "default".to_string(),
        }
    }
}

enum CopyOutcome {
    Copied,
    Identical,
    Failed(String),
    TimedOut,
}

/// Coordinates one promotion run end to end.
///
/// Reads go through the resolver so the source may be a group and
/// negative-cache state is honored; writes and deletes go straight to the
/// transfer boundary, since promotion targets are always concrete.
pub struct PromotionManager {
    registry: Arc<dyn StoreRegistry>,
    resolver: Arc<ContentResolver>,
    transfer: Arc<dyn Transfer>,
    validator: PromotionValidator,
    config: PromoteConfig,
}

impl PromotionManager {
    pub fn new(
        registry: Arc<dyn StoreRegistry>,
        resolver: Arc<ContentResolver>,
        transfer: Arc<dyn Transfer>,
        validator: PromotionValidator,
        config: PromoteConfig,
    ) -> Self {
        Self {
            registry,
            resolver,
            transfer,
            validator,
            config,
        }
    }

    /// Run a promotion: enumerate, validate, copy, then optionally purge.
    ///
    /// Per-path problems land in the result's accounting sets; `Err` is
    /// reserved for a structurally bad request.
    pub async fn promote(&self, request: PromotionRequest) -> PromoteResult<PromotionResult> {
        self.promote_inner(request, None).await
    }

    /// Run a promotion bounded by a deadline.
    ///
    /// When the deadline expires mid-run the result carries `timed_out`
    /// and every unattempted path lands in `pending`. Nothing already
    /// copied is undone; callers wanting that call [`Self::rollback`].
    pub async fn promote_by(
        &self,
        request: PromotionRequest,
        deadline: Instant,
    ) -> PromoteResult<PromotionResult> {
        self.promote_inner(request, Some(deadline)).await
    }

    async fn promote_inner(
        &self,
        request: PromotionRequest,
        deadline: Option<Instant>,
    ) -> PromoteResult<PromotionResult> {
        let snapshot = self.registry.snapshot();
        if !snapshot.contains_key(&request.source) {
            return Err(PromoteError::NoSuchStore(request.source.clone()));
        }
        match snapshot.get(&request.target) {
            None => return Err(PromoteError::NoSuchStore(request.target.clone())),
            Some(store) if !store.is_writable() => {
                return Err(PromoteError::InvalidTarget {
                    key: request.target.clone(),
                    reason: "target must be an enabled, writable hosted store".to_string(),
                });
            }
            Some(_) => {}
        }

        let mut result = PromotionResult::default();
        let paths = match &request.paths {
            Some(paths) => paths.clone(),
            None => match self.enumerate_source(&request.source, deadline).await? {
                Some(paths) => paths,
                None => {
                    result.timed_out = true;
                    return Ok(result);
                }
            },
        };
        info!(
            source = %request.source,
            target = %request.target,
            paths = paths.len(),
            dry_run = request.dry_run,
            "promotion starting"
        );

        let survivors = self.validate(&request, paths, deadline, &mut result).await?;
        if result.validation.aborted_by.is_some() {
            warn!(
                source = %request.source,
                target = %request.target,
                rule = result.validation.aborted_by.as_deref().unwrap_or(""),
                "promotion aborted by blocking rule"
            );
            return Ok(result);
        }
        if result.timed_out {
            result.pending.extend(survivors);
            return Ok(result);
        }

        if request.dry_run {
            result.pending = survivors;
            return Ok(result);
        }

        let mut remaining = survivors;
        while let Some(path) = remaining.pop_first() {
            if deadline_passed(deadline) {
                result.pending.insert(path);
                result.pending.append(&mut remaining);
                result.timed_out = true;
                break;
            }
            match self.copy_one(&request, &path, deadline).await {
                CopyOutcome::Copied => {
                    result.completed.insert(path);
                }
                CopyOutcome::Identical => {
                    result.skipped.insert(path);
                }
                CopyOutcome::Failed(reason) => {
                    result.errors.insert(path, reason);
                }
                CopyOutcome::TimedOut => {
                    result.pending.insert(path);
                    result.pending.append(&mut remaining);
                    result.timed_out = true;
                    break;
                }
            }
        }

        for path in &result.completed {
            self.resolver.clear_negative_entries(&request.target, path);
        }

        if request.purge_source && result.succeeded() {
            self.purge_source(&request, &mut result).await;
        }

        info!(
            source = %request.source,
            target = %request.target,
            completed = result.completed.len(),
            skipped = result.skipped.len(),
            errors = result.errors.len(),
            timed_out = result.timed_out,
            "promotion finished"
        );
        Ok(result)
    }

    /// Undo the copies of a prior run, best effort.
    ///
    /// Paths removed from the target move back to `pending`; paths whose
    /// removal failed stay in `completed` with an error recorded, so the
    /// result always reflects what is actually on the target.
    pub async fn rollback(
        &self,
        request: &PromotionRequest,
        result: &mut PromotionResult,
    ) -> PromoteResult<()> {
        let completed = std::mem::take(&mut result.completed);
        for path in completed {
            match self.transfer.delete(&request.target, &path).await {
                Ok(_) => {
                    debug!(target = %request.target, %path, "promotion copy rolled back");
                    result.pending.insert(path);
                }
                Err(e) => {
                    result
                        .errors
                        .insert(path.clone(), format!("rollback failed: {e}"));
                    result.completed.insert(path);
                }
            }
        }
        Ok(())
    }

    /// Promote a store into a group by membership: the source becomes the
    /// group's lowest-priority constituent. Returns `false` if it already
    /// was a member.
    pub fn promote_to_group(&self, source: &StoreKey, group: &StoreKey) -> PromoteResult<bool> {
        if self.registry.get(source).is_none() {
            return Err(PromoteError::NoSuchStore(source.clone()));
        }
        let mut store = self
            .registry
            .get(group)
            .ok_or_else(|| PromoteError::NoSuchStore(group.clone()))?;
        let ArtifactStore::Group(g) = &mut store else {
            return Err(PromoteError::InvalidTarget {
                key: group.clone(),
                reason: "membership promotion requires a group target".to_string(),
            });
        };
        if !g.append_constituent(source.clone()) {
            return Ok(false);
        }
        self.registry.update(store)?;
        info!(%source, %group, "store promoted into group");
        Ok(true)
    }

    /// Undo a membership promotion. Returns `false` if the source was not
    /// a member.
    pub fn rollback_group_promote(
        &self,
        source: &StoreKey,
        group: &StoreKey,
    ) -> PromoteResult<bool> {
        let mut store = self
            .registry
            .get(group)
            .ok_or_else(|| PromoteError::NoSuchStore(group.clone()))?;
        let ArtifactStore::Group(g) = &mut store else {
            return Err(PromoteError::InvalidTarget {
                key: group.clone(),
                reason: "membership promotion requires a group target".to_string(),
            });
        };
        if !g.remove_constituent(source) {
            return Ok(false);
        }
        self.registry.update(store)?;
        info!(%source, %group, "store removed from group");
        Ok(true)
    }

    /// Walk the source's directory tree into a flat path set. `None`
    /// means the deadline expired with the walk incomplete.
    async fn enumerate_source(
        &self,
        source: &StoreKey,
        deadline: Option<Instant>,
    ) -> PromoteResult<Option<BTreeSet<String>>> {
        let mut paths = BTreeSet::new();
        let mut dirs = vec!["/".to_string()];
        while let Some(dir) = dirs.pop() {
            let outcome = self.resolver.list(source, &dir, deadline).await?;
            let entries = match outcome.listing {
                Listing::Found { entries, .. } => entries,
                Listing::NotFound => continue,
                Listing::Timeout => return Ok(None),
            };
            for entry in entries {
                let full = depot_model::path::join(&dir, &entry.name);
                if entry.directory {
                    dirs.push(full);
                } else {
                    paths.insert(full);
                }
            }
        }
        Ok(Some(paths))
    }

    /// Judge every path; returns the set that may enter the copy phase.
    /// A deadline expiring mid-validation marks the result timed out, with
    /// the unjudged remainder in `pending`.
    async fn validate(
        &self,
        request: &PromotionRequest,
        paths: BTreeSet<String>,
        deadline: Option<Instant>,
        result: &mut PromotionResult,
    ) -> PromoteResult<BTreeSet<String>> {
        let rule_set: Option<&RuleSet> = match &request.rule_set {
            Some(name) => Some(self.validator.get(name)?),
            None => self.validator.get(&self.config.default_rule_set).ok(),
        };
        let Some(rule_set) = rule_set else {
            return Ok(paths);
        };

        let ctx = RuleContext {
            request,
            transfer: self.transfer.as_ref(),
        };
        let mut survivors = BTreeSet::new();
        let mut remaining = paths;
        while let Some(path) = remaining.pop_first() {
            if deadline_passed(deadline) {
                result.pending.insert(path);
                result.pending.append(&mut remaining);
                result.timed_out = true;
                break;
            }
            match rule_set.judge(&path, &ctx).await {
                None => {
                    survivors.insert(path);
                }
                Some((rule, reason, blocking)) => {
                    debug!(%path, %rule, %reason, "path failed validation");
                    result.validation.errors.insert(path, reason);
                    if blocking {
                        result.validation.aborted_by = Some(rule);
                        return Ok(BTreeSet::new());
                    }
                }
            }
        }
        Ok(survivors)
    }

    /// Copy one path, distinguishing a per-path failure from the run's
    /// deadline expiring.
    async fn copy_one(
        &self,
        request: &PromotionRequest,
        path: &str,
        deadline: Option<Instant>,
    ) -> CopyOutcome {
        let outcome = match self.resolver.resolve(&request.source, path, deadline).await {
            Ok(outcome) => outcome,
            Err(e) => return CopyOutcome::Failed(e.to_string()),
        };
        let bytes = match outcome.resolution {
            Resolution::Found(found) => found.content,
            Resolution::NotFound => {
                return CopyOutcome::Failed("not present in the source store".to_string());
            }
            Resolution::Timeout => return CopyOutcome::TimedOut,
        };

        match self.transfer.fetch(&request.target, path).await {
            Ok(Some(existing)) if existing == bytes => return CopyOutcome::Identical,
            Ok(_) => {}
            Err(e) => return CopyOutcome::Failed(format!("cannot read target: {e}")),
        }

        match self.transfer.put(&request.target, path, bytes).await {
            Ok(()) => CopyOutcome::Copied,
            Err(e) => CopyOutcome::Failed(e.to_string()),
        }
    }

    /// Delete every promoted path from the source. Failures never undo the
    /// promotion itself.
    async fn purge_source(&self, request: &PromotionRequest, result: &mut PromotionResult) {
        let promoted: Vec<String> = result
            .completed
            .iter()
            .chain(result.skipped.iter())
            .cloned()
            .collect();
        for path in promoted {
            match self.transfer.delete(&request.source, &path).await {
                Ok(_) => {
                    debug!(source = %request.source, %path, "purged after promotion");
                }
                Err(e) => {
                    result.purge_failures.insert(path, e.to_string());
                }
            }
        }
    }
}

fn deadline_passed(deadline: Option<Instant>) -> bool {
    matches!(deadline, Some(d) if Instant::now() >= d)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::rules::{PathPatternRule, ReleaseOnlyRule};
    use depot_content::{ContentConfig, LineMerger, MemoryTransfer};
    use depot_model::{GroupStore, HostedStore};
    use depot_nfc::{MemoryNotFoundCache, NfcLocation, NotFoundCache};
    use depot_registry::MemoryStoreRegistry;

    fn src() -> StoreKey {
        StoreKey::hosted("maven", "build-1")
    }

    fn dst() -> StoreKey {
        StoreKey::hosted("maven", "releases")
    }

    fn public() -> StoreKey {
        StoreKey::group("maven", "public")
    }

    struct Fixture {
        manager: PromotionManager,
        registry: Arc<MemoryStoreRegistry>,
        nfc: Arc<MemoryNotFoundCache>,
        transfer: Arc<MemoryTransfer>,
    }

    fn fixture(validator: PromotionValidator) -> Fixture {
        let registry = Arc::new(MemoryStoreRegistry::with_stores([
            HostedStore::new(src()).into(),
            HostedStore::new(dst()).into(),
            ArtifactStore::Group(GroupStore::new(public(), vec![dst()])),
        ]));
        let nfc = Arc::new(MemoryNotFoundCache::default());
        let transfer = Arc::new(MemoryTransfer::new());
        let resolver = Arc::new(ContentResolver::new(
            registry.clone(),
            nfc.clone(),
            transfer.clone(),
            Arc::new(LineMerger),
            ContentConfig::default(),
        ));
        let manager = PromotionManager::new(
            registry.clone(),
            resolver,
            transfer.clone(),
            validator,
            PromoteConfig::default(),
        );
        Fixture {
            manager,
            registry,
            nfc,
            transfer,
        }
    }

    #[tokio::test]
    async fn copies_accounting_for_every_path() {
        let f = fixture(PromotionValidator::new());
        f.transfer.seed(&src(), "/org/a/1.0/a-1.0.jar", b"a".to_vec());
        f.transfer.seed(&src(), "/org/b/1.0/b-1.0.jar", b"b".to_vec());
        f.transfer.seed(&dst(), "/org/b/1.0/b-1.0.jar", b"b".to_vec());

        let request = PromotionRequest::new(src(), dst())
            .with_paths(["/org/a/1.0/a-1.0.jar", "/org/b/1.0/b-1.0.jar"]);
        let result = f.manager.promote(request).await.unwrap();

        assert!(result.succeeded());
        assert!(result.completed.contains("/org/a/1.0/a-1.0.jar"));
        assert!(result.skipped.contains("/org/b/1.0/b-1.0.jar"));
        assert_eq!(result.accounted_paths().len(), 2);
        assert_eq!(
            f.transfer.fetch(&dst(), "/org/a/1.0/a-1.0.jar").await.unwrap(),
            Some(b"a".to_vec())
        );
    }

    #[tokio::test]
    async fn rerunning_a_successful_promotion_skips_everything() {
        let f = fixture(PromotionValidator::new());
        f.transfer.seed(&src(), "/org/a/1.0/a-1.0.jar", b"a".to_vec());
        f.transfer.seed(&src(), "/org/b/1.0/b-1.0.jar", b"b".to_vec());

        let request = PromotionRequest::new(src(), dst());
        let first = f.manager.promote(request.clone()).await.unwrap();
        assert!(first.succeeded());
        assert_eq!(first.completed.len(), 2);

        let second = f.manager.promote(request).await.unwrap();
        assert!(second.succeeded());
        assert!(second.completed.is_empty());
        assert_eq!(second.skipped.len(), 2);
        assert!(second.errors.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_expiry_leaves_unattempted_paths_pending() {
        let f = fixture(PromotionValidator::new());
        f.transfer.seed(&src(), "/org/a/a.jar", b"a".to_vec());
        f.transfer.seed(&src(), "/org/b/b.jar", b"b".to_vec());
        f.transfer.set_latency(&src(), Duration::from_secs(5));

        let request =
            PromotionRequest::new(src(), dst()).with_paths(["/org/a/a.jar", "/org/b/b.jar"]);
        let deadline = Instant::now() + Duration::from_millis(100);
        let result = f.manager.promote_by(request, deadline).await.unwrap();

        assert!(result.timed_out);
        assert!(!result.succeeded());
        // Absence of a copy was never confirmed, so nothing is an error.
        assert!(result.errors.is_empty());
        assert_eq!(result.pending.len(), 2);
        assert!(result.completed.is_empty());
        assert!(f.transfer.paths(&dst()).is_empty());
    }

    #[tokio::test]
    async fn generous_deadline_does_not_disturb_accounting() {
        let f = fixture(PromotionValidator::new());
        f.transfer.seed(&src(), "/org/a/a.jar", b"a".to_vec());

        let request = PromotionRequest::new(src(), dst()).with_paths(["/org/a/a.jar"]);
        let deadline = Instant::now() + Duration::from_secs(60);
        let result = f.manager.promote_by(request, deadline).await.unwrap();

        assert!(result.succeeded());
        assert!(!result.timed_out);
        assert!(result.completed.contains("/org/a/a.jar"));
    }

    #[tokio::test]
    async fn missing_source_path_is_a_per_path_error() {
        let f = fixture(PromotionValidator::new());
        f.transfer.seed(&src(), "/present.jar", b"x".to_vec());

        let request =
            PromotionRequest::new(src(), dst()).with_paths(["/present.jar", "/absent.jar"]);
        let result = f.manager.promote(request).await.unwrap();

        assert!(!result.succeeded());
        assert!(result.completed.contains("/present.jar"));
        assert!(result.errors.contains_key("/absent.jar"));
    }

    #[tokio::test]
    async fn enumerates_the_source_when_no_paths_are_given() {
        let f = fixture(PromotionValidator::new());
        f.transfer.seed(&src(), "/org/a/1.0/a-1.0.jar", b"a".to_vec());
        f.transfer.seed(&src(), "/org/a/1.0/a-1.0.pom", b"p".to_vec());
        f.transfer.seed(&src(), "/org/deep/nested/x.jar", b"x".to_vec());

        let result = f
            .manager
            .promote(PromotionRequest::new(src(), dst()))
            .await
            .unwrap();

        assert!(result.succeeded());
        assert_eq!(result.completed.len(), 3);
        assert!(result.completed.contains("/org/deep/nested/x.jar"));
    }

    #[tokio::test]
    async fn blocking_rule_aborts_before_any_copy() {
        let mut validator = PromotionValidator::new();
        validator.register(
            "default",
            RuleSet::new().with_blocking_rule(Arc::new(ReleaseOnlyRule)),
        );
        let f = fixture(validator);
        f.transfer.seed(&src(), "/org/a/1.0/a-1.0.jar", b"a".to_vec());
        f.transfer
            .seed(&src(), "/org/a/1.0-SNAPSHOT/a.jar", b"s".to_vec());

        let result = f
            .manager
            .promote(PromotionRequest::new(src(), dst()))
            .await
            .unwrap();

        assert_eq!(result.validation.aborted_by.as_deref(), Some("release-only"));
        assert!(result.completed.is_empty());
        assert!(result.pending.is_empty());
        assert!(f.transfer.paths(&dst()).is_empty());
    }

    #[tokio::test]
    async fn non_blocking_failure_excludes_only_that_path() {
        let mut validator = PromotionValidator::new();
        validator.register(
            "default",
            RuleSet::new().with_rule(Arc::new(PathPatternRule::new(["/internal/"]))),
        );
        let f = fixture(validator);
        f.transfer.seed(&src(), "/org/a/a.jar", b"a".to_vec());
        f.transfer.seed(&src(), "/internal/secret.jar", b"s".to_vec());

        let result = f
            .manager
            .promote(PromotionRequest::new(src(), dst()))
            .await
            .unwrap();

        assert!(result.completed.contains("/org/a/a.jar"));
        assert!(result.validation.errors.contains_key("/internal/secret.jar"));
        assert!(!f.transfer.paths(&dst()).contains(&"/internal/secret.jar".to_string()));
    }

    #[tokio::test]
    async fn named_rule_set_must_exist() {
        let f = fixture(PromotionValidator::new());
        let request = PromotionRequest::new(src(), dst()).with_rule_set("strict");
        assert!(matches!(
            f.manager.promote(request).await,
            Err(PromoteError::UnknownRuleSet(_))
        ));
    }

    #[tokio::test]
    async fn dry_run_reports_pending_and_writes_nothing() {
        let f = fixture(PromotionValidator::new());
        f.transfer.seed(&src(), "/org/a/a.jar", b"a".to_vec());

        let result = f
            .manager
            .promote(PromotionRequest::new(src(), dst()).dry())
            .await
            .unwrap();

        assert!(result.pending.contains("/org/a/a.jar"));
        assert!(result.completed.is_empty());
        assert!(f.transfer.paths(&dst()).is_empty());
    }

    #[tokio::test]
    async fn readonly_target_is_rejected() {
        let f = fixture(PromotionValidator::new());
        let mut frozen = HostedStore::new(StoreKey::hosted("maven", "frozen"));
        frozen.readonly = true;
        f.registry.create(frozen.into()).unwrap();

        let request = PromotionRequest::new(src(), StoreKey::hosted("maven", "frozen"));
        assert!(matches!(
            f.manager.promote(request).await,
            Err(PromoteError::InvalidTarget { .. })
        ));
    }

    #[tokio::test]
    async fn promotion_clears_negative_cache_for_target_and_its_groups() {
        let f = fixture(PromotionValidator::new());
        f.transfer.seed(&src(), "/org/a/a.jar", b"a".to_vec());
        f.nfc.add_missing(&NfcLocation::new(dst()), "/org/a/a.jar");
        f.nfc.add_missing(&NfcLocation::new(public()), "/org/a/a.jar");

        let result = f
            .manager
            .promote(PromotionRequest::new(src(), dst()).with_paths(["/org/a/a.jar"]))
            .await
            .unwrap();

        assert!(result.succeeded());
        assert!(!f.nfc.is_missing(&dst(), "/org/a/a.jar"));
        assert!(!f.nfc.is_missing(&public(), "/org/a/a.jar"));
    }

    #[tokio::test]
    async fn purge_source_removes_promoted_paths() {
        let f = fixture(PromotionValidator::new());
        f.transfer.seed(&src(), "/org/a/a.jar", b"a".to_vec());
        f.transfer.seed(&src(), "/org/b/b.jar", b"b".to_vec());
        f.transfer.seed(&dst(), "/org/b/b.jar", b"b".to_vec());

        let result = f
            .manager
            .promote(PromotionRequest::new(src(), dst()).purging_source())
            .await
            .unwrap();

        assert!(result.succeeded());
        assert!(result.purge_failures.is_empty());
        assert!(f.transfer.paths(&src()).is_empty());
    }

    #[tokio::test]
    async fn purge_is_withheld_when_any_path_failed() {
        let f = fixture(PromotionValidator::new());
        f.transfer.seed(&src(), "/ok.jar", b"a".to_vec());

        let request = PromotionRequest::new(src(), dst())
            .with_paths(["/ok.jar", "/missing.jar"])
            .purging_source();
        let result = f.manager.promote(request).await.unwrap();

        assert!(!result.succeeded());
        assert_eq!(f.transfer.paths(&src()), vec!["/ok.jar".to_string()]);
    }

    #[tokio::test]
    async fn rollback_returns_copies_to_pending() {
        let f = fixture(PromotionValidator::new());
        f.transfer.seed(&src(), "/org/a/a.jar", b"a".to_vec());

        let request = PromotionRequest::new(src(), dst()).with_paths(["/org/a/a.jar"]);
        let mut result = f.manager.promote(request.clone()).await.unwrap();
        assert!(result.completed.contains("/org/a/a.jar"));

        f.manager.rollback(&request, &mut result).await.unwrap();

        assert!(result.completed.is_empty());
        assert!(result.pending.contains("/org/a/a.jar"));
        assert!(f.transfer.paths(&dst()).is_empty());
    }

    #[tokio::test]
    async fn group_promotion_appends_once_and_rolls_back() {
        let f = fixture(PromotionValidator::new());

        assert!(f.manager.promote_to_group(&src(), &public()).unwrap());
        assert!(!f.manager.promote_to_group(&src(), &public()).unwrap());
        assert_eq!(
            f.registry.get(&public()).unwrap().constituents(),
            &[dst(), src()]
        );

        assert!(f.manager.rollback_group_promote(&src(), &public()).unwrap());
        assert!(!f.manager.rollback_group_promote(&src(), &public()).unwrap());
        assert_eq!(f.registry.get(&public()).unwrap().constituents(), &[dst()]);
    }

    #[tokio::test]
    async fn group_promotion_requires_a_group_target() {
        let f = fixture(PromotionValidator::new());
        assert!(matches!(
            f.manager.promote_to_group(&src(), &dst()),
            Err(PromoteError::InvalidTarget { .. })
        ));
    }
}
