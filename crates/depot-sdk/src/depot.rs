use std::sync::Arc;

use tokio::time::Instant;
use tracing::debug;

use depot_content::{
    ContentConfig, ContentResolver, LineMerger, ListingOutcome, MetadataMerger, ResolveOutcome,
    Transfer,
};
use depot_model::{ArtifactStore, StoreKey, StoreType};
use depot_nfc::{MemoryNotFoundCache, NfcConfig, NotFoundCache};
use depot_promote::{
    PromoteConfig, PromotionManager, PromotionRequest, PromotionResult, PromotionValidator,
    RuleSet,
};
use depot_registry::{EventSink, MemoryStoreRegistry, StoreEvent, StoreRegistry};

use crate::error::SdkResult;

/// Assembles a [`Depot`] over a caller-supplied transfer boundary.
pub struct DepotBuilder {
    transfer: Arc<dyn Transfer>,
    merger: Arc<dyn MetadataMerger>,
    content: ContentConfig,
    nfc: NfcConfig,
    promote: PromoteConfig,
    validator: PromotionValidator,
}

impl DepotBuilder {
    pub fn new(transfer: Arc<dyn Transfer>) -> Self {
        Self {
            transfer,
            merger: Arc::new(LineMerger),
            content: ContentConfig::default(),
            nfc: NfcConfig::default(),
            promote: PromoteConfig::default(),
            validator: PromotionValidator::new(),
        }
    }

    pub fn content_config(mut self, config: ContentConfig) -> Self {
        self.content = config;
        self
    }

    pub fn nfc_config(mut self, config: NfcConfig) -> Self {
        self.nfc = config;
        self
    }

    pub fn promote_config(mut self, config: PromoteConfig) -> Self {
        self.promote = config;
        self
    }

    pub fn merger(mut self, merger: Arc<dyn MetadataMerger>) -> Self {
        self.merger = merger;
        self
    }

    /// Register a named promotion rule-set.
    pub fn rule_set(mut self, name: impl Into<String>, rule_set: RuleSet) -> Self {
        self.validator.register(name, rule_set);
        self
    }

    pub fn build(self) -> Depot {
        let registry = Arc::new(MemoryStoreRegistry::new());
        let nfc = Arc::new(MemoryNotFoundCache::new(&self.nfc));

        // Definition changes make negative entries untrustworthy: drop
        // them for the changed store and for every group that resolves
        // through it. The closure holds the registry weakly; the registry
        // owns its sinks.
        let sink_nfc = nfc.clone();
        let sink_registry = Arc::downgrade(&registry);
        registry.subscribe(Arc::new(move |event: &StoreEvent| {
            if matches!(event, StoreEvent::Created(_)) {
                return;
            }
            let key = event.key();
            debug!(%event, "dropping negative entries after registry change");
            sink_nfc.clear_all_missing(key);
            if let Some(registry) = sink_registry.upgrade() {
                for group in registry.groups_affected_by(key) {
                    sink_nfc.clear_all_missing(&group);
                }
            }
        }));

        let resolver = Arc::new(ContentResolver::new(
            registry.clone(),
            nfc.clone(),
            self.transfer.clone(),
            self.merger,
            self.content,
        ));
        let promoter = PromotionManager::new(
            registry.clone(),
            resolver.clone(),
            self.transfer.clone(),
            self.validator,
            self.promote,
        );

        Depot {
            registry,
            nfc,
            resolver,
            promoter,
        }
    }
}

/// High-level Depot API: store administration, content resolution, and
/// promotion behind one handle.
pub struct Depot {
    registry: Arc<MemoryStoreRegistry>,
    nfc: Arc<MemoryNotFoundCache>,
    resolver: Arc<ContentResolver>,
    promoter: PromotionManager,
}

impl Depot {
    /// A depot with default configuration over the given transfer.
    pub fn new(transfer: Arc<dyn Transfer>) -> Self {
        DepotBuilder::new(transfer).build()
    }

    pub fn builder(transfer: Arc<dyn Transfer>) -> DepotBuilder {
        DepotBuilder::new(transfer)
    }

    // ---- Store administration ----

    pub fn create_store(&self, store: ArtifactStore) -> SdkResult<StoreKey> {
        Ok(self.registry.create(store)?)
    }

    pub fn update_store(&self, store: ArtifactStore) -> SdkResult<()> {
        Ok(self.registry.update(store)?)
    }

    pub fn delete_store(&self, key: &StoreKey, cascade: bool) -> SdkResult<bool> {
        Ok(self.registry.delete(key, cascade)?)
    }

    pub fn get_store(&self, key: &StoreKey) -> Option<ArtifactStore> {
        self.registry.get(key)
    }

    pub fn list_stores(
        &self,
        package_type: &str,
        store_type: Option<StoreType>,
    ) -> Vec<ArtifactStore> {
        self.registry.list(package_type, store_type)
    }

    pub fn members_of(&self, key: &StoreKey) -> Vec<StoreKey> {
        self.registry.members_of(key)
    }

    pub fn subscribe(&self, sink: Arc<dyn EventSink>) {
        self.registry.subscribe(sink);
    }

    // ---- Content operations ----

    pub async fn resolve(&self, key: &StoreKey, path: &str) -> SdkResult<ResolveOutcome> {
        Ok(self.resolver.resolve(key, path, None).await?)
    }

    pub async fn resolve_by(
        &self,
        key: &StoreKey,
        path: &str,
        deadline: Instant,
    ) -> SdkResult<ResolveOutcome> {
        Ok(self.resolver.resolve(key, path, Some(deadline)).await?)
    }

    pub async fn list(&self, key: &StoreKey, path: &str) -> SdkResult<ListingOutcome> {
        Ok(self.resolver.list(key, path, None).await?)
    }

    /// Write content; a group routes to its first writable member. Returns
    /// the store that received the bytes.
    pub async fn store_content(
        &self,
        key: &StoreKey,
        path: &str,
        bytes: Vec<u8>,
    ) -> SdkResult<StoreKey> {
        Ok(self.resolver.store(key, path, bytes).await?)
    }

    // ---- Promotion ----

    pub async fn promote(&self, request: PromotionRequest) -> SdkResult<PromotionResult> {
        Ok(self.promoter.promote(request).await?)
    }

    /// Promote with a deadline; expiry leaves unattempted paths `pending`
    /// and marks the result `timed_out`.
    pub async fn promote_by(
        &self,
        request: PromotionRequest,
        deadline: Instant,
    ) -> SdkResult<PromotionResult> {
        Ok(self.promoter.promote_by(request, deadline).await?)
    }

    pub async fn rollback(
        &self,
        request: &PromotionRequest,
        result: &mut PromotionResult,
    ) -> SdkResult<()> {
        Ok(self.promoter.rollback(request, result).await?)
    }

    pub fn promote_to_group(&self, source: &StoreKey, group: &StoreKey) -> SdkResult<bool> {
        Ok(self.promoter.promote_to_group(source, group)?)
    }

    pub fn rollback_group_promote(&self, source: &StoreKey, group: &StoreKey) -> SdkResult<bool> {
        Ok(self.promoter.rollback_group_promote(source, group)?)
    }

    // ---- Introspection ----

    pub fn registry(&self) -> &Arc<MemoryStoreRegistry> {
        &self.registry
    }

    pub fn not_found_cache(&self) -> &Arc<MemoryNotFoundCache> {
        &self.nfc
    }

    pub fn resolver(&self) -> &Arc<ContentResolver> {
        &self.resolver
    }
}
