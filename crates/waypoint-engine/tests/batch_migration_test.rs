//! Integration tests for batch migration.
//!
//! This test suite validates:
//! - Result count always equals input count
//! - Pull failures land on the entry unchanged and never reach publishing
//! - Transform and finalize failures are both reported
//! - Batch-local cancellation stays inside the batch; caller cancellation
//!   escapes the batch call
//! - Item publish records the destination exactly once before migrating
//! - Bulk publish shares one outcome across the batch
//!
//! Every scenario runs against both the sequential and the parallel migrator.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use uuid::Uuid;
use waypoint_engine::{
    BatchMigrator, BulkPublishStrategy, CancellationToken, ContentKind, ContentLocation,
    ContentReference, ContentType, ConvertStage, EngineConfig, Error, FinalizeStage, FnConverter,
    ItemPreparer, ItemPublishStrategy, MappingStage, MigrationItem, MigrationStatus,
    ParallelBatchMigrator, PostPublishHook, PublishStrategy, PullStage, Result,
    SequentialBatchMigrator, TransformHook,
};
use waypoint_core::{
    ContentCapabilities, DestinationEndpoint, DestinationFinder, ManifestEntry,
    ManifestEntryHandle, Publishable, SourceItem,
};

// ============================================================================
// CONTENT KIND
// ============================================================================

struct DataSources;

#[derive(Debug, Clone)]
struct SourceDataSource {
    reference: ContentReference,
    project: Option<ContentReference>,
}

impl SourceItem for SourceDataSource {
    fn reference(&self) -> &ContentReference {
        &self.reference
    }
}

#[derive(Debug, Clone)]
struct PublishDataSource {
    location: ContentLocation,
    project: Option<ContentReference>,
}

impl Publishable for PublishDataSource {
    fn capabilities() -> ContentCapabilities {
        ContentCapabilities::NONE
            .with_container()
            .with_direct_mapping()
    }

    fn container(&self) -> Option<&ContentReference> {
        self.project.as_ref()
    }

    fn set_container(&mut self, container: Option<ContentReference>) {
        self.project = container;
    }

    fn set_location(&mut self, location: ContentLocation) {
        self.location = location;
    }
}

impl ContentKind for DataSources {
    const CONTENT_TYPE: ContentType = ContentType::DataSource;
    type Source = SourceDataSource;
    type Pulled = SourceDataSource;
    type Publish = PublishDataSource;
    type Published = ContentReference;
}

// ============================================================================
// FAKES
// ============================================================================

/// What the scripted pull stage does for an item, keyed by item name.
#[derive(Clone)]
enum PullScript {
    Fail(Vec<Error>),
    CancelBatch,
    CancelCaller(CancellationToken),
    /// Hold the permit until the batch token fires.
    AwaitCancel,
}

#[derive(Default)]
struct ScriptedPull {
    scripts: HashMap<String, PullScript>,
    pulled: Mutex<Vec<String>>,
}

impl ScriptedPull {
    fn with(mut self, name: &str, script: PullScript) -> Self {
        self.scripts.insert(name.to_string(), script);
        self
    }
}

#[async_trait]
impl PullStage<DataSources> for ScriptedPull {
    async fn pull(
        &self,
        item: &MigrationItem<DataSources>,
        cancel: &CancellationToken,
    ) -> Result<SourceDataSource> {
        let name = item.reference().name().to_string();
        self.pulled.lock().unwrap().push(name.clone());
        match self.scripts.get(&name) {
            None => Ok(item.source().clone()),
            Some(PullScript::Fail(errors)) => Err(Error::Aggregate(errors.clone())),
            Some(PullScript::CancelBatch) => {
                cancel.cancel();
                Err(Error::Canceled)
            }
            Some(PullScript::CancelCaller(caller)) => {
                caller.cancel();
                Err(Error::Canceled)
            }
            Some(PullScript::AwaitCancel) => {
                cancel.cancelled().await;
                Err(Error::Canceled)
            }
        }
    }
}

#[derive(Default)]
struct MemoryDestination {
    published: Mutex<Vec<ContentLocation>>,
    batch_calls: Mutex<usize>,
    fail_batch_with: Option<Vec<Error>>,
}

#[async_trait]
impl DestinationEndpoint<DataSources> for MemoryDestination {
    async fn publish(
        &self,
        item: &PublishDataSource,
        _cancel: &CancellationToken,
    ) -> Result<ContentReference> {
        self.published.lock().unwrap().push(item.location.clone());
        Ok(ContentReference::new(
            Uuid::new_v4(),
            "published",
            item.location.clone(),
        ))
    }

    async fn publish_batch(
        &self,
        items: &[PublishDataSource],
        _cancel: &CancellationToken,
    ) -> Result<()> {
        *self.batch_calls.lock().unwrap() += 1;
        if let Some(errors) = &self.fail_batch_with {
            return Err(Error::Aggregate(errors.clone()));
        }
        self.published
            .lock()
            .unwrap()
            .extend(items.iter().map(|i| i.location.clone()));
        Ok(())
    }
}

/// Finder that knows a fixed set of destination projects by mapped path.
#[derive(Default)]
struct ProjectFinder {
    projects: Vec<ContentReference>,
    lookups: Mutex<Vec<ContentLocation>>,
}

#[async_trait]
impl DestinationFinder for ProjectFinder {
    async fn find_by_source_location(
        &self,
        location: &ContentLocation,
        _cancel: &CancellationToken,
    ) -> Result<Option<ContentReference>> {
        self.lookups.lock().unwrap().push(location.clone());
        Ok(self
            .projects
            .iter()
            .find(|p| &p.location == location)
            .cloned())
    }

    async fn find_by_mapped_location(
        &self,
        location: &ContentLocation,
        _cancel: &CancellationToken,
    ) -> Result<Option<ContentReference>> {
        self.lookups.lock().unwrap().push(location.clone());
        Ok(self
            .projects
            .iter()
            .find(|p| &p.location == location)
            .cloned())
    }
}

struct FailingTransform;

#[async_trait]
impl TransformHook<DataSources> for FailingTransform {
    fn name(&self) -> &str {
        "owner_lookup"
    }

    async fn transform(
        &self,
        _publish: &mut PublishDataSource,
        _item: &MigrationItem<DataSources>,
        _cancel: &CancellationToken,
    ) -> Result<()> {
        Err(Error::Transform("e1".into()))
    }
}

/// Cancels the whole migration and reports having seen it.
struct CancelCallerTransform(CancellationToken);

#[async_trait]
impl TransformHook<DataSources> for CancelCallerTransform {
    fn name(&self) -> &str {
        "cancel_caller"
    }

    async fn transform(
        &self,
        _publish: &mut PublishDataSource,
        _item: &MigrationItem<DataSources>,
        _cancel: &CancellationToken,
    ) -> Result<()> {
        self.0.cancel();
        Err(Error::Canceled)
    }
}

struct FailingFinalize;

#[async_trait]
impl FinalizeStage<DataSources> for FailingFinalize {
    async fn finalize(
        &self,
        _publish: &mut PublishDataSource,
        _cancel: &CancellationToken,
    ) -> Result<()> {
        Err(Error::Finalize("e2".into()))
    }
}

/// Records the entry state each time it runs.
#[derive(Default)]
struct EntryObserver {
    seen: Mutex<Vec<(MigrationStatus, bool)>>,
}

#[async_trait]
impl PostPublishHook<DataSources> for EntryObserver {
    fn name(&self) -> &str {
        "entry_observer"
    }

    async fn after_publish(
        &self,
        item: &MigrationItem<DataSources>,
        _published: &ContentReference,
        _cancel: &CancellationToken,
    ) -> Result<()> {
        let entry = item.entry().snapshot().await;
        self.seen
            .lock()
            .unwrap()
            .push((entry.status(), entry.destination().is_some()));
        Ok(())
    }
}

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn location(segments: &[&str]) -> ContentLocation {
    ContentLocation::from_segments(segments.iter().copied())
}

/// Top-level data source named `name`.
fn item(name: &str) -> MigrationItem<DataSources> {
    let reference = ContentReference::new(Uuid::new_v4(), name.to_lowercase(), location(&[name]));
    let source = SourceDataSource {
        reference: reference.clone(),
        project: None,
    };
    MigrationItem::new(
        Arc::new(source),
        ManifestEntryHandle::new(ManifestEntry::unmapped(reference)),
    )
}

fn items(names: &[&str]) -> Vec<MigrationItem<DataSources>> {
    names.iter().map(|n| item(n)).collect()
}

fn converter() -> Arc<dyn ConvertStage<DataSources>> {
    Arc::new(FnConverter::<DataSources, _>::new(|source: SourceDataSource| {
        Ok(PublishDataSource {
            location: source.reference.location,
            project: source.project,
        })
    }))
}

fn preparer(pull: Arc<ScriptedPull>) -> Arc<ItemPreparer<DataSources>> {
    Arc::new(ItemPreparer::<DataSources>::builder(pull, converter()).build())
}

/// Both migrators over the same preparer and strategy.
fn migrators(
    preparer: Arc<ItemPreparer<DataSources>>,
    strategy: Arc<dyn PublishStrategy<DataSources>>,
) -> Vec<(&'static str, Arc<dyn BatchMigrator<DataSources>>)> {
    vec![
        (
            "sequential",
            Arc::new(SequentialBatchMigrator::new(
                Arc::clone(&preparer),
                Arc::clone(&strategy),
            )),
        ),
        (
            "parallel",
            Arc::new(ParallelBatchMigrator::new(
                preparer,
                strategy,
                Arc::new(EngineConfig::default().with_max_parallelism(1)),
            )),
        ),
    ]
}

async fn statuses(items: &[MigrationItem<DataSources>]) -> Vec<MigrationStatus> {
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        out.push(item.entry().status().await);
    }
    out
}

// ============================================================================
// RESULT COUNT
// ============================================================================

#[tokio::test]
async fn test_result_count_equals_input_count() {
    for size in [0, 1, 7] {
        let names: Vec<String> = (0..size).map(|i| format!("ds{i}")).collect();
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        let pull = Arc::new(ScriptedPull::default().with(
            "ds3",
            PullScript::Fail(vec![Error::Pull("gone".into())]),
        ));
        let destination = Arc::new(MemoryDestination::default());
        let strategy = Arc::new(ItemPublishStrategy::<DataSources>::new(destination));

        for (kind, migrator) in migrators(preparer(pull.clone()), strategy) {
            let result = migrator
                .migrate_batch(items(&names), &CancellationToken::new())
                .await
                .unwrap();
            assert_eq!(result.item_results.len(), size, "{kind} with {size} items");
        }
    }
}

// ============================================================================
// STAGE FAILURES
// ============================================================================

#[tokio::test]
async fn test_pull_failure_recorded_exactly_and_never_published() {
    let errors = vec![Error::Pull("403".into()), Error::Pull("retry budget spent".into())];
    let pull = Arc::new(ScriptedPull::default().with("Broken", PullScript::Fail(errors.clone())));
    let destination = Arc::new(MemoryDestination::default());
    let strategy = Arc::new(ItemPublishStrategy::<DataSources>::new(destination.clone()));

    for (kind, migrator) in migrators(preparer(pull.clone()), strategy) {
        let input = items(&["Broken"]);
        let result = migrator
            .migrate_batch(input.clone(), &CancellationToken::new())
            .await
            .unwrap();

        let entry = input[0].entry().snapshot().await;
        assert_eq!(entry.status(), MigrationStatus::Error, "{kind}");
        assert_eq!(entry.errors(), errors.as_slice(), "{kind}");
        assert_eq!(result.item_results[0].errors, errors, "{kind}");
    }
    assert!(destination.published.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_transform_and_finalize_failures_both_reported() {
    let preparer = Arc::new(
        ItemPreparer::<DataSources>::builder(Arc::new(ScriptedPull::default()), converter())
            .with_transform(Arc::new(FailingTransform))
            .with_finalizer(Arc::new(FailingFinalize))
            .build(),
    );
    let destination = Arc::new(MemoryDestination::default());
    let strategy = Arc::new(ItemPublishStrategy::<DataSources>::new(destination.clone()));

    for (kind, migrator) in migrators(preparer.clone(), strategy.clone()) {
        let input = items(&["Extract"]);
        migrator
            .migrate_batch(input.clone(), &CancellationToken::new())
            .await
            .unwrap();

        let entry = input[0].entry().snapshot().await;
        assert_eq!(entry.status(), MigrationStatus::Error, "{kind}");
        assert!(entry.errors().contains(&Error::Transform("e1".into())), "{kind}");
        assert!(entry.errors().contains(&Error::Finalize("e2".into())), "{kind}");
    }
    assert!(destination.published.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_item_does_not_stop_siblings() {
    let pull = Arc::new(ScriptedPull::default().with(
        "B",
        PullScript::Fail(vec![Error::Pull("timeout".into())]),
    ));
    let strategy = Arc::new(ItemPublishStrategy::<DataSources>::new(Arc::new(
        MemoryDestination::default(),
    )));

    for (kind, migrator) in migrators(preparer(pull.clone()), strategy) {
        let input = items(&["A", "B", "C"]);
        let result = migrator
            .migrate_batch(input.clone(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            statuses(&input).await,
            vec![
                MigrationStatus::Migrated,
                MigrationStatus::Error,
                MigrationStatus::Migrated
            ],
            "{kind}"
        );
        assert!(result.perform_next_batch, "{kind}");
    }
}

// ============================================================================
// CANCELLATION
// ============================================================================

#[tokio::test]
async fn test_batch_local_cancel_is_contained() {
    let pull = Arc::new(ScriptedPull::default().with("B", PullScript::CancelBatch));
    let destination = Arc::new(MemoryDestination::default());
    let strategy = Arc::new(ItemPublishStrategy::<DataSources>::new(destination.clone()));

    for (kind, migrator) in migrators(preparer(pull.clone()), strategy) {
        let caller = CancellationToken::new();
        let input = items(&["A", "B", "C"]);

        let result = migrator.migrate_batch(input.clone(), &caller).await.unwrap();

        assert!(!caller.is_cancelled(), "{kind}");
        assert_eq!(
            statuses(&input).await,
            vec![
                MigrationStatus::Migrated,
                MigrationStatus::Canceled,
                MigrationStatus::Canceled
            ],
            "{kind}"
        );
        assert_eq!(result.item_results.len(), 3, "{kind}");
        assert!(result.perform_next_batch, "{kind}");
    }
}

#[tokio::test]
async fn test_caller_cancel_escapes_batch_call() {
    for parallel in [false, true] {
        let caller = CancellationToken::new();
        let pull = Arc::new(
            ScriptedPull::default().with("B", PullScript::CancelCaller(caller.clone())),
        );
        let strategy = Arc::new(ItemPublishStrategy::<DataSources>::new(Arc::new(
            MemoryDestination::default(),
        )));
        let (kind, migrator) = migrators(preparer(pull.clone()), strategy)
            .into_iter()
            .nth(usize::from(parallel))
            .unwrap();
        let input = items(&["A", "B", "C"]);

        let err = migrator
            .migrate_batch(input.clone(), &caller)
            .await
            .unwrap_err();

        assert_eq!(err, Error::Canceled, "{kind}");
        let statuses = statuses(&input).await;
        assert_eq!(statuses[0], MigrationStatus::Migrated, "{kind}");
        assert_eq!(statuses[1], MigrationStatus::Canceled, "{kind}");
        assert_eq!(statuses[2], MigrationStatus::Canceled, "{kind}");
        // C was never pulled.
        assert_eq!(*pull.pulled.lock().unwrap(), vec!["A", "B"], "{kind}");
    }
}

#[tokio::test]
async fn test_caller_cancel_escapes_even_when_item_also_failed() {
    for parallel in [false, true] {
        let caller = CancellationToken::new();
        let preparer = Arc::new(
            ItemPreparer::<DataSources>::builder(Arc::new(ScriptedPull::default()), converter())
                .with_transform(Arc::new(CancelCallerTransform(caller.clone())))
                .with_finalizer(Arc::new(FailingFinalize))
                .build(),
        );
        let strategy = Arc::new(ItemPublishStrategy::<DataSources>::new(Arc::new(
            MemoryDestination::default(),
        )));
        let (kind, migrator) = migrators(preparer, strategy)
            .into_iter()
            .nth(usize::from(parallel))
            .unwrap();
        let input = items(&["A", "B"]);

        let err = migrator
            .migrate_batch(input.clone(), &caller)
            .await
            .unwrap_err();

        assert_eq!(err, Error::Canceled, "{kind}");
        // The real failure is kept; the observed cancellation is not an error.
        let first = input[0].entry().snapshot().await;
        assert_eq!(first.status(), MigrationStatus::Error, "{kind}");
        assert_eq!(first.errors(), [Error::Finalize("e2".into())], "{kind}");
        assert_eq!(
            input[1].entry().status().await,
            MigrationStatus::Canceled,
            "{kind}"
        );
    }
}

#[tokio::test]
async fn test_parallel_batch_cancel_reaches_items_waiting_for_permits() {
    let pull = Arc::new(
        ScriptedPull::default()
            .with("A", PullScript::AwaitCancel)
            .with("B", PullScript::AwaitCancel)
            .with("C", PullScript::CancelBatch),
    );
    let destination = Arc::new(MemoryDestination::default());
    let migrator = ParallelBatchMigrator::new(
        preparer(pull.clone()),
        Arc::new(ItemPublishStrategy::<DataSources>::new(destination.clone())),
        Arc::new(EngineConfig::default().with_max_parallelism(3)),
    );
    let caller = CancellationToken::new();
    let input = items(&["A", "B", "C", "D", "E", "F"]);

    let result = tokio::time::timeout(
        std::time::Duration::from_secs(5),
        migrator.migrate_batch(input.clone(), &caller),
    )
    .await
    .expect("batch did not finish")
    .unwrap();

    assert!(!caller.is_cancelled());
    assert!(result.perform_next_batch);
    assert_eq!(result.item_results.len(), input.len());
    for (item, item_result) in input.iter().zip(&result.item_results) {
        assert_eq!(&item_result.source, item.reference());
        assert_eq!(item_result.status, MigrationStatus::Canceled);
        assert!(item_result.errors.is_empty());
    }

    // A and B held permits while C canceled the batch; D to F never ran.
    let mut pulled = pull.pulled.lock().unwrap().clone();
    pulled.sort();
    assert_eq!(pulled, vec!["A", "B", "C"]);
    assert!(destination.published.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_already_canceled_caller_raises_without_work() {
    let pull = Arc::new(ScriptedPull::default());
    let strategy = Arc::new(ItemPublishStrategy::<DataSources>::new(Arc::new(
        MemoryDestination::default(),
    )));

    for (kind, migrator) in migrators(preparer(pull.clone()), strategy) {
        let caller = CancellationToken::new();
        caller.cancel();
        let input = items(&["A", "B"]);

        let err = migrator.migrate_batch(input.clone(), &caller).await.unwrap_err();

        assert_eq!(err, Error::Canceled, "{kind}");
        assert_eq!(
            statuses(&input).await,
            vec![MigrationStatus::Canceled, MigrationStatus::Canceled],
            "{kind}"
        );
    }
    assert!(pull.pulled.lock().unwrap().is_empty());
}

// ============================================================================
// MAPPING
// ============================================================================

#[tokio::test]
async fn test_reparented_item_resolves_container_by_mapped_location() {
    let target = ContentReference::new(Uuid::new_v4(), "b", location(&["A", "B"]));
    let finder = Arc::new(ProjectFinder {
        projects: vec![target.clone()],
        ..Default::default()
    });
    let preparer = Arc::new(
        ItemPreparer::<DataSources>::builder(Arc::new(ScriptedPull::default()), converter())
            .with_mapping(MappingStage::new(finder.clone()))
            .build(),
    );
    let destination = Arc::new(MemoryDestination::default());
    let migrator = SequentialBatchMigrator::new(
        preparer,
        Arc::new(ItemPublishStrategy::<DataSources>::new(destination.clone())),
    );

    let reference = ContentReference::new(Uuid::new_v4(), "sales", location(&["A", "C", "Sales"]));
    let source = SourceDataSource {
        reference: reference.clone(),
        project: Some(ContentReference::new(Uuid::new_v4(), "c", location(&["A", "C"]))),
    };
    let moved = MigrationItem::<DataSources>::new(
        Arc::new(source.clone()),
        ManifestEntryHandle::new(ManifestEntry::new(
            reference.clone(),
            location(&["A", "B", "Sales"]),
        )),
    );

    let result = migrator
        .migrate_batch(vec![moved], &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.item_results[0].status, MigrationStatus::Migrated);
    assert_eq!(*finder.lookups.lock().unwrap(), vec![location(&["A", "B"])]);
    assert_eq!(
        *destination.published.lock().unwrap(),
        vec![location(&["A", "B", "Sales"])]
    );

    // Same mapping with no matching project is a hard failure.
    let empty_finder = Arc::new(ProjectFinder::default());
    let failing = SequentialBatchMigrator::new(
        Arc::new(
            ItemPreparer::<DataSources>::builder(Arc::new(ScriptedPull::default()), converter())
                .with_mapping(MappingStage::new(empty_finder))
                .build(),
        ),
        Arc::new(ItemPublishStrategy::<DataSources>::new(destination.clone())),
    );
    let retry = MigrationItem::<DataSources>::new(
        Arc::new(source),
        ManifestEntryHandle::new(ManifestEntry::new(reference, location(&["A", "B", "Sales"]))),
    );
    let result = failing
        .migrate_batch(vec![retry], &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(result.item_results[0].status, MigrationStatus::Error);
    assert!(matches!(
        result.item_results[0].errors[0],
        Error::MappingResolution { .. }
    ));
}

// ============================================================================
// PUBLISH STRATEGIES
// ============================================================================

#[tokio::test]
async fn test_item_publish_sets_destination_before_migrated() {
    let observer = Arc::new(EntryObserver::default());
    let strategy = Arc::new(
        ItemPublishStrategy::<DataSources>::new(Arc::new(MemoryDestination::default()))
            .with_hook(observer.clone()),
    );

    for (kind, migrator) in migrators(preparer(Arc::new(ScriptedPull::default())), strategy) {
        let input = items(&["Orders"]);
        migrator
            .migrate_batch(input.clone(), &CancellationToken::new())
            .await
            .unwrap();

        let entry = input[0].entry().snapshot().await;
        assert_eq!(entry.status(), MigrationStatus::Migrated, "{kind}");
        assert_eq!(
            entry.destination().map(|d| d.location.clone()),
            Some(location(&["Orders"])),
            "{kind}"
        );
        // A second destination for the same attempt is rejected.
        let other = ContentReference::new(Uuid::new_v4(), "other", location(&["Other"]));
        assert!(!input[0].entry().destination_found(other).await, "{kind}");
    }

    // Hooks run on a pending entry; the destination is recorded only once
    // they all succeeded.
    assert_eq!(
        *observer.seen.lock().unwrap(),
        vec![(MigrationStatus::Pending, false), (MigrationStatus::Pending, false)]
    );
}

#[tokio::test]
async fn test_bulk_publish_success_marks_all_migrated() {
    let destination = Arc::new(MemoryDestination::default());
    let strategy = Arc::new(BulkPublishStrategy::<DataSources>::new(destination.clone()));

    for (kind, migrator) in migrators(preparer(Arc::new(ScriptedPull::default())), strategy) {
        let input = items(&["A", "B", "C"]);
        let result = migrator
            .migrate_batch(input.clone(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.count(MigrationStatus::Migrated), 3, "{kind}");
    }
    // One bulk call per batch.
    assert_eq!(*destination.batch_calls.lock().unwrap(), 2);
}

#[tokio::test]
async fn test_bulk_publish_failure_shares_error_set() {
    let shared = vec![Error::Publish("payload too large".into())];
    let destination = Arc::new(MemoryDestination {
        fail_batch_with: Some(shared.clone()),
        ..Default::default()
    });
    let strategy = Arc::new(BulkPublishStrategy::<DataSources>::new(destination));

    for (kind, migrator) in migrators(preparer(Arc::new(ScriptedPull::default())), strategy) {
        let input = items(&["A", "B", "C"]);
        let result = migrator
            .migrate_batch(input.clone(), &CancellationToken::new())
            .await
            .unwrap();

        for r in &result.item_results {
            assert_eq!(r.status, MigrationStatus::Error, "{kind}");
            assert_eq!(r.errors, shared, "{kind}");
        }
    }
}

#[tokio::test]
async fn test_bulk_publish_skips_items_that_failed_preparation() {
    let pull = Arc::new(ScriptedPull::default().with(
        "B",
        PullScript::Fail(vec![Error::Pull("404".into())]),
    ));
    let destination = Arc::new(MemoryDestination::default());
    let strategy = Arc::new(BulkPublishStrategy::<DataSources>::new(destination.clone()));

    for (kind, migrator) in migrators(preparer(pull.clone()), strategy) {
        let input = items(&["A", "B", "C"]);
        migrator
            .migrate_batch(input.clone(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(
            statuses(&input).await,
            vec![
                MigrationStatus::Migrated,
                MigrationStatus::Error,
                MigrationStatus::Migrated
            ],
            "{kind}"
        );
    }
    assert_eq!(destination.published.lock().unwrap().len(), 4);
}
