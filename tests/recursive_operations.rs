//! Recursive delete / publish / unpublish / translate, end to end over the
//! in-memory adapters.

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use item_hierarchy::memory::{
    ContentOp, InMemoryContentOperations, InMemoryItemStore, LockEvent, RecordingLockCoordinator,
};
use item_hierarchy::ports::{ContentOperations, ItemResult, LockCoordinator};
use item_hierarchy::recursive::PublicationSummary;
use item_hierarchy::types::{Collection, CollectionElement, CollectionTitle, LockHolder, Ownership};
use item_hierarchy::{
    HierarchyConfig, HierarchyService, ItemId, ItemKind, ItemOperationError, RecursiveAction,
    RecursiveErrorKind,
};

use common::{docs, Fixture, ACCOUNT, USER};

// ── Fixtures ──────────────────────────────────────────────────

/// root ── box ── d1, sub ── d2
async fn small_tree() -> Fixture {
    let fx = Fixture::new().await;
    fx.root("root", &[CollectionElement::collection("box")]).await;
    fx.collection(
        "box",
        &[CollectionElement::document("d1"), CollectionElement::collection("sub")],
    )
    .await;
    fx.collection("sub", &docs(&["d2"])).await;
    fx.document("d1", "First").await;
    fx.document("d2", "Second").await;
    fx
}

fn numbered(prefix: &str, n: usize) -> Vec<String> {
    (1..=n).map(|i| format!("{prefix}{i:02}")).collect()
}

fn elements(ids: &[String]) -> Vec<CollectionElement> {
    ids.iter().map(|id| CollectionElement::document(id.as_str())).collect()
}

/// Lock coordinator that takes the item store down as soon as the lock is
/// broadcast, so that everything after acquisition fails.
struct SabotagingLocks {
    items: Arc<InMemoryItemStore>,
    recorder: RecordingLockCoordinator,
}

#[async_trait]
impl LockCoordinator for SabotagingLocks {
    async fn lock(
        &self,
        account_id: &str,
        item_id: &ItemId,
        holder: &LockHolder,
    ) -> item_hierarchy::Result<()> {
        self.items.set_unavailable(true);
        self.recorder.lock(account_id, item_id, holder).await
    }

    async fn release(
        &self,
        account_id: &str,
        item_id: &ItemId,
        holder: &LockHolder,
    ) -> item_hierarchy::Result<()> {
        self.recorder.release(account_id, item_id, holder).await
    }
}

/// Content operations whose `publish` never returns or panics; every other
/// operation goes to the in-memory adapter.
struct BrokenPublish {
    inner: Arc<InMemoryContentOperations>,
    panics: bool,
}

#[async_trait]
impl ContentOperations for BrokenPublish {
    async fn delete_document(
        &self,
        account_id: &str,
        document_id: &ItemId,
        user_id: &str,
    ) -> ItemResult<()> {
        self.inner.delete_document(account_id, document_id, user_id).await
    }

    async fn delete_collection(
        &self,
        account_id: &str,
        collection_id: &ItemId,
        user_id: &str,
    ) -> ItemResult<()> {
        self.inner.delete_collection(account_id, collection_id, user_id).await
    }

    async fn publish(
        &self,
        document_id: &ItemId,
        _language_code: &str,
        _user_id: &str,
    ) -> ItemResult<PublicationSummary> {
        if self.panics {
            panic!("publication backend crashed on {document_id}");
        }
        std::future::pending().await
    }

    async fn unpublish(
        &self,
        document_id: &ItemId,
        language_codes: &[String],
        user_id: &str,
    ) -> ItemResult<Vec<PublicationSummary>> {
        self.inner.unpublish(document_id, language_codes, user_id).await
    }

    async fn translate_document(
        &self,
        account_id: &str,
        document_id: &ItemId,
        target_language: &str,
        user_id: &str,
    ) -> ItemResult<()> {
        self.inner
            .translate_document(account_id, document_id, target_language, user_id)
            .await
    }

    async fn translate_collection(
        &self,
        collection_id: &ItemId,
        target_language: &str,
    ) -> ItemResult<()> {
        self.inner.translate_collection(collection_id, target_language).await
    }
}

fn with_broken_publish(fx: &Fixture, panics: bool) -> HierarchyService {
    let mut ports = fx.ports();
    ports.content = Arc::new(BrokenPublish {
        inner: fx.content.clone(),
        panics,
    });
    HierarchyService::new(ports, HierarchyConfig::default())
}

// ── Delete ────────────────────────────────────────────────────

#[tokio::test]
async fn delete_removes_documents_then_collections_deepest_first() {
    let fx = small_tree().await;
    let service = fx.service();

    let result = service
        .recursive_delete(&"box".into(), ACCOUNT, Some(USER))
        .await
        .unwrap();

    assert!(result.is_complete_success(), "{:?}", result.errors);
    let deleted: Vec<_> = result.results.iter().map(|r| r.document_id.as_str()).collect();
    assert_eq!(deleted, vec!["d1", "d2"]);
    assert_eq!(result.total_items_in_subtree, 2);

    for id in ["box", "sub"] {
        assert!(fx.items.collection(&id.into()).await.unwrap().deleted);
    }
    assert!(fx.items.collection(&"root".into()).await.unwrap().elements.is_empty());
}

#[tokio::test]
async fn delete_with_a_published_document_is_refused_untouched() {
    let fx = small_tree().await;
    fx.publications.activate(&"d2".into(), "en").await;
    let service = fx.service();

    let result = service
        .recursive_delete(&"box".into(), ACCOUNT, Some(USER))
        .await
        .unwrap();

    assert!(result.results.is_empty());
    assert_eq!(result.errors.len(), 1);
    let error = &result.errors[0];
    assert_eq!(error.error, RecursiveErrorKind::ActivePublicationsExists);
    assert_eq!(error.item_id, ItemId::from("d2"));
    assert_eq!(error.item_title.as_deref(), Some("Second"));

    assert!(!fx.items.document(&"d1".into()).await.unwrap().deleted);
    assert!(!fx.items.document(&"d2".into()).await.unwrap().deleted);
    assert_eq!(fx.locks.lock_count(), 0);
    assert_eq!(fx.locks.release_count(), 0);
}

#[tokio::test]
async fn failed_document_delete_leaves_its_collections_in_place() {
    let fx = small_tree().await;
    fx.content.fail_on(ContentOp::DeleteDocument, "d2", || {
        ItemOperationError::BinderHasPublications
    });
    let service = fx.service();

    let result = service
        .recursive_delete(&"box".into(), ACCOUNT, Some(USER))
        .await
        .unwrap();

    assert_eq!(result.results.len(), 1);
    let kinds: Vec<_> = result
        .errors
        .iter()
        .map(|e| (e.item_id.as_str(), e.error, e.is_binder))
        .collect();
    assert_eq!(
        kinds,
        vec![
            ("d2", RecursiveErrorKind::BinderHasPublications, true),
            ("sub", RecursiveErrorKind::CollectionNotEmpty, false),
            ("box", RecursiveErrorKind::CollectionNotEmpty, false),
        ]
    );
    assert_eq!(result.errors[0].item_title.as_deref(), Some("Second"));
    assert_eq!(result.errors[1].item_title.as_deref(), Some("sub"));
    assert!(!fx.items.collection(&"sub".into()).await.unwrap().deleted);
}

#[tokio::test]
async fn instances_block_delete() {
    let fx = small_tree().await;
    fx.collection("elsewhere", &docs(&["d1"])).await;
    let service = fx.service();

    let result = service
        .recursive_delete(&"box".into(), ACCOUNT, Some(USER))
        .await
        .unwrap();

    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].error, RecursiveErrorKind::InstancesExist);
    assert_eq!(result.errors[0].item_title.as_deref(), Some("First"));
    assert!(!fx.items.document(&"d1".into()).await.unwrap().deleted);
}

// ── Publish / unpublish ───────────────────────────────────────

#[tokio::test]
async fn publish_reports_partial_success() {
    let fx = Fixture::new().await;
    fx.root("root", &[CollectionElement::collection("box")]).await;
    fx.collection("box", &docs(&["d1", "d2", "d3"])).await;
    fx.document("d1", "One").await;
    fx.items.put_document_titled("d2", ACCOUNT, "en", "").await;
    fx.document("d3", "Three").await;
    let service = fx.service();

    let result = service
        .recursive_publish(&"box".into(), &["en".into()], ACCOUNT, Some(USER), false)
        .await
        .unwrap();

    let published: Vec<_> = result.results.iter().map(|p| p.document_id.as_str()).collect();
    assert_eq!(published, vec!["d1", "d3"]);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].error, RecursiveErrorKind::MissingTitle);
    assert_eq!(result.errors[0].item_id, ItemId::from("d2"));
    assert_eq!(result.errors[0].language_code.as_deref(), Some("en"));
    assert_eq!(result.total_items_in_subtree, 3);
}

#[tokio::test]
async fn publishing_the_undefined_language_is_skipped_silently() {
    let fx = small_tree().await;
    let service = fx.service();

    let result = service
        .recursive_publish(
            &"box".into(),
            &["en".into(), "xx".into()],
            ACCOUNT,
            Some(USER),
            false,
        )
        .await
        .unwrap();

    assert!(result.is_complete_success(), "{:?}", result.errors);
    assert_eq!(result.results.len(), 2);
}

#[tokio::test]
async fn publish_proceeds_despite_instances() {
    let fx = small_tree().await;
    fx.collection("elsewhere", &docs(&["d1"])).await;
    let service = fx.service();

    let validation = service
        .validate_recursive_action(&"box".into(), RecursiveAction::Publish)
        .await
        .unwrap();
    assert!(validation.valid);
    assert_eq!(validation.warnings.len(), 1);

    let result = service
        .recursive_publish(&"box".into(), &["en".into()], ACCOUNT, Some(USER), false)
        .await
        .unwrap();
    assert_eq!(result.results.len(), 2);
}

#[tokio::test]
async fn unpublish_reports_languages_no_longer_published() {
    let fx = small_tree().await;
    fx.publications.activate(&"d1".into(), "en").await;
    let service = fx.service();

    let result = service
        .recursive_unpublish(&"box".into(), &["en".into()], ACCOUNT, Some(USER), false)
        .await
        .unwrap();

    assert_eq!(result.results.len(), 1);
    assert_eq!(result.results[0].document_id, ItemId::from("d1"));
    assert_eq!(result.results[0].language_code, "en");
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].item_id, ItemId::from("d2"));
    assert_eq!(result.errors[0].error, RecursiveErrorKind::NothingToUnpublish);
    assert!(fx.publications.active_for(&"d1".into()).await.is_empty());
}

// ── Translate ─────────────────────────────────────────────────

#[tokio::test]
async fn translate_runs_in_batches_and_isolates_failures() {
    let fx = Fixture::new().await;
    let documents = numbered("d", 15);
    fx.root("root", &[CollectionElement::collection("box")]).await;
    fx.collection("box", &elements(&documents)).await;
    fx.documents(&documents).await;
    fx.content.fail_on(ContentOp::TranslateDocument, "d03", || {
        ItemOperationError::CognitiveApiTimeout
    });
    let service = fx.service();

    let result = service
        .recursive_translate(&"box".into(), "nl", ACCOUNT, Some(USER))
        .await
        .unwrap();

    assert_eq!(fx.content.peak_concurrent_translations(), 10);
    assert_eq!(result.total_items_in_subtree, 16);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].item_id, ItemId::from("d03"));
    assert_eq!(result.errors[0].error, RecursiveErrorKind::CognitiveApiTimeout);
    assert_eq!(result.errors[0].language_code.as_deref(), Some("nl"));

    let translated: Vec<_> = result
        .results
        .iter()
        .filter(|t| t.kind == ItemKind::Document)
        .map(|t| t.item_id.as_str().to_owned())
        .collect();
    let expected: Vec<_> = documents.iter().filter(|d| *d != "d03").cloned().collect();
    assert_eq!(translated, expected);
    for id in &expected {
        assert!(fx.items.document(&id.as_str().into()).await.unwrap().has_language("nl"));
    }
    assert!(fx
        .items
        .collection(&"box".into())
        .await
        .unwrap()
        .titles
        .iter()
        .any(|t| t.language_code == "nl"));
}

#[tokio::test]
async fn translate_batch_size_comes_from_config() {
    let fx = Fixture::new().await;
    let documents = numbered("d", 7);
    fx.root("root", &[CollectionElement::collection("box")]).await;
    fx.collection("box", &elements(&documents)).await;
    fx.documents(&documents).await;
    let service = fx.service_with(HierarchyConfig::default().with_translate_batch_size(3));

    let result = service
        .recursive_translate(&"box".into(), "de", ACCOUNT, Some(USER))
        .await
        .unwrap();

    assert!(result.is_complete_success());
    assert_eq!(fx.content.peak_concurrent_translations(), 3);
}

#[tokio::test]
async fn collections_without_master_language_are_reported() {
    let fx = small_tree().await;
    fx.items
        .put_collection(Collection {
            id: "sub".into(),
            account_id: ACCOUNT.into(),
            titles: vec![CollectionTitle {
                language_code: "xx".into(),
                title: "Untitled".into(),
            }],
            elements: docs(&["d2"]),
            is_root_collection: false,
            is_hidden: false,
            show_in_overview: true,
            ownership: Ownership::Inherited,
            deleted: false,
        })
        .await;
    let service = fx.service();

    let result = service
        .recursive_translate(&"box".into(), "fr", ACCOUNT, Some(USER))
        .await
        .unwrap();

    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].error, RecursiveErrorKind::MasterLanguageNotSet);
    assert_eq!(result.errors[0].item_id, ItemId::from("sub"));
    assert_eq!(result.errors[0].item_title.as_deref(), Some("Untitled"));
    // box plus both documents
    assert_eq!(result.results.len(), 3);
    assert_eq!(result.total_items_in_subtree, 4);
}

#[tokio::test]
async fn collections_missing_from_the_store_are_reported() {
    let fx = Fixture::new().await;
    fx.root("root", &[CollectionElement::collection("box")]).await;
    fx.collection(
        "box",
        &[CollectionElement::document("d1"), CollectionElement::collection("ghost")],
    )
    .await;
    fx.document("d1", "First").await;
    let service = fx.service();

    let result = service
        .recursive_translate(&"box".into(), "fr", ACCOUNT, Some(USER))
        .await
        .unwrap();

    assert_eq!(result.total_items_in_subtree, 3);
    let translated: Vec<&ItemId> = result.results.iter().map(|r| &r.item_id).collect();
    assert_eq!(translated, [&ItemId::from("box"), &ItemId::from("d1")]);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].item_id, ItemId::from("ghost"));
    assert_eq!(result.errors[0].error, RecursiveErrorKind::UnknownError);
    assert!(!result.errors[0].is_binder);
    assert_eq!(
        result.results.len() + result.errors.len(),
        result.total_items_in_subtree
    );
}

// ── Protocol ──────────────────────────────────────────────────

#[tokio::test]
async fn lock_is_taken_and_released_once_around_the_work() {
    let fx = small_tree().await;
    let service = fx.service();

    service
        .recursive_publish(&"box".into(), &["en".into()], ACCOUNT, Some(USER), false)
        .await
        .unwrap();

    let events = fx.locks.events();
    assert_eq!(events.len(), 2);
    match (&events[0], &events[1]) {
        (
            LockEvent::Locked { item_id, holder },
            LockEvent::Released {
                item_id: released,
                holder: release_holder,
            },
        ) => {
            assert_eq!(item_id, &ItemId::from("box"));
            assert_eq!(released, item_id);
            assert_eq!(holder.login, "ann");
            assert_eq!(holder, release_holder);
        }
        other => panic!("unexpected lock events: {other:?}"),
    }
}

#[tokio::test]
async fn backend_callers_lock_as_backend() {
    let fx = small_tree().await;
    let service = fx.service();

    service
        .recursive_unpublish(&"box".into(), &["en".into()], ACCOUNT, Some("svc"), true)
        .await
        .unwrap();

    match &fx.locks.events()[0] {
        LockEvent::Locked { holder, .. } => assert_eq!(holder, &LockHolder::backend()),
        other => panic!("unexpected lock event: {other:?}"),
    }
}

#[tokio::test]
async fn unknown_users_lock_under_their_id() {
    let fx = small_tree().await;
    let service = fx.service();

    service
        .recursive_publish(&"box".into(), &["en".into()], ACCOUNT, Some("uid-ghost"), false)
        .await
        .unwrap();

    match &fx.locks.events()[0] {
        LockEvent::Locked { holder, .. } => assert_eq!(holder.user_id, "uid-ghost"),
        other => panic!("unexpected lock event: {other:?}"),
    }
}

#[tokio::test]
async fn missing_user_is_unauthorized() {
    let fx = small_tree().await;
    let service = fx.service();

    for user in [None, Some("")] {
        let err = service
            .recursive_delete(&"box".into(), ACCOUNT, user)
            .await
            .unwrap_err();
        assert_eq!(err.http_status(), 403);
    }
    assert!(fx.locks.events().is_empty());
    assert!(!fx.items.document(&"d1".into()).await.unwrap().deleted);
}

#[tokio::test]
async fn validation_failure_takes_no_lock() {
    let fx = small_tree().await;
    let service = fx.service_with(HierarchyConfig::default().with_max_items(1));

    let result = service
        .recursive_translate(&"box".into(), "nl", ACCOUNT, Some(USER))
        .await
        .unwrap();

    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].error, RecursiveErrorKind::ExceededMaxNumber);
    assert_eq!(result.errors[0].item_id, ItemId::from("box"));
    assert!(fx.locks.events().is_empty());
}

#[tokio::test]
async fn root_collections_are_protected() {
    let fx = small_tree().await;
    let service = fx.service();

    let result = service
        .recursive_delete(&"root".into(), ACCOUNT, Some(USER))
        .await
        .unwrap();

    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].error, RecursiveErrorKind::GivenIdIsRootCollection);
    assert!(fx.locks.events().is_empty());
}

#[tokio::test]
async fn lock_is_released_when_the_work_fails_after_acquisition() {
    let fx = small_tree().await;
    let locks = Arc::new(SabotagingLocks {
        items: fx.items.clone(),
        recorder: RecordingLockCoordinator::new(),
    });
    let service = HierarchyService::new(
        fx.ports_with_locks(locks.clone()),
        HierarchyConfig::default(),
    );

    let err = service
        .recursive_delete(&"box".into(), ACCOUNT, Some(USER))
        .await
        .unwrap_err();

    assert_eq!(err.http_status(), 500);
    assert_eq!(locks.recorder.lock_count(), 1);
    assert_eq!(locks.recorder.release_count(), 1);
}

#[tokio::test]
async fn lock_broadcast_failures_do_not_abort_the_operation() {
    let fx = small_tree().await;
    fx.locks.set_failing(true);
    let service = fx.service();

    let result = service
        .recursive_publish(&"box".into(), &["en".into()], ACCOUNT, Some(USER), false)
        .await
        .unwrap();

    assert_eq!(result.results.len(), 2);
    assert_eq!(fx.locks.lock_count(), 1);
    assert_eq!(fx.locks.release_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn abandoned_operation_still_releases_its_lock() {
    let fx = small_tree().await;
    let service = with_broken_publish(&fx, false);

    let outcome = tokio::time::timeout(
        Duration::from_millis(50),
        service.recursive_publish(&"box".into(), &["en".into()], ACCOUNT, Some(USER), false),
    )
    .await;
    assert!(outcome.is_err(), "publish should still be hanging");

    // The release is broadcast from a spawned task.
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(fx.locks.lock_count(), 1);
    assert_eq!(fx.locks.release_count(), 1);
}

#[tokio::test]
async fn panicking_operation_is_internal_and_releases_its_lock() {
    let fx = small_tree().await;
    let service = with_broken_publish(&fx, true);

    let err = service
        .recursive_publish(&"box".into(), &["en".into()], ACCOUNT, Some(USER), false)
        .await
        .unwrap_err();

    assert_eq!(err.http_status(), 500);
    assert!(err.to_string().contains("panicked"), "{err}");
    assert_eq!(fx.locks.lock_count(), 1);
    assert_eq!(fx.locks.release_count(), 1);
}
