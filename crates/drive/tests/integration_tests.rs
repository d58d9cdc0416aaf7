//! Integration tests for the drive crate
//!
//! These tests drive complete sync runs against an in-memory Drive.

use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use drive::{
    AuthorizedUserCredentials, DocSync, DocumentBatches, DocumentId, DocumentSource,
    DriveConfig, DriveCredentials, ExternalAccess, Permission, PermissionCache, PermissionFetch,
    PermissionId, PermissionSource, RunState, SlimDocument, SyncCallback, SyncError, SyncScope,
    SyncState, PROGRESS_LABEL, doc_sync,
};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

/// In-memory Drive with fixed listing pages and per-document permission lists
#[derive(Default)]
struct InMemoryDrive {
    pages: Vec<Vec<SlimDocument>>,
    permissions: HashMap<String, PermissionFetch>,
    fail_listing_after: Option<usize>,
    fail_connect: bool,
    fetch_log: Mutex<Vec<(String, String)>>,
    windows: Mutex<Vec<(DateTime<Utc>, DateTime<Utc>)>>,
}

impl InMemoryDrive {
    fn new(pages: Vec<Vec<SlimDocument>>) -> Self {
        Self {
            pages,
            ..Default::default()
        }
    }

    fn with_permissions(mut self, doc_id: &str, fetch: PermissionFetch) -> Self {
        self.permissions.insert(doc_id.to_string(), fetch);
        self
    }

    fn fetched(&self) -> Vec<(String, String)> {
        self.fetch_log.lock().unwrap().clone()
    }
}

impl DocumentSource for InMemoryDrive {
    fn connect(&self) -> Result<()> {
        if self.fail_connect {
            anyhow::bail!("invalid_grant");
        }
        Ok(())
    }

    fn list_changed(&self, since: DateTime<Utc>, until: DateTime<Utc>) -> Result<DocumentBatches> {
        self.windows.lock().unwrap().push((since, until));

        let mut pages: Vec<Result<Vec<SlimDocument>>> = self.pages.iter().cloned().map(Ok).collect();
        if let Some(n) = self.fail_listing_after {
            pages.truncate(n);
            pages.push(Err(anyhow::anyhow!("HTTP 500 listing files")));
        }
        Ok(Box::new(pages.into_iter()))
    }
}

impl PermissionSource for InMemoryDrive {
    fn list_permissions(&self, doc_id: &DocumentId, acting_identity: &str) -> Result<PermissionFetch> {
        self.fetch_log
            .lock()
            .unwrap()
            .push((doc_id.as_str().to_string(), acting_identity.to_string()));

        match self.permissions.get(doc_id.as_str()) {
            Some(fetch) => Ok(fetch.clone()),
            None => Err(anyhow::anyhow!("connection reset")),
        }
    }
}

/// Records progress and requests a stop after `limit` documents
struct RecordingCallback {
    limit: Option<usize>,
    reported: Cell<usize>,
    labels: RefCell<BTreeSet<String>>,
}

impl RecordingCallback {
    fn new() -> Self {
        Self {
            limit: None,
            reported: Cell::new(0),
            labels: RefCell::new(BTreeSet::new()),
        }
    }

    fn stop_after(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::new()
        }
    }
}

impl SyncCallback for RecordingCallback {
    fn should_stop(&self) -> bool {
        self.limit.is_some_and(|limit| self.reported.get() >= limit)
    }

    fn progress(&self, label: &str, count: usize) {
        self.labels.borrow_mut().insert(label.to_string());
        self.reported.set(self.reported.get() + count);
    }
}

fn scope(company_domain: Option<&str>) -> SyncScope {
    let mut config = DriveConfig::new("admin@corp.com");
    config.company_domain = company_domain.map(str::to_string);

    SyncScope::new(
        config,
        DriveCredentials::AuthorizedUser(AuthorizedUserCredentials {
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            refresh_token: "refresh".to_string(),
        }),
    )
}

fn emails(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn collect(sync: &mut DocSync<'_, &InMemoryDrive>) -> Vec<(String, ExternalAccess)> {
    sync.by_ref()
        .map(|r| {
            let record = r.unwrap();
            (record.doc_id.as_str().to_string(), record.external_access)
        })
        .collect()
}

#[test]
fn test_mixed_batch_sync() {
    let drive = InMemoryDrive::new(vec![vec![
        SlimDocument::embedded("d1", vec![Permission::anyone("p0")]),
        SlimDocument::referenced("d2", ["p1"], Some("a@x.com")),
        SlimDocument::referenced("d3", ["p9"], Some("a@x.com")),
    ]])
    .with_permissions(
        "d2",
        PermissionFetch::Found(vec![Some(Permission::user("p1", "u@x.com"))]),
    )
    .with_permissions("d3", PermissionFetch::NotFound);

    let cache = Arc::new(PermissionCache::new());
    let mut sync = doc_sync(&drive, &scope(None), cache.clone(), None).unwrap();
    let records = collect(&mut sync);

    assert_eq!(records.len(), 3);

    // Public via anyone grant
    assert_eq!(records[0].0, "d1");
    assert!(records[0].1.is_public);
    assert!(records[0].1.external_user_emails.is_empty());

    // Fetched as the owner and cached
    assert_eq!(records[1].0, "d2");
    assert_eq!(records[1].1.external_user_emails, emails(&["u@x.com"]));
    assert!(!records[1].1.is_public);
    assert!(cache.contains(&PermissionId::new("p1")));

    // Deleted document degrades to private, run continues
    assert_eq!(records[2].0, "d3");
    assert!(records[2].1.grants_nothing());

    assert_eq!(sync.state(), RunState::Done);
    assert_eq!(
        drive.fetched(),
        vec![
            ("d2".to_string(), "a@x.com".to_string()),
            ("d3".to_string(), "a@x.com".to_string()),
        ]
    );

    let stats = sync.stats();
    assert_eq!(stats.documents, 3);
    assert_eq!(stats.embedded, 1);
    assert_eq!(stats.fetches, 2);
    assert_eq!(stats.private_fallbacks, 1);
}

#[test]
fn test_cache_shared_across_runs() {
    let drive = InMemoryDrive::new(vec![vec![
        SlimDocument::referenced("d1", ["p1", "p2"], Some("owner@x.com")),
    ]])
    .with_permissions(
        "d1",
        PermissionFetch::Found(vec![
            Some(Permission::user("p1", "u@x.com")),
            Some(Permission::group("p2", "eng@x.com")),
        ]),
    );
    let cache = Arc::new(PermissionCache::new());

    let first = collect(&mut doc_sync(&drive, &scope(None), cache.clone(), None).unwrap());
    let second = collect(&mut doc_sync(&drive, &scope(None), cache.clone(), None).unwrap());

    assert_eq!(first, second);
    assert_eq!(first[0].1.external_user_group_ids, emails(&["eng@x.com"]));
    // Only the first run went to the source
    assert_eq!(drive.fetched().len(), 1);
    assert_eq!(cache.len(), 2);
}

#[test]
fn test_documents_sharing_permission_ids() {
    let drive = InMemoryDrive::new(vec![
        vec![SlimDocument::referenced("d1", ["p1"], None)],
        vec![
            SlimDocument::referenced("d2", ["p1"], None),
            SlimDocument::referenced("d3", ["p1", "p2"], None),
        ],
    ])
    .with_permissions(
        "d1",
        PermissionFetch::Found(vec![Some(Permission::user("p1", "u@x.com"))]),
    )
    .with_permissions(
        "d3",
        PermissionFetch::Found(vec![
            Some(Permission::user("p1", "u@x.com")),
            Some(Permission::anyone("p2")),
        ]),
    );

    let mut sync = doc_sync(&drive, &scope(None), Arc::new(PermissionCache::new()), None).unwrap();
    let records = collect(&mut sync);

    assert_eq!(records[1].1.external_user_emails, emails(&["u@x.com"]));
    assert!(records[2].1.is_public);

    // d2 was served from cache; d3 had a miss so its full list was fetched,
    // acting as the primary admin since no owner is known
    assert_eq!(
        drive.fetched(),
        vec![
            ("d1".to_string(), "admin@corp.com".to_string()),
            ("d3".to_string(), "admin@corp.com".to_string()),
        ]
    );
    assert_eq!(sync.stats().cache_hits, 1);
    assert_eq!(sync.stats().batches, 2);
}

#[test]
fn test_company_domain_rules() {
    let drive = InMemoryDrive::new(vec![vec![
        SlimDocument::embedded("internal", vec![Permission::domain("p1", "corp.com")]),
        SlimDocument::embedded("partner", vec![Permission::domain("p2", "partner.com")]),
    ]]);

    let mut sync = doc_sync(&drive, &scope(Some("corp.com")), Arc::new(PermissionCache::new()), None).unwrap();
    let records = collect(&mut sync);

    assert!(records[0].1.is_public);
    assert!(!records[1].1.is_public);
    assert!(records[1].1.grants_nothing());
}

#[test]
fn test_shared_drive_membership() {
    let drive = InMemoryDrive::new(vec![vec![
        SlimDocument::embedded("d1", vec![Permission::user("p1", "u@x.com")]).with_drive_id("drive-7"),
        SlimDocument::bare("d2").with_drive_id("drive-7"),
    ]]);

    let mut sync = doc_sync(&drive, &scope(None), Arc::new(PermissionCache::new()), None).unwrap();
    let records = collect(&mut sync);

    assert_eq!(records[0].1.external_user_emails, emails(&["u@x.com"]));
    assert_eq!(records[0].1.external_user_group_ids, emails(&["drive-7"]));

    // No permission data, but drive members still have access
    assert_eq!(records[1].1.external_user_group_ids, emails(&["drive-7"]));
    assert!(records[1].1.external_user_emails.is_empty());
    assert!(!records[1].1.is_public);
}

#[test]
fn test_malformed_entries_are_skipped() {
    let drive = InMemoryDrive::new(vec![vec![SlimDocument::embedded_raw(
        "d1",
        vec![
            None,
            Some(Permission::user("p1", "u@x.com")),
            Some(Permission::user("p2", "")),
        ],
    )]]);

    let mut sync = doc_sync(&drive, &scope(None), Arc::new(PermissionCache::new()), None).unwrap();
    let records = collect(&mut sync);

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].1.external_user_emails, emails(&["u@x.com"]));
}

#[test]
fn test_forbidden_and_failed_fetches_degrade_to_private() {
    let drive = InMemoryDrive::new(vec![vec![
        SlimDocument::referenced("hidden", ["p1"], Some("a@x.com")),
        SlimDocument::referenced("flaky", ["p2"], Some("a@x.com")),
    ]])
    .with_permissions("hidden", PermissionFetch::Forbidden);

    let cache = Arc::new(PermissionCache::new());
    let mut sync = doc_sync(&drive, &scope(None), cache.clone(), None).unwrap();
    let records = collect(&mut sync);

    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|(_, access)| access.grants_nothing()));
    assert!(cache.is_empty());
    assert_eq!(sync.state(), RunState::Done);
}

#[test]
fn test_progress_reported_per_document() {
    let drive = InMemoryDrive::new(vec![
        vec![SlimDocument::bare("d1"), SlimDocument::bare("d2")],
        vec![SlimDocument::bare("d3")],
    ]);
    let callback = RecordingCallback::new();

    let mut sync = doc_sync(&drive, &scope(None), Arc::new(PermissionCache::new()), Some(&callback)).unwrap();
    assert_eq!(collect(&mut sync).len(), 3);

    assert_eq!(callback.reported.get(), 3);
    assert_eq!(*callback.labels.borrow(), emails(&[PROGRESS_LABEL]));
}

#[test]
fn test_cancellation_stops_run() {
    let drive = InMemoryDrive::new(vec![
        vec![SlimDocument::bare("d1"), SlimDocument::bare("d2")],
        vec![SlimDocument::bare("d3"), SlimDocument::bare("d4")],
    ]);
    let callback = RecordingCallback::stop_after(3);

    let mut sync = doc_sync(&drive, &scope(None), Arc::new(PermissionCache::new()), Some(&callback)).unwrap();

    let mut emitted = Vec::new();
    let mut error = None;
    for result in sync.by_ref() {
        match result {
            Ok(record) => emitted.push(record.doc_id.as_str().to_string()),
            Err(e) => error = Some(e),
        }
    }

    assert_eq!(emitted, vec!["d1", "d2", "d3"]);
    let error = error.expect("run should report cancellation");
    assert!(error.is_cancelled());
    assert_eq!(error.to_string(), "gdrive_doc_sync: Stop signal detected");
    assert_eq!(sync.state(), RunState::Cancelled);
    assert!(sync.next().is_none());
}

#[test]
fn test_stop_before_first_document() {
    let drive = InMemoryDrive::new(vec![vec![SlimDocument::referenced("d1", ["p1"], None)]]);
    let callback = RecordingCallback::stop_after(0);

    let mut sync = doc_sync(&drive, &scope(None), Arc::new(PermissionCache::new()), Some(&callback)).unwrap();

    assert!(matches!(sync.next(), Some(Err(SyncError::Cancelled))));
    assert!(sync.next().is_none());
    // Nothing was resolved, so nothing was fetched
    assert!(drive.fetched().is_empty());
}

#[test]
fn test_listing_failure_ends_run() {
    let mut drive = InMemoryDrive::new(vec![
        vec![SlimDocument::bare("d1")],
        vec![SlimDocument::bare("d2")],
    ]);
    drive.fail_listing_after = Some(1);

    let mut sync = doc_sync(&drive, &scope(None), Arc::new(PermissionCache::new()), None).unwrap();

    assert_eq!(sync.next().unwrap().unwrap().doc_id.as_str(), "d1");
    match sync.next() {
        Some(Err(SyncError::Upstream(e))) => assert!(e.to_string().contains("listing")),
        other => panic!("expected upstream error, got {:?}", other.map(|r| r.is_ok())),
    }
    assert!(sync.next().is_none());
    assert_eq!(sync.state(), RunState::Failed);
}

#[test]
fn test_connect_failure() {
    let mut drive = InMemoryDrive::new(vec![vec![SlimDocument::bare("d1")]]);
    drive.fail_connect = true;

    let result = doc_sync(&drive, &scope(None), Arc::new(PermissionCache::new()), None);

    match result {
        Err(SyncError::Connect(e)) => assert!(e.to_string().contains("invalid_grant")),
        Err(other) => panic!("expected connect error, got {}", other),
        Ok(_) => panic!("expected connect error"),
    }
    assert!(drive.windows.lock().unwrap().is_empty());
}

#[test]
fn test_incremental_window_from_state() {
    let drive = InMemoryDrive::new(vec![]);
    let last = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    let now = Utc.with_ymd_and_hms(2024, 5, 2, 12, 0, 0).unwrap();

    let state = SyncState::new("admin@corp.com").completed_at(last);
    let incremental = scope(None).with_state(Some(&state));
    let mut sync = DocSync::start(&drive, &incremental, Arc::new(PermissionCache::new()), None, now).unwrap();
    assert!(sync.next().is_none());

    let full = scope(None).with_state(None);
    let mut sync = DocSync::start(&drive, &full, Arc::new(PermissionCache::new()), None, now).unwrap();
    assert!(sync.next().is_none());

    let windows = drive.windows.lock().unwrap().clone();
    assert_eq!(windows, vec![(last, now), (DateTime::<Utc>::UNIX_EPOCH, now)]);
}

#[test]
fn test_sync_state_round_trip_through_config_dir() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let path = temp_dir.path().join("sync-state.json");

    let at = Utc.with_ymd_and_hms(2024, 5, 2, 12, 0, 0).unwrap();
    let state = SyncState::new("admin@corp.com").completed_at(at);
    config::save_json_file(&path, &state).unwrap();

    let loaded: SyncState = config::load_json_file(&path).unwrap();
    assert_eq!(loaded, state);
    assert_eq!(scope(None).with_state(Some(&loaded)).last_perm_sync_at, Some(at));
}
