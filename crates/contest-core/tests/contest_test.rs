//! Contest Core Tests
//!
//! End-to-end flows through `ContestService` on the memory and journal
//! backends.

use std::sync::Arc;

use contest_common::{ContestError, Identity, UnauthorizedKind, ValidationPolicy};
use contest_core::{COLLECTIONS, ContestService, Submission};
use contest_persistence::{StorageMode, StoreOptions, open_store};

fn id(token: &str) -> Identity {
    Identity::new(token).unwrap()
}

fn open(mode: StorageMode, dir: &tempfile::TempDir) -> Arc<ContestService> {
    let options = StoreOptions {
        mode,
        path: dir.path().to_path_buf(),
        ..Default::default()
    };
    let store = open_store(&options, COLLECTIONS).unwrap();
    Arc::new(ContestService::new(store, ValidationPolicy::default()))
}

const MODES: [StorageMode; 2] = [StorageMode::Memory, StorageMode::File];

// ============== Scenario Tests ==============

#[tokio::test]
async fn test_bach_chaconne_scenario() {
    for mode in MODES {
        let dir = tempfile::tempdir().unwrap();
        let service = open(mode, &dir);
        let (c1, c2, v1, v2) = (id("C1"), id("C2"), id("V1"), id("V2"));

        let s = service
            .create_submission("Bach Chaconne", "abc123", &c1)
            .await
            .unwrap();
        assert_eq!(service.get_submission(&s).await.unwrap().vote_count, 0);

        assert_eq!(service.vote(&s, &v1).await.unwrap().vote_count, 1);

        let again = service.vote(&s, &v1).await;
        assert!(matches!(again, Err(ContestError::AlreadyVoted { .. })));
        assert_eq!(service.get_submission(&s).await.unwrap().vote_count, 1);

        assert_eq!(service.vote(&s, &v2).await.unwrap().vote_count, 2);

        let denied = service
            .update_submission(&s, &c2, "Stolen", "zzz")
            .await;
        assert_eq!(
            denied,
            Err(ContestError::Unauthorized(UnauthorizedKind::NotContestant))
        );

        let updated = service
            .update_submission(&s, &c1, "New Title", "xyz789")
            .await
            .unwrap();
        assert_eq!(updated.vote_count, 2);
        assert_eq!(updated.title, "New Title");
        assert_eq!(updated.media_ref, "xyz789");

        let audit = service.audit_submission(&s).await.unwrap();
        assert!(audit.consistent);
        assert_eq!(audit.receipt_count, 2);
    }
}

#[tokio::test]
async fn test_list_returns_creation_order() {
    let dir = tempfile::tempdir().unwrap();
    let service = open(StorageMode::Memory, &dir);
    let mut expected = Vec::new();
    for n in 0..5 {
        let sid = service
            .create_submission(&format!("Take {}", n), "vid", &id("C1"))
            .await
            .unwrap();
        expected.push(sid);
    }
    let listed: Vec<String> = service
        .list_submissions()
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.id)
        .collect();
    assert_eq!(listed, expected);
}

// ============== Concurrency Tests ==============

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_fifty_concurrent_voters() {
    for mode in MODES {
        let dir = tempfile::tempdir().unwrap();
        let service = open(mode, &dir);
        let s = service
            .create_submission("Bach Chaconne", "abc123", &id("C1"))
            .await
            .unwrap();

        let tasks = (0..50).map(|n| {
            let service = service.clone();
            let s = s.clone();
            tokio::spawn(async move { service.vote(&s, &id(&format!("voter-{}", n))).await })
        });
        for result in futures::future::join_all(tasks).await {
            result.unwrap().unwrap();
        }

        let submission = service.get_submission(&s).await.unwrap();
        assert_eq!(submission.vote_count, 50);
        assert_eq!(service.receipts(&s).await.unwrap().len(), 50);
        for n in 0..50 {
            assert!(service
                .has_voted(&s, &id(&format!("voter-{}", n)))
                .await
                .unwrap());
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_repeated_voter_races_counted_once() {
    let dir = tempfile::tempdir().unwrap();
    let service = open(StorageMode::Memory, &dir);
    let s = service
        .create_submission("Race", "abc", &id("C1"))
        .await
        .unwrap();

    let tasks = (0..20).map(|_| {
        let service = service.clone();
        let s = s.clone();
        tokio::spawn(async move { service.vote(&s, &id("same-voter")).await })
    });
    let results = futures::future::join_all(tasks).await;

    let wins = results.iter().filter(|r| matches!(r, Ok(Ok(_)))).count();
    let repeats = results
        .iter()
        .filter(|r| matches!(r, Ok(Err(ContestError::AlreadyVoted { .. }))))
        .count();
    assert_eq!(wins, 1);
    assert_eq!(repeats, 19);
    assert_eq!(service.get_submission(&s).await.unwrap().vote_count, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_creates_single_owner() {
    let dir = tempfile::tempdir().unwrap();
    let service = open(StorageMode::Memory, &dir);

    let tasks = (0..10).map(|n| {
        let service = service.clone();
        tokio::spawn(async move {
            service
                .create_submission_with_id("contested", "Mine", "vid", &id(&format!("C{}", n)))
                .await
        })
    });
    let results = futures::future::join_all(tasks).await;

    let winners: Vec<Submission> = results
        .into_iter()
        .filter_map(|r| r.unwrap().ok())
        .collect();
    assert_eq!(winners.len(), 1);
    let stored = service.get_submission("contested").await.unwrap();
    assert_eq!(stored.contestant, winners[0].contestant);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_updates_and_votes_interleave_without_loss() {
    let dir = tempfile::tempdir().unwrap();
    let service = open(StorageMode::File, &dir);
    let owner = id("C1");
    let s = service
        .create_submission("Start", "v0", &owner)
        .await
        .unwrap();

    let mut handles = Vec::new();
    for n in 0..30 {
        let service = service.clone();
        let s = s.clone();
        let owner = owner.clone();
        handles.push(tokio::spawn(async move {
            if n % 3 == 0 {
                service
                    .update_submission(&s, &owner, &format!("Title {}", n), "vid")
                    .await
                    .map(|_| ())
            } else {
                service
                    .vote(&s, &id(&format!("voter-{}", n)))
                    .await
                    .map(|_| ())
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let submission = service.get_submission(&s).await.unwrap();
    assert_eq!(submission.vote_count, 20);
    assert!(submission.title.starts_with("Title "));
    assert!(service.audit_submission(&s).await.unwrap().consistent);
}

// ============== Durability Tests ==============

#[tokio::test]
async fn test_journal_reopen_keeps_votes() {
    let dir = tempfile::tempdir().unwrap();
    let s = {
        let service = open(StorageMode::File, &dir);
        let s = service
            .create_submission("Durable", "abc", &id("C1"))
            .await
            .unwrap();
        service.vote(&s, &id("V1")).await.unwrap();
        s
    };

    let service = open(StorageMode::File, &dir);
    assert_eq!(service.get_submission(&s).await.unwrap().vote_count, 1);
    let again = service.vote(&s, &id("V1")).await;
    assert!(matches!(again, Err(ContestError::AlreadyVoted { .. })));
    assert_eq!(service.vote(&s, &id("V2")).await.unwrap().vote_count, 2);

    let stats = service.stats().await.unwrap();
    assert_eq!(stats.storage_mode, "file");
    assert_eq!(stats.votes, 2);
}
