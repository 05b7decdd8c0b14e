mod common;

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use common::{group, meta, pair};
use tempfile::tempdir;
use vid_duper_core::analysis::MatchLabel;
use vid_duper_core::storage::Database;
use vid_duper_core::{Error, JobParams, JobStatus};

fn params(roots: &[&str]) -> JobParams {
    JobParams::new(roots.iter().map(|r| r.to_string()).collect())
}

#[test]
fn test_enqueue_rejects_invalid_params() {
    let db = Database::open_in_memory().unwrap();

    let mut bad = params(&["/videos"]);
    bad.frames = 2;
    assert!(matches!(db.enqueue_job(&bad), Err(Error::InvalidParams(_))));

    let mut bad = params(&["/videos"]);
    bad.threshold = 0.3;
    assert!(matches!(db.enqueue_job(&bad), Err(Error::InvalidParams(_))));

    assert!(matches!(db.enqueue_job(&params(&[])), Err(Error::InvalidParams(_))));
    assert!(db.list_jobs().unwrap().is_empty());
}

#[test]
fn test_job_lifecycle() {
    let db = Database::open_in_memory().unwrap();
    let id = db.enqueue_job(&params(&["/videos"])).unwrap();

    let job = db.get_job(id).unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Queued);
    assert!(job.started_at.is_none());
    assert_eq!(job.parsed_params().unwrap().roots, vec!["/videos".to_string()]);

    let claimed = db.claim_next_job().unwrap().unwrap();
    assert_eq!(claimed.id, id);
    assert_eq!(claimed.status, JobStatus::Running);
    assert!(claimed.started_at.is_some());
    assert_eq!(claimed.claim, 1);

    // Nothing else queued.
    assert!(db.claim_next_job().unwrap().is_none());

    let a = meta("/videos/a.mp4", 120.0, "1280x720", 900);
    let b = meta("/videos/b.mp4", 120.0, "640x360", 300);
    let pairs = vec![pair(&a, &b, 1.0)];
    let groups = vec![group(&[&a, &b])];
    assert!(db.complete_job(id, claimed.claim, &pairs, &groups).unwrap());

    let job = db.get_job(id).unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Done);
    assert!(job.finished_at.is_some());
    assert!(job.error.is_none());

    let stored_pairs = db.get_pairs(id).unwrap();
    assert_eq!(stored_pairs.len(), 1);
    assert_eq!(stored_pairs[0].label, MatchLabel::FullDuplicate);
    assert_eq!(stored_pairs[0].file_a.resolution_label(), "1280x720");

    let stored_groups = db.get_groups(id).unwrap();
    assert_eq!(stored_groups.len(), 1);
    assert_eq!(stored_groups[0].count, 2);
    assert_eq!(stored_groups[0].total_size, 1200);
    assert_eq!(stored_groups[0].representative_path, "/videos/a.mp4");
    assert!(stored_groups[0].files[0].is_representative);
    assert_eq!(stored_groups[0].files[0].file.path, "/videos/a.mp4");
}

#[test]
fn test_claim_is_fifo() {
    let db = Database::open_in_memory().unwrap();
    let first = db.enqueue_job(&params(&["/one"])).unwrap();
    let second = db.enqueue_job(&params(&["/two"])).unwrap();

    assert_eq!(db.claim_next_job().unwrap().unwrap().id, first);
    assert_eq!(db.claim_next_job().unwrap().unwrap().id, second);
    assert!(db.claim_next_job().unwrap().is_none());
}

#[test]
fn test_fail_job_records_error_and_drops_results() {
    let db = Database::open_in_memory().unwrap();
    let id = db.enqueue_job(&params(&["/videos"])).unwrap();
    let claim = db.claim_next_job().unwrap().unwrap().claim;

    assert!(db.fail_job(id, claim, "ffprobe exploded").unwrap());

    let job = db.get_job(id).unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Error);
    assert_eq!(job.error.as_deref(), Some("ffprobe exploded"));
    assert!(job.finished_at.is_some());
    assert_eq!(db.count_pairs(id).unwrap(), 0);
    assert_eq!(db.count_groups(id).unwrap(), 0);

    // Already terminal: a second failure changes nothing.
    assert!(!db.fail_job(id, claim, "again").unwrap());
}

#[test]
fn test_reset_discards_results_and_requeues() {
    let db = Database::open_in_memory().unwrap();
    let id = db.enqueue_job(&params(&["/videos"])).unwrap();
    let claim = db.claim_next_job().unwrap().unwrap().claim;

    let a = meta("/videos/a.mp4", 60.0, "640x360", 10);
    let b = meta("/videos/b.mp4", 60.0, "640x360", 10);
    db.complete_job(id, claim, &[pair(&a, &b, 0.99)], &[group(&[&a, &b])])
        .unwrap();

    assert!(db.reset_job(id).unwrap());
    let job = db.get_job(id).unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Queued);
    assert!(job.started_at.is_none());
    assert!(job.finished_at.is_none());
    assert_eq!(db.count_pairs(id).unwrap(), 0);
    assert_eq!(db.count_groups(id).unwrap(), 0);

    assert!(!db.reset_job(9999).unwrap());
}

#[test]
fn test_complete_after_reset_writes_nothing() {
    let db = Database::open_in_memory().unwrap();
    let id = db.enqueue_job(&params(&["/videos"])).unwrap();
    let claim = db.claim_next_job().unwrap().unwrap().claim;
    db.reset_job(id).unwrap();

    let a = meta("/videos/a.mp4", 60.0, "640x360", 10);
    let b = meta("/videos/b.mp4", 60.0, "640x360", 10);
    let written = db
        .complete_job(id, claim, &[pair(&a, &b, 0.99)], &[group(&[&a, &b])])
        .unwrap();

    assert!(!written);
    assert_eq!(db.get_job(id).unwrap().unwrap().status, JobStatus::Queued);
    assert_eq!(db.count_pairs(id).unwrap(), 0);
}

#[test]
fn test_stale_claim_cannot_finish_reclaimed_job() {
    let db = Database::open_in_memory().unwrap();
    let id = db.enqueue_job(&params(&["/videos"])).unwrap();

    let first = db.claim_next_job().unwrap().unwrap();
    assert!(db.reset_job(id).unwrap());
    let second = db.claim_next_job().unwrap().unwrap();
    assert_eq!(second.id, id);
    assert_ne!(first.claim, second.claim);

    // The first worker finishes late with results from the old run.
    let a = meta("/videos/a.mp4", 60.0, "640x360", 10);
    let b = meta("/videos/b.mp4", 60.0, "640x360", 10);
    let c = meta("/videos/c.mp4", 60.0, "640x360", 10);
    assert!(!db
        .complete_job(id, first.claim, &[pair(&a, &b, 0.99)], &[group(&[&a, &b])])
        .unwrap());
    assert!(!db.fail_job(id, first.claim, "late failure").unwrap());
    assert_eq!(db.get_job(id).unwrap().unwrap().status, JobStatus::Running);
    assert_eq!(db.count_pairs(id).unwrap(), 0);

    let pairs = vec![pair(&a, &c, 0.97), pair(&b, &c, 0.96)];
    assert!(db
        .complete_job(id, second.claim, &pairs, &[group(&[&a, &b, &c])])
        .unwrap());

    let job = db.get_job(id).unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Done);
    assert!(job.error.is_none());
    let stored = db.get_pairs(id).unwrap();
    assert_eq!(stored.len(), 2);
    assert!(stored.iter().all(|p| p.file_b.path == "/videos/c.mp4"));
    assert_eq!(db.get_groups(id).unwrap()[0].count, 3);
}

#[test]
fn test_requeue_stale_jobs() {
    let db = Database::open_in_memory().unwrap();
    let stale = db.enqueue_job(&params(&["/videos"])).unwrap();
    let queued = db.enqueue_job(&params(&["/other"])).unwrap();
    db.claim_next_job().unwrap();

    assert!(db
        .requeue_stale_jobs(chrono::Duration::hours(1))
        .unwrap()
        .is_empty());

    thread::sleep(Duration::from_millis(20));
    let requeued = db.requeue_stale_jobs(chrono::Duration::zero()).unwrap();
    assert_eq!(requeued, vec![stale]);
    assert_eq!(db.get_job(stale).unwrap().unwrap().status, JobStatus::Queued);
    assert_eq!(db.get_job(queued).unwrap().unwrap().status, JobStatus::Queued);
}

#[test]
fn test_delete_job_cascades() {
    let db = Database::open_in_memory().unwrap();
    let id = db.enqueue_job(&params(&["/videos"])).unwrap();
    let claim = db.claim_next_job().unwrap().unwrap().claim;
    let a = meta("/videos/a.mp4", 60.0, "640x360", 10);
    let b = meta("/videos/b.mp4", 60.0, "640x360", 10);
    db.complete_job(id, claim, &[pair(&a, &b, 0.99)], &[group(&[&a, &b])])
        .unwrap();
    let group_id = db.get_groups(id).unwrap()[0].id;

    assert!(db.delete_job(id).unwrap());
    assert!(db.get_job(id).unwrap().is_none());
    assert_eq!(db.count_pairs(id).unwrap(), 0);
    assert!(db.get_group(group_id).unwrap().is_none());

    let orphans: i64 = db
        .connection()
        .query_row("SELECT COUNT(*) FROM duplicate_group_file", [], |row| row.get(0))
        .unwrap();
    assert_eq!(orphans, 0);
}

#[test]
fn test_list_jobs_newest_first() {
    let db = Database::open_in_memory().unwrap();
    let first = db.enqueue_job(&params(&["/one"])).unwrap();
    let second = db.enqueue_job(&params(&["/two"])).unwrap();

    let ids: Vec<i64> = db.list_jobs().unwrap().iter().map(|j| j.id).collect();
    assert_eq!(ids, vec![second, first]);
}

#[test]
fn test_concurrent_claim_gives_job_to_one_worker() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("queue.db").to_string_lossy().into_owned();

    let setup = Database::open(&db_path).unwrap();
    let id = setup.enqueue_job(&params(&["/videos"])).unwrap();

    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = (0..2)
        .map(|_| {
            let db = Database::open(&db_path).unwrap();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                db.claim_next_job().unwrap().map(|job| job.id)
            })
        })
        .collect();

    let claims: Vec<Option<i64>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let winners: Vec<i64> = claims.into_iter().flatten().collect();
    assert_eq!(winners, vec![id]);
    assert_eq!(
        setup.get_job(id).unwrap().unwrap().status,
        JobStatus::Running
    );
}

#[test]
fn test_store_without_claim_column_is_rebuilt() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("old.db");
    {
        let conn = rusqlite::Connection::open(&db_path).unwrap();
        conn.execute_batch(
            "CREATE TABLE scan_job (id INTEGER PRIMARY KEY, status TEXT NOT NULL, \
                 params TEXT NOT NULL, created_at TEXT NOT NULL, started_at TEXT, \
                 finished_at TEXT, error TEXT);
             INSERT INTO scan_job (status, params, created_at) \
                 VALUES ('queued', '{}', '2024-01-01T00:00:00Z');
             PRAGMA user_version = 1;",
        )
        .unwrap();
    }

    let db = Database::open(&db_path.to_string_lossy()).unwrap();
    assert!(db.list_jobs().unwrap().is_empty());
    let id = db.enqueue_job(&params(&["/videos"])).unwrap();
    assert_eq!(db.claim_next_job().unwrap().unwrap().id, id);
}
