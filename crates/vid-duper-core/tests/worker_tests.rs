mod common;

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use common::{fake_video, params_for, FakeHasher, FakeSource};
use tempfile::tempdir;
use vid_duper_core::media::{FrameSource, ProbeInfo};
use vid_duper_core::storage::Database;
use vid_duper_core::{Error, JobOutcome, JobStatus, Worker, WorkerSettings};

fn settings() -> WorkerSettings {
    WorkerSettings {
        poll_interval: Duration::from_millis(10),
        ignore_patterns: Vec::new(),
        parallel: false,
    }
}

fn worker_with(db: Database, source: Box<dyn FrameSource>) -> Worker {
    Worker::new(db, source, Box::new(FakeHasher), settings())
}

#[test]
fn test_run_once_on_empty_queue() {
    let db = Database::open_in_memory().unwrap();
    let mut worker = worker_with(db, Box::new(FakeSource::default()));

    assert!(worker.run_once().unwrap().is_none());
    assert_eq!(worker.state().idle_polls, 1);
    assert_eq!(worker.state().jobs_processed, 0);
}

#[test]
fn test_successful_job_is_done_with_results() {
    let dir = tempdir().unwrap();
    fake_video(dir.path(), "a.mp4", 42, 2048);
    fake_video(dir.path(), "b.mkv", 42, 1024);
    fake_video(dir.path(), "c.mp4", 7, 512);
    fake_video(dir.path(), "readme.txt", 42, 10);

    let db = Database::open_in_memory().unwrap();
    let id = db.enqueue_job(&params_for(dir.path())).unwrap();
    let mut worker = worker_with(db, Box::new(FakeSource::default()));

    let outcome = worker.run_once().unwrap().unwrap();
    assert_eq!(
        outcome,
        JobOutcome::Done {
            job_id: id,
            pairs: 1,
            groups: 1
        }
    );
    assert_eq!(worker.state().jobs_processed, 1);

    let db = worker.database();
    let job = db.get_job(id).unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Done);
    assert!(job.finished_at.is_some());
    assert!(job.error.is_none());

    let groups = db.get_groups(id).unwrap();
    assert_eq!(groups.len(), 1);
    assert!(groups[0].representative_path.ends_with("a.mp4"));
    assert_eq!(groups[0].total_size, 3072);

    assert!(worker.run_once().unwrap().is_none());
}

#[test]
fn test_malformed_params_fail_the_job() {
    let db = Database::open_in_memory().unwrap();
    db.connection()
        .execute(
            "INSERT INTO scan_job (status, params, created_at) VALUES ('queued', ?1, ?2)",
            rusqlite::params!["{not json", chrono::Utc::now()],
        )
        .unwrap();
    let id = db.connection().last_insert_rowid();
    let mut worker = worker_with(db, Box::new(FakeSource::default()));

    let outcome = worker.run_once().unwrap().unwrap();
    assert!(matches!(outcome, JobOutcome::Failed { job_id, .. } if job_id == id));
    assert_eq!(worker.state().jobs_failed, 1);

    let db = worker.database();
    let job = db.get_job(id).unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Error);
    assert!(job.error.is_some());
    assert_eq!(db.count_pairs(id).unwrap(), 0);
    assert_eq!(db.count_groups(id).unwrap(), 0);
}

#[test]
fn test_out_of_range_params_fail_the_job() {
    let db = Database::open_in_memory().unwrap();
    db.connection()
        .execute(
            "INSERT INTO scan_job (status, params, created_at) VALUES ('queued', ?1, ?2)",
            rusqlite::params![r#"{"roots":["/videos"],"frames":2}"#, chrono::Utc::now()],
        )
        .unwrap();
    let id = db.connection().last_insert_rowid();
    let mut worker = worker_with(db, Box::new(FakeSource::default()));

    worker.run_once().unwrap();
    let job = worker.database().get_job(id).unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Error);
    assert!(job.error.unwrap().contains("frames"));
}

/// Deletes the file as soon as it is probed, like a user cleaning up mid-scan.
struct VanishingSource;

impl FrameSource for VanishingSource {
    fn probe(&self, path: &Path) -> ProbeInfo {
        let _ = fs::remove_file(path);
        ProbeInfo::default()
    }

    fn extract_frame(&self, path: &Path, _t: f64, _scale: Option<u32>) -> Result<Vec<u8>, Error> {
        Ok(fs::read(path)?)
    }
}

#[test]
fn test_file_vanishing_mid_scan_fails_the_job() {
    let dir = tempdir().unwrap();
    fake_video(dir.path(), "a.mp4", 1, 64);

    let db = Database::open_in_memory().unwrap();
    let id = db.enqueue_job(&params_for(dir.path())).unwrap();
    let mut worker = worker_with(db, Box::new(VanishingSource));

    let outcome = worker.run_once().unwrap().unwrap();
    assert!(matches!(outcome, JobOutcome::Failed { .. }));

    let job = worker.database().get_job(id).unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Error);
    assert!(job.finished_at.is_some());
}

/// Resets the job and claims it again from a second connection the first time
/// any file is probed, like another worker taking over a job that was re-queued.
struct ReclaimingSource {
    db_path: String,
    job_id: i64,
    fired: AtomicBool,
}

impl FrameSource for ReclaimingSource {
    fn probe(&self, path: &Path) -> ProbeInfo {
        if !self.fired.swap(true, Ordering::SeqCst) {
            let other = Database::open(&self.db_path).unwrap();
            assert!(other.reset_job(self.job_id).unwrap());
            assert_eq!(other.claim_next_job().unwrap().unwrap().id, self.job_id);
        }
        FakeSource::default().probe(path)
    }

    fn extract_frame(&self, path: &Path, t: f64, scale: Option<u32>) -> Result<Vec<u8>, Error> {
        FakeSource::default().extract_frame(path, t, scale)
    }
}

#[test]
fn test_results_of_reclaimed_job_are_discarded() {
    let dir = tempdir().unwrap();
    fake_video(dir.path(), "a.mp4", 9, 100);
    fake_video(dir.path(), "b.mp4", 9, 100);
    let db_path = dir.path().join("queue.db").to_string_lossy().into_owned();

    let db = Database::open(&db_path).unwrap();
    let id = db.enqueue_job(&params_for(dir.path())).unwrap();
    let source = ReclaimingSource {
        db_path: db_path.clone(),
        job_id: id,
        fired: AtomicBool::new(false),
    };
    let mut worker = worker_with(db, Box::new(source));

    let outcome = worker.run_once().unwrap().unwrap();
    assert_eq!(outcome, JobOutcome::Discarded { job_id: id });

    // The job still belongs to the second claim and nothing was written.
    let job = worker.database().get_job(id).unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Running);
    assert_eq!(job.claim, 2);
    assert_eq!(worker.database().count_pairs(id).unwrap(), 0);
    assert_eq!(worker.database().count_groups(id).unwrap(), 0);
}

#[test]
fn test_run_loop_drains_queue_until_stopped() {
    let dir = tempdir().unwrap();
    fake_video(dir.path(), "a.mp4", 3, 100);
    fake_video(dir.path(), "b.mp4", 3, 100);

    let db = Database::open_in_memory().unwrap();
    let first = db.enqueue_job(&params_for(dir.path())).unwrap();
    let second = db.enqueue_job(&params_for(dir.path())).unwrap();
    let mut worker = worker_with(db, Box::new(FakeSource::default()));

    let stop = Arc::new(AtomicBool::new(false));
    let stopper = {
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(300));
            stop.store(true, Ordering::Relaxed);
        })
    };
    worker.run(&stop);
    stopper.join().unwrap();

    assert_eq!(worker.state().jobs_processed, 2);
    assert!(worker.state().idle_polls >= 1);
    for id in [first, second] {
        let job = worker.database().get_job(id).unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Done);
    }
}
