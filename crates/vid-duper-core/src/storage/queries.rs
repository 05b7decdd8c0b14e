use super::models::*;
use super::sqlite::Database;
use crate::analysis::cluster::DuplicateGroup;
use crate::analysis::pairs::Pair;
use crate::error::Error;
use crate::fingerprint::{FileMeta, Resolution};
use crate::job::{JobParams, JobStatus};
use chrono::Utc;
use rusqlite::{params, Result, Row};
use tracing::debug;

const JOB_COLUMNS: &str =
    "id, status, params, created_at, started_at, finished_at, error, claim_count";

fn job_from_row(row: &Row<'_>) -> Result<JobRecord> {
    Ok(JobRecord {
        id: row.get(0)?,
        status: row.get(1)?,
        params: row.get(2)?,
        created_at: row.get(3)?,
        started_at: row.get(4)?,
        finished_at: row.get(5)?,
        error: row.get(6)?,
        claim: row.get(7)?,
    })
}

fn file_meta(path: String, size: i64, duration: f64, res: String) -> FileMeta {
    FileMeta {
        path,
        size: size.max(0) as u64,
        duration,
        resolution: Resolution::parse_lossy(&res),
    }
}

impl Database {
    // ── Jobs ─────────────────────────────────────────────────────

    /// Validate and queue a new job. Returns its id.
    pub fn enqueue_job(&self, job_params: &JobParams) -> Result<i64, Error> {
        job_params.validate()?;
        let params_json = job_params.to_json()?;
        self.connection().execute(
            "INSERT INTO scan_job (status, params, created_at) VALUES (?1, ?2, ?3)",
            params![JobStatus::Queued, params_json, Utc::now()],
        )?;
        let id = self.connection().last_insert_rowid();
        debug!("Queued job {}", id);
        Ok(id)
    }

    /// Atomically take the oldest queued job and mark it running.
    ///
    /// The select and the status change happen in one statement inside a
    /// `BEGIN IMMEDIATE` transaction, so two workers sharing the database file
    /// can never claim the same job; the loser sees the next queued job or none.
    /// The returned record's `claim` must be passed back when finishing it.
    pub fn claim_next_job(&self) -> Result<Option<JobRecord>> {
        let tx = self.immediate_transaction()?;
        let claimed = match tx.query_row(
            &format!(
                "UPDATE scan_job SET status = ?1, started_at = ?2, claim_count = claim_count + 1 \
                 WHERE id = (SELECT id FROM scan_job WHERE status = ?3 \
                             ORDER BY created_at, id LIMIT 1) \
                   AND status = ?3 \
                 RETURNING {}",
                JOB_COLUMNS
            ),
            params![JobStatus::Running, Utc::now(), JobStatus::Queued],
            job_from_row,
        ) {
            Ok(job) => Some(job),
            Err(rusqlite::Error::QueryReturnedNoRows) => None,
            Err(e) => return Err(e),
        };
        tx.commit()?;
        if let Some(job) = &claimed {
            debug!("Claimed job {}", job.id);
        }
        Ok(claimed)
    }

    /// Persist a job's pairs and groups and mark it done, all in one
    /// transaction. Returns `false` (writing nothing) unless the job is still
    /// running under the same `claim`, e.g. when it was reset, or reset and
    /// claimed again by another worker, while being processed.
    pub fn complete_job(
        &self,
        job_id: i64,
        claim: i64,
        pairs: &[Pair],
        groups: &[DuplicateGroup],
    ) -> Result<bool> {
        let tx = self.immediate_transaction()?;
        let updated = tx.execute(
            "UPDATE scan_job SET status = ?1, finished_at = ?2, error = NULL \
             WHERE id = ?3 AND status = ?4 AND claim_count = ?5",
            params![JobStatus::Done, Utc::now(), job_id, JobStatus::Running, claim],
        )?;
        if updated == 0 {
            return Ok(false);
        }

        tx.execute("DELETE FROM match_pair WHERE job_id = ?1", params![job_id])?;
        tx.execute("DELETE FROM duplicate_group WHERE job_id = ?1", params![job_id])?;
        {
            let mut pair_stmt = tx.prepare_cached(
                "INSERT INTO match_pair \
                 (job_id, similarity, label, file_a, size_a, duration_a, res_a, \
                  file_b, size_b, duration_b, res_b) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            )?;
            for pair in pairs {
                pair_stmt.execute(params![
                    job_id,
                    pair.similarity,
                    pair.label,
                    pair.a.path,
                    pair.a.size as i64,
                    pair.a.duration,
                    pair.a.resolution_label(),
                    pair.b.path,
                    pair.b.size as i64,
                    pair.b.duration,
                    pair.b.resolution_label(),
                ])?;
            }
        }
        for group in groups {
            tx.execute(
                "INSERT INTO duplicate_group (job_id, representative_path, count, total_size) \
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    job_id,
                    group.representative,
                    group.count() as i64,
                    group.total_size as i64
                ],
            )?;
            let group_id = tx.last_insert_rowid();
            insert_group_files(&tx, group_id, group)?;
        }
        tx.commit()?;
        debug!(
            "Job {} done: {} pairs, {} groups persisted",
            job_id,
            pairs.len(),
            groups.len()
        );
        Ok(true)
    }

    /// Mark a running job failed and drop any results stored for it.
    /// Returns `false` when the job is no longer running under `claim`.
    pub fn fail_job(&self, job_id: i64, claim: i64, message: &str) -> Result<bool> {
        let tx = self.immediate_transaction()?;
        let updated = tx.execute(
            "UPDATE scan_job SET status = ?1, finished_at = ?2, error = ?3 \
             WHERE id = ?4 AND status = ?5 AND claim_count = ?6",
            params![
                JobStatus::Error,
                Utc::now(),
                message,
                job_id,
                JobStatus::Running,
                claim
            ],
        )?;
        if updated == 0 {
            return Ok(false);
        }
        tx.execute("DELETE FROM match_pair WHERE job_id = ?1", params![job_id])?;
        tx.execute("DELETE FROM duplicate_group WHERE job_id = ?1", params![job_id])?;
        tx.commit()?;
        Ok(true)
    }

    /// Return a job to the queue from any state, discarding its results.
    /// Returns `false` when no such job exists.
    pub fn reset_job(&self, job_id: i64) -> Result<bool> {
        let tx = self.immediate_transaction()?;
        let updated = tx.execute(
            "UPDATE scan_job SET status = ?1, started_at = NULL, finished_at = NULL, \
             error = NULL WHERE id = ?2",
            params![JobStatus::Queued, job_id],
        )?;
        tx.execute("DELETE FROM match_pair WHERE job_id = ?1", params![job_id])?;
        tx.execute("DELETE FROM duplicate_group WHERE job_id = ?1", params![job_id])?;
        tx.commit()?;
        Ok(updated > 0)
    }

    /// Re-queue jobs stuck in `running` whose start is older than `older_than`.
    /// Only ever called explicitly by an operator; a worker that crashed after
    /// claiming leaves its job running otherwise.
    pub fn requeue_stale_jobs(&self, older_than: chrono::Duration) -> Result<Vec<i64>> {
        let cutoff = Utc::now() - older_than;
        let tx = self.immediate_transaction()?;
        let ids: Vec<i64> = {
            let mut stmt = tx.prepare(
                "SELECT id FROM scan_job WHERE status = ?1 AND started_at < ?2 ORDER BY id",
            )?;
            let ids = stmt
                .query_map(params![JobStatus::Running, cutoff], |row| row.get(0))?
                .collect::<Result<Vec<_>>>()?;
            ids
        };
        for id in &ids {
            tx.execute("DELETE FROM match_pair WHERE job_id = ?1", params![id])?;
            tx.execute("DELETE FROM duplicate_group WHERE job_id = ?1", params![id])?;
            tx.execute(
                "UPDATE scan_job SET status = ?1, started_at = NULL WHERE id = ?2",
                params![JobStatus::Queued, id],
            )?;
        }
        tx.commit()?;
        Ok(ids)
    }

    /// Delete a job together with its pairs and groups (via CASCADE).
    pub fn delete_job(&self, job_id: i64) -> Result<bool> {
        let deleted = self
            .connection()
            .execute("DELETE FROM scan_job WHERE id = ?1", params![job_id])?;
        Ok(deleted > 0)
    }

    pub fn get_job(&self, job_id: i64) -> Result<Option<JobRecord>> {
        match self.connection().query_row(
            &format!("SELECT {} FROM scan_job WHERE id = ?1", JOB_COLUMNS),
            params![job_id],
            job_from_row,
        ) {
            Ok(job) => Ok(Some(job)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// All jobs, newest first.
    pub fn list_jobs(&self) -> Result<Vec<JobRecord>> {
        let mut stmt = self.connection().prepare(&format!(
            "SELECT {} FROM scan_job ORDER BY created_at DESC, id DESC",
            JOB_COLUMNS
        ))?;
        let jobs = stmt
            .query_map([], job_from_row)?
            .collect::<Result<Vec<_>>>()?;
        Ok(jobs)
    }

    // ── Pairs ────────────────────────────────────────────────────

    /// Pairs of a job, most similar first.
    pub fn get_pairs(&self, job_id: i64) -> Result<Vec<PairRecord>> {
        let mut stmt = self.connection().prepare(
            "SELECT id, job_id, similarity, label, file_a, size_a, duration_a, res_a, \
                    file_b, size_b, duration_b, res_b \
             FROM match_pair WHERE job_id = ?1 \
             ORDER BY similarity DESC, id",
        )?;
        let pairs = stmt
            .query_map(params![job_id], |row| {
                Ok(PairRecord {
                    id: row.get(0)?,
                    job_id: row.get(1)?,
                    similarity: row.get(2)?,
                    label: row.get(3)?,
                    file_a: file_meta(row.get(4)?, row.get(5)?, row.get(6)?, row.get(7)?),
                    file_b: file_meta(row.get(8)?, row.get(9)?, row.get(10)?, row.get(11)?),
                })
            })?
            .collect::<Result<Vec<_>>>()?;
        Ok(pairs)
    }

    pub fn count_pairs(&self, job_id: i64) -> Result<i64> {
        self.connection().query_row(
            "SELECT COUNT(*) FROM match_pair WHERE job_id = ?1",
            params![job_id],
            |row| row.get(0),
        )
    }

    /// Remove every pair, in any job, that references `path` on either side.
    pub fn delete_pairs_referencing(&self, path: &str) -> Result<usize> {
        self.connection().execute(
            "DELETE FROM match_pair WHERE file_a = ?1 OR file_b = ?1",
            params![path],
        )
    }

    // ── Groups ───────────────────────────────────────────────────

    /// Groups of a job with their members, representative listed first.
    pub fn get_groups(&self, job_id: i64) -> Result<Vec<GroupRecord>> {
        let ids: Vec<i64> = {
            let mut stmt = self
                .connection()
                .prepare("SELECT id FROM duplicate_group WHERE job_id = ?1 ORDER BY id")?;
            let ids = stmt
                .query_map(params![job_id], |row| row.get(0))?
                .collect::<Result<Vec<_>>>()?;
            ids
        };
        let mut groups = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(group) = self.get_group(id)? {
                groups.push(group);
            }
        }
        Ok(groups)
    }

    pub fn get_group(&self, group_id: i64) -> Result<Option<GroupRecord>> {
        let group = match self.connection().query_row(
            "SELECT id, job_id, representative_path, count, total_size \
             FROM duplicate_group WHERE id = ?1",
            params![group_id],
            |row| {
                Ok(GroupRecord {
                    id: row.get(0)?,
                    job_id: row.get(1)?,
                    representative_path: row.get(2)?,
                    count: row.get(3)?,
                    total_size: row.get(4)?,
                    files: Vec::new(),
                })
            },
        ) {
            Ok(group) => group,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
            Err(e) => return Err(e),
        };

        let mut stmt = self.connection().prepare_cached(
            "SELECT id, group_id, path, size, duration, res, is_representative \
             FROM duplicate_group_file WHERE group_id = ?1 \
             ORDER BY is_representative DESC, id",
        )?;
        let files = stmt
            .query_map(params![group_id], |row| {
                Ok(GroupFileRecord {
                    id: row.get(0)?,
                    group_id: row.get(1)?,
                    file: file_meta(row.get(2)?, row.get(3)?, row.get(4)?, row.get(5)?),
                    is_representative: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(GroupRecord { files, ..group }))
    }

    pub fn count_groups(&self, job_id: i64) -> Result<i64> {
        self.connection().query_row(
            "SELECT COUNT(*) FROM duplicate_group WHERE job_id = ?1",
            params![job_id],
            |row| row.get(0),
        )
    }

    /// Ids of every group, in any job, with a member at `path`.
    pub fn group_ids_containing(&self, path: &str) -> Result<Vec<i64>> {
        let mut stmt = self.connection().prepare_cached(
            "SELECT DISTINCT group_id FROM duplicate_group_file WHERE path = ?1",
        )?;
        let ids = stmt
            .query_map(params![path], |row| row.get(0))?
            .collect::<Result<Vec<_>>>()?;
        Ok(ids)
    }

    /// Overwrite a stored group's members, representative and aggregates.
    pub fn replace_group(&self, group_id: i64, group: &DuplicateGroup) -> Result<()> {
        self.connection().execute(
            "DELETE FROM duplicate_group_file WHERE group_id = ?1",
            params![group_id],
        )?;
        insert_group_files(self.connection(), group_id, group)?;
        self.connection().execute(
            "UPDATE duplicate_group SET representative_path = ?1, count = ?2, total_size = ?3 \
             WHERE id = ?4",
            params![
                group.representative,
                group.count() as i64,
                group.total_size as i64,
                group_id
            ],
        )?;
        Ok(())
    }

    pub fn delete_group(&self, group_id: i64) -> Result<bool> {
        let deleted = self.connection().execute(
            "DELETE FROM duplicate_group WHERE id = ?1",
            params![group_id],
        )?;
        Ok(deleted > 0)
    }
}

fn insert_group_files(
    conn: &rusqlite::Connection,
    group_id: i64,
    group: &DuplicateGroup,
) -> Result<()> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO duplicate_group_file \
         (group_id, path, size, duration, res, is_representative) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;
    for member in &group.members {
        stmt.execute(params![
            group_id,
            member.file.path,
            member.file.size as i64,
            member.file.duration,
            member.file.resolution_label(),
            member.is_representative,
        ])?;
    }
    Ok(())
}
