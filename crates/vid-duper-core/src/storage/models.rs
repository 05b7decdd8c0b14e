use crate::analysis::cluster::{DuplicateGroup, GroupMember};
use crate::analysis::pairs::MatchLabel;
use crate::error::Error;
use crate::fingerprint::FileMeta;
use crate::job::{JobParams, JobStatus};
use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};

/// One duplicate search request and its lifecycle.
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub id: i64,
    pub status: JobStatus,
    /// JSON-encoded [`JobParams`]; decoded lazily so a malformed row fails the
    /// job instead of the claim.
    pub params: String,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    /// Bumped on every claim; identifies which claim a worker holds.
    pub claim: i64,
}

impl JobRecord {
    pub fn parsed_params(&self) -> Result<JobParams, Error> {
        JobParams::from_json(&self.params)
    }
}

/// A matched pair persisted for a job.
#[derive(Debug, Clone)]
pub struct PairRecord {
    pub id: i64,
    pub job_id: i64,
    pub similarity: f64,
    pub label: MatchLabel,
    pub file_a: FileMeta,
    pub file_b: FileMeta,
}

/// A duplicate group persisted for a job, with its members.
#[derive(Debug, Clone)]
pub struct GroupRecord {
    pub id: i64,
    pub job_id: i64,
    pub representative_path: String,
    pub count: i64,
    pub total_size: i64,
    pub files: Vec<GroupFileRecord>,
}

impl GroupRecord {
    pub fn to_group(&self) -> DuplicateGroup {
        DuplicateGroup {
            representative: self.representative_path.clone(),
            members: self
                .files
                .iter()
                .map(|f| GroupMember {
                    file: f.file.clone(),
                    is_representative: f.is_representative,
                })
                .collect(),
            total_size: self.total_size.max(0) as u64,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GroupFileRecord {
    pub id: i64,
    pub group_id: i64,
    pub file: FileMeta,
    pub is_representative: bool,
}

impl ToSql for JobStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for JobStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: Error| FromSqlError::Other(Box::new(e)))
    }
}

impl ToSql for MatchLabel {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for MatchLabel {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: Error| FromSqlError::Other(Box::new(e)))
    }
}
