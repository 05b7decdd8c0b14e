use super::maintenance::{apply_deletions, MaintenanceReport};
use crate::error::Error;
use crate::storage::models::GroupRecord;
use crate::storage::Database;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default)]
pub struct DeletionSummary {
    pub bytes_freed: u64,
    /// Paths removed from disk or already gone.
    pub deleted: Vec<String>,
    /// Paths that could not be removed and were left alone.
    pub failed: Vec<String>,
    pub maintenance: MaintenanceReport,
}

/// Delete files from disk, then update every stored group and pair that
/// referenced them.
///
/// A path that no longer exists counts as deleted (its records are cleaned
/// up). A path that cannot be removed, such as a directory or a permission
/// error, is skipped and reported in `failed`.
pub fn delete_files(db: &Database, paths: &[String]) -> Result<DeletionSummary, Error> {
    let mut summary = DeletionSummary::default();

    for file_path in paths {
        let path = Path::new(file_path);
        if !path.exists() {
            debug!("{} already gone", file_path);
            summary.deleted.push(file_path.clone());
            continue;
        }
        if !path.is_file() {
            warn!("Refusing to delete non-file {}", file_path);
            summary.failed.push(file_path.clone());
            continue;
        }

        let size = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        match fs::remove_file(path) {
            Ok(()) => {
                summary.bytes_freed += size;
                summary.deleted.push(file_path.clone());
                debug!("Deleted {} ({} bytes)", file_path, size);
            }
            Err(e) => {
                warn!("Failed to delete '{}': {}", file_path, e);
                summary.failed.push(file_path.clone());
            }
        }
    }

    if !summary.deleted.is_empty() {
        summary.maintenance = apply_deletions(db, &summary.deleted)?;
    }

    info!(
        "Deleted {} files ({} bytes freed), {} failed",
        summary.deleted.len(),
        summary.bytes_freed,
        summary.failed.len()
    );
    Ok(summary)
}

/// Paths of `group` that a group deletion would remove. With no explicit
/// paths that is every member except the representative; explicit paths
/// outside the group are dropped.
pub fn group_deletion_targets(group: &GroupRecord, paths: Option<&[String]>) -> Vec<String> {
    match paths {
        Some(paths) if !paths.is_empty() => {
            let mut targets: Vec<String> = Vec::new();
            for path in paths {
                if !group.files.iter().any(|f| &f.file.path == path) {
                    debug!("{} is not in group {}, skipping", path, group.id);
                } else if !targets.contains(path) {
                    targets.push(path.clone());
                }
            }
            targets
        }
        _ => group
            .files
            .iter()
            .filter(|f| !f.is_representative)
            .map(|f| f.file.path.clone())
            .collect(),
    }
}

/// Delete files belonging to one group, as chosen by
/// [`group_deletion_targets`].
pub fn delete_group_files(
    db: &Database,
    group_id: i64,
    paths: Option<&[String]>,
) -> Result<DeletionSummary, Error> {
    let group = db
        .get_group(group_id)?
        .ok_or(Error::GroupNotFound(group_id))?;

    let to_delete = group_deletion_targets(&group, paths);
    if to_delete.is_empty() {
        return Ok(DeletionSummary::default());
    }
    delete_files(db, &to_delete)
}
