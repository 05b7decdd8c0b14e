use super::cluster::{select_representative, DuplicateGroup, GroupMember};
use crate::error::Error;
use crate::fingerprint::FileMeta;
use crate::storage::Database;
use ahash::AHashSet;
use std::collections::BTreeSet;
use tracing::{debug, info};

/// What happens to a group when some of its files are deleted.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupChange {
    /// No member was deleted.
    Unchanged,
    /// Members removed; representative and total size recomputed.
    Updated(DuplicateGroup),
    /// Fewer than two members remain, so the group no longer exists.
    Dissolved,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub groups_updated: usize,
    pub groups_dissolved: usize,
    pub members_removed: usize,
    pub pairs_removed: usize,
}

/// Remove deleted paths from a group. The representative is only re-chosen
/// when it was itself deleted.
pub fn prune_group(group: &DuplicateGroup, deleted: &AHashSet<&str>) -> GroupChange {
    if !group
        .members
        .iter()
        .any(|m| deleted.contains(m.file.path.as_str()))
    {
        return GroupChange::Unchanged;
    }

    let remaining: Vec<FileMeta> = group
        .members
        .iter()
        .filter(|m| !deleted.contains(m.file.path.as_str()))
        .map(|m| m.file.clone())
        .collect();
    if remaining.len() < 2 {
        return GroupChange::Dissolved;
    }

    let representative = if deleted.contains(group.representative.as_str())
        || !remaining.iter().any(|f| f.path == group.representative)
    {
        match select_representative(&remaining) {
            Some(best) => remaining[best].path.clone(),
            None => return GroupChange::Dissolved,
        }
    } else {
        group.representative.clone()
    };

    let total_size = remaining.iter().map(|f| f.size).sum();
    let members = remaining
        .into_iter()
        .map(|file| GroupMember {
            is_representative: file.path == representative,
            file,
        })
        .collect();

    GroupChange::Updated(DuplicateGroup {
        representative,
        members,
        total_size,
    })
}

/// Bring stored groups and pairs in line with a set of deleted files, across
/// all jobs, in a single transaction.
pub fn apply_deletions(db: &Database, deleted: &[String]) -> Result<MaintenanceReport, Error> {
    let mut report = MaintenanceReport::default();
    if deleted.is_empty() {
        return Ok(report);
    }
    let deleted_set: AHashSet<&str> = deleted.iter().map(|p| p.as_str()).collect();

    let tx = db.immediate_transaction()?;

    let mut group_ids: BTreeSet<i64> = BTreeSet::new();
    for path in &deleted_set {
        group_ids.extend(db.group_ids_containing(path)?);
    }

    for group_id in group_ids {
        let Some(record) = db.get_group(group_id)? else {
            continue;
        };
        let before = record.files.len();
        match prune_group(&record.to_group(), &deleted_set) {
            GroupChange::Unchanged => {}
            GroupChange::Updated(group) => {
                report.members_removed += before - group.count();
                db.replace_group(group_id, &group)?;
                report.groups_updated += 1;
                debug!(
                    "Group {} now has {} files, representative {}",
                    group_id,
                    group.count(),
                    group.representative
                );
            }
            GroupChange::Dissolved => {
                report.members_removed += record
                    .files
                    .iter()
                    .filter(|f| deleted_set.contains(f.file.path.as_str()))
                    .count();
                db.delete_group(group_id)?;
                report.groups_dissolved += 1;
                debug!("Group {} dissolved", group_id);
            }
        }
    }

    for path in &deleted_set {
        report.pairs_removed += db.delete_pairs_referencing(path)?;
    }

    tx.commit()?;
    info!(
        "Applied {} deletions: {} groups updated, {} dissolved, {} pairs removed",
        deleted_set.len(),
        report.groups_updated,
        report.groups_dissolved,
        report.pairs_removed
    );
    Ok(report)
}
