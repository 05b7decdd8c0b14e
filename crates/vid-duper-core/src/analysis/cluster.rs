use super::pairs::Pair;
use crate::fingerprint::{FileMeta, Fingerprint};
use ahash::AHashMap;
use std::cmp::Ordering;

/// Disjoint-set forest over `0..n` with path halving and union by size.
#[derive(Debug, Clone)]
pub struct UnionFind {
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl UnionFind {
    pub fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            size: vec![1; n],
        }
    }

    pub fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    pub fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        let (big, small) = if self.size[ra] >= self.size[rb] {
            (ra, rb)
        } else {
            (rb, ra)
        };
        self.parent[small] = big;
        self.size[big] += self.size[small];
    }

    /// Connected components in order of their lowest index; members ascending.
    pub fn components(&mut self) -> Vec<Vec<usize>> {
        let mut slot_by_root: AHashMap<usize, usize> = AHashMap::new();
        let mut components: Vec<Vec<usize>> = Vec::new();
        for i in 0..self.parent.len() {
            let root = self.find(i);
            let slot = *slot_by_root.entry(root).or_insert_with(|| {
                components.push(Vec::new());
                components.len() - 1
            });
            components[slot].push(i);
        }
        components
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupMember {
    pub file: FileMeta,
    pub is_representative: bool,
}

/// A set of two or more files that match each other, directly or transitively.
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateGroup {
    pub representative: String,
    pub members: Vec<GroupMember>,
    pub total_size: u64,
}

impl DuplicateGroup {
    /// Build a group from its members, choosing the representative and
    /// computing the total size. `None` for fewer than two members.
    pub fn from_members(files: Vec<FileMeta>) -> Option<Self> {
        if files.len() < 2 {
            return None;
        }
        let best = select_representative(&files)?;
        let representative = files[best].path.clone();
        let total_size = files.iter().map(|f| f.size).sum();
        let members = files
            .into_iter()
            .enumerate()
            .map(|(i, file)| GroupMember {
                file,
                is_representative: i == best,
            })
            .collect();
        Some(Self {
            representative,
            members,
            total_size,
        })
    }

    pub fn count(&self) -> usize {
        self.members.len()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.members.iter().any(|m| m.file.path == path)
    }
}

/// Rank two files as keepers: longer duration, then larger resolution area,
/// then larger byte size.
fn keeper_order(a: &FileMeta, b: &FileMeta) -> Ordering {
    a.duration
        .partial_cmp(&b.duration)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.area().cmp(&b.area()))
        .then_with(|| a.size.cmp(&b.size))
}

/// Index of the best copy among `files`. Full ties keep the first encountered.
pub fn select_representative(files: &[FileMeta]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, file) in files.iter().enumerate() {
        match best {
            Some(b) if keeper_order(file, &files[b]) != Ordering::Greater => {}
            _ => best = Some(i),
        }
    }
    best
}

/// Union matched files into connected components and turn every component of
/// two or more files into a [`DuplicateGroup`].
pub fn build_groups(fingerprints: &[Fingerprint], pairs: &[Pair]) -> Vec<DuplicateGroup> {
    let index_by_path: AHashMap<&str, usize> = fingerprints
        .iter()
        .enumerate()
        .map(|(i, fp)| (fp.path(), i))
        .collect();

    let mut sets = UnionFind::new(fingerprints.len());
    for pair in pairs {
        let a = index_by_path.get(pair.a.path.as_str());
        let b = index_by_path.get(pair.b.path.as_str());
        if let (Some(&a), Some(&b)) = (a, b) {
            sets.union(a, b);
        }
    }

    sets.components()
        .into_iter()
        .filter(|component| component.len() >= 2)
        .filter_map(|component| {
            let files = component
                .into_iter()
                .map(|i| fingerprints[i].file.clone())
                .collect();
            DuplicateGroup::from_members(files)
        })
        .collect()
}
