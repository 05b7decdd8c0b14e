pub mod cluster;
pub mod deletion;
pub mod maintenance;
pub mod matcher;
pub mod pairs;

pub use cluster::{build_groups, select_representative, DuplicateGroup, GroupMember};
pub use matcher::{hamming, sequence_similarity};
pub use pairs::{compare_all, MatchLabel, MatchOptions, Pair};
