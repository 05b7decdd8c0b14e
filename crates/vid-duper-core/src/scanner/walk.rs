use crate::config::non_overlapping_directories;
use glob::Pattern;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};
use walkdir::WalkDir;

/// Lowercase each extension and give it a leading dot, dropping blanks.
/// `"MP4"`, `".mp4"` and `" mp4 "` all become `".mp4"`.
pub fn normalize_extensions(exts: &[String]) -> Vec<String> {
    let mut normalized: Vec<String> = exts
        .iter()
        .map(|e| e.trim().trim_start_matches('.').to_lowercase())
        .filter(|e| !e.is_empty())
        .map(|e| format!(".{}", e))
        .collect();
    normalized.sort();
    normalized.dedup();
    normalized
}

fn has_wanted_extension(path: &Path, exts: &[String]) -> bool {
    match path.extension() {
        Some(ext) => {
            let dotted = format!(".{}", ext.to_string_lossy().to_lowercase());
            exts.iter().any(|e| *e == dotted)
        }
        None => false,
    }
}

/// Replace a leading `~` with the user's home directory. Other paths,
/// including `~user` forms, are returned unchanged.
pub fn expand_home(root: &str) -> String {
    let rest = match root.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
        _ => return root.to_string(),
    };
    match dirs::home_dir() {
        Some(home) => format!("{}{}", home.to_string_lossy(), rest),
        None => {
            warn!("No home directory, leaving {} as is", root);
            root.to_string()
        }
    }
}

fn compile_patterns(ignore_globs: &[String]) -> Vec<Pattern> {
    ignore_globs
        .iter()
        .filter_map(|glob| match Pattern::new(glob) {
            Ok(p) => Some(p),
            Err(e) => {
                error!("Invalid glob pattern '{}': {}", glob, e);
                None
            }
        })
        .collect()
}

/// Collect every video file under `roots`, sorted and de-duplicated.
///
/// A leading `~` in a root expands to the home directory. A root may be a
/// single file, which is kept when its extension matches.
/// Directories are walked recursively without following symlinks. Anything
/// matching an ignore glob is skipped, including whole directories.
/// Unreadable entries and missing roots are logged and skipped.
pub fn gather_videos(roots: &[String], exts: &[String], ignore_globs: &[String]) -> Vec<PathBuf> {
    let exts = normalize_extensions(exts);
    let ignore_patterns = compile_patterns(ignore_globs);
    let roots: Vec<String> = roots
        .iter()
        .map(|r| r.trim())
        .filter(|r| !r.is_empty())
        .map(expand_home)
        .collect();
    let roots = non_overlapping_directories(roots);
    debug!("Gathering videos under {:?}", roots);

    let mut found: Vec<PathBuf> = roots
        .par_iter()
        .flat_map_iter(|root| walk_root(Path::new(root), &exts, &ignore_patterns))
        .collect();

    found.sort();
    found.dedup();
    found
}

fn walk_root(root: &Path, exts: &[String], ignore_patterns: &[Pattern]) -> Vec<PathBuf> {
    let ignored = |path: &Path| ignore_patterns.iter().any(|p| p.matches_path(path));

    if root.is_file() {
        if has_wanted_extension(root, exts) && !ignored(root) {
            return vec![root.to_path_buf()];
        }
        return Vec::new();
    }
    if !root.is_dir() {
        warn!("Root {} does not exist, skipping", root.display());
        return Vec::new();
    }

    WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| !ignored(entry.path()))
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!("Skipping unreadable entry: {}", err);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| has_wanted_extension(entry.path(), exts))
        .map(|entry| entry.into_path())
        .collect()
}
