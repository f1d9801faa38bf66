//! Repository file source.
//!
//! Produces the `(relative path, text)` pairs that ingestion consumes:
//!
//! 1. [`clone_repository`] validates a GitHub HTTPS URL and shallow-clones
//!    it into a temporary directory (deleted when the handle drops).
//! 2. [`scan_directory`] walks a checkout, keeps files whose extension is
//!    in `ingest.include_extensions`, skips `ingest.exclude_dirs` and files
//!    that are not valid UTF-8, and returns them sorted by path.
//! 3. [`repository_id_for`] derives the stable repository id from the URL.
//!
//! An optional access token is spliced into the clone URL and passed
//! through untouched; it never reaches logs.

use anyhow::{bail, Context, Result};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::config::IngestConfig;
use crate::models::{RepositorySource, SourceFile};

/// A cloned repository; the checkout is removed on drop.
pub struct ClonedRepository {
    dir: TempDir,
}

impl ClonedRepository {
    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

/// SHA-256 hex digest of the canonical repository URL.
pub fn repository_id_for(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Accept only `https://github.com/<owner>/<repo>` with an optional trailing slash.
pub fn validate_github_url(url: &str) -> Result<()> {
    let rest = url
        .strip_prefix("https://github.com/")
        .ok_or_else(|| anyhow::anyhow!("Invalid GitHub URL: {}", url))?;
    let rest = rest.strip_suffix('/').unwrap_or(rest);
    let parts: Vec<&str> = rest.split('/').collect();
    let valid_segment = |s: &str| {
        !s.is_empty()
            && s.chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
    };
    if parts.len() != 2 || !parts.iter().all(|p| valid_segment(p)) {
        bail!("Invalid GitHub URL: {}", url);
    }
    Ok(())
}

/// Shallow-clone `url` into a fresh temporary directory.
pub fn clone_repository(url: &str, token: Option<&str>) -> Result<ClonedRepository> {
    validate_github_url(url)?;

    let dir = tempfile::Builder::new()
        .prefix("repo-qa-")
        .tempdir()
        .context("Failed to create temporary clone directory")?;

    let clone_url = match token {
        Some(t) if !t.is_empty() => url.replacen("https://", &format!("https://{}@", t), 1),
        _ => url.to_string(),
    };

    info!(%url, dest = %dir.path().display(), "cloning repository");
    let output = Command::new("git")
        .args(["clone", "--depth", "1", "--single-branch"])
        .arg(&clone_url)
        .arg(dir.path())
        .output()
        .with_context(|| "Failed to execute 'git clone'. Is git installed?")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = match token {
            Some(t) if !t.is_empty() => stderr.replace(t, "***"),
            _ => stderr.to_string(),
        };
        bail!("git clone failed: {}", stderr.trim());
    }

    Ok(ClonedRepository { dir })
}

/// Collect the ingestible text files under `root`.
pub fn scan_directory(root: &Path, config: &IngestConfig) -> Result<Vec<SourceFile>> {
    if !root.exists() {
        bail!("Repository root does not exist: {}", root.display());
    }

    let include_set = build_include_set(&config.include_extensions)?;
    let mut files = Vec::new();

    let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
        !(entry.file_type().is_dir()
            && entry.depth() > 0
            && config
                .exclude_dirs
                .iter()
                .any(|d| entry.file_name().to_string_lossy() == d.as_str()))
    });

    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if !include_set.is_match(&rel_str) {
            continue;
        }

        match std::fs::read(path) {
            Ok(bytes) => match String::from_utf8(bytes) {
                Ok(text) => files.push(SourceFile {
                    path: rel_str,
                    text,
                }),
                Err(_) => debug!(path = %rel_str, "skipping non-UTF-8 file"),
            },
            Err(e) => debug!(path = %rel_str, error = %e, "skipping unreadable file"),
        }
    }

    // Sort for deterministic ordering
    files.sort_by(|a, b| a.path.cmp(&b.path));

    Ok(files)
}

/// Clone a GitHub repository and collect its files.
///
/// The checkout is deleted before returning, whether or not scanning
/// succeeded.
pub fn fetch_github_repository(
    url: &str,
    token: Option<&str>,
    config: &IngestConfig,
) -> Result<RepositorySource> {
    let repository_id = repository_id_for(url);
    let cloned = clone_repository(url, token)?;
    let files = scan_directory(cloned.path(), config)?;
    info!(%repository_id, files = files.len(), "scanned repository");
    Ok(RepositorySource {
        repository_id,
        files,
    })
}

/// Collect files from a local checkout; the id is derived from the
/// canonical path.
pub fn local_repository(root: &Path, config: &IngestConfig) -> Result<RepositorySource> {
    let canonical: PathBuf = root
        .canonicalize()
        .with_context(|| format!("Failed to resolve {}", root.display()))?;
    let repository_id = repository_id_for(&canonical.to_string_lossy());
    let files = scan_directory(&canonical, config)?;
    Ok(RepositorySource {
        repository_id,
        files,
    })
}

/// Case-insensitive `**/*<ext>` globs for the configured extensions.
fn build_include_set(extensions: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for ext in extensions {
        let ext = ext.trim_start_matches('.');
        let glob = GlobBuilder::new(&format!("**/*.{}", ext))
            .case_insensitive(true)
            .build()?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}
