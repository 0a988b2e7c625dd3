use crate::api::{CommitSummary, WriteOptions};
use crate::hash::sha256_hex;
use fs4::fs_std::FileExt;
use similar::TextDiff;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

pub const PROJECT_FILE: &str = "project.pbxproj";
const LOCK_FILE: &str = ".pbxproj-mcp.lock";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("no Xcode project found at {0} (pass a .pbxproj, an .xcodeproj, or a directory holding one)")]
    ProjectNotFound(PathBuf),
    #[error("{dir} holds several .xcodeproj bundles ({}); pass one explicitly", .candidates.join(", "))]
    ProjectAmbiguous {
        dir: PathBuf,
        candidates: Vec<String>,
    },
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("another edit of {path} is in progress ({message})")]
    Locked { path: PathBuf, message: String },
    #[error("project changed since it was read: expected sha256 {expected}, found {actual}")]
    Conflict { expected: String, actual: String },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl StoreError {
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::ProjectNotFound(_) => "store.project_not_found",
            StoreError::ProjectAmbiguous { .. } => "store.project_ambiguous",
            StoreError::Read { .. } => "store.read_failed",
            StoreError::Locked { .. } => "store.locked",
            StoreError::Conflict { .. } => "store.conflict",
            StoreError::Write { .. } => "store.write_failed",
        }
    }
}

/// Accepts a `project.pbxproj`, an `.xcodeproj` bundle, or a directory
/// holding exactly one `.xcodeproj`.
pub fn resolve_project_path(arg: &Path) -> Result<PathBuf, StoreError> {
    if arg.is_file() {
        return if arg.extension().is_some_and(|e| e == "pbxproj") {
            Ok(arg.to_path_buf())
        } else {
            Err(StoreError::ProjectNotFound(arg.to_path_buf()))
        };
    }
    if !arg.is_dir() {
        return Err(StoreError::ProjectNotFound(arg.to_path_buf()));
    }
    if arg.extension().is_some_and(|e| e == "xcodeproj") {
        let file = arg.join(PROJECT_FILE);
        return if file.is_file() {
            Ok(file)
        } else {
            Err(StoreError::ProjectNotFound(arg.to_path_buf()))
        };
    }

    let read = fs::read_dir(arg).map_err(|source| StoreError::Read {
        path: arg.to_path_buf(),
        source,
    })?;
    let mut bundles: Vec<PathBuf> = read
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_dir() && p.extension().is_some_and(|e| e == "xcodeproj"))
        .filter(|p| p.join(PROJECT_FILE).is_file())
        .collect();
    bundles.sort();
    match bundles.as_slice() {
        [] => Err(StoreError::ProjectNotFound(arg.to_path_buf())),
        [one] => Ok(one.join(PROJECT_FILE)),
        many => Err(StoreError::ProjectAmbiguous {
            dir: arg.to_path_buf(),
            candidates: many
                .iter()
                .filter_map(|p| p.file_name())
                .map(|n| n.to_string_lossy().to_string())
                .collect(),
        }),
    }
}

/// One read-modify-write of a project file. The lock is held until drop.
#[derive(Debug)]
pub struct Transaction {
    path: PathBuf,
    text: String,
    sha256: String,
    _lock: File,
}

impl Transaction {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let lock_path = path
            .parent()
            .map(|dir| dir.join(LOCK_FILE))
            .unwrap_or_else(|| PathBuf::from(LOCK_FILE));
        let lock = fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&lock_path)
            .map_err(|source| StoreError::Write {
                path: lock_path.clone(),
                source,
            })?;
        lock.try_lock_exclusive()
            .map_err(|e| StoreError::Locked {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        let text = fs::read_to_string(path).map_err(|source| StoreError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let sha256 = sha256_hex(text.as_bytes());
        tracing::debug!(project = %path.display(), sha256 = %sha256, "opened project");
        Ok(Self {
            path: path.to_path_buf(),
            text,
            sha256,
            _lock: lock,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn sha256(&self) -> &str {
        &self.sha256
    }

    /// Writes `new_text` over the project unless it is unchanged, a dry run,
    /// or the file no longer matches `expect_sha256`.
    pub fn commit(
        &self,
        new_text: &str,
        opts: &WriteOptions,
        backup: bool,
    ) -> Result<CommitSummary, StoreError> {
        if let Some(expected) = &opts.expect_sha256
            && !expected.eq_ignore_ascii_case(&self.sha256)
        {
            return Err(StoreError::Conflict {
                expected: expected.clone(),
                actual: self.sha256.clone(),
            });
        }

        let sha256_after = sha256_hex(new_text.as_bytes());
        let mut summary = CommitSummary {
            written: false,
            dry_run: opts.dry_run,
            sha256_before: self.sha256.clone(),
            sha256_after,
            backup_path: None,
            diff: None,
        };
        if new_text == self.text {
            return Ok(summary);
        }
        if opts.dry_run {
            summary.diff = Some(unified_diff(&self.text, new_text));
            return Ok(summary);
        }

        if backup {
            let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S%.3fZ");
            let backup_path = self.path.with_extension(format!("pbxproj.{stamp}.bak"));
            fs::write(&backup_path, &self.text).map_err(|source| StoreError::Write {
                path: backup_path.clone(),
                source,
            })?;
            summary.backup_path = Some(backup_path.display().to_string());
        }

        let tmp = self
            .path
            .with_extension(format!("pbxproj.tmp.{}", std::process::id()));
        fs::write(&tmp, new_text).map_err(|source| StoreError::Write {
            path: tmp.clone(),
            source,
        })?;
        if let Err(source) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(StoreError::Write {
                path: self.path.clone(),
                source,
            });
        }
        summary.written = true;
        tracing::info!(
            project = %self.path.display(),
            sha256 = %summary.sha256_after,
            "wrote project"
        );
        Ok(summary)
    }
}

fn unified_diff(before: &str, after: &str) -> String {
    TextDiff::from_lines(before, after)
        .unified_diff()
        .context_radius(3)
        .header("a/project.pbxproj", "b/project.pbxproj")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project_dir(root: &Path, name: &str, text: &str) -> PathBuf {
        let bundle = root.join(name);
        fs::create_dir_all(&bundle).unwrap();
        let file = bundle.join(PROJECT_FILE);
        fs::write(&file, text).unwrap();
        file
    }

    #[test]
    fn resolves_file_bundle_and_parent_dir() {
        let dir = tempfile::tempdir().unwrap();
        let file = project_dir(dir.path(), "App.xcodeproj", "// !$*UTF8*$!\n{}\n");

        assert_eq!(resolve_project_path(&file).unwrap(), file);
        assert_eq!(
            resolve_project_path(&dir.path().join("App.xcodeproj")).unwrap(),
            file
        );
        assert_eq!(resolve_project_path(dir.path()).unwrap(), file);

        project_dir(dir.path(), "Other.xcodeproj", "{}");
        let err = resolve_project_path(dir.path()).unwrap_err();
        assert_eq!(err.code(), "store.project_ambiguous");
        assert!(err.to_string().contains("App.xcodeproj, Other.xcodeproj"));

        let empty = tempfile::tempdir().unwrap();
        let err = resolve_project_path(empty.path()).unwrap_err();
        assert_eq!(err.code(), "store.project_not_found");
    }

    #[test]
    fn commit_writes_with_backup_and_skips_identical_text() {
        let dir = tempfile::tempdir().unwrap();
        let file = project_dir(dir.path(), "App.xcodeproj", "old\n");
        let tx = Transaction::open(&file).unwrap();
        assert_eq!(tx.sha256(), sha256_hex(b"old\n"));

        let same = tx.commit("old\n", &WriteOptions::default(), true).unwrap();
        assert!(!same.written);
        assert!(same.backup_path.is_none());

        let out = tx.commit("new\n", &WriteOptions::default(), true).unwrap();
        assert!(out.written);
        assert_eq!(fs::read_to_string(&file).unwrap(), "new\n");
        let backup = PathBuf::from(out.backup_path.unwrap());
        assert_eq!(fs::read_to_string(&backup).unwrap(), "old\n");
        assert!(backup.file_name().unwrap().to_string_lossy().ends_with(".bak"));
        assert_eq!(out.sha256_after, sha256_hex(b"new\n"));
    }

    #[test]
    fn dry_run_returns_diff_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let file = project_dir(dir.path(), "App.xcodeproj", "a\nb\n");
        let tx = Transaction::open(&file).unwrap();
        let opts = WriteOptions {
            dry_run: true,
            ..WriteOptions::default()
        };
        let out = tx.commit("a\nc\n", &opts, true).unwrap();
        assert!(!out.written);
        let diff = out.diff.unwrap();
        assert!(diff.contains("-b\n"), "{diff}");
        assert!(diff.contains("+c\n"), "{diff}");
        assert_eq!(fs::read_to_string(&file).unwrap(), "a\nb\n");
    }

    #[test]
    fn stale_expectation_and_second_writer_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        let file = project_dir(dir.path(), "App.xcodeproj", "a\n");
        let tx = Transaction::open(&file).unwrap();

        let err = Transaction::open(&file).unwrap_err();
        assert_eq!(err.code(), "store.locked");

        let opts = WriteOptions {
            expect_sha256: Some("0".repeat(64)),
            ..WriteOptions::default()
        };
        let err = tx.commit("b\n", &opts, false).unwrap_err();
        assert_eq!(err.code(), "store.conflict");
        assert_eq!(fs::read_to_string(&file).unwrap(), "a\n");

        drop(tx);
        assert!(Transaction::open(&file).is_ok());
    }
}
