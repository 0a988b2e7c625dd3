use pbxproj_mcp::api::{ChangeKind, EditOutput, ValidateOutput};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

const FIXTURE: &str = concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/tests/fixtures/App.xcodeproj/project.pbxproj"
);

fn fixture_repo() -> tempfile::TempDir {
    let dir = tempfile::tempdir().expect("temp repo");
    let proj = dir.path().join("App.xcodeproj");
    std::fs::create_dir_all(&proj).expect("mkdir App.xcodeproj");
    std::fs::copy(FIXTURE, proj.join("project.pbxproj")).expect("copy fixture");
    for file in [
        "App/AppApp.swift",
        "App/ContentView.swift",
        "App/Info.plist",
        "AppTests/AppTests.swift",
    ] {
        let path = dir.path().join(file);
        std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        std::fs::write(path, "// fixture\n").expect("write source");
    }
    std::fs::create_dir_all(dir.path().join("App/Assets.xcassets")).expect("mkdir assets");
    dir
}

fn pbxproj(root: &Path) -> PathBuf {
    root.join("App.xcodeproj/project.pbxproj")
}

fn run(root: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_pbxproj-mcp"))
        .args(args)
        .arg("--repo-root")
        .arg(root)
        .env_remove("PBXPROJ_PROJECT")
        .env_remove("PBXPROJ_TARGET")
        .env_remove("PBXPROJ_BACKUP")
        .output()
        .expect("run pbxproj-mcp")
}

fn edit_output(out: &Output) -> EditOutput {
    serde_json::from_slice(&out.stdout).unwrap_or_else(|e| {
        panic!(
            "parse EditOutput: {e}; stdout={} stderr={}",
            String::from_utf8_lossy(&out.stdout),
            String::from_utf8_lossy(&out.stderr)
        )
    })
}

#[test]
fn validate_reports_clean_fixture() {
    let repo = fixture_repo();
    let out = run(repo.path(), &["validate", "--check-disk"]);
    assert!(
        out.status.success(),
        "validate failed: stderr={}",
        String::from_utf8_lossy(&out.stderr)
    );
    let parsed: ValidateOutput = serde_json::from_slice(&out.stdout).expect("parse ValidateOutput");
    assert!(parsed.ok, "violations={:?}", parsed.violations);
    assert_eq!(parsed.blocking, 0);
    assert_eq!(parsed.sha256.as_deref().map(str::len), Some(64));
    assert!(parsed.summary_md.is_some_and(|md| md.contains("**Status:** pass")));
}

#[test]
fn tree_prints_navigator_text() {
    let repo = fixture_repo();
    let out = run(repo.path(), &["tree"]);
    assert!(out.status.success());
    let text = String::from_utf8_lossy(&out.stdout);
    assert!(text.contains("App/ [group]"), "{text}");
    assert!(text.contains("ContentView.swift (sourcecode.swift)"), "{text}");
}

#[test]
fn add_dry_run_shows_diff_without_writing() {
    let repo = fixture_repo();
    let before = std::fs::read_to_string(pbxproj(repo.path())).expect("read");

    let out = run(repo.path(), &["add", "App/Profile.swift", "--dry-run"]);
    assert!(out.status.success(), "stderr={}", String::from_utf8_lossy(&out.stderr));
    let parsed = edit_output(&out);
    assert!(parsed.ok, "error={:?}", parsed.error);
    let commit = parsed.commit.expect("commit summary");
    assert!(commit.dry_run);
    assert!(!commit.written);
    let diff = commit.diff.expect("diff");
    assert!(diff.contains("+\t\t\t\t") && diff.contains("Profile.swift"), "{diff}");
    assert_eq!(std::fs::read_to_string(pbxproj(repo.path())).expect("read"), before);
}

#[test]
fn add_writes_file_ref_build_file_and_backup() {
    let repo = fixture_repo();
    let out = run(repo.path(), &["add", "App/Profile.swift"]);
    assert!(out.status.success(), "stderr={}", String::from_utf8_lossy(&out.stderr));
    let parsed = edit_output(&out);
    assert!(parsed.ok, "error={:?}", parsed.error);
    let kinds: Vec<ChangeKind> = parsed.changes.iter().map(|c| c.kind).collect();
    assert!(kinds.contains(&ChangeKind::AddedFileRef));
    assert!(kinds.contains(&ChangeKind::AddedBuildFile));
    let commit = parsed.commit.expect("commit");
    assert!(commit.written);
    let backup = commit.backup_path.expect("backup path");
    assert!(Path::new(&backup).is_file(), "missing backup {backup}");

    let text = std::fs::read_to_string(pbxproj(repo.path())).expect("read");
    assert!(text.contains("/* Profile.swift in Sources */"));

    // second add is a no-op and leaves the file alone
    let out = run(repo.path(), &["add", "App/Profile.swift", "--no-backup"]);
    let parsed = edit_output(&out);
    assert!(parsed.ok);
    assert!(parsed.changes.is_empty());
    assert!(parsed.commit.is_none());
    assert_eq!(std::fs::read_to_string(pbxproj(repo.path())).expect("read"), text);

    let out = run(repo.path(), &["validate"]);
    assert!(out.status.success(), "stdout={}", String::from_utf8_lossy(&out.stdout));
}

#[test]
fn stale_expect_sha256_is_a_conflict() {
    let repo = fixture_repo();
    let before = std::fs::read_to_string(pbxproj(repo.path())).expect("read");
    let stale = "0".repeat(64);
    let out = run(
        repo.path(),
        &["remove", "App/ContentView.swift", "--expect-sha256", &stale],
    );
    assert_eq!(out.status.code(), Some(1));
    let parsed = edit_output(&out);
    assert!(!parsed.ok);
    assert_eq!(parsed.error.expect("error").code, "store.conflict");
    assert_eq!(std::fs::read_to_string(pbxproj(repo.path())).expect("read"), before);
}

#[test]
fn unknown_target_fails_with_edit_code() {
    let repo = fixture_repo();
    let out = run(
        repo.path(),
        &["add", "App/Profile.swift", "--target", "Widget", "--no-backup"],
    );
    assert_eq!(out.status.code(), Some(1));
    let parsed = edit_output(&out);
    assert_eq!(parsed.error.expect("error").code, "edit.target_not_found");
}

fn backups(root: &Path) -> Vec<String> {
    std::fs::read_dir(root.join("App.xcodeproj"))
        .expect("read bundle")
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .filter(|name| name.ends_with(".bak"))
        .collect()
}

#[test]
fn edit_that_breaks_references_is_refused() {
    let repo = fixture_repo();
    let before = std::fs::read(pbxproj(repo.path())).expect("read");

    // App.app is the App target's productReference
    let out = run(repo.path(), &["remove", "7BF000000000000000000006"]);
    assert_eq!(out.status.code(), Some(1));
    let parsed = edit_output(&out);
    assert!(!parsed.ok);
    assert_eq!(
        parsed.error.as_ref().expect("error").code,
        "edit.introduced_violation"
    );
    assert!(parsed.commit.is_none());
    assert!(
        parsed
            .violations
            .iter()
            .any(|v| v.code == "pbx.dangling_reference" && v.is_blocking()),
        "violations={:?}",
        parsed.violations
    );
    assert_eq!(std::fs::read(pbxproj(repo.path())).expect("read"), before);
    assert!(backups(repo.path()).is_empty());
}

#[test]
fn sync_adds_new_sources_under_mirrored_groups() {
    let repo = fixture_repo();
    let views = repo.path().join("App/Views");
    std::fs::create_dir_all(&views).expect("mkdir Views");
    std::fs::write(views.join("New.swift"), "// new\n").expect("write New.swift");

    let out = run(repo.path(), &["sync", "--no-backup"]);
    assert!(out.status.success(), "stderr={}", String::from_utf8_lossy(&out.stderr));
    let parsed = edit_output(&out);
    assert!(parsed.ok, "error={:?}", parsed.error);
    assert_eq!(parsed.unreferenced, vec!["App/Views/New.swift".to_string()]);
    let kinds: Vec<ChangeKind> = parsed.changes.iter().map(|c| c.kind).collect();
    for kind in [
        ChangeKind::CreatedGroup,
        ChangeKind::AddedFileRef,
        ChangeKind::AddedBuildFile,
        ChangeKind::AddedToPhase,
    ] {
        assert!(kinds.contains(&kind), "missing {kind:?} in {kinds:?}");
    }
    assert!(parsed.commit.expect("commit").written);

    let text = std::fs::read_to_string(pbxproj(repo.path())).expect("read");
    assert!(text.contains("/* Views */ = {"), "{text}");
    assert!(text.contains("path = Views;"));
    assert!(text.contains("/* New.swift in Sources */"));

    let out = run(repo.path(), &["sync", "--no-backup"]);
    let parsed = edit_output(&out);
    assert!(parsed.ok);
    assert!(parsed.unreferenced.is_empty());
    assert!(parsed.changes.is_empty());
}

#[test]
fn sync_with_bad_glob_fails_with_scan_code() {
    let repo = fixture_repo();
    let before = std::fs::read(pbxproj(repo.path())).expect("read");
    let out = run(repo.path(), &["sync", "--include", "App/[", "--no-backup"]);
    assert_eq!(out.status.code(), Some(1));
    let parsed = edit_output(&out);
    assert_eq!(parsed.error.expect("error").code, "scan.invalid_glob");
    assert_eq!(std::fs::read(pbxproj(repo.path())).expect("read"), before);
}

#[test]
fn usage_errors_exit_with_code_2() {
    let repo = fixture_repo();
    let out = run(repo.path(), &["add", "--target"]);
    assert_eq!(out.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&out.stderr).contains("--target requires a value"));

    let out = Command::new(env!("CARGO_BIN_EXE_pbxproj-mcp"))
        .arg("frobnicate")
        .output()
        .expect("run pbxproj-mcp");
    assert_eq!(out.status.code(), Some(2));
}

#[test]
fn missing_project_is_reported() {
    let dir = tempfile::tempdir().expect("temp dir");
    let out = run(dir.path(), &["validate"]);
    assert_eq!(out.status.code(), Some(1));
    let parsed: ValidateOutput = serde_json::from_slice(&out.stdout).expect("parse");
    assert_eq!(parsed.error.expect("error").code, "store.project_not_found");
}
