use crate::{
    api::{
        AddRequest, ApiError, EditOutput, MaintenanceRequest, MoveRequest, PhaseArg,
        RelocateRequest, RemoveRequest, RewritePathsRequest, SyncPhaseRequest, SyncRequest,
        TreeOutput, TreeRequest, ValidateOutput, ValidateRequest, Violation, WriteOptions,
    },
    config::{Overrides, Settings},
    edit::{self, AddFileOptions, EditReport, SyncPhaseOptions},
    project::{PbxProject, project_name_from_path},
    scan::find_unreferenced,
    store::Transaction,
    tree::{build_tree, render_tree},
    validate::{ValidateOptions, introduced, validate as check},
};

mod support;

use support::{
    map_config_error, map_edit_error, map_project_error, map_store_error, overrides,
    read_project, validate_error, write_options,
};

/// What an edit closure hands back to the transaction.
#[derive(Debug, Default)]
struct Applied {
    report: EditReport,
    unreferenced: Vec<String>,
}

impl From<EditReport> for Applied {
    fn from(report: EditReport) -> Self {
        Self {
            report,
            unreferenced: vec![],
        }
    }
}

pub fn validate(req: ValidateRequest) -> ValidateOutput {
    let settings = match Settings::resolve(&overrides(&req.repo_root, &req.project, None, None)) {
        Ok(s) => s,
        Err(e) => return validate_error(None, map_config_error(e)),
    };
    let project_path = settings.project_path.display().to_string();
    let (project, sha256) = match read_project(&settings.project_path) {
        Ok(v) => v,
        Err(e) => return validate_error(Some(project_path), e),
    };
    let opts = ValidateOptions {
        disk_root: req
            .check_disk
            .unwrap_or(false)
            .then(|| PbxProject::project_root(&settings.project_path)),
    };
    let violations = check(&project, &opts);
    let blocking = violations.iter().filter(|v| v.is_blocking()).count();
    tracing::info!(
        project = %project_path,
        objects = project.objects.len(),
        blocking,
        "validated project"
    );
    ValidateOutput {
        ok: blocking == 0,
        error: None,
        project_path: Some(project_path),
        sha256: Some(sha256),
        objects: project.objects.len(),
        blocking,
        observations: violations.len() - blocking,
        violations,
        summary_md: None,
        payload_meta: None,
    }
}

pub fn tree(req: TreeRequest) -> TreeOutput {
    let failed = |project_path: Option<String>, error: ApiError| TreeOutput {
        ok: false,
        error: Some(error),
        project_path,
        rendered: None,
        root: None,
        summary_md: None,
    };
    let settings = match Settings::resolve(&overrides(&req.repo_root, &req.project, None, None)) {
        Ok(s) => s,
        Err(e) => return failed(None, map_config_error(e)),
    };
    let project_path = settings.project_path.display().to_string();
    let (project, _) = match read_project(&settings.project_path) {
        Ok(v) => v,
        Err(e) => return failed(Some(project_path), e),
    };
    let disk_root = req
        .check_disk
        .unwrap_or(false)
        .then(|| PbxProject::project_root(&settings.project_path));
    let Some(root) = build_tree(&project, disk_root.as_deref()) else {
        return failed(
            Some(project_path),
            ApiError::new("edit.missing_main_group", "project has no main group"),
        );
    };
    TreeOutput {
        ok: true,
        error: None,
        project_path: Some(project_path),
        rendered: Some(render_tree(&root)),
        root: Some(root),
        summary_md: None,
    }
}

pub fn add(req: AddRequest) -> EditOutput {
    let write = match write_options(req.dry_run, req.backup, &req.expect_sha256) {
        Ok(w) => w,
        Err(e) => return EditOutput::failed("add", None, e),
    };
    let ov = overrides(&req.repo_root, &req.project, req.target.as_ref(), req.backup);
    run_edit("add", &ov, &write, |project, settings| {
        let opts = AddFileOptions {
            target: settings.target.clone(),
            group_path: req.group.clone(),
            phase: req.phase.unwrap_or_default(),
            create_groups: req.create_groups.unwrap_or(false),
        };
        let mut report = EditReport::default();
        for path in &req.paths {
            report.extend(edit::add_file(project, &settings.file_types, path, &opts)?);
        }
        Ok(report.into())
    })
}

pub fn remove(req: RemoveRequest) -> EditOutput {
    let write = match write_options(req.dry_run, req.backup, &req.expect_sha256) {
        Ok(w) => w,
        Err(e) => return EditOutput::failed("remove", None, e),
    };
    let ov = overrides(&req.repo_root, &req.project, None, req.backup);
    run_edit("remove", &ov, &write, |project, _| {
        let mut report = EditReport::default();
        for path in &req.paths {
            report.extend(edit::remove_file(project, path)?);
        }
        Ok(report.into())
    })
}

pub fn move_files(req: MoveRequest) -> EditOutput {
    let write = match write_options(req.dry_run, req.backup, &req.expect_sha256) {
        Ok(w) => w,
        Err(e) => return EditOutput::failed("move", None, e),
    };
    let ov = overrides(&req.repo_root, &req.project, None, req.backup);
    run_edit("move", &ov, &write, |project, settings| {
        Ok(edit::move_to_target(
            project,
            &settings.file_types,
            &req.paths,
            req.from_target.as_deref(),
            req.to_target.as_deref(),
            req.phase.unwrap_or_default(),
        )?
        .into())
    })
}

pub fn dedupe(req: MaintenanceRequest) -> EditOutput {
    maintenance("dedupe", req, edit::dedupe)
}

pub fn repair(req: MaintenanceRequest) -> EditOutput {
    maintenance("repair", req, edit::repair)
}

fn maintenance(
    op: &str,
    req: MaintenanceRequest,
    pass: fn(&mut PbxProject) -> EditReport,
) -> EditOutput {
    let write = match write_options(req.dry_run, req.backup, &req.expect_sha256) {
        Ok(w) => w,
        Err(e) => return EditOutput::failed(op, None, e),
    };
    let ov = overrides(&req.repo_root, &req.project, None, req.backup);
    run_edit(op, &ov, &write, |project, _| Ok(pass(project).into()))
}

pub fn rewrite_paths(req: RewritePathsRequest) -> EditOutput {
    let write = match write_options(req.dry_run, req.backup, &req.expect_sha256) {
        Ok(w) => w,
        Err(e) => return EditOutput::failed("rewrite_paths", None, e),
    };
    let ov = overrides(&req.repo_root, &req.project, None, req.backup);
    run_edit("rewrite_paths", &ov, &write, |project, settings| {
        let rules = match &req.rules {
            Some(rules) if !rules.is_empty() => rules.as_slice(),
            _ => settings.rewrite.as_slice(),
        };
        if rules.is_empty() {
            return Err(ApiError::new(
                "edit.invalid_argument",
                "no rewrite rules given and none configured in pbxproj.toml",
            ));
        }
        Ok(edit::rewrite_paths(project, rules)?.into())
    })
}

pub fn relocate(req: RelocateRequest) -> EditOutput {
    let write = match write_options(req.dry_run, req.backup, &req.expect_sha256) {
        Ok(w) => w,
        Err(e) => return EditOutput::failed("relocate", None, e),
    };
    let ov = overrides(&req.repo_root, &req.project, None, req.backup);
    run_edit("relocate", &ov, &write, |project, _| {
        Ok(edit::relocate(project, &req.moves)?.into())
    })
}

pub fn sync_phase(req: SyncPhaseRequest) -> EditOutput {
    let write = match write_options(req.dry_run, req.backup, &req.expect_sha256) {
        Ok(w) => w,
        Err(e) => return EditOutput::failed("sync_phase", None, e),
    };
    let ov = overrides(&req.repo_root, &req.project, req.target.as_ref(), req.backup);
    run_edit("sync_phase", &ov, &write, |project, settings| {
        let opts = SyncPhaseOptions {
            target: settings.target.clone(),
            group_path: req.group.clone(),
            phase: req.phase.unwrap_or_default(),
            rebuild: req.rebuild.unwrap_or(false),
        };
        Ok(edit::sync_phase(project, &settings.file_types, &opts)?.into())
    })
}

/// Adds every unreferenced file on disk that the scan globs select.
pub fn sync(req: SyncRequest) -> EditOutput {
    let write = match write_options(req.dry_run, req.backup, &req.expect_sha256) {
        Ok(w) => w,
        Err(e) => return EditOutput::failed("sync", None, e),
    };
    let ov = overrides(&req.repo_root, &req.project, req.target.as_ref(), req.backup);
    run_edit("sync", &ov, &write, |project, settings| {
        let include = req
            .include_globs
            .clone()
            .unwrap_or_else(|| settings.scan.include_globs.clone());
        let exclude = req
            .exclude_globs
            .clone()
            .unwrap_or_else(|| settings.scan.exclude_globs.clone());
        let root = PbxProject::project_root(&settings.project_path);
        let unreferenced = find_unreferenced(&root, project, &include, &exclude)
            .map_err(|e| ApiError::new("scan.invalid_glob", e))?;
        let opts = AddFileOptions {
            target: settings.target.clone(),
            group_path: None,
            phase: PhaseArg::Auto,
            create_groups: true,
        };
        let mut report = EditReport::default();
        for path in &unreferenced {
            report.extend(edit::add_file(project, &settings.file_types, path, &opts)?);
        }
        Ok(Applied {
            report,
            unreferenced,
        })
    })
}

impl From<edit::EditError> for ApiError {
    fn from(err: edit::EditError) -> Self {
        map_edit_error(err)
    }
}

/// Load, edit, re-validate, write. The file is left untouched unless the
/// edit changed something and introduced no blocking violation.
fn run_edit<F>(op: &str, ov: &Overrides, write: &WriteOptions, edit: F) -> EditOutput
where
    F: FnOnce(&mut PbxProject, &Settings) -> Result<Applied, ApiError>,
{
    let settings = match Settings::resolve(ov) {
        Ok(s) => s,
        Err(e) => return EditOutput::failed(op, None, map_config_error(e)),
    };
    let path = settings.project_path.clone();
    let project_path = Some(path.display().to_string());

    let tx = match Transaction::open(&path) {
        Ok(tx) => tx,
        Err(e) => return EditOutput::failed(op, project_path, map_store_error(e)),
    };
    let mut project = match PbxProject::parse(tx.text(), project_name_from_path(&path)) {
        Ok(p) => p,
        Err(e) => {
            return EditOutput::failed(op, project_path, map_project_error(e.with_path(path)));
        }
    };

    let before = check(&project, &ValidateOptions::default());
    let applied = match edit(&mut project, &settings) {
        Ok(a) => a,
        Err(e) => return EditOutput::failed(op, project_path, e),
    };
    let changes = applied.report.changes;
    let mut out = EditOutput {
        ok: true,
        error: None,
        op: op.to_string(),
        project_path: project_path.clone(),
        changes,
        violations: vec![],
        unreferenced: applied.unreferenced,
        commit: None,
        summary_md: None,
        payload_meta: None,
    };
    if out.changes.is_empty() {
        tracing::info!(op, project = %path.display(), "nothing to change");
        out.violations = blocking_only(before);
        return out;
    }

    let after = check(&project, &ValidateOptions::default());
    let new = introduced(&before, &after);
    if !new.is_empty() {
        tracing::warn!(op, project = %path.display(), introduced = new.len(), "edit refused");
        out.ok = false;
        out.error = Some(ApiError::new(
            "edit.introduced_violation",
            format!(
                "edit would introduce {} blocking violation(s), first: {}",
                new.len(),
                new[0].message
            ),
        ));
        out.violations = new;
        return out;
    }

    let backup = write.backup.unwrap_or(settings.backup);
    match tx.commit(&project.to_pbxproj_string(), write, backup) {
        Ok(commit) => {
            tracing::info!(
                op,
                project = %path.display(),
                changes = out.changes.len(),
                written = commit.written,
                "edit finished"
            );
            out.commit = Some(commit);
        }
        Err(e) => {
            out.ok = false;
            out.error = Some(map_store_error(e));
        }
    }
    out.violations = blocking_only(after);
    out
}

fn blocking_only(violations: Vec<Violation>) -> Vec<Violation> {
    violations.into_iter().filter(Violation::is_blocking).collect()
}

