use crate::{
    api::{ApiError, ValidateOutput, WriteOptions},
    config::{ConfigError, Overrides},
    edit::EditError,
    hash::{is_sha256_hex, sha256_hex},
    project::{PbxProject, ProjectError, project_name_from_path},
    store::StoreError,
};
use std::path::Path;

pub(super) fn map_config_error(err: ConfigError) -> ApiError {
    ApiError::new(err.code(), err.to_string())
}

pub(super) fn map_store_error(err: StoreError) -> ApiError {
    ApiError::new(err.code(), err.to_string())
}

pub(super) fn map_project_error(err: ProjectError) -> ApiError {
    ApiError::new(err.code(), err.to_string())
}

pub(super) fn map_edit_error(err: EditError) -> ApiError {
    ApiError::new(err.code(), err.to_string())
}

pub(super) fn overrides(
    repo_root: &Option<String>,
    project: &Option<String>,
    target: Option<&String>,
    backup: Option<bool>,
) -> Overrides {
    Overrides {
        repo_root: repo_root.clone(),
        project: project.clone(),
        target: target.cloned(),
        backup,
    }
}

pub(super) fn write_options(
    dry_run: Option<bool>,
    backup: Option<bool>,
    expect_sha256: &Option<String>,
) -> Result<WriteOptions, ApiError> {
    if let Some(expected) = expect_sha256
        && !is_sha256_hex(&expected.to_ascii_lowercase())
    {
        return Err(ApiError::new(
            "edit.invalid_argument",
            format!("expect_sha256 must be 64 hex digits (got {expected:?})"),
        ));
    }
    Ok(WriteOptions {
        dry_run: dry_run.unwrap_or(false),
        backup,
        expect_sha256: expect_sha256.clone(),
    })
}

/// Unlocked read for the read-only operations.
pub(super) fn read_project(path: &Path) -> Result<(PbxProject, String), ApiError> {
    let text = std::fs::read_to_string(path)
        .map_err(|source| {
            map_project_error(ProjectError::Read {
                path: path.to_path_buf(),
                source,
            })
        })?;
    let project = PbxProject::parse(&text, project_name_from_path(path))
        .map_err(|e| map_project_error(e.with_path(path.to_path_buf())))?;
    Ok((project, sha256_hex(text.as_bytes())))
}

pub(super) fn validate_error(project_path: Option<String>, error: ApiError) -> ValidateOutput {
    ValidateOutput {
        ok: false,
        error: Some(error),
        project_path,
        sha256: None,
        objects: 0,
        blocking: 0,
        observations: 0,
        violations: vec![],
        summary_md: None,
        payload_meta: None,
    }
}
