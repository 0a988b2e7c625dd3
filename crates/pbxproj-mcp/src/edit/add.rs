use super::{
    EditError, EditReport, delete_object, ensure_in_phase, ensure_phase, group_for_dir, push_id,
    relative_to_group, resolve_file_refs, resolve_target, set_location,
};
use crate::api::{ChangeKind, PhaseArg};
use crate::filetype::FileTypes;
use crate::project::{
    ObjectId, ParentMap, PbxObject, PbxProject, file_name, normalize_path, parent_dir,
};

#[derive(Debug, Clone, Default)]
pub struct AddFileOptions {
    /// Target name; the application target when absent.
    pub target: Option<String>,
    /// Project-relative directory of the group to use; the file's own
    /// directory when absent.
    pub group_path: Option<String>,
    pub phase: PhaseArg,
    pub create_groups: bool,
}

fn placement_group(
    project: &mut PbxProject,
    parents: &mut ParentMap,
    path: &str,
    opts: &AddFileOptions,
    report: &mut EditReport,
) -> Result<ObjectId, EditError> {
    if let Some(dir) = &opts.group_path {
        return group_for_dir(project, parents, dir, opts.create_groups, report);
    }
    match group_for_dir(project, parents, parent_dir(path), opts.create_groups, report) {
        Err(EditError::GroupNotFound(_)) => project.main_group().ok_or(EditError::MissingMainGroup),
        other => other,
    }
}

/// Ensures a file reference for `path` exists, sits in a group, and (when
/// the file has a phase) is built exactly once by the target.
pub fn add_file(
    project: &mut PbxProject,
    file_types: &FileTypes,
    path: &str,
    opts: &AddFileOptions,
) -> Result<EditReport, EditError> {
    let path = normalize_path(path);
    if path.is_empty() || path.starts_with('/') {
        return Err(EditError::InvalidPath(path));
    }
    let phase = file_types.resolve_phase(opts.phase, &path);
    let target = match phase {
        Some(_) => Some(resolve_target(project, opts.target.as_deref())?),
        None => None,
    };

    let mut report = EditReport::default();
    let mut parents = project.parents();
    let file_ref = match project.find_file_refs(&parents, &path).into_iter().next() {
        Some(existing) => existing,
        None => {
            let group = placement_group(project, &mut parents, &path, opts, &mut report)?;
            let (rel, tree) = relative_to_group(project, &parents, &group, &path);
            let mut obj = PbxObject::new("PBXFileReference")
                .with("lastKnownFileType", file_types.last_known_file_type(&path));
            set_location(&mut obj, &rel, tree);
            let id = project.insert(obj);
            report.push(ChangeKind::AddedFileRef, &id, path.clone());
            push_id(project, &group, "children", &id);
            report.push(ChangeKind::AddedToGroup, &group, file_name(&path));
            parents.insert(id.clone(), group);
            id
        }
    };

    if let (Some(kind), Some(target)) = (phase, target) {
        let phase = ensure_phase(project, &target, kind, &mut report);
        ensure_in_phase(project, &phase, &file_ref, &mut report);
    }
    Ok(report)
}

/// Deletes the file reference, every build file of it, and every list entry
/// naming either. Nothing matching is not an error.
pub fn remove_file(project: &mut PbxProject, path_or_id: &str) -> Result<EditReport, EditError> {
    let parents = project.parents();
    let refs = resolve_file_refs(project, &parents, path_or_id)?;
    let mut report = EditReport::default();
    if refs.is_empty() {
        tracing::debug!(file = path_or_id, "nothing to remove");
        return Ok(report);
    }
    for file_ref in refs {
        for build_file in project.build_files_of(&file_ref) {
            delete_object(project, &build_file, &mut report);
        }
        delete_object(project, &file_ref, &mut report);
    }
    Ok(report)
}
