use crate::api::{Change, ChangeKind};
use crate::plist::Value;
use crate::project::{
    ObjectId, ParentMap, PbxObject, PbxProject, PhaseKind, REFERENCE_KEYS, REFERENCE_LIST_KEYS,
    file_name, normalize_path, parent_dir, strip_dir_prefix,
};

mod add;
mod dedupe;
mod paths;
mod repair;
mod targets;

pub use add::{AddFileOptions, add_file, remove_file};
pub use dedupe::dedupe;
pub use paths::{relocate, rewrite_paths};
pub use repair::repair;
pub use targets::{SyncPhaseOptions, move_to_target, sync_phase};

const APPLICATION_PRODUCT: &str = "com.apple.product-type.application";

#[derive(Debug, thiserror::Error)]
pub enum EditError {
    #[error("project has no targets")]
    NoTargets,
    #[error("target not found: {name}")]
    TargetNotFound { name: String },
    #[error("no file reference matches {0}")]
    FileNotFound(String),
    #[error("no group resolves to `{0}` (create_groups would create it)")]
    GroupNotFound(String),
    #[error("project has no main group")]
    MissingMainGroup,
    #[error("cannot infer a build phase for {path}; pass one explicitly")]
    PhaseUnknown { path: String },
    #[error("invalid path: {0:?}")]
    InvalidPath(String),
    #[error("invalid rewrite rule: {0}")]
    InvalidRule(String),
    #[error("{0}")]
    InvalidArgument(String),
}

impl EditError {
    pub fn code(&self) -> &'static str {
        match self {
            EditError::NoTargets => "edit.no_targets",
            EditError::TargetNotFound { .. } => "edit.target_not_found",
            EditError::FileNotFound(_) => "edit.file_not_found",
            EditError::GroupNotFound(_) => "edit.group_not_found",
            EditError::MissingMainGroup => "edit.missing_main_group",
            EditError::PhaseUnknown { .. } => "edit.phase_unknown",
            EditError::InvalidPath(_) => "edit.invalid_path",
            EditError::InvalidRule(_) => "edit.invalid_rule",
            EditError::InvalidArgument(_) => "edit.invalid_argument",
        }
    }
}

/// What an edit did, in the order it did it. Empty means nothing to do.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditReport {
    pub changes: Vec<Change>,
}

impl EditReport {
    pub fn push(&mut self, kind: ChangeKind, id: &ObjectId, detail: impl Into<String>) {
        self.changes.push(Change {
            kind,
            id: id.to_string(),
            detail: detail.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn extend(&mut self, other: EditReport) {
        self.changes.extend(other.changes);
    }

    pub fn count(&self, kind: ChangeKind) -> usize {
        self.changes.iter().filter(|c| c.kind == kind).count()
    }
}

/// Named target, else the first application target, else the first target.
pub(crate) fn resolve_target(
    project: &PbxProject,
    name: Option<&str>,
) -> Result<ObjectId, EditError> {
    if let Some(name) = name {
        return project
            .target_by_name(name)
            .ok_or_else(|| EditError::TargetNotFound {
                name: name.to_string(),
            });
    }
    let targets = project.targets();
    targets
        .iter()
        .find(|(id, _)| {
            project.get(id).and_then(|t| t.str_field("productType")) == Some(APPLICATION_PRODUCT)
        })
        .or_else(|| targets.first())
        .map(|(id, _)| id.clone())
        .ok_or(EditError::NoTargets)
}

/// Paths are taken as project-relative; object ids are accepted as-is.
pub(crate) fn resolve_file_refs(
    project: &PbxProject,
    parents: &ParentMap,
    path_or_id: &str,
) -> Result<Vec<ObjectId>, EditError> {
    if let Some(obj) = project.objects.get(path_or_id) {
        if obj.is_file_reference() || obj.isa == "PBXVariantGroup" {
            return Ok(vec![ObjectId::new(path_or_id)]);
        }
        return Err(EditError::InvalidArgument(format!(
            "object {path_or_id} is a {}, not a file reference",
            obj.isa
        )));
    }
    Ok(project.find_file_refs(parents, path_or_id))
}

pub(crate) fn push_id(project: &mut PbxProject, owner: &ObjectId, key: &str, id: &ObjectId) {
    if let Some(obj) = project.objects.get_mut(owner) {
        obj.list_mut(key).push(Value::from(id.as_str()));
    }
}

/// Removes every occurrence of `id` from `owner.key`; returns how many went.
pub(crate) fn remove_from_list(
    project: &mut PbxProject,
    owner: &ObjectId,
    key: &str,
    id: &ObjectId,
) -> usize {
    let Some(items) = project
        .objects
        .get_mut(owner)
        .and_then(|o| o.fields.get_mut(key))
        .and_then(Value::as_array_mut)
    else {
        return 0;
    };
    let before = items.len();
    items.retain(|v| v.as_str() != Some(id.as_str()));
    before - items.len()
}

pub(crate) fn is_listed_by_phase(project: &PbxProject, build_file: &ObjectId) -> bool {
    !project.phases_listing(build_file).is_empty()
}

fn describe(project: &PbxProject, id: &ObjectId) -> String {
    let Some(obj) = project.get(id) else {
        return id.to_string();
    };
    let name = if obj.is_build_file() {
        obj.id_field("fileRef")
            .and_then(|r| project.display_name(&r))
            .map(|n| format!("for {n}"))
    } else {
        project.display_name(id)
    };
    match name {
        Some(name) => format!("{} {name}", obj.isa),
        None => obj.isa.clone(),
    }
}

/// Drops `id` from every list in the project.
pub(crate) fn detach(project: &mut PbxProject, id: &ObjectId, report: &mut EditReport) {
    for (owner, obj) in project.objects.iter_mut() {
        for (key, value) in obj.fields.iter_mut() {
            let Some(items) = value.as_array_mut() else {
                continue;
            };
            let before = items.len();
            items.retain(|v| v.as_str() != Some(id.as_str()));
            if items.len() != before {
                report.push(ChangeKind::RemovedFromList, owner, format!("{key}: {id}"));
            }
        }
    }
}

pub(crate) fn delete_object(project: &mut PbxProject, id: &ObjectId, report: &mut EditReport) {
    let detail = describe(project, id);
    detach(project, id, report);
    if project.objects.remove(id).is_some() {
        report.push(ChangeKind::RemovedObject, id, detail);
    }
}

/// Points every reference to `from` at `to`.
pub(crate) fn relink(
    project: &mut PbxProject,
    from: &ObjectId,
    to: &ObjectId,
    report: &mut EditReport,
) {
    for (owner, obj) in project.objects.iter_mut() {
        for (key, value) in obj.fields.iter_mut() {
            if !REFERENCE_KEYS.contains(&key.as_str()) && !REFERENCE_LIST_KEYS.contains(&key.as_str())
            {
                continue;
            }
            let mut hit = false;
            match value {
                Value::String(s) if s.as_str() == from.as_str() => {
                    *s = to.to_string();
                    hit = true;
                }
                Value::Array(items) => {
                    for item in items.iter_mut() {
                        if item.as_str() == Some(from.as_str()) {
                            *item = Value::from(to.as_str());
                            hit = true;
                        }
                    }
                }
                _ => {}
            }
            if hit {
                report.push(ChangeKind::Relinked, owner, format!("{key}: {from} -> {to}"));
            }
        }
    }
}

/// The phase of `kind` on `target`, appended to its build phases when absent.
pub(crate) fn ensure_phase(
    project: &mut PbxProject,
    target: &ObjectId,
    kind: PhaseKind,
    report: &mut EditReport,
) -> ObjectId {
    if let Some(phase) = project.phase_of_kind(target, kind) {
        return phase;
    }
    let phase = project.insert(
        PbxObject::new(kind.isa())
            .with("buildActionMask", "2147483647")
            .with_list("files", vec![])
            .with("runOnlyForDeploymentPostprocessing", "0"),
    );
    push_id(project, target, "buildPhases", &phase);
    let target_name = project.display_name(target).unwrap_or_default();
    report.push(
        ChangeKind::CreatedPhase,
        &phase,
        format!("{} phase of {target_name}", kind.label()),
    );
    phase
}

/// Build file in `phase` that links `file_ref`, if any.
pub(crate) fn phase_entry_for(
    project: &PbxProject,
    phase: &ObjectId,
    file_ref: &ObjectId,
) -> Option<ObjectId> {
    project
        .phase_files(phase)
        .into_iter()
        .find(|bf| project.build_file_ref(bf).as_ref() == Some(file_ref))
}

/// Makes `file_ref` appear in `phase` exactly once. Returns whether it was added.
pub(crate) fn ensure_in_phase(
    project: &mut PbxProject,
    phase: &ObjectId,
    file_ref: &ObjectId,
    report: &mut EditReport,
) -> bool {
    if phase_entry_for(project, phase, file_ref).is_some() {
        return false;
    }
    let name = project
        .display_name(file_ref)
        .unwrap_or_else(|| file_ref.to_string());
    let build_file =
        project.insert(PbxObject::new("PBXBuildFile").with("fileRef", file_ref.as_str()));
    report.push(ChangeKind::AddedBuildFile, &build_file, format!("for {name}"));
    push_id(project, phase, "files", &build_file);
    report.push(ChangeKind::AddedToPhase, phase, name);
    true
}

/// Group for the project-relative directory `dir`. Missing levels are created
/// under the deepest existing ancestor when `create` is set.
pub(crate) fn group_for_dir(
    project: &mut PbxProject,
    parents: &mut ParentMap,
    dir: &str,
    create: bool,
    report: &mut EditReport,
) -> Result<ObjectId, EditError> {
    let main = project.main_group().ok_or(EditError::MissingMainGroup)?;
    let dir = normalize_path(dir);
    if dir.is_empty() {
        return Ok(main);
    }
    if let Some(group) = project.groups_at(parents, &dir).into_iter().next() {
        return Ok(group);
    }
    if !create {
        return Err(EditError::GroupNotFound(dir));
    }

    let mut anchor = main;
    let mut cursor = parent_dir(&dir).to_string();
    while !cursor.is_empty() {
        if let Some(group) = project.groups_at(parents, &cursor).into_iter().next() {
            anchor = group;
            break;
        }
        cursor = parent_dir(&cursor).to_string();
    }
    let anchor_path = project.full_path_with(parents, &anchor).unwrap_or_default();
    let Some(rest) = strip_dir_prefix(&dir, &anchor_path) else {
        return Err(EditError::InvalidPath(dir.clone()));
    };

    // Leading `..` segments stay attached to the first real directory.
    let mut segments: Vec<String> = vec![];
    let mut pending_up = String::new();
    for seg in rest.split('/') {
        if seg == ".." {
            pending_up.push_str("../");
        } else {
            segments.push(format!("{pending_up}{seg}"));
            pending_up.clear();
        }
    }

    let mut parent = anchor;
    for seg in segments {
        let mut group = PbxObject::new("PBXGroup")
            .with_list("children", vec![])
            .with("path", seg.as_str())
            .with("sourceTree", "<group>");
        if seg.contains('/') {
            group.set_str("name", file_name(&seg));
        }
        let id = project.insert(group);
        report.push(ChangeKind::CreatedGroup, &id, seg.clone());
        push_id(project, &parent, "children", &id);
        report.push(ChangeKind::AddedToGroup, &parent, seg);
        parents.insert(id.clone(), parent);
        parent = id;
    }
    Ok(parent)
}

/// How `path` is stored under `group`: group-relative when it lies inside
/// the group's directory, project-root relative otherwise.
pub(crate) fn relative_to_group(
    project: &PbxProject,
    parents: &ParentMap,
    group: &ObjectId,
    path: &str,
) -> (String, &'static str) {
    let base = project.full_path_with(parents, group).unwrap_or_default();
    match strip_dir_prefix(path, &base) {
        Some(rest) if !base.starts_with("$(") => (rest.to_string(), "<group>"),
        _ => (path.to_string(), "SOURCE_ROOT"),
    }
}

pub(crate) fn set_location(obj: &mut PbxObject, rel: &str, source_tree: &str) {
    obj.set_str("path", rel);
    obj.set_str("sourceTree", source_tree);
    if rel.contains('/') {
        obj.set_str("name", file_name(rel));
    } else {
        obj.fields.remove("name");
    }
}
