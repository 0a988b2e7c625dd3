use super::{
    EditError, EditReport, delete_object, ensure_in_phase, ensure_phase, is_listed_by_phase,
    phase_entry_for, push_id, remove_from_list, resolve_file_refs, resolve_target,
};
use crate::api::{ChangeKind, PhaseArg};
use crate::filetype::FileTypes;
use crate::project::{ObjectId, PbxProject, PhaseKind, normalize_path};
use std::collections::BTreeSet;

/// Moves the build entries of `files` from one target's phase to another's.
/// With only `to`, files are added; with only `from`, they are removed.
pub fn move_to_target(
    project: &mut PbxProject,
    file_types: &FileTypes,
    files: &[String],
    from: Option<&str>,
    to: Option<&str>,
    phase: PhaseArg,
) -> Result<EditReport, EditError> {
    if from.is_none() && to.is_none() {
        return Err(EditError::InvalidArgument(
            "move needs a source target, a destination target, or both".to_string(),
        ));
    }
    let from = from.map(|n| resolve_target(project, Some(n))).transpose()?;
    let to = to.map(|n| resolve_target(project, Some(n))).transpose()?;
    if from.is_some() && from == to {
        return Err(EditError::InvalidArgument(
            "source and destination targets are the same".to_string(),
        ));
    }

    let parents = project.parents();
    let mut work: Vec<(ObjectId, PhaseKind)> = vec![];
    for file in files {
        let refs = resolve_file_refs(project, &parents, file)?;
        if refs.is_empty() {
            return Err(EditError::FileNotFound(file.clone()));
        }
        for file_ref in refs {
            let path = project
                .full_path_with(&parents, &file_ref)
                .unwrap_or_default();
            let kind = file_types
                .resolve_phase(phase, &path)
                .ok_or(EditError::PhaseUnknown { path })?;
            work.push((file_ref, kind));
        }
    }

    let mut report = EditReport::default();
    for (file_ref, kind) in work {
        move_one(project, &file_ref, kind, from.as_ref(), to.as_ref(), &mut report);
    }
    Ok(report)
}

fn move_one(
    project: &mut PbxProject,
    file_ref: &ObjectId,
    kind: PhaseKind,
    from: Option<&ObjectId>,
    to: Option<&ObjectId>,
    report: &mut EditReport,
) {
    let mut carried: Option<ObjectId> = None;
    let mut leftovers: Vec<ObjectId> = vec![];
    if let Some(from) = from
        && let Some(src) = project.phase_of_kind(from, kind)
    {
        let entries: Vec<ObjectId> = project
            .phase_files(&src)
            .into_iter()
            .filter(|bf| project.build_file_ref(bf).as_ref() == Some(file_ref))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        for build_file in entries {
            remove_from_list(project, &src, "files", &build_file);
            report.push(
                ChangeKind::RemovedFromList,
                &src,
                format!("files: {build_file}"),
            );
            if is_listed_by_phase(project, &build_file) {
                continue;
            }
            if carried.is_none() {
                carried = Some(build_file);
            } else {
                leftovers.push(build_file);
            }
        }
    }
    for build_file in leftovers {
        delete_object(project, &build_file, report);
    }

    let Some(to) = to else {
        if let Some(build_file) = carried {
            delete_object(project, &build_file, report);
        }
        return;
    };
    let dst = ensure_phase(project, to, kind, report);
    if phase_entry_for(project, &dst, file_ref).is_some() {
        if let Some(build_file) = carried {
            delete_object(project, &build_file, report);
        }
        return;
    }
    match carried {
        Some(build_file) => {
            push_id(project, &dst, "files", &build_file);
            let to_name = project.display_name(to).unwrap_or_default();
            report.push(
                ChangeKind::MovedBuildFile,
                &build_file,
                format!("{} phase of {to_name}", kind.label()),
            );
        }
        None => {
            ensure_in_phase(project, &dst, file_ref, report);
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SyncPhaseOptions {
    pub target: Option<String>,
    /// Project-relative directory of the group to scan. When absent the main
    /// group is scanned and files another target already builds in a phase
    /// of this kind are left alone.
    pub group_path: Option<String>,
    /// `auto` means the Sources phase.
    pub phase: PhaseArg,
    /// Reorder the phase so scanned files follow group order.
    pub rebuild: bool,
}

/// File references below `group`, in navigator order.
fn files_under(project: &PbxProject, group: &ObjectId) -> Vec<ObjectId> {
    let mut out = vec![];
    let mut seen = BTreeSet::new();
    let mut stack = vec![group.clone()];
    while let Some(id) = stack.pop() {
        if !seen.insert(id.clone()) {
            continue;
        }
        let Some(obj) = project.get(&id) else {
            continue;
        };
        if obj.is_file_reference() {
            out.push(id);
        } else if obj.is_group() {
            stack.extend(obj.id_list("children").into_iter().rev());
        }
    }
    out
}

/// File references built by a phase of `kind` in any target but `target`.
fn built_by_other_targets(
    project: &PbxProject,
    target: &ObjectId,
    kind: PhaseKind,
) -> BTreeSet<ObjectId> {
    project
        .targets()
        .into_iter()
        .filter(|(id, _)| id != target)
        .flat_map(|(id, _)| project.phases_of_kind(&id, kind))
        .flat_map(|p| project.phase_files(&p))
        .filter_map(|bf| project.build_file_ref(&bf))
        .collect()
}

/// Ensures every file below the group whose type belongs in the phase is
/// built by the target. Existing entries keep their order; new ones append.
pub fn sync_phase(
    project: &mut PbxProject,
    file_types: &FileTypes,
    opts: &SyncPhaseOptions,
) -> Result<EditReport, EditError> {
    let target = resolve_target(project, opts.target.as_deref())?;
    let kind = match opts.phase {
        PhaseArg::Auto => PhaseKind::Sources,
        other => other.kind().ok_or_else(|| {
            EditError::InvalidArgument("sync_phase needs a concrete phase".to_string())
        })?,
    };
    let parents = project.parents();
    let group = match &opts.group_path {
        Some(dir) => project
            .groups_at(&parents, dir)
            .into_iter()
            .next()
            .ok_or_else(|| EditError::GroupNotFound(normalize_path(dir)))?,
        None => project.main_group().ok_or(EditError::MissingMainGroup)?,
    };
    let foreign = match &opts.group_path {
        Some(_) => BTreeSet::new(),
        None => built_by_other_targets(project, &target, kind),
    };

    let wanted: Vec<ObjectId> = files_under(project, &group)
        .into_iter()
        .filter(|id| !foreign.contains(id))
        .filter(|id| {
            project
                .full_path_with(&parents, id)
                .is_some_and(|p| file_types.default_phase(&p) == Some(kind))
        })
        .collect();

    let mut report = EditReport::default();
    if wanted.is_empty() && project.phase_of_kind(&target, kind).is_none() {
        return Ok(report);
    }
    let phase = ensure_phase(project, &target, kind, &mut report);
    for file_ref in &wanted {
        ensure_in_phase(project, &phase, file_ref, &mut report);
    }
    if opts.rebuild {
        reorder(project, &phase, &wanted, &mut report);
    }
    Ok(report)
}

fn reorder(
    project: &mut PbxProject,
    phase: &ObjectId,
    wanted: &[ObjectId],
    report: &mut EditReport,
) {
    let current = project.phase_files(phase);
    let mut ordered: Vec<ObjectId> = vec![];
    for file_ref in wanted {
        if let Some(bf) = current
            .iter()
            .find(|bf| project.build_file_ref(bf).as_ref() == Some(file_ref))
            && !ordered.contains(bf)
        {
            ordered.push(bf.clone());
        }
    }
    for bf in &current {
        if !ordered.contains(bf) {
            ordered.push(bf.clone());
        }
    }
    if ordered == current {
        return;
    }
    let count = ordered.len();
    if let Some(obj) = project.objects.get_mut(phase) {
        obj.set_list("files", &ordered);
    }
    report.push(
        ChangeKind::PhaseRebuilt,
        phase,
        format!("{count} entries in group order"),
    );
}
