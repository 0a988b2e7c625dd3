use super::{EditReport, delete_object, detach, is_listed_by_phase, relink, remove_from_list};
use crate::api::ChangeKind;
use crate::project::{ObjectId, PbxProject, PhaseKind};
use std::collections::BTreeSet;

/// Collapses every kind of duplicate the project can accumulate:
/// file references with the same path, repeated phase entries, repeated
/// group children, and an `INFOPLIST_FILE` copied as a resource.
pub fn dedupe(project: &mut PbxProject) -> EditReport {
    let mut report = EditReport::default();
    merge_file_references(project, &mut report);
    dedupe_phases(project, &mut report);
    dedupe_group_children(project, &mut report);
    drop_info_plist_resources(project, &mut report);
    report
}

/// The first reference in navigator order survives; the rest are relinked to it.
/// A duplicate's group slot is dropped when the survivor already has a group.
fn merge_file_references(project: &mut PbxProject, report: &mut EditReport) {
    for (path, ids) in project.duplicate_file_refs() {
        let Some((survivor, dupes)) = ids.split_first() else {
            continue;
        };
        for dup in dupes {
            if project.parents().contains_key(survivor) {
                detach(project, dup, report);
            }
            relink(project, dup, survivor, report);
            if project.objects.remove(dup).is_some() {
                report.push(
                    ChangeKind::RemovedObject,
                    dup,
                    format!("PBXFileReference {path} (merged into {survivor})"),
                );
            }
        }
    }
}

fn dedupe_phases(project: &mut PbxProject, report: &mut EditReport) {
    let phases: Vec<ObjectId> = project
        .objects
        .iter()
        .filter(|(_, o)| o.is_build_phase())
        .map(|(id, _)| id.clone())
        .collect();
    for phase in phases {
        let mut seen_ids = BTreeSet::new();
        let mut seen_files = BTreeSet::new();
        let mut keep: Vec<ObjectId> = vec![];
        let mut dropped: Vec<ObjectId> = vec![];
        for bf in project.phase_files(&phase) {
            let file = project.get(&bf).and_then(|o| {
                o.str_field("fileRef")
                    .or_else(|| o.str_field("productRef"))
                    .map(str::to_string)
            });
            let repeated_id = !seen_ids.insert(bf.clone());
            let repeated_file = file.is_some_and(|f| !seen_files.insert(f));
            if repeated_id || repeated_file {
                dropped.push(bf);
            } else {
                keep.push(bf);
            }
        }
        if dropped.is_empty() {
            continue;
        }
        if let Some(obj) = project.objects.get_mut(&phase) {
            obj.set_list("files", &keep);
        }
        for bf in dropped {
            report.push(ChangeKind::RemovedFromList, &phase, format!("files: {bf}"));
            if !keep.contains(&bf) && !is_listed_by_phase(project, &bf) {
                delete_object(project, &bf, report);
            }
        }
    }
}

fn dedupe_group_children(project: &mut PbxProject, report: &mut EditReport) {
    for (id, obj) in project.objects.iter_mut() {
        if !obj.is_group() {
            continue;
        }
        let children = obj.id_list("children");
        let mut seen = BTreeSet::new();
        let unique: Vec<ObjectId> = children
            .iter()
            .filter(|c| seen.insert((*c).clone()))
            .cloned()
            .collect();
        if unique.len() == children.len() {
            continue;
        }
        let repeated: BTreeSet<&ObjectId> = children
            .iter()
            .enumerate()
            .filter(|(i, c)| children[..*i].contains(*c))
            .map(|(_, c)| c)
            .collect();
        obj.set_list("children", &unique);
        for child in repeated {
            report.push(ChangeKind::RemovedFromList, id, format!("children: {child}"));
        }
    }
}

/// A target's `INFOPLIST_FILE` is processed, never copied as a resource.
fn drop_info_plist_resources(project: &mut PbxProject, report: &mut EditReport) {
    let parents = project.parents();
    for (target, _) in project.targets() {
        let plists = project.info_plist_files(&target);
        if plists.is_empty() {
            continue;
        }
        for phase in project.phases_of_kind(&target, PhaseKind::Resources) {
            for bf in project.phase_files(&phase) {
                let Some(path) = project
                    .build_file_ref(&bf)
                    .and_then(|r| project.full_path_with(&parents, &r))
                else {
                    continue;
                };
                if !plists.contains(&path) {
                    continue;
                }
                remove_from_list(project, &phase, "files", &bf);
                report.push(ChangeKind::RemovedFromList, &phase, format!("files: {bf}"));
                if !is_listed_by_phase(project, &bf) {
                    delete_object(project, &bf, report);
                }
            }
        }
    }
}
