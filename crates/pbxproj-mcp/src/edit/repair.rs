use super::{EditReport, delete_object};
use crate::api::ChangeKind;
use crate::plist::Value;
use crate::project::{ObjectId, PbxProject, REFERENCE_LIST_KEYS};
use std::collections::BTreeSet;

/// Removes what points nowhere: build files without a live file or product,
/// build files no phase lists, and list entries naming missing objects.
pub fn repair(project: &mut PbxProject) -> EditReport {
    let mut report = EditReport::default();

    let listed: BTreeSet<ObjectId> = project
        .objects
        .values()
        .filter(|o| o.is_build_phase())
        .flat_map(|o| o.id_list("files"))
        .collect();
    let doomed: Vec<ObjectId> = project
        .objects
        .iter()
        .filter(|(_, o)| o.is_build_file())
        .filter(|(id, o)| {
            let live = ["fileRef", "productRef"]
                .iter()
                .filter_map(|key| o.str_field(key))
                .any(|target| project.contains(target));
            !live || !listed.contains(*id)
        })
        .map(|(id, _)| id.clone())
        .collect();
    for build_file in doomed {
        delete_object(project, &build_file, &mut report);
    }

    let live: BTreeSet<ObjectId> = project.objects.keys().cloned().collect();
    for (owner, obj) in project.objects.iter_mut() {
        for key in REFERENCE_LIST_KEYS {
            let Some(items) = obj.fields.get_mut(*key).and_then(Value::as_array_mut) else {
                continue;
            };
            let mut missing = vec![];
            items.retain(|v| match v.as_str() {
                Some(id) if !live.contains(id) => {
                    missing.push(id.to_string());
                    false
                }
                _ => true,
            });
            for id in missing {
                report.push(
                    ChangeKind::RemovedFromList,
                    owner,
                    format!("{key}: {id} (missing)"),
                );
            }
        }
    }
    report
}
