use crate::api::Violation;
use crate::project::{ObjectId, PbxProject, PhaseKind, REFERENCE_LIST_KEYS};
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

#[derive(Debug, Clone, Default)]
pub struct ValidateOptions {
    /// Report `<group>`/`SOURCE_ROOT` files missing under this directory.
    pub disk_root: Option<PathBuf>,
}

/// Integrity findings for the whole project, blocking ones first per check.
pub fn validate(project: &PbxProject, opts: &ValidateOptions) -> Vec<Violation> {
    let mut out = vec![];
    check_root(project, &mut out);
    check_references(project, &mut out);
    check_list_duplicates(project, &mut out);
    check_phase_entries(project, &mut out);
    check_duplicate_file_refs(project, &mut out);
    check_info_plist_resources(project, &mut out);
    check_orphans(project, &mut out);
    check_ids(project, &mut out);
    if let Some(root) = &opts.disk_root {
        check_disk(project, root, &mut out);
    }
    out
}

/// Blocking findings in `after` that `before` did not have.
pub fn introduced(before: &[Violation], after: &[Violation]) -> Vec<Violation> {
    let known: BTreeSet<_> = before.iter().map(Violation::fingerprint).collect();
    after
        .iter()
        .filter(|v| v.is_blocking() && !known.contains(&v.fingerprint()))
        .cloned()
        .collect()
}

fn check_root(project: &PbxProject, out: &mut Vec<Violation>) {
    if project.root_object().is_none() {
        out.push(Violation::blocking(
            "pbx.missing_root",
            "rootObject is missing or is not a PBXProject",
            None,
            project
                .header
                .get("rootObject")
                .and_then(|v| v.as_str())
                .map(|id| json!({ "root_object": id })),
        ));
    }
}

fn check_references(project: &PbxProject, out: &mut Vec<Violation>) {
    for (owner, obj) in &project.objects {
        for (key, target) in obj.outgoing() {
            if project.objects.contains_key(&target) {
                continue;
            }
            out.push(
                Violation::blocking(
                    "pbx.dangling_reference",
                    format!("{} {owner} `{key}` points at missing object {target}", obj.isa),
                    None,
                    Some(json!({ "key": key, "missing": target.as_str() })),
                )
                .on(owner),
            );
        }
    }
}

fn check_list_duplicates(project: &PbxProject, out: &mut Vec<Violation>) {
    for (owner, obj) in &project.objects {
        for key in REFERENCE_LIST_KEYS {
            let mut counts: BTreeMap<ObjectId, usize> = BTreeMap::new();
            for id in obj.id_list(key) {
                *counts.entry(id).or_default() += 1;
            }
            for (id, count) in counts.into_iter().filter(|(_, c)| *c > 1) {
                out.push(
                    Violation::blocking(
                        "pbx.duplicate_list_entry",
                        format!("{} {owner} lists {id} {count} times in `{key}`", obj.isa),
                        None,
                        Some(json!({ "key": key, "entry": id.as_str(), "count": count })),
                    )
                    .on(owner),
                );
            }
        }
    }
}

fn check_phase_entries(project: &PbxProject, out: &mut Vec<Violation>) {
    let parents = project.parents();
    let mut listing: BTreeMap<ObjectId, Vec<ObjectId>> = BTreeMap::new();
    for (phase, obj) in project.objects.iter().filter(|(_, o)| o.is_build_phase()) {
        let mut by_file: BTreeMap<ObjectId, BTreeSet<ObjectId>> = BTreeMap::new();
        for bf in obj.id_list("files") {
            let phases = listing.entry(bf.clone()).or_default();
            if !phases.contains(phase) {
                phases.push(phase.clone());
            }
            if let Some(file) = project.build_file_ref(&bf) {
                by_file.entry(file).or_default().insert(bf);
            }
        }
        for (file, build_files) in by_file.into_iter().filter(|(_, b)| b.len() > 1) {
            let path = project.full_path_with(&parents, &file);
            out.push(
                Violation::blocking(
                    "pbx.duplicate_build_file",
                    format!(
                        "phase {phase} builds {} through {} build files",
                        path.as_deref().unwrap_or(file.as_str()),
                        build_files.len()
                    ),
                    path,
                    Some(json!({
                        "file_ref": file.as_str(),
                        "build_files": build_files.iter().map(ObjectId::as_str).collect::<Vec<_>>(),
                    })),
                )
                .on(phase),
            );
        }
    }
    for (bf, phases) in listing.into_iter().filter(|(_, p)| p.len() > 1) {
        out.push(
            Violation::blocking(
                "pbx.shared_build_file",
                format!("build file {bf} is listed by {} phases", phases.len()),
                None,
                Some(json!({
                    "phases": phases.iter().map(ObjectId::as_str).collect::<Vec<_>>(),
                })),
            )
            .on(&bf),
        );
    }
}

fn check_duplicate_file_refs(project: &PbxProject, out: &mut Vec<Violation>) {
    for (path, ids) in project.duplicate_file_refs() {
        let Some(first) = ids.first() else {
            continue;
        };
        out.push(
            Violation::observation(
                "pbx.duplicate_file_reference",
                format!("{} file references resolve to {path}", ids.len()),
                Some(path.clone()),
                Some(json!({ "ids": ids.iter().map(ObjectId::as_str).collect::<Vec<_>>() })),
            )
            .on(first),
        );
    }
}

fn check_info_plist_resources(project: &PbxProject, out: &mut Vec<Violation>) {
    let parents = project.parents();
    for (target, name) in project.targets() {
        let plists = project.info_plist_files(&target);
        let files = project
            .phases_of_kind(&target, PhaseKind::Resources)
            .into_iter()
            .flat_map(|phase| project.phase_files(&phase));
        for bf in files {
            let Some(path) = project
                .build_file_ref(&bf)
                .and_then(|r| project.full_path_with(&parents, &r))
            else {
                continue;
            };
            if plists.contains(&path) {
                out.push(
                    Violation::observation(
                        "pbx.info_plist_in_resources",
                        format!("target {name} copies its INFOPLIST_FILE {path} as a resource"),
                        Some(path),
                        None,
                    )
                    .on(&bf),
                );
            }
        }
    }
}

fn check_orphans(project: &PbxProject, out: &mut Vec<Violation>) {
    let Some(root) = project.root_object() else {
        return;
    };
    let mut seen = BTreeSet::new();
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        if !seen.insert(id.clone()) {
            continue;
        }
        if let Some(obj) = project.get(&id) {
            stack.extend(obj.outgoing().into_iter().map(|(_, t)| t));
        }
    }
    for (id, obj) in &project.objects {
        if seen.contains(id) {
            continue;
        }
        let name = project.display_name(id);
        out.push(
            Violation::observation(
                "pbx.orphan_object",
                format!(
                    "{} {id}{} is not reachable from the project",
                    obj.isa,
                    name.map(|n| format!(" ({n})")).unwrap_or_default()
                ),
                None,
                Some(json!({ "isa": obj.isa })),
            )
            .on(id),
        );
    }
}

fn check_ids(project: &PbxProject, out: &mut Vec<Violation>) {
    for id in project.objects.keys().filter(|id| !id.is_canonical()) {
        out.push(
            Violation::observation(
                "pbx.malformed_id",
                format!("object id {id} is not 24 upper-case hex digits"),
                None,
                None,
            )
            .on(id),
        );
    }
}

fn check_disk(project: &PbxProject, root: &std::path::Path, out: &mut Vec<Violation>) {
    let parents = project.parents();
    for (id, obj) in project.objects.iter().filter(|(_, o)| o.is_file_reference()) {
        if !matches!(
            obj.str_field("sourceTree").unwrap_or("<group>"),
            "<group>" | "SOURCE_ROOT"
        ) {
            continue;
        }
        let Some(path) = project.full_path_with(&parents, id) else {
            continue;
        };
        if path.is_empty() || path.starts_with("$(") {
            continue;
        }
        if !root.join(&path).exists() {
            out.push(
                Violation::observation(
                    "pbx.missing_on_disk",
                    format!("{path} does not exist"),
                    Some(path),
                    None,
                )
                .on(id),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edit::{EditReport, repair};
    use crate::plist::Value;
    use crate::project::PbxObject;
    use crate::project::fixtures::*;

    fn codes(violations: &[Violation]) -> Vec<&str> {
        violations.iter().map(|v| v.code.as_str()).collect()
    }

    #[test]
    fn sample_project_is_clean() {
        let violations = validate(&sample(), &ValidateOptions::default());
        assert!(violations.is_empty(), "{violations:?}");
    }

    #[test]
    fn dangling_and_duplicate_entries_block() {
        let mut project = sample();
        let sources = project.objects.get_mut(&id(APP_SOURCES)).unwrap();
        sources.list_mut("files").push(Value::from(CONTENT_VIEW_BUILD));
        sources
            .list_mut("files")
            .push(Value::from("DEADBEEFDEADBEEFDEADBEEF"));

        let violations = validate(&project, &ValidateOptions::default());
        let codes = codes(&violations);
        assert!(codes.contains(&"pbx.dangling_reference"), "{codes:?}");
        assert!(codes.contains(&"pbx.duplicate_list_entry"), "{codes:?}");
        assert!(violations.iter().all(Violation::is_blocking));
        let dup = violations
            .iter()
            .find(|v| v.code == "pbx.duplicate_list_entry")
            .unwrap();
        assert_eq!(dup.object_id.as_deref(), Some(APP_SOURCES));
    }

    #[test]
    fn second_build_file_for_same_file_blocks() {
        let mut project = sample();
        let extra = project.insert(PbxObject::new("PBXBuildFile").with("fileRef", CONTENT_VIEW));
        project
            .objects
            .get_mut(&id(APP_SOURCES))
            .unwrap()
            .list_mut("files")
            .push(Value::from(extra.as_str()));
        let violations = validate(&project, &ValidateOptions::default());
        let hit = violations
            .iter()
            .find(|v| v.code == "pbx.duplicate_build_file")
            .expect("duplicate build file");
        assert_eq!(hit.path.as_deref(), Some("App/ContentView.swift"));
    }

    #[test]
    fn shared_build_file_and_info_plist_are_reported() {
        let mut project = sample();
        project
            .objects
            .get_mut(&id(TESTS_SOURCES))
            .unwrap()
            .list_mut("files")
            .push(Value::from(CONTENT_VIEW_BUILD));
        let plist = project.insert(PbxObject::new("PBXBuildFile").with("fileRef", INFO_PLIST));
        project
            .objects
            .get_mut(&id(APP_RESOURCES))
            .unwrap()
            .list_mut("files")
            .push(Value::from(plist.as_str()));

        let violations = validate(&project, &ValidateOptions::default());
        let shared = violations
            .iter()
            .find(|v| v.code == "pbx.shared_build_file")
            .expect("shared");
        assert!(shared.is_blocking());
        let info = violations
            .iter()
            .find(|v| v.code == "pbx.info_plist_in_resources")
            .expect("info plist");
        assert!(!info.is_blocking());
    }

    #[test]
    fn info_plist_is_found_in_any_resources_phase() {
        let mut project = sample();
        let plist = project.insert(PbxObject::new("PBXBuildFile").with("fileRef", INFO_PLIST));
        let extra = project.insert(
            PbxObject::new("PBXResourcesBuildPhase").with_list("files", vec![plist.clone()]),
        );
        project
            .objects
            .get_mut(&id(APP_TARGET))
            .unwrap()
            .list_mut("buildPhases")
            .push(Value::from(extra.as_str()));

        let violations = validate(&project, &ValidateOptions::default());
        let info = violations
            .iter()
            .find(|v| v.code == "pbx.info_plist_in_resources")
            .expect("info plist in the second resources phase");
        assert_eq!(info.path.as_deref(), Some("App/Info.plist"));

        crate::edit::dedupe(&mut project);
        assert!(project.phase_files(&extra).is_empty());
        let violations = validate(&project, &ValidateOptions::default());
        assert!(
            violations
                .iter()
                .all(|v| v.code != "pbx.info_plist_in_resources")
        );
    }

    #[test]
    fn observations_cover_orphans_ids_and_duplicate_paths() {
        let mut project = sample();
        project.objects.insert(
            ObjectId::new("custom-id"),
            PbxObject::new("PBXFileReference")
                .with("path", "ContentView.swift")
                .with("sourceTree", "<group>"),
        );
        let violations = validate(&project, &ValidateOptions::default());
        let codes = codes(&violations);
        assert!(codes.contains(&"pbx.orphan_object"));
        assert!(codes.contains(&"pbx.malformed_id"));
        assert!(violations.iter().all(|v| !v.is_blocking()), "{codes:?}");
    }

    #[test]
    fn missing_root_blocks() {
        let mut project = sample();
        project
            .header
            .insert("rootObject".to_string(), Value::from(APP_GROUP));
        let violations = validate(&project, &ValidateOptions::default());
        assert_eq!(violations[0].code, "pbx.missing_root");
    }

    #[test]
    fn disk_check_flags_red_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("App/Assets.xcassets")).unwrap();
        for f in ["App/AppApp.swift", "App/ContentView.swift", "App/Info.plist"] {
            std::fs::write(dir.path().join(f), "").unwrap();
        }
        let opts = ValidateOptions {
            disk_root: Some(dir.path().to_path_buf()),
        };
        let violations = validate(&sample(), &opts);
        let missing: Vec<&str> = violations
            .iter()
            .filter(|v| v.code == "pbx.missing_on_disk")
            .filter_map(|v| v.path.as_deref())
            .collect();
        assert_eq!(missing, vec!["AppTests/AppTests.swift"]);
    }

    #[test]
    fn introduced_ignores_preexisting_findings() {
        let mut project = sample();
        project
            .objects
            .get_mut(&id(APP_GROUP))
            .unwrap()
            .list_mut("children")
            .push(Value::from("DEADBEEFDEADBEEFDEADBEEF"));
        let before = validate(&project, &ValidateOptions::default());
        assert_eq!(before.len(), 1);

        project
            .objects
            .get_mut(&id(TESTS_GROUP))
            .unwrap()
            .list_mut("children")
            .push(Value::from("0000000000000000000000AA"));
        let after = validate(&project, &ValidateOptions::default());
        let new = introduced(&before, &after);
        assert_eq!(new.len(), 1);
        assert_eq!(new[0].object_id.as_deref(), Some(TESTS_GROUP));

        let report: EditReport = repair(&mut project);
        assert!(!report.is_empty());
        assert!(validate(&project, &ValidateOptions::default()).is_empty());
    }
}
