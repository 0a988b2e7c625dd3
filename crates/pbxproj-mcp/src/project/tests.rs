use super::fixtures::*;
use super::*;

#[test]
fn canonical_file_round_trips_byte_for_byte() {
    let project = sample();
    assert_eq!(project.to_pbxproj_string(), SAMPLE);
}

#[test]
fn targets_and_phases_resolve() {
    let project = sample();
    let names: Vec<String> = project.targets().into_iter().map(|(_, n)| n).collect();
    assert_eq!(names, vec!["App", "AppTests"]);
    assert_eq!(project.target_by_name("App"), Some(id(APP_TARGET)));
    assert_eq!(
        project.phase_of_kind(&id(APP_TARGET), PhaseKind::Sources),
        Some(id(APP_SOURCES))
    );
    assert_eq!(project.phase_files(&id(APP_SOURCES)).len(), 2);
    assert_eq!(project.main_group(), Some(id(MAIN_GROUP)));
}

#[test]
fn full_path_walks_group_chain() {
    let project = sample();
    assert_eq!(
        project.full_path(&id(CONTENT_VIEW)).as_deref(),
        Some("App/ContentView.swift")
    );
    assert_eq!(project.full_path(&id(APP_GROUP)).as_deref(), Some("App"));
    assert_eq!(project.full_path(&id(MAIN_GROUP)).as_deref(), Some(""));
    assert_eq!(
        project
            .full_path(&id("7BF000000000000000000006"))
            .as_deref(),
        Some("$(BUILT_PRODUCTS_DIR)/App.app")
    );
}

#[test]
fn source_root_and_absolute_trees_stop_climbing() {
    let mut project = sample();
    let obj = project.objects.get_mut(&id(CONTENT_VIEW)).unwrap();
    obj.set_str("sourceTree", "SOURCE_ROOT");
    obj.set_str("path", "Shared/ContentView.swift");
    assert_eq!(
        project.full_path(&id(CONTENT_VIEW)).as_deref(),
        Some("Shared/ContentView.swift")
    );

    let obj = project.objects.get_mut(&id(CONTENT_VIEW)).unwrap();
    obj.set_str("sourceTree", "<absolute>");
    obj.set_str("path", "/tmp/x/ContentView.swift");
    assert_eq!(
        project.full_path(&id(CONTENT_VIEW)).as_deref(),
        Some("/tmp/x/ContentView.swift")
    );
}

#[test]
fn normalize_path_collapses_segments() {
    assert_eq!(normalize_path("a/./b//c/../d"), "a/b/d");
    assert_eq!(normalize_path("../x"), "../x");
    assert_eq!(normalize_path("/a/../../b"), "/b");
    assert_eq!(normalize_path(""), "");
}

#[test]
fn generated_ids_are_canonical_and_unique() {
    let project = sample();
    let a = project.generate_id();
    let b = project.generate_id();
    assert!(a.is_canonical(), "{a}");
    assert_ne!(a, b);
    assert!(!project.contains(a.as_str()));
}

#[test]
fn find_file_refs_matches_resolved_paths() {
    let project = sample();
    let parents = project.parents();
    assert_eq!(
        project.find_file_refs(&parents, "./App/ContentView.swift"),
        vec![id(CONTENT_VIEW)]
    );
    assert!(project.find_file_refs(&parents, "ContentView.swift").is_empty());
    assert_eq!(project.groups_at(&parents, "AppTests"), vec![id(TESTS_GROUP)]);
}

#[test]
fn annotations_follow_xcode_conventions() {
    let project = sample();
    let notes = project.annotations();
    assert_eq!(notes[CONTENT_VIEW_BUILD], "ContentView.swift in Sources");
    assert_eq!(
        notes["7B6000000000000000000001"],
        "Build configuration list for PBXProject \"App\""
    );
    assert!(!notes.contains_key(MAIN_GROUP));
}

#[test]
fn parse_rejects_objects_without_isa() {
    let err = PbxProject::parse("{ objects = { A = { name = x; }; }; }", "X")
        .expect_err("missing isa");
    assert_eq!(err.code(), "project.missing_isa");
}

#[test]
fn project_name_comes_from_xcodeproj_dir() {
    assert_eq!(
        project_name_from_path(Path::new("/x/on brand.xcodeproj/project.pbxproj")),
        "on brand"
    );
    assert_eq!(project_name_from_path(Path::new("project.pbxproj")), "Project");
}
