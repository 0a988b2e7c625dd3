use crate::api::TreeNode;
use crate::project::{ObjectId, ParentMap, PbxProject};
use std::collections::BTreeSet;
use std::path::Path;

fn kind_of(isa: &str) -> &'static str {
    match isa {
        "PBXGroup" => "group",
        "PBXVariantGroup" => "variant_group",
        "XCVersionGroup" => "version_group",
        _ => "file",
    }
}

/// Navigator tree from the main group. `disk_root` fills `exists` for
/// files that resolve to a project-relative path.
pub fn build_tree(project: &PbxProject, disk_root: Option<&Path>) -> Option<TreeNode> {
    let main = project.main_group()?;
    let parents = project.parents();
    let mut seen = BTreeSet::new();
    let mut root = node(project, &parents, &main, disk_root, &mut seen)?;
    if project.display_name(&main).is_none() {
        root.name = project.name.clone();
    }
    Some(root)
}

fn node(
    project: &PbxProject,
    parents: &ParentMap,
    id: &ObjectId,
    disk_root: Option<&Path>,
    seen: &mut BTreeSet<ObjectId>,
) -> Option<TreeNode> {
    if !seen.insert(id.clone()) {
        return None;
    }
    let obj = project.get(id)?;
    let kind = kind_of(&obj.isa);
    let path = project.full_path_with(parents, id);
    let exists = match (disk_root, &path) {
        (Some(root), Some(p))
            if kind == "file"
                && matches!(
                    obj.str_field("sourceTree").unwrap_or("<group>"),
                    "<group>" | "SOURCE_ROOT"
                ) =>
        {
            Some(root.join(p).exists())
        }
        _ => None,
    };
    let children = project
        .children(id)
        .iter()
        .filter_map(|child| node(project, parents, child, disk_root, seen))
        .collect();
    Some(TreeNode {
        id: id.to_string(),
        name: project.display_name(id).unwrap_or_else(|| id.to_string()),
        kind: kind.to_string(),
        path,
        file_type: obj
            .str_field("lastKnownFileType")
            .or_else(|| obj.str_field("explicitFileType"))
            .map(str::to_string),
        exists,
        children,
    })
}

/// Two-space indented listing: groups end in `/` and carry `[group]`,
/// files carry their type and a `missing` marker when absent on disk.
pub fn render_tree(root: &TreeNode) -> String {
    let mut out = String::new();
    render(root, 0, &mut out);
    out
}

fn render(node: &TreeNode, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    if node.kind == "file" {
        out.push_str(&format!("{indent}{}", node.name));
        if let Some(ty) = &node.file_type {
            out.push_str(&format!(" ({ty})"));
        }
        if node.exists == Some(false) {
            out.push_str(" missing");
        }
    } else {
        out.push_str(&format!(
            "{indent}{}/ [{}]",
            node.name,
            node.kind.replace('_', " ")
        ));
    }
    out.push('\n');
    for child in &node.children {
        render(child, depth + 1, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::fixtures::*;

    #[test]
    fn renders_navigator_order() {
        let project = sample();
        let root = build_tree(&project, None).unwrap();
        assert_eq!(root.id, MAIN_GROUP);
        let names: Vec<&str> = root.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["App", "AppTests", "Products"]);

        let text = render_tree(&root);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[1], "  App/ [group]");
        assert_eq!(lines[2], "    AppApp.swift (sourcecode.swift)");
        assert!(text.contains("    App.app (wrapper.application)\n"), "{text}");
        assert!(!text.contains("missing"));
    }

    #[test]
    fn disk_root_marks_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("App")).unwrap();
        std::fs::write(dir.path().join("App/AppApp.swift"), "").unwrap();

        let root = build_tree(&sample(), Some(dir.path())).unwrap();
        let app = &root.children[0];
        assert_eq!(app.children[0].exists, Some(true));
        assert_eq!(app.children[1].exists, Some(false));
        assert_eq!(app.exists, None);
        let products = root.children.last().unwrap();
        assert_eq!(products.children[0].exists, None);

        let text = render_tree(&root);
        assert!(text.contains("ContentView.swift (sourcecode.swift) missing"));
    }
}
