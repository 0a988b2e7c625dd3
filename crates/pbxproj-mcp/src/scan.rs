use crate::project::PbxProject;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::BTreeSet;
use std::path::Path;
use walkdir::{DirEntry, WalkDir};

pub const DEFAULT_INCLUDE: &str = "**/*.swift";

/// Directories Xcode treats as a single file reference.
const BUNDLE_EXTENSIONS: &[&str] = &[
    "xcassets",
    "xcdatamodeld",
    "bundle",
    "framework",
    "xcframework",
    "lproj",
    "playground",
    "docc",
];

pub(crate) fn build_globset(globs: &[String]) -> Result<GlobSet, String> {
    let mut b = GlobSetBuilder::new();
    for p in globs {
        let g = Glob::new(p).map_err(|e| format!("invalid glob {p:?}: {e}"))?;
        b.add(g);
    }
    b.build().map_err(|e| format!("failed to build globset: {e}"))
}

fn extension_of(entry: &DirEntry) -> Option<String> {
    entry
        .path()
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
}

fn is_bundle(entry: &DirEntry) -> bool {
    entry.file_type().is_dir()
        && extension_of(entry).is_some_and(|e| BUNDLE_EXTENSIONS.contains(&e.as_str()))
}

fn should_descend(entry: &DirEntry) -> bool {
    if !entry.file_type().is_dir() || entry.depth() == 0 {
        return true;
    }
    let name = entry.file_name().to_string_lossy();
    if matches!(
        name.as_ref(),
        ".git" | "build" | "DerivedData" | "Pods" | ".build" | ".swiftpm" | "Carthage"
    ) {
        return false;
    }
    !matches!(
        extension_of(entry).as_deref(),
        Some("xcodeproj" | "xcworkspace")
    )
}

fn normalize_rel(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    Some(rel.to_string_lossy().replace('\\', "/"))
}

/// Project-relative paths under `root` that match the include globs
/// (default `**/*.swift`), miss the excludes, and have no file reference.
/// Bundle directories such as `.xcassets` count as one file.
pub fn find_unreferenced(
    root: &Path,
    project: &PbxProject,
    include_globs: &[String],
    exclude_globs: &[String],
) -> Result<Vec<String>, String> {
    let include = if include_globs.is_empty() {
        build_globset(&[DEFAULT_INCLUDE.to_string()])?
    } else {
        build_globset(include_globs)?
    };
    let exclude = if exclude_globs.is_empty() {
        None
    } else {
        Some(build_globset(exclude_globs)?)
    };

    let parents = project.parents();
    let known: BTreeSet<String> = project
        .objects
        .iter()
        .filter(|(_, o)| o.is_file_reference() || o.isa == "PBXVariantGroup")
        .filter_map(|(id, _)| project.full_path_with(&parents, id))
        .collect();

    let mut out = vec![];
    let mut walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(should_descend);
    while let Some(entry) = walker.next() {
        let Ok(entry) = entry else {
            continue;
        };
        let bundle = is_bundle(&entry);
        if bundle {
            walker.skip_current_dir();
        } else if !entry.file_type().is_file() {
            continue;
        }
        let Some(rel) = normalize_rel(root, entry.path()) else {
            continue;
        };
        if !include.is_match(&rel) {
            continue;
        }
        if let Some(exc) = &exclude
            && exc.is_match(&rel)
        {
            continue;
        }
        if known.contains(&rel) {
            continue;
        }
        tracing::debug!(file = %rel, "unreferenced");
        out.push(rel);
    }
    out.sort();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::fixtures::sample;
    use std::fs;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    #[test]
    fn reports_swift_files_without_references() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        for rel in [
            "App/AppApp.swift",
            "App/ContentView.swift",
            "App/Settings.swift",
            "AppTests/AppTests.swift",
            "AppTests/Mocks/MockStore.swift",
            "build/Intermediates/Gen.swift",
            "Pods/Lib/Lib.swift",
            ".git/hooks/x.swift",
            "App.xcodeproj/project.xcworkspace/Noise.swift",
            "App/README.md",
        ] {
            touch(root, rel);
        }

        let found = find_unreferenced(root, &sample(), &[], &[]).unwrap();
        assert_eq!(
            found,
            vec!["App/Settings.swift", "AppTests/Mocks/MockStore.swift"]
        );

        let found =
            find_unreferenced(root, &sample(), &[], &["**/Mocks/**".to_string()]).unwrap();
        assert_eq!(found, vec!["App/Settings.swift"]);
    }

    #[test]
    fn bundles_count_as_single_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(root, "App/Assets.xcassets/AppIcon.appiconset/Contents.json");
        touch(root, "App/Media.xcassets/Contents.json");
        touch(root, "App/Info.plist");

        let include = vec!["**/*.xcassets".to_string(), "**/*.plist".to_string()];
        let found = find_unreferenced(root, &sample(), &include, &[]).unwrap();
        assert_eq!(found, vec!["App/Media.xcassets"]);
    }

    #[test]
    fn invalid_glob_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = find_unreferenced(dir.path(), &sample(), &["a/[".to_string()], &[])
            .unwrap_err();
        assert!(err.contains("invalid glob"), "{err}");
    }
}
