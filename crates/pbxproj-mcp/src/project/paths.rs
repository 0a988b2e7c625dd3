use super::{ObjectId, PbxProject};
use std::collections::{BTreeMap, BTreeSet};

/// child → owning group.
pub type ParentMap = BTreeMap<ObjectId, ObjectId>;

const MAX_GROUP_DEPTH: usize = 256;

/// Collapses `.`/`..`/empty segments; `..` that climbs above the start is kept.
pub fn normalize_path(raw: &str) -> String {
    let absolute = raw.starts_with('/');
    let mut parts: Vec<&str> = vec![];
    for seg in raw.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|p| *p != "..") {
                    parts.pop();
                } else if !absolute {
                    parts.push("..");
                }
            }
            other => parts.push(other),
        }
    }
    let joined = parts.join("/");
    if absolute { format!("/{joined}") } else { joined }
}

pub fn parent_dir(path: &str) -> &str {
    path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

pub fn file_name(path: &str) -> &str {
    path.rsplit_once('/').map(|(_, name)| name).unwrap_or(path)
}

impl PbxProject {
    pub fn parents(&self) -> ParentMap {
        let mut map = ParentMap::new();
        for (id, obj) in &self.objects {
            if !obj.is_group() {
                continue;
            }
            for child in obj.id_list("children") {
                map.entry(child).or_insert_with(|| id.clone());
            }
        }
        map
    }

    pub fn full_path(&self, id: &ObjectId) -> Option<String> {
        self.full_path_with(&self.parents(), id)
    }

    /// Project-root-relative path of a file reference or group.
    ///
    /// `<group>` climbs the owning groups, `SOURCE_ROOT` stops at the project
    /// root, `<absolute>` yields an absolute path and any other tree is kept as
    /// a `$(TREE)` prefix.
    pub fn full_path_with(&self, parents: &ParentMap, id: &ObjectId) -> Option<String> {
        let mut parts: Vec<String> = vec![];
        let mut cur = id.clone();
        for _ in 0..MAX_GROUP_DEPTH {
            let obj = self.objects.get(&cur)?;
            if let Some(p) = obj.str_field("path") {
                parts.push(p.to_string());
            }
            match obj.str_field("sourceTree").unwrap_or("<group>") {
                "<group>" => match parents.get(&cur) {
                    Some(parent) => cur = parent.clone(),
                    None => break,
                },
                "SOURCE_ROOT" | "<absolute>" => break,
                other => {
                    parts.push(format!("$({other})"));
                    break;
                }
            }
        }

        let mut joined = String::new();
        for part in parts.iter().rev() {
            if joined.is_empty() || part.starts_with('/') {
                joined = part.clone();
            } else {
                joined = format!("{joined}/{part}");
            }
        }
        Some(normalize_path(&joined))
    }

    /// File references resolving to `path`, navigator order first.
    pub fn find_file_refs(&self, parents: &ParentMap, path: &str) -> Vec<ObjectId> {
        let want = normalize_path(path);
        let matches = |id: &ObjectId| {
            self.objects.get(id).is_some_and(|o| o.is_file_reference())
                && self.full_path_with(parents, id).as_deref() == Some(want.as_str())
        };

        let mut out: Vec<ObjectId> = vec![];
        let mut seen = BTreeSet::new();
        for id in self.tree_order() {
            if matches(&id) && seen.insert(id.clone()) {
                out.push(id);
            }
        }
        for id in self.objects.keys() {
            if !seen.contains(id) && matches(id) {
                out.push(id.clone());
            }
        }
        out
    }

    /// Groups whose resolved path is `dir`, navigator order.
    pub fn groups_at(&self, parents: &ParentMap, dir: &str) -> Vec<ObjectId> {
        let want = normalize_path(dir);
        self.tree_order()
            .into_iter()
            .filter(|id| self.objects.get(id).is_some_and(|o| o.isa == "PBXGroup"))
            .filter(|id| self.full_path_with(parents, id).as_deref() == Some(want.as_str()))
            .collect()
    }

    /// File references sharing a resolved path, navigator order first then id.
    pub fn duplicate_file_refs(&self) -> Vec<(String, Vec<ObjectId>)> {
        let parents = self.parents();
        let order: BTreeMap<ObjectId, usize> = self
            .tree_order()
            .into_iter()
            .enumerate()
            .map(|(i, id)| (id, i))
            .collect();
        let mut by_path: BTreeMap<String, Vec<ObjectId>> = BTreeMap::new();
        for (id, obj) in &self.objects {
            if !obj.is_file_reference() || obj.str_field("path").is_none() {
                continue;
            }
            if let Some(path) = self.full_path_with(&parents, id) {
                by_path.entry(path).or_default().push(id.clone());
            }
        }
        by_path
            .into_iter()
            .filter(|(_, ids)| ids.len() > 1)
            .map(|(path, mut ids)| {
                ids.sort_by_key(|id| (order.get(id).copied().unwrap_or(usize::MAX), id.clone()));
                (path, ids)
            })
            .collect()
    }
}

/// `path` relative to directory `dir`; `None` when it lies outside.
pub fn strip_dir_prefix<'a>(path: &'a str, dir: &str) -> Option<&'a str> {
    if dir.is_empty() {
        return Some(path);
    }
    path.strip_prefix(dir)?.strip_prefix('/')
}
