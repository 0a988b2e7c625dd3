use super::{
    EditError, EditReport, delete_object, group_for_dir, push_id, relative_to_group,
    remove_from_list, set_location,
};
use crate::api::{ChangeKind, Relocation, RewriteRule};
use crate::project::{
    ObjectId, ParentMap, PbxProject, file_name, normalize_path, parent_dir, strip_dir_prefix,
};
use regex::Regex;
use std::collections::BTreeSet;

enum Rule<'a> {
    Strip(&'a str),
    Replace(&'a str, &'a str),
    Pattern(Regex, &'a str),
}

fn compile(rules: &[RewriteRule]) -> Result<Vec<Rule<'_>>, EditError> {
    rules
        .iter()
        .map(|rule| match rule {
            RewriteRule::StripPrefix(prefix) if prefix.is_empty() => Err(EditError::InvalidRule(
                "strip_prefix must not be empty".to_string(),
            )),
            RewriteRule::StripPrefix(prefix) => Ok(Rule::Strip(prefix)),
            RewriteRule::ReplacePrefix { from, .. } if from.is_empty() => Err(
                EditError::InvalidRule("replace_prefix.from must not be empty".to_string()),
            ),
            RewriteRule::ReplacePrefix { from, to } => Ok(Rule::Replace(from, to)),
            RewriteRule::Regex {
                pattern,
                replacement,
            } => Regex::new(pattern)
                .map(|re| Rule::Pattern(re, replacement))
                .map_err(|e| EditError::InvalidRule(format!("{pattern}: {e}"))),
        })
        .collect()
}

enum Rewrite {
    Set(String),
    /// A group whose whole path was stripped keeps only its name.
    Drop,
}

fn apply(rules: &[Rule<'_>], path: &str, is_group: bool) -> Option<Rewrite> {
    for rule in rules {
        match rule {
            Rule::Strip(prefix) => {
                if let Some(rest) = path.strip_prefix(*prefix)
                    && !rest.is_empty()
                {
                    return Some(Rewrite::Set(rest.to_string()));
                }
                if is_group && (path == *prefix || path == prefix.trim_end_matches('/')) {
                    return Some(Rewrite::Drop);
                }
            }
            Rule::Replace(from, to) => {
                if let Some(rest) = path.strip_prefix(*from) {
                    return Some(Rewrite::Set(format!("{to}{rest}")));
                }
            }
            Rule::Pattern(re, replacement) => {
                if re.is_match(path) {
                    return Some(Rewrite::Set(re.replace_all(path, *replacement).into_owned()));
                }
            }
        }
    }
    None
}

/// Rewrites the `path` attribute of file references and groups, in id
/// order; the first matching rule wins.
pub fn rewrite_paths(
    project: &mut PbxProject,
    rules: &[RewriteRule],
) -> Result<EditReport, EditError> {
    let rules = compile(rules)?;
    let mut report = EditReport::default();
    for (id, obj) in project.objects.iter_mut() {
        if !obj.is_file_reference() && !obj.is_group() {
            continue;
        }
        let Some(old) = obj.str_field("path").map(str::to_string) else {
            continue;
        };
        match apply(&rules, &old, obj.is_group()) {
            Some(Rewrite::Set(new)) if !new.is_empty() && new != old => {
                obj.set_str("path", new.as_str());
                report.push(ChangeKind::PathRewritten, id, format!("{old} -> {new}"));
            }
            Some(Rewrite::Drop) => {
                obj.fields.remove("path");
                if obj.str_field("name").is_none() {
                    obj.set_str("name", old.as_str());
                }
                report.push(ChangeKind::PathRewritten, id, format!("{old} -> (none)"));
            }
            _ => {}
        }
    }
    Ok(report)
}

fn destination(moves: &[(String, String)], path: &str) -> Option<String> {
    moves.iter().find_map(|(from, to)| {
        if path == from {
            return Some(to.clone());
        }
        let rest = strip_dir_prefix(path, from)?;
        Some(if to.is_empty() {
            rest.to_string()
        } else {
            format!("{to}/{rest}")
        })
    })
}

fn is_bundle_group(isa: &str) -> bool {
    isa == "PBXVariantGroup" || isa == "XCVersionGroup"
}

/// File references and variant/version groups; members of a variant or
/// version group move with it.
fn is_unit(project: &PbxProject, parents: &ParentMap, id: &ObjectId) -> bool {
    let Some(obj) = project.get(id) else {
        return false;
    };
    if !obj.is_file_reference() && !is_bundle_group(&obj.isa) {
        return false;
    }
    !parents
        .get(id)
        .and_then(|p| project.get(p))
        .is_some_and(|p| is_bundle_group(&p.isa))
}

/// A variant group without a `path` sits in its parent's directory under its name.
fn unit_path(project: &PbxProject, parents: &ParentMap, id: &ObjectId) -> Option<String> {
    let obj = project.get(id)?;
    let dir = project.full_path_with(parents, id)?;
    if obj.isa != "PBXVariantGroup" || obj.str_field("path").is_some() {
        return Some(dir);
    }
    let name = obj.str_field("name")?;
    Some(if dir.is_empty() {
        name.to_string()
    } else {
        normalize_path(&format!("{dir}/{name}"))
    })
}

/// Renames a pathless variant group and the localized copies named after it.
fn rename_variant(project: &mut PbxProject, variant: &ObjectId, old: &str, new: &str) {
    if old == new {
        return;
    }
    for child in project.children(variant) {
        let Some(obj) = project.objects.get_mut(&child) else {
            continue;
        };
        let Some(path) = obj.str_field("path").map(str::to_string) else {
            continue;
        };
        if file_name(&path) == old {
            let dir = parent_dir(&path);
            let renamed = if dir.is_empty() {
                new.to_string()
            } else {
                format!("{dir}/{new}")
            };
            obj.set_str("path", &renamed);
        }
    }
    if let Some(obj) = project.objects.get_mut(variant) {
        obj.set_str("name", new);
    }
}

/// Moves file references to new project-relative locations: each lands in
/// the group for its new directory (created as needed) with its `path`
/// rewritten, and groups emptied by the move are removed. Localized and
/// versioned files move as their variant or version group.
pub fn relocate(project: &mut PbxProject, moves: &[Relocation]) -> Result<EditReport, EditError> {
    let moves: Vec<(String, String)> = moves
        .iter()
        .map(|m| (normalize_path(&m.from), normalize_path(&m.to)))
        .collect();
    if let Some((from, _)) = moves.iter().find(|(from, _)| from.is_empty()) {
        return Err(EditError::InvalidPath(from.clone()));
    }

    let mut parents = project.parents();
    let plan: Vec<(ObjectId, String, String)> = project
        .objects
        .keys()
        .filter(|id| is_unit(project, &parents, id))
        .filter_map(|id| {
            let old = unit_path(project, &parents, id)?;
            let new = destination(&moves, &old)?;
            (new != old && !new.is_empty()).then(|| (id.clone(), old, new))
        })
        .collect();

    let mut report = EditReport::default();
    let mut vacated = BTreeSet::new();
    for (id, old, new) in plan {
        let group = group_for_dir(project, &mut parents, parent_dir(&new), true, &mut report)?;
        match parents.get(&id).cloned() {
            Some(prev) if prev == group => {}
            prev => {
                if let Some(prev) = prev {
                    remove_from_list(project, &prev, "children", &id);
                    report.push(ChangeKind::RemovedFromList, &prev, format!("children: {id}"));
                    vacated.insert(prev);
                }
                push_id(project, &group, "children", &id);
                report.push(ChangeKind::AddedToGroup, &group, new.clone());
                parents.insert(id.clone(), group.clone());
            }
        }
        let pathless_variant = project
            .get(&id)
            .is_some_and(|o| o.isa == "PBXVariantGroup" && o.str_field("path").is_none());
        if pathless_variant {
            rename_variant(project, &id, file_name(&old), file_name(&new));
        } else {
            let (rel, tree) = relative_to_group(project, &parents, &group, &new);
            if let Some(obj) = project.objects.get_mut(&id) {
                set_location(obj, &rel, tree);
            }
        }
        report.push(ChangeKind::PathRewritten, &id, format!("{old} -> {new}"));
    }

    prune_empty_groups(project, vacated, &mut report);
    Ok(report)
}

fn prune_empty_groups(
    project: &mut PbxProject,
    candidates: BTreeSet<ObjectId>,
    report: &mut EditReport,
) {
    let keep: Vec<ObjectId> = [project.main_group(), project.products_group()]
        .into_iter()
        .flatten()
        .collect();
    let mut queue: Vec<ObjectId> = candidates.into_iter().collect();
    while let Some(group) = queue.pop() {
        if keep.contains(&group) {
            continue;
        }
        let Some(obj) = project.get(&group) else {
            continue;
        };
        if obj.isa != "PBXGroup" || !obj.id_list("children").is_empty() {
            continue;
        }
        let parent = project.parents().get(&group).cloned();
        delete_object(project, &group, report);
        queue.extend(parent);
    }
}
