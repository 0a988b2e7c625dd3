use crate::api::{EditOutput, PayloadMeta, ResponseMode, TreeOutput, ValidateOutput};
use std::collections::BTreeMap;

const DEFAULT_COMPACT_TOP_N: usize = 50;

fn compact_top_n() -> usize {
    std::env::var("PBXPROJ_COMPACT_TOP_N")
        .ok()
        .and_then(|s| s.trim().parse::<usize>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(DEFAULT_COMPACT_TOP_N)
}

fn truncate_vec<T>(
    key: &str,
    vec: &mut Vec<T>,
    top_n: usize,
    omitted: &mut BTreeMap<String, usize>,
) {
    if vec.len() > top_n {
        omitted.insert(key.to_string(), vec.len() - top_n);
        vec.truncate(top_n);
    }
}

fn compact_meta(omitted: BTreeMap<String, usize>) -> PayloadMeta {
    PayloadMeta {
        mode: ResponseMode::Compact,
        truncated: !omitted.is_empty(),
        omitted,
    }
}

fn validate_summary(out: &ValidateOutput) -> String {
    let status = if out.error.is_some() {
        "error"
    } else if out.ok {
        "pass"
    } else {
        "blocked"
    };
    let why = if let Some(err) = &out.error {
        format!("{}.", err.code)
    } else {
        format!(
            "objects={}, blocking={}, observations={}.",
            out.objects, out.blocking, out.observations
        )
    };
    let next = if out.error.is_some() {
        "fix the project path or config and rerun pbx.validate.".to_string()
    } else if out.ok && out.observations == 0 {
        "project is consistent; edit away.".to_string()
    } else if out.ok {
        "optional: pbx.dedupe merges duplicate references.".to_string()
    } else {
        let top = out
            .violations
            .iter()
            .find(|v| v.is_blocking())
            .map(|v| v.code.as_str())
            .unwrap_or("the first blocking violation");
        format!("fix `{top}` (pbx.repair or pbx.dedupe usually do) and rerun pbx.validate.")
    };
    format!("**Status:** {status}\n**Why:** {why}\n**Next:** {next}")
}

fn edit_summary(out: &EditOutput) -> String {
    let written = out.commit.as_ref().is_some_and(|c| c.written);
    let dry_run = out.commit.as_ref().is_some_and(|c| c.dry_run);
    let status = if !out.ok {
        "blocked"
    } else if written {
        "written"
    } else if dry_run && !out.changes.is_empty() {
        "planned"
    } else {
        "unchanged"
    };
    let why = if let Some(err) = &out.error {
        format!("{}.", err.code)
    } else {
        format!("op={}, changes={}.", out.op, out.changes.len())
    };
    let next = match status {
        "written" => "run pbx.validate to confirm.".to_string(),
        "planned" => format!("review the diff and rerun pbx.{} without dry_run.", out.op),
        "unchanged" => "nothing to do.".to_string(),
        _ => match &out.error {
            Some(err) if err.code == "edit.introduced_violation" => {
                "adjust the request; the edit would break references.".to_string()
            }
            Some(err) if err.code == "store.conflict" => {
                "re-read the project (pbx.validate) and retry with the new sha256.".to_string()
            }
            _ => format!("fix the error and rerun pbx.{}.", out.op),
        },
    };
    format!("**Status:** {status}\n**Why:** {why}\n**Next:** {next}")
}

fn tree_summary(out: &TreeOutput) -> String {
    let status = if out.ok { "ok" } else { "error" };
    let why = if let Some(err) = &out.error {
        format!("{}.", err.code)
    } else {
        let lines = out.rendered.as_deref().map_or(0, |r| r.lines().count());
        format!("nodes={lines}.")
    };
    let next = if out.ok {
        "use pbx.add / pbx.relocate to change the structure."
    } else {
        "fix the project path and rerun pbx.tree."
    };
    format!("**Status:** {status}\n**Why:** {why}\n**Next:** {next}")
}

pub fn finalize_validate(mut out: ValidateOutput, mode: ResponseMode) -> ValidateOutput {
    out.payload_meta = match mode {
        ResponseMode::Compact => {
            let mut omitted = BTreeMap::new();
            truncate_vec("violations", &mut out.violations, compact_top_n(), &mut omitted);
            Some(compact_meta(omitted))
        }
        ResponseMode::Full => None,
    };
    out.summary_md = Some(validate_summary(&out));
    out
}

pub fn finalize_edit(mut out: EditOutput, mode: ResponseMode) -> EditOutput {
    out.payload_meta = match mode {
        ResponseMode::Compact => {
            let top_n = compact_top_n();
            let mut omitted = BTreeMap::new();
            truncate_vec("changes", &mut out.changes, top_n, &mut omitted);
            truncate_vec("violations", &mut out.violations, top_n, &mut omitted);
            truncate_vec("unreferenced", &mut out.unreferenced, top_n, &mut omitted);
            Some(compact_meta(omitted))
        }
        ResponseMode::Full => None,
    };
    out.summary_md = Some(edit_summary(&out));
    out
}

pub fn finalize_tree(mut out: TreeOutput) -> TreeOutput {
    out.summary_md = Some(tree_summary(&out));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiError, Change, ChangeKind, CommitSummary, Violation};

    fn change(i: usize) -> Change {
        Change {
            kind: ChangeKind::AddedFileRef,
            id: format!("{i:024X}"),
            detail: format!("File{i}.swift"),
        }
    }

    fn edit_output(changes: usize) -> EditOutput {
        let mut out = EditOutput::failed("add", Some("App.xcodeproj/project.pbxproj".into()), ApiError::new("x", "y"));
        out.ok = true;
        out.error = None;
        out.changes = (0..changes).map(change).collect();
        out
    }

    #[test]
    fn compact_edit_truncates_changes() {
        let out = finalize_edit(edit_output(DEFAULT_COMPACT_TOP_N + 5), ResponseMode::Compact);
        assert_eq!(out.changes.len(), DEFAULT_COMPACT_TOP_N);
        let meta = out.payload_meta.unwrap();
        assert!(meta.truncated);
        assert_eq!(meta.omitted.get("changes"), Some(&5));

        let full = finalize_edit(edit_output(DEFAULT_COMPACT_TOP_N + 5), ResponseMode::Full);
        assert_eq!(full.changes.len(), DEFAULT_COMPACT_TOP_N + 5);
        assert!(full.payload_meta.is_none());
    }

    #[test]
    fn edit_summary_tracks_commit_state() {
        let mut out = edit_output(2);
        out.commit = Some(CommitSummary {
            written: false,
            dry_run: true,
            sha256_before: "a".into(),
            sha256_after: "b".into(),
            backup_path: None,
            diff: Some(String::new()),
        });
        let out = finalize_edit(out, ResponseMode::Compact);
        let md = out.summary_md.unwrap();
        assert!(md.starts_with("**Status:** planned\n"), "{md}");
        assert!(md.contains("rerun pbx.add without dry_run"));

        let out = finalize_edit(edit_output(0), ResponseMode::Compact);
        assert!(out.summary_md.unwrap().contains("**Status:** unchanged"));
    }

    #[test]
    fn validate_summary_points_at_first_blocking_code() {
        let out = ValidateOutput {
            ok: false,
            error: None,
            project_path: None,
            sha256: None,
            objects: 10,
            blocking: 1,
            observations: 1,
            violations: vec![
                Violation::observation("pbx.orphan_object", "orphan", None, None),
                Violation::blocking("pbx.dangling_reference", "dangling", None, None),
            ],
            summary_md: None,
            payload_meta: None,
        };
        let md = finalize_validate(out, ResponseMode::Full).summary_md.unwrap();
        assert!(md.contains("**Status:** blocked"));
        assert!(md.contains("fix `pbx.dangling_reference`"), "{md}");
    }
}
