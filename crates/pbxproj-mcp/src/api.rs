use crate::project::PhaseKind;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Violation {
    pub code: String,
    pub message: String,
    /// Object the finding is about, when there is one.
    #[serde(default)]
    pub object_id: Option<String>,
    /// Project-relative file path, when the object resolves to one.
    pub path: Option<String>,
    pub details: Option<serde_json::Value>,
    #[serde(default)]
    pub tier: ViolationTier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum ViolationTier {
    #[default]
    Blocking,
    Observation,
}

impl Violation {
    pub fn blocking(
        code: impl Into<String>,
        message: impl Into<String>,
        path: Option<String>,
        details: Option<serde_json::Value>,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            object_id: None,
            path,
            details,
            tier: ViolationTier::Blocking,
        }
    }

    pub fn observation(
        code: impl Into<String>,
        message: impl Into<String>,
        path: Option<String>,
        details: Option<serde_json::Value>,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            object_id: None,
            path,
            details,
            tier: ViolationTier::Observation,
        }
    }

    pub fn on(mut self, id: impl std::fmt::Display) -> Self {
        self.object_id = Some(id.to_string());
        self
    }

    pub fn is_blocking(&self) -> bool {
        self.tier == ViolationTier::Blocking
    }

    /// Identity used to tell pre-existing findings from new ones.
    pub fn fingerprint(&self) -> (String, Option<String>, String) {
        (
            self.code.clone(),
            self.object_id.clone(),
            self.details
                .as_ref()
                .map(|d| d.to_string())
                .unwrap_or_default(),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResponseMode {
    #[default]
    Compact,
    Full,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
pub struct PayloadMeta {
    pub mode: ResponseMode,
    pub truncated: bool,
    #[serde(default)]
    pub omitted: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    AddedFileRef,
    AddedBuildFile,
    AddedToPhase,
    AddedToGroup,
    CreatedGroup,
    CreatedPhase,
    RemovedObject,
    RemovedFromList,
    MovedBuildFile,
    Relinked,
    PathRewritten,
    PhaseRebuilt,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Change {
    pub kind: ChangeKind,
    /// Object that changed.
    pub id: String,
    pub detail: String,
}

/// Build phase selection for edits. `auto` picks the phase from the file type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum PhaseArg {
    #[default]
    Auto,
    None,
    Sources,
    Resources,
    Frameworks,
    Headers,
}

impl PhaseArg {
    /// The concrete phase; `None` for both `auto` and `none`.
    pub fn kind(self) -> Option<PhaseKind> {
        match self {
            PhaseArg::Auto | PhaseArg::None => None,
            PhaseArg::Sources => Some(PhaseKind::Sources),
            PhaseArg::Resources => Some(PhaseKind::Resources),
            PhaseArg::Frameworks => Some(PhaseKind::Frameworks),
            PhaseArg::Headers => Some(PhaseKind::Headers),
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "auto" => Some(PhaseArg::Auto),
            "none" => Some(PhaseArg::None),
            other => match PhaseKind::parse(other)? {
                PhaseKind::Sources => Some(PhaseArg::Sources),
                PhaseKind::Resources => Some(PhaseArg::Resources),
                PhaseKind::Frameworks => Some(PhaseArg::Frameworks),
                PhaseKind::Headers => Some(PhaseArg::Headers),
                _ => None,
            },
        }
    }
}

/// One path rewrite. In TOML: `strip_prefix = "era/"`,
/// `replace_prefix = { from = "a/", to = "b/" }` or
/// `regex = { pattern = "...", replacement = "..." }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RewriteRule {
    StripPrefix(String),
    ReplacePrefix { from: String, to: String },
    Regex { pattern: String, replacement: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Relocation {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteOptions {
    pub dry_run: bool,
    /// `None` defers to configuration.
    pub backup: Option<bool>,
    pub expect_sha256: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CommitSummary {
    pub written: bool,
    pub dry_run: bool,
    pub sha256_before: String,
    pub sha256_after: String,
    pub backup_path: Option<String>,
    /// Unified diff of the change; filled for dry runs.
    pub diff: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TreeNode {
    pub id: String,
    pub name: String,
    /// `group`, `variant_group`, `version_group` or `file`.
    pub kind: String,
    pub path: Option<String>,
    pub file_type: Option<String>,
    /// Present only when disk checks were requested.
    pub exists: Option<bool>,
    #[serde(default)]
    pub children: Vec<TreeNode>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ValidateRequest {
    pub repo_root: Option<String>,
    /// `.pbxproj`, `.xcodeproj`, or a directory holding one `.xcodeproj`.
    pub project: Option<String>,
    /// Also report file references missing on disk.
    pub check_disk: Option<bool>,
    #[serde(default)]
    pub response_mode: Option<ResponseMode>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct TreeRequest {
    pub repo_root: Option<String>,
    pub project: Option<String>,
    pub check_disk: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct AddRequest {
    pub repo_root: Option<String>,
    pub project: Option<String>,
    /// Project-relative file paths.
    pub paths: Vec<String>,
    pub target: Option<String>,
    /// Project-relative directory of the group to place files in.
    pub group: Option<String>,
    pub phase: Option<PhaseArg>,
    pub create_groups: Option<bool>,
    pub dry_run: Option<bool>,
    pub backup: Option<bool>,
    pub expect_sha256: Option<String>,
    #[serde(default)]
    pub response_mode: Option<ResponseMode>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct RemoveRequest {
    pub repo_root: Option<String>,
    pub project: Option<String>,
    /// Project-relative paths or object ids.
    pub paths: Vec<String>,
    pub dry_run: Option<bool>,
    pub backup: Option<bool>,
    pub expect_sha256: Option<String>,
    #[serde(default)]
    pub response_mode: Option<ResponseMode>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct MoveRequest {
    pub repo_root: Option<String>,
    pub project: Option<String>,
    pub paths: Vec<String>,
    pub from_target: Option<String>,
    pub to_target: Option<String>,
    pub phase: Option<PhaseArg>,
    pub dry_run: Option<bool>,
    pub backup: Option<bool>,
    pub expect_sha256: Option<String>,
    #[serde(default)]
    pub response_mode: Option<ResponseMode>,
}

/// Parameters shared by `dedupe` and `repair`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct MaintenanceRequest {
    pub repo_root: Option<String>,
    pub project: Option<String>,
    pub dry_run: Option<bool>,
    pub backup: Option<bool>,
    pub expect_sha256: Option<String>,
    #[serde(default)]
    pub response_mode: Option<ResponseMode>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct RewritePathsRequest {
    pub repo_root: Option<String>,
    pub project: Option<String>,
    /// Falls back to `[[rewrite]]` rules from `pbxproj.toml`.
    pub rules: Option<Vec<RewriteRule>>,
    pub dry_run: Option<bool>,
    pub backup: Option<bool>,
    pub expect_sha256: Option<String>,
    #[serde(default)]
    pub response_mode: Option<ResponseMode>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct RelocateRequest {
    pub repo_root: Option<String>,
    pub project: Option<String>,
    /// Applied in order; a `from` directory moves everything under it.
    pub moves: Vec<Relocation>,
    pub dry_run: Option<bool>,
    pub backup: Option<bool>,
    pub expect_sha256: Option<String>,
    #[serde(default)]
    pub response_mode: Option<ResponseMode>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct SyncPhaseRequest {
    pub repo_root: Option<String>,
    pub project: Option<String>,
    pub target: Option<String>,
    /// Project-relative directory of the group to scan; main group when absent.
    pub group: Option<String>,
    pub phase: Option<PhaseArg>,
    /// Reorder the phase to follow group order.
    pub rebuild: Option<bool>,
    pub dry_run: Option<bool>,
    pub backup: Option<bool>,
    pub expect_sha256: Option<String>,
    #[serde(default)]
    pub response_mode: Option<ResponseMode>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct SyncRequest {
    pub repo_root: Option<String>,
    pub project: Option<String>,
    pub target: Option<String>,
    pub include_globs: Option<Vec<String>>,
    pub exclude_globs: Option<Vec<String>>,
    pub dry_run: Option<bool>,
    pub backup: Option<bool>,
    pub expect_sha256: Option<String>,
    #[serde(default)]
    pub response_mode: Option<ResponseMode>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ValidateOutput {
    pub ok: bool,
    pub error: Option<ApiError>,
    pub project_path: Option<String>,
    pub sha256: Option<String>,
    pub objects: usize,
    pub blocking: usize,
    pub observations: usize,
    pub violations: Vec<Violation>,
    #[serde(default)]
    pub summary_md: Option<String>,
    #[serde(default)]
    pub payload_meta: Option<PayloadMeta>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TreeOutput {
    pub ok: bool,
    pub error: Option<ApiError>,
    pub project_path: Option<String>,
    /// Indented text rendering of the navigator.
    pub rendered: Option<String>,
    pub root: Option<TreeNode>,
    #[serde(default)]
    pub summary_md: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EditOutput {
    pub ok: bool,
    pub error: Option<ApiError>,
    /// Operation name, e.g. `add` or `dedupe`.
    pub op: String,
    pub project_path: Option<String>,
    pub changes: Vec<Change>,
    /// Blocking findings the edit would have introduced, or remaining ones after it.
    pub violations: Vec<Violation>,
    /// Files found on disk with no reference (sync only).
    #[serde(default)]
    pub unreferenced: Vec<String>,
    pub commit: Option<CommitSummary>,
    #[serde(default)]
    pub summary_md: Option<String>,
    #[serde(default)]
    pub payload_meta: Option<PayloadMeta>,
}

impl EditOutput {
    pub fn failed(op: &str, project_path: Option<String>, error: ApiError) -> Self {
        Self {
            ok: false,
            error: Some(error),
            op: op.to_string(),
            project_path,
            changes: vec![],
            violations: vec![],
            unreferenced: vec![],
            commit: None,
            summary_md: None,
            payload_meta: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrite_rules_read_from_toml_tables() {
        #[derive(Deserialize)]
        struct Doc {
            rewrite: Vec<RewriteRule>,
        }
        let doc: Doc = toml::from_str(
            r#"
[[rewrite]]
strip_prefix = "era/"

[[rewrite]]
replace_prefix = { from = "Old/", to = "New/" }

[[rewrite]]
regex = { pattern = "^Legacy(\\w+)/", replacement = "$1/" }
"#,
        )
        .expect("parse");
        assert_eq!(doc.rewrite[0], RewriteRule::StripPrefix("era/".into()));
        assert_eq!(
            doc.rewrite[1],
            RewriteRule::ReplacePrefix {
                from: "Old/".into(),
                to: "New/".into()
            }
        );
        assert!(matches!(doc.rewrite[2], RewriteRule::Regex { .. }));
    }

    #[test]
    fn phase_arg_parses_cli_spellings() {
        assert_eq!(PhaseArg::parse("auto"), Some(PhaseArg::Auto));
        assert_eq!(PhaseArg::parse("Sources"), Some(PhaseArg::Sources));
        assert_eq!(PhaseArg::parse("none"), Some(PhaseArg::None));
        assert_eq!(PhaseArg::parse("copy_files"), None);
        assert_eq!(PhaseArg::Auto.kind(), None);
        assert_eq!(PhaseArg::Frameworks.kind(), Some(PhaseKind::Frameworks));
    }

    #[test]
    fn add_request_rejects_unknown_fields() {
        let err = serde_json::from_value::<AddRequest>(serde_json::json!({
            "paths": ["a.swift"],
            "bogus": true
        }))
        .expect_err("unknown field must fail");
        assert!(err.to_string().contains("bogus"));
    }
}
