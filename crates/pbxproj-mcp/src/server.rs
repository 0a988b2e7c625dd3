use crate::api::*;
use crate::response::{finalize_edit, finalize_tree, finalize_validate};
use rmcp::{
    Json, ServerHandler,
    handler::server::{tool::ToolRouter, wrapper::Parameters},
    model::*,
    tool, tool_handler, tool_router,
};

#[derive(Clone)]
pub struct PbxServer {
    tool_router: ToolRouter<Self>,
}

impl Default for PbxServer {
    fn default() -> Self {
        Self::new()
    }
}

fn mode(requested: Option<ResponseMode>) -> ResponseMode {
    requested.unwrap_or(ResponseMode::Compact)
}

#[tool_router]
impl PbxServer {
    pub fn new() -> Self {
        Self {
            tool_router: Self::tool_router(),
        }
    }

    #[tool(
        name = "pbx.validate",
        description = "Check project.pbxproj integrity: dangling ids, duplicate build files, orphans, malformed ids. check_disk=true also reports files missing on disk. Read-only."
    )]
    async fn validate(&self, params: Parameters<ValidateRequest>) -> Json<ValidateOutput> {
        let response_mode = mode(params.0.response_mode);
        Json(finalize_validate(crate::app::validate(params.0), response_mode))
    }

    #[tool(
        name = "pbx.tree",
        description = "Render the project navigator (groups and file references) as an indented tree plus structured nodes. Read-only."
    )]
    async fn tree(&self, params: Parameters<TreeRequest>) -> Json<TreeOutput> {
        Json(finalize_tree(crate::app::tree(params.0)))
    }

    #[tool(
        name = "pbx.add",
        description = "Add files (project-relative paths) to a group and a target's build phase. Phase auto picks Sources/Resources/Frameworks by file type. Refuses edits that introduce violations."
    )]
    async fn add(&self, params: Parameters<AddRequest>) -> Json<EditOutput> {
        let response_mode = mode(params.0.response_mode);
        Json(finalize_edit(crate::app::add(params.0), response_mode))
    }

    #[tool(
        name = "pbx.remove",
        description = "Remove file references (by path or id) with their build files and group entries."
    )]
    async fn remove(&self, params: Parameters<RemoveRequest>) -> Json<EditOutput> {
        let response_mode = mode(params.0.response_mode);
        Json(finalize_edit(crate::app::remove(params.0), response_mode))
    }

    #[tool(
        name = "pbx.move",
        description = "Move or copy files between targets: from_target drops membership, to_target adds it."
    )]
    async fn move_files(&self, params: Parameters<MoveRequest>) -> Json<EditOutput> {
        let response_mode = mode(params.0.response_mode);
        Json(finalize_edit(crate::app::move_files(params.0), response_mode))
    }

    #[tool(
        name = "pbx.dedupe",
        description = "Merge duplicate file references and build files, drop Info.plist from Resources phases."
    )]
    async fn dedupe(&self, params: Parameters<MaintenanceRequest>) -> Json<EditOutput> {
        let response_mode = mode(params.0.response_mode);
        Json(finalize_edit(crate::app::dedupe(params.0), response_mode))
    }

    #[tool(
        name = "pbx.repair",
        description = "Drop dangling references and orphaned build files so the project validates again."
    )]
    async fn repair(&self, params: Parameters<MaintenanceRequest>) -> Json<EditOutput> {
        let response_mode = mode(params.0.response_mode);
        Json(finalize_edit(crate::app::repair(params.0), response_mode))
    }

    #[tool(
        name = "pbx.rewrite_paths",
        description = "Rewrite file reference paths by prefix or regex rules; falls back to [[rewrite]] rules in pbxproj.toml."
    )]
    async fn rewrite_paths(&self, params: Parameters<RewritePathsRequest>) -> Json<EditOutput> {
        let response_mode = mode(params.0.response_mode);
        Json(finalize_edit(crate::app::rewrite_paths(params.0), response_mode))
    }

    #[tool(
        name = "pbx.relocate",
        description = "Follow files or directories moved on disk: updates references and regroups them under the new directory."
    )]
    async fn relocate(&self, params: Parameters<RelocateRequest>) -> Json<EditOutput> {
        let response_mode = mode(params.0.response_mode);
        Json(finalize_edit(crate::app::relocate(params.0), response_mode))
    }

    #[tool(
        name = "pbx.sync_phase",
        description = "Make a target's build phase match a group's files (adds missing members; rebuild=true reorders to group order)."
    )]
    async fn sync_phase(&self, params: Parameters<SyncPhaseRequest>) -> Json<EditOutput> {
        let response_mode = mode(params.0.response_mode);
        Json(finalize_edit(crate::app::sync_phase(params.0), response_mode))
    }

    #[tool(
        name = "pbx.sync",
        description = "Scan the project directory for files matching include globs with no reference and add them (groups created to mirror directories)."
    )]
    async fn sync(&self, params: Parameters<SyncRequest>) -> Json<EditOutput> {
        let response_mode = mode(params.0.response_mode);
        Json(finalize_edit(crate::app::sync(params.0), response_mode))
    }
}

#[tool_handler]
impl ServerHandler for PbxServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "pbxproj-mcp: safe edits of Xcode project.pbxproj files.\n\nQuickstart:\n  1) `pbx.validate` to see the project state and its sha256.\n  2) Edit with `pbx.add` / `pbx.remove` / `pbx.relocate` (dry_run=true previews a diff).\n  3) Pass expect_sha256 to refuse writes over concurrent changes.\n\nEnv defaults:\n  - PBXPROJ_REPO_ROOT=<path>\n  - PBXPROJ_PROJECT=<path to .xcodeproj>\n  - PBXPROJ_TARGET=<target name>\n  - PBXPROJ_BACKUP=1|0\n  - PBXPROJ_LOG=<tracing filter>\n"
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}
