use pbxproj_mcp::api::{
    AddRequest, MaintenanceRequest, MoveRequest, PhaseArg, RelocateRequest, Relocation,
    RemoveRequest, ResponseMode, RewritePathsRequest, RewriteRule, SyncPhaseRequest, SyncRequest,
    TreeRequest, ValidateRequest,
};

pub(crate) fn print_help() {
    println!(
        "Usage:\n  pbxproj-mcp help\n  pbxproj-mcp version\n  pbxproj-mcp validate [--check-disk] [--project <path>] [--repo-root <path>] [--full]\n  pbxproj-mcp tree [--check-disk] [--json] [--project <path>] [--repo-root <path>]\n  pbxproj-mcp add <file>... [--target <name>] [--group <dir>] [--phase <kind>] [--create-groups]\n  pbxproj-mcp remove <file-or-id>...\n  pbxproj-mcp move <file>... [--from <target>] [--to <target>] [--phase <kind>]\n  pbxproj-mcp dedupe\n  pbxproj-mcp repair\n  pbxproj-mcp rewrite-paths [--strip-prefix <p>] [--replace-prefix <from> <to>] [--regex <pattern> <replacement>]...\n  pbxproj-mcp relocate <old>=<new>...\n  pbxproj-mcp sync-phase [--target <name>] [--group <dir>] [--phase <kind>] [--rebuild]\n  pbxproj-mcp sync [--target <name>] [--include <glob>]... [--exclude <glob>]...\n  pbxproj-mcp mcp\n\nCommon edit flags:\n  --project <path> --repo-root <path> --dry-run --no-backup --expect-sha256 <hex> --full\n\nPhase kinds: auto|none|sources|resources|frameworks|headers\n\nNotes:\n  - No args => start MCP server over stdio.\n  - Paths are relative to the directory holding the .xcodeproj.\n  - rewrite-paths without rules uses [[rewrite]] from pbxproj.toml.\n  - Defaults via env:\n      PBXPROJ_REPO_ROOT=<path>\n      PBXPROJ_PROJECT=<path>\n      PBXPROJ_TARGET=<name>\n      PBXPROJ_BACKUP=0|1\n      PBXPROJ_LOG=<filter>\n      PBXPROJ_COMPACT_TOP_N=<n>\n\nExamples:\n  pbxproj-mcp validate --check-disk\n  pbxproj-mcp add App/Views/Profile.swift --create-groups\n  pbxproj-mcp move App/Helpers.swift --from App --to AppTests\n  pbxproj-mcp rewrite-paths --strip-prefix era/ --dry-run\n  pbxproj-mcp relocate App/Old=App/Legacy\n"
    );
}

/// A parsed subcommand, ready for `pbxproj_mcp::app`.
#[derive(Debug)]
pub(crate) enum Command {
    Validate(ValidateRequest, ResponseMode),
    Tree { req: TreeRequest, json: bool },
    Add(AddRequest),
    Remove(RemoveRequest),
    Move(MoveRequest),
    Dedupe(MaintenanceRequest),
    Repair(MaintenanceRequest),
    RewritePaths(RewritePathsRequest),
    Relocate(RelocateRequest),
    SyncPhase(SyncPhaseRequest),
    Sync(SyncRequest),
}

impl Command {
    pub(crate) fn response_mode(&self) -> ResponseMode {
        let mode = match self {
            Command::Validate(_, mode) => return *mode,
            Command::Tree { .. } => None,
            Command::Add(r) => r.response_mode,
            Command::Remove(r) => r.response_mode,
            Command::Move(r) => r.response_mode,
            Command::Dedupe(r) | Command::Repair(r) => r.response_mode,
            Command::RewritePaths(r) => r.response_mode,
            Command::Relocate(r) => r.response_mode,
            Command::SyncPhase(r) => r.response_mode,
            Command::Sync(r) => r.response_mode,
        };
        mode.unwrap_or_default()
    }
}

pub(crate) fn is_command(name: &str) -> bool {
    matches!(
        name,
        "validate"
            | "tree"
            | "add"
            | "remove"
            | "move"
            | "dedupe"
            | "repair"
            | "rewrite-paths"
            | "relocate"
            | "sync-phase"
            | "sync"
    )
}

#[derive(Debug, Default)]
struct Raw {
    positionals: Vec<String>,
    repo_root: Option<String>,
    project: Option<String>,
    dry_run: Option<bool>,
    backup: Option<bool>,
    expect_sha256: Option<String>,
    full: bool,
    check_disk: Option<bool>,
    json: bool,
    target: Option<String>,
    group: Option<String>,
    phase: Option<PhaseArg>,
    create_groups: Option<bool>,
    rebuild: Option<bool>,
    from: Option<String>,
    to: Option<String>,
    rules: Vec<RewriteRule>,
    include: Vec<String>,
    exclude: Vec<String>,
}

impl Raw {
    fn response_mode(&self) -> Option<ResponseMode> {
        self.full.then_some(ResponseMode::Full)
    }
}

const COMMON: &[&str] = &["--repo-root", "--project", "--full"];
const WRITE: &[&str] = &["--dry-run", "--no-backup", "--backup", "--expect-sha256"];

fn allowed_flags(cmd: &str) -> Vec<&'static str> {
    let specific: &[&str] = match cmd {
        "validate" => &["--check-disk"],
        "tree" => &["--check-disk", "--json"],
        "add" => &["--target", "--group", "--phase", "--create-groups"],
        "move" => &["--from", "--to", "--phase"],
        "rewrite-paths" => &["--strip-prefix", "--replace-prefix", "--regex"],
        "sync-phase" => &["--target", "--group", "--phase", "--rebuild"],
        "sync" => &["--target", "--include", "--exclude"],
        _ => &[],
    };
    let mut out: Vec<&str> = COMMON.iter().chain(specific).copied().collect();
    if !matches!(cmd, "validate" | "tree") {
        out.extend(WRITE);
    }
    out
}

fn value(args: &[String], i: usize, flag: &str) -> Result<String, String> {
    let v = args
        .get(i)
        .ok_or_else(|| format!("{flag} requires a value"))?;
    if v.starts_with("--") {
        return Err(format!("{flag} requires a value"));
    }
    Ok(v.clone())
}

fn parse_phase(raw: &str) -> Result<PhaseArg, String> {
    PhaseArg::parse(raw).ok_or_else(|| {
        format!("--phase must be one of auto|none|sources|resources|frameworks|headers (got {raw})")
    })
}

fn parse_raw(cmd: &str, args: &[String]) -> Result<Raw, String> {
    let allowed = allowed_flags(cmd);
    let mut raw = Raw::default();
    let mut i = 0usize;
    while i < args.len() {
        let a = args[i].as_str();
        if !a.starts_with("--") {
            raw.positionals.push(a.to_string());
            i += 1;
            continue;
        }
        if !allowed.iter().any(|f| *f == a) {
            return Err(format!("unknown flag `{a}` for `{cmd}`"));
        }
        let mut step = 1;
        match a {
            "--repo-root" => {
                raw.repo_root = Some(value(args, i + 1, a)?);
                step = 2;
            }
            "--project" => {
                raw.project = Some(value(args, i + 1, a)?);
                step = 2;
            }
            "--full" => raw.full = true,
            "--dry-run" => raw.dry_run = Some(true),
            "--no-backup" => raw.backup = Some(false),
            "--backup" => raw.backup = Some(true),
            "--expect-sha256" => {
                raw.expect_sha256 = Some(value(args, i + 1, a)?);
                step = 2;
            }
            "--check-disk" => raw.check_disk = Some(true),
            "--json" => raw.json = true,
            "--target" => {
                raw.target = Some(value(args, i + 1, a)?);
                step = 2;
            }
            "--group" => {
                raw.group = Some(value(args, i + 1, a)?);
                step = 2;
            }
            "--phase" => {
                raw.phase = Some(parse_phase(&value(args, i + 1, a)?)?);
                step = 2;
            }
            "--create-groups" => raw.create_groups = Some(true),
            "--rebuild" => raw.rebuild = Some(true),
            "--from" => {
                raw.from = Some(value(args, i + 1, a)?);
                step = 2;
            }
            "--to" => {
                raw.to = Some(value(args, i + 1, a)?);
                step = 2;
            }
            "--strip-prefix" => {
                raw.rules
                    .push(RewriteRule::StripPrefix(value(args, i + 1, a)?));
                step = 2;
            }
            "--replace-prefix" => {
                raw.rules.push(RewriteRule::ReplacePrefix {
                    from: value(args, i + 1, a)?,
                    to: args
                        .get(i + 2)
                        .cloned()
                        .ok_or_else(|| format!("{a} requires <from> <to>"))?,
                });
                step = 3;
            }
            "--regex" => {
                raw.rules.push(RewriteRule::Regex {
                    pattern: value(args, i + 1, a)?,
                    replacement: args
                        .get(i + 2)
                        .cloned()
                        .ok_or_else(|| format!("{a} requires <pattern> <replacement>"))?,
                });
                step = 3;
            }
            "--include" => {
                raw.include.push(value(args, i + 1, a)?);
                step = 2;
            }
            "--exclude" => {
                raw.exclude.push(value(args, i + 1, a)?);
                step = 2;
            }
            _ => return Err(format!("unknown flag `{a}` for `{cmd}`")),
        }
        i += step;
    }
    Ok(raw)
}

fn no_positionals(cmd: &str, raw: &Raw) -> Result<(), String> {
    match raw.positionals.first() {
        Some(extra) => Err(format!("`{cmd}` takes no arguments (got `{extra}`)")),
        None => Ok(()),
    }
}

fn some_positionals(cmd: &str, raw: &Raw, what: &str) -> Result<(), String> {
    if raw.positionals.is_empty() {
        return Err(format!("`{cmd}` requires at least one {what}"));
    }
    Ok(())
}

fn parse_relocation(arg: &str) -> Result<Relocation, String> {
    let (from, to) = arg
        .split_once('=')
        .ok_or_else(|| format!("relocate expects <old>=<new> (got `{arg}`)"))?;
    if from.trim().is_empty() {
        return Err(format!("relocate expects a non-empty <old> (got `{arg}`)"));
    }
    Ok(Relocation {
        from: from.to_string(),
        to: to.to_string(),
    })
}

pub(crate) fn parse_command(cmd: &str, args: &[String]) -> Result<Command, String> {
    let raw = parse_raw(cmd, args)?;
    let mode = raw.response_mode();
    let command = match cmd {
        "validate" => {
            no_positionals(cmd, &raw)?;
            Command::Validate(
                ValidateRequest {
                    repo_root: raw.repo_root,
                    project: raw.project,
                    check_disk: raw.check_disk,
                    response_mode: mode,
                },
                mode.unwrap_or_default(),
            )
        }
        "tree" => {
            no_positionals(cmd, &raw)?;
            Command::Tree {
                req: TreeRequest {
                    repo_root: raw.repo_root,
                    project: raw.project,
                    check_disk: raw.check_disk,
                },
                json: raw.json,
            }
        }
        "add" => {
            some_positionals(cmd, &raw, "file")?;
            Command::Add(AddRequest {
                repo_root: raw.repo_root,
                project: raw.project,
                paths: raw.positionals,
                target: raw.target,
                group: raw.group,
                phase: raw.phase,
                create_groups: raw.create_groups,
                dry_run: raw.dry_run,
                backup: raw.backup,
                expect_sha256: raw.expect_sha256,
                response_mode: mode,
            })
        }
        "remove" => {
            some_positionals(cmd, &raw, "file or object id")?;
            Command::Remove(RemoveRequest {
                repo_root: raw.repo_root,
                project: raw.project,
                paths: raw.positionals,
                dry_run: raw.dry_run,
                backup: raw.backup,
                expect_sha256: raw.expect_sha256,
                response_mode: mode,
            })
        }
        "move" => {
            some_positionals(cmd, &raw, "file")?;
            if raw.from.is_none() && raw.to.is_none() {
                return Err("`move` requires --from and/or --to".to_string());
            }
            Command::Move(MoveRequest {
                repo_root: raw.repo_root,
                project: raw.project,
                paths: raw.positionals,
                from_target: raw.from,
                to_target: raw.to,
                phase: raw.phase,
                dry_run: raw.dry_run,
                backup: raw.backup,
                expect_sha256: raw.expect_sha256,
                response_mode: mode,
            })
        }
        "dedupe" | "repair" => {
            no_positionals(cmd, &raw)?;
            let req = MaintenanceRequest {
                repo_root: raw.repo_root,
                project: raw.project,
                dry_run: raw.dry_run,
                backup: raw.backup,
                expect_sha256: raw.expect_sha256,
                response_mode: mode,
            };
            if cmd == "dedupe" {
                Command::Dedupe(req)
            } else {
                Command::Repair(req)
            }
        }
        "rewrite-paths" => {
            no_positionals(cmd, &raw)?;
            Command::RewritePaths(RewritePathsRequest {
                repo_root: raw.repo_root,
                project: raw.project,
                rules: (!raw.rules.is_empty()).then_some(raw.rules),
                dry_run: raw.dry_run,
                backup: raw.backup,
                expect_sha256: raw.expect_sha256,
                response_mode: mode,
            })
        }
        "relocate" => {
            some_positionals(cmd, &raw, "<old>=<new> pair")?;
            let moves = raw
                .positionals
                .iter()
                .map(|p| parse_relocation(p))
                .collect::<Result<Vec<_>, _>>()?;
            Command::Relocate(RelocateRequest {
                repo_root: raw.repo_root,
                project: raw.project,
                moves,
                dry_run: raw.dry_run,
                backup: raw.backup,
                expect_sha256: raw.expect_sha256,
                response_mode: mode,
            })
        }
        "sync-phase" => {
            no_positionals(cmd, &raw)?;
            Command::SyncPhase(SyncPhaseRequest {
                repo_root: raw.repo_root,
                project: raw.project,
                target: raw.target,
                group: raw.group,
                phase: raw.phase,
                rebuild: raw.rebuild,
                dry_run: raw.dry_run,
                backup: raw.backup,
                expect_sha256: raw.expect_sha256,
                response_mode: mode,
            })
        }
        "sync" => {
            no_positionals(cmd, &raw)?;
            Command::Sync(SyncRequest {
                repo_root: raw.repo_root,
                project: raw.project,
                target: raw.target,
                include_globs: (!raw.include.is_empty()).then_some(raw.include),
                exclude_globs: (!raw.exclude.is_empty()).then_some(raw.exclude),
                dry_run: raw.dry_run,
                backup: raw.backup,
                expect_sha256: raw.expect_sha256,
                response_mode: mode,
            })
        }
        other => return Err(format!("unknown command `{other}`")),
    };
    Ok(command)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn add_collects_paths_and_flags() {
        let cmd = parse_command(
            "add",
            &args(&[
                "App/A.swift",
                "App/B.swift",
                "--target",
                "App",
                "--phase",
                "resources",
                "--create-groups",
                "--dry-run",
            ]),
        )
        .unwrap();
        let Command::Add(req) = cmd else {
            panic!("expected add");
        };
        assert_eq!(req.paths, vec!["App/A.swift", "App/B.swift"]);
        assert_eq!(req.target.as_deref(), Some("App"));
        assert_eq!(req.phase, Some(PhaseArg::Resources));
        assert_eq!(req.create_groups, Some(true));
        assert_eq!(req.dry_run, Some(true));
    }

    #[test]
    fn rewrite_rules_keep_command_line_order() {
        let cmd = parse_command(
            "rewrite-paths",
            &args(&[
                "--replace-prefix",
                "era/",
                "",
                "--regex",
                "^(.*)View$",
                "${1}Screen",
                "--strip-prefix",
                "Legacy/",
            ]),
        )
        .unwrap();
        let Command::RewritePaths(req) = cmd else {
            panic!("expected rewrite-paths");
        };
        let rules = req.rules.unwrap();
        assert_eq!(rules.len(), 3);
        assert_eq!(
            rules[0],
            RewriteRule::ReplacePrefix {
                from: "era/".into(),
                to: String::new()
            }
        );
        assert_eq!(rules[2], RewriteRule::StripPrefix("Legacy/".into()));
    }

    #[test]
    fn usage_errors_are_reported() {
        assert_eq!(
            parse_command("add", &args(&["--target"])).unwrap_err(),
            "--target requires a value"
        );
        assert!(
            parse_command("validate", &args(&["--dry-run"]))
                .unwrap_err()
                .contains("unknown flag `--dry-run`")
        );
        assert!(parse_command("add", &args(&[])).is_err());
        assert!(parse_command("move", &args(&["A.swift"])).is_err());
        assert!(parse_command("relocate", &args(&["nowhere"])).is_err());
        assert!(
            parse_command("add", &args(&["A.swift", "--phase", "copy"]))
                .unwrap_err()
                .contains("--phase must be one of")
        );
    }

    #[test]
    fn relocate_pairs_split_on_equals() {
        let cmd = parse_command("relocate", &args(&["App/Old=App/New", "--full"])).unwrap();
        assert_eq!(cmd.response_mode(), ResponseMode::Full);
        let Command::Relocate(req) = cmd else {
            panic!("expected relocate");
        };
        assert_eq!(req.moves[0].from, "App/Old");
        assert_eq!(req.moves[0].to, "App/New");
    }
}
