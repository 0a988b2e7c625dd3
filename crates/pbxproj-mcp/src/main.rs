use pbxproj_mcp::{
    app,
    response::{finalize_edit, finalize_tree, finalize_validate},
    server::PbxServer,
};
use rmcp::ServiceExt;
use serde::Serialize;
mod cli;
mod mcp_stdio;

fn print_version() {
    println!("{}", env!("CARGO_PKG_VERSION"));
}

fn emit<T: Serialize>(out: &T, ok: bool) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(out)?);
    if !ok {
        std::process::exit(1);
    }
    Ok(())
}

fn run(command: cli::Command) -> Result<(), Box<dyn std::error::Error>> {
    let mode = command.response_mode();
    let edit = match command {
        cli::Command::Validate(req, mode) => {
            let out = finalize_validate(app::validate(req), mode);
            return emit(&out, out.ok);
        }
        cli::Command::Tree { req, json } => {
            let out = finalize_tree(app::tree(req));
            if json || !out.ok {
                return emit(&out, out.ok);
            }
            print!("{}", out.rendered.as_deref().unwrap_or_default());
            return Ok(());
        }
        cli::Command::Add(req) => app::add(req),
        cli::Command::Remove(req) => app::remove(req),
        cli::Command::Move(req) => app::move_files(req),
        cli::Command::Dedupe(req) => app::dedupe(req),
        cli::Command::Repair(req) => app::repair(req),
        cli::Command::RewritePaths(req) => app::rewrite_paths(req),
        cli::Command::Relocate(req) => app::relocate(req),
        cli::Command::SyncPhase(req) => app::sync_phase(req),
        cli::Command::Sync(req) => app::sync(req),
    };
    let out = finalize_edit(edit, mode);
    emit(&out, out.ok)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pbxproj_mcp::logging::init();
    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(String::as_str);

    match command {
        Some("version") | Some("--version") | Some("-V") => {
            print_version();
            return Ok(());
        }
        Some("help") | Some("--help") | Some("-h") => {
            cli::print_help();
            return Ok(());
        }
        Some(name) if cli::is_command(name) => {
            let parsed = match cli::parse_command(name, &args[2..]) {
                Ok(v) => v,
                Err(e) => {
                    eprintln!("pbxproj-mcp: {e}");
                    std::process::exit(2);
                }
            };
            return run(parsed);
        }
        Some("mcp") | Some("--mcp") | Some("stdio") | Some("--stdio") | None => {}
        Some(other) => {
            eprintln!(
                "pbxproj-mcp: unknown command `{other}`; see `pbxproj-mcp help`, or no args to start the MCP server"
            );
            std::process::exit(2);
        }
    }

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "serving MCP over stdio");
    let service = PbxServer::new()
        .serve(mcp_stdio::HybridStdioTransport::new())
        .await?;
    service.waiting().await?;
    Ok(())
}
