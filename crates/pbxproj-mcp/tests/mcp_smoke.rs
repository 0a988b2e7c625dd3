use pbxproj_mcp::{
    api::{EditOutput, TreeOutput, ValidateOutput},
    server::PbxServer,
};
use rmcp::{ServiceExt, model::CallToolRequestParams};

const FIXTURE: &str = concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/tests/fixtures/App.xcodeproj/project.pbxproj"
);

fn call(name: &'static str, args: serde_json::Value) -> CallToolRequestParams {
    CallToolRequestParams {
        meta: None,
        name: name.into(),
        arguments: args.as_object().cloned(),
        task: None,
    }
}

#[tokio::test]
async fn mcp_smoke_list_tools_validate_and_edit() {
    let repo = tempfile::tempdir().expect("temp repo");
    std::fs::create_dir_all(repo.path().join("App.xcodeproj")).expect("mkdir");
    std::fs::copy(FIXTURE, repo.path().join("App.xcodeproj/project.pbxproj"))
        .expect("copy fixture");
    let repo_root = repo.path().to_string_lossy().to_string();

    let (client_io, server_io) = tokio::io::duplex(64 * 1024);
    let server_task = tokio::spawn(async move { PbxServer::new().serve(server_io).await });
    let mut client = ().serve(client_io).await.expect("serve client");
    let mut server = server_task
        .await
        .expect("join server task")
        .expect("serve server");

    let tools = client
        .list_tools(Default::default())
        .await
        .expect("list tools");
    for name in [
        "pbx.validate",
        "pbx.tree",
        "pbx.add",
        "pbx.remove",
        "pbx.move",
        "pbx.dedupe",
        "pbx.repair",
        "pbx.rewrite_paths",
        "pbx.relocate",
        "pbx.sync_phase",
        "pbx.sync",
    ] {
        assert!(tools.tools.iter().any(|t| t.name == name), "missing tool {name}");
    }

    let validated: ValidateOutput = client
        .call_tool(call("pbx.validate", serde_json::json!({ "repo_root": repo_root })))
        .await
        .expect("call pbx.validate")
        .into_typed()
        .expect("typed pbx.validate");
    assert!(validated.ok, "error={:?}", validated.error);
    let sha = validated.sha256.expect("sha256");

    let tree: TreeOutput = client
        .call_tool(call("pbx.tree", serde_json::json!({ "repo_root": repo_root })))
        .await
        .expect("call pbx.tree")
        .into_typed()
        .expect("typed pbx.tree");
    assert!(tree.ok);
    assert!(tree.rendered.expect("rendered").contains("AppTests.swift"));

    let moved: EditOutput = client
        .call_tool(call(
            "pbx.move",
            serde_json::json!({
                "repo_root": repo_root,
                "paths": ["App/ContentView.swift"],
                "to_target": "AppTests",
                "backup": false,
                "expect_sha256": sha,
            }),
        ))
        .await
        .expect("call pbx.move")
        .into_typed()
        .expect("typed pbx.move");
    assert!(moved.ok, "error={:?}", moved.error);
    assert!(moved.commit.expect("commit").written);
    assert!(moved.payload_meta.is_some(), "compact mode by default");

    let rejected: serde_json::Value = client
        .call_tool(call(
            "pbx.add",
            serde_json::json!({ "repo_root": repo_root, "paths": [], "bogus": true }),
        ))
        .await
        .map(|r| serde_json::to_value(r).expect("to json"))
        .unwrap_or(serde_json::Value::Null);
    assert_ne!(
        rejected.get("ok"),
        Some(&serde_json::Value::Bool(true)),
        "unknown fields must be refused"
    );

    client.close().await.ok();
    server.close().await.ok();
}
