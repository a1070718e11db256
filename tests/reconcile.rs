//! Reconciliation and reload behavior of the MCP server.

mod support;

use kubegate::mcp::server::McpServer;
use support::{config_with, write_kubeconfig};

#[tokio::test]
async fn reload_adds_helm_tools() {
    let kubeconfig = write_kubeconfig(&["context-1"], "context-1");
    let config = config_with(kubeconfig.path(), &["core", "config"]);

    let server = McpServer::new(config.clone()).await.unwrap();
    assert!(!server.enabled_tools().contains(&"helm_list".to_string()));

    let mut reloaded = config;
    reloaded.toolsets = vec!["core".to_string(), "config".to_string(), "helm".to_string()];
    server.reload_configuration(reloaded).await.unwrap();

    assert!(server.enabled_tools().contains(&"helm_list".to_string()));
    server.close().await;
}

#[tokio::test]
async fn invalid_reload_keeps_previous_catalog() {
    let kubeconfig = write_kubeconfig(&["context-1"], "context-1");
    let config = config_with(kubeconfig.path(), &["core"]);

    let server = McpServer::new(config.clone()).await.unwrap();
    let before = server.enabled_tools();
    assert!(!before.is_empty());

    let mut invalid = config.clone();
    invalid.list_output = "not-a-format".to_string();
    assert!(server.reload_configuration(invalid).await.is_err());
    assert_eq!(server.enabled_tools(), before);

    let mut unknown_toolset = config;
    unknown_toolset.toolsets = vec!["bogus".to_string()];
    assert!(server.reload_configuration(unknown_toolset).await.is_err());
    assert_eq!(server.enabled_tools(), before);

    server.close().await;
}

#[tokio::test]
async fn reloading_same_configuration_is_idempotent() {
    let kubeconfig = write_kubeconfig(&["context-1", "context-2"], "context-1");
    let config = config_with(kubeconfig.path(), &["core", "helm"]);

    let server = McpServer::new(config.clone()).await.unwrap();
    let first = {
        let mut names = server.enabled_tools();
        names.sort();
        names
    };

    server.reload_configuration(config.clone()).await.unwrap();
    server.reload_configuration(config).await.unwrap();

    let after = {
        let mut names = server.enabled_tools();
        names.sort();
        names
    };
    assert_eq!(first, after);
    server.close().await;
}

#[tokio::test]
async fn multi_target_tools_carry_required_context_parameter() {
    let kubeconfig = write_kubeconfig(&["context-1", "context-2"], "context-1");
    let config = config_with(kubeconfig.path(), &["core"]);

    let server = McpServer::new(config).await.unwrap();
    let catalog = server.catalog();

    assert!(!catalog.tools().is_empty());
    for server_tool in catalog.tools() {
        let schema = &server_tool.tool.input_schema;
        let context = &schema["properties"]["context"];
        assert_eq!(context["type"], "string", "tool {} lacks context param", server_tool.tool.name);
        assert_eq!(
            context["enum"],
            serde_json::json!(["context-1", "context-2"]),
            "tool {} has wrong target enum",
            server_tool.tool.name
        );
        let required = schema["required"].as_array().unwrap();
        assert!(
            required.iter().any(|v| v == "context"),
            "tool {} does not require context",
            server_tool.tool.name
        );
    }

    // The target-listing tool is advertised with more than one target
    assert!(server.enabled_tools().contains(&"contexts_list".to_string()));
    server.close().await;
}

#[tokio::test]
async fn single_target_tools_have_no_context_parameter() {
    let kubeconfig = write_kubeconfig(&["context-1"], "context-1");
    let config = config_with(kubeconfig.path(), &["core"]);

    let server = McpServer::new(config).await.unwrap();
    let catalog = server.catalog();

    for server_tool in catalog.tools() {
        let schema = &server_tool.tool.input_schema;
        assert!(
            schema["properties"].get("context").is_none(),
            "tool {} unexpectedly lists a context parameter",
            server_tool.tool.name
        );
    }

    // The target-listing tool is hidden with a single target
    assert!(!server.enabled_tools().contains(&"contexts_list".to_string()));
    server.close().await;
}

#[tokio::test]
async fn read_only_policy_restricts_catalog() {
    let kubeconfig = write_kubeconfig(&["context-1"], "context-1");
    let mut config = config_with(kubeconfig.path(), &["core", "helm"]);
    config.read_only = true;

    let server = McpServer::new(config).await.unwrap();
    let tools = server.enabled_tools();

    assert!(tools.contains(&"pods_list".to_string()));
    assert!(!tools.contains(&"pods_delete".to_string()));
    assert!(!tools.contains(&"helm_uninstall".to_string()));
    server.close().await;
}

#[tokio::test]
async fn disable_destructive_hides_destructive_tools_only() {
    let kubeconfig = write_kubeconfig(&["context-1"], "context-1");
    let mut config = config_with(kubeconfig.path(), &["core", "helm"]);
    config.disable_destructive = true;

    let server = McpServer::new(config).await.unwrap();
    let tools = server.enabled_tools();

    assert!(tools.contains(&"pods_list".to_string()));
    assert!(tools.contains(&"pods_get".to_string()));
    assert!(!tools.contains(&"pods_delete".to_string()));
    assert!(!tools.contains(&"helm_uninstall".to_string()));
    server.close().await;
}

#[tokio::test]
async fn catalog_change_emits_list_changed_notification() {
    let kubeconfig = write_kubeconfig(&["context-1"], "context-1");
    let config = config_with(kubeconfig.path(), &["core"]);

    let server = McpServer::new(config.clone()).await.unwrap();
    let mut notifications = server.subscribe_notifications();

    let mut reloaded = config;
    reloaded.toolsets = vec!["core".to_string(), "helm".to_string()];
    server.reload_configuration(reloaded).await.unwrap();

    let notification = notifications.try_recv().unwrap();
    assert_eq!(notification.method, "notifications/tools/list_changed");
    server.close().await;
}

#[tokio::test]
async fn stateless_mode_suppresses_notifications() {
    let kubeconfig = write_kubeconfig(&["context-1"], "context-1");
    let mut config = config_with(kubeconfig.path(), &["core"]);
    config.stateless = true;

    let server = McpServer::new(config.clone()).await.unwrap();
    let mut notifications = server.subscribe_notifications();

    let mut reloaded = config;
    reloaded.toolsets = vec!["core".to_string(), "helm".to_string()];
    server.reload_configuration(reloaded).await.unwrap();

    assert!(server.enabled_tools().contains(&"helm_list".to_string()));
    assert!(matches!(
        notifications.try_recv(),
        Err(tokio::sync::broadcast::error::TryRecvError::Empty)
    ));
    server.close().await;
}

#[tokio::test]
async fn declared_prompts_override_embedded_prompts() {
    let kubeconfig = write_kubeconfig(&["context-1"], "context-1");
    let mut config = config_with(kubeconfig.path(), &["core"]);
    config.prompts = vec![kubegate::config::PromptDefinition {
        name: "pods_triage".to_string(),
        title: String::new(),
        description: "custom triage".to_string(),
        arguments: vec![],
        messages: vec![kubegate::config::PromptMessageDefinition {
            role: "user".to_string(),
            content: "custom instructions".to_string(),
        }],
    }];

    let server = McpServer::new(config).await.unwrap();
    let catalog = server.catalog();

    let prompt = catalog.prompt("pods_triage").unwrap();
    assert_eq!(prompt.prompt.description.as_deref(), Some("custom triage"));
    server.close().await;
}
