//! End-to-end kubeconfig change propagation: rewriting the watched file
//! updates the provider's targets and the advertised catalog.

mod support;

use std::time::Duration;

use kubegate::mcp::server::McpServer;
use support::{config_with, rewrite_kubeconfig, write_kubeconfig};

async fn wait_for<F: Fn() -> bool>(deadline: Duration, condition: F) -> bool {
    let started = std::time::Instant::now();
    while started.elapsed() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    condition()
}

#[tokio::test]
async fn context_switch_updates_default_target_and_catalog() {
    // Shorten the debounce so the test completes quickly; the env var is
    // read at watcher construction time.
    std::env::set_var("KUBECONFIG_DEBOUNCE_WINDOW_MS", "100");

    let kubeconfig = write_kubeconfig(&["context-1", "context-2"], "context-1");
    let config = config_with(kubeconfig.path(), &["core"]);

    let server = McpServer::new(config).await.unwrap();
    assert_eq!(server.provider().default_target(), "context-1");

    rewrite_kubeconfig(
        kubeconfig.path(),
        &["context-1", "context-2", "context-3"],
        "context-2",
    );

    let switched = wait_for(Duration::from_secs(5), || {
        server.provider().default_target() == "context-2"
    })
    .await;
    assert!(switched, "provider did not pick up the rewritten kubeconfig");

    let catalog_updated = wait_for(Duration::from_secs(5), || {
        let catalog = server.catalog();
        catalog.tools().iter().all(|tool| {
            tool.tool.input_schema["properties"]["context"]["enum"]
                .as_array()
                .is_some_and(|targets| {
                    targets.iter().any(|t| t == "context-3")
                })
        })
    })
    .await;
    assert!(catalog_updated, "catalog target enum was not reconciled");

    server.close().await;
    std::env::remove_var("KUBECONFIG_DEBOUNCE_WINDOW_MS");
}
