//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use kubegate::StaticConfig;

/// Write a minimal kubeconfig with the given contexts and current
/// context, all pointing at an unreachable local endpoint.
pub fn write_kubeconfig(contexts: &[&str], current: &str) -> NamedTempFile {
    write_kubeconfig_for_server("https://127.0.0.1:6443", contexts, current)
}

/// Write a minimal kubeconfig whose cluster points at the given server
/// (e.g. a mock API server).
pub fn write_kubeconfig_for_server(
    server: &str,
    contexts: &[&str],
    current: &str,
) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write_kubeconfig_to(file.as_file_mut(), server, contexts, current);
    file
}

/// Rewrite an existing kubeconfig file in place.
pub fn rewrite_kubeconfig(path: &Path, contexts: &[&str], current: &str) {
    let mut contents = Vec::new();
    write_kubeconfig_to(&mut contents, "https://127.0.0.1:6443", contexts, current);
    std::fs::write(path, contents).unwrap();
}

fn write_kubeconfig_to<W: Write>(writer: &mut W, server: &str, contexts: &[&str], current: &str) {
    let mut contents = String::from("apiVersion: v1\nkind: Config\nclusters:\n");
    contents.push_str(&format!(
        "- name: fake-cluster\n  cluster:\n    server: {}\n",
        server
    ));
    contents.push_str("users:\n- name: fake-user\n  user:\n    token: fake-token\n");
    contents.push_str("contexts:\n");
    for context in contexts {
        contents.push_str(&format!(
            "- name: {}\n  context:\n    cluster: fake-cluster\n    user: fake-user\n",
            context
        ));
    }
    contents.push_str(&format!("current-context: {}\n", current));
    writer.write_all(contents.as_bytes()).unwrap();
}

/// A configuration pinned to the given kubeconfig with the given
/// toolsets.
pub fn config_with(kubeconfig: &Path, toolsets: &[&str]) -> StaticConfig {
    StaticConfig {
        kubeconfig: kubeconfig.display().to_string(),
        toolsets: toolsets.iter().map(|s| s.to_string()).collect(),
        ..Default::default()
    }
}
