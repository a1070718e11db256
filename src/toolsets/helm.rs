//! Helm toolset.
//!
//! Helm v3 stores release state in `sh.helm.release.v1.<name>.v<revision>`
//! secrets labeled `owner=helm`; listing and uninstalling releases are
//! secret operations, no helm binary required.

use k8s_openapi::api::core::v1::Secret;
use kube::api::{Api, DeleteParams, ListParams};
use serde_json::json;

use crate::errors::Result;
use crate::mcp::catalog::{ServerTool, ToolHandlerParams};
use crate::toolsets::core::invalid_args;
use crate::toolsets::{destructive_annotations, handler, read_only_annotations, tool, Toolset};

const HELM_OWNER_SELECTOR: &str = "owner=helm";

pub struct HelmToolset;

impl Toolset for HelmToolset {
    fn name(&self) -> &'static str {
        "helm"
    }

    fn description(&self) -> &'static str {
        "List and uninstall Helm releases"
    }

    fn tools(&self) -> Vec<ServerTool> {
        vec![
            tool(
                "helm_list",
                "List Helm releases in a namespace, or across all namespaces when none is given",
                json!({
                    "type": "object",
                    "properties": {
                        "namespace": {"type": "string", "description": "Namespace to list releases from (all namespaces when omitted)"},
                        "all": {"type": "boolean", "description": "Include superseded and failed releases, not just deployed ones"}
                    }
                }),
                read_only_annotations("Helm: List"),
                handler(helm_list),
            ),
            tool(
                "helm_uninstall",
                "Uninstall a Helm release by deleting its release records",
                json!({
                    "type": "object",
                    "properties": {
                        "namespace": {"type": "string", "description": "Namespace of the release"},
                        "name": {"type": "string", "description": "Name of the release"}
                    },
                    "required": ["name"]
                }),
                destructive_annotations("Helm: Uninstall", true),
                handler(helm_uninstall),
            ),
        ]
    }
}

/// A release entry derived from a Helm storage secret.
#[derive(Debug, serde::Serialize, PartialEq)]
struct HelmRelease {
    name: String,
    namespace: String,
    revision: String,
    status: String,
}

fn release_from_secret(secret: &Secret) -> Option<HelmRelease> {
    let metadata = &secret.metadata;
    let labels = metadata.labels.as_ref()?;

    let name = labels.get("name")?.clone();
    let status = labels.get("status").cloned().unwrap_or_else(|| "unknown".to_string());
    let revision = labels
        .get("version")
        .cloned()
        .or_else(|| {
            // Fallback: sh.helm.release.v1.<name>.v<revision>
            metadata
                .name
                .as_ref()?
                .rsplit_once(".v")
                .map(|(_, revision)| revision.to_string())
        })
        .unwrap_or_default();

    Some(HelmRelease {
        name,
        namespace: metadata.namespace.clone().unwrap_or_default(),
        revision,
        status,
    })
}

async fn helm_list(params: ToolHandlerParams) -> Result<String> {
    let api: Api<Secret> = match params.args.get_optional("namespace") {
        Some(namespace) => Api::namespaced(params.client.clone(), namespace),
        None => Api::all(params.client.clone()),
    };

    let include_all = params.args.get_bool("all", false);
    let secrets = api.list(&ListParams::default().labels(HELM_OWNER_SELECTOR)).await?;

    let mut releases: Vec<HelmRelease> = secrets
        .items
        .iter()
        .filter_map(release_from_secret)
        .filter(|release| include_all || release.status == "deployed")
        .collect();
    releases.sort_by(|a, b| (&a.namespace, &a.name).cmp(&(&b.namespace, &b.name)));

    let values: Vec<serde_json::Value> =
        releases.iter().map(serde_json::to_value).collect::<std::result::Result<_, _>>()?;
    serde_json::to_string_pretty(&values).map_err(Into::into)
}

async fn helm_uninstall(params: ToolHandlerParams) -> Result<String> {
    let name = params.args.require("name").map_err(invalid_args)?;
    let namespace = params.args.get_string("namespace", "default");

    let api: Api<Secret> = Api::namespaced(params.client.clone(), &namespace);
    let selector = format!("{},name={}", HELM_OWNER_SELECTOR, name);
    let secrets = api.list(&ListParams::default().labels(&selector)).await?;

    if secrets.items.is_empty() {
        return Ok(format!("Release {} not found in namespace {}", name, namespace));
    }

    let mut deleted = 0;
    for secret in &secrets.items {
        if let Some(secret_name) = secret.metadata.name.as_deref() {
            api.delete(secret_name, &DeleteParams::default()).await?;
            deleted += 1;
        }
    }

    Ok(format!(
        "Release {} uninstalled from namespace {} ({} revision records removed)",
        name, namespace, deleted
    ))
}
