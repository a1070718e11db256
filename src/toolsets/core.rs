//! Core toolset: pods, generic resources, events, namespaces, and the
//! target-listing tool.

use k8s_openapi::api::core::v1::{Event, Namespace, Pod};
use kube::api::{Api, DeleteParams, ListParams, LogParams};
use kube::core::{ApiResource, DynamicObject, GroupVersionKind};
use serde_json::json;

use crate::errors::{KubegateError, Result};
use crate::mcp::catalog::{ServerPrompt, ServerTool, ToolHandlerParams};
use crate::mcp::protocol::{Prompt, PromptArgument};
use crate::toolsets::{
    destructive_annotations, handler, read_only_annotations, tool, Toolset, CONTEXTS_LIST_TOOL,
};

pub struct CoreToolset;

impl Toolset for CoreToolset {
    fn name(&self) -> &'static str {
        "core"
    }

    fn description(&self) -> &'static str {
        "Pods, generic resources, events, and namespaces"
    }

    fn tools(&self) -> Vec<ServerTool> {
        vec![
            tool(
                "pods_list",
                "List pods in a namespace, or across all namespaces when none is given",
                json!({
                    "type": "object",
                    "properties": {
                        "namespace": {"type": "string", "description": "Namespace to list pods from (all namespaces when omitted)"},
                        "label_selector": {"type": "string", "description": "Label selector to filter pods (e.g. app=web)"}
                    }
                }),
                read_only_annotations("Pods: List"),
                handler(pods_list),
            ),
            tool(
                "pods_get",
                "Get a pod by name",
                json!({
                    "type": "object",
                    "properties": {
                        "namespace": {"type": "string", "description": "Namespace of the pod (default when omitted)"},
                        "name": {"type": "string", "description": "Name of the pod"}
                    },
                    "required": ["name"]
                }),
                read_only_annotations("Pods: Get"),
                handler(pods_get),
            ),
            tool(
                "pods_log",
                "Get the logs of a pod",
                json!({
                    "type": "object",
                    "properties": {
                        "namespace": {"type": "string", "description": "Namespace of the pod"},
                        "name": {"type": "string", "description": "Name of the pod"},
                        "container": {"type": "string", "description": "Container to read logs from (first container when omitted)"},
                        "tail": {"type": "integer", "description": "Number of trailing lines to return"}
                    },
                    "required": ["name"]
                }),
                read_only_annotations("Pods: Log"),
                handler(pods_log),
            ),
            tool(
                "pods_delete",
                "Delete a pod by name",
                json!({
                    "type": "object",
                    "properties": {
                        "namespace": {"type": "string", "description": "Namespace of the pod"},
                        "name": {"type": "string", "description": "Name of the pod"}
                    },
                    "required": ["name"]
                }),
                destructive_annotations("Pods: Delete", true),
                handler(pods_delete),
            ),
            tool(
                "resources_list",
                "List resources of an arbitrary API type",
                json!({
                    "type": "object",
                    "properties": {
                        "apiVersion": {"type": "string", "description": "API version of the resources (e.g. apps/v1)"},
                        "kind": {"type": "string", "description": "Kind of the resources (e.g. Deployment)"},
                        "namespace": {"type": "string", "description": "Namespace to list from (all namespaces when omitted)"},
                        "label_selector": {"type": "string", "description": "Label selector to filter resources"}
                    },
                    "required": ["apiVersion", "kind"]
                }),
                read_only_annotations("Resources: List"),
                handler(resources_list),
            ),
            tool(
                "resources_get",
                "Get a resource of an arbitrary API type by name",
                json!({
                    "type": "object",
                    "properties": {
                        "apiVersion": {"type": "string", "description": "API version of the resource"},
                        "kind": {"type": "string", "description": "Kind of the resource"},
                        "namespace": {"type": "string", "description": "Namespace of the resource (cluster scope when omitted)"},
                        "name": {"type": "string", "description": "Name of the resource"}
                    },
                    "required": ["apiVersion", "kind", "name"]
                }),
                read_only_annotations("Resources: Get"),
                handler(resources_get),
            ),
            tool(
                "events_list",
                "List events in a namespace, or across all namespaces when none is given",
                json!({
                    "type": "object",
                    "properties": {
                        "namespace": {"type": "string", "description": "Namespace to list events from (all namespaces when omitted)"}
                    }
                }),
                read_only_annotations("Events: List"),
                handler(events_list),
            ),
            tool(
                "namespaces_list",
                "List namespaces in the cluster",
                json!({"type": "object", "properties": {}}),
                read_only_annotations("Namespaces: List"),
                handler(namespaces_list),
            ),
            tool(
                CONTEXTS_LIST_TOOL,
                "List the configured Kubernetes contexts available as targets",
                json!({"type": "object", "properties": {}}),
                read_only_annotations("Contexts: List"),
                handler(contexts_list),
            ),
        ]
    }

    fn prompts(&self) -> Vec<ServerPrompt> {
        vec![ServerPrompt {
            prompt: Prompt {
                name: "pods_triage".to_string(),
                title: Some("Pods: Triage".to_string()),
                description: Some(
                    "Inspect failing pods in a namespace and summarize probable causes"
                        .to_string(),
                ),
                arguments: Some(vec![PromptArgument {
                    name: "namespace".to_string(),
                    description: Some("Namespace to triage".to_string()),
                    required: Some(true),
                }]),
            },
            messages: vec![(
                "user".to_string(),
                "List the pods in namespace {{namespace}}, identify any that are not \
                 Running or Ready, fetch their recent logs and events, and summarize the \
                 most likely root cause for each failing pod."
                    .to_string(),
            )],
        }]
    }
}

fn render_list<T: serde::Serialize>(params: &ToolHandlerParams, items: &[T]) -> Result<String> {
    let values: Vec<serde_json::Value> =
        items.iter().map(serde_json::to_value).collect::<std::result::Result<_, _>>()?;
    params.list_output.render(&values)
}

fn render_object<T: serde::Serialize>(object: &T) -> Result<String> {
    serde_yaml::to_string(object)
        .map_err(|e| KubegateError::internal(format!("YAML rendering failed: {}", e)))
}

fn list_params(args: &crate::mcp::catalog::ToolCallArgs) -> ListParams {
    match args.get_optional("label_selector") {
        Some(selector) => ListParams::default().labels(selector),
        None => ListParams::default(),
    }
}

async fn pods_list(params: ToolHandlerParams) -> Result<String> {
    let api: Api<Pod> = match params.args.get_optional("namespace") {
        Some(namespace) => Api::namespaced(params.client.clone(), namespace),
        None => Api::all(params.client.clone()),
    };
    let pods = api.list(&list_params(&params.args)).await?;
    render_list(&params, &pods.items)
}

async fn pods_get(params: ToolHandlerParams) -> Result<String> {
    let name = params.args.require("name").map_err(invalid_args)?;
    let namespace = params.args.get_string("namespace", "default");
    let api: Api<Pod> = Api::namespaced(params.client.clone(), &namespace);
    let pod = api.get(&name).await?;
    render_object(&pod)
}

async fn pods_log(params: ToolHandlerParams) -> Result<String> {
    let name = params.args.require("name").map_err(invalid_args)?;
    let namespace = params.args.get_string("namespace", "default");
    let api: Api<Pod> = Api::namespaced(params.client.clone(), &namespace);

    let log_params = LogParams {
        container: params.args.get_optional("container").map(str::to_string),
        tail_lines: params.args.get_i64("tail"),
        ..Default::default()
    };
    Ok(api.logs(&name, &log_params).await?)
}

async fn pods_delete(params: ToolHandlerParams) -> Result<String> {
    let name = params.args.require("name").map_err(invalid_args)?;
    let namespace = params.args.get_string("namespace", "default");
    let api: Api<Pod> = Api::namespaced(params.client.clone(), &namespace);
    api.delete(&name, &DeleteParams::default()).await?;
    Ok(format!("Pod {}/{} deleted", namespace, name))
}

fn gvk_from_args(args: &crate::mcp::catalog::ToolCallArgs) -> Result<GroupVersionKind> {
    let api_version = args.require("apiVersion").map_err(invalid_args)?;
    let kind = args.require("kind").map_err(invalid_args)?;

    let (group, version) = match api_version.split_once('/') {
        Some((group, version)) => (group.to_string(), version.to_string()),
        None => (String::new(), api_version),
    };
    Ok(GroupVersionKind { group, version, kind })
}

pub(crate) fn invalid_args(e: crate::mcp::error::McpError) -> KubegateError {
    KubegateError::validation(e.to_string())
}

async fn resources_list(params: ToolHandlerParams) -> Result<String> {
    let gvk = gvk_from_args(&params.args)?;
    let resource = ApiResource::from_gvk(&gvk);

    let api: Api<DynamicObject> = match params.args.get_optional("namespace") {
        Some(namespace) => Api::namespaced_with(params.client.clone(), namespace, &resource),
        None => Api::all_with(params.client.clone(), &resource),
    };
    let objects = api.list(&list_params(&params.args)).await?;
    render_list(&params, &objects.items)
}

async fn resources_get(params: ToolHandlerParams) -> Result<String> {
    let gvk = gvk_from_args(&params.args)?;
    let resource = ApiResource::from_gvk(&gvk);
    let name = params.args.require("name").map_err(invalid_args)?;

    let api: Api<DynamicObject> = match params.args.get_optional("namespace") {
        Some(namespace) => Api::namespaced_with(params.client.clone(), namespace, &resource),
        None => Api::all_with(params.client.clone(), &resource),
    };
    let object = api.get(&name).await?;
    render_object(&object)
}

async fn events_list(params: ToolHandlerParams) -> Result<String> {
    let api: Api<Event> = match params.args.get_optional("namespace") {
        Some(namespace) => Api::namespaced(params.client.clone(), namespace),
        None => Api::all(params.client.clone()),
    };
    let events = api.list(&ListParams::default()).await?;
    render_list(&params, &events.items)
}

async fn namespaces_list(params: ToolHandlerParams) -> Result<String> {
    let api: Api<Namespace> = Api::all(params.client.clone());
    let namespaces = api.list(&ListParams::default()).await?;
    render_list(&params, &namespaces.items)
}

async fn contexts_list(params: ToolHandlerParams) -> Result<String> {
    let listing: Vec<serde_json::Value> = params
        .targets
        .iter()
        .map(|target| {
            json!({
                "name": target,
                "default": *target == params.default_target,
            })
        })
        .collect();
    serde_json::to_string_pretty(&listing).map_err(KubegateError::from)
}
