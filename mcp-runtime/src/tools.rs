use argocd_mcp_core::{FilterCriteria, ResourceRef, filter_applications};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::McpServer;
use crate::client::{
    ClientError, DeleteOptions, ManagedResourceFilters, ResourceEventsQuery, SyncOptions,
};
use crate::registry::{ParamKind, ParamSpec, ToolAccess, ToolDefinition, ToolId};

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Invalid arguments for {tool}: {message}")]
    InvalidArguments { tool: &'static str, message: String },
    #[error(transparent)]
    Backend(#[from] ClientError),
    #[error("Failed to encode tool result: {0}")]
    Encode(#[from] serde_json::Error),
}

const APPLICATION_NAME: ParamSpec = ParamSpec::required(
    "applicationName",
    ParamKind::String,
    "Name of the Argo CD application",
);
const APPLICATION_NAMESPACE: ParamSpec = ParamSpec::optional(
    "applicationNamespace",
    ParamKind::String,
    "Namespace the Application resource lives in; defaults to the Argo CD control plane namespace",
);
const REQUIRED_APPLICATION_NAMESPACE: ParamSpec = ParamSpec::required(
    "applicationNamespace",
    ParamKind::String,
    "Namespace the Application resource lives in",
);

const RESOURCE_REF_FIELDS: &[ParamSpec] = &[
    ParamSpec::optional("uid", ParamKind::String, "Resource UID"),
    ParamSpec::required("kind", ParamKind::String, "Resource kind, e.g. Deployment"),
    ParamSpec::required("namespace", ParamKind::String, "Namespace of the resource"),
    ParamSpec::required("name", ParamKind::String, "Name of the resource"),
    ParamSpec::required("version", ParamKind::String, "API version, e.g. v1"),
    ParamSpec::optional(
        "group",
        ParamKind::String,
        "API group, e.g. apps; empty for the core group",
    ),
];
const RESOURCE_REF: ParamSpec = ParamSpec::required(
    "resourceRef",
    ParamKind::Object(RESOURCE_REF_FIELDS),
    "Managed resource, as listed in the application resource tree",
);

const LIST_APPLICATIONS_PARAMS: &[ParamSpec] = &[
    ParamSpec::optional(
        "search",
        ParamKind::String,
        "Case-insensitive substring of the application name",
    ),
    ParamSpec::optional("project", ParamKind::String, "Exact project name"),
    ParamSpec::optional(
        "appNamespace",
        ParamKind::String,
        "Exact namespace of the Application resource",
    ),
    ParamSpec::optional(
        "destinationNamespace",
        ParamKind::String,
        "Exact destination namespace",
    ),
    ParamSpec::optional(
        "destinationServer",
        ParamKind::String,
        "Exact destination cluster server URL",
    ),
    ParamSpec::optional(
        "destinationName",
        ParamKind::String,
        "Exact destination cluster name",
    ),
    ParamSpec::optional(
        "healthStatus",
        ParamKind::String,
        "Exact health status, e.g. Healthy, Degraded, Progressing, Missing",
    ),
    ParamSpec::optional(
        "syncStatus",
        ParamKind::String,
        "Exact sync status, e.g. Synced, OutOfSync",
    ),
    ParamSpec::optional(
        "label",
        ParamKind::String,
        "Label selector: 'key' requires the label to be present, 'key=value' requires that exact value",
    ),
];

const APPLICATION_LOOKUP_PARAMS: &[ParamSpec] = &[APPLICATION_NAME, APPLICATION_NAMESPACE];

const MANAGED_RESOURCES_PARAMS: &[ParamSpec] = &[
    APPLICATION_NAME,
    ParamSpec::optional("kind", ParamKind::String, "Only resources of this kind"),
    ParamSpec::optional("namespace", ParamKind::String, "Only resources in this namespace"),
    ParamSpec::optional("name", ParamKind::String, "Only resources with this name"),
    ParamSpec::optional("version", ParamKind::String, "Only resources of this API version"),
    ParamSpec::optional("group", ParamKind::String, "Only resources of this API group"),
    ParamSpec::optional(
        "appNamespace",
        ParamKind::String,
        "Namespace the Application resource lives in",
    ),
    ParamSpec::optional("project", ParamKind::String, "Project of the application"),
];

const WORKLOAD_LOGS_PARAMS: &[ParamSpec] = &[
    APPLICATION_NAME,
    REQUIRED_APPLICATION_NAMESPACE,
    RESOURCE_REF,
    ParamSpec::optional("container", ParamKind::String, "Container name for multi-container pods"),
];

const POD_LOGS_PARAMS: &[ParamSpec] = &[
    APPLICATION_NAME,
    ParamSpec::required("podName", ParamKind::String, "Name of the pod"),
    APPLICATION_NAMESPACE,
    ParamSpec::optional("container", ParamKind::String, "Container name for multi-container pods"),
];

const RESOURCE_EVENTS_PARAMS: &[ParamSpec] = &[
    APPLICATION_NAME,
    REQUIRED_APPLICATION_NAMESPACE,
    ParamSpec::required("resourceUID", ParamKind::String, "UID of the resource"),
    ParamSpec::required("resourceNamespace", ParamKind::String, "Namespace of the resource"),
    ParamSpec::required("resourceName", ParamKind::String, "Name of the resource"),
];

const RESOURCE_ACTIONS_PARAMS: &[ParamSpec] =
    &[APPLICATION_NAME, REQUIRED_APPLICATION_NAMESPACE, RESOURCE_REF];

const RUN_RESOURCE_ACTION_PARAMS: &[ParamSpec] = &[
    APPLICATION_NAME,
    REQUIRED_APPLICATION_NAMESPACE,
    RESOURCE_REF,
    ParamSpec::required(
        "action",
        ParamKind::String,
        "Action name as returned by get_resource_actions, e.g. restart",
    ),
];

const CREATE_APPLICATION_PARAMS: &[ParamSpec] = &[ParamSpec::required(
    "application",
    ParamKind::AnyObject,
    "Full Application manifest (metadata, spec)",
)];

const UPDATE_APPLICATION_PARAMS: &[ParamSpec] = &[
    APPLICATION_NAME,
    ParamSpec::required(
        "application",
        ParamKind::AnyObject,
        "Full replacement Application manifest",
    ),
];

const DELETE_APPLICATION_PARAMS: &[ParamSpec] = &[
    APPLICATION_NAME,
    APPLICATION_NAMESPACE,
    ParamSpec::optional(
        "cascade",
        ParamKind::Boolean,
        "Also delete the application's resources (backend default: true)",
    ),
    ParamSpec::optional(
        "propagationPolicy",
        ParamKind::String,
        "Deletion propagation policy: foreground or background",
    ),
];

const SYNC_APPLICATION_PARAMS: &[ParamSpec] = &[
    APPLICATION_NAME,
    APPLICATION_NAMESPACE,
    ParamSpec::optional("dryRun", ParamKind::Boolean, "Preview the sync without applying it"),
    ParamSpec::optional("prune", ParamKind::Boolean, "Delete resources no longer in git"),
    ParamSpec::optional("revision", ParamKind::String, "Revision to sync to"),
    ParamSpec::optional(
        "syncOptions",
        ParamKind::StringList,
        "Sync options, e.g. CreateNamespace=true",
    ),
];

/// Every tool the server knows. Mutations are only registered in read-write mode.
pub static TOOL_CATALOG: &[ToolDefinition] = &[
    ToolDefinition {
        id: ToolId::ListApplications,
        description: "List Argo CD applications. Optional filters narrow the result; with no filters the full backend listing is returned.",
        access: ToolAccess::Query,
        destructive: false,
        params: LIST_APPLICATIONS_PARAMS,
    },
    ToolDefinition {
        id: ToolId::GetApplication,
        description: "Get one application by name.",
        access: ToolAccess::Query,
        destructive: false,
        params: APPLICATION_LOOKUP_PARAMS,
    },
    ToolDefinition {
        id: ToolId::GetApplicationResourceTree,
        description: "Get the live resource tree of an application.",
        access: ToolAccess::Query,
        destructive: false,
        params: APPLICATION_LOOKUP_PARAMS,
    },
    ToolDefinition {
        id: ToolId::GetApplicationManagedResources,
        description: "Get the managed resources of an application, with their desired and live state.",
        access: ToolAccess::Query,
        destructive: false,
        params: MANAGED_RESOURCES_PARAMS,
    },
    ToolDefinition {
        id: ToolId::GetApplicationWorkloadLogs,
        description: "Get the most recent log lines of an application workload (Deployment, StatefulSet, Pod, ...).",
        access: ToolAccess::Query,
        destructive: false,
        params: WORKLOAD_LOGS_PARAMS,
    },
    ToolDefinition {
        id: ToolId::GetPodLogs,
        description: "Get the most recent log lines of one pod of an application.",
        access: ToolAccess::Query,
        destructive: false,
        params: POD_LOGS_PARAMS,
    },
    ToolDefinition {
        id: ToolId::GetApplicationEvents,
        description: "Get Kubernetes events of an application.",
        access: ToolAccess::Query,
        destructive: false,
        params: APPLICATION_LOOKUP_PARAMS,
    },
    ToolDefinition {
        id: ToolId::GetResourceEvents,
        description: "Get Kubernetes events of one resource managed by an application.",
        access: ToolAccess::Query,
        destructive: false,
        params: RESOURCE_EVENTS_PARAMS,
    },
    ToolDefinition {
        id: ToolId::GetResourceActions,
        description: "List the actions available on a resource managed by an application.",
        access: ToolAccess::Query,
        destructive: false,
        params: RESOURCE_ACTIONS_PARAMS,
    },
    ToolDefinition {
        id: ToolId::CreateApplication,
        description: "Create an application from a full manifest.",
        access: ToolAccess::Mutation,
        destructive: false,
        params: CREATE_APPLICATION_PARAMS,
    },
    ToolDefinition {
        id: ToolId::UpdateApplication,
        description: "Replace an application with a full manifest.",
        access: ToolAccess::Mutation,
        destructive: true,
        params: UPDATE_APPLICATION_PARAMS,
    },
    ToolDefinition {
        id: ToolId::DeleteApplication,
        description: "Delete an application.",
        access: ToolAccess::Mutation,
        destructive: true,
        params: DELETE_APPLICATION_PARAMS,
    },
    ToolDefinition {
        id: ToolId::SyncApplication,
        description: "Sync an application to its target revision.",
        access: ToolAccess::Mutation,
        destructive: false,
        params: SYNC_APPLICATION_PARAMS,
    },
    ToolDefinition {
        id: ToolId::RunResourceAction,
        description: "Run an action (e.g. restart) on a resource managed by an application.",
        access: ToolAccess::Mutation,
        destructive: true,
        params: RUN_RESOURCE_ACTION_PARAMS,
    },
];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApplicationLookupArgs {
    application_name: String,
    #[serde(default)]
    application_namespace: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManagedResourcesArgs {
    application_name: String,
    #[serde(flatten)]
    filters: ManagedResourceFilters,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WorkloadLogsArgs {
    application_name: String,
    application_namespace: String,
    resource_ref: ResourceRef,
    #[serde(default)]
    container: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PodLogsArgs {
    application_name: String,
    pod_name: String,
    #[serde(default)]
    application_namespace: Option<String>,
    #[serde(default)]
    container: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourceEventsArgs {
    application_name: String,
    application_namespace: String,
    #[serde(rename = "resourceUID")]
    resource_uid: String,
    resource_namespace: String,
    resource_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourceActionArgs {
    application_name: String,
    application_namespace: String,
    resource_ref: ResourceRef,
    #[serde(default)]
    action: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreateApplicationArgs {
    application: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateApplicationArgs {
    application_name: String,
    application: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeleteApplicationArgs {
    application_name: String,
    #[serde(default)]
    application_namespace: Option<String>,
    #[serde(default)]
    cascade: Option<bool>,
    #[serde(default)]
    propagation_policy: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SyncApplicationArgs {
    application_name: String,
    #[serde(default)]
    application_namespace: Option<String>,
    #[serde(default)]
    dry_run: Option<bool>,
    #[serde(default)]
    prune: Option<bool>,
    #[serde(default)]
    revision: Option<String>,
    #[serde(default)]
    sync_options: Option<Vec<String>>,
}

fn parse_args<T: DeserializeOwned>(
    tool: ToolId,
    args: Map<String, Value>,
) -> Result<T, ToolError> {
    serde_json::from_value(Value::Object(args)).map_err(|e| ToolError::InvalidArguments {
        tool: tool.name(),
        message: e.to_string(),
    })
}

impl McpServer {
    /// Runs one tool against the backend. Arguments have already been checked
    /// against the tool's parameter list.
    pub(crate) async fn execute_tool(
        &self,
        tool: ToolId,
        args: Map<String, Value>,
    ) -> Result<Value, ToolError> {
        let client = &self.client;
        match tool {
            ToolId::ListApplications => {
                let criteria: FilterCriteria = parse_args(tool, args)?;
                let listing = client.list_applications().await?;
                Ok(filter_applications(listing, &criteria))
            }
            ToolId::GetApplication => {
                let args: ApplicationLookupArgs = parse_args(tool, args)?;
                Ok(client
                    .get_application(&args.application_name, args.application_namespace.as_deref())
                    .await?)
            }
            ToolId::GetApplicationResourceTree => {
                let args: ApplicationLookupArgs = parse_args(tool, args)?;
                Ok(client
                    .get_resource_tree(
                        &args.application_name,
                        args.application_namespace.as_deref(),
                    )
                    .await?)
            }
            ToolId::GetApplicationManagedResources => {
                let args: ManagedResourcesArgs = parse_args(tool, args)?;
                Ok(client
                    .get_managed_resources(&args.application_name, &args.filters)
                    .await?)
            }
            ToolId::GetApplicationWorkloadLogs => {
                let args: WorkloadLogsArgs = parse_args(tool, args)?;
                let entries = client
                    .get_workload_logs(
                        &args.application_name,
                        &args.application_namespace,
                        &args.resource_ref,
                        args.container.as_deref(),
                    )
                    .await?;
                Ok(serde_json::to_value(entries)?)
            }
            ToolId::GetPodLogs => {
                let args: PodLogsArgs = parse_args(tool, args)?;
                let entries = client
                    .get_pod_logs(
                        &args.application_name,
                        &args.pod_name,
                        args.application_namespace.as_deref(),
                        args.container.as_deref(),
                    )
                    .await?;
                Ok(serde_json::to_value(entries)?)
            }
            ToolId::GetApplicationEvents => {
                let args: ApplicationLookupArgs = parse_args(tool, args)?;
                Ok(client
                    .get_application_events(
                        &args.application_name,
                        args.application_namespace.as_deref(),
                    )
                    .await?)
            }
            ToolId::GetResourceEvents => {
                let args: ResourceEventsArgs = parse_args(tool, args)?;
                let lookup = ResourceEventsQuery {
                    app_namespace: args.application_namespace,
                    resource_uid: args.resource_uid,
                    resource_namespace: args.resource_namespace,
                    resource_name: args.resource_name,
                };
                Ok(client
                    .get_resource_events(&args.application_name, &lookup)
                    .await?)
            }
            ToolId::GetResourceActions => {
                let args: ResourceActionArgs = parse_args(tool, args)?;
                Ok(client
                    .get_resource_actions(
                        &args.application_name,
                        &args.application_namespace,
                        &args.resource_ref,
                    )
                    .await?)
            }
            ToolId::CreateApplication => {
                let args: CreateApplicationArgs = parse_args(tool, args)?;
                Ok(client.create_application(&args.application).await?)
            }
            ToolId::UpdateApplication => {
                let args: UpdateApplicationArgs = parse_args(tool, args)?;
                Ok(client
                    .update_application(&args.application_name, &args.application)
                    .await?)
            }
            ToolId::DeleteApplication => {
                let args: DeleteApplicationArgs = parse_args(tool, args)?;
                let options = DeleteOptions {
                    app_namespace: args.application_namespace,
                    cascade: args.cascade,
                    propagation_policy: args.propagation_policy,
                };
                Ok(client
                    .delete_application(&args.application_name, &options)
                    .await?)
            }
            ToolId::SyncApplication => {
                let args: SyncApplicationArgs = parse_args(tool, args)?;
                let options = SyncOptions {
                    app_namespace: args.application_namespace,
                    dry_run: args.dry_run,
                    prune: args.prune,
                    revision: args.revision,
                    sync_options: args.sync_options,
                };
                Ok(client
                    .sync_application(&args.application_name, &options)
                    .await?)
            }
            ToolId::RunResourceAction => {
                let args: ResourceActionArgs = parse_args(tool, args)?;
                let action = args.action.ok_or(ToolError::InvalidArguments {
                    tool: tool.name(),
                    message: "missing required field 'action'".to_string(),
                })?;
                Ok(client
                    .run_resource_action(
                        &args.application_name,
                        &args.application_namespace,
                        &args.resource_ref,
                        &action,
                    )
                    .await?)
            }
        }
    }
}
