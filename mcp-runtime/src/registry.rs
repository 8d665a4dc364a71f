use std::collections::BTreeMap;

use serde_json::{Map, Value, json};

/// Environment variable consulted once at startup for the read-only gate.
pub const READ_ONLY_ENV: &str = "MCP_READ_ONLY";

/// Which tool catalog the server exposes. Decided once, before the registry
/// is built, and never changed for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    ReadOnly,
    ReadWrite,
}

impl AccessMode {
    /// `"true"` in any casing, surrounded by any whitespace, means read-only.
    /// Anything else, including an unset flag, means read-write.
    pub fn from_flag(raw: Option<&str>) -> Self {
        match raw {
            Some(flag) if flag.trim().eq_ignore_ascii_case("true") => AccessMode::ReadOnly,
            _ => AccessMode::ReadWrite,
        }
    }

    pub fn from_env() -> Self {
        Self::from_flag(std::env::var(READ_ONLY_ENV).ok().as_deref())
    }

    pub fn is_read_only(self) -> bool {
        self == AccessMode::ReadOnly
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AccessMode::ReadOnly => "read_only",
            AccessMode::ReadWrite => "read_write",
        }
    }

    fn permits(self, access: ToolAccess) -> bool {
        match access {
            ToolAccess::Query => true,
            ToolAccess::Mutation => self == AccessMode::ReadWrite,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolAccess {
    Query,
    Mutation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ToolId {
    ListApplications,
    GetApplication,
    GetApplicationResourceTree,
    GetApplicationManagedResources,
    GetApplicationWorkloadLogs,
    GetPodLogs,
    GetApplicationEvents,
    GetResourceEvents,
    GetResourceActions,
    CreateApplication,
    UpdateApplication,
    DeleteApplication,
    SyncApplication,
    RunResourceAction,
}

impl ToolId {
    pub fn name(self) -> &'static str {
        match self {
            ToolId::ListApplications => "list_applications",
            ToolId::GetApplication => "get_application",
            ToolId::GetApplicationResourceTree => "get_application_resource_tree",
            ToolId::GetApplicationManagedResources => "get_application_managed_resources",
            ToolId::GetApplicationWorkloadLogs => "get_application_workload_logs",
            ToolId::GetPodLogs => "get_pod_logs",
            ToolId::GetApplicationEvents => "get_application_events",
            ToolId::GetResourceEvents => "get_resource_events",
            ToolId::GetResourceActions => "get_resource_actions",
            ToolId::CreateApplication => "create_application",
            ToolId::UpdateApplication => "update_application",
            ToolId::DeleteApplication => "delete_application",
            ToolId::SyncApplication => "sync_application",
            ToolId::RunResourceAction => "run_resource_action",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum ParamKind {
    String,
    Boolean,
    StringList,
    /// Free-form JSON object passed through to the backend.
    AnyObject,
    /// Object with its own declared fields, validated recursively.
    Object(&'static [ParamSpec]),
}

#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
    pub description: &'static str,
}

impl ParamSpec {
    pub const fn required(name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            required: true,
            description,
        }
    }

    pub const fn optional(name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            required: false,
            description,
        }
    }
}

#[derive(Debug)]
pub struct ToolDefinition {
    pub id: ToolId,
    pub description: &'static str,
    pub access: ToolAccess,
    /// Set for tools that remove or overwrite backend state.
    pub destructive: bool,
    pub params: &'static [ParamSpec],
}

impl ToolDefinition {
    pub fn name(&self) -> &'static str {
        self.id.name()
    }

    pub fn input_schema(&self) -> Value {
        object_schema(self.params)
    }

    /// Checks arguments against the declared parameters. The error text names
    /// the offending field.
    pub fn validate(&self, args: &Map<String, Value>) -> Result<(), String> {
        validate_object(self.params, args, "")
    }

    pub fn to_value(&self) -> Value {
        json!({
            "name": self.name(),
            "description": self.description,
            "inputSchema": self.input_schema(),
            "annotations": {
                "readOnlyHint": self.access == ToolAccess::Query,
                "destructiveHint": self.destructive,
            }
        })
    }
}

/// Tools exposed by one server instance, built once from the static catalog.
#[derive(Debug)]
pub struct ToolRegistry {
    tools: BTreeMap<&'static str, &'static ToolDefinition>,
    order: Vec<&'static ToolDefinition>,
}

impl ToolRegistry {
    pub fn new(catalog: &'static [ToolDefinition], mode: AccessMode) -> Self {
        let mut tools = BTreeMap::new();
        let mut order = Vec::new();
        for tool in catalog.iter().filter(|tool| mode.permits(tool.access)) {
            if tools.insert(tool.name(), tool).is_none() {
                order.push(tool);
            }
        }
        Self { tools, order }
    }

    pub fn get(&self, name: &str) -> Option<&'static ToolDefinition> {
        self.tools.get(name).copied()
    }

    /// Registered tools in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = &'static ToolDefinition> + '_ {
        self.order.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

fn param_schema(param: &ParamSpec) -> Value {
    let mut schema = match param.kind {
        ParamKind::String => json!({ "type": "string" }),
        ParamKind::Boolean => json!({ "type": "boolean" }),
        ParamKind::StringList => json!({ "type": "array", "items": { "type": "string" } }),
        ParamKind::AnyObject => json!({ "type": "object" }),
        ParamKind::Object(fields) => object_schema(fields),
    };
    schema["description"] = json!(param.description);
    schema
}

fn object_schema(params: &[ParamSpec]) -> Value {
    let properties: Map<String, Value> = params
        .iter()
        .map(|param| (param.name.to_string(), param_schema(param)))
        .collect();
    let required: Vec<&str> = params
        .iter()
        .filter(|param| param.required)
        .map(|param| param.name)
        .collect();
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false
    })
}

fn validate_object(
    params: &[ParamSpec],
    args: &Map<String, Value>,
    prefix: &str,
) -> Result<(), String> {
    if let Some(unknown) = args
        .keys()
        .find(|key| !params.iter().any(|param| param.name == key.as_str()))
    {
        return Err(format!("unexpected field '{prefix}{unknown}'"));
    }

    for param in params {
        let field = format!("{prefix}{}", param.name);
        let value = match args.get(param.name) {
            None | Some(Value::Null) => {
                if param.required {
                    return Err(format!("missing required field '{field}'"));
                }
                continue;
            }
            Some(value) => value,
        };
        match param.kind {
            ParamKind::String if !value.is_string() => {
                return Err(format!("'{field}' must be a string"));
            }
            ParamKind::Boolean if !value.is_boolean() => {
                return Err(format!("'{field}' must be a boolean"));
            }
            ParamKind::StringList
                if !value
                    .as_array()
                    .is_some_and(|items| items.iter().all(Value::is_string)) =>
            {
                return Err(format!("'{field}' must be an array of strings"));
            }
            ParamKind::AnyObject if !value.is_object() => {
                return Err(format!("'{field}' must be an object"));
            }
            ParamKind::Object(fields) => {
                let nested = value
                    .as_object()
                    .ok_or_else(|| format!("'{field}' must be an object"))?;
                validate_object(fields, nested, &format!("{field}."))?;
            }
            _ => {}
        }
    }
    Ok(())
}
