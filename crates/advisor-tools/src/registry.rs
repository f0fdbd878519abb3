use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use advisor_models::{Domain, OperationSpec, ToolResult};
use async_trait::async_trait;

use crate::error::{RegistryError, ToolError};

/// The executable half of a tool. Implementations must be side-effect free
/// from the caller's point of view; caching behind this boundary is fine.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn invoke(&self, params: &serde_json::Value) -> Result<ToolResult, ToolError>;
}

/// A named, schema-described operation owned by one domain.
#[derive(Clone)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    /// JSON schema of the accepted parameters.
    pub input_schema: serde_json::Value,
    handler: Arc<dyn ToolHandler>,
}

impl ToolDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: serde_json::Value,
        handler: Arc<dyn ToolHandler>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            handler,
        }
    }

    pub async fn invoke(&self, params: &serde_json::Value) -> Result<ToolResult, ToolError> {
        self.handler.invoke(params).await
    }

    /// The backend-facing description of this tool.
    pub fn operation(&self) -> OperationSpec {
        OperationSpec {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self.input_schema.clone(),
        }
    }
}

impl fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("input_schema", &self.input_schema)
            .finish_non_exhaustive()
    }
}

impl PartialEq for ToolDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.description == other.description
            && self.input_schema == other.input_schema
            && Arc::ptr_eq(&self.handler, &other.handler)
    }
}

/// Tools grouped by domain, in registration order.
///
/// Populated once at startup through `&mut self`, then shared read-only as
/// `Arc<ToolRegistry>`; concurrent readers need no locking.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: HashMap<Domain, Vec<Arc<ToolDescriptor>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under `domain`. Names are unique per domain.
    pub fn register(
        &mut self,
        domain: Domain,
        descriptor: ToolDescriptor,
    ) -> Result<Arc<ToolDescriptor>, RegistryError> {
        let entries = self.tools.entry(domain).or_default();
        if entries.iter().any(|t| t.name == descriptor.name) {
            return Err(RegistryError::DuplicateTool {
                domain,
                name: descriptor.name,
            });
        }
        let descriptor = Arc::new(descriptor);
        entries.push(Arc::clone(&descriptor));
        Ok(descriptor)
    }

    /// Resolve a tool by name inside `domain` only.
    pub fn lookup(&self, domain: Domain, name: &str) -> Result<Arc<ToolDescriptor>, RegistryError> {
        self.list_for(domain)
            .iter()
            .find(|t| t.name == name)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownTool {
                domain,
                name: name.to_string(),
            })
    }

    pub fn list_for(&self, domain: Domain) -> &[Arc<ToolDescriptor>] {
        self.tools.get(&domain).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn operations_for(&self, domain: Domain) -> Vec<OperationSpec> {
        self.list_for(domain).iter().map(|t| t.operation()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
