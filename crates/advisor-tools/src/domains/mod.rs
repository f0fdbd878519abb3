//! Built-in tools for the four analysis domains.

pub mod fundamental;
pub mod risk;
pub mod sentiment;
pub mod technical;

use std::sync::Arc;

use advisor_models::request::normalize_ticker;
use advisor_models::Domain;

use crate::error::{RegistryError, ToolError};
use crate::provider::DataProvider;
use crate::registry::ToolRegistry;

/// Register every built-in tool, each bound to `provider`.
pub fn register_builtin_tools(
    registry: &mut ToolRegistry,
    provider: Arc<dyn DataProvider>,
) -> Result<(), RegistryError> {
    for tool in fundamental::tools(&provider) {
        registry.register(Domain::Fundamental, tool)?;
    }
    for tool in technical::tools(&provider) {
        registry.register(Domain::Technical, tool)?;
    }
    for tool in sentiment::tools(&provider) {
        registry.register(Domain::Sentiment, tool)?;
    }
    for tool in risk::tools(&provider) {
        registry.register(Domain::Risk, tool)?;
    }
    Ok(())
}

/// A registry holding exactly the built-in tools.
pub fn builtin_registry(provider: Arc<dyn DataProvider>) -> Result<ToolRegistry, RegistryError> {
    let mut registry = ToolRegistry::new();
    register_builtin_tools(&mut registry, provider)?;
    Ok(registry)
}

/// JSON schema for an object taking `ticker` plus `extra` properties.
pub(crate) fn ticker_schema(example: &str, extra: serde_json::Value) -> serde_json::Value {
    let mut properties = serde_json::json!({
        "ticker": {
            "type": "string",
            "description": format!("Stock ticker symbol (e.g., \"{example}\")"),
        }
    });
    if let (Some(props), serde_json::Value::Object(extra)) = (properties.as_object_mut(), extra) {
        props.extend(extra);
    }
    serde_json::json!({
        "type": "object",
        "properties": properties,
        "required": ["ticker"],
    })
}

pub(crate) fn ticker_param(params: &serde_json::Value) -> Result<String, ToolError> {
    let raw = params
        .get("ticker")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ToolError::InvalidParams("missing string parameter 'ticker'".to_string()))?;
    normalize_ticker(raw).map_err(|e| ToolError::InvalidParams(e.to_string()))
}

pub(crate) fn optional_str<'a>(
    params: &'a serde_json::Value,
    key: &str,
    default: &'a str,
) -> Result<&'a str, ToolError> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(default),
        Some(v) => v
            .as_str()
            .ok_or_else(|| ToolError::InvalidParams(format!("'{key}' must be a string"))),
    }
}

pub(crate) fn optional_f64(
    params: &serde_json::Value,
    key: &str,
    default: f64,
) -> Result<f64, ToolError> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(default),
        Some(v) => v
            .as_f64()
            .ok_or_else(|| ToolError::InvalidParams(format!("'{key}' must be a number"))),
    }
}

pub(crate) fn optional_u64(
    params: &serde_json::Value,
    key: &str,
    default: u64,
) -> Result<u64, ToolError> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(default),
        Some(v) => v.as_u64().ok_or_else(|| {
            ToolError::InvalidParams(format!("'{key}' must be a non-negative integer"))
        }),
    }
}
