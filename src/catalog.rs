//! Tool catalog translation
//!
//! Converts tool definitions discovered on the tool server into the
//! function-calling schema model backends expect. Runs once per session,
//! right after discovery; the catalog is fixed for the session's lifetime.

use crate::mcp::ToolDefinition;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// A callable function as presented to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSpec {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments, taken verbatim from the tool's input schema
    pub parameters: Value,
}

impl FunctionSpec {
    /// Wire shape shared by the Ollama and `OpenAI`-compatible chat APIs
    pub fn to_tool_json(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters,
            }
        })
    }

    /// Structural inverse of the translation
    pub fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.clone(),
            description: Some(self.description.clone()),
            input_schema: self.parameters.clone(),
        }
    }
}

impl From<&ToolDefinition> for FunctionSpec {
    fn from(tool: &ToolDefinition) -> Self {
        Self {
            name: tool.name.clone(),
            description: tool.description.clone().unwrap_or_default(),
            parameters: tool.input_schema.clone(),
        }
    }
}

/// The translated tool set for one session, in server order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolCatalog {
    specs: Vec<FunctionSpec>,
}

impl ToolCatalog {
    pub fn specs(&self) -> &[FunctionSpec] {
        &self.specs
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.specs.iter().map(|s| s.name.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.specs.iter().any(|s| s.name == name)
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

impl From<Vec<FunctionSpec>> for ToolCatalog {
    fn from(specs: Vec<FunctionSpec>) -> Self {
        Self { specs }
    }
}

/// Translate a discovered tool list into a catalog
pub fn translate(tools: &[ToolDefinition]) -> ToolCatalog {
    ToolCatalog {
        specs: tools.iter().map(FunctionSpec::from).collect(),
    }
}
