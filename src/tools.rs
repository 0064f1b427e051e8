//! Tools exposed by the Ax tool server
//!
//! Tools are stateless singletons holding shared handles; the registry is
//! built once at startup and passed by reference to the server.

mod benchmark;
mod study;

pub use benchmark::{EvaluateBenchmarkTool, ListAvailableFunctionsTool};
pub use study::{CreateStudyTool, NextTrialTool, ProvideBestParametersTool};

use crate::benchmarks::BenchmarkRegistry;
use crate::mcp::ToolDefinition;
use crate::optimizer::StudyStore;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Result from tool execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub success: bool,
    pub output: String,
}

impl ToolOutput {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            output: message.into(),
        }
    }
}

/// Decode tool input, or produce the failure result to return
pub(crate) fn parse_input<T: DeserializeOwned>(input: Value) -> Result<T, ToolOutput> {
    serde_json::from_value(input).map_err(|e| ToolOutput::error(format!("Invalid input: {e}")))
}

/// Trait for tools the server can execute
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name
    fn name(&self) -> &str;

    /// Tool description for the model
    fn description(&self) -> String;

    /// JSON schema for tool input
    fn input_schema(&self) -> Value;

    async fn run(&self, input: Value) -> ToolOutput;
}

/// Collection of tools served to clients
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new(tools: Vec<Arc<dyn Tool>>) -> Self {
        Self { tools }
    }

    /// The optimization tool set
    pub fn standard(benchmarks: Arc<BenchmarkRegistry>, store: Arc<StudyStore>) -> Self {
        Self::new(vec![
            Arc::new(CreateStudyTool::new(benchmarks.clone(), store.clone())),
            Arc::new(NextTrialTool::new(benchmarks.clone(), store.clone())),
            Arc::new(ListAvailableFunctionsTool::new(benchmarks.clone())),
            Arc::new(EvaluateBenchmarkTool::new(benchmarks)),
            Arc::new(ProvideBestParametersTool::new(store)),
        ])
    }

    /// Get all tool definitions, in registration order
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: Some(t.description()),
                input_schema: t.input_schema(),
            })
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.iter().any(|t| t.name() == name)
    }

    /// Execute a tool by name; `None` when no such tool exists
    pub async fn execute(&self, name: &str, input: Value) -> Option<ToolOutput> {
        for tool in &self.tools {
            if tool.name() == name {
                return Some(tool.run(input).await);
            }
        }
        None
    }
}
