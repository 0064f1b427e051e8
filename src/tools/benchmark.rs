//! Direct benchmark tools, usable outside any study

use super::{parse_input, Tool, ToolOutput};
use crate::benchmarks::BenchmarkRegistry;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;

pub struct ListAvailableFunctionsTool {
    benchmarks: Arc<BenchmarkRegistry>,
}

impl ListAvailableFunctionsTool {
    pub fn new(benchmarks: Arc<BenchmarkRegistry>) -> Self {
        Self { benchmarks }
    }
}

#[async_trait]
impl Tool for ListAvailableFunctionsTool {
    fn name(&self) -> &'static str {
        "list_available_functions"
    }

    fn description(&self) -> String {
        "Returns a list of available optimization benchmark functions and their descriptions/recommended bounds.".to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn run(&self, _input: Value) -> ToolOutput {
        let listing: Map<String, Value> = self
            .benchmarks
            .info()
            .into_iter()
            .map(|info| {
                (
                    info.name.to_string(),
                    json!(format!(
                        "{} Recommended bounds: [{}, {}]",
                        info.description, info.bounds[0], info.bounds[1]
                    )),
                )
            })
            .collect();
        ToolOutput::success(Value::Object(listing).to_string())
    }
}

pub struct EvaluateBenchmarkTool {
    benchmarks: Arc<BenchmarkRegistry>,
}

impl EvaluateBenchmarkTool {
    pub fn new(benchmarks: Arc<BenchmarkRegistry>) -> Self {
        Self { benchmarks }
    }
}

#[derive(Debug, Deserialize)]
struct EvaluateInput {
    function_name: String,
    #[serde(default)]
    parameters: Map<String, Value>,
}

#[async_trait]
impl Tool for EvaluateBenchmarkTool {
    fn name(&self) -> &'static str {
        "evaluate_benchmark"
    }

    fn description(&self) -> String {
        format!(
            "Calculates the value of a benchmark function for specific parameters. Use this outside of an Ax study to show benchmark functionality. function_name must be one of {}; parameters is a dictionary of floats, e.g. {{\"x\": 1.5, \"y\": -0.5}}.",
            self.benchmarks
                .names()
                .iter()
                .map(|n| format!("'{n}'"))
                .collect::<Vec<_>>()
                .join(", ")
        )
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["function_name", "parameters"],
            "properties": {
                "function_name": {
                    "type": "string",
                    "enum": self.benchmarks.names()
                },
                "parameters": {
                    "type": "object",
                    "additionalProperties": {"type": "number"}
                }
            }
        })
    }

    async fn run(&self, input: Value) -> ToolOutput {
        let input: EvaluateInput = match parse_input(input) {
            Ok(i) => i,
            Err(out) => return out,
        };

        match self.benchmarks.evaluate(&input.function_name, &input.parameters) {
            Ok(result) => {
                ToolOutput::success(format!("Function '{}' result: {result}", input.function_name))
            }
            Err(e) => ToolOutput::error(format!("Error evaluating function: {e}")),
        }
    }
}
