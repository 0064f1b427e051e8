//! Study tools backed by the on-disk study store

use super::{parse_input, Tool, ToolOutput};
use crate::benchmarks::BenchmarkRegistry;
use crate::optimizer::{Study, StudyError, StudyStore, MAX_TRIALS_PER_CALL};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

fn objective_schema(benchmarks: &BenchmarkRegistry) -> Value {
    json!({
        "type": "string",
        "description": "Benchmark function to optimize",
        "enum": benchmarks.names()
    })
}

// ---------------------------------------------------------------------------

pub struct CreateStudyTool {
    benchmarks: Arc<BenchmarkRegistry>,
    store: Arc<StudyStore>,
}

impl CreateStudyTool {
    pub fn new(benchmarks: Arc<BenchmarkRegistry>, store: Arc<StudyStore>) -> Self {
        Self { benchmarks, store }
    }

    fn create(&self, input: CreateStudyInput) -> Result<String, StudyError> {
        let mut study = Study::new(
            &input.study_name,
            input.objective_name,
            input.parameters,
            input.maximize,
            &self.benchmarks,
        )?;
        if self.store.exists(&study.name) {
            return Err(StudyError::AlreadyExists(study.name));
        }
        study.run_trials(1, &self.benchmarks)?;
        let path = self.store.create(&study)?;

        let best = study
            .best()
            .map(|t| format!("best {{{}}}, value {}", t.describe_parameters(), t.value))
            .unwrap_or_default();
        Ok(format!(
            "Created experiment '{}' at {}, {best}",
            study.name,
            path.display()
        ))
    }
}

#[derive(Debug, Deserialize)]
struct CreateStudyInput {
    study_name: String,
    objective_name: String,
    parameters: BTreeMap<String, [f64; 2]>,
    #[serde(default = "default_maximize")]
    maximize: bool,
}

fn default_maximize() -> bool {
    true
}

#[async_trait]
impl Tool for CreateStudyTool {
    fn name(&self) -> &'static str {
        "create_study"
    }

    fn description(&self) -> String {
        "Initialize a new Ax optimization study. study_name is a unique identifier for this experiment; objective_name is the benchmark being measured; parameters maps each parameter name to [lower, upper] bounds; maximize is true if the metric should go up, false for down. Runs one initial trial.".to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["study_name", "objective_name", "parameters"],
            "properties": {
                "study_name": {"type": "string"},
                "objective_name": objective_schema(&self.benchmarks),
                "parameters": {
                    "type": "object",
                    "additionalProperties": {
                        "type": "array",
                        "items": {"type": "number"},
                        "minItems": 2,
                        "maxItems": 2
                    }
                },
                "maximize": {"type": "boolean", "default": true}
            }
        })
    }

    async fn run(&self, input: Value) -> ToolOutput {
        let input: CreateStudyInput = match parse_input(input) {
            Ok(i) => i,
            Err(out) => return out,
        };
        match self.create(input) {
            Ok(summary) => ToolOutput::success(summary),
            Err(e) => ToolOutput::error(format!("Error: {e}")),
        }
    }
}

// ---------------------------------------------------------------------------

pub struct NextTrialTool {
    benchmarks: Arc<BenchmarkRegistry>,
    store: Arc<StudyStore>,
}

impl NextTrialTool {
    pub fn new(benchmarks: Arc<BenchmarkRegistry>, store: Arc<StudyStore>) -> Self {
        Self { benchmarks, store }
    }

    fn advance(&self, study: &mut Study, input: &NextTrialInput) -> Result<(), StudyError> {
        if input.objective_name != study.objective {
            return Err(StudyError::ObjectiveMismatch {
                expected: study.objective.clone(),
                got: input.objective_name.clone(),
            });
        }
        let count = u32::try_from(input.number_loops).map_err(|_| StudyError::InvalidTrialCount {
            got: input.number_loops,
            max: MAX_TRIALS_PER_CALL,
        })?;
        study.run_trials(count, &self.benchmarks)?;
        self.store.save(study)
    }
}

#[derive(Debug, Deserialize)]
struct NextTrialInput {
    study_name: String,
    objective_name: String,
    number_loops: i64,
}

#[async_trait]
impl Tool for NextTrialTool {
    fn name(&self) -> &'static str {
        "get_and_complete_next_trial"
    }

    fn description(&self) -> String {
        "Generates the next set of parameters to test and evaluates them, number_loops times, completing each trial. Returns 'success' on completion.".to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["study_name", "objective_name", "number_loops"],
            "properties": {
                "study_name": {"type": "string"},
                "objective_name": objective_schema(&self.benchmarks),
                "number_loops": {"type": "integer", "minimum": 1, "maximum": MAX_TRIALS_PER_CALL}
            }
        })
    }

    async fn run(&self, input: Value) -> ToolOutput {
        let input: NextTrialInput = match parse_input(input) {
            Ok(i) => i,
            Err(out) => return out,
        };
        let mut study = match self.store.load(&input.study_name) {
            Ok(study) => study,
            Err(e) => return ToolOutput::error(e.to_string()),
        };
        match self.advance(&mut study, &input) {
            Ok(()) => ToolOutput::success("success"),
            Err(e) => ToolOutput::error(format!("Error generating trial: {e}")),
        }
    }
}

// ---------------------------------------------------------------------------

pub struct ProvideBestParametersTool {
    store: Arc<StudyStore>,
}

impl ProvideBestParametersTool {
    pub fn new(store: Arc<StudyStore>) -> Self {
        Self { store }
    }
}

#[derive(Debug, Deserialize)]
struct BestParametersInput {
    study_name: String,
}

#[async_trait]
impl Tool for ProvideBestParametersTool {
    fn name(&self) -> &'static str {
        "provide_best_parameters"
    }

    fn description(&self) -> String {
        "From the trials of the study study_name, provides the best parameters and the objective value observed with them.".to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["study_name"],
            "properties": {
                "study_name": {"type": "string"}
            }
        })
    }

    async fn run(&self, input: Value) -> ToolOutput {
        let input: BestParametersInput = match parse_input(input) {
            Ok(i) => i,
            Err(out) => return out,
        };
        let study = match self.store.load(&input.study_name) {
            Ok(study) => study,
            Err(e) => return ToolOutput::error(e.to_string()),
        };
        match study.best() {
            Some(best) => ToolOutput::success(format!(
                "{}. {} = {} (best of {} trials)",
                best.describe_parameters(),
                study.objective,
                best.value,
                study.trials.len()
            )),
            None => ToolOutput::error(format!("Experiment '{}' has no completed trials.", study.name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        benchmarks: Arc<BenchmarkRegistry>,
        store: Arc<StudyStore>,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(StudyStore::open(dir.path()).unwrap());
        Fixture {
            _dir: dir,
            benchmarks: Arc::new(BenchmarkRegistry::standard()),
            store,
        }
    }

    async fn create(f: &Fixture, name: &str, objective: &str) -> ToolOutput {
        CreateStudyTool::new(f.benchmarks.clone(), f.store.clone())
            .run(json!({
                "study_name": name,
                "objective_name": objective,
                "parameters": {"x": [-2, 2], "y": [-2, 2]}
            }))
            .await
    }

    #[tokio::test]
    async fn test_create_runs_initial_trial() {
        let f = fixture();
        let out = create(&f, "first", "ackley").await;
        assert!(out.success, "{}", out.output);
        assert!(out.output.starts_with("Created experiment 'first' at "));

        let study = f.store.load("first").unwrap();
        assert!(study.maximize);
        assert_eq!(study.trials.len(), 1);
    }

    #[tokio::test]
    async fn test_create_duplicate_fails() {
        let f = fixture();
        create(&f, "twice", "sphere").await;
        let out = create(&f, "twice", "sphere").await;
        assert_eq!(out, ToolOutput::error("Error: Experiment 'twice' already exists."));
    }

    #[tokio::test]
    async fn test_create_unknown_objective_fails() {
        let f = fixture();
        let out = create(&f, "acc", "accuracy").await;
        assert!(!out.success);
        assert!(!f.store.exists("acc"));
    }

    #[tokio::test]
    async fn test_create_rejects_unsampleable_or_overflowing_space() {
        let f = fixture();
        let tool = CreateStudyTool::new(f.benchmarks.clone(), f.store.clone());

        let wide = tool
            .run(json!({"study_name": "wide", "objective_name": "sphere", "parameters": {"x": [-1e308, 1e308]}}))
            .await;
        assert!(wide.output.starts_with("Error: invalid bounds for `x`"), "{}", wide.output);

        let big = tool
            .run(json!({"study_name": "big", "objective_name": "sphere", "parameters": {"x": [1e200, 1e300]}}))
            .await;
        assert!(big.output.contains("non-finite"), "{}", big.output);
        assert!(!f.store.exists("big"));

        // The server keeps working for later calls
        let ok = create(&f, "fine", "sphere").await;
        assert!(ok.success, "{}", ok.output);
    }

    #[tokio::test]
    async fn test_next_trial_unknown_study() {
        let f = fixture();
        let out = NextTrialTool::new(f.benchmarks.clone(), f.store.clone())
            .run(json!({"study_name": "nope", "objective_name": "sphere", "number_loops": 2}))
            .await;
        assert_eq!(out, ToolOutput::error("Experiment 'nope' not found."));
    }

    #[tokio::test]
    async fn test_next_trial_objective_mismatch() {
        let f = fixture();
        create(&f, "s", "sphere").await;
        let out = NextTrialTool::new(f.benchmarks.clone(), f.store.clone())
            .run(json!({"study_name": "s", "objective_name": "beale", "number_loops": 2}))
            .await;
        assert!(!out.success);
        assert!(out.output.starts_with("Error generating trial: objective `beale`"));
        assert_eq!(f.store.load("s").unwrap().trials.len(), 1);
    }

    #[tokio::test]
    async fn test_next_trial_rejects_negative_count() {
        let f = fixture();
        create(&f, "s", "sphere").await;
        let out = NextTrialTool::new(f.benchmarks.clone(), f.store.clone())
            .run(json!({"study_name": "s", "objective_name": "sphere", "number_loops": -3}))
            .await;
        assert!(!out.success);
    }

    #[tokio::test]
    async fn test_best_parameters_unknown_study() {
        let f = fixture();
        let out = ProvideBestParametersTool::new(f.store.clone())
            .run(json!({"study_name": "ghost"}))
            .await;
        assert_eq!(out, ToolOutput::error("Experiment 'ghost' not found."));
    }
}
