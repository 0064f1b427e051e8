use super::{StudyError, StudyResult};
use crate::benchmarks::BenchmarkRegistry;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt::Write as _;

pub const MAX_TRIALS_PER_CALL: u32 = 500;

/// One evaluated candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    pub index: u32,
    pub parameters: BTreeMap<String, f64>,
    pub value: f64,
    pub completed_at: DateTime<Utc>,
}

impl Trial {
    /// `x: 0.1, y: -2.3`
    pub fn describe_parameters(&self) -> String {
        let mut out = String::new();
        for (i, (name, value)) in self.parameters.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            let _ = write!(out, "{name}: {value}");
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Study {
    pub name: String,
    pub objective: String,
    pub maximize: bool,
    /// Parameter name to `[lower, upper]`
    pub parameters: BTreeMap<String, [f64; 2]>,
    pub seed: u64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub trials: Vec<Trial>,
}

impl Study {
    /// Validate the search space and objective; no trials are run
    pub fn new(
        name: impl Into<String>,
        objective: impl Into<String>,
        parameters: BTreeMap<String, [f64; 2]>,
        maximize: bool,
        benchmarks: &BenchmarkRegistry,
    ) -> StudyResult<Self> {
        let objective = objective.into();
        if benchmarks.get(&objective).is_none() {
            return Err(StudyError::UnknownObjective(objective));
        }
        check_space(&parameters)?;

        Ok(Self {
            name: name.into(),
            objective,
            maximize,
            parameters,
            seed: rand::thread_rng().gen(),
            created_at: Utc::now(),
            trials: Vec::new(),
        })
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Draw `count` candidates, evaluate each and record them as trials
    pub fn run_trials(&mut self, count: u32, benchmarks: &BenchmarkRegistry) -> StudyResult<&[Trial]> {
        if count == 0 || count > MAX_TRIALS_PER_CALL {
            return Err(StudyError::InvalidTrialCount {
                got: i64::from(count),
                max: MAX_TRIALS_PER_CALL,
            });
        }

        check_space(&self.parameters)?;

        let start = self.trials.len();
        // Offsetting by the trial count keeps the sequence stable across reloads
        let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(start as u64));
        let mut drawn = Vec::with_capacity(count as usize);
        for offset in 0..count as usize {
            let parameters: BTreeMap<String, f64> = self
                .parameters
                .iter()
                .map(|(name, [lower, upper])| (name.clone(), rng.gen_range(*lower..=*upper)))
                .collect();
            let inputs: Map<String, Value> = parameters
                .iter()
                .map(|(name, value)| (name.clone(), Value::from(*value)))
                .collect();
            let value = benchmarks.evaluate(&self.objective, &inputs)?;
            // JSON has no encoding for these, so the study could not be reloaded
            if !value.is_finite() {
                return Err(StudyError::NonFiniteObjective {
                    objective: self.objective.clone(),
                    value,
                });
            }

            let index = u32::try_from(start + offset).unwrap_or(u32::MAX);
            tracing::debug!(study = %self.name, index, value, "Trial completed");
            drawn.push(Trial {
                index,
                parameters,
                value,
                completed_at: Utc::now(),
            });
        }
        self.trials.extend(drawn);
        Ok(&self.trials[start..])
    }

    /// Best trial under the study's direction
    pub fn best(&self) -> Option<&Trial> {
        let trials = self.trials.iter();
        if self.maximize {
            trials.max_by(|a, b| a.value.total_cmp(&b.value))
        } else {
            trials.min_by(|a, b| a.value.total_cmp(&b.value))
        }
    }
}

fn check_space(parameters: &BTreeMap<String, [f64; 2]>) -> StudyResult<()> {
    if parameters.is_empty() {
        return Err(StudyError::NoParameters);
    }
    for (parameter, [lower, upper]) in parameters {
        if !lower.is_finite() || !upper.is_finite() {
            return Err(StudyError::InvalidBounds {
                parameter: parameter.clone(),
                reason: "bounds must be finite".to_string(),
            });
        }
        if lower >= upper {
            return Err(StudyError::InvalidBounds {
                parameter: parameter.clone(),
                reason: format!("lower bound {lower} is not below upper bound {upper}"),
            });
        }
        if !(upper - lower).is_finite() {
            return Err(StudyError::InvalidBounds {
                parameter: parameter.clone(),
                reason: "range is too wide to sample".to_string(),
            });
        }
    }
    Ok(())
}
