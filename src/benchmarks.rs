//! Two-dimensional benchmark objectives
//!
//! Each function reads `x` and `y` from a parameter mapping; a missing
//! coordinate counts as zero.

use serde::Serialize;
use serde_json::{Map, Value};
use std::f64::consts::{E, PI};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum BenchmarkError {
    #[error("Function {0} not found.")]
    UnknownFunction(String),
    #[error("parameter `{name}` must be a number, got {value}")]
    NonNumeric { name: String, value: Value },
}

/// A named objective with its recommended search bounds
#[derive(Debug, Clone, Copy)]
pub struct Benchmark {
    pub name: &'static str,
    pub description: &'static str,
    pub bounds: (f64, f64),
    eval: fn(f64, f64) -> f64,
}

impl Benchmark {
    pub fn evaluate(&self, x: f64, y: f64) -> f64 {
        (self.eval)(x, y)
    }
}

/// Listing entry for `list_available_functions`
#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub bounds: [f64; 2],
}

fn ackley(x: f64, y: f64) -> f64 {
    let term1 = -20.0 * (-0.2 * (0.5 * (x * x + y * y)).sqrt()).exp();
    let term2 = -(0.5 * ((2.0 * PI * x).cos() + (2.0 * PI * y).cos())).exp();
    term1 + term2 + E + 20.0
}

fn rosenbrock(x: f64, y: f64) -> f64 {
    let (a, b) = (1.0, 100.0);
    (a - x).powi(2) + b * (y - x * x).powi(2)
}

fn rastrigin(x: f64, y: f64) -> f64 {
    let a = 10.0;
    a * 2.0 + (x * x - a * (2.0 * PI * x).cos()) + (y * y - a * (2.0 * PI * y).cos())
}

fn sphere(x: f64, y: f64) -> f64 {
    x * x + y * y
}

fn beale(x: f64, y: f64) -> f64 {
    (1.5 - x + x * y).powi(2)
        + (2.25 - x + x * y.powi(2)).powi(2)
        + (2.625 - x + x * y.powi(3)).powi(2)
}

const STANDARD: [Benchmark; 5] = [
    Benchmark {
        name: "ackley",
        description: "Ackley function. Many local minima. Global minimum is 0 at (0, 0).",
        bounds: (-32.768, 32.768),
        eval: ackley,
    },
    Benchmark {
        name: "rosenbrock",
        description: "Rosenbrock function (The Banana Function). Global minimum is 0 at (1, 1). Hard to converge.",
        bounds: (-5.0, 10.0),
        eval: rosenbrock,
    },
    Benchmark {
        name: "rastrigin",
        description: "Rastrigin function. Highly multimodal (bumpy). Global minimum is 0 at (0, 0).",
        bounds: (-5.12, 5.12),
        eval: rastrigin,
    },
    Benchmark {
        name: "sphere",
        description: "Sphere function. Simple convex bowl. Global minimum is 0 at (0, 0).",
        bounds: (-10.0, 10.0),
        eval: sphere,
    },
    Benchmark {
        name: "beale",
        description: "Beale function. Sharp peaks and flat ridges. Global minimum is 0 at (3, 0.5).",
        bounds: (-4.5, 4.5),
        eval: beale,
    },
];

/// Lookup table of benchmark objectives, in listing order
#[derive(Debug, Clone)]
pub struct BenchmarkRegistry {
    benchmarks: Vec<Benchmark>,
}

impl BenchmarkRegistry {
    pub fn standard() -> Self {
        Self {
            benchmarks: STANDARD.to_vec(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Benchmark> {
        self.benchmarks.iter().find(|b| b.name == name)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.benchmarks.iter().map(|b| b.name).collect()
    }

    /// Evaluate `name` at the `x`/`y` entries of `params`
    pub fn evaluate(&self, name: &str, params: &Map<String, Value>) -> Result<f64, BenchmarkError> {
        let benchmark = self
            .get(name)
            .ok_or_else(|| BenchmarkError::UnknownFunction(name.to_string()))?;
        let x = coordinate(params, "x")?;
        let y = coordinate(params, "y")?;
        Ok(benchmark.evaluate(x, y))
    }

    pub fn info(&self) -> Vec<BenchmarkInfo> {
        self.benchmarks
            .iter()
            .map(|b| BenchmarkInfo {
                name: b.name,
                description: b.description,
                bounds: [b.bounds.0, b.bounds.1],
            })
            .collect()
    }
}

fn coordinate(params: &Map<String, Value>, name: &str) -> Result<f64, BenchmarkError> {
    match params.get(name) {
        None | Some(Value::Null) => Ok(0.0),
        Some(value) => value.as_f64().ok_or_else(|| BenchmarkError::NonNumeric {
            name: name.to_string(),
            value: value.clone(),
        }),
    }
}
