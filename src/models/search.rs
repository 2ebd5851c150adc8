//! Hyperparameter grid search and candidate-family selection
//!
//! The roster is a static table of {name, grid, constructor} entries walked
//! uniformly, so adding or removing a family never touches the selection
//! algorithm. Roster order is load-bearing: it is the deterministic
//! tie-break when two families reach the same representative score.

use super::boosting::{GradientBoosting, XgBoost};
use super::ensemble::{AdaBoost, RandomForest};
use super::linear::LogisticRegression;
use super::tree::{DecisionTree, SplitCriterion};
use super::Model;
use crate::error::{PipelineError, Result};
use crate::metrics::accuracy;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// One hyperparameter value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Float(f64),
    Int(u64),
    Text(&'static str),
}

/// One point of a hyperparameter grid.
pub type ParamMap = BTreeMap<&'static str, ParamValue>;

fn f64_param(params: &ParamMap, key: &str, default: f64) -> f64 {
    match params.get(key) {
        Some(ParamValue::Float(v)) => *v,
        Some(ParamValue::Int(v)) => *v as f64,
        _ => default,
    }
}

fn usize_param(params: &ParamMap, key: &str, default: usize) -> usize {
    match params.get(key) {
        Some(ParamValue::Int(v)) => *v as usize,
        _ => default,
    }
}

fn text_param<'a>(params: &'a ParamMap, key: &str, default: &'a str) -> &'a str {
    match params.get(key) {
        Some(ParamValue::Text(v)) => v,
        _ => default,
    }
}

/// One candidate family: a name, its hyperparameter grid, and a constructor
/// for a single grid point. An empty grid means "defaults only".
pub struct CandidateSpec {
    pub name: &'static str,
    pub grid: Vec<(&'static str, Vec<ParamValue>)>,
    pub build: fn(&ParamMap, u64) -> Model,
}

/// The fixed candidate roster, in tie-break order.
pub fn candidate_roster() -> Vec<CandidateSpec> {
    use ParamValue::{Float, Int, Text};

    vec![
        CandidateSpec {
            name: "random_forest",
            grid: vec![("n_estimators", vec![Int(16), Int(64), Int(128)])],
            build: |params, seed| {
                Model::RandomForest(RandomForest::new(
                    usize_param(params, "n_estimators", 100),
                    seed,
                ))
            },
        },
        CandidateSpec {
            name: "decision_tree",
            grid: vec![("criterion", vec![Text("gini"), Text("entropy")])],
            build: |params, _| {
                let criterion = match text_param(params, "criterion", "gini") {
                    "entropy" => SplitCriterion::Entropy,
                    _ => SplitCriterion::Gini,
                };
                Model::DecisionTree(DecisionTree::new(criterion, 24, 1))
            },
        },
        CandidateSpec {
            name: "gradient_boosting",
            grid: vec![
                ("learning_rate", vec![Float(0.1), Float(0.01)]),
                ("subsample", vec![Float(0.7), Float(0.9)]),
                ("n_estimators", vec![Int(32), Int(64)]),
            ],
            build: |params, seed| {
                Model::GradientBoosting(GradientBoosting::new(
                    f64_param(params, "learning_rate", 0.1),
                    usize_param(params, "n_estimators", 100),
                    f64_param(params, "subsample", 1.0),
                    seed,
                ))
            },
        },
        CandidateSpec {
            name: "logistic_regression",
            grid: Vec::new(),
            build: |_, _| Model::LogisticRegression(LogisticRegression::default()),
        },
        CandidateSpec {
            name: "adaboost",
            grid: vec![
                ("learning_rate", vec![Float(0.1), Float(0.01)]),
                ("n_estimators", vec![Int(32), Int(64)]),
            ],
            build: |params, _| {
                Model::AdaBoost(AdaBoost::new(
                    usize_param(params, "n_estimators", 50),
                    f64_param(params, "learning_rate", 1.0),
                ))
            },
        },
        CandidateSpec {
            name: "xgboost",
            grid: vec![
                ("learning_rate", vec![Float(0.1), Float(0.01)]),
                ("n_estimators", vec![Int(32), Int(64)]),
                ("max_depth", vec![Int(3), Int(7)]),
                ("subsample", vec![Float(0.7), Float(0.9)]),
            ],
            build: |params, seed| {
                Model::XgBoost(XgBoost::new(
                    f64_param(params, "learning_rate", 0.3),
                    usize_param(params, "n_estimators", 100),
                    usize_param(params, "max_depth", 6),
                    f64_param(params, "subsample", 1.0),
                    seed,
                ))
            },
        },
    ]
}

/// Expand a grid into the cartesian product of its axes.
pub fn expand_grid(grid: &[(&'static str, Vec<ParamValue>)]) -> Vec<ParamMap> {
    let mut points = vec![ParamMap::new()];
    for (key, values) in grid {
        let mut next = Vec::with_capacity(points.len() * values.len());
        for point in &points {
            for value in values {
                let mut expanded = point.clone();
                expanded.insert(key, *value);
                next.push(expanded);
            }
        }
        points = next;
    }
    points
}

/// How one family fared in the search.
#[derive(Debug, Clone, Serialize)]
pub struct FamilyScore {
    pub name: &'static str,
    pub best_params: ParamMap,
    pub cv_score: f64,
    pub test_score: f64,
}

/// Evaluation grid across all families that fitted.
#[derive(Debug, Clone, Serialize)]
pub struct ModelReport {
    pub scores: Vec<FamilyScore>,
}

impl ModelReport {
    /// Score of the named family, if it fitted.
    pub fn score_of(&self, name: &str) -> Option<f64> {
        self.scores
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.test_score)
    }
}

fn k_fold_indices(n: usize, folds: usize, seed: u64) -> Vec<(Vec<usize>, Vec<usize>)> {
    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(&mut StdRng::seed_from_u64(seed));

    (0..folds)
        .filter_map(|fold| {
            let start = fold * n / folds;
            let end = (fold + 1) * n / folds;
            if start == end {
                return None;
            }
            let validation = order[start..end].to_vec();
            let training: Vec<usize> = order[..start]
                .iter()
                .chain(&order[end..])
                .copied()
                .collect();
            if training.is_empty() {
                return None;
            }
            Some((training, validation))
        })
        .collect()
}

fn gather(x: &[Vec<f64>], y: &[f64], indices: &[usize]) -> (Vec<Vec<f64>>, Vec<f64>) {
    (
        indices.iter().map(|&i| x[i].clone()).collect(),
        indices.iter().map(|&i| y[i]).collect(),
    )
}

/// Mean cross-validated accuracy of one grid point, or `None` if any fold
/// fails to fit.
fn cv_score(
    spec: &CandidateSpec,
    params: &ParamMap,
    x: &[Vec<f64>],
    y: &[f64],
    folds: usize,
    seed: u64,
) -> Option<f64> {
    let fold_indices = k_fold_indices(x.len(), folds, seed);
    if fold_indices.is_empty() {
        return None;
    }

    let mut total = 0.0;
    for (train_idx, val_idx) in &fold_indices {
        let (fold_x, fold_y) = gather(x, y, train_idx);
        let (val_x, val_y) = gather(x, y, val_idx);

        let mut model = (spec.build)(params, seed);
        model.fit(&fold_x, &fold_y).ok()?;
        total += accuracy(&val_y, &model.predict(&val_x));
    }
    Some(total / fold_indices.len() as f64)
}

struct FamilyEvaluation {
    score: FamilyScore,
    model: Model,
}

/// Grid-search one family: cross-validate every grid point in parallel,
/// refit the best on the full training partition, score it on the test
/// partition. `None` drops the family from consideration.
fn evaluate_family(
    spec: &CandidateSpec,
    x_train: &[Vec<f64>],
    y_train: &[f64],
    x_test: &[Vec<f64>],
    y_test: &[f64],
    folds: usize,
    seed: u64,
) -> Option<FamilyEvaluation> {
    let points = expand_grid(&spec.grid);
    let scored: Vec<Option<f64>> = points
        .par_iter()
        .map(|params| cv_score(spec, params, x_train, y_train, folds, seed))
        .collect();

    let mut best: Option<(usize, f64)> = None;
    for (idx, score) in scored.iter().enumerate() {
        if let Some(score) = score {
            if best.map_or(true, |(_, b)| *score > b) {
                best = Some((idx, *score));
            }
        }
    }
    let (best_idx, best_cv) = best?;
    let best_params = points.into_iter().nth(best_idx)?;

    let mut model = (spec.build)(&best_params, seed);
    if let Err(e) = model.fit(x_train, y_train) {
        warn!(family = spec.name, error = %e, "Refit failed; dropping family");
        return None;
    }
    let test_score = accuracy(y_test, &model.predict(x_test));

    debug!(
        family = spec.name,
        cv_score = best_cv,
        test_score,
        "Family evaluated"
    );
    Some(FamilyEvaluation {
        score: FamilyScore {
            name: spec.name,
            best_params,
            cv_score: best_cv,
            test_score,
        },
        model,
    })
}

/// Run the full candidate search and return the fitted winner plus the
/// evaluation grid.
///
/// The winner is the family with the strictly maximal representative test
/// score; on ties the family earliest in the roster wins. Families whose
/// every configuration fails to fit are dropped; if all of them drop, the
/// search fails with [`PipelineError::NoViableModel`].
pub fn search(
    x_train: &[Vec<f64>],
    y_train: &[f64],
    x_test: &[Vec<f64>],
    y_test: &[f64],
    folds: usize,
    seed: u64,
) -> Result<(Model, ModelReport)> {
    let mut evaluations: Vec<FamilyEvaluation> = Vec::new();
    for spec in candidate_roster() {
        match evaluate_family(&spec, x_train, y_train, x_test, y_test, folds, seed) {
            Some(eval) => evaluations.push(eval),
            None => warn!(family = spec.name, "No configuration could be fitted"),
        }
    }

    if evaluations.is_empty() {
        return Err(PipelineError::NoViableModel);
    }

    let mut winner_idx = 0;
    for (idx, eval) in evaluations.iter().enumerate() {
        if eval.score.test_score > evaluations[winner_idx].score.test_score {
            winner_idx = idx;
        }
    }

    let report = ModelReport {
        scores: evaluations.iter().map(|e| e.score.clone()).collect(),
    };
    let winner = evaluations.swap_remove(winner_idx);
    info!(
        family = winner.score.name,
        test_score = winner.score.test_score,
        "Selected best candidate family"
    );
    Ok((winner.model, report))
}
