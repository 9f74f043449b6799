//! Concrete predictors and the JSON model file format
//!
//! ```json
//! {"kind": "nearest_centroid", "centroids": [[0.0, 1.0], [1.0, 0.0]]}
//! {"kind": "linear_softmax", "weights": [[...], [...]], "bias": [0.0, 0.0]}
//! {"kind": "decision_forest", "input_dim": 2, "n_classes": 2,
//!  "classes": ["fan", "pump"],
//!  "trees": [{"split": {"feature": 0, "threshold": 0.5,
//!             "left": {"leaf": {"distribution": [1.0, 0.0]}},
//!             "right": {"leaf": {"distribution": [0.0, 1.0]}}}}]}
//! ```

use super::predictor::{check_input, Predictor, RawPrediction};
use crate::error::{AssetError, PredictionError};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

/// Model file contents, tagged by `kind`
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelSpec {
    NearestCentroid {
        centroids: Vec<Vec<f64>>,
    },
    DecisionForest {
        input_dim: usize,
        n_classes: usize,
        #[serde(default)]
        classes: Option<Vec<String>>,
        trees: Vec<TreeNode>,
    },
    LinearSoftmax {
        weights: Vec<Vec<f64>>,
        bias: Vec<f64>,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeNode {
    /// `features[feature] <= threshold` goes left
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
    Leaf {
        distribution: Vec<f64>,
    },
}

impl ModelSpec {
    /// Validate parameters and build the predictor
    pub fn build(self) -> Result<Arc<dyn Predictor>, AssetError> {
        match self {
            ModelSpec::NearestCentroid { centroids } => {
                Ok(Arc::new(NearestCentroid::new(centroids)?))
            }
            ModelSpec::DecisionForest {
                input_dim,
                n_classes,
                classes,
                trees,
            } => Ok(Arc::new(DecisionForest::new(
                input_dim, n_classes, classes, trees,
            )?)),
            ModelSpec::LinearSoftmax { weights, bias } => {
                Ok(Arc::new(LinearSoftmax::new(weights, bias)?))
            }
        }
    }
}

/// Load and validate a JSON model file
pub fn load_model(path: &Path) -> Result<Arc<dyn Predictor>, AssetError> {
    let content = std::fs::read_to_string(path).map_err(|source| AssetError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let spec: ModelSpec = serde_json::from_str(&content).map_err(|source| AssetError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    let predictor = spec.build()?;

    tracing::info!(
        path = %path.display(),
        kind = predictor.kind(),
        input_dim = predictor.input_dim(),
        "Loaded model"
    );

    Ok(predictor)
}

fn check_matrix(name: &str, rows: &[Vec<f64>]) -> Result<usize, AssetError> {
    let width = rows
        .first()
        .map(Vec::len)
        .ok_or_else(|| AssetError::InvalidModel(format!("{} is empty", name)))?;
    if width == 0 {
        return Err(AssetError::InvalidModel(format!("{} has zero-length rows", name)));
    }
    if rows.iter().any(|row| row.len() != width) {
        return Err(AssetError::InvalidModel(format!("{} rows differ in length", name)));
    }
    if rows.iter().flatten().any(|v| !v.is_finite()) {
        return Err(AssetError::InvalidModel(format!("{} contains non-finite values", name)));
    }
    Ok(width)
}

/// Index of the largest value; first one wins ties
fn arg_max(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |(best, best_value), (i, &v)| {
            if v > best_value {
                (i, v)
            } else {
                (best, best_value)
            }
        })
        .0
}

/// Closest centroid by Euclidean distance
#[derive(Debug)]
pub struct NearestCentroid {
    centroids: Vec<Vec<f64>>,
    input_dim: usize,
}

impl NearestCentroid {
    pub fn new(centroids: Vec<Vec<f64>>) -> Result<Self, AssetError> {
        let input_dim = check_matrix("centroids", &centroids)?;
        Ok(Self {
            centroids,
            input_dim,
        })
    }
}

impl Predictor for NearestCentroid {
    fn kind(&self) -> &'static str {
        "nearest_centroid"
    }

    fn input_dim(&self) -> usize {
        self.input_dim
    }

    fn predict(&self, features: &[f64]) -> Result<RawPrediction, PredictionError> {
        check_input(self.input_dim, features)?;

        let negative_distances: Vec<f64> = self
            .centroids
            .iter()
            .map(|c| {
                -c.iter()
                    .zip(features)
                    .map(|(a, b)| (a - b).powi(2))
                    .sum::<f64>()
            })
            .collect();

        Ok(RawPrediction::Numeric(arg_max(&negative_distances) as f64))
    }
}

/// Soft-voting ensemble of decision trees
#[derive(Debug)]
pub struct DecisionForest {
    input_dim: usize,
    n_classes: usize,
    classes: Option<Vec<String>>,
    trees: Vec<TreeNode>,
}

impl DecisionForest {
    pub fn new(
        input_dim: usize,
        n_classes: usize,
        classes: Option<Vec<String>>,
        trees: Vec<TreeNode>,
    ) -> Result<Self, AssetError> {
        if input_dim == 0 || n_classes == 0 {
            return Err(AssetError::InvalidModel(
                "decision_forest needs input_dim and n_classes greater than zero".to_string(),
            ));
        }
        if trees.is_empty() {
            return Err(AssetError::InvalidModel("decision_forest has no trees".to_string()));
        }
        if let Some(classes) = &classes {
            if classes.len() != n_classes {
                return Err(AssetError::InvalidModel(format!(
                    "decision_forest has {} class names for {} classes",
                    classes.len(),
                    n_classes
                )));
            }
        }
        for tree in &trees {
            Self::check_node(tree, input_dim, n_classes)?;
        }

        Ok(Self {
            input_dim,
            n_classes,
            classes,
            trees,
        })
    }

    fn check_node(node: &TreeNode, input_dim: usize, n_classes: usize) -> Result<(), AssetError> {
        match node {
            TreeNode::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                if *feature >= input_dim || !threshold.is_finite() {
                    return Err(AssetError::InvalidModel(format!(
                        "split on feature {} at {} is out of range",
                        feature, threshold
                    )));
                }
                Self::check_node(left, input_dim, n_classes)?;
                Self::check_node(right, input_dim, n_classes)
            }
            TreeNode::Leaf { distribution } => {
                if distribution.len() != n_classes
                    || distribution.iter().any(|p| !p.is_finite() || *p < 0.0)
                {
                    return Err(AssetError::InvalidModel(format!(
                        "leaf distribution must be {} non-negative values",
                        n_classes
                    )));
                }
                Ok(())
            }
        }
    }

    fn leaf<'a>(mut node: &'a TreeNode, features: &[f64]) -> &'a [f64] {
        loop {
            match node {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if features[*feature] <= *threshold {
                        left.as_ref()
                    } else {
                        right.as_ref()
                    };
                }
                TreeNode::Leaf { distribution } => return distribution,
            }
        }
    }

    fn probabilities(&self, features: &[f64]) -> Vec<f64> {
        let mut mean = vec![0.0; self.n_classes];
        for tree in &self.trees {
            let distribution = Self::leaf(tree, features);
            let total: f64 = distribution.iter().sum();
            if total <= 0.0 {
                continue;
            }
            for (m, p) in mean.iter_mut().zip(distribution) {
                *m += p / total;
            }
        }
        let count = self.trees.len() as f64;
        mean.iter_mut().for_each(|m| *m /= count);
        mean
    }
}

impl Predictor for DecisionForest {
    fn kind(&self) -> &'static str {
        "decision_forest"
    }

    fn input_dim(&self) -> usize {
        self.input_dim
    }

    fn predict(&self, features: &[f64]) -> Result<RawPrediction, PredictionError> {
        check_input(self.input_dim, features)?;
        let index = arg_max(&self.probabilities(features));

        Ok(match &self.classes {
            Some(classes) => RawPrediction::Label(classes[index].clone()),
            None => RawPrediction::Numeric(index as f64),
        })
    }

    fn emits_labels(&self) -> bool {
        self.classes.is_some()
    }

    fn predict_proba(&self, features: &[f64]) -> Result<Option<Vec<f64>>, PredictionError> {
        check_input(self.input_dim, features)?;
        Ok(Some(self.probabilities(features)))
    }
}

/// Multinomial logistic regression
#[derive(Debug)]
pub struct LinearSoftmax {
    weights: Vec<Vec<f64>>,
    bias: Vec<f64>,
    input_dim: usize,
}

impl LinearSoftmax {
    pub fn new(weights: Vec<Vec<f64>>, bias: Vec<f64>) -> Result<Self, AssetError> {
        let input_dim = check_matrix("weights", &weights)?;
        if bias.len() != weights.len() {
            return Err(AssetError::InvalidModel(format!(
                "bias has {} entries for {} classes",
                bias.len(),
                weights.len()
            )));
        }
        if bias.iter().any(|b| !b.is_finite()) {
            return Err(AssetError::InvalidModel("bias contains non-finite values".to_string()));
        }
        Ok(Self {
            weights,
            bias,
            input_dim,
        })
    }

    fn logits(&self, features: &[f64]) -> Vec<f64> {
        self.weights
            .iter()
            .zip(&self.bias)
            .map(|(row, b)| row.iter().zip(features).map(|(w, x)| w * x).sum::<f64>() + b)
            .collect()
    }
}

impl Predictor for LinearSoftmax {
    fn kind(&self) -> &'static str {
        "linear_softmax"
    }

    fn input_dim(&self) -> usize {
        self.input_dim
    }

    fn predict(&self, features: &[f64]) -> Result<RawPrediction, PredictionError> {
        check_input(self.input_dim, features)?;
        Ok(RawPrediction::Numeric(arg_max(&self.logits(features)) as f64))
    }

    fn predict_proba(&self, features: &[f64]) -> Result<Option<Vec<f64>>, PredictionError> {
        check_input(self.input_dim, features)?;
        let logits = self.logits(features);
        let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let exps: Vec<f64> = logits.iter().map(|z| (z - max).exp()).collect();
        let total: f64 = exps.iter().sum();
        Ok(Some(exps.into_iter().map(|e| e / total).collect()))
    }
}
