//! Configuration-driven feature generation.
//!
//! Four primitives derive new columns element-wise from existing ones. The
//! [`generate_features`] orchestrator runs them in the fixed order
//! log transform, multiply, range, normalized range, so later kinds may
//! reference columns produced by earlier ones.
//!
//! Invalid numeric domains are not errors: `ln` of a non-positive value and
//! division by a zero mean follow IEEE-754 and yield NaN or infinities.

mod spec;

use indexmap::IndexMap;
use ndarray::Array1;
use thiserror::Error;
use tracing::{debug, info};

use crate::dataset::Dataset;

pub use spec::{FeatureSpec, MultiplyRoles, NormRangeRoles, RangeRoles, TransformKind};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeatureError {
    #[error("{kind} feature `{feature}` references missing column `{column}`")]
    MissingColumn {
        kind: TransformKind,
        feature: String,
        column: String,
    },
}

/// Set `dataset[new] = ln(dataset[source])` for every `(new, source)` entry.
pub fn apply_log_transform(
    dataset: &mut Dataset,
    spec: &IndexMap<String, String>,
) -> Result<(), FeatureError> {
    let kind = TransformKind::LogTransform;
    for (feature, source) in spec {
        let values = source_column(dataset, kind, feature, source)?.mapv(f64::ln);
        dataset.put_derived(feature, values);
    }
    debug!("Feature log transformation(s) finished ({} column(s))", spec.len());
    Ok(())
}

/// Set `dataset[new] = dataset[col_a] * dataset[col_b]` for every entry.
pub fn apply_multiply(
    dataset: &mut Dataset,
    spec: &IndexMap<String, MultiplyRoles>,
) -> Result<(), FeatureError> {
    let kind = TransformKind::Multiply;
    for (feature, roles) in spec {
        let a = source_column(dataset, kind, feature, &roles.col_a)?;
        let b = source_column(dataset, kind, feature, &roles.col_b)?;
        let values = a * b;
        dataset.put_derived(feature, values);
    }
    debug!("Feature multiplication(s) finished ({} column(s))", spec.len());
    Ok(())
}

/// Set `dataset[new] = dataset[max_col] - dataset[min_col]` for every entry.
///
/// The result is signed: swapping the roles negates it.
pub fn apply_range(
    dataset: &mut Dataset,
    spec: &IndexMap<String, RangeRoles>,
) -> Result<(), FeatureError> {
    let kind = TransformKind::CalculateRange;
    for (feature, roles) in spec {
        let values = span(dataset, kind, feature, &roles.min_col, &roles.max_col)?;
        dataset.put_derived(feature, values);
    }
    debug!("Feature range calculation(s) finished ({} column(s))", spec.len());
    Ok(())
}

/// Set `dataset[new] = (dataset[max_col] - dataset[min_col]) / dataset[mean_col]`.
pub fn apply_norm_range(
    dataset: &mut Dataset,
    spec: &IndexMap<String, NormRangeRoles>,
) -> Result<(), FeatureError> {
    let kind = TransformKind::CalculateNormRange;
    for (feature, roles) in spec {
        let range = span(dataset, kind, feature, &roles.min_col, &roles.max_col)?;
        let mean = source_column(dataset, kind, feature, &roles.mean_col)?;
        let values = range / mean;
        dataset.put_derived(feature, values);
    }
    debug!(
        "Feature normalized range calculation(s) finished ({} column(s))",
        spec.len()
    );
    Ok(())
}

/// Apply every transformation in `spec` in the fixed kind order and return the
/// augmented dataset.
///
/// Original columns are kept; a derived name that matches an existing column
/// overwrites it in place.
pub fn generate_features(
    mut dataset: Dataset,
    spec: &FeatureSpec,
) -> Result<Dataset, FeatureError> {
    for kind in TransformKind::ORDER {
        match kind {
            TransformKind::LogTransform => apply_log_transform(&mut dataset, &spec.log_transform)?,
            TransformKind::Multiply => apply_multiply(&mut dataset, &spec.multiply)?,
            TransformKind::CalculateRange => apply_range(&mut dataset, &spec.calculate_range)?,
            TransformKind::CalculateNormRange => {
                apply_norm_range(&mut dataset, &spec.calculate_norm_range)?
            }
        }
    }
    info!("Features generated successfully ({} derived)", spec.len());
    Ok(dataset)
}

fn source_column<'a>(
    dataset: &'a Dataset,
    kind: TransformKind,
    feature: &str,
    column: &str,
) -> Result<&'a Array1<f64>, FeatureError> {
    dataset
        .column(column)
        .map_err(|_| FeatureError::MissingColumn {
            kind,
            feature: feature.to_string(),
            column: column.to_string(),
        })
}

fn span(
    dataset: &Dataset,
    kind: TransformKind,
    feature: &str,
    min_col: &str,
    max_col: &str,
) -> Result<Array1<f64>, FeatureError> {
    let min = source_column(dataset, kind, feature, min_col)?;
    let max = source_column(dataset, kind, feature, max_col)?;
    Ok(max - min)
}
