use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Declarative description of the columns to derive, grouped by transformation kind.
///
/// Each table maps the new column name to its source column(s). Tables may be
/// omitted or empty. Within a table, entries run in the order they are listed,
/// so an entry may use a column derived by an earlier entry of the same kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeatureSpec {
    /// `new_col = ln(source_col)`.
    pub log_transform: IndexMap<String, String>,
    /// `new_col = col_a * col_b`.
    pub multiply: IndexMap<String, MultiplyRoles>,
    /// `new_col = max_col - min_col`.
    pub calculate_range: IndexMap<String, RangeRoles>,
    /// `new_col = (max_col - min_col) / mean_col`.
    pub calculate_norm_range: IndexMap<String, NormRangeRoles>,
}

impl FeatureSpec {
    /// Total number of derived columns across all kinds.
    pub fn len(&self) -> usize {
        self.log_transform.len()
            + self.multiply.len()
            + self.calculate_range.len()
            + self.calculate_norm_range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MultiplyRoles {
    pub col_a: String,
    pub col_b: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RangeRoles {
    pub min_col: String,
    pub max_col: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NormRangeRoles {
    pub min_col: String,
    pub max_col: String,
    pub mean_col: String,
}

/// Transformation kinds, in the order the engine applies them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransformKind {
    LogTransform,
    Multiply,
    CalculateRange,
    CalculateNormRange,
}

impl TransformKind {
    pub const ORDER: [TransformKind; 4] = [
        TransformKind::LogTransform,
        TransformKind::Multiply,
        TransformKind::CalculateRange,
        TransformKind::CalculateNormRange,
    ];

    /// Configuration table name for this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            TransformKind::LogTransform => "log_transform",
            TransformKind::Multiply => "multiply",
            TransformKind::CalculateRange => "calculate_range",
            TransformKind::CalculateNormRange => "calculate_norm_range",
        }
    }
}

impl fmt::Display for TransformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
