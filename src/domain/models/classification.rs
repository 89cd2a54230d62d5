//! Error classification model.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of error categories.
///
/// Declaration order matters: it is the pattern evaluation order and the
/// tie-break order for the dominant category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Timeout,
    Memory,
    Permission,
    Dependency,
    Syntax,
    Runtime,
    Other,
}

impl ErrorCategory {
    /// All categories in declaration order.
    pub const ALL: [Self; 7] = [
        Self::Timeout,
        Self::Memory,
        Self::Permission,
        Self::Dependency,
        Self::Syntax,
        Self::Runtime,
        Self::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Memory => "memory",
            Self::Permission => "permission",
            Self::Dependency => "dependency",
            Self::Syntax => "syntax",
            Self::Runtime => "runtime",
            Self::Other => "other",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "timeout" => Some(Self::Timeout),
            "memory" => Some(Self::Memory),
            "permission" => Some(Self::Permission),
            "dependency" => Some(Self::Dependency),
            "syntax" => Some(Self::Syntax),
            "runtime" => Some(Self::Runtime),
            "other" => Some(Self::Other),
            _ => None,
        }
    }

    const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-category sample counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CategoryCounts([u32; 7]);

impl CategoryCounts {
    pub fn get(&self, category: ErrorCategory) -> u32 {
        self.0[category.index()]
    }

    pub fn increment(&mut self, category: ErrorCategory) {
        self.0[category.index()] += 1;
    }

    pub fn total(&self) -> u32 {
        self.0.iter().sum()
    }

    /// Iterate `(category, count)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (ErrorCategory, u32)> + '_ {
        ErrorCategory::ALL.iter().map(|c| (*c, self.get(*c)))
    }

    /// Highest count wins; ties go to the first declared category.
    /// All-zero counts yield [`ErrorCategory::Other`].
    pub fn dominant(&self) -> ErrorCategory {
        let mut best = ErrorCategory::Other;
        let mut best_count = 0;
        for (category, count) in self.iter() {
            if count > best_count {
                best = category;
                best_count = count;
            }
        }
        best
    }
}

/// Result of classifying one analysis window. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub counts: CategoryCounts,
    pub total: u32,
    pub dominant: ErrorCategory,
}

impl ClassificationResult {
    pub fn from_counts(counts: CategoryCounts) -> Self {
        Self {
            total: counts.total(),
            dominant: counts.dominant(),
            counts,
        }
    }

    /// Number of samples in the dominant category.
    pub fn dominant_count(&self) -> u32 {
        self.counts.get(self.dominant)
    }

    /// True when no diagnostics were available.
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

/// Confidence in a classification, ordered `Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
