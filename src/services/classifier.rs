//! Diagnostic classifier.
//!
//! Maps raw diagnostic lines to the closed set of [`ErrorCategory`] values by
//! case-insensitive keyword matching. Categories are tried in declaration
//! order and a line counts toward the first one that matches; lines matching
//! nothing count as [`ErrorCategory::Other`].

use crate::domain::models::{CategoryCounts, ClassificationResult, DiagnosticSample, ErrorCategory};

const TIMEOUT_KEYWORDS: &[&str] = &["task timed out", "timed out", "timeout", "etimedout"];

const MEMORY_KEYWORDS: &[&str] = &[
    "out of memory",
    "memory size",
    "signal: killed",
    "heap out of memory",
    "enomem",
    "memoryerror",
];

const PERMISSION_KEYWORDS: &[&str] = &[
    "accessdenied",
    "access denied",
    "not authorized",
    "unauthorized",
    "forbidden",
    "permission denied",
];

const DEPENDENCY_KEYWORDS: &[&str] = &[
    "cannot find module",
    "module not found",
    "no module named",
    "importerror",
    "unable to import module",
];

const SYNTAX_KEYWORDS: &[&str] = &[
    "syntaxerror",
    "unexpected token",
    "invalid syntax",
    "parse error",
];

const RUNTIME_KEYWORDS: &[&str] = &[
    "typeerror",
    "referenceerror",
    "rangeerror",
    "is not a function",
    "cannot read propert",
    "uncaught exception",
    "unhandled",
    "runtime error",
];

/// Keyword-based classifier.
#[derive(Debug, Clone)]
pub struct Classifier {
    rules: Vec<(ErrorCategory, Vec<String>)>,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Classifier {
    /// Classifier with the built-in keyword table.
    pub fn new() -> Self {
        let table: [(ErrorCategory, &[&str]); 6] = [
            (ErrorCategory::Timeout, TIMEOUT_KEYWORDS),
            (ErrorCategory::Memory, MEMORY_KEYWORDS),
            (ErrorCategory::Permission, PERMISSION_KEYWORDS),
            (ErrorCategory::Dependency, DEPENDENCY_KEYWORDS),
            (ErrorCategory::Syntax, SYNTAX_KEYWORDS),
            (ErrorCategory::Runtime, RUNTIME_KEYWORDS),
        ];
        Self {
            rules: table
                .iter()
                .map(|(category, words)| (*category, words.iter().map(|w| (*w).to_string()).collect()))
                .collect(),
        }
    }

    /// Add extra keywords to a category. Keywords are matched lowercased.
    pub fn with_keywords(mut self, category: ErrorCategory, keywords: &[&str]) -> Self {
        let lowered = keywords.iter().map(|k| k.to_lowercase());
        if let Some((_, words)) = self.rules.iter_mut().find(|(c, _)| *c == category) {
            words.extend(lowered);
        } else if category != ErrorCategory::Other {
            self.rules.push((category, lowered.collect()));
            self.rules.sort_by_key(|(c, _)| *c);
        }
        self
    }

    /// Category of a single line of text.
    pub fn categorize(&self, text: &str) -> ErrorCategory {
        let lower = text.to_lowercase();
        self.rules
            .iter()
            .find(|(_, words)| words.iter().any(|w| lower.contains(w.as_str())))
            .map_or(ErrorCategory::Other, |(category, _)| *category)
    }

    /// Classify a window of samples. Never fails: an empty window yields all
    /// zero counts and a dominant category of `Other`.
    pub fn classify(&self, samples: &[DiagnosticSample]) -> ClassificationResult {
        let mut counts = CategoryCounts::default();
        for sample in samples {
            counts.increment(self.categorize(&sample.message));
        }
        ClassificationResult::from_counts(counts)
    }
}
