//! Attack signature library for the WAF stage.
//!
//! Patterns are compiled once at boot with `regex-lite`, which never
//! backtracks, so matching stays linear in the input even on hostile
//! strings. Every quantifier in the table is bounded regardless.

use forgegate_core::AttackCategory;
use regex_lite::Regex;

/// One entry of the signature table.
#[derive(Debug, Clone, Copy)]
pub struct PatternDefinition {
    pub category: AttackCategory,
    /// Stable identifier, reported in `waf_blocked` events.
    pub name: &'static str,
    pub pattern: &'static str,
}

const fn def(
    category: AttackCategory,
    name: &'static str,
    pattern: &'static str,
) -> PatternDefinition {
    PatternDefinition {
        category,
        name,
        pattern,
    }
}

use AttackCategory::{PathTraversal, PromptInjection, SqlInjection, Xss};

/// Built-in signatures. Entries may be added; removing one needs review.
pub const BUILTIN_PATTERNS: &[PatternDefinition] = &[
    // SQL injection
    def(
        SqlInjection,
        "sql-numeric-tautology",
        r"(?i)\b(or|and)\s{1,16}\d{1,16}\s{0,16}=\s{0,16}\d{1,16}",
    ),
    def(
        SqlInjection,
        "sql-quoted-tautology",
        r#"(?i)\b(or|and)\s{1,16}['"]\s{0,16}=\s{0,16}['"]"#,
    ),
    def(
        SqlInjection,
        "sql-string-tautology",
        r#"(?i)['"]\s{0,16}(or|and)\s{1,16}['"][^'"]{0,64}['"]\s{0,16}=\s{0,16}['"]"#,
    ),
    def(
        SqlInjection,
        "sql-union-select",
        r"(?i)\bunion(\s{1,16}all)?\s{1,16}select\b",
    ),
    def(
        SqlInjection,
        "sql-drop",
        r"(?i)\bdrop\s{1,16}(table|database)\b",
    ),
    def(
        SqlInjection,
        "sql-stacked-query",
        r"(?i);\s{0,16}(delete\s{1,16}from|insert\s{1,16}into|update\s{1,16}\w{1,64}\s{1,16}set)\b",
    ),
    def(SqlInjection, "sql-comment-terminator", r"'\s{0,16}--"),
    def(
        SqlInjection,
        "sql-time-delay",
        r"(?i)\b(sleep|benchmark|pg_sleep)\s{0,16}\(\s{0,16}\d",
    ),
    // Cross-site scripting
    def(Xss, "xss-script-tag", r"(?i)<\s{0,8}script\b"),
    def(Xss, "xss-javascript-uri", r"(?i)javascript\s{0,8}:"),
    def(
        Xss,
        "xss-event-handler",
        r"(?i)<[^>]{0,256}\bon[a-z]{2,32}\s{0,8}=",
    ),
    def(Xss, "xss-iframe", r"(?i)<\s{0,8}iframe\b"),
    def(Xss, "xss-object-embed", r"(?i)<\s{0,8}(object|embed)\b"),
    def(Xss, "xss-data-html", r"(?i)data:text/html"),
    // Path traversal
    def(PathTraversal, "traversal-dot-dot-slash", r"\.\./"),
    def(PathTraversal, "traversal-dot-dot-backslash", r"\.\.\\"),
    def(
        PathTraversal,
        "traversal-encoded",
        r"(?i)%2e%2e(%2f|%5c|/|\\)",
    ),
    def(
        PathTraversal,
        "traversal-mixed-encoding",
        r"(?i)\.\.(%2f|%5c)",
    ),
    def(PathTraversal, "traversal-double-encoded", r"(?i)%252e%252e"),
    // Prompt injection
    def(
        PromptInjection,
        "prompt-ignore-instructions",
        r"(?i)ignore\s{1,16}(previous|above|all)\s{1,16}(instructions?|prompts?)",
    ),
    def(
        PromptInjection,
        "prompt-forget",
        r"(?i)forget\s{1,16}(everything|all|previous)",
    ),
    def(
        PromptInjection,
        "prompt-identity-swap",
        r"(?i)you\s{1,16}are\s{1,16}now\s{1,16}(a\s{1,16})?(different|new)",
    ),
    def(
        PromptInjection,
        "prompt-pretend",
        r"(?i)pretend\s{1,16}to\s{1,16}be",
    ),
    def(
        PromptInjection,
        "prompt-act-as-if",
        r"(?i)act\s{1,16}as\s{1,16}if",
    ),
    def(
        PromptInjection,
        "prompt-roleplay",
        r"(?i)roleplay\s{1,16}as",
    ),
    def(
        PromptInjection,
        "prompt-system-override",
        r"(?i)system\s{0,16}:\s{0,16}override",
    ),
    def(
        PromptInjection,
        "prompt-admin-bypass",
        r"(?i)admin\s{0,16}:\s{0,16}bypass",
    ),
];

/// A compiled signature.
#[derive(Debug, Clone)]
pub struct SecurityPattern {
    pub category: AttackCategory,
    pub name: &'static str,
    regex: Regex,
}

impl SecurityPattern {
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    pub fn is_match(&self, haystack: &str) -> bool {
        self.regex.is_match(haystack)
    }
}

/// The first signature that matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternMatch {
    pub category: AttackCategory,
    pub pattern: &'static str,
}

#[derive(Debug, thiserror::Error)]
pub enum PatternError {
    #[error("pattern '{name}' failed to compile: {source}")]
    Invalid {
        name: &'static str,
        #[source]
        source: regex_lite::Error,
    },
}

/// Immutable, categorized signature set.
#[derive(Debug, Clone)]
pub struct PatternLibrary {
    patterns: Vec<SecurityPattern>,
}

impl PatternLibrary {
    /// Compile [`BUILTIN_PATTERNS`].
    pub fn builtin() -> Result<Self, PatternError> {
        Self::from_definitions(BUILTIN_PATTERNS)
    }

    /// Compile a signature table. Patterns are evaluated in
    /// [`AttackCategory::ALL`] order, then table order within a category.
    pub fn from_definitions(definitions: &[PatternDefinition]) -> Result<Self, PatternError> {
        let mut patterns = definitions
            .iter()
            .map(|d| {
                Regex::new(d.pattern)
                    .map(|regex| SecurityPattern {
                        category: d.category,
                        name: d.name,
                        regex,
                    })
                    .map_err(|source| PatternError::Invalid {
                        name: d.name,
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        patterns.sort_by_key(|p| category_rank(p.category));
        tracing::debug!(patterns = patterns.len(), "Compiled WAF pattern library");
        Ok(Self { patterns })
    }

    /// First matching signature, if any.
    pub fn scan(&self, haystack: &str) -> Option<PatternMatch> {
        self.patterns
            .iter()
            .find(|p| p.is_match(haystack))
            .map(|p| PatternMatch {
                category: p.category,
                pattern: p.name,
            })
    }

    pub fn patterns_in(&self, category: AttackCategory) -> impl Iterator<Item = &SecurityPattern> {
        self.patterns.iter().filter(move |p| p.category == category)
    }

    pub fn patterns(&self) -> &[SecurityPattern] {
        &self.patterns
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

fn category_rank(category: AttackCategory) -> usize {
    AttackCategory::ALL
        .iter()
        .position(|c| *c == category)
        .unwrap_or(AttackCategory::ALL.len())
}
