//! Security engines for ForgeGate.
//!
//! Provides:
//! - **Policy store**: the SSOT, resolved once at boot and frozen
//! - **Path containment**: normalization and strict `is_under` checks
//! - **Action authorizer**: law-cited verdicts for privileged actions
//! - **Pattern library**: WAF signatures compiled with a linear-time engine
//! - **Audit trail**: event sinks, including a hash-chained JSONL file

pub mod audit;
pub mod authorizer;
pub mod path;
pub mod patterns;
pub mod policy;

pub use audit::{ChainError, FanoutSink, JsonlAuditSink, MemorySink, TracingSink, verify_chain};
pub use authorizer::ActionAuthorizer;
pub use path::{is_under, is_under_or_equal, normalize, resolve};
pub use patterns::{
    BUILTIN_PATTERNS, PatternDefinition, PatternError, PatternLibrary, PatternMatch,
    SecurityPattern,
};
pub use policy::{PolicyConfig, PolicyStore, PrecedenceEntry};
