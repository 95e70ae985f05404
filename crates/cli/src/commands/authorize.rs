//! `forgegate authorize`: check one privileged action against the SSOT.

use forgegate_config::AppConfig;
use forgegate_core::{ActionRequest, SecurityEventSink, Verdict};
use forgegate_security::{ActionAuthorizer, PolicyStore};
use std::path::Path;

/// Origin recorded on audit events raised from the command line.
const CLI_ORIGIN: &str = "cli";

/// Print the verdict as JSON. Returns whether the action was allowed.
pub fn run(
    config_path: Option<&Path>,
    kind: String,
    target: Option<String>,
) -> Result<bool, Box<dyn std::error::Error>> {
    let config = AppConfig::load(config_path)?;
    let policy = PolicyStore::load(&config.ssot_path)?;
    let sink = forgegate_gateway::build_sink(&config.audit)?;

    let request = ActionRequest::new(kind, target);
    if let Some(line) = governing_document(&policy, &request) {
        eprintln!("{line}");
    }

    let verdict = authorize(&ActionAuthorizer::new(policy), &request, sink.as_ref());
    println!("{}", serde_json::to_string_pretty(&verdict)?);

    Ok(verdict.is_allowed())
}

fn authorize(
    authorizer: &ActionAuthorizer,
    request: &ActionRequest,
    sink: &dyn SecurityEventSink,
) -> Verdict {
    authorizer.guard_request_audited(request, CLI_ORIGIN, sink)
}

/// Which precedence entry governs the request's target, if any.
fn governing_document(policy: &PolicyStore, request: &ActionRequest) -> Option<String> {
    let target = request.target.as_deref()?;
    let entry = policy.precedence_of(Path::new(target))?;
    Some(format!("governed by '{}' (level {})", entry.id, entry.level))
}
