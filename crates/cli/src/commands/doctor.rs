//! `forgegate doctor`: diagnose config, SSOT, and audit trail health.

use forgegate_config::AppConfig;
use forgegate_security::{PatternLibrary, PolicyStore, verify_chain};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Pass,
    Warn,
    Fail,
}

#[derive(Debug)]
struct Check {
    status: Status,
    message: String,
}

impl Check {
    fn pass(message: impl Into<String>) -> Self {
        Self {
            status: Status::Pass,
            message: message.into(),
        }
    }

    fn warn(message: impl Into<String>) -> Self {
        Self {
            status: Status::Warn,
            message: message.into(),
        }
    }

    fn fail(message: impl Into<String>) -> Self {
        Self {
            status: Status::Fail,
            message: message.into(),
        }
    }
}

/// Returns `false` when any check failed outright.
pub fn run(config_path: Option<&Path>) -> Result<bool, Box<dyn std::error::Error>> {
    println!("ForgeGate Doctor: System Diagnostics");
    println!("====================================\n");

    let checks = diagnose(config_path);
    for check in &checks {
        let mark = match check.status {
            Status::Pass => "✅",
            Status::Warn => "⚠️ ",
            Status::Fail => "❌",
        };
        println!("  {mark} {}", check.message);
    }

    let failures = checks.iter().filter(|c| c.status == Status::Fail).count();
    let warnings = checks.iter().filter(|c| c.status == Status::Warn).count();
    tracing::debug!(checks = checks.len(), failures, warnings, "Diagnostics complete");

    println!();
    if failures == 0 && warnings == 0 {
        println!("  All checks passed!");
    } else {
        println!("  {failures} failure(s), {warnings} warning(s). See above for details.");
    }

    Ok(failures == 0)
}

fn diagnose(config_path: Option<&Path>) -> Vec<Check> {
    let mut checks = Vec::new();

    let config = match AppConfig::load(config_path) {
        Ok(config) => {
            checks.push(Check::pass("Config valid"));
            config
        }
        Err(e) => {
            checks.push(Check::fail(format!("Config invalid: {e}")));
            return checks;
        }
    };

    match PatternLibrary::builtin() {
        Ok(library) => checks.push(Check::pass(format!("{} WAF patterns compiled", library.len()))),
        Err(e) => checks.push(Check::fail(format!("WAF patterns: {e}"))),
    }

    match PolicyStore::load(&config.ssot_path) {
        Ok(policy) => {
            checks.push(Check::pass(format!(
                "SSOT loaded from {} ({} laws)",
                config.ssot_path.display(),
                policy.laws().len()
            )));
            check_layout(&policy, &mut checks);
            check_entitlements(&policy, &mut checks);
        }
        Err(e) => checks.push(Check::fail(format!("SSOT: {e}"))),
    }

    check_audit(&config, &mut checks);
    checks
}

fn check_layout(policy: &PolicyStore, checks: &mut Vec<Check>) {
    let mut dirs = vec![
        ("root_dir", policy.root_dir()),
        ("docs_root_dir", policy.docs_root_dir()),
        ("migrations_target", policy.migrations_target()),
        ("bundles_target", policy.bundles_target()),
    ];
    dirs.extend(policy.write_allowed().iter().map(|p| ("write_allowed", p.as_path())));

    for (name, dir) in dirs {
        if dir.is_dir() {
            checks.push(Check::pass(format!("{name} {}", dir.display())));
        } else {
            checks.push(Check::warn(format!("{name} {} does not exist", dir.display())));
        }
    }
}

fn check_entitlements(policy: &PolicyStore, checks: &mut Vec<Check>) {
    match policy.entitlements_path() {
        None => checks.push(Check::warn(
            "No entitlements_path configured: license checks will be denied",
        )),
        Some(path) if path.is_file() => {
            checks.push(Check::pass(format!("Entitlements artifact {}", path.display())));
        }
        Some(path) => checks.push(Check::warn(format!(
            "Entitlements artifact {} missing: license checks will be denied",
            path.display()
        ))),
    }
}

fn check_audit(config: &AppConfig, checks: &mut Vec<Check>) {
    let Some(path) = &config.audit.log_path else {
        checks.push(Check::pass("Audit events go to tracing only"));
        return;
    };

    let key = config.audit.hmac_secret.as_deref().map(str::as_bytes);
    if key.is_none() {
        checks.push(Check::warn("audit.hmac_secret not set: chain is unkeyed"));
    }

    if !path.exists() {
        checks.push(Check::pass(format!(
            "Audit log {} will be created on first event",
            path.display()
        )));
        return;
    }

    match verify_chain(path, key) {
        Ok(records) => checks.push(Check::pass(format!(
            "Audit chain intact ({records} records)"
        ))),
        Err(e) => checks.push(Check::fail(format!("Audit chain: {e}"))),
    }
}
