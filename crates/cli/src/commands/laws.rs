//! `forgegate laws`: list the loaded laws and the decisions that cite them.

use forgegate_config::AppConfig;
use forgegate_core::LawClass;
use forgegate_security::{PolicyConfig, PolicyStore};
use std::path::Path;

pub fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load(config_path)?;
    let policy = PolicyStore::load(&config.ssot_path)?;

    print!("{}", render(policy.config()));
    Ok(())
}

fn render(policy: &PolicyConfig) -> String {
    let mut out = format!("Laws ({}):\n", policy.laws().len());
    for law in policy.laws() {
        out.push_str(&format!("  {:>3}. {}\n", law.id, law.text));
    }

    out.push_str("\nCited by:\n");
    for class in LawClass::ALL {
        out.push_str(&format!("  {:<12} law {}\n", class.as_str(), policy.law_id(class)));
    }
    out
}
