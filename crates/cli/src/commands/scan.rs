//! `forgegate scan`: run the WAF signature library over a string.

use forgegate_security::PatternLibrary;

/// Returns `false` when a signature matched.
pub fn run(text: &str) -> Result<bool, Box<dyn std::error::Error>> {
    let library = PatternLibrary::builtin()?;
    let (line, clean) = report(&library, text);
    println!("{line}");
    Ok(clean)
}

fn report(library: &PatternLibrary, text: &str) -> (String, bool) {
    match library.scan(text) {
        Some(hit) => (format!("blocked: {} ({})", hit.category, hit.pattern), false),
        None => (format!("clean: no match in {} patterns", library.len()), true),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_category_and_pattern() {
        let library = PatternLibrary::builtin().unwrap();
        let (line, clean) = report(&library, "../../etc/passwd");
        assert!(!clean);
        assert!(line.starts_with("blocked: pathTraversal ("), "{line}");
    }

    #[test]
    fn clean_text() {
        let library = PatternLibrary::builtin().unwrap();
        let (line, clean) = report(&library, "quarterly revenue summary");
        assert!(clean);
        assert!(line.starts_with("clean:"));
    }
}
