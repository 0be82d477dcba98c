//! Renders scanner facts and the project profile into the Mangle fact
//! vocabulary the logic collaborator consumes (spec.md §6.4). No
//! solver is run here — the logic collaborator is external per §1.

use nerd_core::types::ProjectProfile;
use nerd_scan::{Classification, Fact};

/// Escape a string for embedding inside a double-quoted Mangle literal.
fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Render `facts` plus `profile` into `.mg` text. Predicate names are
/// lowercase-with-underscores; name constants begin with `/`; every
/// statement ends with `.`.
pub fn render(facts: &[Fact], profile: &ProjectProfile) -> String {
    let mut out = String::new();

    for fact in facts {
        match fact {
            Fact::FileTopology { path, classification } => {
                out.push_str(&format!(
                    "file_topology({}, {}).\n",
                    quote(path),
                    classification.as_predicate_arg()
                ));
            }
            Fact::LanguageHint { .. } | Fact::ConfigDetected { .. } => {
                // Config/language hints feed ProfileBuilder directly; only
                // file_topology is part of the minimal fact surface (§6.4).
            }
        }
    }

    out.push_str(&format!("project_language(/{}).\n", profile.language));
    if let Some(framework) = &profile.framework {
        out.push_str(&format!("project_framework(/{framework}).\n"));
    }
    out.push_str(&format!(
        "project_profile({}, {}, {}).\n",
        quote(&profile.project_id),
        quote(&profile.name),
        quote(&profile.description)
    ));
    for pattern in &profile.patterns {
        out.push_str(&format!("architectural_pattern(/{pattern}).\n"));
    }
    for entry in &profile.entry_points {
        out.push_str(&format!("entry_point({}).\n", quote(entry)));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use nerd_core::types::{BuildSystemInfo, ProjectType};

    fn sample_profile() -> ProjectProfile {
        let now = Utc::now();
        ProjectProfile {
            project_id: "abc123".into(),
            name: "demo".into(),
            description: "a demo project".into(),
            created_at: now,
            updated_at: now,
            language: "rust".into(),
            framework: Some("axum".into()),
            build_system: Some("cargo".into()),
            architecture: None,
            patterns: vec!["layered".into()],
            dependencies: vec![],
            entry_points: vec!["src/main.rs".into()],
            test_directories: vec![],
            config_files: vec![],
            file_count: 10,
            directory_count: 2,
            build_system_info: Some(BuildSystemInfo {
                name: "cargo".into(),
                config_file: "Cargo.toml".into(),
            }),
            project_type: ProjectType::Application,
        }
    }

    #[test]
    fn renders_minimal_fact_vocabulary() {
        let facts = vec![Fact::FileTopology {
            path: "src/main.rs".into(),
            classification: Classification::File,
        }];
        let text = render(&facts, &sample_profile());

        assert!(text.contains("file_topology(\"src/main.rs\", /file)."));
        assert!(text.contains("project_language(/rust)."));
        assert!(text.contains("project_framework(/axum)."));
        assert!(text.contains("project_profile(\"abc123\", \"demo\", \"a demo project\")."));
        assert!(text.contains("architectural_pattern(/layered)."));
        assert!(text.contains("entry_point(\"src/main.rs\")."));
    }

    #[test]
    fn quotes_embedded_quotes_and_backslashes() {
        let text = quote("a\"b\\c");
        assert_eq!(text, "\"a\\\"b\\\\c\"");
    }
}
