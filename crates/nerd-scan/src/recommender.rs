//! Pure function: project profile → recommended specialist agents
//! (C8, spec.md §4.8).

use nerd_core::types::ProjectProfile;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ReadCode,
    WriteCode,
    RunTests,
    RunShell,
    NetworkAccess,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendedAgent {
    pub name: String,
    pub permissions: Vec<Permission>,
    pub topics: Vec<String>,
    pub reason: String,
    pub priority: u8,
    pub tools: Vec<String>,
    pub preferences: Vec<String>,
}

fn agent(
    name: &str,
    permissions: &[Permission],
    topics: &[&str],
    reason: &str,
    priority: u8,
    tools: &[&str],
    preferences: &[&str],
) -> RecommendedAgent {
    RecommendedAgent {
        name: name.to_string(),
        permissions: permissions.to_vec(),
        topics: topics.iter().map(|t| t.to_string()).collect(),
        reason: reason.to_string(),
        priority,
        tools: tools.iter().map(|t| t.to_string()).collect(),
        preferences: preferences.iter().map(|p| p.to_string()).collect(),
    }
}

/// Static tool/preference table keyed by `(agent name, language)`,
/// falling back to a language-agnostic default when no specific row
/// exists.
fn tools_and_preferences(agent_name: &str, language: &str) -> (Vec<&'static str>, Vec<&'static str>) {
    match (agent_name, language) {
        ("RustExpert", _) => (vec!["cargo", "clippy", "rustfmt"], vec!["prefer-idiomatic-ownership"]),
        ("GoExpert", _) => (vec!["go", "gofmt", "golangci-lint"], vec!["prefer-explicit-errors"]),
        ("PythonExpert", _) => (vec!["pytest", "ruff", "mypy"], vec!["prefer-type-hints"]),
        ("TSExpert", _) => (vec!["tsc", "eslint", "prettier"], vec!["prefer-strict-mode"]),
        ("SecurityAuditor", _) => (vec!["semgrep", "grep"], vec!["prefer-conservative-fixes"]),
        ("TestArchitect", _) => (vec!["test-runner"], vec!["prefer-realistic-coverage"]),
        (_, _) => (vec!["grep", "read-file"], vec![]),
    }
}

/// Recommend specialist agents for `profile`. Always includes the
/// security and testing generalists; adds a language expert, an
/// optional framework expert, and dependency-keyword experts.
pub fn recommend(profile: &ProjectProfile) -> Vec<RecommendedAgent> {
    let mut agents = Vec::new();

    agents.push(agent(
        "SecurityAuditor",
        &[Permission::ReadCode, Permission::RunShell],
        &["vulnerabilities", "secrets", "dependency-risk"],
        "always included to review every change for security issues",
        90,
        &tools_and_preferences("SecurityAuditor", &profile.language).0,
        &tools_and_preferences("SecurityAuditor", &profile.language).1,
    ));
    agents.push(agent(
        "TestArchitect",
        &[Permission::ReadCode, Permission::RunTests],
        &["test-coverage", "test-design"],
        "always included to keep the test suite honest",
        85,
        &tools_and_preferences("TestArchitect", &profile.language).0,
        &tools_and_preferences("TestArchitect", &profile.language).1,
    ));

    if let Some(name) = language_expert(&profile.language) {
        let (tools, prefs) = tools_and_preferences(name, &profile.language);
        agents.push(agent(
            name,
            &[Permission::ReadCode, Permission::WriteCode, Permission::RunTests],
            &[profile.language.as_str()],
            "primary language detected in the workspace",
            100,
            &tools,
            &prefs,
        ));
    }

    if let Some((name, priority)) = framework_expert(profile.framework.as_deref()) {
        agents.push(agent(
            name,
            &[Permission::ReadCode, Permission::WriteCode],
            &[profile.framework.as_deref().unwrap_or("")],
            "framework detected in the workspace",
            priority,
            &tools_and_preferences(name, &profile.language).0,
            &tools_and_preferences(name, &profile.language).1,
        ));
    }

    for dep in &profile.dependencies {
        if let Some((name, priority, topic)) = dependency_expert(&dep.name) {
            if !agents.iter().any(|a| a.name == name) {
                agents.push(agent(
                    name,
                    &[Permission::ReadCode, Permission::WriteCode],
                    &[topic],
                    "dependency keyword match",
                    priority,
                    &tools_and_preferences(name, &profile.language).0,
                    &tools_and_preferences(name, &profile.language).1,
                ));
            }
        }
    }

    agents
}

fn language_expert(language: &str) -> Option<&'static str> {
    match language {
        "rust" => Some("RustExpert"),
        "go" => Some("GoExpert"),
        "python" => Some("PythonExpert"),
        "node" | "typescript" | "javascript" => Some("TSExpert"),
        _ => None,
    }
}

fn framework_expert(framework: Option<&str>) -> Option<(&'static str, u8)> {
    match framework {
        Some(fw) if fw.eq_ignore_ascii_case("axum") || fw.eq_ignore_ascii_case("express") => {
            Some(("WebApiExpert", 85))
        }
        Some(fw) if fw.eq_ignore_ascii_case("react") || fw.eq_ignore_ascii_case("leptos") => {
            Some(("FrontendExpert", 82))
        }
        Some(fw) if fw.eq_ignore_ascii_case("ratatui") || fw.eq_ignore_ascii_case("bubbletea") => {
            Some(("TUIExpert", 80))
        }
        _ => None,
    }
}

fn dependency_expert(dep_name: &str) -> Option<(&'static str, u8, &'static str)> {
    let lower = dep_name.to_ascii_lowercase();
    if lower.contains("playwright") || lower.contains("puppeteer") || lower.contains("selenium") {
        Some(("BrowserAutomationExpert", 80, "browser-automation"))
    } else if lower.contains("datalog") || lower.contains("mangle") || lower.contains("prolog") {
        Some(("LogicProgrammingExpert", 75, "logic-programming"))
    } else if lower.contains("openai") || lower.contains("anthropic") || lower.contains("langchain") {
        Some(("LlmIntegrationExpert", 95, "llm-integration"))
    } else if lower.contains("diesel") || lower.contains("sqlalchemy") || lower.contains("prisma") || lower.contains("typeorm") {
        Some(("OrmExpert", 78, "orm"))
    } else if lower.contains("clap") || lower.contains("click") || lower.contains("cobra") || lower.contains("commander") {
        Some(("CliFrameworkExpert", 76, "cli-framework"))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use nerd_core::types::ProjectType;

    fn base_profile(language: &str) -> ProjectProfile {
        ProjectProfile {
            project_id: "id".into(),
            name: "proj".into(),
            description: String::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            language: language.into(),
            framework: None,
            build_system: None,
            architecture: None,
            patterns: Vec::new(),
            dependencies: Vec::new(),
            entry_points: Vec::new(),
            test_directories: Vec::new(),
            config_files: Vec::new(),
            file_count: 0,
            directory_count: 0,
            build_system_info: None,
            project_type: ProjectType::Unknown,
        }
    }

    #[test]
    fn always_recommends_security_and_test_generalists() {
        let profile = base_profile("unknown");
        let agents = recommend(&profile);
        assert!(agents.iter().any(|a| a.name == "SecurityAuditor" && a.priority == 90));
        assert!(agents.iter().any(|a| a.name == "TestArchitect" && a.priority == 85));
    }

    #[test]
    fn recommends_language_expert_at_top_priority() {
        let profile = base_profile("rust");
        let agents = recommend(&profile);
        let rust_expert = agents.iter().find(|a| a.name == "RustExpert").unwrap();
        assert_eq!(rust_expert.priority, 100);
    }

    #[test]
    fn recommends_dependency_expert_once_per_keyword_group() {
        let mut profile = base_profile("node");
        profile.dependencies = vec![
            nerd_core::types::Dependency {
                name: "langchain".into(),
                version: "1.0".into(),
                major_version: Some("1".into()),
                kind: nerd_core::types::DependencyKind::Direct,
            },
            nerd_core::types::Dependency {
                name: "openai".into(),
                version: "2.0".into(),
                major_version: Some("2".into()),
                kind: nerd_core::types::DependencyKind::Direct,
            },
        ];
        let agents = recommend(&profile);
        assert_eq!(agents.iter().filter(|a| a.name == "LlmIntegrationExpert").count(), 1);
    }

    #[test]
    fn no_framework_match_adds_no_framework_expert() {
        let profile = base_profile("rust");
        let agents = recommend(&profile);
        assert!(!agents.iter().any(|a| a.name == "WebApiExpert"));
    }
}
