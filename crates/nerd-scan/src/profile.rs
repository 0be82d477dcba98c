//! Turns scanner output plus targeted manifest reads into a
//! [`ProjectProfile`] (C7, spec.md §4.7).

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use nerd_core::types::{BuildSystemInfo, Dependency, DependencyKind, ProjectProfile, ProjectType};

use crate::scanner::{Fact, ScanSummary};

/// Build-system detectors in priority order: first match wins. Each
/// entry is `(marker_file, name)`; monorepo tools outrank
/// language-agnostic ones, which outrank language-specific ones, which
/// outrank generic make/task runners.
const BUILD_SYSTEM_PRIORITY: &[(&str, &str)] = &[
    ("nx.json", "nx"),
    ("turbo.json", "turborepo"),
    ("lerna.json", "lerna"),
    ("pnpm-workspace.yaml", "pnpm-workspace"),
    ("Cargo.toml", "cargo"),
    ("go.mod", "go-modules"),
    ("pyproject.toml", "poetry-or-pep517"),
    ("pom.xml", "maven"),
    ("build.gradle", "gradle"),
    ("build.gradle.kts", "gradle"),
    ("package.json", "npm"),
    ("Makefile", "make"),
    ("Taskfile.yml", "task"),
    ("justfile", "just"),
];

/// Normalises a version range expression to its leading numeric run,
/// stripping `^`, `~`, `>=`, `<=`, `<`, `>`, `=`, and a leading `v`.
pub fn major_version(raw: &str) -> Option<String> {
    let trimmed = raw
        .trim()
        .trim_start_matches(['^', '~', '=', '<', '>'])
        .trim_start_matches('=')
        .trim_start_matches('v')
        .trim();
    let leading_digits: String = trimmed.chars().take_while(|c| c.is_ascii_digit()).collect();
    if leading_digits.is_empty() {
        None
    } else {
        Some(leading_digits)
    }
}

pub struct ProfileBuilder<'a> {
    workspace_root: &'a Path,
    scan: &'a ScanSummary,
}

impl<'a> ProfileBuilder<'a> {
    pub fn new(workspace_root: &'a Path, scan: &'a ScanSummary) -> Self {
        Self { workspace_root, scan }
    }

    /// Build the project profile, stamping identity timestamps with `now`.
    pub fn build(&self, now: DateTime<Utc>) -> ProjectProfile {
        let config_files = self.config_files();
        let language = self.primary_language(&config_files);
        let dependencies = self.dependencies(&language);
        let build_system_info = self.build_system_info();
        let entry_points = self.entry_points(&language);
        let test_directories = self.test_directories();
        let project_type = self.project_type(&language, &config_files);

        let workspace_root = self.workspace_root.to_string_lossy().to_string();
        ProjectProfile {
            project_id: ProjectProfile::derive_project_id(&workspace_root, now),
            name: self
                .workspace_root
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "workspace".to_string()),
            description: String::new(),
            created_at: now,
            updated_at: now,
            language: language.clone().unwrap_or_else(|| "unknown".to_string()),
            framework: None,
            build_system: build_system_info.as_ref().map(|b| b.name.clone()),
            architecture: None,
            patterns: Vec::new(),
            dependencies,
            entry_points,
            test_directories,
            config_files: config_files.iter().map(|(path, _)| path.clone()).collect(),
            file_count: self.scan.file_count,
            directory_count: self.scan.directory_count,
            build_system_info,
            project_type,
        }
    }

    fn config_files(&self) -> Vec<(String, String)> {
        self.scan
            .facts
            .iter()
            .filter_map(|f| match f {
                Fact::ConfigDetected { path, kind } => Some((path.clone(), kind.clone())),
                _ => None,
            })
            .collect()
    }

    /// Picks the manifest kind with the highest occurrence count,
    /// preferring shallower matches when counts tie (root first, then
    /// one level deep, then two).
    fn primary_language(&self, config_files: &[(String, String)]) -> Option<String> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        let mut shallowest: HashMap<&str, usize> = HashMap::new();
        for (path, kind) in config_files {
            *counts.entry(kind.as_str()).or_insert(0) += 1;
            let depth = path.matches('/').count();
            shallowest
                .entry(kind.as_str())
                .and_modify(|d| *d = (*d).min(depth))
                .or_insert(depth);
        }
        counts
            .into_iter()
            .max_by(|(ka, ca), (kb, cb)| {
                ca.cmp(cb).then_with(|| {
                    shallowest[kb].cmp(&shallowest[ka])
                })
            })
            .map(|(kind, _)| kind.to_string())
    }

    /// Dependency extraction for the primary manifest's ecosystem. Rust
    /// and Node manifests are parsed structurally; other ecosystems
    /// contribute only what the scanner already detected as config
    /// files, with an empty dependency list (graceful degradation --
    /// full per-ecosystem lockfile parsing is out of scope).
    fn dependencies(&self, language: &Option<String>) -> Vec<Dependency> {
        match language.as_deref() {
            Some("rust") => self.rust_dependencies(),
            Some("node") => self.node_dependencies(),
            _ => Vec::new(),
        }
    }

    fn rust_dependencies(&self) -> Vec<Dependency> {
        let manifest_path = self.workspace_root.join("Cargo.toml");
        let Ok(text) = std::fs::read_to_string(&manifest_path) else {
            return Vec::new();
        };
        let Ok(doc) = text.parse::<toml::Value>() else {
            return Vec::new();
        };

        let mut deps = Vec::new();
        for (table_name, kind) in [("dependencies", DependencyKind::Direct), ("dev-dependencies", DependencyKind::Dev)] {
            if let Some(table) = doc.get(table_name).and_then(|v| v.as_table()) {
                for (name, spec) in table {
                    let version = dependency_spec_version(spec);
                    deps.push(Dependency {
                        name: name.clone(),
                        major_version: major_version(&version),
                        version,
                        kind,
                    });
                }
            }
        }

        let lock_path = self.workspace_root.join("Cargo.lock");
        if let Ok(lock_text) = std::fs::read_to_string(&lock_path) {
            if let Ok(lock_doc) = lock_text.parse::<toml::Value>() {
                if let Some(packages) = lock_doc.get("package").and_then(|v| v.as_array()) {
                    let direct: std::collections::HashSet<&str> =
                        deps.iter().map(|d| d.name.as_str()).collect();
                    for pkg in packages {
                        let Some(name) = pkg.get("name").and_then(|v| v.as_str()) else {
                            continue;
                        };
                        if direct.contains(name) {
                            continue;
                        }
                        let version = pkg
                            .get("version")
                            .and_then(|v| v.as_str())
                            .unwrap_or("")
                            .to_string();
                        deps.push(Dependency {
                            name: name.to_string(),
                            major_version: major_version(&version),
                            version,
                            kind: DependencyKind::Transitive,
                        });
                    }
                }
            }
        }
        deps
    }

    fn node_dependencies(&self) -> Vec<Dependency> {
        let manifest_path = self.workspace_root.join("package.json");
        let Ok(text) = std::fs::read_to_string(&manifest_path) else {
            return Vec::new();
        };
        let Ok(doc) = serde_json::from_str::<serde_json::Value>(&text) else {
            return Vec::new();
        };

        let mut deps = Vec::new();
        for (field, kind) in [("dependencies", DependencyKind::Direct), ("devDependencies", DependencyKind::Dev)] {
            if let Some(obj) = doc.get(field).and_then(|v| v.as_object()) {
                for (name, version) in obj {
                    let version = version.as_str().unwrap_or("").to_string();
                    deps.push(Dependency {
                        name: name.clone(),
                        major_version: major_version(&version),
                        version,
                        kind,
                    });
                }
            }
        }
        deps
    }

    fn build_system_info(&self) -> Option<BuildSystemInfo> {
        let scanned: std::collections::HashSet<&str> = self
            .scan
            .facts
            .iter()
            .filter_map(|f| match f {
                Fact::FileTopology { path, .. } => path.rsplit('/').next(),
                _ => None,
            })
            .collect();

        for (marker, name) in BUILD_SYSTEM_PRIORITY {
            if scanned.contains(marker) {
                return Some(BuildSystemInfo {
                    name: name.to_string(),
                    config_file: marker.to_string(),
                });
            }
        }
        None
    }

    fn entry_points(&self, language: &Option<String>) -> Vec<String> {
        let candidates: &[&str] = match language.as_deref() {
            Some("rust") => &["src/main.rs"],
            Some("go") => &["main.go", "cmd/main.go"],
            Some("python") => &["main.py", "__main__.py", "app.py"],
            Some("node") => &["index.js", "src/index.ts", "src/index.js"],
            _ => &[],
        };

        candidates
            .iter()
            .filter(|c| self.workspace_root.join(c).exists())
            .map(|c| c.to_string())
            .collect()
    }

    fn test_directories(&self) -> Vec<String> {
        const NAMES: &[&str] = &["tests", "test", "__tests__", "spec"];
        self.scan
            .facts
            .iter()
            .filter_map(|f| match f {
                Fact::FileTopology {
                    path,
                    classification: crate::scanner::Classification::Directory,
                } => {
                    let leaf = path.rsplit('/').next().unwrap_or(path);
                    NAMES.contains(&leaf).then(|| path.clone())
                }
                _ => None,
            })
            .collect()
    }

    /// Accumulates application-like and library-like indicator points
    /// and classifies by ratio: application-heavy, library-heavy,
    /// balanced (hybrid), or no signal (unknown).
    fn project_type(&self, language: &Option<String>, config_files: &[(String, String)]) -> ProjectType {
        let mut application_points = 0i32;
        let mut library_points = 0i32;

        if matches!(language.as_deref(), Some("node")) {
            if let Ok(text) = std::fs::read_to_string(self.workspace_root.join("package.json")) {
                if let Ok(doc) = serde_json::from_str::<serde_json::Value>(&text) {
                    if doc.get("main").is_some() || doc.get("exports").is_some() {
                        library_points += 2;
                    }
                    if doc
                        .get("scripts")
                        .and_then(|s| s.get("start"))
                        .is_some()
                    {
                        application_points += 2;
                    }
                    if doc.get("bin").is_some() {
                        application_points += 1;
                    }
                }
            }
        }

        let has_dir = |name: &str| {
            self.scan.facts.iter().any(|f| matches!(
                f,
                Fact::FileTopology { path, classification: crate::scanner::Classification::Directory }
                    if path.split('/').next() == Some(name)
            ))
        };
        if has_dir("cmd") {
            application_points += 2;
        }
        if has_dir("pkg") {
            library_points += 2;
        }
        if self.workspace_root.join("Dockerfile").exists() {
            application_points += 1;
        }
        if config_files.iter().any(|(_, kind)| kind == "rust")
            && self
                .scan
                .facts
                .iter()
                .any(|f| matches!(f, Fact::FileTopology { path, .. } if path == "src/main.rs"))
        {
            application_points += 2;
        }
        if config_files.iter().any(|(_, kind)| kind == "rust")
            && self
                .scan
                .facts
                .iter()
                .any(|f| matches!(f, Fact::FileTopology { path, .. } if path == "src/lib.rs"))
        {
            library_points += 2;
        }

        match (application_points, library_points) {
            (0, 0) => ProjectType::Unknown,
            (a, l) if a > 0 && l > 0 && (a - l).abs() <= 1 => ProjectType::Hybrid,
            (a, l) if a >= l => ProjectType::Application,
            _ => ProjectType::Library,
        }
    }
}

fn dependency_spec_version(spec: &toml::Value) -> String {
    match spec {
        toml::Value::String(s) => s.clone(),
        toml::Value::Table(t) => t
            .get("version")
            .and_then(|v| v.as_str())
            .unwrap_or("*")
            .to_string(),
        _ => "*".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::scan;

    #[test]
    fn major_version_strips_range_operators() {
        assert_eq!(major_version("^1.2.3").as_deref(), Some("1"));
        assert_eq!(major_version("~2.0").as_deref(), Some("2"));
        assert_eq!(major_version(">=3.1.0").as_deref(), Some("3"));
        assert_eq!(major_version("v4.0.0").as_deref(), Some("4"));
        assert_eq!(major_version("*"), None);
    }

    #[test]
    fn rust_project_detected_with_dependencies() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("Cargo.toml"),
            "[package]\nname=\"x\"\n[dependencies]\nserde = \"1.0\"\n",
        )
        .unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src").join("main.rs"), "fn main() {}").unwrap();

        let summary = scan(dir.path(), &[], 24).unwrap();
        let profile = ProfileBuilder::new(dir.path(), &summary).build(Utc::now());

        assert_eq!(profile.language, "rust");
        assert_eq!(profile.build_system.as_deref(), Some("cargo"));
        assert!(profile.dependencies.iter().any(|d| d.name == "serde"));
        assert_eq!(profile.entry_points, vec!["src/main.rs".to_string()]);
        assert_eq!(profile.project_type, ProjectType::Application);
    }

    #[test]
    fn project_id_is_deterministic_for_same_inputs() {
        let now = Utc::now();
        let a = ProjectProfile::derive_project_id("/tmp/proj", now);
        let b = ProjectProfile::derive_project_id("/tmp/proj", now);
        assert_eq!(a, b);
        let c = ProjectProfile::derive_project_id("/tmp/other", now);
        assert_ne!(a, c);
    }
}
