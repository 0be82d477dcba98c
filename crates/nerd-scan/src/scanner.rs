//! Bounded-fanout filesystem walk emitting a fact stream (C6, spec.md §4.6).
//!
//! Grounded on `at-core/context_engine.rs`'s manual `std::fs::read_dir`
//! recursion — the teacher never reaches for `walkdir`, so neither do we.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    File,
    Directory,
}

impl Classification {
    pub fn as_predicate_arg(self) -> &'static str {
        match self {
            Classification::File => "/file",
            Classification::Directory => "/directory",
        }
    }
}

/// One emitted observation. The scanner stays agnostic of Mangle
/// rendering; `nerd-init`'s facts phase turns these into `.mg` text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Fact {
    FileTopology { path: String, classification: Classification },
    ConfigDetected { path: String, kind: String },
    LanguageHint { path: String, language: String },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanSummary {
    pub file_count: usize,
    pub directory_count: usize,
    pub facts: Vec<Fact>,
}

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Known manifest/config files and the ecosystem they signal.
const CONFIG_FILES: &[(&str, &str)] = &[
    ("go.mod", "go"),
    ("package.json", "node"),
    ("Cargo.toml", "rust"),
    ("pyproject.toml", "python"),
    ("requirements.txt", "python"),
    ("Pipfile", "python"),
    ("pom.xml", "java"),
    ("build.gradle", "java"),
    ("build.gradle.kts", "java"),
    ("composer.json", "php"),
    ("Gemfile", "ruby"),
    ("mix.exs", "elixir"),
    ("CMakeLists.txt", "cpp"),
];

/// Extension → language inference table.
const LANGUAGE_EXTENSIONS: &[(&str, &str)] = &[
    ("rs", "rust"),
    ("go", "go"),
    ("py", "python"),
    ("ts", "typescript"),
    ("tsx", "typescript"),
    ("js", "javascript"),
    ("jsx", "javascript"),
    ("java", "java"),
    ("kt", "kotlin"),
    ("rb", "ruby"),
    ("php", "php"),
    ("c", "c"),
    ("h", "c"),
    ("cpp", "cpp"),
    ("cc", "cpp"),
    ("hpp", "cpp"),
    ("cs", "csharp"),
    ("ex", "elixir"),
    ("exs", "elixir"),
    ("swift", "swift"),
];

/// Walk `root`, skipping any directory whose name appears in `skip_dirs`
/// and stopping descent past `max_depth`. The whole tree is otherwise
/// walked unconditionally.
pub fn scan(root: &Path, skip_dirs: &[String], max_depth: usize) -> Result<ScanSummary, ScanError> {
    let mut summary = ScanSummary::default();
    walk(root, root, skip_dirs, max_depth, 0, &mut summary)?;
    Ok(summary)
}

fn walk(
    root: &Path,
    dir: &Path,
    skip_dirs: &[String],
    max_depth: usize,
    depth: usize,
    summary: &mut ScanSummary,
) -> Result<(), ScanError> {
    if depth > max_depth {
        return Ok(());
    }

    let entries = std::fs::read_dir(dir).map_err(|source| ScanError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    for entry in entries {
        let entry = entry.map_err(|source| ScanError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        let name = entry.file_name();
        let name = name.to_string_lossy();

        let file_type = entry.file_type().map_err(|source| ScanError::Io {
            path: path.clone(),
            source,
        })?;

        if file_type.is_dir() {
            if skip_dirs.iter().any(|skip| skip == name.as_ref()) {
                continue;
            }
            summary.directory_count += 1;
            summary.facts.push(Fact::FileTopology {
                path: relative(root, &path),
                classification: Classification::Directory,
            });
            walk(root, &path, skip_dirs, max_depth, depth + 1, summary)?;
        } else if file_type.is_file() {
            summary.file_count += 1;
            let rel = relative(root, &path);
            summary.facts.push(Fact::FileTopology {
                path: rel.clone(),
                classification: Classification::File,
            });

            if let Some(kind) = CONFIG_FILES
                .iter()
                .find(|(fname, _)| *fname == name.as_ref())
                .map(|(_, kind)| *kind)
            {
                summary.facts.push(Fact::ConfigDetected {
                    path: rel.clone(),
                    kind: kind.to_string(),
                });
            }

            if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
                if let Some(language) = LANGUAGE_EXTENSIONS
                    .iter()
                    .find(|(e, _)| *e == ext)
                    .map(|(_, lang)| *lang)
                {
                    summary.facts.push(Fact::LanguageHint {
                        path: rel,
                        language: language.to_string(),
                    });
                }
            }
        }
    }

    Ok(())
}

fn relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}
