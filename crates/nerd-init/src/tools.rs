//! Tool descriptor generation (phase 16, spec.md §4.10 "tool
//! generation"): writes `tools/available_tools.json`, one entry per
//! tool named across all recommended agents plus the core shards.

use std::collections::BTreeSet;
use std::path::Path;

use nerd_scan::RecommendedAgent;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
}

fn describe(name: &str) -> String {
    match name {
        "cargo" => "Build, test, and manage Rust crates.",
        "clippy" => "Lint Rust code for common mistakes and style issues.",
        "rustfmt" => "Format Rust source code.",
        "go" => "Build, test, and manage Go modules.",
        "gofmt" => "Format Go source code.",
        "golangci-lint" => "Lint Go code with an aggregated linter set.",
        "pytest" => "Run Python test suites.",
        "ruff" => "Lint and format Python code.",
        "mypy" => "Type-check Python code.",
        "tsc" => "Type-check TypeScript code.",
        "eslint" => "Lint JavaScript/TypeScript code.",
        "prettier" => "Format JavaScript/TypeScript code.",
        "semgrep" => "Run static security pattern checks.",
        "grep" => "Search file contents by pattern.",
        "read-file" => "Read the contents of a file.",
        "test-runner" => "Execute the project's configured test suite.",
        other => return format!("{other} tool."),
    }
    .to_string()
}

/// Collects the union of every tool named by `agents`, plus the fixed
/// shell tools the core shards always get, into a sorted descriptor list.
pub fn collect_tool_descriptors(agents: &[RecommendedAgent]) -> Vec<ToolDescriptor> {
    let mut names: BTreeSet<String> = agents.iter().flat_map(|a| a.tools.iter().cloned()).collect();
    names.insert("grep".to_string());
    names.insert("read-file".to_string());

    names
        .into_iter()
        .map(|name| {
            let description = describe(&name);
            ToolDescriptor { name, description }
        })
        .collect()
}

pub fn write_available_tools(
    tools_dir: &Path,
    descriptors: &[ToolDescriptor],
) -> std::io::Result<()> {
    let path = tools_dir.join("available_tools.json");
    let body = serde_json::to_string_pretty(descriptors)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    std::fs::write(path, body)
}
