//! `nerd init` subcommand: wires `nerd_init::InitOrchestrator` to a
//! workspace path and prints progress as it streams in.

use std::sync::Arc;

use anyhow::Result;
use nerd_core::config::Config;
use nerd_harness::StubCompleter;
use nerd_init::{channel, InitOrchestrator};

pub async fn run(config: &Config, workspace: &str, json: bool) -> Result<()> {
    let (tx, mut rx) = channel(64);
    let orchestrator = InitOrchestrator::new(workspace, config.init.clone(), Arc::new(StubCompleter), tx);

    let handle = tokio::spawn(async move { orchestrator.run().await });

    while let Some(progress) = rx.recv().await {
        if json {
            println!("{}", serde_json::to_string(&progress_as_value(&progress))?);
        } else {
            println!(
                "[{:>2}/{:<2}] {:<16} {}",
                progress.current_phase_no, progress.total_phases, progress.phase, progress.message
            );
        }
    }

    let result = handle.await??;
    if !result.success {
        anyhow::bail!("init did not complete successfully: {:?}", result.warnings);
    }
    if !result.warnings.is_empty() {
        for warning in &result.warnings {
            eprintln!("warning: {warning}");
        }
    }
    println!(
        "workspace initialised at {} ({} agents)",
        result.workspace_root.display(),
        result.agent_count
    );
    Ok(())
}

fn progress_as_value(progress: &nerd_init::InitProgress) -> serde_json::Value {
    serde_json::json!({
        "phase": progress.phase,
        "message": progress.message,
        "percent": progress.percent,
        "current_phase_no": progress.current_phase_no,
        "total_phases": progress.total_phases,
    })
}
