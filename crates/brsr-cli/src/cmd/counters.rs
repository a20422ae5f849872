use super::load_config;
use crate::output::{print_json, print_table};
use anyhow::Context;
use brsr_core::config::StorageBackend;
use brsr_core::progress::ProgressCounters;
use brsr_core::scope::Scope;
use clap::{Args, Subcommand};
use std::path::Path;

#[derive(Args, Debug)]
pub struct ScopeArgs {
    /// Company id
    #[arg(long)]
    company: String,
    /// Plant id
    #[arg(long)]
    plant: String,
    /// Financial year, e.g. 2024-2025
    #[arg(long = "year")]
    financial_year: String,
}

impl ScopeArgs {
    fn scope(&self) -> anyhow::Result<Scope> {
        Ok(Scope::new(
            self.company.clone(),
            self.plant.clone(),
            &self.financial_year,
        )?)
    }
}

#[derive(Subcommand, Debug)]
pub enum CountersSubcommand {
    /// Print the stored counters
    Show {
        #[command(flatten)]
        scope: ScopeArgs,
    },
    /// Recompute counters from the stored answers and overwrite them
    Repair {
        #[command(flatten)]
        scope: ScopeArgs,
    },
}

pub fn run(config_path: &Path, subcmd: CountersSubcommand, json: bool) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    if config.storage.backend == StorageBackend::Memory {
        anyhow::bail!("counters need a persistent store; storage.backend is memory");
    }
    let service = config.build_service()?;
    let rt = tokio::runtime::Runtime::new()?;

    let progress = match subcmd {
        CountersSubcommand::Show { scope } => {
            let scope = scope.scope()?;
            rt.block_on(service.get_progress(&scope))
                .with_context(|| format!("no counters for {scope}"))?
        }
        CountersSubcommand::Repair { scope } => {
            let scope = scope.scope()?;
            rt.block_on(service.repair_counters(&scope))
                .with_context(|| format!("failed to repair counters for {scope}"))?
        }
    };

    print_progress(&progress, json)
}

fn print_progress(progress: &ProgressCounters, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(&serde_json::json!({
            "scope": progress.scope,
            "updated_at": progress.updated_at,
            "progress": progress.tree(),
        }));
    }
    println!("Progress for {}", progress.scope);
    let rows = progress
        .counters
        .iter()
        .map(|(path, tally)| {
            vec![
                path.clone(),
                tally.answered_questions.to_string(),
                tally.total_questions.to_string(),
            ]
        })
        .collect();
    print_table(&["COUNTER", "ANSWERED", "TOTAL"], rows);
    Ok(())
}
