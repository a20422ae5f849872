use super::load_config;
use crate::output::{print_json, print_table};
use anyhow::Context;
use brsr_core::catalog::{snake_key, Catalog};
use brsr_core::resolver::{PathResolver, QuestionKind};
use clap::Subcommand;
use std::path::{Path, PathBuf};

#[derive(Subcommand, Debug)]
pub enum CatalogSubcommand {
    /// Load a catalog and check its composite and path rules
    Validate {
        /// Catalog YAML (defaults to catalog.path from config, else built-in)
        path: Option<PathBuf>,
    },
    /// Resolve one question id to its kind, path and subcomponents
    Show { question_id: String },
    /// List questions, optionally for one module
    List {
        /// Module name or key, e.g. "Workforce"
        #[arg(long)]
        module: Option<String>,
    },
}

pub fn run(config_path: &Path, subcmd: CatalogSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        CatalogSubcommand::Validate { path } => validate(config_path, path, json),
        CatalogSubcommand::Show { question_id } => {
            show(&load_catalog(config_path)?, &question_id, json)
        }
        CatalogSubcommand::List { module } => {
            list(&load_catalog(config_path)?, module.as_deref(), json)
        }
    }
}

fn load_catalog(config_path: &Path) -> anyhow::Result<Catalog> {
    let config = load_config(config_path)?;
    config.load_catalog().context("failed to load catalog")
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

fn validate(config_path: &Path, path: Option<PathBuf>, json: bool) -> anyhow::Result<()> {
    let catalog = match &path {
        Some(p) => Catalog::load(p).with_context(|| format!("invalid catalog {}", p.display()))?,
        None => load_catalog(config_path)?,
    };
    let composites = catalog.questions().filter(|q| q.is_composite()).count();
    let leaves = catalog.leaves().count();

    if json {
        print_json(&serde_json::json!({
            "valid": true,
            "name": catalog.name(),
            "version": catalog.version(),
            "questions": catalog.len(),
            "composites": composites,
            "leaves": leaves,
            "modules": catalog.module_keys(),
        }))
    } else {
        println!(
            "Catalog {} v{} is valid: {} questions ({} composite, {} leaves) in {} modules.",
            catalog.name().unwrap_or("(unnamed)"),
            catalog.version(),
            catalog.len(),
            composites,
            leaves,
            catalog.module_keys().len()
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// show
// ---------------------------------------------------------------------------

fn show(catalog: &Catalog, question_id: &str, json: bool) -> anyhow::Result<()> {
    let resolution = PathResolver::new(catalog).resolve(question_id)?;
    let q = catalog.descriptor(question_id)?;

    if json {
        return print_json(&serde_json::json!({
            "resolution": resolution,
            "question": q,
            "value_type": catalog.value_kind(q),
        }));
    }

    let kind = match resolution.kind {
        QuestionKind::Atomic => "atomic",
        QuestionKind::Composite => "composite",
    };
    println!("{} ({kind})", resolution.question_id);
    println!("  description: {}", q.description);
    println!("  module:      {} / {}", q.module, q.sub_module);
    println!("  path:        {}", resolution.path.as_str());
    if resolution.subcomponents.is_empty() {
        println!("  value type:  {}", catalog.value_kind(q).as_str());
    } else {
        let rows = resolution
            .subcomponents
            .iter()
            .map(|s| vec![s.id.clone(), s.keys.join(".")])
            .collect();
        println!();
        print_table(&["SUBCOMPONENT", "KEYS"], rows);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// list
// ---------------------------------------------------------------------------

fn list(catalog: &Catalog, module: Option<&str>, json: bool) -> anyhow::Result<()> {
    let questions: Vec<_> = match module {
        Some(m) => {
            let key = snake_key(m);
            if !catalog.module_keys().contains(&key) {
                anyhow::bail!("unknown module '{m}'");
            }
            catalog
                .questions()
                .filter(|q| q.module_key() == key)
                .collect()
        }
        None => catalog.questions().collect(),
    };

    if json {
        return print_json(&questions);
    }

    let rows = questions
        .iter()
        .map(|q| {
            vec![
                q.id.clone(),
                if q.is_composite() { "composite" } else { "atomic" }.to_string(),
                q.module.clone(),
                q.sub_module.clone(),
                q.value_path().as_str().to_string(),
            ]
        })
        .collect();
    print_table(&["ID", "KIND", "MODULE", "SUB-MODULE", "PATH"], rows);
    Ok(())
}
