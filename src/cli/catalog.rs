use std::path::PathBuf;

use anyhow::anyhow;
use clap::{Args, Subcommand};

use crate::catalog::dichotomous::DichotomousKey;
use crate::catalog::multi_access::MultiAccessKey;
use crate::catalog::store::KeyCatalog;
use crate::cli::{load_catalog, OutputFormat};
use crate::core::types::{CharacterKind, KeyId};
use crate::matching::navigator::DEFAULT_START_KEY;
use crate::utils::validation::validate_key_id;

#[derive(Args)]
pub struct CatalogArgs {
    #[command(subcommand)]
    pub command: CatalogCommands,
}

#[derive(Subcommand)]
pub enum CatalogCommands {
    /// List all keys in the catalog
    List {
        /// Catalog to load: a bundle, a key file, or a directory (defaults to embedded)
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Dichotomous key listed first
        #[arg(long, default_value = DEFAULT_START_KEY)]
        start: String,
    },

    /// Show details of a specific key
    Show {
        /// Key ID
        #[arg(required = true)]
        id: String,

        /// Catalog to load: a bundle, a key file, or a directory (defaults to embedded)
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Show every taxon, state, lead and item
        #[arg(long)]
        all: bool,
    },

    /// Summarize the structure of multi-access keys
    Analyze {
        /// Key ID (all multi-access keys when omitted)
        id: Option<String>,

        /// Catalog to load: a bundle, a key file, or a directory (defaults to embedded)
        #[arg(long)]
        catalog: Option<PathBuf>,
    },

    /// Export the catalog to a bundle file
    Export {
        /// Output file path
        #[arg(required = true)]
        output: PathBuf,

        /// Catalog to export (defaults to embedded)
        #[arg(long)]
        catalog: Option<PathBuf>,
    },
}

/// Execute catalog subcommand
///
/// # Errors
///
/// Returns an error if the catalog cannot be loaded, a requested key does not exist,
/// or output cannot be written.
pub fn run(args: CatalogArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    match args.command {
        CatalogCommands::List { catalog, start } => run_list(catalog, &start, format, verbose),
        CatalogCommands::Show { id, catalog, all } => run_show(&id, catalog, all, format, verbose),
        CatalogCommands::Analyze { id, catalog } => {
            run_analyze(id.as_deref(), catalog, format, verbose)
        }
        CatalogCommands::Export { output, catalog } => run_export(output, catalog, verbose),
    }
}

fn run_list(
    catalog_path: Option<PathBuf>,
    start: &str,
    format: OutputFormat,
    verbose: bool,
) -> anyhow::Result<()> {
    let catalog = load_catalog(catalog_path.as_deref(), verbose)?;
    let multi = catalog.list_multi_keys();
    let dichotomous = catalog.list_dichotomous_keys(&KeyId::new(start));

    match format {
        OutputFormat::Text => {
            let id_width = multi
                .iter()
                .map(|k| k.id.as_str().len())
                .chain(dichotomous.iter().map(|k| k.id.as_str().len()))
                .max()
                .unwrap_or(2)
                .max(2);
            let title_width = multi
                .iter()
                .map(|k| k.title.len().min(45))
                .chain(dichotomous.iter().map(|k| k.title.len().min(45)))
                .max()
                .unwrap_or(5)
                .max(5);

            println!("Multi-access keys ({})\n", multi.len());
            println!(
                "{:<id_w$} {:<title_w$} {:>6} {:>10}",
                "ID",
                "Title",
                "Taxa",
                "Characters",
                id_w = id_width,
                title_w = title_width
            );
            println!("{}", "-".repeat(id_width + title_width + 19));
            for k in &multi {
                println!(
                    "{:<id_w$} {:<title_w$} {:>6} {:>10}",
                    k.id.as_str(),
                    truncate(&k.title, title_width),
                    k.taxa,
                    k.characters,
                    id_w = id_width,
                    title_w = title_width
                );
            }

            println!("\nDichotomous keys ({})\n", dichotomous.len());
            println!(
                "{:<id_w$} {:<title_w$} {:>6} {:>10}",
                "ID",
                "Title",
                "Leads",
                "Items",
                id_w = id_width,
                title_w = title_width
            );
            println!("{}", "-".repeat(id_width + title_width + 19));
            for k in &dichotomous {
                println!(
                    "{:<id_w$} {:<title_w$} {:>6} {:>10}",
                    k.id.as_str(),
                    truncate(&k.title, title_width),
                    k.leads,
                    k.items,
                    id_w = id_width,
                    title_w = title_width
                );
                if verbose {
                    if let Some(scope) = &k.scope {
                        println!("  └─ Scope: {scope}");
                    }
                }
            }
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "multi_access": multi,
                "dichotomous": dichotomous,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

fn run_show(
    id: &str,
    catalog_path: Option<PathBuf>,
    all: bool,
    format: OutputFormat,
    verbose: bool,
) -> anyhow::Result<()> {
    let id = KeyId::new(validate_key_id(id)?);
    let catalog = load_catalog(catalog_path.as_deref(), verbose)?;

    if let Some(key) = catalog.multi_access(&id) {
        match format {
            OutputFormat::Text => print_multi_access(key, all),
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&key.to_raw())?);
            }
        }
        return Ok(());
    }

    if let Some(key) = catalog.dichotomous(&id) {
        match format {
            OutputFormat::Text => print_dichotomous(key, &catalog, all),
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&key.to_raw())?);
            }
        }
        return Ok(());
    }

    Err(anyhow!("Key '{id}' not found in catalog"))
}

fn print_multi_access(key: &MultiAccessKey, all: bool) {
    println!("Multi-access key: {}", key.title);
    println!("ID: {}", key.id);
    println!(
        "Taxa: {} ({} scored)",
        key.taxa().len(),
        key.scores().scored_count()
    );
    println!("Characters: {}", key.characters().len());

    println!("\nCharacters:");
    for character in key.characters() {
        let name = key.character_display_name(&character.id);
        match character.kind {
            CharacterKind::Grouping => println!("  {name} [grouping]"),
            CharacterKind::Numeric => println!("  {name} [numeric]"),
            CharacterKind::Discrete => {
                let states = key.states_of(&character.id);
                println!("  {name} [{} states]", states.len());
                if all {
                    for (i, state) in states.iter().enumerate() {
                        println!("    {}. {}", i + 1, state.name);
                    }
                }
            }
        }
    }

    if all {
        println!("\nTaxa:");
        for taxon in key.taxa() {
            match &taxon.url {
                Some(url) => println!("  {} ({})  {url}", taxon.name, taxon.id),
                None => println!("  {} ({})", taxon.name, taxon.id),
            }
        }
    }

    print_warnings(key.warnings().iter().map(ToString::to_string));
}

fn print_dichotomous(key: &DichotomousKey, catalog: &KeyCatalog, all: bool) {
    println!("Dichotomous key: {}", key.title);
    println!("ID: {}", key.id);
    if let Some(scope) = &key.scope {
        println!("Scope: {scope}");
    }
    println!("Root node: {}", key.root());
    println!("Leads: {}", key.leads().len());
    println!("Items: {}", key.items().len());

    let linked = key.linked_keys();
    if !linked.is_empty() {
        println!("\nLinks to keys:");
        for target in linked {
            match catalog.dichotomous(target) {
                Some(k) => println!("  {target}: {}", k.title),
                None => println!("  {target}: (not in catalog)"),
            }
        }
    }

    if all {
        println!("\nLeads:");
        for lead in key.leads() {
            let item = lead
                .item
                .as_ref()
                .and_then(|i| key.item(i))
                .map(|i| format!(" -> {}", i.name))
                .unwrap_or_default();
            println!("  {} (from {}): {}{item}", lead.id, lead.parent, lead.text);
        }
    }

    print_warnings(key.warnings().iter().map(ToString::to_string));
}

fn print_warnings(warnings: impl Iterator<Item = String>) {
    let warnings: Vec<String> = warnings.collect();
    if !warnings.is_empty() {
        println!("\nWarnings:");
        for warning in warnings {
            println!("  - {warning}");
        }
    }
}

fn run_analyze(
    id: Option<&str>,
    catalog_path: Option<PathBuf>,
    format: OutputFormat,
    verbose: bool,
) -> anyhow::Result<()> {
    let catalog = load_catalog(catalog_path.as_deref(), verbose)?;

    let keys: Vec<&MultiAccessKey> = match id {
        Some(id) => {
            let id = KeyId::new(validate_key_id(id)?);
            let key = catalog
                .multi_access(&id)
                .ok_or_else(|| anyhow!("Multi-access key '{id}' not found in catalog"))?;
            vec![key]
        }
        None => catalog.multi_access_keys().iter().collect(),
    };
    let analyses: Vec<_> = keys.iter().map(|k| k.analyze()).collect();

    match format {
        OutputFormat::Text => {
            for (i, analysis) in analyses.iter().enumerate() {
                if i > 0 {
                    println!("\n{}", "─".repeat(60));
                }
                println!("\n{} ({})", analysis.title, analysis.id);
                println!(
                    "   Entities: {} ({} scored)",
                    analysis.entities, analysis.scored_entities
                );
                println!(
                    "   Features: {} ({} grouping, {} discrete, {} numeric)",
                    analysis.features,
                    analysis.features_by_kind.grouping,
                    analysis.features_by_kind.discrete,
                    analysis.features_by_kind.numeric
                );
                println!("   States: {}", analysis.states);
                println!(
                    "   Characters with measurements: {}",
                    analysis.measured_characters
                );
                if !analysis.warnings.is_empty() {
                    println!("\n   Warnings:");
                    for warning in &analysis.warnings {
                        println!("   - {warning}");
                    }
                }
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&analyses)?);
        }
    }

    Ok(())
}

fn run_export(output: PathBuf, catalog_path: Option<PathBuf>, verbose: bool) -> anyhow::Result<()> {
    let catalog = load_catalog(catalog_path.as_deref(), verbose)?;

    let json = catalog.to_json()?;
    std::fs::write(&output, json)?;

    println!("Exported {} keys to {}", catalog.len(), output.display());

    Ok(())
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("Eucalypts", 20), "Eucalypts");
        assert_eq!(truncate("Key to genera of Myrtaceae", 10), "Key to ...");
    }

    #[test]
    fn test_export_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundle.json");
        run_export(path.clone(), None, false).unwrap();

        let exported = KeyCatalog::load(&path).unwrap();
        assert_eq!(exported.len(), 3);
        assert!(exported.issues().is_empty());
    }
}
