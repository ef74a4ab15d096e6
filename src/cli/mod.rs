//! Command-line interface for key-solver.
//!
//! This module implements the CLI using clap. Available commands:
//!
//! - **multi**: Identify a specimen with a multi-access key
//! - **dichotomous**: Walk a dichotomous key, following links into other keys
//! - **catalog**: List, show, analyze, or export the keys in a catalog
//! - **serve**: Start the JSON API
//!
//! ## Usage
//!
//! ```text
//! # Key out a specimen with the demo multi-access key
//! key-solver multi demo-eucalypts
//!
//! # Use keys scraped to a directory
//! key-solver multi --catalog vicflora-data
//!
//! # Dichotomous key, starting from the families key
//! key-solver dichotomous --catalog keybase-data --start 1903
//!
//! # JSON output for scripting
//! key-solver catalog list --format json
//!
//! # Start the API
//! key-solver serve --port 8080 --open
//! ```

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use crate::catalog::store::KeyCatalog;

pub mod catalog;
pub mod dichotomous;
pub mod multi;

#[derive(Parser)]
#[command(name = "key-solver")]
#[command(author = "Fulcrum Genomics")]
#[command(version)]
#[command(about = "Identify specimens with multi-access and dichotomous keys")]
#[command(
    long_about = "key-solver walks you through identifying a biological specimen.\n\nIt supports:\n- Multi-access keys: answer any character in any order, see which taxa remain\n- Dichotomous keys: choose between leads until a taxon is reached, across linked keys\n- Lucid player bundles, scraped Lucid JSON and KeyBase exports"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Identify a specimen with a multi-access key
    Multi(multi::MultiArgs),

    /// Walk a dichotomous key
    Dichotomous(dichotomous::DichotomousArgs),

    /// Inspect the key catalog
    Catalog(catalog::CatalogArgs),

    /// Start the web server
    Serve(ServeArgs),
}

#[derive(clap::Args)]
pub struct ServeArgs {
    /// Port to listen on
    #[arg(short, long, default_value = "8080")]
    pub port: u16,

    /// Address to bind to
    #[arg(short, long, default_value = "127.0.0.1")]
    pub address: String,

    /// Open browser automatically
    #[arg(long)]
    pub open: bool,

    /// Catalog to serve: a bundle, a key file, or a directory (defaults to embedded)
    #[arg(long)]
    pub catalog: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Load the catalog at `path`, or the embedded demo catalog
///
/// # Errors
///
/// Returns an error if the catalog cannot be loaded.
pub fn load_catalog(path: Option<&Path>, verbose: bool) -> anyhow::Result<KeyCatalog> {
    let catalog = match path {
        Some(path) => KeyCatalog::load(path)?,
        None => KeyCatalog::load_embedded()?,
    };

    if verbose {
        eprintln!(
            "Loaded catalog with {} multi-access and {} dichotomous keys",
            catalog.multi_access_keys().len(),
            catalog.dichotomous_keys().len()
        );
    }
    for issue in catalog.issues() {
        eprintln!("Warning: {issue}");
    }
    if catalog.is_empty() {
        eprintln!("Warning: Catalog is empty, no keys to work with.");
    }

    Ok(catalog)
}

/// Write a prompt and read one trimmed line. `None` at end of input.
pub(crate) fn prompt<R: BufRead, W: Write + ?Sized>(
    input: &mut R,
    output: &mut W,
    message: &str,
) -> std::io::Result<Option<String>> {
    write!(output, "{message}")?;
    output.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

/// Parse a 1-based menu choice into a 0-based index below `len`
pub(crate) fn parse_choice(answer: &str, len: usize) -> Option<usize> {
    answer
        .parse::<usize>()
        .ok()
        .filter(|&n| n >= 1 && n <= len)
        .map(|n| n - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_choice() {
        assert_eq!(parse_choice("1", 3), Some(0));
        assert_eq!(parse_choice("3", 3), Some(2));
        assert_eq!(parse_choice("0", 3), None);
        assert_eq!(parse_choice("4", 3), None);
        assert_eq!(parse_choice("x", 3), None);
    }

    #[test]
    fn test_prompt_reads_until_eof() {
        let mut input = "  2 \n".as_bytes();
        let mut output = Vec::new();
        assert_eq!(
            prompt(&mut input, &mut output, "> ").unwrap().as_deref(),
            Some("2")
        );
        assert_eq!(prompt(&mut input, &mut output, "> ").unwrap(), None);
        assert_eq!(String::from_utf8(output).unwrap(), "> > ");
    }
}
