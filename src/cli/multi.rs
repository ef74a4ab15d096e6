use std::io::{BufRead, Write};
use std::path::PathBuf;

use anyhow::{anyhow, bail};
use clap::Args;

use crate::catalog::multi_access::MultiAccessKey;
use crate::catalog::store::KeyCatalog;
use crate::cli::{load_catalog, parse_choice, prompt, OutputFormat};
use crate::core::character::Character;
use crate::core::types::{CharacterKind, KeyId};
use crate::matching::engine::{CandidateEngine, EngineConfig, Outcome, DEFAULT_PREVIEW_LIMIT};
use crate::utils::validation::{parse_observation, validate_key_id};

#[derive(Args)]
pub struct MultiArgs {
    /// Key to use (asked interactively when the catalog holds several)
    pub key: Option<String>,

    /// Catalog to load: a bundle, a key file, or a directory (defaults to embedded)
    #[arg(long)]
    pub catalog: Option<PathBuf>,

    /// Number of taxa shown when listing the remaining candidates
    #[arg(short = 'n', long, default_value_t = DEFAULT_PREVIEW_LIMIT)]
    pub limit: usize,
}

/// Execute multi subcommand
///
/// In JSON mode the interactive session is written to stderr so that stdout carries
/// only the final summary.
///
/// # Errors
///
/// Returns an error if the catalog cannot be loaded, the key does not exist, or the
/// terminal cannot be read or written.
#[allow(clippy::needless_pass_by_value)] // CLI entry point, values from clap
pub fn run(args: MultiArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let catalog = load_catalog(args.catalog.as_deref(), verbose)?;

    let stdin = std::io::stdin();
    let mut input = stdin.lock();
    let stdout = std::io::stdout();
    let mut stdout = stdout.lock();
    let stderr = std::io::stderr();
    let mut stderr = stderr.lock();
    let session: &mut dyn Write = match format {
        OutputFormat::Text => &mut stdout,
        OutputFormat::Json => &mut stderr,
    };

    let Some(key) = select_key(&catalog, args.key.as_deref(), &mut input, &mut *session)? else {
        return Ok(());
    };

    let config = EngineConfig {
        preview_limit: args.limit,
    };
    let mut engine = CandidateEngine::with_config(key, config);
    run_session(&mut engine, &mut input, &mut *session)?;

    match format {
        OutputFormat::Text => print_text_results(&engine, args.limit, &mut stdout)?,
        OutputFormat::Json => print_json_results(&engine, args.limit, &mut stdout)?,
    }
    Ok(())
}

/// Resolve the key to work with. `None` if the user left the menu without choosing.
fn select_key<'c, R: BufRead, W: Write + ?Sized>(
    catalog: &'c KeyCatalog,
    requested: Option<&str>,
    input: &mut R,
    output: &mut W,
) -> anyhow::Result<Option<&'c MultiAccessKey>> {
    if let Some(id) = requested {
        let id = validate_key_id(id)?;
        return catalog
            .multi_access(&KeyId::new(id))
            .map(Some)
            .ok_or_else(|| anyhow!("Multi-access key '{id}' not found in catalog"));
    }

    let keys = catalog.list_multi_keys();
    match keys.as_slice() {
        [] => bail!("Catalog contains no multi-access keys"),
        [only] => return Ok(catalog.multi_access(&only.id)),
        _ => {}
    }

    writeln!(output, "\nAvailable identification keys:\n")?;
    for (i, summary) in keys.iter().enumerate() {
        writeln!(output, "{}. {}", i + 1, summary.title)?;
        writeln!(
            output,
            "   {} taxa, {} characters ({})\n",
            summary.taxa, summary.characters, summary.id
        )?;
    }

    loop {
        let message = format!("Select a key (1-{}): ", keys.len());
        let Some(answer) = prompt(input, output, &message)? else {
            return Ok(None);
        };
        if answer == "q" {
            return Ok(None);
        }
        match parse_choice(&answer, keys.len()) {
            Some(index) => return Ok(catalog.multi_access(&keys[index].id)),
            None => writeln!(output, "Invalid selection.")?,
        }
    }
}

/// Run the interactive keying loop until the specimen is identified, nothing is left
/// to ask, the user quits, or input ends.
///
/// # Errors
///
/// Returns an error if reading or writing the terminal fails.
pub fn run_session<R: BufRead, W: Write + ?Sized>(
    engine: &mut CandidateEngine<'_>,
    input: &mut R,
    output: &mut W,
) -> std::io::Result<()> {
    let key = engine.key();
    writeln!(output, "\n{}", key.title)?;
    writeln!(
        output,
        "{} taxa, {} characters",
        key.taxa().len(),
        key.characters().len()
    )?;
    writeln!(
        output,
        "Starting with {} possible taxa",
        engine.candidate_count()
    )?;

    while matches!(engine.outcome(), Outcome::Candidates { .. }) {
        let relevant = engine.relevant_characters();
        if relevant.is_empty() {
            writeln!(
                output,
                "\nNo more characters distinguish the remaining taxa."
            )?;
            break;
        }

        writeln!(
            output,
            "\nSelect a character ({} taxa remaining):",
            engine.candidate_count()
        )?;
        for (i, character) in relevant.iter().enumerate() {
            writeln!(
                output,
                "{}. {} {}",
                i + 1,
                kind_label(character.kind),
                key.character_display_name(&character.id)
            )?;
        }
        writeln!(
            output,
            "r = show remaining, u = undo, x = start over, q = finish"
        )?;

        let Some(answer) = prompt(input, output, "> ")? else {
            break;
        };
        match answer.as_str() {
            "q" => break,
            "r" => print_remaining(engine, output)?,
            "u" => match engine.undo_last() {
                Some(undone) => writeln!(
                    output,
                    "Undid {}: {} taxa remaining",
                    key.character_display_name(&undone.character),
                    engine.candidate_count()
                )?,
                None => writeln!(output, "Nothing to undo.")?,
            },
            "x" => {
                engine.reset();
                writeln!(
                    output,
                    "Started over with {} taxa.",
                    engine.candidate_count()
                )?;
            }
            other => match parse_choice(other, relevant.len()) {
                Some(index) => {
                    if !ask_character(engine, relevant[index], input, output)? {
                        break;
                    }
                }
                None => writeln!(output, "Invalid selection. Enter a number from the list.")?,
            },
        }
    }
    Ok(())
}

fn kind_label(kind: CharacterKind) -> &'static str {
    match kind {
        CharacterKind::Numeric => "[numeric]",
        _ => "[states]",
    }
}

/// Ask for a state or value of one character and apply it. `false` at end of input.
fn ask_character<R: BufRead, W: Write + ?Sized>(
    engine: &mut CandidateEngine<'_>,
    character: &Character,
    input: &mut R,
    output: &mut W,
) -> std::io::Result<bool> {
    let name = engine.key().character_display_name(&character.id);

    let narrowing = if character.kind == CharacterKind::Numeric {
        let message = format!("\n{name}: enter a value (blank to go back): ");
        let Some(answer) = prompt(input, output, &message)? else {
            return Ok(false);
        };
        if answer.is_empty() {
            return Ok(true);
        }
        let Some(value) = parse_observation(&answer) else {
            writeln!(output, "'{answer}' is not a number.")?;
            return Ok(true);
        };
        let narrowing = engine.choose_numeric(&character.id, value);
        writeln!(output, "\nSelected: {name} = {value}")?;
        narrowing
    } else {
        let states = engine.states_of(&character.id);
        writeln!(output, "\n{name}")?;
        for (i, state) in states.iter().enumerate() {
            writeln!(output, "{}. {}", i + 1, state.name)?;
        }
        writeln!(output, "{}. Back to characters", states.len() + 1)?;

        let Some(answer) = prompt(input, output, "> ")? else {
            return Ok(false);
        };
        let Some(index) = parse_choice(&answer, states.len()) else {
            if answer != (states.len() + 1).to_string() {
                writeln!(output, "Invalid selection.")?;
            }
            return Ok(true);
        };
        let state = states[index];
        let narrowing = engine.choose_state(&character.id, &state.id);
        writeln!(output, "\nSelected: {name} = {}", state.name)?;
        narrowing
    };

    writeln!(
        output,
        "Eliminated {} taxa, {} remaining",
        narrowing.eliminated, narrowing.remaining
    )?;
    let progress = engine.progress();
    writeln!(
        output,
        "Progress: {} of {} eliminated ({:.0}%)",
        progress.eliminated,
        progress.total,
        progress.fraction * 100.0
    )?;
    Ok(true)
}

fn print_remaining<W: Write + ?Sized>(
    engine: &CandidateEngine<'_>,
    output: &mut W,
) -> std::io::Result<()> {
    let remaining = engine.preview();
    writeln!(output, "\nRemaining candidates:")?;
    for (i, taxon) in remaining.sample.iter().enumerate() {
        writeln!(output, "  {}. {}", i + 1, taxon.name)?;
    }
    if remaining.total > remaining.sample.len() {
        writeln!(
            output,
            "  ... and {} more",
            remaining.total - remaining.sample.len()
        )?;
    }
    Ok(())
}

/// Print the identification results block
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn print_text_results<W: Write + ?Sized>(
    engine: &CandidateEngine<'_>,
    limit: usize,
    output: &mut W,
) -> std::io::Result<()> {
    writeln!(output, "\n{}", "=".repeat(60))?;
    writeln!(output, "IDENTIFICATION RESULTS")?;
    writeln!(output, "{}", "=".repeat(60))?;

    match engine.outcome() {
        Outcome::NoMatch => {
            writeln!(output, "No taxa match your selections.")?;
            writeln!(
                output,
                "Undo a selection or start over and choose differently."
            )?;
        }
        Outcome::Identified { taxon } => {
            writeln!(output, "IDENTIFIED: {}", taxon.name)?;
            writeln!(output, "\nTaxon ID: {}", taxon.id)?;
            if let Some(url) = &taxon.url {
                writeln!(output, "More information: {url}")?;
            }
        }
        Outcome::Candidates { count } => {
            writeln!(output, "{count} possible taxa remaining:\n")?;
            let remaining = engine.remaining_taxa(limit);
            for (i, taxon) in remaining.sample.iter().enumerate() {
                writeln!(output, "{}. {} (ID: {})", i + 1, taxon.name, taxon.id)?;
            }
            if remaining.total > remaining.sample.len() {
                writeln!(
                    output,
                    "... and {} more",
                    remaining.total - remaining.sample.len()
                )?;
            }
        }
    }

    let selections = engine.selections();
    if !selections.is_empty() {
        writeln!(output, "\nYour selections:")?;
        for selection in &selections {
            writeln!(
                output,
                "   {}: {}",
                selection.character_name, selection.value
            )?;
        }
    }
    writeln!(output, "{}", "=".repeat(60))?;
    Ok(())
}

fn print_json_results<W: Write + ?Sized>(
    engine: &CandidateEngine<'_>,
    limit: usize,
    output: &mut W,
) -> anyhow::Result<()> {
    let key = engine.key();
    let summary = serde_json::json!({
        "key": {
            "id": key.id,
            "title": key.title,
        },
        "outcome": engine.outcome(),
        "remaining": engine.remaining_taxa(limit),
        "selections": engine.selections(),
        "progress": engine.progress(),
    });
    writeln!(output, "{}", serde_json::to_string_pretty(&summary)?)?;
    Ok(())
}
