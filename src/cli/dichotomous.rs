use std::io::{BufRead, Write};
use std::path::PathBuf;

use clap::Args;
use serde::Serialize;

use crate::cli::{load_catalog, parse_choice, prompt, OutputFormat};
use crate::core::lead::Item;
use crate::core::types::KeyId;
use crate::matching::navigator::{
    BackOutcome, KeyLoader, KeyNavigator, NavigatorConfig, NavigatorError, Transition,
    DEFAULT_MAX_KEY_DEPTH, DEFAULT_START_KEY,
};
use crate::utils::validation::validate_key_id;

#[derive(Args)]
pub struct DichotomousArgs {
    /// Key to start navigating from
    #[arg(short, long, default_value = DEFAULT_START_KEY)]
    pub start: String,

    /// Catalog to load: a bundle, a key file, or a directory (defaults to embedded)
    #[arg(long)]
    pub catalog: Option<PathBuf>,

    /// Maximum number of linked keys followed in one session
    #[arg(long, default_value_t = DEFAULT_MAX_KEY_DEPTH)]
    pub max_depth: usize,
}

/// What a navigation session ended with
#[derive(Debug, Default, Serialize)]
pub struct SessionSummary {
    /// Items reached, in the order they were reached
    pub results: Vec<Item>,
    /// Keys on the stack when the session ended, start key first
    pub trail: Vec<KeyId>,
}

/// Execute dichotomous subcommand
///
/// # Errors
///
/// Returns an error if the catalog cannot be loaded, the start key does not exist, or
/// the terminal cannot be read or written.
#[allow(clippy::needless_pass_by_value)] // CLI entry point, values from clap
pub fn run(args: DichotomousArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let catalog = load_catalog(args.catalog.as_deref(), verbose)?;
    let start = validate_key_id(&args.start)?;

    let config = NavigatorConfig {
        start_key: KeyId::new(start),
        max_depth: args.max_depth,
    };
    let mut navigator = KeyNavigator::new(&catalog, config)?;

    let stdin = std::io::stdin();
    let mut input = stdin.lock();
    let summary = match format {
        OutputFormat::Text => {
            let mut stdout = std::io::stdout().lock();
            writeln!(
                stdout,
                "Starting dichotomous key navigation from key {start}."
            )?;
            run_session(&mut navigator, &mut input, &mut stdout)?
        }
        OutputFormat::Json => {
            let summary = run_session(&mut navigator, &mut input, &mut std::io::stderr().lock())?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            summary
        }
    };

    if verbose {
        eprintln!("Session ended with {} result(s)", summary.results.len());
    }
    Ok(())
}

/// Run the interactive navigation loop until the user quits or input ends
///
/// # Errors
///
/// Returns an error if reading or writing the terminal fails.
pub fn run_session<L: KeyLoader, R: BufRead, W: Write + ?Sized>(
    navigator: &mut KeyNavigator<'_, L>,
    input: &mut R,
    output: &mut W,
) -> std::io::Result<SessionSummary> {
    let mut summary = SessionSummary::default();
    let mut show_header = true;

    loop {
        if show_header {
            print_header(navigator, output)?;
            show_header = false;
        }

        if navigator.is_dead_end() {
            writeln!(
                output,
                "\n(No leads here. b to back, r to restart, q to quit)"
            )?;
            let Some(answer) = prompt(input, output, "> ")? else {
                break;
            };
            match answer.as_str() {
                "q" => break,
                "b" => step_back(navigator, output)?,
                "r" => {
                    navigator.reset();
                    show_header = true;
                }
                _ => {}
            }
            continue;
        }

        let options = navigator.options();
        writeln!(output, "\n{}", "=".repeat(40))?;
        for option in &options {
            writeln!(output, "{}. {}", option.index + 1, option.lead.text)?;
            if let Some(item) = &option.item {
                match &item.to_key {
                    Some(key) => writeln!(output, "   -> {} (see key {key})", item.name)?,
                    None => writeln!(output, "   -> {}", item.name)?,
                }
            }
        }

        let Some(answer) = prompt(input, output, "\nChoose option: ")? else {
            break;
        };
        match answer.as_str() {
            "q" => break,
            "b" => {
                step_back(navigator, output)?;
                continue;
            }
            "r" => {
                navigator.reset();
                show_header = true;
                continue;
            }
            _ => {}
        }

        let Some(index) = parse_choice(&answer, options.len()) else {
            writeln!(output, "Invalid choice")?;
            continue;
        };

        match navigator.choose_option(index) {
            Ok(Transition::Continue { .. }) => {}
            Ok(Transition::KeyTransition { to, item, .. }) => {
                print_item(&item, output)?;
                writeln!(
                    output,
                    "Leads to key {to}: {}",
                    navigator.current_key().title
                )?;
                writeln!(output, "{}", "-".repeat(40))?;
                show_header = true;
            }
            Ok(Transition::Result { item }) => {
                print_item(&item, output)?;
                summary.results.push(item);
                writeln!(output, "{}", "-".repeat(40))?;
                if !after_result(navigator, input, output, &mut show_header)? {
                    break;
                }
            }
            Err(
                err @ (NavigatorError::LinkedKeyNotFound { .. }
                | NavigatorError::DepthExceeded(_)),
            ) => {
                if let Some(item) = options[index].item.clone() {
                    print_item(&item, output)?;
                    summary.results.push(item);
                }
                writeln!(output, "Warning: {err}")?;
                writeln!(output, "{}", "-".repeat(40))?;
                if !after_result(navigator, input, output, &mut show_header)? {
                    break;
                }
            }
            Err(err) => writeln!(output, "{err}")?,
        }
    }

    summary.trail = navigator.trail().into_iter().cloned().collect();
    Ok(summary)
}

fn print_header<L: KeyLoader, W: Write + ?Sized>(
    navigator: &KeyNavigator<'_, L>,
    output: &mut W,
) -> std::io::Result<()> {
    let header = navigator.header();
    writeln!(output, "\n{}", header.title)?;
    if let Some(scope) = &header.scope {
        writeln!(output, "Scope: {scope}")?;
    }
    if header.depth > 1 {
        let trail: Vec<String> = navigator.trail().iter().map(ToString::to_string).collect();
        writeln!(output, "Keys: {}", trail.join(" > "))?;
    }
    writeln!(
        output,
        "\nCommands: number = choose, b = back, r = restart, q = quit"
    )
}

fn print_item<W: Write + ?Sized>(item: &Item, output: &mut W) -> std::io::Result<()> {
    writeln!(output, "\n{}", "-".repeat(40))?;
    writeln!(output, "Result: {}", item.name)?;
    if let Some(url) = &item.url {
        writeln!(output, "More information: {url}")?;
    }
    Ok(())
}

fn step_back<L: KeyLoader, W: Write + ?Sized>(
    navigator: &mut KeyNavigator<'_, L>,
    output: &mut W,
) -> std::io::Result<()> {
    match navigator.back() {
        BackOutcome::Stepped { .. } => Ok(()),
        BackOutcome::LeftKey { returned_to, .. } => {
            writeln!(output, "Back in key {returned_to}")
        }
        BackOutcome::AtStart => writeln!(output, "Already at start."),
    }
}

/// Pause after a result. `false` when the session should end.
fn after_result<L: KeyLoader, R: BufRead, W: Write + ?Sized>(
    navigator: &mut KeyNavigator<'_, L>,
    input: &mut R,
    output: &mut W,
    show_header: &mut bool,
) -> std::io::Result<bool> {
    let Some(answer) = prompt(input, output, "Enter to continue, q to quit, r to restart: ")?
    else {
        return Ok(false);
    };
    match answer.as_str() {
        "q" => Ok(false),
        "r" => {
            navigator.reset();
            *show_header = true;
            Ok(true)
        }
        _ => Ok(true),
    }
}
