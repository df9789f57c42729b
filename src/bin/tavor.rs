//! The `tavor` driver: wraps the library's parser/filter/strategy layers
//! behind a command-line surface (spec.md §6). Exit codes:
//!   0 ok, 1 no subcommand (help shown), 2 a grammar-completion error
//!   (`NoStart`/`UnusedToken`/`TokenNotDefined`), 3 an invalid input file for
//!   `reduce`/`validate`, 4 any other error.

use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command as OsCommand;

use tavor::error::{Error, ParseError};
use tavor::filter;
use tavor::graph;
use tavor::parser::{parse_tavor, ParseOptions};
use tavor::strategy::{self, Verdict};
use tavor::token::{self, TokenRef};

const EXIT_OK: i32 = 0;
const EXIT_HELP_SHOWN: i32 = 1;
const EXIT_COMPLETION: i32 = 2;
const EXIT_INVALID_INPUT: i32 = 3;
const EXIT_ERROR: i32 = 4;

#[derive(Parser)]
#[command(
    name = "tavor",
    about = "A grammar-driven fuzzing and delta-debugging platform"
)]
struct Cli {
    /// Enable debug-level tracing (`RUST_LOG`-style spans and events).
    #[arg(long, global = true)]
    debug: bool,
    /// Enable info-level tracing.
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate states from a grammar file via a fuzzing strategy.
    Fuzz {
        format: PathBuf,
        /// One of AllPermutations, AlmostAllPermutations, PermuteOptionals.
        #[arg(long, default_value = "AllPermutations")]
        strategy: String,
        /// Filters to apply, in order, before fuzzing (see `--list-filters`).
        #[arg(long = "filter")]
        filters: Vec<String>,
        /// Stop after this many emitted states.
        #[arg(long)]
        limit: Option<u64>,
        /// Run each generated state through this subprocess config instead
        /// of printing it.
        #[arg(long)]
        exec_config: Option<PathBuf>,
        /// Directory to save mismatching/matching states into, named by a
        /// content hash of the rendered text.
        #[arg(long)]
        result_folder: Option<PathBuf>,
    },
    /// Delta-debug a captured input down to a minimal reproducing case.
    Reduce {
        format: PathBuf,
        input: PathBuf,
        #[arg(long)]
        exec_config: PathBuf,
    },
    /// Parse a grammar and an input file, reporting whether it matches.
    Validate { format: PathBuf, input: PathBuf },
    /// Print the parsed token graph.
    Graph {
        format: PathBuf,
        /// Print internal (pre-filter) children instead of logical ones.
        #[arg(long)]
        internal: bool,
        /// Emit Graphviz DOT instead of the indented tree listing.
        #[arg(long)]
        dot: bool,
    },
    /// List the filters the `fuzz` subcommand can apply.
    ListFilters,
    /// List the strategies the `fuzz` subcommand can drive.
    ListStrategies,
}

/// How the rendered string is handed to the configured subprocess
/// (`main.go`'s `execArgumentType`, SPEC_FULL.md §2).
#[derive(Debug, Deserialize, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum ExecArgumentType {
    #[default]
    Stdin,
    Argument,
    Environment,
}

/// What a captured run should be compared against, loaded from a TOML file
/// via `--exec-config` (spec.md §2's subprocess exec+matching ambient
/// feature). `ExecConfigRaw` is the wire shape; `match_output_regex` is
/// compiled once at load time rather than per candidate.
#[derive(Debug, Deserialize)]
struct ExecConfigRaw {
    command: String,
    #[serde(default)]
    args: Vec<String>,
    /// How the rendered/candidate string reaches the subprocess. Defaults to
    /// stdin.
    #[serde(default)]
    argument_type: ExecArgumentType,
    /// Name of the argument placeholder (for `argument`) or environment
    /// variable (for `environment`) the rendered string is substituted into.
    /// Ignored for `stdin`.
    #[serde(default)]
    argument_name: Option<String>,
    /// Exit code the subprocess must return for a state to count as
    /// reproducing the failure. Defaults to "any nonzero".
    match_exit_code: Option<i32>,
    /// Substring that must appear in combined stdout+stderr for a state to
    /// count as reproducing the failure.
    match_output: Option<String>,
    /// A regex alternative to `match_output`, for failure signatures that
    /// aren't a fixed substring (e.g. an address or timestamp that varies
    /// across runs).
    match_output_regex: Option<String>,
}

struct ExecConfig {
    command: String,
    args: Vec<String>,
    argument_type: ExecArgumentType,
    argument_name: Option<String>,
    match_exit_code: Option<i32>,
    match_output: Option<String>,
    match_output_regex: Option<regex::Regex>,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.debug, cli.verbose);

    let Some(command) = cli.command else {
        // clap already printed the auto-generated help/usage for a bare
        // invocation with no subcommand.
        std::process::exit(EXIT_HELP_SHOWN);
    };

    let code = match run(command) {
        Ok(()) => EXIT_OK,
        Err(CliError::Completion(e)) => {
            eprintln!("error: {e}");
            EXIT_COMPLETION
        }
        Err(CliError::InvalidInput(msg)) => {
            eprintln!("error: {msg}");
            EXIT_INVALID_INPUT
        }
        Err(CliError::Other(e)) => {
            eprintln!("error: {e}");
            EXIT_ERROR
        }
    };
    std::process::exit(code);
}

fn init_tracing(debug: bool, verbose: bool) {
    let level = if debug {
        tracing::Level::DEBUG
    } else if verbose {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.to_string()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

enum CliError {
    /// A grammar that parsed lexically/syntactically fine but failed
    /// completion checks (`NoStart`/`UnusedToken`/`TokenNotDefined`).
    Completion(ParseError),
    /// An input file `reduce`/`validate` could not make sense of.
    InvalidInput(String),
    Other(Error),
}

impl From<Error> for CliError {
    fn from(e: Error) -> Self {
        CliError::Other(e)
    }
}

fn run(command: Commands) -> Result<(), CliError> {
    match command {
        Commands::Fuzz {
            format,
            strategy: strategy_name,
            filters,
            limit,
            exec_config,
            result_folder,
        } => cmd_fuzz(
            &format,
            &strategy_name,
            &filters,
            limit,
            exec_config.as_deref(),
            result_folder.as_deref(),
        ),
        Commands::Reduce {
            format,
            input,
            exec_config,
        } => cmd_reduce(&format, &input, &exec_config),
        Commands::Validate { format, input } => cmd_validate(&format, &input),
        Commands::Graph { format, internal, dot } => cmd_graph(&format, internal, dot),
        Commands::ListFilters => {
            for name in filter::list_filters() {
                println!("{name}");
            }
            Ok(())
        }
        Commands::ListStrategies => {
            for name in strategy::list_strategies() {
                println!("{name}");
            }
            Ok(())
        }
    }
}

fn load_grammar(format: &Path, filters: &[String]) -> Result<TokenRef, CliError> {
    let src = fs::read_to_string(format).map_err(|e| CliError::Other(Error::from(e)))?;
    let root = parse_tavor(&src, &ParseOptions::default()).map_err(|e| match &e {
        ParseError::NoStart | ParseError::UnusedToken { .. } | ParseError::TokenNotDefined { .. } => {
            CliError::Completion(e)
        }
        other => CliError::Other(Error::from(other.clone())),
    })?;

    if filters.is_empty() {
        return Ok(root);
    }
    let mut chosen = Vec::with_capacity(filters.len());
    for name in filters {
        chosen.push(filter::lookup(name)?);
    }
    filter::apply_filters(&chosen, root).map_err(CliError::Other)
}

fn cmd_graph(format: &Path, internal: bool, dot: bool) -> Result<(), CliError> {
    let root = load_grammar(format, &[])?;
    let text = if dot {
        graph::to_dot(&root, internal)
    } else if internal {
        graph::pretty_print_internal_tree(&root)
    } else {
        graph::pretty_print_tree(&root)
    };
    print!("{text}");
    Ok(())
}

fn cmd_validate(format: &Path, input: &Path) -> Result<(), CliError> {
    let root = load_grammar(format, &[])?;
    let text = fs::read_to_string(input).map_err(|e| CliError::Other(Error::from(e)))?;
    match token::match_input(&root, &text) {
        Ok(n) if n == text.len() => {
            println!("matches");
            Ok(())
        }
        Ok(n) => Err(CliError::InvalidInput(format!(
            "input only partially matched the grammar ({n} of {} bytes)",
            text.len()
        ))),
        Err(e) => Err(CliError::InvalidInput(format!(
            "input does not match the grammar: {e}"
        ))),
    }
}

fn cmd_fuzz(
    format: &Path,
    strategy_name: &str,
    filters: &[String],
    limit: Option<u64>,
    exec_config: Option<&Path>,
    result_folder: Option<&Path>,
) -> Result<(), CliError> {
    let root = load_grammar(format, filters)?;
    let exec_cfg = exec_config.map(load_exec_config).transpose()?;

    let mut handle = strategy::new(strategy_name, root).map_err(|e| Error::from(e))?;
    let mut emitted = 0u64;
    while let Some(rendered) = handle.next() {
        emitted += 1;
        tracing::debug!(emitted, "fuzz state");

        let reproduced = match &exec_cfg {
            Some(cfg) => {
                let outcome = exec_and_match(cfg, &rendered)?;
                if let Some(dir) = result_folder {
                    if outcome {
                        save_result(dir, &rendered)?;
                    }
                }
                Some(outcome)
            }
            None => {
                println!("{rendered}");
                None
            }
        };
        if let Some(true) = reproduced {
            tracing::info!("reproducing state saved");
        }

        if limit.is_some_and(|l| emitted >= l) {
            break;
        }
        handle.resume();
    }
    Ok(())
}

fn cmd_reduce(format: &Path, input: &Path, exec_config: &Path) -> Result<(), CliError> {
    let root = load_grammar(format, &[])?;
    let text = fs::read_to_string(input).map_err(|e| CliError::Other(Error::from(e)))?;
    let consumed = token::match_input(&root, &text)
        .map_err(|e| CliError::InvalidInput(format!("input does not match the grammar: {e}")))?;
    if consumed != text.len() {
        return Err(CliError::InvalidInput(
            "input only partially matched the grammar".to_string(),
        ));
    }

    let cfg = load_exec_config(exec_config)?;
    if !exec_and_match(&cfg, &text)? {
        return Err(CliError::InvalidInput(
            "the captured input does not itself reproduce the failure".to_string(),
        ));
    }

    let mut handle = strategy::new_reduce(root).map_err(|e| Error::from(e))?;
    let mut last_reproducing = text;
    while let Some(candidate) = handle.next() {
        let reproduces = exec_and_match(&cfg, &candidate)?;
        if reproduces {
            last_reproducing = candidate;
            handle.report(Verdict::Bad);
        } else {
            handle.report(Verdict::Good);
        }
    }
    println!("{last_reproducing}");
    Ok(())
}

fn load_exec_config(path: &Path) -> Result<ExecConfig, CliError> {
    let text = fs::read_to_string(path).map_err(|e| CliError::Other(Error::from(e)))?;
    let raw: ExecConfigRaw = toml::from_str(&text)
        .map_err(|e| CliError::Other(Error::Io(format!("invalid exec config: {e}"))))?;
    let match_output_regex = raw
        .match_output_regex
        .as_deref()
        .map(regex::Regex::new)
        .transpose()
        .map_err(|e| CliError::Other(Error::Io(format!("invalid match_output_regex: {e}"))))?;
    Ok(ExecConfig {
        command: raw.command,
        args: raw.args,
        argument_type: raw.argument_type,
        argument_name: raw.argument_name,
        match_exit_code: raw.match_exit_code,
        match_output: raw.match_output,
        match_output_regex,
    })
}

/// Runs the configured subprocess, handing it `input` the way `cfg`'s
/// `argument_type` dictates, and reports whether it reproduces the
/// configured failure signature.
fn exec_and_match(cfg: &ExecConfig, input: &str) -> Result<bool, CliError> {
    use std::io::Write as _;

    let mut command = OsCommand::new(&cfg.command);
    match cfg.argument_type {
        ExecArgumentType::Stdin => {
            command.args(&cfg.args);
        }
        ExecArgumentType::Argument => {
            command.args(&cfg.args);
            command.arg(input);
        }
        ExecArgumentType::Environment => {
            command.args(&cfg.args);
            let name = cfg.argument_name.as_deref().unwrap_or("TAVOR_INPUT");
            command.env(name, input);
        }
    }

    let stdin_mode = if cfg.argument_type == ExecArgumentType::Stdin {
        std::process::Stdio::piped()
    } else {
        std::process::Stdio::null()
    };
    let mut child = command
        .stdin(stdin_mode)
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .spawn()
        .map_err(|e| CliError::Other(Error::from(e)))?;

    if cfg.argument_type == ExecArgumentType::Stdin {
        if let Some(mut stdin) = child.stdin.take() {
            let _ = stdin.write_all(input.as_bytes());
        }
    }
    let output = child
        .wait_with_output()
        .map_err(|e| CliError::Other(Error::from(e)))?;

    let mut ok = true;
    if let Some(expected) = cfg.match_exit_code {
        ok &= output.status.code() == Some(expected);
    } else {
        ok &= !output.status.success();
    }
    if cfg.match_output.is_some() || cfg.match_output_regex.is_some() {
        let combined = format!(
            "{}{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        if let Some(needle) = &cfg.match_output {
            ok &= combined.contains(needle.as_str());
        }
        if let Some(re) = &cfg.match_output_regex {
            ok &= re.is_match(&combined);
        }
    }
    Ok(ok)
}

fn save_result(dir: &Path, rendered: &str) -> Result<(), CliError> {
    fs::create_dir_all(dir).map_err(|e| CliError::Other(Error::from(e)))?;
    let mut hasher = DefaultHasher::new();
    rendered.hash(&mut hasher);
    let name = format!("{:016x}", hasher.finish());
    fs::write(dir.join(name), rendered).map_err(|e| CliError::Other(Error::from(e)))?;
    Ok(())
}
