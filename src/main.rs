use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use multreplacer::{
    core::{AppConfig, Language, Translator},
    document::PendingReplacement,
    error::ReplacerError,
    logging::{init_logging, LogOptions},
    replace::{load_rules_file, ReplacementRule, ReplacementSet},
    update::{read_local_version, UpdateResult},
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to the user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Display language (ja or en)
    #[arg(short, long, global = true)]
    lang: Option<String>,

    /// Skip the update check at startup
    #[arg(long, global = true)]
    no_update_check: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply replacement rules to a file
    Replace {
        /// The file to rewrite in place
        file: PathBuf,

        /// Inline rule in the form `before=>after`, may be repeated
        #[arg(short, long, value_name = "BEFORE=>AFTER")]
        rule: Vec<String>,

        /// TOML file with `[[rule]]` tables
        #[arg(long = "rules", value_name = "FILE")]
        rules_file: Option<PathBuf>,

        /// Save without asking for confirmation
        #[arg(short, long)]
        yes: bool,

        /// Print the result to stdout instead of saving
        #[arg(short, long)]
        print: bool,
    },

    /// Check for a new release now
    Update,

    /// Show the installed version
    Version,
}

/// Directory of the running executable, where version.txt and lang/ live
fn exe_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(path) => AppConfig::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => Ok(AppConfig::load_or_create_default().unwrap_or_else(|e| {
            warn!("Using built-in configuration: {}", e);
            AppConfig::default()
        })),
    }
}

/// User-facing text for an error, keyed by its kind
fn describe_error(translator: &Translator, error: &ReplacerError) -> String {
    let key = match error.kind() {
        "network" => "error_network",
        "asset_not_found" => "error_asset_not_found",
        "filesystem" => "error_filesystem",
        "encoding" => "error_encoding",
        "checksum_mismatch" => "error_checksum_mismatch",
        _ => "update_failed",
    };
    translator.tr_with(key, &[("error", error.to_string().as_str())])
}

/// Print the outcome of an update check. Returns true when the process must
/// exit so the relaunched executable takes over.
fn report_update(translator: &Translator, result: &UpdateResult) -> bool {
    match result {
        UpdateResult::UpToDate { version } => {
            eprintln!(
                "{}",
                translator.tr_with("update_current_version", &[("version", version.as_str())])
            );
            eprintln!(
                "{}",
                translator.tr_with("update_latest_version", &[("version", version.as_str())])
            );
            eprintln!("{}", translator.tr("update_up_to_date"));
        }
        UpdateResult::Restarted { from, to } => {
            eprintln!(
                "{}",
                translator.tr_with("update_current_version", &[("version", from.as_str())])
            );
            eprintln!(
                "{}",
                translator.tr_with("update_latest_version", &[("version", to.as_str())])
            );
            eprintln!(
                "{}",
                translator.tr_with("update_restarting", &[("version", to.as_str())])
            );
        }
        UpdateResult::Failed { error, .. } => {
            eprintln!("{}: {}", translator.tr("error"), describe_error(translator, error));
        }
        UpdateResult::Disabled => eprintln!("{}", translator.tr("update_disabled")),
        UpdateResult::AlreadyChecked => debug!("Update check already done"),
    }
    result.requires_exit()
}

fn collect_rules(inline: &[String], rules_file: Option<&Path>) -> Result<ReplacementSet> {
    let mut rules = match rules_file {
        Some(path) => load_rules_file(path)?,
        None => ReplacementSet::new(),
    };
    for raw in inline {
        rules.push(ReplacementRule::parse_inline(raw)?);
    }
    if rules.is_empty() {
        bail!("No replacement rules given; use --rule BEFORE=>AFTER or --rules FILE");
    }
    Ok(rules)
}

fn confirm(translator: &Translator) -> Result<bool> {
    eprint!("{} ", translator.tr("confirm_prompt"));
    io::stderr().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    let answer = answer.trim().to_lowercase();
    Ok(answer == "y" || answer == "yes")
}

fn run_replace(
    translator: &Translator,
    file: &Path,
    rules: ReplacementSet,
    yes: bool,
    print: bool,
) -> Result<()> {
    let pending = match PendingReplacement::prepare(file, &rules) {
        Ok(pending) => pending,
        Err(e) => {
            let message = match e.kind() {
                "encoding" => describe_error(translator, &e),
                "io" => format!("{}: {}", translator.tr("invalid_path"), e),
                _ => e.to_string(),
            };
            bail!("{}: {}", translator.tr("error"), message);
        }
    };

    if print {
        print!("{}", pending.replaced);
        return Ok(());
    }

    if !pending.has_changes() {
        println!("{}", translator.tr("no_changes"));
        return Ok(());
    }

    let total = pending.report.total().to_string();
    println!("{}", translator.tr_with("replace_summary", &[("count", total.as_str())]));
    print!("{}", pending.diff());
    io::stdout().flush()?;

    if !yes && !confirm(translator)? {
        println!("{}", translator.tr("cancelled"));
        return Ok(());
    }

    pending
        .commit()
        .map_err(|e| anyhow::anyhow!("{}: {}", translator.tr("error"), e))?;
    println!("{}", translator.tr("replace_done"));
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(LogOptions {
        verbose: cli.verbose,
        ..LogOptions::default()
    });

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(code) = cli.lang.as_deref() {
        config.language = code.parse::<Language>()?;
    }

    let exe_dir = exe_dir();
    let translator = Translator::load(config.language, config.lang_dir_path(&exe_dir));
    info!("{}", translator.tr_with("title", &[("version", multreplacer::version())]));

    // One update check per process: at startup, or explicitly via `update`.
    // Always called so an interrupted install is restored even when the
    // check itself is turned off.
    let explicit_update = matches!(cli.command, Commands::Update);
    if explicit_update {
        config.update.enabled = true;
    } else if cli.no_update_check {
        debug!("Startup update check skipped");
        config.update.enabled = false;
    }
    let result = multreplacer::check_and_update(&config).await;
    if report_update(&translator, &result) {
        std::process::exit(0);
    }

    match cli.command {
        Commands::Replace {
            file,
            rule,
            rules_file,
            yes,
            print,
        } => {
            let rules = collect_rules(&rule, rules_file.as_deref())?;
            run_replace(&translator, &file, rules, yes, print)?;
        }
        Commands::Update => {}
        Commands::Version => {
            let local = read_local_version(config.version_file_path(&exe_dir));
            println!("{} (multreplacer {})", local, multreplacer::version());
        }
    }

    Ok(())
}
