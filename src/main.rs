//! mcmu - Minecraft mod updater
//!
//! Command line front end: resolve a list of mod page URLs for one game
//! version and loader, then optionally download the files.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use mcmu::catalogs::{build_client, CurseForgeClient, Host, Loader, ModrinthClient, REQUEST_TIMEOUT};
use mcmu::credentials::{self, API_KEY_VAR, ONBOARDING_MESSAGE};
use mcmu::resolver::{
    classify_all, filter_lines, BatchResult, Report, ResolveEvent, Resolver,
    SearchParams,
};
use mcmu::settings::Settings;
use mcmu::updater::{self, truncate_name};
use mcmu::{logging, paths};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "mcmu")]
#[command(version)]
#[command(about = "Minecraft mod updater - finds the right CurseForge and Modrinth files for your game version")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Show debug logging on stderr (RUST_LOG overrides the filter)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Args, Clone)]
struct ResolveArgs {
    /// Mod page URLs; saved mod list is used when none are given
    urls: Vec<String>,

    /// Read URLs from a file, one per line (lines starting with # are ignored)
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Minecraft version, e.g. 1.20.1
    #[arg(short = 'm', long)]
    mc_version: Option<String>,

    /// Mod loader the files must be built for
    #[arg(short, long, value_enum)]
    loader: Option<Loader>,

    /// CurseForge API key (overrides the saved key)
    #[arg(long, env = API_KEY_VAR, hide_env_values = true)]
    api_key: Option<String>,

    /// Remember version, loader and mod list for next time
    #[arg(long)]
    save: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Find the matching file for every mod without downloading
    Search {
        #[command(flatten)]
        args: ResolveArgs,
    },

    /// Find the matching files and download them into the mods folder
    Download {
        #[command(flatten)]
        args: ResolveArgs,

        /// Mods folder (defaults to the saved one)
        #[arg(long)]
        folder: Option<PathBuf>,

        /// Move existing jars into a backup folder first
        #[arg(long, conflicts_with = "no_backup")]
        backup: bool,

        /// Leave existing jars in place
        #[arg(long)]
        no_backup: bool,
    },

    /// Show or change saved settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },

    /// Manage the CurseForge API key
    ApiKey {
        #[command(subcommand)]
        action: ApiKeyAction,
    },
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Print saved settings
    Show,

    /// Change saved settings
    Set {
        #[arg(long)]
        folder: Option<PathBuf>,

        #[arg(short = 'm', long)]
        mc_version: Option<String>,

        #[arg(short, long, value_enum)]
        loader: Option<Loader>,

        /// Back up old mods before downloading
        #[arg(long)]
        backup: Option<bool>,
    },
}

#[derive(Subcommand)]
enum ApiKeyAction {
    /// Save a CurseForge API key
    Set { key: String },

    /// Stop showing the missing key message
    Ignore,

    /// Show whether a key is configured
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_dir = paths::config_dir().ok();
    let _log_guard = match logging::init(cli.verbose, log_dir.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Could not set up log file: {:#}", e);
            None
        }
    };

    match cli.command {
        Commands::Search { args } => {
            let mut settings = Settings::load();
            if let Some(report) = resolve(&args, &mut settings).await? {
                if report.downloads.is_empty() {
                    println!("\nNo files to download.");
                }
            }
        }

        Commands::Download {
            args,
            folder,
            backup,
            no_backup,
        } => {
            let mut settings = Settings::load();
            if let Some(folder) = &folder {
                settings.mods_folder = folder.clone();
            }
            let backup = if backup {
                true
            } else if no_backup {
                false
            } else {
                settings.backup_mods
            };

            let Some(report) = resolve(&args, &mut settings).await? else {
                return Ok(());
            };
            if report.downloads.is_empty() {
                println!("\nNothing to download.");
                return Ok(());
            }

            let folder = settings.mods_folder.clone();
            println!("\nDownloading {} mods to {}", report.downloads.len(), folder.display());
            if backup {
                println!("Old mods will be moved to a backup folder");
            }

            let client = build_client(REQUEST_TIMEOUT)?;
            let pb = updater::progress_bar(report.downloads.len(), "Starting downloads...");
            let stats =
                updater::download_mods(&client, &report.downloads, &folder, backup, Some(&pb)).await;
            pb.finish_and_clear();
            let stats = stats?;

            println!("\n=== Download Summary ===");
            if let Some(backup_dir) = &stats.backup_dir {
                println!("Backup:     {}", backup_dir.display());
            }
            println!("Downloaded: {}", stats.downloaded);
            println!("Failed:     {}", stats.failed);
            for name in &stats.failed_names {
                println!("  - {}", name);
            }
            if stats.failed > 0 {
                match log_path() {
                    Some(log) => println!("\nSome downloads failed. See {} for details.", log.display()),
                    None => println!("\nSome downloads failed."),
                }
            } else {
                println!("\nAll mods downloaded!");
            }
        }

        Commands::Settings { action } => match action {
            SettingsAction::Show => {
                let settings = Settings::load();
                println!("Settings file:  {}", paths::settings_path()?.display());
                print_settings(&settings);
            }
            SettingsAction::Set {
                folder,
                mc_version,
                loader,
                backup,
            } => {
                let mut settings = Settings::load();
                if let Some(folder) = folder {
                    settings.mods_folder = folder;
                }
                if let Some(version) = mc_version {
                    settings.mc_version = version.trim().to_string();
                }
                if let Some(loader) = loader {
                    settings.modloader = loader;
                }
                if let Some(backup) = backup {
                    settings.backup_mods = backup;
                }
                settings.save()?;
                println!("Settings saved.");
                print_settings(&settings);
            }
        },

        Commands::ApiKey { action } => match action {
            ApiKeyAction::Set { key } => {
                credentials::save_api_key(&key)?;
                println!("API key saved to {}", paths::env_file_path()?.display());
            }
            ApiKeyAction::Ignore => {
                let mut settings = Settings::load();
                settings.api_warning_ignore = true;
                settings.save()?;
                println!("The missing API key message will no longer be shown.");
            }
            ApiKeyAction::Status => {
                let from_env = std::env::var(API_KEY_VAR)
                    .ok()
                    .and_then(credentials::non_blank)
                    .is_some();
                let from_file = credentials::load_api_key()?.is_some();

                if from_env {
                    println!("API key: set ({} environment variable)", API_KEY_VAR);
                } else if from_file {
                    println!("API key: set ({})", paths::env_file_path()?.display());
                } else {
                    println!("API key: not set");
                    println!("\n{}", ONBOARDING_MESSAGE);
                }
            }
        },
    }

    Ok(())
}

fn log_path() -> Option<PathBuf> {
    paths::config_dir().ok().map(|d| d.join(paths::LOG_FILE))
}

fn print_settings(settings: &Settings) {
    println!("Mods folder:    {}", settings.mods_folder.display());
    println!(
        "Version:        {}",
        if settings.has_version() { settings.mc_version.as_str() } else { "(not set)" }
    );
    println!("Loader:         {}", settings.modloader);
    println!("Backup mods:    {}", if settings.backup_mods { "Yes" } else { "No" });
    println!("Saved mods:     {}", settings.mod_urls.len());
}

/// Raw lines from arguments, a file, or the saved list (comments kept)
fn gather_lines(args: &ResolveArgs, settings: &Settings) -> Result<Vec<String>> {
    let mut lines = args.urls.clone();

    if let Some(file) = &args.file {
        let text = std::fs::read_to_string(file)
            .with_context(|| format!("Failed to read {}", file.display()))?;
        lines.extend(text.lines().map(String::from));
    }

    if lines.is_empty() && args.file.is_none() {
        lines = settings.mod_urls.clone();
    }

    Ok(lines)
}

fn find_api_key(args: &ResolveArgs) -> Option<String> {
    if let Some(key) = args.api_key.clone().and_then(credentials::non_blank) {
        return Some(key);
    }
    match credentials::load_api_key() {
        Ok(key) => key,
        Err(e) => {
            warn!("Could not read saved API key: {:#}", e);
            None
        }
    }
}

/// Second Ctrl-C exits; the first one only cancels the running search
fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        loop {
            if tokio::signal::ctrl_c().await.is_err() {
                return;
            }
            if cancel.is_cancelled() {
                std::process::exit(130);
            }
            cancel.cancel();
        }
    });
}

/// Resolve the requested mods and print the report. `None` when cancelled.
async fn resolve(args: &ResolveArgs, settings: &mut Settings) -> Result<Option<Report>> {
    let lines = gather_lines(args, settings)?;
    let urls = filter_lines(lines.iter().map(String::as_str));
    if urls.is_empty() {
        bail!("No mod URLs given. Pass them as arguments or with --file.");
    }

    let game_version = match &args.mc_version {
        Some(version) => version.trim().to_string(),
        None => settings.mc_version.trim().to_string(),
    };
    if game_version.is_empty() {
        bail!("No Minecraft version set. Pass --mc-version or run `mcmu settings set -m <VERSION>`.");
    }
    let loader = args.loader.unwrap_or(settings.modloader);

    if args.save {
        settings.mc_version = game_version.clone();
        settings.modloader = loader;
        settings.mod_urls = lines;
        settings.save()?;
        info!("Saved settings");
    }

    let references = classify_all(&urls);
    let api_key = find_api_key(args);
    let resolver = Resolver::new(CurseForgeClient::new(api_key.as_deref())?, ModrinthClient::new()?);

    let curseforge_count = references.iter().filter(|r| r.host == Host::CurseForge).count();
    println!(
        "Searching {} mods for Minecraft {} ({})",
        references.len(),
        game_version,
        loader
    );
    if curseforge_count > 0 && !resolver.curseforge().has_api_key() {
        warn!("{} CurseForge mods will be skipped: no API key", curseforge_count);
    }

    let params = SearchParams {
        game_version,
        loader,
    };
    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    let pb = updater::progress_bar(references.len(), "Searching...");
    let (tx, mut rx) = mpsc::unbounded_channel();
    let show_progress = async {
        while let Some(event) = rx.recv().await {
            if let ResolveEvent::Progress {
                reference,
                completed,
                ..
            } = event
            {
                pb.set_position(completed as u64);
                pb.set_message(format!("Checked: {}", truncate_name(&reference.slug, 30)));
            }
        }
    };
    let (result, ()) = tokio::join!(
        resolver.resolve(references, &params, Some(tx), &cancel),
        show_progress
    );
    pb.finish_and_clear();

    let outcomes = match result {
        BatchResult::Completed(outcomes) => outcomes,
        BatchResult::Cancelled => {
            println!("Search cancelled.");
            return Ok(None);
        }
    };
    // From here on Ctrl-C exits
    cancel.cancel();

    let report = Report::from_outcomes(&outcomes);
    print_report(&report);

    if report.missing_api_key() && !settings.api_warning_ignore {
        println!("\n{}", ONBOARDING_MESSAGE);
    }

    Ok(Some(report))
}

fn print_report(report: &Report) {
    if !report.downloads.is_empty() {
        println!("\n=== Found {} mods ===", report.downloads.len());
        for item in &report.downloads {
            println!("  {:<30} {:<11} {}", item.name, item.source.label(), item.file_name);
        }
    }

    if !report.failed.is_empty() {
        println!("\n=== Failed to find {} mods ===", report.failed.len());
        for failed in &report.failed {
            println!("  {} ({})", failed.url, failed.reason);
        }
    }
}
