mod config;
mod logging;
mod render;
mod review;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use mediadupe_core::db::{RecordStore, SqliteCatalogStore};
use mediadupe_core::dedup::{DedupConfig, DedupEngine, DedupSession};
use mediadupe_core::ingest::ingest_roots;
use mediadupe_core::metadata::ExifExtractor;

use crate::config::{FileConfig, Overrides, Settings};

#[derive(Parser, Debug)]
#[command(name = "mediadupe", version, about = "Catalog media files and resolve duplicates")]
struct Cli {
    /// Catalog database (SQLite)
    #[arg(long, global = true, value_name = "PATH")]
    db: Option<PathBuf>,

    /// Config file (default: <config dir>/mediadupe/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Where purged files are copied
    #[arg(long, global = true, value_name = "DIR")]
    quarantine: Option<PathBuf>,

    /// Duplicate groups per page
    #[arg(long, global = true, value_name = "N")]
    page_size: Option<usize>,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Catalog image and video files under one or more directories
    Scan {
        #[arg(required = true, value_name = "DIR")]
        roots: Vec<PathBuf>,
    },

    /// List the location roots present in the catalog
    Roots,

    /// Show the first catalogued records
    Browse {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Show a page of duplicate groups
    Dupes {
        /// Only records at or below this path (e.g. a location root)
        #[arg(long)]
        scope: Option<String>,
        /// 1-based page number
        #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
        page: i64,
    },

    /// Purge the non-keepers of every group on a page
    Purge {
        #[arg(long)]
        scope: Option<String>,
        #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
        page: i64,
        /// Keeper as GROUP=MEMBER, numbered as shown by `dupes` (default: first active member)
        #[arg(long = "keep", value_name = "GROUP=MEMBER", value_parser = parse_keep)]
        keep: Vec<(usize, usize)>,
    },

    /// Review duplicates interactively
    Review {
        #[arg(long)]
        scope: Option<String>,
    },

    /// Show catalog details
    Info,

    /// Delete every record from the catalog (files are untouched)
    Clear {
        #[arg(long)]
        yes: bool,
    },
}

fn main() {
    if let Err(err) = real_main() {
        eprintln!("error: {err:#}");
        std::process::exit(2);
    }
}

fn real_main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose, cli.quiet);

    let file = FileConfig::load(cli.config.as_deref())?;
    let settings = Settings::resolve(
        file,
        Overrides {
            database: cli.db,
            quarantine_dir: cli.quarantine,
            page_size: cli.page_size,
        },
    )?;

    let store = SqliteCatalogStore::open(&settings.database)
        .with_context(|| format!("failed to open catalog {}", settings.database.display()))?;
    let dedup_config = DedupConfig {
        page_size: settings.page_size,
        quarantine_dir: settings.quarantine_dir.clone(),
    };

    match cli.command {
        Command::Scan { roots } => {
            for (root, result) in roots.iter().zip(ingest_roots(&roots, &store, &ExifExtractor)) {
                match result {
                    Ok(report) => render::ingest_report(&report),
                    Err(err) => println!("Invalid path: {} ({err})", root.display()),
                }
            }
            Ok(())
        }
        Command::Roots => {
            let roots = store.distinct_location_roots()?;
            if roots.is_empty() {
                println!("The catalog is empty.");
            }
            for root in roots {
                println!("{root}");
            }
            Ok(())
        }
        Command::Browse { limit } => {
            render::records(&store.browse(limit)?);
            Ok(())
        }
        Command::Dupes { scope, page } => {
            let engine = DedupEngine::new(&store, dedup_config)?;
            let mut session = engine.load(scope.as_deref())?;
            session.set_page(page.saturating_sub(1));
            render::page(&session);
            Ok(())
        }
        Command::Purge { scope, page, keep } => {
            let engine = DedupEngine::new(&store, dedup_config)?;
            let mut session = engine.load(scope.as_deref())?;
            session.set_page(page.saturating_sub(1));
            apply_keepers(&mut session, &keep);

            let report = engine.purge_page(&mut session)?;
            render::purge_report(&report);
            render::page(&session);
            if report.failed() > 0 {
                bail!("{} files could not be purged", report.failed());
            }
            Ok(())
        }
        Command::Review { scope } => {
            let engine = DedupEngine::new(&store, dedup_config)?;
            let session = engine.load(scope.as_deref())?;
            review::run(&engine, session)
        }
        Command::Info => {
            println!("Database: {}", settings.database.display());
            println!("Quarantine: {}", settings.quarantine_dir.display());
            if let Some(info) = store.catalog_info()? {
                println!("Fingerprint: {}", info.fingerprint_algorithm);
                println!("Created by version: {}", info.app_version);
            }
            println!("Records: {}", store.count()?);
            Ok(())
        }
        Command::Clear { yes } => {
            if !yes {
                bail!("refusing to clear the catalog without --yes");
            }
            let removed = store.clear()?;
            println!("Removed {removed} records.");
            Ok(())
        }
    }
}

/// Applies `GROUP=MEMBER` choices (both 1-based) to groups on the current page.
fn apply_keepers(session: &mut DedupSession, keep: &[(usize, usize)]) {
    let offset = session.page_offset();
    let on_page: Vec<String> = session
        .current_page()
        .iter()
        .map(|g| g.fingerprint.clone())
        .collect();

    for &(group_no, member_no) in keep {
        let Some(fingerprint) = group_no
            .checked_sub(offset + 1)
            .and_then(|slot| on_page.get(slot))
        else {
            log::warn!("group {group_no} is not on this page; ignoring --keep {group_no}={member_no}");
            continue;
        };
        let wanted = member_no.saturating_sub(1);
        if session.select_keeper(fingerprint, wanted) != Some(wanted) {
            log::warn!("group {group_no}: member {member_no} cannot be kept; using the default keeper");
        }
    }
}

fn parse_keep(s: &str) -> std::result::Result<(usize, usize), String> {
    let (group, member) = s
        .split_once('=')
        .ok_or_else(|| format!("expected GROUP=MEMBER, got '{s}'"))?;
    let group = group
        .trim()
        .parse()
        .map_err(|_| format!("invalid group number '{group}'"))?;
    let member = member
        .trim()
        .parse()
        .map_err(|_| format!("invalid member number '{member}'"))?;
    Ok((group, member))
}
