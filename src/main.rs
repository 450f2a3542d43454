mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{AdminArgs, AdminCommands, Cli, Commands, SearchArgs};
use rank_finder::analyzer::{parse_rank, RankMatcher, SearchOutcome, SearchQuery, SearchRequest, SearchResponse};
use rank_finder::auth::{AdminSession, Credentials};
use rank_finder::dataset::DatasetStore;
use rank_finder::importer::{import_sources, resolve_sources, DatasetBuilder};
use rank_finder::logging::{init_logging, LogConfig};
use rank_finder::models::Config;
use rank_finder::scraper::TableScraper;
use rank_finder::template::{write_template, TEMPLATE_FILE_NAME};
use rank_finder::{report, RankError};
use std::io::Read;
use std::path::Path;
use std::process::ExitCode;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(&LogConfig::from_verbosity(cli.verbose).with_format(cli.log_format));

    // Load or create configuration
    let config = if cli.config.exists() {
        info!(path = %cli.config.display(), "loading configuration");
        Config::load_from_file(&cli.config)
            .with_context(|| format!("Failed to read config: {}", cli.config.display()))?
    } else {
        info!(path = %cli.config.display(), "creating default configuration file");
        let default_config = Config::default();
        default_config
            .save_to_file(&cli.config)
            .with_context(|| format!("Failed to write config: {}", cli.config.display()))?;
        default_config
    };

    let store = DatasetStore::open(&config.data_file);

    match cli.command {
        Commands::Search(args) => run_search(&store, args),
        Commands::Query { file } => run_query(&store, file.as_deref()),
        Commands::Options => {
            let dataset = store.snapshot()?;
            report::print_options(&dataset.branch_names(), &dataset.college_types());
            Ok(ExitCode::SUCCESS)
        }
        Commands::Admin(args) => run_admin(&config, &store, args).await,
    }
}

fn search(store: &DatasetStore, query: &SearchQuery) -> Result<SearchOutcome, RankError> {
    let dataset = store.snapshot()?;
    Ok(RankMatcher::new(dataset.records()).search(query))
}

/// Prints the caller-facing message; internal detail only goes to the log.
fn report_failure(e: &RankError) -> ExitCode {
    if e.kind() == rank_finder::ErrorKind::InternalError {
        error!(error = %e, "request failed");
    }
    eprintln!("❌ {}", e.public_message());
    ExitCode::FAILURE
}

fn build_query(args: &SearchArgs) -> Result<SearchQuery, RankError> {
    let mut query = SearchQuery::new(parse_rank(&args.rank)?)?;
    if let Some(category) = args.category.as_deref().filter(|c| !c.is_empty()) {
        query = query.with_category(category.parse()?);
    }
    if let Some(branch) = args.branch.as_deref().filter(|b| !b.is_empty()) {
        query = query.with_branch(branch);
    }
    if let Some(college_type) = args.college_type.as_deref().filter(|t| !t.is_empty()) {
        query = query.with_college_type(college_type);
    }
    Ok(query)
}

fn run_search(store: &DatasetStore, args: SearchArgs) -> Result<ExitCode> {
    let result = build_query(&args).and_then(|query| {
        let outcome = search(store, &query)?;
        Ok((query, outcome))
    });

    if args.json {
        let ok = result.is_ok();
        let response = SearchResponse::from_result(result.map(|(_, outcome)| outcome));
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE });
    }

    let (query, outcome) = match result {
        Ok(found) => found,
        Err(e) => return Ok(report_failure(&e)),
    };

    report::print_search_outcome(query.rank, &outcome);
    if let Some(path) = &args.csv {
        report::write_results_csv(&outcome.results, path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("📄 Results written to {}", path.display());
    }
    Ok(ExitCode::SUCCESS)
}

fn run_query(store: &DatasetStore, file: Option<&Path>) -> Result<ExitCode> {
    let content = match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read request: {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    let result = serde_json::from_str::<SearchRequest>(&content)
        .map_err(|_| RankError::InvalidInput("Invalid or missing JSON data".to_string()))
        .and_then(|request| request.validate())
        .and_then(|query| search(store, &query));

    if let Err(e) = &result {
        if e.kind() == rank_finder::ErrorKind::InternalError {
            error!(error = %e, "search request failed");
        }
    }

    let response = SearchResponse::from_result(result);
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(if response.is_success() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn login(config: &Config, args: &AdminArgs) -> Result<AdminSession, RankError> {
    let credentials = Credentials::load_or_create(Path::new(&config.credentials_file))?;
    credentials.authenticate(&args.username, &args.password)
}

async fn run_admin(config: &Config, store: &DatasetStore, args: AdminArgs) -> Result<ExitCode> {
    let session = match login(config, &args) {
        Ok(session) => session,
        Err(e) => return Ok(report_failure(&e)),
    };

    let outcome = match args.command {
        AdminCommands::Import { sources } => admin_import(config, store, &sources).await,
        AdminCommands::Clear => store.clear().map(|_| {
            println!("✅ All data cleared successfully!");
        }),
        AdminCommands::Template { output } => {
            let path = output.unwrap_or_else(|| Path::new(config.output_dir()).join(TEMPLATE_FILE_NAME));
            write_template(&path).map(|_| {
                println!("📄 Template written to {}", path.display());
            })
        }
        AdminCommands::Data => store
            .snapshot()
            .and_then(|dataset| Ok(serde_json::to_string_pretty(dataset.document())?))
            .map(|json| println!("{}", json)),
        AdminCommands::Stats { json } => store.snapshot().and_then(|dataset| {
            let stats = dataset.stats();
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                report::print_stats(&stats);
            }
            Ok(())
        }),
    };

    match outcome {
        Ok(()) => {
            info!(username = %session.username, "admin command complete");
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => Ok(report_failure(&e)),
    }
}

async fn admin_import(config: &Config, store: &DatasetStore, sources: &[String]) -> Result<(), RankError> {
    let sources = resolve_sources(sources, config)?;
    for source in &sources {
        println!("📄 Source: {}", source);
    }

    let scraper = TableScraper::new();
    let builder = DatasetBuilder::new(config.default_affiliation.clone());
    let summary = import_sources(store, &scraper, &builder, &sources).await?;

    println!("✅ Data uploaded successfully! {}", summary);
    if summary.skipped_rows > 0 {
        println!("   ⚠️  Skipped {} rows without an institute code", summary.skipped_rows);
    }
    if summary.dropped_cutoffs > 0 {
        println!("   ⚠️  Ignored {} unreadable cutoff cells", summary.dropped_cutoffs);
    }
    Ok(())
}
