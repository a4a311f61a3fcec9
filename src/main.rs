use chrono::Utc;
use clap::{CommandFactory, Parser};
use docu::cli::{Cli, Commands};
use docu::commands::{self, FetchSummary};
use docu::config::Config;
use docu::explain::NoExplainer;
use docu::search::SearchResult;
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: u8) {
    let filter = match std::env::var("RUST_LOG") {
        Ok(env) if !env.is_empty() => EnvFilter::new(env),
        _ => match verbose {
            0 => EnvFilter::new("docu=info"),
            1 => EnvFilter::new("docu=debug"),
            _ => EnvFilter::new("docu=trace"),
        },
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let config = Config::load()?;

    match command {
        Commands::Fetch { docset, force } => {
            let runtime = tokio::runtime::Runtime::new()?;
            let summary = runtime.block_on(commands::fetch(&config, &docset, force))?;
            print_fetch_summary(&summary);
        }
        Commands::Search {
            query,
            limit,
            docset,
            min_score,
        } => {
            let mut options = commands::default_search_options(&config);
            options.docset = docset;
            if let Some(limit) = limit {
                options.limit = limit;
            }
            if let Some(min_score) = min_score {
                options.min_score = min_score;
            }

            let runtime = tokio::runtime::Runtime::new()?;
            let explained = runtime.block_on(commands::search_explained(
                &config,
                &query,
                &options,
                None::<&NoExplainer>,
            ))?;
            print_results(&query, &explained.results);
            if let Some(explanation) = explained.explanation {
                println!("\n{explanation}");
            }
        }
        Commands::Export {
            query,
            output,
            format,
            docset,
            limit,
        } => {
            let mut options = commands::default_search_options(&config);
            options.docset = docset;
            options.limit = limit;

            let summary = commands::export(&config, &query, &options, format, &output)?;
            match summary.path {
                Some(path) => {
                    println!("Exported {} result(s) to {}", summary.results, path.display());
                    println!("  Format: {}", summary.format);
                    println!("  Size: {} bytes", summary.bytes);
                }
                None => println!("No results found for '{query}'"),
            }
        }
        Commands::List => {
            let installed = commands::list(&config)?;
            if installed.is_empty() {
                println!("No docsets installed. Use `docu fetch <docset>` to download one.");
                return Ok(());
            }

            let now = Utc::now();
            for metadata in &installed {
                println!(
                    "{:<14} {:>5} docs  fetched {}",
                    metadata.name,
                    metadata.total_docs,
                    metadata.age_label(now)
                );
            }
        }
        Commands::Available => {
            for (i, docset) in commands::available(&config).iter().enumerate() {
                let marker = if docset.installed { " [installed]" } else { "" };
                println!(
                    "{:>2}. {:<14} {} ({}){marker}",
                    i + 1,
                    docset.name,
                    docset.description,
                    docset.base_url
                );
            }
        }
        Commands::Remove { docset } => {
            commands::remove(&config, &docset)?;
            println!("Removed docset: {docset}");
        }
        Commands::Update { docset, all, check } => {
            let installed = commands::list(&config)?;
            if installed.is_empty() {
                println!("No docsets installed to update.");
                return Ok(());
            }

            let names: Vec<String> = match (docset, all) {
                (Some(name), _) => vec![name],
                (None, true) => installed.into_iter().map(|m| m.name).collect(),
                (None, false) => {
                    let now = Utc::now();
                    for metadata in &installed {
                        println!("{:<14} last updated {}", metadata.name, metadata.age_label(now));
                    }
                    println!("Use --all to update every docset, or name one.");
                    return Ok(());
                }
            };

            if check {
                for status in commands::check_updates(&config, Utc::now())?
                    .iter()
                    .filter(|s| names.contains(&s.name))
                {
                    let state = if status.stale { "update available" } else { "up to date" };
                    println!("{:<14} {state} ({})", status.name, status.age);
                }
                return Ok(());
            }

            let runtime = tokio::runtime::Runtime::new()?;
            let outcomes = runtime.block_on(commands::update(&config, &names));
            let mut failed = 0;
            for outcome in &outcomes {
                match &outcome.result {
                    Ok(summary) => print_fetch_summary(summary),
                    Err(e) => {
                        failed += 1;
                        eprintln!("Failed to update {}: {e}", outcome.name);
                    }
                }
            }

            if failed > 0 {
                anyhow::bail!("{failed} of {} docset(s) failed to update", outcomes.len());
            }
        }
        #[cfg(feature = "mcp")]
        Commands::Serve => {
            tokio::runtime::Runtime::new()?.block_on(docu::mcp::serve(config))?;
        }
    }

    Ok(())
}

fn print_fetch_summary(summary: &FetchSummary) {
    println!(
        "Fetched {}: {} documents from {} page(s)",
        summary.name, summary.documents, summary.pages_succeeded
    );
    if summary.pages_failed > 0 {
        println!("  {} page(s) failed:", summary.pages_failed);
        for failure in &summary.failures {
            println!("    {} ({}): {}", failure.url, failure.kind, failure.message);
        }
    }
}

fn print_results(query: &str, results: &[SearchResult]) {
    if results.is_empty() {
        println!("No results found for '{query}'");
        return;
    }

    for (i, result) in results.iter().enumerate() {
        println!(
            "{}. {} [{}] (score: {:.2})",
            i + 1,
            result.title,
            result.docset,
            result.score
        );
        println!("   {}", result.url);
        if !result.snippet.is_empty() {
            println!("   {}", result.snippet);
        }
        println!();
    }
    println!("{} result(s) found", results.len());
}
