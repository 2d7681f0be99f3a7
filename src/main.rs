use std::{io::BufRead, path::PathBuf};

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use log::{LevelFilter, info, warn};
use member_scraper::{
    AggregationSink, CredentialStore, LoadFromEnv, Overrides, ScrapingConfig, ScrapingContext,
    SessionEnv, SessionToken,
};
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(author, version, about = "Collects institution member listings through a fetch proxy")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Store the cookies of a session you logged into by hand.
    Login {
        /// `Cookie:` header copied from the logged-in browser; read from
        /// stdin when omitted.
        #[arg(long)]
        cookie: Option<String>,
        #[arg(long)]
        session: Option<PathBuf>,
    },
    /// Show which session is stored (names only, never values).
    Session {
        #[arg(long)]
        session: Option<PathBuf>,
    },
    /// Scrape every source and write the combined CSV.
    Scrape {
        /// Source base URL; repeat for several. Overrides MEMBER_SOURCES.
        #[arg(long = "source")]
        sources: Vec<String>,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        session: Option<PathBuf>,
        /// Hard cap on pages fetched per source.
        #[arg(long)]
        max_pages: Option<u32>,
        /// Number of sources collected at once.
        #[arg(long)]
        concurrency: Option<usize>,
    },
}

fn session_store(session: Option<PathBuf>) -> anyhow::Result<CredentialStore> {
    let path = match session {
        Some(path) => path,
        None => SessionEnv::load_from_env()?.session_path,
    };
    Ok(CredentialStore::new(path))
}

fn login(cookie: Option<String>, session: Option<PathBuf>) -> anyhow::Result<()> {
    let header = match cookie {
        Some(header) => header,
        None => {
            eprintln!("Paste the Cookie header of your logged-in browser session:");
            let mut line = String::new();
            std::io::stdin()
                .lock()
                .read_line(&mut line)
                .context("failed to read cookie header from stdin")?;
            line
        }
    };
    let token = SessionToken::from_cookie_header(&header)?;
    session_store(session)?.save(&token)?;
    Ok(())
}

fn show_session(session: Option<PathBuf>) -> anyhow::Result<()> {
    let store = session_store(session)?;
    let token = store.load()?;
    println!("{}", store.path().display());
    match token.saved_at() {
        Some(saved_at) => println!("saved at {saved_at}"),
        None => println!("saved at unknown time"),
    }
    for name in token.cookie_names() {
        println!("  {name}");
    }
    Ok(())
}

async fn scrape(overrides: Overrides) -> anyhow::Result<()> {
    let config = ScrapingConfig::new(overrides)?;
    let context = ScrapingContext::from_config(&config)
        .context("cannot start an authenticated scrape")?;
    let sink = AggregationSink::new(&config.output_path);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing with what has been collected");
            on_interrupt.cancel();
        }
    });

    let report = context.run(&config.sources, &sink, &cancel).await;
    println!("{report}");

    if let Err(e) = &report.write {
        bail!("{} records were collected but not saved: {e}", report.total_records());
    }
    if report.failed_sources() > 0 {
        warn!("{} source(s) failed", report.failed_sources());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::Builder::new()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Login { cookie, session } => login(cookie, session),
        Command::Session { session } => show_session(session),
        Command::Scrape {
            sources,
            output,
            session,
            max_pages,
            concurrency,
        } => {
            info!("Starting member scrape");
            scrape(Overrides {
                sources,
                output_path: output,
                session_path: session,
                max_pages,
                concurrency,
            })
            .await
        }
    }
}
