use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use price_bot::access::AccessControl;
use price_bot::bot::Bot;
use price_bot::io::users::{JsonFileStore, UserId};
use price_bot::source::{DatasetSource, LocalWorkbook, RemoteWorkbook};
use price_bot::telegram::{self, TelegramClient};
use price_bot::{Result, aggregate, logging, query, report};
use tracing::info;

fn main() {
    let cli = Cli::parse();
    if let Err(error) = logging::init(cli.verbose).and_then(|()| run(cli)) {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run(args) => execute_run(args),
        Command::Query(args) => execute_query(args),
    }
}

fn execute_run(args: RunArgs) -> Result<()> {
    let source = RemoteWorkbook::new(&args.source_url, &args.cache_file);
    info!("downloading workbook");
    let dataset = source.load()?;
    info!(sheets = dataset.len(), "workbook loaded into memory");

    let access = AccessControl::new(args.admin_id, JsonFileStore::new(&args.users_file))?;
    let mut bot = Bot::new(access, source, dataset);

    let poll_timeout = Duration::from_secs(args.poll_timeout);
    let client = TelegramClient::new(&args.token, poll_timeout)?;
    telegram::serve(&client, &mut bot, poll_timeout)
}

fn execute_query(args: QueryArgs) -> Result<()> {
    let dataset = match (&args.workbook, &args.source_url) {
        (Some(path), _) => LocalWorkbook::new(path).load()?,
        (None, Some(url)) => RemoteWorkbook::new(url, &args.cache_file).load()?,
        (None, None) => LocalWorkbook::new(&args.cache_file).load()?,
    };

    let query = query::parse(&args.text)?;
    let mut summaries = aggregate::summarize(&dataset, &query);
    if summaries.is_empty() {
        println!("no sales found");
        return Ok(());
    }
    report::rank(&mut summaries);
    print!("{}", report::render(&summaries, query.period));
    Ok(())
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Telegram bot answering supplier sales lookups from a shared workbook."
)]
struct Cli {
    /// Enable debug logging when RUST_LOG is not set.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Download the workbook and serve the bot.
    Run(RunArgs),
    /// Run a single lookup against a workbook and print the table.
    Query(QueryArgs),
}

#[derive(clap::Args)]
struct RunArgs {
    /// Bot API token.
    #[arg(long, env = "PRICE_BOT_TOKEN", hide_env_values = true)]
    token: String,

    /// Telegram id of the administrator.
    #[arg(long, env = "PRICE_BOT_ADMIN_ID")]
    admin_id: UserId,

    /// URL of the workbook to download on startup and on /reload.
    #[arg(long, env = "PRICE_BOT_SOURCE_URL")]
    source_url: String,

    /// Where the downloaded workbook is cached.
    #[arg(long, env = "PRICE_BOT_CACHE_FILE", default_value = "svodna_tablycya.xlsx")]
    cache_file: PathBuf,

    /// JSON file holding the allow-list.
    #[arg(long, env = "PRICE_BOT_USERS_FILE", default_value = "allowed_users.json")]
    users_file: PathBuf,

    /// Long-polling window in seconds.
    #[arg(long, default_value_t = 30)]
    poll_timeout: u64,
}

#[derive(clap::Args)]
struct QueryArgs {
    /// Lookup text, e.g. "VRP350/VRP 350, січень-грудень 2024".
    text: String,

    /// Local workbook to read instead of downloading.
    #[arg(long)]
    workbook: Option<PathBuf>,

    /// URL of the workbook to download.
    #[arg(long, env = "PRICE_BOT_SOURCE_URL")]
    source_url: Option<String>,

    /// Download target, or the workbook to read when no source is given.
    #[arg(long, env = "PRICE_BOT_CACHE_FILE", default_value = "svodna_tablycya.xlsx")]
    cache_file: PathBuf,
}
