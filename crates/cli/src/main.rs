mod echo;

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, bail};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use echo::{
    ConsoleSink, format_size, print_banner, print_info, print_step, print_success, print_timing, print_warning,
};
use gleaner_core::config::ExtraField;
use gleaner_core::session::{BasicCredentials, MemoryCredentials, origin_of};
use gleaner_core::{
    ArticleContent, ArticleLoader, ConfigStore, ExtractOptions, ExtractionMode, FeedAuthConfig, FeedSelectorConfig,
    FetchConfig, FileBackend, HttpTransport, LoadOutcome, LoadRequest, Operation, OutputFormat, Readability,
    ReadabilityConfig, fetch_file, fetch_stdin, resolve_selector_content, rewrite_through_proxy,
};
use owo_colors::OwoColorize;
use tracing_subscriber::EnvFilter;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Extract readable articles from feed item pages
#[derive(Parser, Debug)]
#[command(name = "gleaner")]
#[command(version)]
#[command(about = "Extract readable articles from feed item pages", long_about = None)]
struct Cli {
    /// Feed configuration directory (default: ~/.config/gleaner)
    #[arg(long, global = true, value_name = "DIR", env = "GLEANER_STORE")]
    store: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract the article from a URL, a local HTML file, or "-" for stdin
    Extract(ExtractArgs),
    /// Manage a feed's selector rules and custom CSS
    #[command(subcommand)]
    Selector(SelectorCommand),
    /// Manage a feed's site login
    #[command(subcommand)]
    Auth(AuthCommand),
    /// Generate a shell completion script
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Readability,
    Selectors,
}

impl From<Mode> for ExtractionMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Readability => ExtractionMode::Readability,
            Mode::Selectors => ExtractionMode::Selectors,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Html,
    Text,
    Json,
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Html => OutputFormat::Html,
            Format::Text => OutputFormat::PlainText,
            Format::Json => OutputFormat::Json,
        }
    }
}

#[derive(Args, Debug)]
struct ExtractArgs {
    /// URL to fetch, local HTML file, or "-" for stdin
    #[arg(value_name = "INPUT")]
    input: String,

    /// Page URL for resolving relative links in file or stdin input
    #[arg(long, value_name = "URL")]
    url: Option<String>,

    /// Feed whose selectors and login apply
    #[arg(long, default_value = "default", value_name = "ID")]
    feed: String,

    /// Extraction engine
    #[arg(short, long, value_enum, default_value = "readability")]
    mode: Mode,

    /// Output format
    #[arg(short, long, value_enum, default_value = "html")]
    format: Format,

    /// Minimum characters of article text
    #[arg(long, value_name = "NUM")]
    min_length: Option<usize>,

    /// Output file (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Route image URLs through this proxy endpoint
    #[arg(long, value_name = "BASE")]
    proxy: Option<String>,

    /// Master secret that unlocks the feed's stored login
    #[arg(long, env = "GLEANER_MASTER_KEY", hide_env_values = true)]
    master_key: Option<String>,

    /// HTTP Basic username for the article's site
    #[arg(long, requires = "basic_password")]
    basic_user: Option<String>,

    /// HTTP Basic password for the article's site
    #[arg(long, requires = "basic_user", env = "GLEANER_BASIC_PASSWORD", hide_env_values = true)]
    basic_password: Option<String>,

    /// HTTP timeout in seconds
    #[arg(long, default_value = "30", value_name = "SECS")]
    timeout: u64,

    /// Custom User-Agent for HTTP requests
    #[arg(long, value_name = "UA")]
    user_agent: Option<String>,
}

#[derive(Subcommand, Debug)]
enum SelectorCommand {
    /// Append a rule
    Add {
        #[arg(long)]
        feed: String,
        selector: String,
        /// Remove matches instead of keeping them
        #[arg(long)]
        exclude: bool,
    },
    /// Insert a rule at a position
    Insert {
        #[arg(long)]
        feed: String,
        index: usize,
        selector: String,
        #[arg(long)]
        exclude: bool,
    },
    /// Remove a rule by id
    Remove {
        #[arg(long)]
        feed: String,
        id: String,
    },
    /// Move a rule to a new position
    Move {
        #[arg(long)]
        feed: String,
        id: String,
        index: usize,
    },
    /// List a feed's rules, or every configured feed
    List {
        #[arg(long)]
        feed: Option<String>,
    },
    /// Set or clear a feed's custom CSS
    Css {
        #[arg(long)]
        feed: String,
        #[arg(conflicts_with = "clear")]
        css: Option<String>,
        #[arg(long)]
        clear: bool,
    },
}

#[derive(Subcommand, Debug)]
enum AuthCommand {
    /// Store a login (the password is encrypted with the master key)
    Set(AuthSetArgs),
    /// Show a feed's login without the password
    Show {
        #[arg(long)]
        feed: String,
        #[arg(long, env = "GLEANER_MASTER_KEY", hide_env_values = true)]
        master_key: Option<String>,
    },
    /// Remove a feed's login
    Clear {
        #[arg(long)]
        feed: String,
    },
}

#[derive(Args, Debug)]
struct AuthSetArgs {
    #[arg(long)]
    feed: String,
    /// Page holding the login form
    #[arg(long, value_name = "URL")]
    login_url: String,
    #[arg(long)]
    username: String,
    #[arg(long, env = "GLEANER_PASSWORD", hide_env_values = true)]
    password: String,
    #[arg(long, default_value = "username")]
    username_field: String,
    #[arg(long, default_value = "password")]
    password_field: String,
    /// Extra form field as NAME=VALUE; an empty VALUE is read from the login page
    #[arg(long = "extra", value_name = "NAME=VALUE", value_parser = parse_extra_field)]
    extra_fields: Vec<ExtraField>,
    /// Selector whose text confirms the login
    #[arg(long)]
    response_selector: Option<String>,
    #[arg(long, value_name = "URL")]
    logout_url: Option<String>,
    #[arg(long, env = "GLEANER_MASTER_KEY", hide_env_values = true)]
    master_key: String,
}

fn parse_extra_field(raw: &str) -> Result<ExtraField, String> {
    let (name, value) = raw.split_once('=').unwrap_or((raw, ""));
    if name.trim().is_empty() {
        return Err(format!("invalid field '{raw}', expected NAME=VALUE"));
    }
    Ok(ExtraField::new(name.trim(), value))
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt().with_writer(std::io::stderr).with_env_filter(filter).try_init();
}

fn open_store(dir: Option<&PathBuf>) -> anyhow::Result<ConfigStore<FileBackend>> {
    let backend = match dir {
        Some(dir) => FileBackend::new(dir),
        None => FileBackend::open_default().context("Failed to locate the configuration directory")?,
    };
    ConfigStore::open(backend).context("Failed to read feed configuration")
}

fn is_url(input: &str) -> bool {
    url::Url::parse(input).is_ok_and(|url| matches!(url.scheme(), "http" | "https"))
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Extract(args) => run_extract(args, cli.store.as_ref(), cli.verbose).await,
        Command::Selector(command) => {
            run_selector(command, &open_store(cli.store.as_ref())?)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Auth(command) => {
            run_auth(command, &open_store(cli.store.as_ref())?)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "gleaner", &mut std::io::stdout());
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn run_extract(args: ExtractArgs, store_dir: Option<&PathBuf>, verbose: bool) -> anyhow::Result<ExitCode> {
    if verbose {
        print_banner();
    }
    let store = open_store(store_dir)?;
    let mut config = ReadabilityConfig::default();
    if let Some(min_length) = args.min_length {
        config.min_text_length = min_length;
    }
    let reader = Readability::with_config(config);

    let article = if is_url(&args.input) {
        match load_url(&args, store, reader, verbose).await? {
            Some(article) => article,
            None => return Ok(ExitCode::FAILURE),
        }
    } else {
        extract_local(&args, &store, &reader, verbose)?
    };

    let mut article = article;
    if let Some(proxy) = &args.proxy {
        let content = rewrite_through_proxy(&article.content, proxy);
        article = article.with_content(content);
    }

    let output = article.to_format(args.format.into()).context("Failed to render article")?;
    match &args.output {
        Some(path) => {
            fs::write(path, output).with_context(|| format!("Failed to write to file: {}", path.display()))?;
            print_success(&format!("Output written to {}", path.display().bright_white()));
        }
        None => print!("{}", output),
    }
    Ok(ExitCode::SUCCESS)
}

async fn load_url(
    args: &ExtractArgs, store: ConfigStore<FileBackend>, reader: Readability, verbose: bool,
) -> anyhow::Result<Option<ArticleContent>> {
    let fetch_config = FetchConfig {
        timeout: args.timeout,
        user_agent: args.user_agent.clone().unwrap_or_else(|| FetchConfig::default().user_agent),
        ..Default::default()
    };
    let transport = Arc::new(HttpTransport::new(fetch_config).context("Failed to build HTTP client")?);

    let credentials = Arc::new(MemoryCredentials::new());
    if let (Some(user), Some(password)) = (&args.basic_user, &args.basic_password) {
        let origin = origin_of(&args.input)?;
        credentials.insert(origin, BasicCredentials::new(user, password));
    }

    let loader = ArticleLoader::new(transport, Arc::new(store)).with_credentials(credentials).with_reader(reader);
    tracing::debug!(feed = %args.feed, mode = ?args.mode, "loading {}", args.input);
    let mut request = LoadRequest::new(&args.feed, &args.input, args.mode.into());
    if let Some(key) = &args.master_key {
        request = request.with_master_secret(key);
    }

    let started = Instant::now();
    let outcome = loader.load(&request, &ConsoleSink { verbose }).await;
    if verbose {
        print_timing("Load", started.elapsed());
    }

    match outcome {
        LoadOutcome::Displayed(view) => {
            let title = view.title.unwrap_or_default();
            Ok(Some(ArticleContent::new(title, view.byline, view.content, None, None)))
        }
        LoadOutcome::CredentialsNeeded(_) => {
            print_info("Pass --basic-user and --basic-password to retry with credentials");
            Ok(None)
        }
        LoadOutcome::Failed(_) | LoadOutcome::Superseded => Ok(None),
    }
}

fn extract_local(
    args: &ExtractArgs, store: &ConfigStore<FileBackend>, reader: &Readability, verbose: bool,
) -> anyhow::Result<ArticleContent> {
    let html = if args.input == "-" {
        if verbose {
            print_step(1, 2, "Reading from stdin");
        }
        fetch_stdin().context("Failed to read from stdin")?
    } else {
        if verbose {
            print_step(1, 2, &format!("Reading from file {}", args.input.bright_white()));
        }
        fetch_file(&args.input).with_context(|| format!("Failed to read file: {}", args.input))?
    };

    if verbose {
        eprintln!("  {} {}", "Size:".dimmed(), format_size(html.len()).bright_white());
        print_step(2, 2, "Extracting main content");
    }

    let started = Instant::now();
    let article = match args.mode {
        Mode::Readability => {
            let options = ExtractOptions { url: args.url.clone(), min_text_length: args.min_length };
            reader.extract_refined(&html, &options).context("Could not extract a readable article from this input")?
        }
        Mode::Selectors => {
            let config = store.get(&args.feed).unwrap_or_else(|| FeedSelectorConfig::new(&args.feed));
            let content = resolve_selector_content(&html, &config)?.into_html();
            let title = gleaner_core::Document::parse(&html).title().unwrap_or_default();
            let article = ArticleContent::new(title, None, content, None, None);
            if article.length == 0 {
                bail!(gleaner_core::GleanerError::SelectorsNoContent);
            }
            article
        }
    };
    if verbose {
        print_timing("Extraction", started.elapsed());
    }
    Ok(article)
}

fn operation(exclude: bool) -> Operation {
    if exclude { Operation::Exclude } else { Operation::Include }
}

fn run_selector(command: SelectorCommand, store: &ConfigStore<FileBackend>) -> anyhow::Result<()> {
    match command {
        SelectorCommand::Add { feed, selector, exclude } => {
            let item = store.add_selector(&feed, &selector, operation(exclude))?;
            println!("{}", item.id);
        }
        SelectorCommand::Insert { feed, index, selector, exclude } => {
            let item = store.insert_selector(&feed, index, &selector, operation(exclude))?;
            println!("{}", item.id);
        }
        SelectorCommand::Remove { feed, id } => {
            if !store.remove_selector(&feed, &id)? {
                bail!("No rule {id} in feed {feed}");
            }
            print_success(&format!("Removed rule {id}"));
        }
        SelectorCommand::Move { feed, id, index } => {
            if !store.move_selector(&feed, &id, index)? {
                bail!("No rule {id} in feed {feed}");
            }
            print_success(&format!("Moved rule {id}"));
        }
        SelectorCommand::List { feed: Some(feed) } => {
            let Some(config) = store.get(&feed) else {
                print_warning(&format!("Feed {feed} has no configuration"));
                return Ok(());
            };
            for item in &config.selectors {
                println!("{}\t{}\t{}\t{}", item.order, item.operation, item.selector, item.id);
            }
            if let Some(css) = &config.custom_css {
                println!("css\t{css}");
            }
        }
        SelectorCommand::List { feed: None } => {
            for feed in store.feeds() {
                println!("{feed}");
            }
        }
        SelectorCommand::Css { feed, css, clear } => {
            if css.is_none() && !clear {
                bail!("Pass CSS text or --clear");
            }
            store.set_custom_css(&feed, css)?;
            print_success(&format!("Updated custom CSS for {feed}"));
        }
    }
    Ok(())
}

fn run_auth(command: AuthCommand, store: &ConfigStore<FileBackend>) -> anyhow::Result<()> {
    match command {
        AuthCommand::Set(args) => {
            let auth = FeedAuthConfig {
                login_url: args.login_url,
                username_field: args.username_field,
                password_field: args.password_field,
                username: args.username,
                password: args.password,
                extra_fields: args.extra_fields,
                response_selector: args.response_selector,
                logout_url: args.logout_url,
            };
            store.save_auth_config(&args.feed, &auth, &args.master_key)?;
            print_success(&format!("Stored login for {}", args.feed));
        }
        AuthCommand::Show { feed, master_key } => {
            let Some(stored) = store.get(&feed).and_then(|c| c.auth_config) else {
                print_warning(&format!("Feed {feed} has no login"));
                return Ok(());
            };
            println!("login_url\t{}", stored.login_url);
            println!("username\t{}", stored.username);
            println!("fields\t{} / {}", stored.username_field, stored.password_field);
            for extra in &stored.extra_fields {
                let value = if extra.is_dynamic() { "<from login page>" } else { extra.value.as_str() };
                println!("extra\t{}={}", extra.name, value);
            }
            if let Some(logout) = &stored.logout_url {
                println!("logout_url\t{logout}");
            }
            let unlocked = store.load_auth_config(&feed, master_key.as_deref()).is_some();
            println!("password\t{}", if unlocked { "unlocks with this master key" } else { "locked" });
        }
        AuthCommand::Clear { feed } => {
            store.clear_auth_config(&feed)?;
            print_success(&format!("Removed login for {feed}"));
        }
    }
    Ok(())
}
