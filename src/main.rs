//! CLI entry point for `email-settings`.

use std::path::PathBuf;
use std::time::Duration;

use clap::{CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;

use email_settings::config::{self, Config};
use email_settings::{EmailSettings, HttpTransport};

#[derive(Parser)]
#[command(
    name = "email-settings",
    version,
    about = "Look up the provider-discovery settings of an email account"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file to use instead of the default location
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// Override the API base URL
    #[arg(long, value_name = "URL", global = true)]
    base_url: Option<String>,

    /// API key
    #[arg(long, env = "EMAIL_SETTINGS_API_KEY", hide_env_values = true, global = true)]
    api_key: Option<String>,

    /// API secret
    #[arg(long, env = "EMAIL_SETTINGS_API_SECRET", hide_env_values = true, global = true)]
    api_secret: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover the settings for an email address
    Discover {
        email: String,
        /// Source type to query (defaults to the configured one, "IMAP")
        #[arg(short, long)]
        source_type: Option<String>,
        /// Only print these attributes; fails if one is missing
        #[arg(short, long = "field", value_name = "NAME")]
        fields: Vec<String>,
        #[arg(long)]
        json: bool,
    },
    /// Show the effective configuration
    Config {
        /// Print the config file path instead of its contents
        #[arg(long)]
        path: bool,
        /// Write the effective configuration to the config file
        #[arg(long, conflicts_with = "path")]
        save: bool,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = config::load_config_reporting(cli.config.as_deref(), std::io::stderr);
    if let Some(url) = cli.base_url {
        config.api.base_url = url;
    }
    if cli.api_key.is_some() {
        config.api.key = cli.api_key;
    }
    if cli.api_secret.is_some() {
        config.api.secret = cli.api_secret;
    }

    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Commands::Discover {
            email,
            source_type,
            fields,
            json,
        } => cmd_discover(&config, &email, source_type, &fields, json),
        Commands::Config { path, save } => cmd_config(&config, cli.config.as_deref(), path, save),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "email-settings.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Resolve settings for one address and print them.
fn cmd_discover(
    config: &Config,
    email: &str,
    source_type: Option<String>,
    fields: &[String],
    json: bool,
) -> anyhow::Result<()> {
    let source_type = source_type.unwrap_or_else(|| config.general.default_source_type.clone());
    let transport = HttpTransport::new(&config.api)?;
    let settings = EmailSettings::with_source_type(&transport, email, source_type);

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .expect("valid template"),
    );
    pb.set_message(format!("Discovering settings for {email}"));
    pb.enable_steady_tick(Duration::from_millis(100));

    let result: email_settings::Result<Vec<(String, Value)>> = if fields.is_empty() {
        settings.fetch_attributes().map(|_| {
            settings
                .attributes()
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect()
        })
    } else {
        fields
            .iter()
            .map(|name| settings.get(name).map(|v| (name.clone(), v)))
            .collect()
    };
    pb.finish_and_clear();
    let values = result?;

    if json {
        let object: serde_json::Map<String, Value> = values.into_iter().collect();
        let output = serde_json::json!({
            "email": settings.email(),
            "source_type": settings.source_type(),
            "attributes": object,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_settings_table(settings.email(), settings.source_type(), &values);
    }

    Ok(())
}

/// Print or save the effective configuration.
fn cmd_config(
    config: &Config,
    explicit: Option<&std::path::Path>,
    path: bool,
    save: bool,
) -> anyhow::Result<()> {
    if path {
        match explicit.map(PathBuf::from).or_else(config::config_file_path) {
            Some(p) => println!("{}", p.display()),
            None => anyhow::bail!("Could not determine config file path"),
        }
        return Ok(());
    }

    if save {
        match explicit {
            Some(p) => config::save_config_to(config, p)?,
            None => config::save_config(config)?,
        }
        return Ok(());
    }

    print!("{}", toml::to_string_pretty(config)?);
    println!("# log file: {}", config::log_file_path(config).display());
    Ok(())
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "email-settings", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

/// Print resolved attributes as a human-readable table.
fn print_settings_table(email: &str, source_type: &str, values: &[(String, Value)]) {
    println!();
    println!("  {:<20} {}", "Email", email);
    println!("  {:<20} {}", "Source type", source_type);
    println!("  {}", "-".repeat(60));
    for (name, value) in values {
        println!("  {:<20} {}", name, render_value(value));
    }
    println!();
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) if items.iter().all(Value::is_string) => items
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}
