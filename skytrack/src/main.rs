use clap::{Parser, Subcommand};
use skytrack::category::Category;
use skytrack::fetch::{CategoryAgent, FetchOutcome};
use skytrack::sheets::{SheetsClient, flatten_row};
use skytrack::store::RecordStore;
use skytrack::{Error, Result, export};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

/// SkyTrack: gathers satellite information with search-enabled AI agents and
/// keeps it in a local JSON store.
#[derive(Parser)]
#[command(name = "skytrack")]
struct Cli {
    /// Path of the backing JSON store.
    #[arg(long, env = "SKYTRACK_STORE", default_value = "satellite_data.json")]
    store: PathBuf,

    /// Model for the category agents (credentials via OPENAI_API_KEY).
    #[arg(long, env = "SKYTRACK_MODEL", default_value = "gpt-4o")]
    model: String,

    #[arg(long, default_value_t = 0.7)]
    temperature: f32,

    /// Upper bound in seconds for a single model request.
    #[arg(long, env = "SKYTRACK_TIMEOUT_SECS", default_value_t = 120)]
    timeout_secs: u64,

    #[arg(long, env = "TAVILY_API_KEY", hide_env_values = true)]
    tavily_key: Option<String>,

    /// Directory for per-fetch agent transcripts.
    #[arg(long, env = "SKYTRACK_LOG_DIR")]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch missing categories for one or more satellites.
    Fetch {
        names: Vec<String>,

        /// Restrict to one category instead of all three.
        #[arg(long)]
        category: Option<Category>,

        /// Refetch even when a record is already stored.
        #[arg(long)]
        refresh: bool,
    },

    /// Print stored records for a satellite.
    Show {
        name: String,

        #[arg(long)]
        category: Option<Category>,
    },

    /// List every satellite with at least one stored category.
    List,

    /// Remove all categories stored for a satellite.
    Delete { name: String },

    /// Export stored JSON (whole store when no name is given).
    Export {
        name: Option<String>,

        #[arg(long)]
        category: Option<Category>,

        /// Write to a file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Append one flattened row for a satellite to a Google Sheet.
    Upload {
        name: String,

        #[arg(long, env = "SKYTRACK_SPREADSHEET_ID")]
        spreadsheet_id: String,

        #[arg(long, env = "SKYTRACK_SHEETS_TOKEN", hide_env_values = true)]
        token: String,

        #[arg(long, default_value = "Sheet1")]
        range: String,

        /// Also append the header row (for a fresh sheet).
        #[arg(long)]
        with_headers: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let store = RecordStore::open(&cli.store)?;

    match cli.command {
        Command::Fetch {
            names,
            category,
            refresh,
        } => {
            let tavily_key = cli.tavily_key.ok_or(Error::Agent(agent::Error::MissingArg(
                "TAVILY_API_KEY is required for fetch".to_string(),
            )))?;

            let store = Arc::new(Mutex::new(store));
            let llm = agent::llm::OpenAI::new(
                cli.model,
                cli.temperature,
                std::time::Duration::from_secs(cli.timeout_secs),
            );
            let agents = CategoryAgent::new(llm, store.clone(), tavily_key, cli.log_dir);

            let categories = match category {
                Some(category) => vec![category],
                None => Category::ALL.to_vec(),
            };

            for name in names {
                for &category in &categories {
                    if !refresh && store.lock().unwrap().get(&name, category).is_some() {
                        tracing::info!(satellite = name, %category, "already stored, skipping");
                        continue;
                    }

                    match agents.fetch(&name, category).await {
                        FetchOutcome::Fetched(data) => {
                            store.lock().unwrap().append(&name, category, data)?;
                            println!("{} {}: stored", name, category);
                        }
                        FetchOutcome::Failed { reason, .. } => {
                            eprintln!("{} {}: {}", name, category, reason);
                        }
                    }
                }
            }
        }

        Command::Show { name, category } => {
            let exported = match category {
                Some(category) => export::category_json(&store, &name, category)?,
                None => export::combined_json(&store, &name)?,
            };
            match exported {
                Some(json) => println!("{}", json),
                None => println!("nothing stored for {}", name),
            }
        }

        Command::List => {
            for name in store.list_satellites() {
                println!("{}", name);
            }
        }

        Command::Delete { name } => {
            let mut store = store;
            store.delete(&name)?;
            println!("deleted {}", name);
        }

        Command::Export {
            name,
            category,
            output,
        } => {
            let json = match (&name, category) {
                (Some(name), Some(category)) => export::category_json(&store, name, category)?
                    .ok_or_else(|| Error::NoData(name.clone()))?,
                (Some(name), None) => {
                    export::combined_json(&store, name)?.ok_or_else(|| Error::NoData(name.clone()))?
                }
                (None, _) => store.to_pretty_json()?,
            };

            match output {
                Some(path) => std::fs::write(&path, json)?,
                None => println!("{}", json),
            }
        }

        Command::Upload {
            name,
            spreadsheet_id,
            token,
            range,
            with_headers,
        } => {
            let mut combined = BTreeMap::new();
            for category in Category::ALL {
                if let Some(record) = store.get(&name, category) {
                    combined.insert(category, record.data.clone());
                }
            }
            if combined.is_empty() {
                return Err(Error::NoData(name));
            }

            let row = flatten_row(&name, &combined);
            SheetsClient::new(spreadsheet_id, range, token)
                .append(&row, with_headers)
                .await?;
            println!("uploaded {} ({} columns)", name, row.values.len());
        }
    }

    Ok(())
}
