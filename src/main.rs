use clap::{Parser, Subcommand};
use color_eyre::eyre::{eyre, Result};
use pahe_stream::{config::Config, initialize_logging_from_crate_name, search, serve, Pahe};
use serde::Serialize;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    initialize_logging_from_crate_name()?;
    let cli = Cli::parse();
    let config = Config::load()?;
    match cli.commands {
        Commands::Validate => validate(&config)?,
        command => run(command, &config).await?,
    }

    Ok(())
}

fn validate(config: &Config) -> Result<()> {
    print!("{}", toml::to_string(config)?);
    Ok(())
}

async fn run(command: Commands, config: &Config) -> Result<()> {
    let pahe = Pahe::from_config(config)?;
    info!("using {}", pahe.origin());
    match command {
        Commands::Search { title, raw } => {
            let envelope = pahe
                .search(&title)
                .await
                .ok_or_else(|| eyre!("search for {title:?} failed"))?;
            if raw {
                print_json(&envelope)?;
            } else {
                for hit in search::hits(&envelope) {
                    println!(
                        "{}\t{}\t{}\t{}",
                        hit.session,
                        hit.title,
                        hit.kind.unwrap_or_default(),
                        hit.episodes.map(|e| e.to_string()).unwrap_or_default()
                    );
                }
            }
        }
        Commands::Episodes { id } => print_json(&pahe.episodes(&id).await)?,
        Commands::Sources { episode } => {
            let result = pahe
                .sources(&episode)
                .await
                .ok_or_else(|| eyre!("player page for {episode} unavailable"))?;
            print_json(&result)?;
        }
        Commands::Manifest { url } => {
            let manifest = pahe
                .resolve_manifest(&url)
                .await
                .ok_or_else(|| eyre!("no manifest behind {url}"))?;
            println!("{manifest}");
        }
        Commands::Serve => serve::serve(pahe, config.port).await?,
        Commands::Validate => validate(config)?,
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    #[clap(subcommand)]
    commands: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search shows by title
    Search {
        title: String,
        /// print the api response as is
        #[clap(long)]
        raw: bool,
    },
    /// List every episode of a show
    Episodes {
        /// show session id, from search
        id: String,
    },
    /// Resolve the streams of one episode
    Sources {
        /// `<show session>/<episode session>`
        episode: String,
    },
    /// Resolve a single kwik link
    Manifest { url: String },
    /// Serve the http api
    Serve,
    /// Check the config file
    Validate,
}
