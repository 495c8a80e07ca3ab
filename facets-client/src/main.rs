use anyhow::Context;
use clap::Parser;
use env_logger::{Builder, Target};
use facets_client::{EngineConfig, ProfileEngine};
use facets_model::{Section, UserId};
use log::LevelFilter;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "facets-inspect")]
#[command(
    about = "Hydrate profile sections from a server and print what the engine would show"
)]
struct Cli {
    /// Owning user id
    #[arg(long, env = "FACETS_OWNER")]
    owner: Uuid,

    /// Server URL (overrides config)
    #[arg(long)]
    server: Option<String>,

    /// Photos per display page (overrides config)
    #[arg(long)]
    page_size: Option<usize>,

    /// Sections to inspect; all of them when omitted
    #[arg(value_name = "SECTION")]
    sections: Vec<Section>,
}

fn init_logger() {
    Builder::new()
        .target(Target::Stderr)
        .filter_level(LevelFilter::Warn)
        .filter_module("facets_client", LevelFilter::Debug)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if std::env::var("RUST_LOG").is_err() {
        init_logger();
    } else {
        env_logger::init();
    }

    let cli = Cli::parse();
    let mut config = EngineConfig::load();
    if let Some(server) = cli.server {
        config.server_url = server;
    }
    let page_size = cli.page_size.unwrap_or(config.page_size);
    let sections = if cli.sections.is_empty() {
        Section::ALL.to_vec()
    } else {
        cli.sections
    };

    let engine = ProfileEngine::connect(config, UserId(cli.owner))
        .context("failed to build profile client")?;

    for section in sections {
        engine
            .hydrate(section)
            .await
            .with_context(|| format!("failed to load {section}"))?;

        println!("[{section}]");
        match engine.primary_photo_url(section) {
            Some(url) => println!("  primary: {url}"),
            None => println!("  primary: none"),
        }

        let page = engine.display_photos(section, page_size);
        for photo in &page.photos {
            println!("  photo {} ({})", photo.id, photo.content.source());
        }
        if page.has_more {
            println!("  ...");
        }

        let preferences = engine.effective_preferences(section);
        for (field, visible) in preferences.iter() {
            println!("  {field}: {}", if visible { "shown" } else { "hidden" });
        }
    }

    Ok(())
}
