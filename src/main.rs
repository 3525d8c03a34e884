use anyhow::Result;
use clap::Parser;
use green_genie::config::GenieConfig;
use green_genie::llm::{explain, LlmClient};
use green_genie::loader::DatasetLoader;
use green_genie::prompt::ExplanationRequest;
use green_genie::schema::sector_options;
use green_genie::selector::{generate_recommendation, SelectionOptions, SelectionOutcome};
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "green-genie")]
#[command(about = "ESG-aware investment recommendations with a plain-language explanation")]
struct Args {
    /// Sector to recommend from ("All" for every sector)
    #[arg(short, long, default_value = "All")]
    sector: String,

    /// Risk tolerance; one of the configured levels (Low, Medium, High by default)
    #[arg(short, long, default_value = "Low")]
    risk: String,

    /// Free-form investment goals passed along to the explanation
    #[arg(short, long)]
    notes: Option<String>,

    /// Base directory holding data/*.csv fallbacks (overrides LOCAL_BASE_DIR)
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Maximum number of picks for ranked and random policies
    #[arg(long)]
    top_n: Option<usize>,

    /// Seed for the random selection policy
    #[arg(long)]
    seed: Option<u64>,

    /// Read local files only, skipping object storage
    #[arg(long)]
    offline: bool,

    /// Skip the LLM explanation
    #[arg(long)]
    no_explain: bool,

    /// Print the picks as JSON rows instead of a table
    #[arg(long)]
    json: bool,

    /// Print the available sectors and exit
    #[arg(long)]
    list_sectors: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let mut config = GenieConfig::from_env()?;
    if let Some(dir) = args.data_dir {
        config.storage.local_base_dir = dir;
    }
    if let Some(top_n) = args.top_n {
        config.top_n = top_n;
    }
    if let Some(seed) = args.seed {
        config.random_seed = seed;
    }
    config.storage.offline |= args.offline;
    config.validate()?;

    let loader = DatasetLoader::new(config.storage.clone());
    let data = match loader.load_all().await {
        Ok(data) => data,
        Err(e) => {
            error!("Failed to load data: {}", e);
            eprintln!("No data available: {}", e);
            std::process::exit(1);
        }
    };

    if args.list_sectors {
        for sector in sector_options(&data.esg_rankings, &config.sectors)? {
            println!("{}", sector);
        }
        return Ok(());
    }

    if !config.is_known_risk_level(&args.risk) {
        warn!(
            "Risk level '{}' is not one of {}; picks will be sampled at random",
            args.risk,
            config.risk_levels.join(", ")
        );
    }

    info!("Recommending for sector={} risk={}", args.sector, args.risk);
    let options = SelectionOptions::from(&config);
    let outcome = generate_recommendation(Some(&args.sector), &args.risk, &data, &options)?;

    let recommendation = match outcome {
        SelectionOutcome::NoMatches => {
            println!("No recommendations found for the selected inputs. Try a different sector or risk level.");
            return Ok(());
        }
        SelectionOutcome::Recommended(rec) => rec,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&recommendation.rows()?)?);
    } else {
        println!("\n=== Top Recommended Stocks ===");
        println!("{}", recommendation.frame());
    }

    if !args.no_explain {
        let llm = LlmClient::from_config(&config.llm);
        let request =
            ExplanationRequest::from_recommendation(&recommendation, &args.sector, args.notes.as_deref())?;
        println!("\n=== Why these picks? ===");
        println!("{}", explain(&llm, &request).await);
    }

    Ok(())
}
