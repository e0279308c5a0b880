use chrono::Utc;
use clap::{Parser, Subcommand};
use provider_search_core::{
    ClosestLocationsRequest, CourseIndices, InMemoryIndex, LocationParams, OpenSearchStore,
    ProviderIndex, ProviderSearchCoordinator, ProviderSearchRequest, SearchParams,
};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "provider-search", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// OpenSearch base URL
    #[arg(long, env = "PROVIDER_SEARCH_OPENSEARCH_URL", default_value = "http://localhost:9200")]
    opensearch_url: String,

    /// Index holding standard provider documents
    #[arg(long, env = "PROVIDER_SEARCH_STANDARDS_INDEX", default_value = "standardproviders")]
    standards_index: String,

    /// Index holding framework provider documents
    #[arg(long, env = "PROVIDER_SEARCH_FRAMEWORKS_INDEX", default_value = "frameworkproviders")]
    frameworks_index: String,

    /// Search a JSON fixture file in memory instead of OpenSearch.
    #[arg(long, env = "PROVIDER_SEARCH_FIXTURES")]
    fixtures: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Providers delivering a course near a point.
    Providers {
        /// Standard code (integer) or framework id.
        #[arg(long)]
        course: String,
        #[arg(long, allow_hyphen_values = true)]
        lat: Option<f64>,
        #[arg(long, allow_hyphen_values = true)]
        lon: Option<f64>,
        #[arg(long, default_value = "1")]
        page: i64,
        #[arg(long, default_value = "20")]
        page_size: i64,
        /// Only providers holding a non-levy contract.
        #[arg(long, default_value_t = false)]
        non_levy: bool,
        /// Only national providers.
        #[arg(long, default_value_t = false)]
        national_only: bool,
        /// Comma separated delivery mode tokens: 0 day release, 1 block release, 2 at the employer.
        #[arg(long)]
        delivery_modes: Option<String>,
        /// 0 distance, 2 name ascending, 3 name descending.
        #[arg(long, default_value = "0")]
        order_by: i64,
        /// One row per provider instead of one per matching location set.
        #[arg(long, default_value_t = false)]
        unique: bool,
    },
    /// Closest locations of one provider for a course.
    Locations {
        #[arg(long)]
        course: String,
        #[arg(long)]
        ukprn: i64,
        #[arg(long, allow_hyphen_values = true)]
        lat: Option<f64>,
        #[arg(long, allow_hyphen_values = true)]
        lon: Option<f64>,
        #[arg(long, default_value = "1")]
        page: i64,
        #[arg(long, default_value = "20")]
        page_size: i64,
        #[arg(long, default_value_t = false)]
        non_levy: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "provider-search boot"
    );

    match &cli.fixtures {
        Some(path) => {
            let index = InMemoryIndex::from_json_file(path).await?;
            info!(path = %path.display(), records = index.len(), "searching fixture records");
            run(ProviderSearchCoordinator::new(index), cli.command).await
        }
        None => {
            let indices = CourseIndices::new(&cli.standards_index, &cli.frameworks_index);
            let store = OpenSearchStore::new(&cli.opensearch_url, indices);
            info!(url = %cli.opensearch_url, "searching opensearch");
            run(ProviderSearchCoordinator::new(store), cli.command).await
        }
    }
}

async fn run<S>(coordinator: ProviderSearchCoordinator<S>, command: Command) -> anyhow::Result<()>
where
    S: ProviderIndex + Send + Sync,
{
    let output = match command {
        Command::Providers {
            course,
            lat,
            lon,
            page,
            page_size,
            non_levy,
            national_only,
            delivery_modes,
            order_by,
            unique,
        } => {
            let params = SearchParams {
                id: course,
                lat,
                lon,
                page: Some(page),
                page_size: Some(page_size),
                show_for_non_levy_only: non_levy,
                show_national_only: national_only,
                delivery_modes,
                order_by: Some(order_by),
                unique_providers: unique,
            };
            let request = ProviderSearchRequest::from_params(&params)?;
            let result = coordinator.search_providers(&request).await?;
            serde_json::to_string_pretty(&result)?
        }
        Command::Locations {
            course,
            ukprn,
            lat,
            lon,
            page,
            page_size,
            non_levy,
        } => {
            let params = LocationParams {
                id: course,
                ukprn,
                lat,
                lon,
                page: Some(page),
                page_size: Some(page_size),
                show_for_non_levy_only: non_levy,
            };
            let request = ClosestLocationsRequest::from_params(&params)?;
            let located = coordinator.closest_locations(&request).await?;
            serde_json::to_string_pretty(&located)?
        }
    };

    println!("{output}");
    Ok(())
}
