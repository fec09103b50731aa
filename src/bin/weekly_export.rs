use clap::Parser;
use workout_log::{
    AppError, Config, Store,
    export::{export_week, week_start},
    logging,
    store::parse_date,
};

#[derive(Parser)]
#[command(name = "weekly-export")]
#[command(about = "Export the last seven days of sets into one workbook", long_about = None)]
struct Cli {
    /// Last day of the window (YYYY-MM-DD), defaults to today
    #[arg(long, value_parser = parse_end)]
    end: Option<chrono::NaiveDate>,
}

fn parse_end(raw: &str) -> Result<chrono::NaiveDate, String> {
    parse_date(raw).ok_or_else(|| format!("expected YYYY-MM-DD, got '{raw}'"))
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            logging::init(workout_log::config::DEFAULT_LOG_LEVEL);
            tracing::error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };
    logging::init(&config.log_level);

    if let Err(e) = run(&config, cli.end).await {
        tracing::error!(error = %e, "Weekly export failed");
        std::process::exit(1);
    }
}

async fn run(config: &Config, end: Option<chrono::NaiveDate>) -> Result<(), AppError> {
    let end = end.unwrap_or_else(|| config.today());
    tracing::info!(start = %week_start(end), %end, "Running weekly export");

    let store = Store::open(&config.database_path).await?;

    match export_week(&store, &config.export_dirs, end).await? {
        Some(export) => tracing::info!(
            file = %export.primary_path.display(),
            rows = export.row_count,
            mirrored = export.mirrored,
            "Weekly export complete"
        ),
        None => tracing::info!("No sets in window; no workbook written"),
    }

    Ok(())
}
