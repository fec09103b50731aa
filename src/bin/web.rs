use workout_log::{Config, app, logging};

#[tokio::main]
async fn main() {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            logging::init(workout_log::config::DEFAULT_LOG_LEVEL);
            tracing::error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };

    logging::init(&config.log_level);

    if config.admin_password_hash.is_empty() {
        tracing::warn!("ADMIN_PASSWORD_HASH is not set; no admin user will be seeded");
    }

    tracing::info!(
        database = %config.database_path.display(),
        exports = %config.export_dirs.primary.display(),
        mirror = %config.export_dirs.mirror.display(),
        timezone = %config.timezone,
        "Starting workout log"
    );

    if let Err(e) = app::run(config).await {
        tracing::error!(error = %e, "Server stopped");
        std::process::exit(1);
    }
}
