use clap::Parser;
use courier::{run_operations, CliArgs};
use courier_config::LoggerConfig;
use tracing::subscriber::set_global_default;
use tracing_subscriber::layer::SubscriberExt;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  let args = CliArgs::parse();
  let config = courier_config::load_config(&args.config_file_path, |key| std::env::var(key).ok())?;

  let logger_config = config.logger.clone().unwrap_or_else(LoggerConfig::default);
  let global_logger = courier_logger::logger_layer::build_logger(
    &logger_config.format,
    &logger_config.filter,
    logger_config.print_performance_info,
  )?;
  set_global_default(tracing_subscriber::registry().with(global_logger))?;

  run_operations(&config, &args).await
}
