use crate::config::LoggerConfigFormat;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Registry;
use tracing_subscriber::{
  fmt::{self, time::UtcTime},
  Layer,
};

pub type LoggerLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Builds the logging layer for the given format and `EnvFilter` directives.
/// With `print_performance_info`, a log line with timings is emitted whenever a span closes.
pub fn build_logger(
  format: &LoggerConfigFormat,
  filter: &str,
  print_performance_info: bool,
) -> Result<LoggerLayer, tracing_subscriber::filter::ParseError> {
  let timer = UtcTime::rfc_3339();
  let filter = EnvFilter::try_new(filter)?;
  let span_events = match print_performance_info {
    true => FmtSpan::CLOSE,
    false => FmtSpan::NONE,
  };

  Ok(match format {
    LoggerConfigFormat::Json => fmt::Layer::<Registry>::default()
      .json()
      .with_timer(timer)
      .with_span_events(span_events)
      .with_filter(filter)
      .boxed(),
    LoggerConfigFormat::Pretty => fmt::Layer::<Registry>::default()
      .pretty()
      .with_timer(timer)
      .with_span_events(span_events)
      .with_filter(filter)
      .boxed(),
    LoggerConfigFormat::Compact => fmt::Layer::<Registry>::default()
      .compact()
      .with_timer(timer)
      .with_span_events(span_events)
      .with_filter(filter)
      .boxed(),
  })
}
