use std::fs::read_to_string;

use anyhow::{anyhow, Context};
use clap::Parser;
use courier_common::{
  graphql::GraphQLResponse,
  json::parse_json_object,
  link::{LinkError, Operation},
};
use courier_config::CourierConfig;
use courier_engine::chain::LinkChain;
use tracing::{error, info};

#[derive(Debug, Clone, PartialEq, Parser)]
#[command(name = "courier", version)]
/// Sends GraphQL documents through the configured link chain and prints the results.
pub struct CliArgs {
  /// Path to the JSON or YAML configuration file
  #[arg(long = "config", short, env = "COURIER_CONFIG_PATH", default_value = "./courier.json")]
  pub config_file_path: String,
  /// Variables as a JSON object, applied to every document
  #[arg(long)]
  pub variables: Option<String>,
  /// Name of the operation to execute, for documents with several operations
  #[arg(long)]
  pub operation_name: Option<String>,
  /// GraphQL document files, sent in order
  #[arg(required = true)]
  pub documents: Vec<String>,
}

pub fn build_operation(source: &str, args: &CliArgs) -> anyhow::Result<Operation> {
  let mut operation = Operation::parse(source).map_err(|e| anyhow!("invalid GraphQL document: {}", e))?;

  if let Some(operation_name) = &args.operation_name {
    operation = operation.with_operation_name(operation_name.clone());
  }

  if let Some(variables) = &args.variables {
    operation = operation.with_variables(parse_json_object(variables).context("invalid variables")?);
  }

  Ok(operation)
}

fn render_error(error: &LinkError) -> GraphQLResponse {
  match error.response() {
    Some(response) => response.clone(),
    None => GraphQLResponse::new_error(&error.to_string()),
  }
}

/// Sends every document, in order, through one chain, so link state is shared between them.
pub async fn run_operations(config: &CourierConfig, args: &CliArgs) -> anyhow::Result<()> {
  let chain = LinkChain::from_config(config)?;
  info!("sending {} operation(s) to {}", args.documents.len(), config.endpoint);

  for path in &args.documents {
    let source = read_to_string(path).with_context(|| format!("failed to read \"{}\"", path))?;
    let operation = build_operation(&source, args)?;

    let response = match chain.execute_once(operation).await {
      Some(Ok(response)) => response,
      Some(Err(e)) => {
        error!("operation in \"{}\" failed: {}", path, e);
        render_error(&e)
      }
      None => {
        error!("operation in \"{}\" completed without a result", path);
        continue;
      }
    };

    println!("{}", serde_json::to_string_pretty(&response)?);
  }

  Ok(())
}
