use courier_config::CourierConfig;
use schemars::schema_for;

pub fn main() -> anyhow::Result<()> {
  let output = std::env::args()
    .nth(1)
    .unwrap_or("libs/config/courier.schema.json".to_string());

  println!("⚙️ Generating JSON schema for courier config file...");
  let schema = schema_for!(CourierConfig);
  let as_string = serde_json::to_string_pretty(&schema)?;
  println!("✏️ Writing to: {}", output);
  std::fs::write(&output, as_string)?;
  println!("✅ Done");

  Ok(())
}
