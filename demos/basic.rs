//! Basic example demonstrating flowthings Rust SDK usage.
//!
//! Reads credentials from `FLOWTHINGS_ACCOUNT` / `FLOWTHINGS_TOKEN`, or from a
//! Bluemix `VCAP_SERVICES` binding when present.

use flowthings::{
  age, exists, member, not, Aggregation, Api, ClientOptions, Modify, Params, Token, VCAP_SERVICES,
};
use serde_json::json;

#[tokio::main]
async fn main() -> flowthings::Result<()> {
  let creds = match Token::from_bluemix(VCAP_SERVICES) {
    Ok(creds) => creds,
    Err(_) => Token::from_env()?,
  };
  let api = Api::with_options(creds, ClientOptions::from_env());
  let account = api.creds().account.clone();

  // Create a flow
  let flow = api
    .flow()
    .create(json!({"path": format!("/{}/sensors", account), "capacity": 100}), None)
    .await?;
  let flow_id = flow["id"].as_str().unwrap_or_default().to_string();
  println!("Created flow: {}", flow_id);

  // Write a few drops
  let drops = api.drop(&flow_id);
  for (city, temp) in [("Austin", 34), ("Boston", 12), ("Denver", 21)] {
    drops
      .create(json!({"elems": {"city": city, "temp": temp}}), None)
      .await?;
  }

  // Recent, warm drops that are not marked as tests
  let filter = age().lt(60 * 60 * 1000)?
    .and(member("elems").field("temp").gt(20))
    .and(not(exists(member("elems").field("test"))));
  let warm = drops
    .find_many(Params::new().filter(filter).limit(10))
    .await?;
  println!("Warm drops: {}", serde_json::to_string_pretty(&warm)?);

  // Average temperature per city
  let stats = drops
    .aggregate(&Aggregation::new(["$avg:temp"]).group_by(["city"]))
    .await?;
  println!("Averages: {}", stats);

  // Describe the flow, sending only the changed field
  let described = Modify::from_value(&flow)?.set("description", "Temperature readings");
  let updated = api.flow().save(described, None).await?;
  println!("Updated flow: {}", updated);

  // Clean up
  drops.delete_all().await?;
  api.flow().delete(&flow_id, None, None).await?;
  println!("Deleted flow {}", flow_id);

  Ok(())
}
