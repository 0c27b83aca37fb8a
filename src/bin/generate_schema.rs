//! Schema generator for the proxy wire types.
//!
//! This binary writes `proxy_schema.json` describing the API Gateway event the
//! function accepts and the proxy result it returns, for contract tests and
//! API documentation.

use lambda_proxy_router::models::{ApiGatewayProxyEvent, ProxyResult};
use schemars::{JsonSchema, schema_for};
use serde_json::{Value, json};
use std::fs;

const OUTPUT_FILE: &str = "proxy_schema.json";

fn main() {
    let schema = json!({
        "event": generate_schema::<ApiGatewayProxyEvent>(),
        "result": generate_schema::<ProxyResult>(),
    });

    write_schema(&schema);
    println!("✅ Generated {OUTPUT_FILE}");
}

// Generates a schema for the given type without the meta-schema marker
fn generate_schema<T: JsonSchema>() -> Value {
    let mut schema = serde_json::to_value(schema_for!(T)).unwrap_or_else(|e| {
        eprintln!("Failed to serialize schema: {e}");
        std::process::exit(1);
    });

    if let Some(obj) = schema.as_object_mut() {
        obj.remove("$schema");
    }

    schema
}

fn write_schema(schema: &Value) {
    let json = serde_json::to_string_pretty(schema).unwrap_or_else(|e| {
        eprintln!("Failed to serialize schema: {e}");
        std::process::exit(1);
    });

    fs::write(OUTPUT_FILE, json).unwrap_or_else(|e| {
        eprintln!("Failed to write {OUTPUT_FILE}: {e}");
        std::process::exit(1);
    });
}
