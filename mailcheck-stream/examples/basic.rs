//! Stream any NDJSON endpoint and print each record as it arrives.
//!
//! Run with:
//!   cargo run --example basic -- http://localhost:5000/api/verify/batch
//!
//! Ctrl-C cancels the stream.

use mailcheck_stream::{FnHandler, MalformedRecord, NdjsonClient, Request, StreamRecord};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "http://localhost:5000/api/verify/batch".into());

    let request = Request::post(url)
        .header("accept", "application/json")
        .json(&serde_json::json!({ "emails": ["test1@example.com", "test2@example.com"] }))?;

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    let mut handler = FnHandler::new(|record: StreamRecord| {
        println!("#{} {}", record.line_number, record.value);
    })
    .on_error(|bad: MalformedRecord| {
        eprintln!("#{} not JSON: {}", bad.line_number, bad.raw_line);
    });

    let summary = NdjsonClient::new()
        .stream(&request, &mut handler, &cancel)
        .await?;
    println!(
        "{} records, {} malformed, {} bytes",
        summary.records, summary.malformed, summary.bytes
    );

    Ok(())
}
