//! Exercise every endpoint of a running verification API, in order.
//!
//! Run with:
//!   MAILCHECK_API_URL=http://localhost:5000 cargo run --example run_all
//!
//! Set `RUST_LOG=mailcheck_client=debug,mailcheck_stream=debug` to see the
//! requests. Ctrl-C cancels the batch stream.

use std::time::{SystemTime, UNIX_EPOCH};

use mailcheck_client::{BatchEvent, BatchRequest, VerifyClient};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let client = VerifyClient::from_env();
    if let Err(e) = run(&client).await {
        eprintln!("run failed: {e}");
    }
}

async fn run(client: &VerifyClient) -> Result<(), mailcheck_client::ClientError> {
    println!("\n=== Category statistics ===");
    let stats = client.category_statistics().await?;
    println!("{stats:#?}");

    println!("\n=== Global statistics ===");
    let global = client.statistics().await?;
    println!("{} addresses across {} domains", global.total_emails, global.domains.len());

    println!("\n=== Single address ===");
    let single = client.verify_email("test@example.com").await?;
    println!("{single:#?}");

    println!("\n=== History for test@example.com ===");
    println!("{:#}", client.email_history("test@example.com").await?);

    println!("\n=== Settings ===");
    let settings = client.settings().await?;
    for (feature, setting) in &settings {
        println!("{feature:<32} {} (enabled: {})", setting.value, setting.enabled);
    }

    println!("\n=== Batch names ===");
    let names = client.batch_names().await?;
    println!("{names:#?}");

    match names.ids().next() {
        Some(first) => {
            println!("\n=== Verification status for {first} ===");
            let status = client.verification_status(first).await?;
            println!("{status:#?}");

            println!("\n=== Results for {first} ===");
            let job = client.job_results(first).await?;
            let rows = job.simplified_results.as_ref().map_or(0, |rows| rows.len());
            println!("{:?}, {rows} simplified rows", job.status.status);

            println!("\n=== Rename {first} ===");
            let stamp = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default();
            let renamed = client
                .update_batch_name(first, &format!("Updated via Rust {stamp}"))
                .await?;
            println!("{renamed:#?}");
        }
        None => println!("no batches yet, skipping status and rename"),
    }

    println!("\n=== Verify batch ===");
    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    let request = BatchRequest::new([
        "test1@example.com",
        "test2@example.com",
        "invalid@nonexistentdomain.xyz",
    ]);
    let mut print_event = |event: BatchEvent| match event {
        BatchEvent::Started(s) => println!("started {} ({} emails)", s.job_id, s.total_emails),
        BatchEvent::Result(r) => println!("{:<40} {:?}", r.email, r.category),
        BatchEvent::Completed(c) => println!("completed {}: {:?}", c.job_id, c.results),
        BatchEvent::Failed(f) => println!("failed {}: {:?}", f.job_id, f.error),
        BatchEvent::Other(v) => println!("other: {v}"),
    };
    let outcome = client.verify_batch(&request, &mut print_event, &cancel).await?;
    println!(
        "{} results, {} records, {} malformed lines",
        outcome.results, outcome.summary.records, outcome.summary.malformed
    );

    Ok(())
}
