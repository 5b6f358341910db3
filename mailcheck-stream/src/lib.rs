#![deny(missing_docs)]
//! Incremental NDJSON streaming over chunked HTTP response bodies.
//!
//! [`NdjsonClient::stream`] sends a [`Request`], reads the response body chunk
//! by chunk, splits it on newlines and hands each parsed JSON value to a
//! [`RecordHandler`] while the transfer is still in progress. Records arrive
//! in body order, and where chunk boundaries fall never changes what is
//! delivered.
//!
//! Malformed lines are reported through [`RecordHandler::on_malformed`] and
//! skipped by default; [`StreamConfig::fail_fast`] turns them into a terminal
//! [`StreamError::Malformed`]. Cancellation goes through a
//! [`tokio_util::sync::CancellationToken`], and timeouts behave as
//! cancellation.

mod buffer;
mod client;
mod config;
mod error;
mod handler;
mod outcome;
mod record;
mod request;
mod streaming;

pub use buffer::LineBuffer;
pub use client::NdjsonClient;
pub use config::{MalformedPolicy, StreamConfig};
pub use error::{CancelReason, StreamError};
pub use handler::{FnHandler, RecordHandler};
pub use outcome::{StreamSummary, TrailingFragment};
pub use record::{MalformedRecord, StreamRecord};
pub use request::Request;
pub use streaming::consume_body;
