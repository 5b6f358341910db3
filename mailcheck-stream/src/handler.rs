//! Caller-side sinks for parsed records.

use std::future::{Future, ready};

use crate::record::{MalformedRecord, StreamRecord};

/// Receives records as the body arrives.
///
/// Each returned future is awaited to completion before the next line is
/// processed or the next chunk is read, so handlers may perform their own I/O
/// without disturbing delivery order.
///
/// This trait uses RPITIT and is not object-safe; [`crate::NdjsonClient::stream`]
/// is generic over it.
pub trait RecordHandler: Send {
    /// Called once per successfully parsed line, in arrival order.
    fn on_record(&mut self, record: StreamRecord) -> impl Future<Output = ()> + Send;

    /// Called for each line that fails to parse while the
    /// [`MalformedPolicy::Continue`](crate::MalformedPolicy::Continue) policy is
    /// active. The default logs the line at `warn` and moves on.
    fn on_malformed(&mut self, malformed: MalformedRecord) -> impl Future<Output = ()> + Send {
        log_malformed(&malformed);
        ready(())
    }
}

fn log_malformed(malformed: &MalformedRecord) {
    tracing::warn!(
        line = malformed.line_number,
        raw = %malformed.raw_line,
        error = %malformed.error,
        "skipping malformed NDJSON line"
    );
}

/// Adapts plain closures into a [`RecordHandler`].
///
/// ```
/// use mailcheck_stream::FnHandler;
///
/// let mut seen = Vec::new();
/// let handler = FnHandler::new(|record| seen.push(record.value))
///     .on_error(|bad| eprintln!("line {} rejected", bad.line_number));
/// # drop(handler);
/// ```
pub struct FnHandler<R, E = fn(MalformedRecord)> {
    on_record: R,
    on_error: Option<E>,
}

impl<R> FnHandler<R>
where
    R: FnMut(StreamRecord) + Send,
{
    /// Wrap a record callback. Malformed lines are logged until
    /// [`on_error`](Self::on_error) supplies a callback for them.
    pub fn new(on_record: R) -> Self {
        Self {
            on_record,
            on_error: None,
        }
    }
}

impl<R, E> FnHandler<R, E> {
    /// Route malformed lines to `on_error`.
    #[must_use]
    pub fn on_error<E2>(self, on_error: E2) -> FnHandler<R, E2>
    where
        E2: FnMut(MalformedRecord) + Send,
    {
        FnHandler {
            on_record: self.on_record,
            on_error: Some(on_error),
        }
    }
}

impl<R, E> RecordHandler for FnHandler<R, E>
where
    R: FnMut(StreamRecord) + Send,
    E: FnMut(MalformedRecord) + Send,
{
    fn on_record(&mut self, record: StreamRecord) -> impl Future<Output = ()> + Send {
        (self.on_record)(record);
        ready(())
    }

    fn on_malformed(&mut self, malformed: MalformedRecord) -> impl Future<Output = ()> + Send {
        match self.on_error.as_mut() {
            Some(on_error) => on_error(malformed),
            None => log_malformed(&malformed),
        }
        ready(())
    }
}
