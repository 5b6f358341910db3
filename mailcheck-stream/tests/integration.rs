//! Integration tests for the NDJSON streaming client using wiremock.

use std::time::Duration;

use mailcheck_stream::{
    CancelReason, FnHandler, MalformedRecord, NdjsonClient, Request, StreamConfig, StreamError,
    StreamRecord, TrailingFragment,
};
use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn serve(status: u16, body: &str) -> MockServer {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/verify/batch"))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(&mock_server)
        .await;
    mock_server
}

fn batch_request(server: &MockServer) -> Request {
    Request::post(format!("{}/api/verify/batch", server.uri()))
        .header("accept", "application/json")
        .json(&json!({ "emails": ["test1@example.com", "test2@example.com"] }))
        .expect("serializable")
}

fn batch_body() -> String {
    concat!(
        r#"{"job_id":"batch_1","status":"started","total_emails":2,"message":"Batch verification started"}"#,
        "\n",
        r#"{"email":"test1@example.com","category":"invalid","provider":"example.com"}"#,
        "\n",
        r#"{"email":"test2@example.com","category":"valid","provider":"example.com"}"#,
        "\n",
        r#"{"job_id":"batch_1","status":"completed","total_emails":2,"verified_emails":2}"#,
        "\n",
    )
    .to_string()
}

#[tokio::test]
async fn stream_delivers_every_line_in_order() {
    let server = serve(200, &batch_body()).await;
    let client = NdjsonClient::new();

    let mut records = Vec::new();
    let summary = {
        let mut handler = FnHandler::new(|r: StreamRecord| records.push(r));
        client
            .stream(&batch_request(&server), &mut handler, &CancellationToken::new())
            .await
            .expect("should succeed")
    };

    assert_eq!(summary.records, 4);
    assert_eq!(summary.malformed, 0);
    assert_eq!(summary.trailing, TrailingFragment::None);
    assert_eq!(summary.bytes, batch_body().len() as u64);
    assert_eq!(records.len(), 4);
    assert_eq!(records[0].value["status"], "started");
    assert_eq!(records[1].value["email"], "test1@example.com");
    assert_eq!(records[2].value["email"], "test2@example.com");
    assert_eq!(records[3].value["status"], "completed");
    let lines: Vec<u64> = records.iter().map(|r| r.line_number).collect();
    assert_eq!(lines, vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn stream_sends_method_headers_and_body() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/verify/batch"))
        .and(header("accept", "application/json"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({ "emails": ["test1@example.com", "test2@example.com"] })))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}\n"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = NdjsonClient::new();
    let mut handler = FnHandler::new(|_: StreamRecord| {});
    let summary = client
        .stream(&batch_request(&mock_server), &mut handler, &CancellationToken::new())
        .await
        .expect("should succeed");
    assert_eq!(summary.records, 1);
}

#[tokio::test]
async fn stream_delivers_unterminated_final_line() {
    let server = serve(200, "{\"a\":1}\n{\"b\":2}").await;
    let client = NdjsonClient::new();

    let mut values = Vec::new();
    let summary = {
        let mut handler = FnHandler::new(|r: StreamRecord| values.push(r.value));
        client
            .stream(&batch_request(&server), &mut handler, &CancellationToken::new())
            .await
            .expect("should succeed")
    };

    assert_eq!(summary.records, 2);
    assert_eq!(summary.trailing, TrailingFragment::Parsed);
    assert_eq!(values, vec![json!({"a": 1}), json!({"b": 2})]);
}

#[tokio::test]
async fn stream_reports_malformed_line_and_continues() {
    let body = "{\"a\":1}\n{\"broken\":\n{\"c\":3}\n";
    let server = serve(200, body).await;
    let client = NdjsonClient::new();

    let mut values: Vec<Value> = Vec::new();
    let mut rejected: Vec<(u64, String)> = Vec::new();
    let summary = {
        let mut handler = FnHandler::new(|r: StreamRecord| values.push(r.value))
            .on_error(|m: MalformedRecord| rejected.push((m.line_number, m.raw_line)));
        client
            .stream(&batch_request(&server), &mut handler, &CancellationToken::new())
            .await
            .expect("continue policy should complete")
    };

    assert_eq!(summary.records, 2);
    assert_eq!(summary.malformed, 1);
    assert_eq!(values, vec![json!({"a": 1}), json!({"c": 3})]);
    assert_eq!(rejected, vec![(2, "{\"broken\":".to_string())]);
}

#[tokio::test]
async fn stream_fail_fast_aborts_on_malformed_line() {
    let body = "{\"a\":1}\nnot json\n{\"c\":3}\n";
    let server = serve(200, body).await;
    let client = NdjsonClient::new().config(StreamConfig::default().fail_fast());

    let mut count = 0;
    let err = {
        let mut handler = FnHandler::new(|_: StreamRecord| count += 1);
        client
            .stream(&batch_request(&server), &mut handler, &CancellationToken::new())
            .await
            .unwrap_err()
    };

    assert!(
        matches!(err, StreamError::Malformed { line_number: 2, .. }),
        "expected Malformed, got: {err:?}"
    );
    assert_eq!(count, 1);
}

#[tokio::test]
async fn stream_returns_transport_error_on_404() {
    let server = serve(404, "{\"error\":\"Job not found\"}\n").await;
    let client = NdjsonClient::new();

    let mut count = 0;
    let err = {
        let mut handler = FnHandler::new(|_: StreamRecord| count += 1);
        client
            .stream(&batch_request(&server), &mut handler, &CancellationToken::new())
            .await
            .unwrap_err()
    };

    match err {
        StreamError::Transport {
            status,
            message,
            records_delivered,
        } => {
            assert_eq!(status, Some(404));
            assert!(message.contains("Job not found"), "got: {message}");
            assert_eq!(records_delivered, 0);
        }
        other => panic!("expected Transport, got: {other:?}"),
    }
    assert_eq!(count, 0, "body of a failed response must not be parsed");
}

#[tokio::test]
async fn stream_returns_retryable_transport_error_on_500() {
    let server = serve(500, &batch_body()).await;
    let client = NdjsonClient::new();

    let mut handler = FnHandler::new(|_: StreamRecord| panic!("no records expected"));
    let err = client
        .stream(&batch_request(&server), &mut handler, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(500));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn stream_returns_transport_error_when_unreachable() {
    let client = NdjsonClient::new();
    let request = Request::get("http://127.0.0.1:1/api/verify/batch");

    let mut handler = FnHandler::new(|_: StreamRecord| panic!("no records expected"));
    let err = client
        .stream(&request, &mut handler, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(
        matches!(err, StreamError::Transport { status: None, .. }),
        "expected Transport without status, got: {err:?}"
    );
}

#[tokio::test]
async fn stream_stops_delivering_after_cancel() {
    let server = serve(200, &batch_body()).await;
    let client = NdjsonClient::new();
    let cancel = CancellationToken::new();

    let mut delivered = 0;
    let err = {
        let token = cancel.clone();
        let mut handler = FnHandler::new(|_: StreamRecord| {
            delivered += 1;
            if delivered == 2 {
                token.cancel();
            }
        });
        client
            .stream(&batch_request(&server), &mut handler, &cancel)
            .await
            .unwrap_err()
    };

    assert!(
        matches!(
            err,
            StreamError::Cancelled {
                reason: CancelReason::Caller,
                records_delivered: 2
            }
        ),
        "expected Cancelled, got: {err:?}"
    );
    assert_eq!(delivered, 2);
}

#[tokio::test]
async fn stream_total_timeout_behaves_as_cancellation() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/verify/batch"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(batch_body())
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&mock_server)
        .await;

    let client =
        NdjsonClient::new().config(StreamConfig::default().total_timeout(Duration::from_millis(100)));

    let mut handler = FnHandler::new(|_: StreamRecord| panic!("no records expected"));
    let err = client
        .stream(&batch_request(&mock_server), &mut handler, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(
        matches!(
            err,
            StreamError::Cancelled {
                reason: CancelReason::Timeout(limit),
                records_delivered: 0
            } if limit == Duration::from_millis(100)
        ),
        "expected timeout cancellation, got: {err:?}"
    );
}

/// Serve one connection: answer with `head`, then hold the socket open without
/// sending anything more.
async fn stalling_server(head: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = [0u8; 4096];
        let _ = socket.read(&mut request).await;
        socket.write_all(head.as_bytes()).await.unwrap();
        tokio::time::sleep(Duration::from_secs(60)).await;
        drop(socket);
    });
    format!("http://{addr}/api/verify/batch")
}

const STALLED_500: &str =
    "HTTP/1.1 500 Internal Server Error\r\ncontent-type: application/json\r\ncontent-length: 1000\r\n\r\n{\"error\":\"partial";

const STALLED_200: &str =
    "HTTP/1.1 200 OK\r\ncontent-type: application/x-ndjson\r\ncontent-length: 1000\r\n\r\n";

#[tokio::test]
async fn stalled_error_body_still_yields_transport_error() {
    let url = stalling_server(STALLED_500).await;
    let client = NdjsonClient::new();

    let mut handler = FnHandler::new(|_: StreamRecord| panic!("no records expected"));
    let err = tokio::time::timeout(
        Duration::from_secs(5),
        client.stream(&Request::get(url), &mut handler, &CancellationToken::new()),
    )
    .await
    .expect("stream should give up on the stalled body")
    .unwrap_err();

    match err {
        StreamError::Transport {
            status, message, ..
        } => {
            assert_eq!(status, Some(500));
            assert!(message.contains("partial"), "got: {message}");
        }
        other => panic!("expected Transport, got: {other:?}"),
    }
}

#[tokio::test]
async fn total_timeout_covers_stalled_error_body() {
    let url = stalling_server(STALLED_500).await;
    let client = NdjsonClient::new().config(
        StreamConfig::default()
            .read_timeout(Duration::from_secs(30))
            .total_timeout(Duration::from_millis(200)),
    );

    let mut handler = FnHandler::new(|_: StreamRecord| panic!("no records expected"));
    let err = tokio::time::timeout(
        Duration::from_secs(3),
        client.stream(&Request::get(url), &mut handler, &CancellationToken::new()),
    )
    .await
    .expect("deadline should stop the call")
    .unwrap_err();

    assert!(
        matches!(
            err,
            StreamError::Cancelled {
                reason: CancelReason::Timeout(limit),
                records_delivered: 0
            } if limit == Duration::from_millis(200)
        ),
        "expected timeout cancellation, got: {err:?}"
    );
}

#[tokio::test]
async fn cancel_interrupts_stalled_error_body() {
    let url = stalling_server(STALLED_500).await;
    let client = NdjsonClient::new().config(StreamConfig::default().read_timeout(Duration::from_secs(30)));
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let mut handler = FnHandler::new(|_: StreamRecord| panic!("no records expected"));
    let err = tokio::time::timeout(
        Duration::from_secs(3),
        client.stream(&Request::get(url), &mut handler, &cancel),
    )
    .await
    .expect("cancellation should stop the call")
    .unwrap_err();

    assert!(
        matches!(
            err,
            StreamError::Cancelled {
                reason: CancelReason::Caller,
                ..
            }
        ),
        "expected caller cancellation, got: {err:?}"
    );
}

#[tokio::test]
async fn cancel_after_headers_before_body() {
    let url = stalling_server(STALLED_200).await;
    let client = NdjsonClient::new();
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let mut handler = FnHandler::new(|_: StreamRecord| panic!("no records expected"));
    let err = tokio::time::timeout(
        Duration::from_secs(3),
        client.stream(&Request::get(url), &mut handler, &cancel),
    )
    .await
    .expect("cancellation should stop the call")
    .unwrap_err();

    assert!(
        matches!(
            err,
            StreamError::Cancelled {
                reason: CancelReason::Caller,
                records_delivered: 0
            }
        ),
        "expected caller cancellation, got: {err:?}"
    );
}

#[tokio::test]
async fn large_error_body_is_truncated() {
    let body = "x".repeat(64 * 1024);
    let server = serve(503, &body).await;
    let client = NdjsonClient::new();

    let mut handler = FnHandler::new(|_: StreamRecord| panic!("no records expected"));
    let err = client
        .stream(&batch_request(&server), &mut handler, &CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        StreamError::Transport {
            status, message, ..
        } => {
            assert_eq!(status, Some(503));
            assert_eq!(message.len(), 4 * 1024);
        }
        other => panic!("expected Transport, got: {other:?}"),
    }
}

#[tokio::test]
async fn concurrent_streams_do_not_share_buffers() {
    let first = serve(200, "{\"n\":1}\n{\"n\":2}\n{\"n\":3}").await;
    let second = serve(200, "{\"m\":\"a\"}\n{\"m\":\"b\"}\n").await;
    let client = NdjsonClient::new();

    let mut left = Vec::new();
    let mut right = Vec::new();
    let (a, b) = {
        let mut lh = FnHandler::new(|r: StreamRecord| left.push(r.value));
        let mut rh = FnHandler::new(|r: StreamRecord| right.push(r.value));
        let cancel = CancellationToken::new();
        let first_request = batch_request(&first);
        let second_request = batch_request(&second);
        tokio::join!(
            client.stream(&first_request, &mut lh, &cancel),
            client.stream(&second_request, &mut rh, &cancel),
        )
    };

    assert_eq!(a.expect("first").records, 3);
    assert_eq!(b.expect("second").records, 2);
    assert_eq!(left, vec![json!({"n": 1}), json!({"n": 2}), json!({"n": 3})]);
    assert_eq!(right, vec![json!({"m": "a"}), json!({"m": "b"})]);
}
