use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use crate::report::{ReportId, ReportStatus, ResultSet, RowPolicy};
use crate::service::{
    HttpReportService, HttpServiceConfig, PollError, PollResponse, ReportService, SubmissionError,
};
use crate::session::{ReportSession, SessionError, SessionOptions};
use crate::view::{format_row, Navigation, ViewState};

struct CannedResponse {
    status: u16,
    content_type: &'static str,
    body: String,
}

fn json(status: u16, body: &str) -> CannedResponse {
    CannedResponse {
        status,
        content_type: "application/json",
        body: body.to_string(),
    }
}

fn csv(body: &str) -> CannedResponse {
    CannedResponse {
        status: 200,
        content_type: "text/csv; charset=utf-8",
        body: body.to_string(),
    }
}

// Answers one connection per canned response, in order, and records the
// request lines it saw.
async fn serve(responses: Vec<CannedResponse>) -> (String, Arc<Mutex<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = seen.clone();

    tokio::spawn(async move {
        for canned in responses {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
            }
            let request = String::from_utf8_lossy(&buf);
            let request_line = request.lines().next().unwrap_or("").to_string();
            log.lock().unwrap().push(request_line);

            let reply = format!(
                "HTTP/1.1 {} X\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                canned.status,
                canned.content_type,
                canned.body.len(),
                canned.body
            );
            stream.write_all(reply.as_bytes()).await.unwrap();
            let _ = stream.shutdown().await;
        }
    });

    (base, seen)
}

fn http_session(base: &str) -> ReportSession {
    let service = HttpReportService::new(HttpServiceConfig {
        base_url: base.to_string(),
        timeout_seconds: 5,
        ..HttpServiceConfig::default()
    })
    .unwrap();
    ReportSession::new(Arc::new(service)).with_options(SessionOptions {
        poll_interval: Duration::from_millis(10),
        max_polls: Some(10),
    })
}

#[tokio::test]
async fn http_report_runs_from_submit_to_rows() {
    let (base, seen) = serve(vec![
        json(200, r#"{"report_id":"abc123"}"#),
        json(200, r#"{"status":"Running"}"#),
        csv("store_id, uptime_last_hour, downtime_last_day\n42,59.5,1.5\n43,60,0.25\n"),
    ])
    .await;

    let handle = http_session(&base).submit().await.unwrap();
    assert_eq!(handle.id().as_str(), "abc123");

    let rows = handle.wait().await.unwrap();
    assert_eq!(handle.status(), ReportStatus::Complete);
    assert_eq!(handle.snapshot().polls, 2);
    assert_eq!(
        rows.header(),
        ["store_id", "uptime_last_hour", "downtime_last_day"]
    );
    assert_eq!(format_row(&rows.rows()[0]), vec!["42", "60 min", "1h 30m"]);
    assert_eq!(format_row(&rows.rows()[1]), vec!["43", "60 min", "15 min"]);

    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen[0], "POST /get_report HTTP/1.1");
    assert_eq!(seen[1], "GET /get_report/abc123 HTTP/1.1");
    assert_eq!(seen[2], "GET /get_report/abc123 HTTP/1.1");
}

#[tokio::test]
async fn http_submit_failure_carries_the_server_detail() {
    let (base, seen) = serve(vec![json(500, r#"{"detail":"database offline"}"#)]).await;

    let err = http_session(&base).submit().await.unwrap_err();
    match err {
        SubmissionError::Http { status, detail } => {
            assert_eq!(status, 500);
            assert_eq!(detail, "database offline");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn http_failed_job_surfaces_the_reason() {
    let (base, _) = serve(vec![
        json(200, r#"{"report_id":"r9"}"#),
        json(200, r#"{"status":"Failed","error":"no poll data"}"#),
    ])
    .await;

    let handle = http_session(&base).submit().await.unwrap();
    let err = handle.wait().await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::Poll(ref e) if matches!(**e, PollError::Rejected { ref reason } if reason == "no poll data")
    ));
    assert_eq!(handle.status(), ReportStatus::Failed);
}

#[tokio::test]
async fn http_ragged_report_is_malformed_under_strict_rows() {
    let (base, _) = serve(vec![
        json(200, r#"{"report_id":"r1"}"#),
        csv("a,b\n1,2\n3\n"),
    ])
    .await;

    let service = HttpReportService::new(HttpServiceConfig {
        base_url: base,
        row_policy: RowPolicy::Strict,
        ..HttpServiceConfig::default()
    })
    .unwrap();
    let handle = ReportSession::new(Arc::new(service)).submit().await.unwrap();
    let err = handle.wait().await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::Poll(ref e) if matches!(**e, PollError::Malformed { .. })
    ));
}

struct OneShotReport {
    polls_before_ready: Mutex<VecDeque<()>>,
    rows: ResultSet,
}

impl ReportService for OneShotReport {
    fn submit(&self) -> BoxFuture<'_, Result<ReportId, SubmissionError>> {
        Box::pin(async { Ok(ReportId::new("paged")) })
    }

    fn poll<'a>(&'a self, _id: &'a ReportId) -> BoxFuture<'a, Result<PollResponse, PollError>> {
        Box::pin(async move {
            if self.polls_before_ready.lock().unwrap().pop_front().is_some() {
                Ok(PollResponse::Running)
            } else {
                Ok(PollResponse::Complete(self.rows.clone()))
            }
        })
    }
}

#[tokio::test(start_paused = true)]
async fn completed_report_pages_through_the_view() {
    let mut text = String::from("store_id,uptime_last_hour\n");
    for i in 1..=120 {
        text.push_str(&format!("{i},{}\n", i % 61));
    }
    let service = Arc::new(OneShotReport {
        polls_before_ready: Mutex::new(VecDeque::from(vec![(), ()])),
        rows: ResultSet::parse(&text, b',', RowPolicy::Fill).unwrap(),
    });

    let started = tokio::time::Instant::now();
    let handle = ReportSession::new(service).submit().await.unwrap();
    let rows = handle.wait().await.unwrap();
    assert_eq!(started.elapsed(), Duration::from_secs(4));
    assert_eq!(rows.len(), 120);

    let view = ViewState::new(rows, NonZeroUsize::new(50).unwrap());
    assert_eq!(view.page_count(), 3);

    let last = view.apply(Navigation::Last);
    let page = last.page();
    assert_eq!(page.rows.len(), 20);
    assert_eq!(page.descriptor.first_row_ordinal, 101);
    assert_eq!(page.descriptor.last_row_ordinal, 120);
    assert_eq!(page.rows[0].get("store_id"), Some("101"));

    let clamped = last.apply(Navigation::Next);
    assert_eq!(clamped.current_page(), 3);
    assert_eq!(view.apply(Navigation::Goto(-4)).current_page(), 1);
}
