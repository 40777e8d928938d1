use std::error::Error;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use reportwatch::service::{HttpReportService, HttpServiceConfig};
use reportwatch::session::{ReportSession, SessionOptions};
use reportwatch::view::{format_row, header_label, Navigation, ViewState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let service = HttpReportService::new(HttpServiceConfig {
        base_url: "http://127.0.0.1:8000".to_string(),
        timeout_seconds: 5,
        ..HttpServiceConfig::default()
    })?;
    let session = ReportSession::new(Arc::new(service)).with_options(SessionOptions {
        poll_interval: Duration::from_secs(2),
        max_polls: Some(150),
    });

    let handle = session.submit().await?;
    println!("Report ID: {}", handle.id());

    let rows = handle.wait().await?;
    let view = ViewState::new(rows, NonZeroUsize::new(25).unwrap_or(NonZeroUsize::MIN))
        .apply(Navigation::First);

    let header: Vec<String> = view.rows().header().iter().map(|h| header_label(h)).collect();
    println!("{}", header.join(" | "));
    for row in view.page().rows {
        println!("{}", format_row(row).join(" | "));
    }
    println!("Page {} of {}", view.current_page(), view.page_count());

    Ok(())
}
