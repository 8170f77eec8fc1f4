//! Integration tests for the complete mothlight pipeline
//!
//! These tests verify end-to-end functionality across crates:
//! - classification → recording → flush → partitioned ledger
//! - decoy rendering alongside live telemetry
//!
//! Run with: cargo test --test integration_tests

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use mothlight_decoy::signatures::is_crawler_signature;
use mothlight_telemetry::{PartitionKey, TelemetryConfig, TelemetrySink};
use tempfile::tempdir;

fn read_today(root: &std::path::Path) -> String {
    let key = PartitionKey::for_timestamp(&Local::now());
    std::fs::read_to_string(key.partition_path(root)).unwrap()
}

// ============================================================================
// Classification feeds the sink
// ============================================================================

#[test]
fn classified_traffic_lands_in_the_ledger() {
    let dir = tempdir().unwrap();
    let sink = TelemetrySink::new(TelemetryConfig {
        ledger_root: Some(dir.path().to_path_buf()),
        flush_interval: Duration::from_secs(10),
    });

    let traffic = [
        "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)",
        "Mozilla/5.0 (X11; Linux x86_64; rv:124.0) Gecko/20100101 Firefox/124.0",
        "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)",
        "curl/8.4.0",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15",
    ];

    // The front end decides what counts; the sink just tallies.
    for user_agent in traffic {
        if is_crawler_signature(user_agent) {
            sink.record(user_agent);
        }
    }

    sink.flush_now().unwrap();

    let content = read_today(dir.path());
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 2, "two distinct crawler signatures: {content}");
    assert!(lines.contains(
        &"\"Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)\",2"
    ));
    assert!(lines.contains(&"\"curl/8.4.0\",1"));
}

// ============================================================================
// Scheduled flush on a live runtime
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn scheduler_merges_batches_across_ticks() {
    let dir = tempdir().unwrap();
    let sink = Arc::new(TelemetrySink::new(TelemetryConfig {
        ledger_root: Some(dir.path().to_path_buf()),
        flush_interval: Duration::from_millis(40),
    }));

    let flusher = sink.spawn_flusher().expect("configured sink spawns a flusher");

    sink.record("curl/8.4.0");
    tokio::time::sleep(Duration::from_millis(120)).await;
    sink.record("curl/8.4.0");
    sink.record("Scrapy/2.11 (+https://scrapy.org)");

    let partition = PartitionKey::for_timestamp(&Local::now()).partition_path(dir.path());
    let mut settled = false;
    for _ in 0..40 {
        tokio::time::sleep(Duration::from_millis(25)).await;
        if sink.is_empty() && partition.exists() {
            let content = std::fs::read_to_string(&partition).unwrap();
            if content.contains("\"curl/8.4.0\",2") {
                settled = true;
                break;
            }
        }
    }
    assert!(settled, "batches never merged into today's partition");

    let content = std::fs::read_to_string(&partition).unwrap();
    assert!(content.contains("\"Scrapy/2.11 (+https://scrapy.org)\",1"));

    flusher.abort();
}

// ============================================================================
// Decoy rendering is independent of telemetry state
// ============================================================================

#[test]
fn decoy_renders_while_sink_is_inert() {
    let sink = TelemetrySink::new(TelemetryConfig::default());
    sink.record("curl/8.4.0");

    let page = mothlight_decoy::render_page("emma.lure.test:8070", "lure.test:8070");
    assert!(!page.contains("{{"));
    assert!(page.contains("<strong>Emma</strong>"));

    // Inert sink: the observation stays in memory, nothing on disk, ever.
    assert_eq!(sink.pending_signatures(), 1);
    assert!(matches!(
        sink.flush_now().unwrap(),
        mothlight_telemetry::FlushOutcome::Inert
    ));
}
