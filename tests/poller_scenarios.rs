// tests/poller_scenarios.rs
//! Scenario C and boundary behaviors for `LogPoller` against a mocked
//! CT log HTTP API.

use std::time::Duration;

use base64::Engine;
use ct_fanout::ct_log::LogPoller;
use ct_fanout::record::LogDescriptor;
use tokio::sync::{mpsc, watch};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn sth_body(tree_size: u64) -> serde_json::Value {
    serde_json::json!({
        "tree_size": tree_size,
        "timestamp": 1000,
        "sha256_root_hash": "aaaa",
        "tree_head_signature": "bbbb"
    })
}

fn valid_x509_entry_b64() -> String {
    let mut params = rcgen::CertificateParams::new(vec!["mid-batch.example.com".to_string()]);
    let mut dn = rcgen::DistinguishedName::new();
    dn.push(rcgen::DnType::CommonName, "mid-batch.example.com");
    params.distinguished_name = dn;
    let der = rcgen::Certificate::from_params(params).unwrap().serialize_der().unwrap();

    let mut leaf = vec![0u8; 12]; // entry_type bytes 10-11 stay 0x0000 (X509Entry)
    let len = der.len();
    leaf.push((len >> 16) as u8);
    leaf.push((len >> 8) as u8);
    leaf.push(len as u8);
    leaf.extend_from_slice(&der);
    base64::engine::general_purpose::STANDARD.encode(leaf)
}

#[tokio::test]
async fn scenario_c_sth_no_op_issues_no_get_entries() {
    let server = MockServer::start().await;
    // Every STH call reports the same size the poller already seeded at.
    Mock::given(method("GET"))
        .and(path("/ct/v1/get-sth"))
        .respond_with(ResponseTemplate::new(200).set_body_json(sth_body(100)))
        .mount(&server)
        .await;

    let descriptor = LogDescriptor::new(server.uri(), "test-log");
    let poller = LogPoller::new(descriptor, 256, Duration::from_millis(20));

    let (tx, mut rx) = mpsc::channel(16);
    let (cancel_tx, cancel_rx) = watch::channel(false);

    let handle = tokio::spawn(poller.run(tx, cancel_rx));

    // Let several poll cycles elapse.
    tokio::time::sleep(Duration::from_millis(150)).await;
    let _ = cancel_tx.send(true);
    let _ = handle.await;

    assert!(rx.try_recv().is_err(), "no records should have been emitted");

    let requests = server.received_requests().await.unwrap();
    let entries_calls = requests.iter().filter(|r| r.url.path() == "/ct/v1/get-entries").count();
    assert_eq!(entries_calls, 0, "get-entries must not be called when tree_size == next_index");
}

#[tokio::test]
async fn poller_advances_by_returned_count_when_server_returns_fewer_entries() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/ct/v1/get-sth"))
        .respond_with(ResponseTemplate::new(200).set_body_json(sth_body(0)))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ct/v1/get-sth"))
        .respond_with(ResponseTemplate::new(200).set_body_json(sth_body(10)))
        .mount(&server)
        .await;

    // Requested end should be 9 (min(9, 0+256-1)), but the log only returns 2 entries.
    Mock::given(method("GET"))
        .and(path("/ct/v1/get-entries"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "entries": [
                {"leaf_input": "AAAAAAAAAAAAAAA=", "extra_data": ""},
                {"leaf_input": "AAAAAAAAAAAAAAA=", "extra_data": ""}
            ]
        })))
        .mount(&server)
        .await;

    let descriptor = LogDescriptor::new(server.uri(), "test-log");
    let poller = LogPoller::new(descriptor, 256, Duration::from_millis(500));

    let (tx, mut rx) = mpsc::channel(16);
    let (cancel_tx, cancel_rx) = watch::channel(false);

    let handle = tokio::spawn(poller.run(tx, cancel_rx));
    tokio::time::sleep(Duration::from_millis(200)).await;
    let _ = cancel_tx.send(true);
    let _ = handle.await;

    // Both entries fail to decode (invalid leaf bytes), but the call should
    // still have happened exactly once in this window (batch not re-requested
    // because the index isn't recomputed until after the sleep).
    let requests = server.received_requests().await.unwrap();
    let entries_calls: Vec<_> =
        requests.iter().filter(|r| r.url.path() == "/ct/v1/get-entries").collect();
    assert_eq!(entries_calls.len(), 1);
    assert!(entries_calls[0].url.query().unwrap().contains("start=0"));
    assert!(entries_calls[0].url.query().unwrap().contains("end=9"));

    assert!(rx.try_recv().is_err(), "undecodable entries are dropped, not emitted");
}

#[tokio::test]
async fn undecodable_entry_mid_batch_does_not_block_the_others() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/ct/v1/get-sth"))
        .respond_with(ResponseTemplate::new(200).set_body_json(sth_body(0)))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ct/v1/get-sth"))
        .respond_with(ResponseTemplate::new(200).set_body_json(sth_body(3)))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/ct/v1/get-entries"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "entries": [
                {"leaf_input": valid_x509_entry_b64(), "extra_data": ""},
                {"leaf_input": "AAAA", "extra_data": ""},
                {"leaf_input": valid_x509_entry_b64(), "extra_data": ""}
            ]
        })))
        .mount(&server)
        .await;

    let descriptor = LogDescriptor::new(server.uri(), "test-log");
    let poller = LogPoller::new(descriptor, 256, Duration::from_millis(500));

    let (tx, mut rx) = mpsc::channel(16);
    let (cancel_tx, cancel_rx) = watch::channel(false);

    let handle = tokio::spawn(poller.run(tx, cancel_rx));
    tokio::time::sleep(Duration::from_millis(200)).await;
    let _ = cancel_tx.send(true);
    let _ = handle.await;

    let mut received = Vec::new();
    while let Ok(record) = rx.try_recv() {
        received.push(record);
    }
    assert_eq!(received.len(), 2, "the two decodable entries should both have been emitted");
    assert_eq!(received[0].cert_index, 0);
    assert_eq!(received[1].cert_index, 2);
}
