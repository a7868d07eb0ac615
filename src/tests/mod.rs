use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::mpsc;

use crate::client::{ApiError, FetchOutcome};
use crate::decode::{decode, DecodeError};
use crate::payload::{normalize, PageMeta, Payload, Row};
use crate::search;
use crate::table::{page_view, FilterState};

#[test]
fn decode_agrees_with_plain_parser_on_valid_json() {
    for text in [
        r#"{"status":true,"data":[1,2]}"#,
        r#"[1,2,3]"#,
        "null",
        "true",
        "42",
        r#""plain string""#,
    ] {
        let expected: Value = serde_json::from_str(text).unwrap();
        assert_eq!(decode(text).unwrap(), expected);
    }
}

#[test]
fn decode_strips_spurious_empty_array_prefix() {
    let body = r#"{"status":true,"data":{"x":1}}"#;
    let corrupted = format!("[]{body}");
    assert_eq!(decode(&corrupted).unwrap(), decode(body).unwrap());
    assert_eq!(
        decode(&corrupted).unwrap(),
        json!({"status": true, "data": {"x": 1}})
    );
}

#[test]
fn decode_recovers_object_between_noise() {
    let text = "warning: deprecated call\n{\"a\":1}<!-- trailer -->";
    assert_eq!(decode(text).unwrap(), json!({"a": 1}));
}

#[test]
fn decode_rejects_empty_input() {
    assert!(matches!(decode(""), Err(DecodeError::Empty)));
    assert!(matches!(decode("   \n"), Err(DecodeError::Empty)));
}

#[test]
fn decode_rejects_concatenated_objects() {
    // First-{ to last-} spans both objects; the span itself is invalid.
    let text = r#"{"a":1}{"b":2}"#;
    assert!(matches!(
        decode(text),
        Err(DecodeError::Unparsable { .. })
    ));
}

#[test]
fn decode_tries_brace_scan_when_prefix_strip_fails() {
    // Starts with [] but the remainder alone is not valid JSON; the brace
    // scan still recovers the object.
    let text = r#"[]garbage {"a":1} trailing"#;
    assert_eq!(decode(text).unwrap(), json!({"a": 1}));
}

#[test]
fn normalize_resolves_laravel_page_envelope() {
    let value = json!({
        "data": {
            "data": [{"id": 1}, {"id": 2}],
            "current_page": 2,
            "per_page": 2,
            "total": 5,
            "last_page": 3
        }
    });
    let payload = normalize(value).unwrap();
    match payload {
        Payload::Paginated { items, meta } => {
            assert_eq!(items.len(), 2);
            assert_eq!(
                meta,
                PageMeta {
                    page: 2,
                    page_size: 2,
                    total: 5,
                    last_page: 3
                }
            );
        }
        other => panic!("expected paginated payload, got {other:?}"),
    }
}

#[test]
fn normalize_handles_flat_and_wrapped_shapes() {
    assert_eq!(
        normalize(json!([{"id": 1}])).unwrap().items().len(),
        1
    );
    assert_eq!(
        normalize(json!({"status": true, "data": [{"id": 1}, {"id": 2}]}))
            .unwrap()
            .items()
            .len(),
        2
    );
    assert_eq!(
        normalize(json!({"media": [{"id": 9}]})).unwrap().items().len(),
        1
    );
    // A bare record is a one-row list; null is an empty one.
    assert_eq!(normalize(json!({"id": 3})).unwrap().items().len(), 1);
    assert!(normalize(json!(null)).unwrap().is_empty());
    assert!(normalize(json!(17)).is_err());
}

#[test]
fn normalize_defaults_missing_meta_fields() {
    let value = json!({"data": [{"id": 1}], "total": 41, "per_page": 20});
    match normalize(value).unwrap() {
        Payload::Paginated { meta, .. } => {
            assert_eq!(meta.page, 1);
            assert_eq!(meta.last_page, 3);
        }
        other => panic!("expected paginated payload, got {other:?}"),
    }
}

#[test]
fn payload_rows_keep_only_objects() {
    let payload = normalize(json!([{"id": 1}, "stray", 7, {"id": 2}])).unwrap();
    assert_eq!(payload.rows().len(), 2);
}

fn plot_rows(count: usize) -> Vec<Row> {
    (0..count)
        .map(|i| {
            json!({"id": i, "code": format!("P{i}")})
                .as_object()
                .cloned()
                .unwrap_or_default()
        })
        .collect()
}

#[test]
fn every_page_concatenates_to_the_filtered_set_exactly_once() {
    let rows = plot_rows(11);
    let filters = FilterState::default();
    for page_size in [1, 3, 4, 11, 50] {
        let first = page_view(&rows, &[], &filters, 1, page_size);
        let mut seen: Vec<Row> = Vec::new();
        for page in 1..=first.total_pages {
            let view = page_view(&rows, &[], &filters, page, page_size);
            assert!(view.rows.len() <= page_size);
            seen.extend(view.rows);
        }
        assert_eq!(seen, rows, "page_size {page_size}");
    }
}

#[test]
fn settle_separates_empty_from_failed() {
    let empty = crate::client::settle(Ok(Payload::Flat { items: Vec::new() }));
    assert_eq!(empty, FetchOutcome::Empty);

    let failed = crate::client::settle(Err(ApiError::Status {
        status: 500,
        url: "https://backoffice.example.com/api/ventures".to_string(),
    }));
    match failed {
        FetchOutcome::Failed { reason } => assert!(reason.contains("500")),
        other => panic!("expected failed outcome, got {other:?}"),
    }

    let rows = crate::client::settle(Ok(normalize(json!([{"id": 1}])).unwrap()));
    assert_eq!(rows.rows().len(), 1);
}

#[tokio::test]
async fn debounce_collapses_a_burst_into_the_last_query() {
    let (tx, mut rx) = mpsc::channel::<String>(16);
    for q in ["v", "ve", "ven", "venk"] {
        tx.send(q.to_string()).await.unwrap();
    }
    drop(tx);
    let settled = search::next_query(&mut rx, Duration::from_millis(30)).await;
    assert_eq!(settled.as_deref(), Some("venk"));
    assert!(search::next_query(&mut rx, Duration::from_millis(30))
        .await
        .is_none());
}

#[tokio::test]
async fn debounce_separates_bursts_across_quiet_periods() {
    let (tx, mut rx) = mpsc::channel::<String>(16);
    tx.send("first".to_string()).await.unwrap();
    let settled = search::next_query(&mut rx, Duration::from_millis(20)).await;
    assert_eq!(settled.as_deref(), Some("first"));

    tx.send("second".to_string()).await.unwrap();
    drop(tx);
    let settled = search::next_query(&mut rx, Duration::from_millis(20)).await;
    assert_eq!(settled.as_deref(), Some("second"));
}

#[tokio::test]
async fn stale_responses_never_overwrite_newer_ones() {
    let seq = search::RequestSequence::new();
    let slow = seq.begin();
    let fast = seq.begin();
    assert!(!seq.is_current(slow));
    assert!(seq.is_current(fast));
}

#[tokio::test]
async fn search_loop_drops_superseded_fetches() {
    let (query_tx, query_rx) = mpsc::channel::<String>(16);
    let (out_tx, mut out_rx) = mpsc::channel::<(String, FetchOutcome)>(16);

    // The first query's fetch is much slower than the second's, so its
    // response lands late and must be dropped.
    let fetch = |query: String| async move {
        let delay = if query == "slow" { 120 } else { 10 };
        tokio::time::sleep(Duration::from_millis(delay)).await;
        FetchOutcome::Rows {
            rows: plot_rows(1),
            meta: None,
        }
    };
    let loop_handle = tokio::spawn(search::search_loop(
        query_rx,
        Duration::from_millis(15),
        fetch,
        out_tx,
    ));

    query_tx.send("slow".to_string()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(40)).await;
    query_tx.send("fast".to_string()).await.unwrap();
    drop(query_tx);
    loop_handle.await.unwrap();

    let mut delivered: Vec<String> = Vec::new();
    while let Some((query, _)) = out_rx.recv().await {
        delivered.push(query);
    }
    assert_eq!(delivered, vec!["fast".to_string()]);
}

#[test]
fn client_rejects_bad_construction_input() {
    use crate::client::{ApiClient, ClientOptions};

    let bad_url = ClientOptions {
        base_url: "not a url".to_string(),
        ..Default::default()
    };
    assert!(matches!(
        ApiClient::new(&bad_url),
        Err(ApiError::InvalidBaseUrl { .. })
    ));

    let bad_token = ClientOptions {
        base_url: "https://backoffice.example.com/api".to_string(),
        token: "line\nbreak".to_string(),
        ..Default::default()
    };
    assert!(matches!(
        ApiClient::new(&bad_token),
        Err(ApiError::InvalidToken)
    ));
}

#[test]
fn client_joins_endpoint_paths_under_the_api_root() {
    use crate::client::{ApiClient, ClientOptions};

    let client = ApiClient::new(&ClientOptions {
        base_url: "https://backoffice.example.com/api".to_string(),
        token: "tok".to_string(),
        ..Default::default()
    })
    .unwrap();
    let url = client.endpoint("/members").unwrap();
    assert_eq!(url.as_str(), "https://backoffice.example.com/api/members");
}
