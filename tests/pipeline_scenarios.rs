// tests/pipeline_scenarios.rs
mod common;

use std::sync::Arc;

use common::{config, feeds, pipeline, rss, seeded};
use incident_timeline::ingest::sink::AppendPolicy;
use incident_timeline::{Collaborators, MemoryStore, Pipeline, RunStage};

const T_10_00: &str = "Tue, 07 Feb 2023 10:00:00 GMT";

#[tokio::test]
async fn empty_store_gets_header_and_one_row() {
    let store = Arc::new(MemoryStore::new());
    let p = pipeline(
        config(&["X"]),
        feeds(&[("X", rss(&[("L1", "Earthquake hits region", T_10_00)]))]),
        store.clone(),
    );

    let report = p.run().await;
    assert!(report.is_success(), "{report:?}");
    assert_eq!(report.committed, 1);

    let rows = store.rows();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0][0], "Date");
    assert_eq!(
        rows[1],
        vec![
            "07/02/2023",
            "10:00",
            "Earthquake hits region",
            "X",
            "X, 07/02/2023 10:00",
            "L1"
        ]
    );
}

#[tokio::test]
async fn link_already_recorded_appends_nothing() {
    let store = Arc::new(MemoryStore::with_header());
    let cfg = config(&["X"]);
    let xml = rss(&[("L1", "Earthquake hits region", T_10_00)]);

    let first = pipeline(cfg.clone(), feeds(&[("X", xml.clone())]), store.clone())
        .run()
        .await;
    assert_eq!(first.committed, 1);

    let second = pipeline(cfg, feeds(&[("X", xml)]), store.clone()).run().await;
    assert!(second.is_success());
    assert_eq!(second.committed, 0);
    assert_eq!(second.duplicates, 1);
    assert_eq!(store.data_rows().len(), 1);
}

#[tokio::test]
async fn rows_are_committed_oldest_first_across_sources() {
    let store = Arc::new(MemoryStore::with_header());
    let p = pipeline(
        config(&["A", "B"]),
        feeds(&[
            (
                "A",
                rss(&[("LA", "Earthquake aftershock", "Tue, 07 Feb 2023 11:00:00 GMT")]),
            ),
            ("B", rss(&[("LB", "Earthquake first report", T_10_00)])),
        ]),
        store.clone(),
    );

    let report = p.run().await;
    assert_eq!(report.committed, 2);
    let links: Vec<_> = store.data_rows().into_iter().map(|r| r[5].clone()).collect();
    assert_eq!(links, vec!["LB", "LA"]);
}

#[tokio::test]
async fn irrelevant_items_are_filtered() {
    let store = Arc::new(MemoryStore::with_header());
    let p = pipeline(
        config(&["X"]),
        feeds(&[("X", rss(&[("L1", "Football results", T_10_00)]))]),
        store.clone(),
    );

    let report = p.run().await;
    assert!(report.is_success());
    assert_eq!(report.filtered_out, 1);
    assert_eq!(report.committed, 0);
    assert_eq!(store.append_calls(), 0);
}

#[tokio::test]
async fn items_older_than_the_watermark_are_stale() {
    let store = seeded(&[[
        "07/02/2023",
        "09:00",
        "Earlier report",
        "X",
        "X, 07/02/2023 09:00",
        "L0",
    ]]);

    let p = pipeline(
        config(&["X"]),
        feeds(&[(
            "X",
            rss(&[("L9", "Earthquake update", "Tue, 07 Feb 2023 08:00:00 GMT")]),
        )]),
        store.clone(),
    );

    let report = p.run().await;
    assert_eq!(report.stale, 1);
    assert_eq!(report.duplicates, 0);
    assert_eq!(report.committed, 0);
    assert_eq!(store.data_rows().len(), 1);
}

#[tokio::test]
async fn padded_source_name_is_rejected_instead_of_bypassing_the_watermark() {
    let store = seeded(&[[
        "07/02/2023",
        "09:00",
        "Earlier report",
        "X ",
        "X , 07/02/2023 09:00",
        "L0",
    ]]);
    let cfg = config(&["X "]);
    let built = Pipeline::new(
        cfg,
        Collaborators {
            feeds: Arc::new(feeds(&[(
                "X ",
                rss(&[("L9", "Earthquake update", "Tue, 07 Feb 2023 08:00:00 GMT")]),
            )])),
            pages: Arc::new(common::NoPages),
            translator: None,
            store: store.clone(),
        },
    );
    let err = built.err().expect("padded name must not validate");
    assert!(format!("{err:#}").contains("whitespace"));
    assert_eq!(store.append_calls(), 0);
}

#[tokio::test]
async fn same_minute_as_watermark_is_stale_but_later_seconds_are_fresh() {
    let store = seeded(&[["07/02/2023", "10:00", "x", "X", "X, 07/02/2023 10:00", "L0"]]);
    let p = pipeline(
        config(&["X"]),
        feeds(&[(
            "X",
            rss(&[
                ("L1", "Earthquake a", "Tue, 07 Feb 2023 10:00:00 GMT"),
                ("L2", "Earthquake b", "Tue, 07 Feb 2023 10:00:30 GMT"),
            ]),
        )]),
        store.clone(),
    );

    let report = p.run().await;
    assert_eq!(report.stale, 1);
    assert_eq!(report.committed, 1);
    assert_eq!(store.data_rows()[1][5], "L2");
}

#[tokio::test]
async fn one_broken_feed_does_not_stop_the_run() {
    let store = Arc::new(MemoryStore::with_header());
    // "Y" has no fixture, so its fetch fails.
    let p = pipeline(
        config(&["Y", "X"]),
        feeds(&[("X", rss(&[("L1", "Earthquake hits region", T_10_00)]))]),
        store.clone(),
    );

    let report = p.run().await;
    assert!(report.is_success());
    assert_eq!(report.sources_failed, 1);
    assert_eq!(report.committed, 1);
}

#[tokio::test]
async fn malformed_feed_is_a_source_failure() {
    let store = Arc::new(MemoryStore::with_header());
    let p = pipeline(
        config(&["X"]),
        feeds(&[("X", "<html><body>502 Bad Gateway</body></html>".to_string())]),
        store.clone(),
    );
    let report = p.run().await;
    assert!(report.is_success());
    assert_eq!(report.sources_failed, 1);
    assert_eq!(store.append_calls(), 0);
}

#[tokio::test]
async fn disabled_sources_are_not_fetched() {
    let store = Arc::new(MemoryStore::with_header());
    let mut cfg = config(&["X", "Y"]);
    cfg.sources[1].enabled = false;
    let p = pipeline(
        cfg,
        feeds(&[("X", rss(&[("L1", "Earthquake hits region", T_10_00)]))]),
        store.clone(),
    );
    let report = p.run().await;
    assert_eq!(report.sources_disabled, 1);
    assert_eq!(report.sources_failed, 0);
    assert_eq!(report.committed, 1);
}

#[tokio::test]
async fn same_link_from_two_sources_is_committed_once() {
    let store = Arc::new(MemoryStore::with_header());
    let p = pipeline(
        config(&["A", "B"]),
        feeds(&[
            ("A", rss(&[("SHARED", "Earthquake wire story", T_10_00)])),
            ("B", rss(&[("SHARED", "Earthquake wire story", T_10_00)])),
        ]),
        store.clone(),
    );
    let report = p.run().await;
    assert_eq!(report.committed, 1);
    assert_eq!(report.duplicates, 1);
    assert_eq!(store.data_rows()[0][3], "A");
}

#[tokio::test]
async fn unreadable_store_fails_before_any_write() {
    let store = Arc::new(MemoryStore::with_header());
    store.set_fail_reads(true);
    let p = pipeline(
        config(&["X"]),
        feeds(&[("X", rss(&[("L1", "Earthquake hits region", T_10_00)]))]),
        store.clone(),
    );

    let report = p.run().await;
    assert!(!report.is_success());
    assert_eq!(report.stage, RunStage::Failed);
    assert_eq!(report.failed_at, Some(RunStage::LoadSnapshot));
    assert!(report.error.as_deref().unwrap().contains("store snapshot"));
    assert_eq!(report.items_seen, 0);
    assert_eq!(store.append_calls(), 0);
}

#[tokio::test]
async fn failed_append_continues_and_is_not_reappended_once_behind_watermark() {
    let store = Arc::new(MemoryStore::with_header());
    let cfg = config(&["X"]);
    let xml = rss(&[
        ("L1", "Earthquake first", "Tue, 07 Feb 2023 09:00:00 GMT"),
        ("L2", "Earthquake second", T_10_00),
    ]);
    store.fail_appends_for("L1");

    let report = pipeline(cfg.clone(), feeds(&[("X", xml.clone())]), store.clone())
        .run()
        .await;
    assert!(report.is_success());
    assert_eq!(report.append_failures, 1);
    assert_eq!(report.committed, 1);

    // L2 moved the watermark past L1, so the missed row is now stale.
    let rerun = pipeline(cfg, feeds(&[("X", xml)]), store.clone()).run().await;
    assert_eq!(rerun.committed, 0);
    assert_eq!(rerun.stale, 1);
    assert_eq!(rerun.duplicates, 1);
}

#[tokio::test]
async fn abort_policy_stops_at_first_failed_append() {
    let store = Arc::new(MemoryStore::with_header());
    let mut cfg = config(&["X"]);
    cfg.sink.on_append_error = AppendPolicy::Abort;
    store.fail_appends_for("L1");
    let p = pipeline(
        cfg,
        feeds(&[(
            "X",
            rss(&[
                ("L1", "Earthquake first", "Tue, 07 Feb 2023 09:00:00 GMT"),
                ("L2", "Earthquake second", T_10_00),
            ]),
        )]),
        store.clone(),
    );

    let report = p.run().await;
    assert_eq!(report.failed_at, Some(RunStage::Commit));
    assert_eq!(report.append_failures, 1);
    assert_eq!(report.committed, 0);
    assert!(store.data_rows().is_empty());
}

#[tokio::test]
async fn items_without_a_date_are_skipped() {
    let store = Arc::new(MemoryStore::with_header());
    let p = pipeline(
        config(&["X"]),
        feeds(&[(
            "X",
            "<rss><channel><item><title>Earthquake</title><link>L1</link></item></channel></rss>"
                .to_string(),
        )]),
        store.clone(),
    );
    let report = p.run().await;
    assert_eq!(report.items_seen, 1);
    assert_eq!(report.items_skipped, 1);
    assert_eq!(report.committed, 0);
}

#[tokio::test]
async fn display_offset_shifts_rendered_date_and_time() {
    let store = Arc::new(MemoryStore::with_header());
    let mut cfg = config(&["X"]);
    cfg.timeline.utc_offset_minutes = 180;
    let p = pipeline(
        cfg,
        feeds(&[(
            "X",
            rss(&[("L1", "Earthquake at night", "Mon, 06 Feb 2023 22:30:00 GMT")]),
        )]),
        store.clone(),
    );
    p.run().await;
    let row = &store.data_rows()[0];
    assert_eq!(row[0], "07/02/2023");
    assert_eq!(row[1], "01:30");
}
