//! Integration tests for pypi-rot
//!
//! These tests use wiremock to stand in for PyPI and for the hosts that
//! package metadata points at, and exercise the scraper and the dataset
//! builder end-to-end through the public API.

mod common {
    use pypi_rot::config::{IndexConfig, ScraperConfig, UserAgentConfig};
    use pypi_rot::index::PypiIndex;
    use pypi_rot::scraper::Scraper;
    use pypi_rot::{MetadataStore, RateLimiter, Shutdown};
    use serde_json::json;
    use std::sync::Arc;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub fn user_agent() -> UserAgentConfig {
        UserAgentConfig {
            crawler_name: "pypi-rot".to_string(),
            crawler_version: "test".to_string(),
            contact_email: "test@example.com".to_string(),
        }
    }

    pub fn scraper_config() -> ScraperConfig {
        ScraperConfig {
            freshness_days: 30,
            skip_window_days: 30,
            max_attempts: 2,
            backoff_base_ms: 1,
            backoff_max_ms: 10,
            rate_limited_multiplier: 2,
            rate_limited_max_ms: 100,
            idle_between_passes_secs: 0,
        }
    }

    pub fn pypi_index(server: &MockServer) -> PypiIndex {
        let index = IndexConfig {
            base_url: server.uri(),
            request_timeout_secs: 5,
            connect_timeout_secs: 5,
        };
        PypiIndex::new(&index, &user_agent()).unwrap()
    }

    pub fn scraper(
        server: &MockServer,
        store: Arc<dyn MetadataStore>,
        shutdown: Shutdown,
    ) -> Scraper {
        Scraper::new(
            Arc::new(pypi_index(server)),
            store,
            Arc::new(RateLimiter::unlimited()),
            scraper_config(),
            "integration",
            shutdown,
        )
    }

    /// Serves a listing of `names` at `/simple/`
    pub async fn mount_listing(server: &MockServer, names: &[&str]) {
        let projects: Vec<_> = names.iter().map(|n| json!({ "name": n })).collect();
        Mock::given(method("GET"))
            .and(path("/simple/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "meta": {"api-version": "1.1"},
                "projects": projects
            })))
            .mount(server)
            .await;
    }

    /// Serves `document` for `name`, expecting exactly `expected_calls` requests
    pub async fn mount_metadata(
        server: &MockServer,
        name: &str,
        document: serde_json::Value,
        expected_calls: u64,
    ) {
        Mock::given(method("GET"))
            .and(path(format!("/pypi/{}/json", name)))
            .respond_with(ResponseTemplate::new(200).set_body_json(document))
            .expect(expected_calls)
            .mount(server)
            .await;
    }
}

mod scraper_tests {
    use crate::common::*;
    use pypi_rot::scraper::PassOutcome;
    use pypi_rot::storage::PassStatus;
    use pypi_rot::{MetadataStore, Shutdown, SqliteStore};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_missing_package_does_not_stop_the_pass() {
        let server = MockServer::start().await;
        mount_listing(&server, &["bar", "baz"]).await;
        Mock::given(method("GET"))
            .and(path("/pypi/bar/json"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;
        mount_metadata(&server, "baz", json!({"info": {"name": "baz"}}), 1).await;

        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let scraper = scraper(&server, store.clone(), Shutdown::new());

        let report = scraper.run_pass().await.unwrap();

        assert_eq!(report.outcome, PassOutcome::Completed);
        assert!(store.get("bar").unwrap().is_none());
        assert_eq!(
            store.get("baz").unwrap().unwrap().document,
            json!({"info": {"name": "baz"}})
        );
        assert_eq!(report.counts.fetched, 1);
        assert_eq!(report.counts.skipped, 1);
    }

    #[tokio::test]
    async fn test_fresh_cache_means_no_requests() {
        let server = MockServer::start().await;
        mount_listing(&server, &["foo", "bar"]).await;
        // Each document is fetched exactly once across both passes
        mount_metadata(&server, "foo", json!({"info": {}}), 1).await;
        mount_metadata(&server, "bar", json!({"info": {}}), 1).await;

        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let scraper = scraper(&server, store.clone(), Shutdown::new());

        scraper.run_pass().await.unwrap();
        let second = scraper.run_pass().await.unwrap();

        assert_eq!(second.counts.fresh, 2);
        assert_eq!(second.counts.fetched, 0);
    }

    #[tokio::test]
    async fn test_cache_survives_restart() {
        let dir = TempDir::new().unwrap();
        let server = MockServer::start().await;
        mount_listing(&server, &["foo"]).await;
        mount_metadata(&server, "foo", json!({"info": {"version": "1.0"}}), 1).await;

        {
            let store = Arc::new(SqliteStore::open(dir.path()).unwrap());
            scraper(&server, store, Shutdown::new())
                .run_pass()
                .await
                .unwrap();
        }

        let store = Arc::new(SqliteStore::open(dir.path()).unwrap());
        let report = scraper(&server, store.clone(), Shutdown::new())
            .run_pass()
            .await
            .unwrap();

        assert_eq!(report.counts.fresh, 1);
        assert_eq!(
            store.get("foo").unwrap().unwrap().document["info"]["version"],
            "1.0"
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_shutdown_stops_perpetual_loop() {
        let server = MockServer::start().await;
        mount_listing(&server, &["foo"]).await;
        mount_metadata(&server, "foo", json!({}), 1).await;

        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let shutdown = Shutdown::new();
        let scraper = scraper(&server, store.clone(), shutdown.clone());

        let trigger = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            shutdown.trigger();
        });

        let summary = tokio::time::timeout(Duration::from_secs(10), scraper.run())
            .await
            .expect("scraper did not stop");
        trigger.await.unwrap();

        assert!(summary.passes_completed >= 1);
        assert_eq!(summary.counts.fetched, 1);

        let pass = store.latest_pass().unwrap().unwrap();
        assert_ne!(pass.status, PassStatus::Running);
    }
}

mod build_tests {
    use crate::common::*;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use pypi_rot::dataset::{DatasetBuilder, DatasetRow, RoleVerdict};
    use pypi_rot::output::{CsvRowWriter, RowSink};
    use pypi_rot::verifier::{HttpProber, LinkProbe};
    use pypi_rot::{
        LivenessVerdict, MetadataRecord, MetadataStore, RateLimiter, Shutdown, SqliteStore,
        UrlRole,
    };
    use serde_json::json;
    use std::sync::Arc;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Probe that reports every URL as dead
    struct DeadProbe;

    #[async_trait]
    impl LinkProbe for DeadProbe {
        async fn check(&self, url: &str) -> LivenessVerdict {
            LivenessVerdict::answered(url, 404, url, 0, Utc::now())
        }
    }

    #[tokio::test]
    async fn test_dead_url_still_produces_a_row() {
        let t0 = Utc.with_ymd_and_hms(2023, 5, 1, 12, 0, 0).unwrap();
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .put(&MetadataRecord::new(
                "foo",
                json!({"url": "https://dead.example/x"}),
                t0,
            ))
            .unwrap();

        let builder = DatasetBuilder::new(Arc::new(store), Arc::new(DeadProbe));
        let mut rows: Vec<DatasetRow> = Vec::new();
        let summary = builder.build(&mut rows).await.unwrap();

        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.name, "foo");
        assert_eq!(row.fetched_at, t0);
        assert_eq!(row.links.len(), 1);
        assert_eq!(row.links[0].reference.url, "https://dead.example/x");
        assert!(!row.links[0].verdict.reachable);
        assert_eq!(row.role_verdict("download"), RoleVerdict::Dead);
        assert_eq!(summary.unreachable, 1);
    }

    #[tokio::test]
    async fn test_dead_url_row_in_csv() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .put(&MetadataRecord::new(
                "foo",
                json!({"url": "https://dead.example/x"}),
                Utc::now(),
            ))
            .unwrap();

        let builder = DatasetBuilder::new(Arc::new(store), Arc::new(DeadProbe));
        let mut writer = CsvRowWriter::new(Vec::new());
        builder.build(&mut writer).await.unwrap();

        let csv = String::from_utf8(writer.into_inner()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("foo,"));
        assert!(lines[1].contains(",dead,"));
        assert!(lines[1].ends_with("https://dead.example/x"));
    }

    #[tokio::test]
    async fn test_scrape_then_build_against_live_hosts() {
        let pypi = MockServer::start().await;
        let host = MockServer::start().await;

        Mock::given(method("HEAD"))
            .and(path("/home"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&host)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/old-docs"))
            .respond_with(ResponseTemplate::new(301).insert_header("location", "/docs"))
            .mount(&host)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/docs"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&host)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/gone.tar.gz"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&host)
            .await;

        mount_listing(&pypi, &["alpha"]).await;
        mount_metadata(
            &pypi,
            "alpha",
            json!({
                "info": {
                    "name": "alpha",
                    "version": "2.0",
                    "summary": "Alpha, the first",
                    "home_page": format!("{}/home", host.uri()),
                    "docs_url": format!("{}/old-docs", host.uri()),
                    "download_url": format!("{}/gone.tar.gz", host.uri()),
                    "description": format!("Docs at {}/home", host.uri())
                }
            }),
            1,
        )
        .await;

        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        scraper(&pypi, store.clone(), Shutdown::new())
            .run_pass()
            .await
            .unwrap();

        let limiter = Arc::new(RateLimiter::unlimited());
        let prober = HttpProber::new(
            &pypi_rot::config::VerifierConfig::default(),
            &user_agent(),
            limiter,
        )
        .unwrap();
        let builder = DatasetBuilder::new(store, Arc::new(prober)).verbose(true);

        let mut rows: Vec<DatasetRow> = Vec::new();
        let summary = builder.build(&mut rows).await.unwrap();

        assert_eq!(summary.packages, 1);
        assert_eq!(summary.urls_checked, 3);
        assert_eq!(summary.reachable, 2);

        let row = &rows[0];
        assert_eq!(row.version.as_deref(), Some("2.0"));
        assert_eq!(row.role_verdict("homepage"), RoleVerdict::Alive);
        assert_eq!(row.role_verdict("documentation"), RoleVerdict::Alive);
        assert_eq!(row.role_verdict("download"), RoleVerdict::Dead);

        let docs = row.verdict_for(&UrlRole::Documentation).unwrap();
        assert_eq!(docs.redirects, 1);
        assert_eq!(
            docs.final_url.as_deref(),
            Some(format!("{}/docs", host.uri()).as_str())
        );

        let mut writer = CsvRowWriter::new(Vec::new());
        for row in &rows {
            writer.write_row(row).unwrap();
        }
        writer.finish().unwrap();
        let csv = String::from_utf8(writer.into_inner()).unwrap();
        assert!(csv.contains("\"Alpha, the first\""));
    }
}

mod config_tests {
    use pypi_rot::config::{compute_config_hash, resolve_config};
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_file_and_cli_overrides() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[limiter]
min-interval-ms = 2500

[user-agent]
contact-email = "file@example.com"
"#
        )
        .unwrap();

        let config = resolve_config(Some(file.path()), Some("cli@example.com"), None).unwrap();

        assert_eq!(config.limiter.min_interval_ms, 2500);
        assert_eq!(config.user_agent.contact_email, "cli@example.com");
        assert!(!compute_config_hash(&config).unwrap().is_empty());
    }

    #[test]
    fn test_missing_email_is_fatal() {
        assert!(resolve_config(None, None, None).is_err());
        assert!(resolve_config(None, Some("not-an-email"), None).is_err());
    }
}
