//! Quota counters shared through Redis. The ignored tests need a Redis server on localhost:6379.

use integration_tests::TestServer;

fn unique_prefix(test: &str) -> String {
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis();

    format!("test_{test}_{}_{timestamp}:", std::process::id())
}

#[tokio::test]
#[ignore = "requires a running Redis"]
async fn redis_quota() {
    let key_prefix = unique_prefix("redis_quota");

    let server = TestServer::start(&indoc::formatdoc! {r#"
        [server.quota]
        limit = 3
        window = "60s"

        [server.quota.storage]
        type = "redis"
        url = "redis://localhost:6379/0"
        key_prefix = "{key_prefix}"
    "#})
    .await;

    let mut statuses = Vec::new();
    for _ in 0..5 {
        statuses.push(server.client.get("/csv/8.8.8.8").await.status().as_u16());
    }

    assert_eq!(statuses, [200, 200, 200, 403, 403]);
}

#[tokio::test]
#[ignore = "requires a running Redis"]
async fn redis_quota_is_shared_between_instances() {
    let key_prefix = unique_prefix("redis_shared");

    let config = indoc::formatdoc! {r#"
        [server.quota]
        limit = 4
        window = "60s"

        [server.quota.storage]
        type = "redis"
        url = "redis://localhost:6379/0"
        key_prefix = "{key_prefix}"
    "#};

    let first = TestServer::start(&config).await;
    let second = TestServer::start(&config).await;

    for _ in 0..2 {
        assert_eq!(first.client.get("/json/8.8.8.8").await.status(), 200);
        assert_eq!(second.client.get("/json/8.8.8.8").await.status(), 200);
    }

    assert_eq!(first.client.get("/json/8.8.8.8").await.status(), 403);
    assert_eq!(second.client.get("/json/8.8.8.8").await.status(), 403);
}

#[tokio::test]
async fn unreachable_redis_fails_startup() {
    let workdir = tempfile::tempdir().unwrap();
    let database = workdir.path().join("ipdb.sqlite");
    integration_tests::create_dataset(&database).await;

    let mut config: config::Config = toml::from_str(indoc::indoc! {r#"
        [server.quota.storage]
        type = "redis"
        url = "redis://127.0.0.1:1/0"
        response_timeout = "200ms"

        [server.quota.storage.pool]
        max_size = 1
    "#})
    .unwrap();
    config.geoip.database = database;

    let address = integration_tests::free_address().await;
    let result = server::serve(server::ServeConfig {
        listen_address: address,
        config,
    })
    .await;

    let error = result.unwrap_err().to_string();
    assert!(error.contains("request quota"), "{error}");
}
