#![allow(clippy::panic)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use config::Config;
use server::ServeConfig;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::time::timeout;

/// Test client for making HTTP requests to the test server
pub struct TestClient {
    base_url: String,
    client: reqwest::Client,
}

impl TestClient {
    /// Create a new test client for the given base URL. Redirects are not followed.
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap();

        Self { base_url, client }
    }

    /// Send a GET request to the given path
    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.request(path).send().await.unwrap()
    }

    /// A GET request to the given path, for callers that need extra headers
    pub fn request(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.get(format!("{}{}", self.base_url, path))
    }
}

/// Builds the SQLite dataset every test server resolves against.
///
/// | range start   | location                            |
/// |---------------|-------------------------------------|
/// | 8.8.8.0       | US / California / Mountain View     |
/// | 8.8.9.0       | US, no region or city               |
/// | 200.147.0.0   | BR / Sao Paulo / Sao Paulo          |
pub async fn create_dataset(path: &Path) {
    let options = SqliteConnectOptions::new().filename(path).create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .unwrap();

    for statement in [
        "CREATE TABLE city_blocks (ip_start INTEGER PRIMARY KEY, loc_id INTEGER NOT NULL)",
        "CREATE TABLE city_location (loc_id INTEGER PRIMARY KEY, country_code TEXT, region_code TEXT, \
         city_name TEXT, postal_code TEXT, latitude REAL, longitude REAL, metro_code TEXT, area_code TEXT)",
        "CREATE TABLE country_blocks (country_code TEXT PRIMARY KEY, country_name TEXT)",
        "CREATE TABLE region_names (country_code TEXT, region_code TEXT, region_name TEXT)",
        "INSERT INTO country_blocks VALUES ('US', 'United States'), ('BR', 'Brazil')",
        "INSERT INTO region_names VALUES ('US', 'CA', 'California'), ('BR', '27', 'Sao Paulo')",
        "INSERT INTO city_location VALUES \
           (1, 'US', 'CA', 'Mountain View', '94043', 37.386, -122.0838, '807', '650'), \
           (2, 'US', '', '', '', 37.751, -97.822, '', ''), \
           (3, 'BR', '27', 'Sao Paulo', '', -23.5477, -46.6358, '', '')",
        "INSERT INTO city_blocks VALUES (134744064, 1), (134744320, 2), (3365076992, 3)",
    ] {
        sqlx::query(statement).execute(&pool).await.unwrap();
    }

    pool.close().await;
}

/// Test server that manages the lifecycle of a server instance
pub struct TestServer {
    pub client: TestClient,
    pub address: SocketAddr,
    _workdir: TempDir,
    _handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Start a new test server with the given TOML configuration.
    ///
    /// The dataset and static directory are always the generated ones; whatever
    /// the TOML says about them is replaced.
    pub async fn start(config_toml: &str) -> Self {
        let config: Config = toml::from_str(config_toml).unwrap();
        config.validate().unwrap();

        Self::start_with(config).await
    }

    /// Start a new test server with an already built configuration.
    pub async fn start_with(mut config: Config) -> Self {
        let workdir = tempfile::tempdir().unwrap();

        config.geoip.database = workdir.path().join("ipdb.sqlite");
        config.server.static_dir = static_dir(workdir.path());
        create_dataset(&config.geoip.database).await;

        // Find an available port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();

        let serve_config = ServeConfig {
            listen_address: address,
            config,
        };

        let (tx, mut rx) = tokio::sync::oneshot::channel();
        let handle = tokio::spawn(async move {
            // Drop the listener so the server can bind to the address
            drop(listener);

            let _ = tx.send(server::serve(serve_config).await);
        });

        let client = TestClient::new(format!("http://{address}"));

        // Wait until the server answers, or report why it stopped
        for _ in 0..50 {
            if let Ok(Err(e)) = rx.try_recv() {
                panic!("Server failed to start: {e}");
            }

            let probe = timeout(Duration::from_millis(100), client.request("/static/").send()).await;

            if matches!(probe, Ok(Ok(_))) {
                break;
            }

            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        TestServer {
            client,
            address,
            _workdir: workdir,
            _handle: handle,
        }
    }
}

fn static_dir(workdir: &Path) -> PathBuf {
    let dir = workdir.join("static");

    std::fs::create_dir(&dir).unwrap();
    std::fs::write(dir.join("index.html"), "<!doctype html><title>freegeoip</title>").unwrap();
    std::fs::write(
        dir.join("crossdomain.xml"),
        r#"<cross-domain-policy><allow-access-from domain="*"/></cross-domain-policy>"#,
    )
    .unwrap();

    dir
}

/// A free port on the loopback interface.
pub async fn free_address() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}
