//! Bucketeer - an Open Service Broker for S3 buckets.
//!
//! This binary serves the broker API built on `bucketeer-http`, wired to
//! real S3 and IAM backends through the AWS SDK. Provisioning a service
//! instance creates a bucket; binding mints a dedicated IAM user with an
//! access key and a bucket-scoped policy.
//!
//! # Usage
//!
//! ```text
//! BROKER_USERNAME=admin BROKER_PASSWORD=secret bucketeer-server
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `BROKER_LISTEN` | `0.0.0.0:3000` | Bind address |
//! | `BROKER_USERNAME` | *(required)* | Basic-auth username for `/v2` routes |
//! | `BROKER_PASSWORD` | *(required)* | Basic-auth password for `/v2` routes |
//! | `CATALOG_PATH` | `catalog.json` | Path to the catalog document |
//! | `AWS_REGION` | `us-east-1` | Region buckets are created in |
//! | `S3_ENDPOINT` | *(unset)* | S3-compatible endpoint override (MinIO and friends) |
//! | `LOG_LEVEL` | `info` | Log level filter |
//! | `RUST_LOG` | *(unset)* | Fine-grained tracing filter (overrides `LOG_LEVEL`) |

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use aws_sdk_s3::config::Region;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as HttpConnBuilder;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use bucketeer_broker::S3Broker;
use bucketeer_core::{BrokerConfig, BrokerTagGenerator, Catalog};
use bucketeer_http::{BasicCredentials, BrokerService};
use bucketeer_iam::AwsIdentityStore;
use bucketeer_s3::{AwsS3Api, S3BucketStore};

/// Server version reported at startup.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the tracing subscriber.
///
/// Uses `RUST_LOG` if set, otherwise falls back to the `LOG_LEVEL` config value.
fn init_tracing(log_level: &str) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    Ok(())
}

/// The endpoint URL handed to the SDK. Operators usually configure a bare
/// `host:port`; the SDK wants a scheme on it.
fn sdk_endpoint_url(endpoint: &str, insecure: bool) -> String {
    if endpoint.contains("://") {
        endpoint.to_owned()
    } else if insecure {
        format!("http://{endpoint}")
    } else {
        format!("https://{endpoint}")
    }
}

/// Build the broker from configuration: load the catalog and wire the S3
/// and IAM backends.
async fn build_broker(config: &BrokerConfig) -> Result<S3Broker> {
    let catalog = Catalog::load(&config.catalog_path)?;

    let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new(config.region.clone()))
        .load()
        .await;

    let mut s3_builder = aws_sdk_s3::config::Builder::from(&sdk_config);
    if let Some(endpoint) = &config.s3_endpoint {
        // S3-compatible backends route by path, not virtual host.
        s3_builder = s3_builder
            .endpoint_url(sdk_endpoint_url(endpoint, config.insecure_skip_verify))
            .force_path_style(true);
    }
    let s3_client = aws_sdk_s3::Client::from_conf(s3_builder.build());
    let iam_client = aws_sdk_iam::Client::new(&sdk_config);

    let mut buckets = S3BucketStore::new(AwsS3Api::new(s3_client), &config.region);
    if let Some(endpoint) = &config.s3_endpoint {
        buckets = buckets.with_endpoint(endpoint.clone());
    }

    Ok(S3Broker::new(
        config,
        catalog,
        Arc::new(buckets),
        Arc::new(AwsIdentityStore::new(iam_client)),
        Arc::new(BrokerTagGenerator::new()),
    ))
}

/// Run the accept loop, serving connections until a shutdown signal is received.
async fn serve(listener: TcpListener, service: BrokerService<S3Broker>) -> Result<()> {
    let graceful = hyper_util::server::graceful::GracefulShutdown::new();
    let http = HttpConnBuilder::new(TokioExecutor::new());

    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
        info!("received shutdown signal, draining connections");
    };

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (stream, peer_addr) = match result {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!(error = %e, "failed to accept connection");
                        continue;
                    }
                };

                let svc = service.clone();
                let conn = http.serve_connection(TokioIo::new(stream), svc);
                let conn = graceful.watch(conn.into_owned());

                tokio::spawn(async move {
                    if let Err(e) = conn.await {
                        error!(peer_addr = %peer_addr, error = %e, "connection error");
                    }
                });
            }

            () = &mut shutdown => {
                info!("shutting down gracefully");
                break;
            }
        }
    }

    // Wait for in-flight requests to complete.
    graceful.shutdown().await;
    info!("all connections drained, exiting");

    Ok(())
}

/// Probe the health endpoint of a running broker.
///
/// Exits with code 0 if healthy, 1 otherwise.
async fn run_health_check(addr: &str) -> Result<()> {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    let stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("cannot connect to {addr}"))?;

    let (mut reader, mut writer) = stream.into_split();

    let request = format!("GET /health HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    writer.write_all(request.as_bytes()).await?;
    writer.shutdown().await?;

    let mut response = String::new();
    reader.read_to_string(&mut response).await?;

    if response.contains("200 OK") && response.contains("\"status\":\"running\"") {
        Ok(())
    } else {
        anyhow::bail!("unhealthy response from {addr}")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Handle --health-check flag for Docker HEALTHCHECK.
    if std::env::args().any(|a| a == "--health-check") {
        let config = BrokerConfig::from_env();
        let addr = config.listen.replace("0.0.0.0", "127.0.0.1");
        let healthy = run_health_check(&addr).await.is_ok();
        std::process::exit(i32::from(!healthy));
    }

    let config = BrokerConfig::from_env();
    config.validate()?;

    init_tracing(&config.log_level)?;

    info!(
        listen = %config.listen,
        region = %config.region,
        catalog_path = %config.catalog_path,
        s3_endpoint = config.s3_endpoint.as_deref().unwrap_or("(regional default)"),
        bucket_prefix = %config.bucket_prefix,
        iam_path = %config.iam_path,
        version = VERSION,
        "starting bucketeer broker",
    );

    let broker = build_broker(&config).await?;
    let service = BrokerService::new(
        broker,
        BasicCredentials::new(&config.username, &config.password),
    );

    let addr: SocketAddr = config
        .listen
        .parse()
        .with_context(|| format!("invalid bind address: {}", config.listen))?;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    info!(%addr, "listening for connections");

    serve(listener, service).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_add_scheme_to_bare_endpoints() {
        assert_eq!(
            sdk_endpoint_url("minio.local:9000", false),
            "https://minio.local:9000"
        );
        assert_eq!(
            sdk_endpoint_url("minio.local:9000", true),
            "http://minio.local:9000"
        );
        assert_eq!(
            sdk_endpoint_url("http://minio.local:9000", false),
            "http://minio.local:9000"
        );
    }
}
