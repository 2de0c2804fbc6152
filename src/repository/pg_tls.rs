//! PostgreSQL TLS connection helpers using rustls.
//!
//! TLS is required by default; set `no_tls = true` or `CATALOG_NO_TLS=1`
//! to disable it for local databases.

use rustls::ClientConfig;
use tokio_postgres_rustls::MakeRustlsConnect;

fn build_rustls_config() -> ClientConfig {
    let mut root_store = rustls::RootCertStore::empty();
    let native = rustls_native_certs::load_native_certs();
    for err in &native.errors {
        tracing::warn!("Failed to load a native certificate: {}", err);
    }
    for cert in native.certs {
        root_store.add(cert).ok();
    }

    ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth()
}

pub fn make_tls_connector() -> MakeRustlsConnect {
    MakeRustlsConnect::new(build_rustls_config())
}

/// Connect to PostgreSQL and spawn the connection task.
///
/// Returns just the `Client`. The connection future is spawned as a
/// background tokio task automatically.
pub async fn connect_raw(
    url: &str,
    no_tls: bool,
) -> Result<tokio_postgres::Client, tokio_postgres::Error> {
    if no_tls {
        let (client, connection) = tokio_postgres::connect(url, tokio_postgres::NoTls).await?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!("PostgreSQL connection error: {}", e);
            }
        });
        Ok(client)
    } else {
        let tls = make_tls_connector();
        let (client, connection) = tokio_postgres::connect(url, tls).await?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!("PostgreSQL connection error: {}", e);
            }
        });
        Ok(client)
    }
}
