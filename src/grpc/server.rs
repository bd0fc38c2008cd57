//! gRPC server implementation.

use std::net::SocketAddr;
use std::sync::Arc;
use tonic::transport::Server;
use tracing::{error, info};

use super::proto::antibruteforce::v1::anti_bruteforce_server::AntiBruteforceServer;
use super::service::AntiBruteforceService;
use crate::error::{GuardError, Result};
use crate::lists::IpLists;
use crate::ratelimit::AdmissionBackend;

/// gRPC server for the anti-bruteforce service.
pub struct GrpcServer<B: AdmissionBackend + 'static> {
    /// Address to bind to
    addr: SocketAddr,
    /// Admission backend
    backend: Arc<B>,
    /// Lists managed through the API
    lists: IpLists,
}

impl<B: AdmissionBackend + 'static> GrpcServer<B> {
    /// Create a new gRPC server.
    pub fn new(addr: SocketAddr, backend: Arc<B>, lists: IpLists) -> Self {
        Self {
            addr,
            backend,
            lists,
        }
    }

    /// Start the gRPC server with graceful shutdown.
    ///
    /// The server will shut down when the provided signal resolves.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send,
    {
        let service = AntiBruteforceService::new(self.backend, self.lists);

        info!(
            addr = %self.addr,
            "Starting gRPC server for AntiBruteforce with graceful shutdown"
        );

        Server::builder()
            .add_service(AntiBruteforceServer::new(service))
            .serve_with_shutdown(self.addr, signal)
            .await
            .map_err(|e| {
                error!(error = %e, "gRPC server failed");
                GuardError::Grpc(e)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grpc::{AntiBruteforceClient, AuthRequest};
    use crate::ratelimit::{Policy, RateLimiter, WindowRegistry};
    use std::time::Duration;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_serves_auth_until_shutdown() {
        let lists = IpLists::in_memory();
        let policy = Policy {
            limit_ip: 5,
            limit_login: 5,
            limit_password: 5,
        };
        let limiter = Arc::new(RateLimiter::new(policy, lists.clone(), WindowRegistry::default()));

        let addr: SocketAddr = "127.0.0.1:50761".parse().unwrap();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let server = GrpcServer::new(addr, limiter, lists);
        let handle = tokio::spawn(server.serve_with_shutdown(async move {
            let _ = shutdown_rx.await;
        }));

        // Give the listener a moment to bind
        let mut client = None;
        for _ in 0..50 {
            match AntiBruteforceClient::connect(format!("http://{}", addr)).await {
                Ok(c) => {
                    client = Some(c);
                    break;
                }
                Err(_) => tokio::time::sleep(Duration::from_millis(20)).await,
            }
        }
        let mut client = client.expect("server did not start");

        let response = client
            .auth(AuthRequest {
                login: "l".to_string(),
                password: "p".to_string(),
                ip: "10.0.0.1".to_string(),
            })
            .await
            .unwrap();
        assert!(response.into_inner().ok);

        drop(client);
        shutdown_tx.send(()).unwrap();
        handle.await.unwrap().unwrap();
    }
}
