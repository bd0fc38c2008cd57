//! Anti-bruteforce service implementation.

use std::net::IpAddr;
use std::sync::Arc;
use tonic::{Request, Response, Status};
use tracing::{error, info, instrument, warn};

use super::proto::antibruteforce::v1::{
    anti_bruteforce_server::AntiBruteforce, AuthRequest, AuthResponse, ListKind as ProtoListKind,
    NetworkRequest, NetworkResponse, ResetBucketRequest, ResetBucketResponse,
};

use crate::error::GuardError;
use crate::lists::{AddressItem, IpLists, Ipv4Net, ListKind};
use crate::ratelimit::{AdmissionBackend, AuthAttempt, BucketKey};

impl From<GuardError> for Status {
    fn from(err: GuardError) -> Self {
        match err {
            GuardError::Duplicate => Status::already_exists(err.to_string()),
            GuardError::NotExists => Status::not_found(err.to_string()),
            GuardError::InvalidNetwork(_)
            | GuardError::InvalidBucketKey
            | GuardError::UnknownListKind(_) => Status::invalid_argument(err.to_string()),
            other => {
                error!(error = %other, "Request failed");
                Status::internal(other.to_string())
            }
        }
    }
}

/// Implementation of the `AntiBruteforce` gRPC interface.
pub struct AntiBruteforceService<B: AdmissionBackend> {
    /// Admission decisions and bucket resets
    backend: Arc<B>,
    /// List management
    lists: IpLists,
}

impl<B: AdmissionBackend> AntiBruteforceService<B> {
    pub fn new(backend: Arc<B>, lists: IpLists) -> Self {
        Self { backend, lists }
    }
}

fn parse_ip(ip: &str) -> Result<IpAddr, Status> {
    ip.parse()
        .map_err(|_| Status::invalid_argument(format!("'{}' is not a valid IP address", ip)))
}

fn parse_network_request(req: &NetworkRequest) -> Result<(ListKind, Ipv4Net), Status> {
    let kind = match ProtoListKind::try_from(req.kind) {
        Ok(ProtoListKind::Whitelist) => ListKind::Whitelist,
        Ok(ProtoListKind::Blacklist) => ListKind::Blacklist,
        _ => return Err(Status::invalid_argument("kind must be whitelist or blacklist")),
    };
    let network = req.subnet.parse::<Ipv4Net>()?;
    Ok((kind, network))
}

fn network_response(item: AddressItem) -> NetworkResponse {
    NetworkResponse {
        id: item.id,
        address: item.address,
        added_at: Some(prost_types::Timestamp {
            seconds: item.added_at.timestamp(),
            nanos: item.added_at.timestamp_subsec_nanos() as i32,
        }),
    }
}

#[tonic::async_trait]
impl<B: AdmissionBackend + 'static> AntiBruteforce for AntiBruteforceService<B> {
    /// Decide whether a login attempt may proceed.
    #[instrument(skip(self, request), fields(login = %request.get_ref().login, ip = %request.get_ref().ip))]
    async fn auth(&self, request: Request<AuthRequest>) -> Result<Response<AuthResponse>, Status> {
        let req = request.into_inner();

        if req.login.is_empty() || req.password.is_empty() {
            warn!("Received auth request without login or password");
            return Err(Status::invalid_argument("login and password are required"));
        }
        let ip = parse_ip(&req.ip)?;

        let attempt = AuthAttempt::new(req.login, req.password, ip);
        let ok = self.backend.is_allowed(&attempt).await?;

        info!(ok, "Auth decision made");
        Ok(Response::new(AuthResponse { ok }))
    }

    #[instrument(skip(self, request), fields(kind = request.get_ref().kind, subnet = %request.get_ref().subnet))]
    async fn add_network(
        &self,
        request: Request<NetworkRequest>,
    ) -> Result<Response<NetworkResponse>, Status> {
        let (kind, network) = parse_network_request(request.get_ref())?;

        let item = self.lists.get(kind).add(network).await?;

        info!(list = %kind, address = %item.address, "Network added");
        Ok(Response::new(network_response(item)))
    }

    #[instrument(skip(self, request), fields(kind = request.get_ref().kind, subnet = %request.get_ref().subnet))]
    async fn delete_network(
        &self,
        request: Request<NetworkRequest>,
    ) -> Result<Response<NetworkResponse>, Status> {
        let (kind, network) = parse_network_request(request.get_ref())?;

        let item = self.lists.get(kind).delete(network).await?;

        info!(list = %kind, address = %item.address, "Network deleted");
        Ok(Response::new(network_response(item)))
    }

    #[instrument(skip(self, request), fields(login = %request.get_ref().login, ip = %request.get_ref().ip))]
    async fn reset_bucket(
        &self,
        request: Request<ResetBucketRequest>,
    ) -> Result<Response<ResetBucketResponse>, Status> {
        let req = request.into_inner();

        let ip = match req.ip.as_str() {
            "" => None,
            ip => Some(parse_ip(ip)?),
        };
        let key = BucketKey::new(Some(req.login), ip)?;

        let deleted = self.backend.delete_bucket(&key).await?;

        info!(deleted, "Bucket reset");
        Ok(Response::new(ResetBucketResponse { deleted }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::{Policy, RateLimiter, WindowRegistry};

    fn service() -> AntiBruteforceService<RateLimiter> {
        let lists = IpLists::in_memory();
        let policy = Policy {
            limit_ip: 10,
            limit_login: 2,
            limit_password: 10,
        };
        let limiter = Arc::new(RateLimiter::new(policy, lists.clone(), WindowRegistry::default()));
        AntiBruteforceService::new(limiter, lists)
    }

    fn auth_request(login: &str, ip: &str) -> Request<AuthRequest> {
        Request::new(AuthRequest {
            login: login.to_string(),
            password: "password".to_string(),
            ip: ip.to_string(),
        })
    }

    fn network_request(kind: ProtoListKind, subnet: &str) -> Request<NetworkRequest> {
        Request::new(NetworkRequest {
            kind: kind.into(),
            subnet: subnet.to_string(),
        })
    }

    #[tokio::test]
    async fn test_auth_validation() {
        let service = service();

        let err = service.auth(auth_request("", "10.0.0.1")).await.unwrap_err();
        assert_eq!(err.code(), tonic::Code::InvalidArgument);

        let err = service.auth(auth_request("l", "10.0.0")).await.unwrap_err();
        assert_eq!(err.code(), tonic::Code::InvalidArgument);
    }

    #[tokio::test]
    async fn test_auth_limits_login() {
        let service = service();

        for _ in 0..2 {
            let response = service.auth(auth_request("l", "10.0.0.1")).await.unwrap();
            assert!(response.into_inner().ok);
        }
        let response = service.auth(auth_request("l", "10.0.0.1")).await.unwrap();
        assert!(!response.into_inner().ok);
    }

    #[tokio::test]
    async fn test_add_network_conflicts() {
        let service = service();

        let response = service
            .add_network(network_request(ProtoListKind::Blacklist, "192.168.0.1/16"))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(response.address, "192.168.0.0/16");
        assert!(response.added_at.is_some());

        let err = service
            .add_network(network_request(ProtoListKind::Blacklist, "192.168.0.1/32"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), tonic::Code::AlreadyExists);

        let err = service
            .add_network(network_request(ProtoListKind::Blacklist, "192.169.0.1"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), tonic::Code::InvalidArgument);

        let err = service
            .add_network(network_request(ProtoListKind::Unspecified, "192.169.0.1/32"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), tonic::Code::InvalidArgument);
    }

    #[tokio::test]
    async fn test_blacklisted_auth_is_rejected() {
        let service = service();
        service
            .add_network(network_request(ProtoListKind::Blacklist, "10.0.0.0/8"))
            .await
            .unwrap();

        let response = service.auth(auth_request("l", "10.9.9.9")).await.unwrap();
        assert!(!response.into_inner().ok);
    }

    #[tokio::test]
    async fn test_delete_missing_network() {
        let service = service();

        let err = service
            .delete_network(network_request(ProtoListKind::Whitelist, "10.0.0.0/8"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), tonic::Code::NotFound);

        service
            .add_network(network_request(ProtoListKind::Whitelist, "10.0.0.0/8"))
            .await
            .unwrap();
        let response = service
            .delete_network(network_request(ProtoListKind::Whitelist, "10.0.0.0/8"))
            .await
            .unwrap();
        assert_eq!(response.into_inner().address, "10.0.0.0/8");
    }

    #[tokio::test]
    async fn test_reset_bucket() {
        let service = service();

        let err = service
            .reset_bucket(Request::new(ResetBucketRequest::default()))
            .await
            .unwrap_err();
        assert_eq!(err.code(), tonic::Code::InvalidArgument);

        service.auth(auth_request("l", "10.0.0.1")).await.unwrap();

        let reset = || {
            Request::new(ResetBucketRequest {
                login: "l".to_string(),
                ip: String::new(),
            })
        };
        assert!(service.reset_bucket(reset()).await.unwrap().into_inner().deleted);
        assert!(!service.reset_bucket(reset()).await.unwrap().into_inner().deleted);
    }
}
