//! gRPC request surface for the anti-bruteforce service.

mod server;
mod service;

pub use server::GrpcServer;
pub use service::AntiBruteforceService;

// Include the generated protobuf code
pub mod proto {
    pub mod antibruteforce {
        pub mod v1 {
            tonic::include_proto!("antibruteforce.v1");
        }
    }
}

// Re-export commonly used types
pub use proto::antibruteforce::v1::{
    anti_bruteforce_client::AntiBruteforceClient,
    anti_bruteforce_server::AntiBruteforceServer,
    AuthRequest, AuthResponse, ListKind as ProtoListKind, NetworkRequest, NetworkResponse,
    ResetBucketRequest, ResetBucketResponse,
};
