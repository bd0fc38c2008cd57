//! Control client for a running server.

use anyhow::{bail, Context};
use std::net::IpAddr;
use tonic::transport::Channel;
use tonic::Code;

use crate::cli::{CtlArgs, CtlCommand};
use crate::grpc::{AntiBruteforceClient, NetworkRequest, ProtoListKind, ResetBucketRequest};
use crate::lists::{Ipv4Net, ListKind};

type Client = AntiBruteforceClient<Channel>;

/// Execute one `ctl` subcommand against the server named in `args`.
pub async fn run(args: CtlArgs) -> anyhow::Result<()> {
    let endpoint = format!("http://{}:{}", args.host, args.port);
    let mut client = AntiBruteforceClient::connect(endpoint.clone())
        .await
        .with_context(|| format!("cannot connect to {}", endpoint))?;

    match args.command {
        CtlCommand::Add { kind, networks } => {
            for network in networks {
                add_network(&mut client, kind, network).await?;
            }
        }
        CtlCommand::Delete { kind, networks } => {
            for network in networks {
                delete_network(&mut client, kind, network).await?;
            }
        }
        CtlCommand::Reset { login, ip } => reset_bucket(&mut client, login, ip).await?,
    }

    Ok(())
}

fn network_request(kind: ListKind, network: Ipv4Net) -> NetworkRequest {
    let kind = match kind {
        ListKind::Whitelist => ProtoListKind::Whitelist,
        ListKind::Blacklist => ProtoListKind::Blacklist,
    };
    NetworkRequest {
        kind: kind.into(),
        subnet: network.to_string(),
    }
}

async fn add_network(client: &mut Client, kind: ListKind, network: Ipv4Net) -> anyhow::Result<()> {
    match client.add_network(network_request(kind, network)).await {
        Ok(_) => println!("{} successfully added to {}", network, kind),
        Err(status) if status.code() == Code::AlreadyExists => {
            println!("{} is already covered by {}", network, kind)
        }
        Err(status) => bail!("error: {}", status.message()),
    }
    Ok(())
}

async fn delete_network(client: &mut Client, kind: ListKind, network: Ipv4Net) -> anyhow::Result<()> {
    match client.delete_network(network_request(kind, network)).await {
        Ok(_) => println!("{} successfully deleted from {}", network, kind),
        Err(status) if status.code() == Code::NotFound => println!("{} not found in {}", network, kind),
        Err(status) => bail!("error: {}", status.message()),
    }
    Ok(())
}

async fn reset_bucket(client: &mut Client, login: Option<String>, ip: Option<IpAddr>) -> anyhow::Result<()> {
    if login.is_none() && ip.is_none() {
        bail!("login or ip must be set");
    }

    let request = ResetBucketRequest {
        login: login.unwrap_or_default(),
        ip: ip.map(|ip| ip.to_string()).unwrap_or_default(),
    };
    let response = client
        .reset_bucket(request)
        .await
        .map_err(|status| anyhow::anyhow!("error: {}", status.message()))?;

    if response.into_inner().deleted {
        println!("bucket successfully deleted");
    } else {
        println!("bucket not found");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_request_maps_kind() {
        let request = network_request(ListKind::Blacklist, "10.0.0.0/8".parse().unwrap());
        assert_eq!(request.kind(), ProtoListKind::Blacklist);
        assert_eq!(request.subnet, "10.0.0.0/8");
    }
}
