//! Outbound delivery of [`IracCommand`]s.

use crate::command::{CommandResponse, IracCommand};
use crate::error::RpcError;
use crate::topology::NodeAddress;
use async_trait::async_trait;
use futures_util::future::join_all;
use irac_clock::SiteName;

/// Sends commands to nodes of the local cluster and to remote sites.
#[async_trait]
pub trait IracTransport: Send + Sync {
    /// Send to one node in the local cluster.
    async fn send_to_node(
        &self,
        target: &NodeAddress,
        command: IracCommand,
    ) -> Result<CommandResponse, RpcError>;

    /// Send to a remote site; the site routes it to the key's owner.
    async fn send_to_site(
        &self,
        site: &SiteName,
        command: IracCommand,
    ) -> Result<CommandResponse, RpcError>;
}

/// Send `command` to every target concurrently.
///
/// All targets are attempted. The first error is returned after every call
/// has finished.
pub async fn send_to_many(
    transport: &dyn IracTransport,
    targets: &[NodeAddress],
    command: &IracCommand,
) -> Result<(), RpcError> {
    let results = join_all(
        targets
            .iter()
            .map(|target| transport.send_to_node(target, command.clone())),
    )
    .await;
    results.into_iter().find_map(Result::err).map_or(Ok(()), Err)
}

/// Ask `site` whether it still needs the tombstone for the command's key.
pub async fn remote_site_check(
    transport: &dyn IracTransport,
    site: &SiteName,
    command: IracCommand,
) -> Result<bool, RpcError> {
    match transport.send_to_site(site, command).await? {
        CommandResponse::StillNeeded(needed) => Ok(needed),
        other => Err(RpcError::UnexpectedResponse(format!("{other:?}"))),
    }
}
