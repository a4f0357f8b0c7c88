//! Server control trait

use async_trait::async_trait;

use crate::error::ApiError;
use crate::types::{ManagedServer, ServerId, ServerStats};

/// Remote view of the managed fleet
///
/// Implemented by the panel HTTP client. Start and stop are
/// fire-and-acknowledge: `Ok` means the command was accepted, the effect is
/// observed on a later poll.
#[async_trait]
pub trait ServerControl: Send + Sync {
    /// All servers managed by the panel
    async fn list_servers(&self) -> Result<Vec<ManagedServer>, ApiError>;

    /// Live stats for one server
    async fn fetch_stats(&self, server_id: &ServerId) -> Result<ServerStats, ApiError>;

    /// Ask the panel to start a server
    async fn start_server(&self, server_id: &ServerId) -> Result<(), ApiError>;

    /// Ask the panel to stop a server
    async fn stop_server(&self, server_id: &ServerId) -> Result<(), ApiError>;
}
