//! Server endpoints

use crate::error::Result;
use crate::gateway::{ApiResult, Gateway};
use crate::request::ParamValue;
use serde::Serialize;

/// Path of the server status endpoint
pub const SERVER_STATUS_PATH: &str = "server/ServerStatus";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ServerStatus {
    pub online: bool,
    pub players: i64,
}

/// Wrapper around the `server/*` endpoints
pub struct Server<'a> {
    gateway: &'a Gateway,
}

impl<'a> Server<'a> {
    pub fn new(gateway: &'a Gateway) -> Self {
        Self { gateway }
    }

    /// Whether the server is up and how many players are online
    pub async fn server_status(&self) -> Result<ApiResult<ServerStatus>> {
        let response = self
            .gateway
            .fetch(SERVER_STATUS_PATH, Vec::<(String, ParamValue)>::new())
            .await?;

        let online = response.result.get_bool("serverOpen").unwrap_or(false);
        let players = response.result.get_int("onlinePlayers")?.unwrap_or(0);

        Ok(response.map(|_| ServerStatus { online, players }))
    }
}
