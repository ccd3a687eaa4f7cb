//! HTTP agent gateway
//!
//! Agents expose `POST /v1/agent/slot` to install (optionally into the slot
//! named by the `slot` query parameter) and `DELETE /v1/agent/slot/<id>` to
//! terminate. Both answer with the slot's status as JSON.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use tracing::{debug, warn};
use url::Url;

use super::{AgentGateway, GatewayError};
use crate::domain::{AgentStatus, Installation, SlotId, SlotStatus};

pub struct HttpAgentGateway {
    http: Client,
    timeout: Duration,
}

impl HttpAgentGateway {
    pub fn new(timeout: Duration) -> Result<Self, GatewayError> {
        debug!(?timeout, "HttpAgentGateway::new: called");
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Unreachable(e.to_string()))?;
        Ok(Self::with_client(http, timeout))
    }

    /// Use a preconfigured HTTP client; `timeout` is only reported in errors
    pub fn with_client(http: Client, timeout: Duration) -> Self {
        Self { http, timeout }
    }

    /// `<agent>/v1/agent/slot[/<segment>]`
    fn slot_url(agent: &AgentStatus, slot_id: Option<&SlotId>) -> Result<Url, GatewayError> {
        let mut url = agent.location.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| GatewayError::Unreachable(format!("bad agent location {}", agent.location)))?;
            segments.pop_if_empty().extend(["v1", "agent", "slot"]);
            if let Some(slot_id) = slot_id {
                segments.push(slot_id.as_str());
            }
        }
        Ok(url)
    }

    fn map_send_error(&self, err: reqwest::Error) -> GatewayError {
        if err.is_timeout() {
            GatewayError::Timeout(self.timeout)
        } else {
            GatewayError::Unreachable(err.to_string())
        }
    }

    async fn read_slot(&self, response: Response) -> Result<SlotStatus, GatewayError> {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), %message, "Agent rejected request");
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await.map_err(|e| self.map_send_error(e))?;
        serde_json::from_str(&body).map_err(|e| GatewayError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl AgentGateway for HttpAgentGateway {
    async fn install(
        &self,
        agent: &AgentStatus,
        slot_hint: Option<&SlotId>,
        installation: &Installation,
    ) -> Result<SlotStatus, GatewayError> {
        debug!(agent_id = %agent.agent_id, ?slot_hint, "HttpAgentGateway::install: called");
        let mut url = Self::slot_url(agent, None)?;
        if let Some(hint) = slot_hint {
            url.query_pairs_mut().append_pair("slot", hint.as_str());
        }

        let response = self
            .http
            .post(url)
            .json(installation)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        self.read_slot(response).await
    }

    async fn terminate(&self, agent: &AgentStatus, slot_id: &SlotId) -> Result<SlotStatus, GatewayError> {
        debug!(agent_id = %agent.agent_id, %slot_id, "HttpAgentGateway::terminate: called");
        let url = Self::slot_url(agent, Some(slot_id))?;

        let response = self
            .http
            .delete(url)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        self.read_slot(response).await
    }
}
