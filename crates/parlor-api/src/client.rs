//! The room service REST client.

use parlor_protocol::{RoomId, RoomSnapshot};
use parlor_session::{RoomDirectory, SessionError};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::ApiError;

/// Successful responses wrap their payload in a `data` envelope:
/// `{ "data": { ... } }`.
#[derive(Debug, Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

/// Error responses carry a `message` field when the server has one.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// Client for the room service's REST endpoints.
///
/// The WebSocket handshakes own room membership; this client covers
/// everything else — canonical room lookups, leaving, and the matchmaking
/// queue. The auth token rides as a bearer header on every request.
#[derive(Debug, Clone)]
pub struct RoomApiClient {
    http: reqwest::Client,
    base: String,
    token: String,
}

impl RoomApiClient {
    /// Creates a client for the API at `base_url` (such as
    /// `http://localhost:8080`).
    pub fn new(base_url: &str, token: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    /// Fetches the canonical state of a room.
    pub async fn get_room(
        &self,
        room_id: &RoomId,
    ) -> Result<RoomSnapshot, ApiError> {
        self.get(&format!("/room/{room_id}")).await
    }

    /// Creates a room over REST. The WebSocket create handshake is the
    /// primary path; this endpoint serves clients without a live
    /// connection yet.
    pub async fn create_room(&self) -> Result<RoomSnapshot, ApiError> {
        self.post("/room").await
    }

    /// Joins a room over REST, returning its state. Like
    /// [`create_room`](Self::create_room), the WebSocket handshake is the
    /// primary path.
    pub async fn join_room(
        &self,
        room_id: &RoomId,
    ) -> Result<RoomSnapshot, ApiError> {
        self.post(&format!("/room/{room_id}/join")).await
    }

    /// Tells the server this player is leaving the room.
    pub async fn leave_room(
        &self,
        room_id: &RoomId,
    ) -> Result<(), ApiError> {
        self.post_unit(&format!("/room/leave/{room_id}")).await
    }

    /// Enters the matchmaking queue.
    pub async fn join_queue(&self) -> Result<(), ApiError> {
        self.post_unit("/room/queue").await
    }

    /// Leaves the matchmaking queue.
    pub async fn leave_queue(&self) -> Result<(), ApiError> {
        self.post_unit("/room/leaveQueue").await
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<T, ApiError> {
        let response = self
            .http
            .get(format!("{}{path}", self.base))
            .bearer_auth(&self.token)
            .send()
            .await?;
        Self::unwrap_data(response).await
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<T, ApiError> {
        let response = self
            .http
            .post(format!("{}{path}", self.base))
            .bearer_auth(&self.token)
            .send()
            .await?;
        Self::unwrap_data(response).await
    }

    async fn post_unit(&self, path: &str) -> Result<(), ApiError> {
        let response = self
            .http
            .post(format!("{}{path}", self.base))
            .bearer_auth(&self.token)
            .send()
            .await?;
        Self::check_status(response).await?;
        Ok(())
    }

    /// Rejects non-success statuses, extracting the server's message
    /// when the error body carries one.
    async fn check_status(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(|body| body.message)
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("unknown error")
                    .to_string()
            });
        tracing::debug!(status = status.as_u16(), %message, "API error");
        Err(ApiError::Status {
            status: status.as_u16(),
            message,
        })
    }

    async fn unwrap_data<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let response = Self::check_status(response).await?;
        let envelope: DataEnvelope<T> = response
            .json()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))?;
        Ok(envelope.data)
    }
}

impl RoomDirectory for RoomApiClient {
    async fn fetch_room(
        &self,
        room_id: &RoomId,
    ) -> Result<RoomSnapshot, SessionError> {
        self.get_room(room_id).await.map_err(SessionError::from)
    }
}
