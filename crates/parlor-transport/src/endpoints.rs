//! Room endpoint URL construction.

/// Builds the WebSocket URLs for the room endpoints from the API base URL.
///
/// The socket endpoints live on the same host as the REST API, so the base
/// is given as an `http(s)` URL and rewritten to `ws(s)`. The auth token
/// rides as a query parameter — the server validates it during the
/// upgrade, before any room logic runs.
#[derive(Debug, Clone)]
pub struct Endpoints {
    base: String,
}

impl Endpoints {
    /// Creates an endpoint builder from an API base URL such as
    /// `http://localhost:8080`.
    pub fn new(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        let base = if let Some(rest) = base.strip_prefix("https") {
            format!("wss{rest}")
        } else if let Some(rest) = base.strip_prefix("http") {
            format!("ws{rest}")
        } else {
            base.to_string()
        };
        Self { base }
    }

    /// URL for the room-creation handshake. No room id yet — the server
    /// assigns one and announces it in the `room_created` confirmation.
    pub fn create_url(&self, token: &str) -> String {
        format!("{}/room/join?token={token}", self.base)
    }

    /// URL for joining an existing room.
    pub fn join_url(&self, room_id: &str, token: &str) -> String {
        format!("{}/room/{room_id}/join?token={token}", self.base)
    }
}
