use parlor_api::ApiError;
use parlor_session::SessionError;

/// Top-level error type for [`RoomClient`](crate::RoomClient) operations.
#[derive(Debug, thiserror::Error)]
pub enum ParlorError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Api(#[from] ApiError),

    /// The operation needs an active room and none is cached.
    #[error("no active room")]
    NoActiveRoom,

    /// Accept/reject was called with no game proposal outstanding.
    #[error("no pending game choice")]
    NoPendingChoice,
}
