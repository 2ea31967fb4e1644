//! The pending game-choice negotiation state.
//!
//! At most one game proposal is outstanding per session. A proposal is
//! installed when the opponent chooses a game (`game_chosen`) and cleared
//! by exactly one resolution: the local player answers it, the opponent's
//! answer arrives, or the game starts outright.

use parlor_protocol::PendingGameChoice;

/// Why a pending choice was cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChoiceResolution {
    /// The local player sent an accept.
    AcceptSent,
    /// The local player sent a reject.
    RejectSent,
    /// The opponent accepted our proposal.
    Accepted,
    /// The opponent rejected our proposal.
    Rejected,
    /// The game started, superseding any open proposal.
    Started,
    /// The session ended with the proposal still open.
    RoomLeft,
}

/// Holder for the single outstanding game proposal.
#[derive(Debug, Default)]
pub struct PendingChoice {
    current: Option<PendingGameChoice>,
}

impl PendingChoice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a new proposal. A newer proposal replaces an older
    /// unanswered one; the server only relays one at a time, so a
    /// replacement means the old one is already moot.
    pub fn propose(&mut self, choice: PendingGameChoice) {
        if let Some(old) = &self.current {
            tracing::debug!(
                previous = %old.game_type,
                incoming = %choice.game_type,
                "replacing unanswered game proposal"
            );
        }
        self.current = Some(choice);
    }

    /// Clears the outstanding proposal, returning it if one was present.
    /// Resolving an already-clear slot is a no-op; later resolutions for
    /// the same proposal fall through here harmlessly.
    pub fn resolve(
        &mut self,
        reason: ChoiceResolution,
    ) -> Option<PendingGameChoice> {
        let cleared = self.current.take();
        if let Some(choice) = &cleared {
            tracing::debug!(
                game_type = %choice.game_type,
                ?reason,
                "game proposal resolved"
            );
        }
        cleared
    }

    /// The outstanding proposal, if any.
    pub fn current(&self) -> Option<&PendingGameChoice> {
        self.current.as_ref()
    }

    pub fn is_pending(&self) -> bool {
        self.current.is_some()
    }
}
