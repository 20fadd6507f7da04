//! The session-side auth machine. The executor only *observes* (it reports
//! what the page showed); committing a transition is the session's job, and
//! it happens here in one place.

use trolley_core_types::AuthState;

/// Folds one page observation into the current state. Observations are
/// committed verbatim with a single exception: a terminal state is sticky.
/// Once a session is rate limited no page evidence short of a new session
/// un-limits it, because retail walls lift on *their* clock, not on the next
/// hopeful login attempt.
pub fn advance(current: AuthState, observed: AuthState) -> AuthState {
    if current.is_terminal() {
        current
    } else {
        observed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_evidence_is_committed_verbatim() {
        assert_eq!(
            advance(AuthState::Anonymous, AuthState::AwaitingOtp),
            AuthState::AwaitingOtp
        );
        assert_eq!(
            advance(AuthState::AwaitingOtp, AuthState::Authenticated),
            AuthState::Authenticated
        );
    }

    #[test]
    fn a_wall_can_hit_any_state() {
        assert_eq!(
            advance(AuthState::Anonymous, AuthState::RateLimited),
            AuthState::RateLimited
        );
        assert_eq!(
            advance(AuthState::AwaitingOtp, AuthState::RateLimited),
            AuthState::RateLimited
        );
        assert_eq!(
            advance(AuthState::Authenticated, AuthState::RateLimited),
            AuthState::RateLimited
        );
    }

    #[test]
    fn rate_limited_is_sticky() {
        assert_eq!(
            advance(AuthState::RateLimited, AuthState::Authenticated),
            AuthState::RateLimited
        );
        assert_eq!(
            advance(AuthState::RateLimited, AuthState::Anonymous),
            AuthState::RateLimited
        );
    }

    #[test]
    fn a_signed_out_page_downgrades_an_authenticated_session() {
        assert_eq!(
            advance(AuthState::Authenticated, AuthState::Anonymous),
            AuthState::Anonymous
        );
    }
}
