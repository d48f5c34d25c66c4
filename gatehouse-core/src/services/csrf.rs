//! Per-session anti-forgery tokens.
//!
//! One secret per session, minted on first use and kept until the session is
//! replaced. Every state-changing request must echo it back.

use crate::{
    crypto::{constant_time_compare, generate_secure_token},
    session::{CsrfToken, Session},
};

#[derive(Debug, Default, Clone, Copy)]
pub struct CsrfService;

impl CsrfService {
    pub fn new() -> Self {
        Self
    }

    /// Return the session's secret, minting one if it has none yet.
    ///
    /// The caller must persist the session afterwards.
    pub fn issue(&self, session: &mut Session) -> CsrfToken {
        session
            .csrf_secret
            .get_or_insert_with(CsrfToken::new_random)
            .clone()
    }

    /// Check a submitted token against the session's secret.
    ///
    /// Returns false when the session has no secret or the candidate is
    /// missing or different. A session without a secret is compared against
    /// a throwaway value so both failures take the same path.
    pub fn verify(&self, session: &Session, candidate: Option<&str>) -> bool {
        let Some(candidate) = candidate else {
            return false;
        };

        match &session.csrf_secret {
            Some(secret) => constant_time_compare(secret.as_str().as_bytes(), candidate.as_bytes()),
            None => {
                let throwaway = generate_secure_token();
                let _ = constant_time_compare(throwaway.as_bytes(), candidate.as_bytes());
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_issue_then_verify() {
        let csrf = CsrfService::new();
        let mut session = Session::new_anonymous(Utc::now());

        let token = csrf.issue(&mut session);
        assert!(csrf.verify(&session, Some(token.as_str())));
    }

    #[test]
    fn test_issue_is_idempotent() {
        let csrf = CsrfService::new();
        let mut session = Session::new_anonymous(Utc::now());

        let first = csrf.issue(&mut session);
        let second = csrf.issue(&mut session);
        assert_eq!(first, second);
    }

    #[test]
    fn test_any_single_character_change_fails() {
        let csrf = CsrfService::new();
        let mut session = Session::new_anonymous(Utc::now());
        let token = csrf.issue(&mut session).as_str().to_string();

        for (i, c) in token.char_indices() {
            let replacement = if c == 'A' { 'B' } else { 'A' };
            let mut tampered = token.clone();
            tampered.replace_range(i..i + c.len_utf8(), &replacement.to_string());
            assert!(!csrf.verify(&session, Some(&tampered)), "position {i}");
        }
    }

    #[test]
    fn test_fails_closed() {
        let csrf = CsrfService::new();
        let mut session = Session::new_anonymous(Utc::now());

        assert!(!csrf.verify(&session, Some("anything")));
        assert!(!csrf.verify(&session, Some("")));
        assert!(!csrf.verify(&session, None));

        csrf.issue(&mut session);
        assert!(!csrf.verify(&session, None));
        assert!(!csrf.verify(&session, Some("")));
    }

    #[test]
    fn test_token_from_other_session_is_rejected() {
        let csrf = CsrfService::new();
        let mut mine = Session::new_anonymous(Utc::now());
        let mut theirs = Session::new_anonymous(Utc::now());

        csrf.issue(&mut mine);
        let their_token = csrf.issue(&mut theirs);
        assert!(!csrf.verify(&mine, Some(their_token.as_str())));
    }
}
