//! One-time-code gate used before money moves
//!
//! `FixedDemoCode` is a stub: the code is static and shown to the user as a
//! hint. Production builds must plug a real dispatch/verify service in
//! behind [`OtpCodeSource`]; the server refuses to configure the demo code
//! in production.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::state::ClientConfig;

pub const DEMO_OTP_CODE: &str = "1122";
pub const OTP_LENGTH: usize = 4;
pub const MAX_ATTEMPTS: u32 = 3;
pub const LOCKOUT_COOLDOWN: Duration = Duration::from_secs(3);

/// Decides whether an entered code is correct
pub trait OtpCodeSource: Send + Sync {
    fn matches(&self, code: &str) -> bool;

    /// Code the UI may display; only demo sources return one
    fn demo_hint(&self) -> Option<&str> {
        None
    }
}

/// Hard-coded code for demo builds
#[derive(Debug, Clone)]
pub struct FixedDemoCode {
    code: String,
}

impl FixedDemoCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self { code: code.into() }
    }

    /// Demo code the server advertises in `/api/config`; `None` when it
    /// publishes none, as in production
    pub fn from_client_config(config: &ClientConfig) -> Option<Self> {
        config.demo_otp_code.as_deref().map(Self::new)
    }
}

impl Default for FixedDemoCode {
    fn default() -> Self {
        Self::new(DEMO_OTP_CODE)
    }
}

impl OtpCodeSource for FixedDemoCode {
    fn matches(&self, code: &str) -> bool {
        self.code == code
    }

    fn demo_hint(&self) -> Option<&str> {
        Some(&self.code)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpState {
    Idle,
    /// Code matched; waiting for the caller to accept or reject it
    Checking,
    Verified,
    Locked { until: Instant },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpOutcome {
    /// Fewer than four digits entered
    Incomplete,
    /// Code matched; call `confirm` or `reject`
    Matched,
    Verified,
    /// The caller refused a matching code
    CallerRejected,
    Rejected { remaining: u32 },
    LockedOut { until: Instant },
    /// Input ignored while locked
    Locked,
    AlreadyVerified,
}

pub struct OtpVerifier {
    source: Arc<dyn OtpCodeSource>,
    input: String,
    attempts: u32,
    state: OtpState,
    message: Option<String>,
}

impl OtpVerifier {
    pub fn new(source: Arc<dyn OtpCodeSource>) -> Self {
        Self {
            source,
            input: String::new(),
            attempts: 0,
            state: OtpState::Idle,
            message: None,
        }
    }

    /// Replace the typed value; four digits trigger verification
    pub fn input(&mut self, text: &str, now: Instant) -> OtpOutcome {
        if let Some(outcome) = self.blocked(now) {
            return outcome;
        }
        self.input = text
            .chars()
            .filter(|c| c.is_ascii_digit())
            .take(OTP_LENGTH)
            .collect();
        self.message = None;

        if self.input.len() == OTP_LENGTH {
            self.check(now)
        } else {
            OtpOutcome::Incomplete
        }
    }

    /// Enter key: verify right away if four digits are present
    pub fn submit(&mut self, now: Instant) -> OtpOutcome {
        if let Some(outcome) = self.blocked(now) {
            return outcome;
        }
        if self.input.len() < OTP_LENGTH {
            self.message = Some(format!("Enter the {}-digit code", OTP_LENGTH));
            return OtpOutcome::Incomplete;
        }
        self.check(now)
    }

    /// `input` followed by a synchronous accept/reject decision
    pub fn enter(
        &mut self,
        text: &str,
        now: Instant,
        on_verify: impl FnOnce(&str) -> bool,
    ) -> OtpOutcome {
        match self.input(text, now) {
            OtpOutcome::Matched => {
                let code = self.input.clone();
                if on_verify(&code) {
                    self.confirm()
                } else {
                    self.reject("Verification failed, please try again");
                    OtpOutcome::CallerRejected
                }
            }
            other => other,
        }
    }

    /// Accept a matched code. Only the first confirm of a challenge verifies.
    pub fn confirm(&mut self) -> OtpOutcome {
        match self.state {
            OtpState::Checking => {
                self.state = OtpState::Verified;
                self.message = None;
                OtpOutcome::Verified
            }
            OtpState::Verified => OtpOutcome::AlreadyVerified,
            _ => OtpOutcome::Incomplete,
        }
    }

    /// Refuse a matched code (e.g. the follow-up request failed)
    pub fn reject(&mut self, message: impl Into<String>) {
        if self.state == OtpState::Checking {
            self.state = OtpState::Idle;
            self.input.clear();
            self.message = Some(message.into());
        }
    }

    /// Start over with a fresh challenge; nothing is sent anywhere
    pub fn resend(&mut self) {
        self.input.clear();
        self.attempts = 0;
        self.state = OtpState::Idle;
        self.message = None;
    }

    /// Lift an elapsed lockout
    pub fn poll(&mut self, now: Instant) -> OtpState {
        if let OtpState::Locked { until } = self.state {
            if now >= until {
                self.attempts = 0;
                self.input.clear();
                self.state = OtpState::Idle;
                self.message = None;
            }
        }
        self.state
    }

    pub fn state(&self) -> OtpState {
        self.state
    }

    pub fn is_verified(&self) -> bool {
        self.state == OtpState::Verified
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn remaining_attempts(&self) -> u32 {
        MAX_ATTEMPTS.saturating_sub(self.attempts)
    }

    pub fn value(&self) -> &str {
        &self.input
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn hint(&self) -> Option<&str> {
        self.source.demo_hint()
    }

    fn blocked(&mut self, now: Instant) -> Option<OtpOutcome> {
        match self.poll(now) {
            OtpState::Locked { .. } => Some(OtpOutcome::Locked),
            OtpState::Verified => Some(OtpOutcome::AlreadyVerified),
            // A matched code is awaiting the caller's decision
            OtpState::Checking => Some(OtpOutcome::Matched),
            OtpState::Idle => None,
        }
    }

    fn check(&mut self, now: Instant) -> OtpOutcome {
        self.state = OtpState::Checking;

        if self.source.matches(&self.input) {
            return OtpOutcome::Matched;
        }

        self.attempts += 1;
        self.input.clear();

        if self.attempts >= MAX_ATTEMPTS {
            let until = now + LOCKOUT_COOLDOWN;
            self.state = OtpState::Locked { until };
            self.message = Some(format!(
                "Too many failed attempts. Try again in {} seconds",
                LOCKOUT_COOLDOWN.as_secs()
            ));
            tracing::warn!(attempts = self.attempts, "OTP locked after failed attempts");
            return OtpOutcome::LockedOut { until };
        }

        let remaining = self.remaining_attempts();
        self.state = OtpState::Idle;
        self.message = Some(format!(
            "Invalid code. {} attempt{} remaining",
            remaining,
            if remaining == 1 { "" } else { "s" }
        ));
        OtpOutcome::Rejected { remaining }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verifier() -> OtpVerifier {
        OtpVerifier::new(Arc::new(FixedDemoCode::default()))
    }

    #[test]
    fn test_correct_code_verifies_once() {
        let mut otp = verifier();
        let now = Instant::now();
        let mut calls = 0;

        let outcome = otp.enter("1122", now, |code| {
            calls += 1;
            code == "1122"
        });
        assert_eq!(outcome, OtpOutcome::Verified);
        assert!(otp.is_verified());

        assert_eq!(otp.input("1122", now), OtpOutcome::AlreadyVerified);
        assert_eq!(otp.confirm(), OtpOutcome::AlreadyVerified);
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_partial_input_waits() {
        let mut otp = verifier();
        let now = Instant::now();
        assert_eq!(otp.input("11", now), OtpOutcome::Incomplete);
        assert_eq!(otp.submit(now), OtpOutcome::Incomplete);
        assert_eq!(otp.message(), Some("Enter the 4-digit code"));
        assert_eq!(otp.attempts(), 0);
    }

    #[test]
    fn test_non_digits_are_dropped() {
        let mut otp = verifier();
        let now = Instant::now();
        assert_eq!(otp.input("1a1b2", now), OtpOutcome::Incomplete);
        assert_eq!(otp.value(), "112");
        assert_eq!(otp.input("1122999", now), OtpOutcome::Matched);
        assert_eq!(otp.state(), OtpState::Checking);
    }

    #[test]
    fn test_wrong_code_counts_exactly_one_attempt() {
        let mut otp = verifier();
        let now = Instant::now();

        assert_eq!(
            otp.input("0000", now),
            OtpOutcome::Rejected { remaining: 2 }
        );
        assert_eq!(otp.attempts(), 1);
        assert_eq!(otp.message(), Some("Invalid code. 2 attempts remaining"));
        assert_eq!(otp.value(), "");
        assert!(!otp.is_verified());

        assert_eq!(
            otp.input("9999", now),
            OtpOutcome::Rejected { remaining: 1 }
        );
        assert_eq!(otp.message(), Some("Invalid code. 1 attempt remaining"));
    }

    #[test]
    fn test_lockout_and_cooldown() {
        let mut otp = verifier();
        let start = Instant::now();

        otp.input("0000", start);
        otp.input("0001", start);
        let outcome = otp.input("0002", start);
        assert_eq!(
            outcome,
            OtpOutcome::LockedOut {
                until: start + LOCKOUT_COOLDOWN
            }
        );

        // Even the right code is ignored while locked
        let during = start + Duration::from_secs(2);
        assert_eq!(otp.input("1122", during), OtpOutcome::Locked);
        assert_eq!(otp.submit(during), OtpOutcome::Locked);
        assert!(matches!(otp.poll(during), OtpState::Locked { .. }));

        let after = start + LOCKOUT_COOLDOWN;
        assert_eq!(otp.poll(after), OtpState::Idle);
        assert_eq!(otp.attempts(), 0);
        assert_eq!(otp.value(), "");
        assert_eq!(otp.input("1122", after), OtpOutcome::Matched);
    }

    #[test]
    fn test_caller_rejection_reverts_to_idle() {
        let mut otp = verifier();
        let now = Instant::now();

        let outcome = otp.enter("1122", now, |_| false);
        assert_eq!(outcome, OtpOutcome::CallerRejected);
        assert_eq!(otp.state(), OtpState::Idle);
        assert_eq!(otp.message(), Some("Verification failed, please try again"));
        assert_eq!(otp.attempts(), 0);

        assert_eq!(otp.enter("1122", now, |_| true), OtpOutcome::Verified);
    }

    #[test]
    fn test_resend_resets_everything() {
        let mut otp = verifier();
        let now = Instant::now();
        otp.input("0000", now);
        otp.input("0000", now);
        otp.input("0000", now);
        assert!(matches!(otp.state(), OtpState::Locked { .. }));

        otp.resend();
        assert_eq!(otp.state(), OtpState::Idle);
        assert_eq!(otp.attempts(), 0);
        assert_eq!(otp.message(), None);
        assert_eq!(otp.input("1122", now), OtpOutcome::Matched);
    }

    #[test]
    fn test_hint_only_for_demo_source() {
        struct Remote;
        impl OtpCodeSource for Remote {
            fn matches(&self, _code: &str) -> bool {
                false
            }
        }

        assert_eq!(verifier().hint(), Some(DEMO_OTP_CODE));
        assert_eq!(OtpVerifier::new(Arc::new(Remote)).hint(), None);
    }

    #[test]
    fn test_code_source_follows_served_config() {
        let mut config = crate::config::Config::for_testing();
        config.demo_otp_code = Some("9876".to_string());
        let client = ClientConfig::from_config(&config);

        let source = FixedDemoCode::from_client_config(&client).unwrap();
        assert!(source.matches("9876"));
        assert!(!source.matches(DEMO_OTP_CODE));
        assert_eq!(source.demo_hint(), Some("9876"));

        config.demo_otp_code = None;
        assert!(FixedDemoCode::from_client_config(&ClientConfig::from_config(&config)).is_none());
    }
}
