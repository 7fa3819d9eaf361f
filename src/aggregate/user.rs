//! User Aggregate
//!
//! User aggregate for auth/account lifecycle: registration, email
//! verification, login-failure lockout, and password reset. Passwords,
//! reset tokens and verification tokens never appear in events or state
//! derived from events other than the password hash itself.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::UserEvent;

use super::Aggregate;

/// Consecutive login failures that trigger an account lock.
pub const LOCKOUT_THRESHOLD: u32 = 5;
/// How long an account stays locked after the lockout threshold is hit.
pub const LOCKOUT_DURATION_MINUTES: i64 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Customer,
    Admin,
}

impl Default for UserRole {
    fn default() -> Self {
        Self::Customer
    }
}

/// User Aggregate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    id: Uuid,
    email: String,
    name: String,
    password_hash: String,
    role: UserRole,
    email_verified: bool,
    failed_login_attempts: u32,
    locked_until: Option<DateTime<Utc>>,
    version: i64,
    created_at: Option<DateTime<Utc>>,
}

impl Default for User {
    fn default() -> Self {
        Self {
            id: Uuid::nil(),
            email: String::new(),
            name: String::new(),
            password_hash: String::new(),
            role: UserRole::Customer,
            email_verified: false,
            failed_login_attempts: 0,
            locked_until: None,
            version: 0,
            created_at: None,
        }
    }
}

impl User {
    pub fn register(
        user_id: Uuid,
        email: String,
        name: String,
        password_hash: String,
    ) -> (Self, UserEvent) {
        let now = Utc::now();

        let event = UserEvent::UserRegistered {
            user_id,
            email: email.clone(),
            name: name.clone(),
            password_hash: password_hash.clone(),
            registered_at: now,
        };

        let user = Self {
            id: user_id,
            email,
            name,
            password_hash,
            role: UserRole::Customer,
            email_verified: false,
            failed_login_attempts: 0,
            locked_until: None,
            version: 1,
            created_at: Some(now),
        };

        (user, event)
    }

    pub fn verify_email(&self) -> UserEvent {
        UserEvent::EmailVerified {
            user_id: self.id,
            verified_at: Utc::now(),
        }
    }

    pub fn request_password_reset(&self) -> UserEvent {
        UserEvent::PasswordResetRequested {
            user_id: self.id,
            requested_at: Utc::now(),
        }
    }

    pub fn reset_password(&self, new_password_hash: String) -> UserEvent {
        UserEvent::PasswordReset {
            user_id: self.id,
            new_password_hash,
            reset_at: Utc::now(),
        }
    }

    /// Evaluate whether the account is currently locked.
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.map(|until| now < until).unwrap_or(false)
    }

    /// Events produced by a failed login attempt: always `LoginFailed`, plus
    /// `AccountLocked` when this failure is the 5th consecutive one.
    pub fn record_login_failure(&self) -> Vec<UserEvent> {
        let now = Utc::now();
        let mut events = vec![UserEvent::LoginFailed {
            user_id: self.id,
            failed_at: now,
        }];

        if self.failed_login_attempts + 1 >= LOCKOUT_THRESHOLD {
            events.push(UserEvent::AccountLocked {
                user_id: self.id,
                locked_until: now + Duration::minutes(LOCKOUT_DURATION_MINUTES),
                locked_at: now,
            });
        }

        events
    }

    /// Event produced by a successful login, if the failure counter needed resetting.
    pub fn record_login_success(&self) -> Option<UserEvent> {
        if self.failed_login_attempts == 0 && self.locked_until.is_none() {
            return None;
        }
        Some(UserEvent::AccountUnlocked {
            user_id: self.id,
            unlocked_at: Utc::now(),
        })
    }

    pub fn password_hash(&self) -> &str {
        &self.password_hash
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> UserRole {
        self.role
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    pub fn email_verified(&self) -> bool {
        self.email_verified
    }

    pub fn failed_login_attempts(&self) -> u32 {
        self.failed_login_attempts
    }

    pub fn locked_until(&self) -> Option<DateTime<Utc>> {
        self.locked_until
    }
}

impl Aggregate for User {
    type Event = UserEvent;

    fn aggregate_type() -> &'static str {
        "User"
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn apply(mut self, event: Self::Event) -> Self {
        match event {
            UserEvent::UserRegistered {
                user_id,
                email,
                name,
                password_hash,
                registered_at,
            } => {
                self.id = user_id;
                self.email = email;
                self.name = name;
                self.password_hash = password_hash;
                self.role = UserRole::Customer;
                self.email_verified = false;
                self.failed_login_attempts = 0;
                self.locked_until = None;
                self.created_at = Some(registered_at);
            }

            UserEvent::EmailVerified { .. } => {
                self.email_verified = true;
            }

            UserEvent::PasswordResetRequested { .. } => {}

            UserEvent::PasswordReset {
                new_password_hash, ..
            } => {
                self.password_hash = new_password_hash;
            }

            UserEvent::LoginFailed { .. } => {
                self.failed_login_attempts += 1;
            }

            UserEvent::AccountLocked { locked_until, .. } => {
                self.locked_until = Some(locked_until);
            }

            UserEvent::AccountUnlocked { .. } => {
                self.failed_login_attempts = 0;
                self.locked_until = None;
            }
        }

        self.version += 1;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register() -> User {
        let (user, _) = User::register(
            Uuid::new_v4(),
            "alice@example.com".to_string(),
            "Alice".to_string(),
            "hashed".to_string(),
        );
        user
    }

    #[test]
    fn test_user_register() {
        let user = register();
        assert_eq!(user.email(), "alice@example.com");
        assert!(!user.email_verified());
        assert_eq!(user.role(), UserRole::Customer);
        assert_eq!(user.version(), 1);
    }

    #[test]
    fn test_verify_email() {
        let user = register();
        let event = user.verify_email();
        let user = user.apply(event);
        assert!(user.email_verified());
    }

    #[test]
    fn test_fifth_consecutive_failure_locks_account() {
        let mut user = register();
        for _ in 0..4 {
            for event in user.record_login_failure() {
                user = user.apply(event);
            }
        }
        assert_eq!(user.failed_login_attempts(), 4);
        assert!(user.locked_until().is_none());

        let events = user.record_login_failure();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], UserEvent::LoginFailed { .. }));
        assert!(matches!(events[1], UserEvent::AccountLocked { .. }));

        for event in events {
            user = user.apply(event);
        }
        assert_eq!(user.failed_login_attempts(), 5);
        assert!(user.locked_until().is_some());
        assert!(user.is_locked(Utc::now()));
    }

    #[test]
    fn test_successful_login_resets_counter_and_unlocks() {
        let mut user = register();
        for event in user.record_login_failure() {
            user = user.apply(event);
        }
        assert_eq!(user.failed_login_attempts(), 1);

        let event = user.record_login_success().unwrap();
        user = user.apply(event);
        assert_eq!(user.failed_login_attempts(), 0);
        assert!(user.locked_until().is_none());
    }

    #[test]
    fn test_successful_login_with_no_prior_failures_is_noop() {
        let user = register();
        assert!(user.record_login_success().is_none());
    }

    #[test]
    fn test_password_reset_changes_hash() {
        let user = register();
        let event = user.reset_password("new-hash".to_string());
        let user = user.apply(event);
        assert_eq!(user.password_hash(), "new-hash");
    }
}
