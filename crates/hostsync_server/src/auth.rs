//! Credential management: accounts, sessions and private data.
//!
//! Each identity has at most one live session. A token is valid while it
//! matches the stored token and the account has been used within its idle
//! timeout. Every successful authentication moves `last_activity` strictly
//! forward.

use crate::error::{GroupError, GroupResult};
use crate::server::{Credentials, GroupServer};
use hostsync_protocol::Interrupt;
use hostsync_store::{Account, Store, Timestamp};
use rand::RngCore;
use std::fmt::Write;
use tracing::{info, warn};

const MILLIS_PER_MINUTE: u64 = 60_000;

/// Generates a random hex-encoded session token of `bytes` random bytes.
pub fn generate_token(bytes: usize) -> String {
    let mut raw = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut raw);
    raw.iter().fold(String::with_capacity(bytes * 2), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}

/// Returns true if an account idle since `last_activity` has expired at `now`.
pub fn is_expired(account: &Account, now: Timestamp) -> bool {
    let timeout = u64::from(account.timeout_minutes) * MILLIS_PER_MINUTE;
    account.last_activity.saturating_add(timeout) <= now
}

fn next_activity(previous: Timestamp, now: Timestamp) -> Timestamp {
    now.max(previous.saturating_add(1))
}

pub(crate) fn require_non_empty(what: &str, value: &str) -> GroupResult<()> {
    if value.is_empty() {
        return Err(GroupError::invalid(format!("{what} must not be empty")));
    }
    Ok(())
}

impl<S: Store> GroupServer<S> {
    /// Creates an account and logs it in.
    ///
    /// Fails with [`GroupError::Duplicate`] if the identity is taken.
    pub fn register(
        &self,
        identity: &str,
        credential: &str,
        timeout_minutes: u32,
    ) -> GroupResult<String> {
        require_non_empty("identity", identity)?;
        require_non_empty("credential", credential)?;
        let (min, max) = (
            self.config.min_timeout_minutes,
            self.config.max_timeout_minutes,
        );
        if !(min..=max).contains(&timeout_minutes) {
            return Err(GroupError::invalid(format!(
                "timeout must be between {min} and {max} minutes"
            )));
        }

        let session = generate_token(self.config.token_bytes);
        self.store.insert_account(&Account {
            identity: identity.to_string(),
            credential: credential.to_string(),
            timeout_minutes,
            session: session.clone(),
            last_activity: self.now(),
        })?;

        info!(identity, timeout_minutes, "account registered");
        Ok(session)
    }

    /// Opens a new session, invalidating the previous one.
    pub fn login(&self, identity: &str, credential: &str) -> GroupResult<String> {
        require_non_empty("identity", identity)?;
        require_non_empty("credential", credential)?;

        let account = match self.store.account(identity)? {
            Some(account) if account.credential == credential => account,
            _ => {
                warn!(identity, "login rejected");
                return Err(GroupError::WrongCredential(identity.to_string()));
            }
        };

        let session = generate_token(self.config.token_bytes);
        let last_activity = next_activity(account.last_activity, self.now());
        self.store.set_session(identity, &session, last_activity)?;
        info!(identity, "logged in");
        Ok(session)
    }

    /// Validates a session and refreshes its activity time.
    ///
    /// Returns the account as it was before the refresh.
    pub fn authenticate(&self, creds: &Credentials) -> GroupResult<Account> {
        require_non_empty("identity", &creds.identity)?;
        require_non_empty("session", &creds.session)?;

        let account = match self.store.account(&creds.identity)? {
            Some(account) if !account.session.is_empty() && account.session == creds.session => {
                account
            }
            _ => {
                warn!(identity = %creds.identity, "invalid session");
                return Err(GroupError::InvalidSession(creds.identity.clone()));
            }
        };

        let now = self.now();
        if is_expired(&account, now) {
            warn!(identity = %creds.identity, "session expired");
            return Err(GroupError::ExpiredSession(creds.identity.clone()));
        }

        self.store
            .touch_account(&creds.identity, next_activity(account.last_activity, now))?;
        Ok(account)
    }

    /// Invalidates the current session.
    pub fn logout(&self, creds: &Credentials) -> GroupResult<()> {
        let account = self.authenticate(creds)?;
        let last_activity = next_activity(account.last_activity, self.now());
        self.store.set_session(&creds.identity, "", last_activity)?;
        info!(identity = %creds.identity, "logged out");
        Ok(())
    }

    /// Keeps the session alive.
    pub fn ping(&self, creds: &Credentials) -> GroupResult<()> {
        self.authenticate(creds).map(|_| ())
    }

    /// Deletes the caller's account.
    ///
    /// Groups hosted by the caller are closed; outstanding hooks in groups
    /// the caller merely joined are completed as removed.
    pub fn unregister(&self, creds: &Credentials) -> GroupResult<()> {
        self.authenticate(creds)?;
        let identity = creds.identity.as_str();

        let hosted = self.store.groups_hosted_by(identity)?;
        let joined = self.store.groups_joined_by(identity)?;
        self.store.delete_account(identity)?;

        for group in &hosted {
            self.hooks.close_group(&group.group_id);
        }
        for group_id in joined
            .iter()
            .filter(|g| !hosted.iter().any(|h| &h.group_id == *g))
        {
            self.hooks
                .interrupt_participant(group_id, identity, Interrupt::Removed);
        }

        info!(identity, closed = hosted.len(), "account unregistered");
        Ok(())
    }

    /// Stores account-private data under a key.
    pub fn set_private(&self, creds: &Credentials, key: &str, data: &str) -> GroupResult<()> {
        require_non_empty("key", key)?;
        self.check_payload(data)?;
        self.authenticate(creds)?;
        self.store.put_private(&creds.identity, key, data)?;
        Ok(())
    }

    /// Reads account-private data.
    pub fn get_private(&self, creds: &Credentials, key: &str) -> GroupResult<Option<String>> {
        require_non_empty("key", key)?;
        self.authenticate(creds)?;
        Ok(self.store.private(&creds.identity, key)?)
    }

    /// Deletes account-private data. Returns false if the key was not set.
    pub fn delete_private(&self, creds: &Credentials, key: &str) -> GroupResult<bool> {
        require_non_empty("key", key)?;
        self.authenticate(creds)?;
        Ok(self.store.delete_private(&creds.identity, key)?)
    }

    pub(crate) fn check_payload(&self, data: &str) -> GroupResult<()> {
        if data.len() > self.config.max_payload_bytes {
            return Err(GroupError::invalid(format!(
                "payload of {} bytes exceeds limit of {}",
                data.len(),
                self.config.max_payload_bytes
            )));
        }
        Ok(())
    }
}
