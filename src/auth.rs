//! # AuthService collaborator
//!
//! Spec.md §2 lists the authentication service as an out-of-scope
//! collaborator specified only by the contract `Bootstrap` consumes. This
//! module implements that narrow contract — `AuthStore` plus an in-memory
//! implementation — so `Bootstrap` and its tests are self-contained. No
//! HTTP surface, no token issuance policy, no session/credential lifecycle:
//! that is the real out-of-scope service (spec.md §4.7, SPEC_FULL.md §4.7).

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

/// A team-scoped service account credential hydrated at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamServiceAccount {
    pub team_id: String,
    pub token: String,
}

/// A personal API key hydrated at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonalApiKey {
    pub user_id: String,
    pub key: String,
}

/// The narrow interface `Bootstrap` needs from the authentication service.
#[async_trait]
pub trait AuthStore: Send + Sync {
    async fn put_team_service_account(&self, account: TeamServiceAccount);
    async fn put_personal_api_key(&self, key: PersonalApiKey);
    async fn get_team_service_account(&self, team_id: &str) -> Option<TeamServiceAccount>;
    async fn get_personal_api_key(&self, user_id: &str) -> Option<PersonalApiKey>;
}

/// In-memory `AuthStore`, sufficient for `Bootstrap`'s own tests and for a
/// process that doesn't need the credential store to survive a restart.
#[derive(Debug, Default)]
pub struct InMemoryAuthStore {
    team_service_accounts: RwLock<HashMap<String, TeamServiceAccount>>,
    personal_api_keys: RwLock<HashMap<String, PersonalApiKey>>,
}

impl InMemoryAuthStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuthStore for InMemoryAuthStore {
    async fn put_team_service_account(&self, account: TeamServiceAccount) {
        self.team_service_accounts
            .write()
            .expect("lock poisoned")
            .insert(account.team_id.clone(), account);
    }

    async fn put_personal_api_key(&self, key: PersonalApiKey) {
        self.personal_api_keys
            .write()
            .expect("lock poisoned")
            .insert(key.user_id.clone(), key);
    }

    async fn get_team_service_account(&self, team_id: &str) -> Option<TeamServiceAccount> {
        self.team_service_accounts
            .read()
            .expect("lock poisoned")
            .get(team_id)
            .cloned()
    }

    async fn get_personal_api_key(&self, user_id: &str) -> Option<PersonalApiKey> {
        self.personal_api_keys
            .read()
            .expect("lock poisoned")
            .get(user_id)
            .cloned()
    }
}
