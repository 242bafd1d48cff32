//! Process-local stores for tests and single-node development.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::session::errors::StoreError;
use crate::session::models::EmailAddress;
use crate::session::models::Token;
use crate::session::models::User;
use crate::session::models::UserId;
use crate::session::ports::TokenRepository;
use crate::session::ports::UserRepository;

#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<UserId, User>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, user: User) -> Result<User, StoreError> {
        let mut users = self.users.write().await;

        if users.contains_key(&user.id) {
            return Err(StoreError::Conflict(user.id.to_string()));
        }
        if users.values().any(|existing| existing.email == user.email) {
            return Err(StoreError::Conflict(user.email.to_string()));
        }

        users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().await.get(id).cloned())
    }

    async fn find_by_email(&self, email: &EmailAddress) -> Result<Option<User>, StoreError> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|user| &user.email == email)
            .cloned())
    }

    async fn exists_by_email(&self, email: &EmailAddress) -> Result<bool, StoreError> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .any(|user| &user.email == email))
    }

    async fn update(&self, user: User) -> Result<User, StoreError> {
        let mut users = self.users.write().await;

        if users
            .values()
            .any(|existing| existing.id != user.id && existing.email == user.email)
        {
            return Err(StoreError::Conflict(user.email.to_string()));
        }

        match users.get_mut(&user.id) {
            Some(existing) => {
                *existing = user.clone();
                Ok(user)
            }
            None => Err(StoreError::NotFound(user.id.to_string())),
        }
    }
}

/// Tokens keyed by secret. One write lock per mutation keeps every
/// transition atomic.
#[derive(Default)]
pub struct InMemoryTokenRepository {
    tokens: RwLock<HashMap<String, Token>>,
}

impl InMemoryTokenRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.tokens.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tokens.read().await.is_empty()
    }
}

#[async_trait]
impl TokenRepository for InMemoryTokenRepository {
    async fn create(&self, token: Token) -> Result<(), StoreError> {
        let mut tokens = self.tokens.write().await;

        if tokens.contains_key(&token.secret) || tokens.values().any(|t| t.id == token.id) {
            return Err(StoreError::Conflict(token.id));
        }

        tokens.insert(token.secret.clone(), token);
        Ok(())
    }

    async fn find_by_secret(&self, secret: &str) -> Result<Option<Token>, StoreError> {
        Ok(self.tokens.read().await.get(secret).cloned())
    }

    async fn blacklist(&self, secret: &str) -> Result<(), StoreError> {
        if let Some(token) = self.tokens.write().await.get_mut(secret) {
            token.blacklisted = true;
        }
        Ok(())
    }

    async fn revoke_if_active(&self, secret: &str) -> Result<bool, StoreError> {
        match self.tokens.write().await.get_mut(secret) {
            Some(token) if !token.blacklisted => {
                token.blacklisted = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_all_for_user(&self, user_id: &UserId) -> Result<u64, StoreError> {
        let mut tokens = self.tokens.write().await;
        let before = tokens.len();
        tokens.retain(|_, token| &token.user_id != user_id);
        Ok((before - tokens.len()) as u64)
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut tokens = self.tokens.write().await;
        let before = tokens.len();
        tokens.retain(|_, token| token.expires_at >= now);
        Ok((before - tokens.len()) as u64)
    }
}
