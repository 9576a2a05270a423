//! Authentication: registration, login, bearer-token issue and verification, and
//! the account operations that hang off a verified identity.
//!
//! Passwords are stored as argon2id PHC strings. Tokens are HS256 JWTs carrying
//! the user id, email and role; they are verified on every request and there is
//! no server-side session.

use std::sync::Arc;

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::db::Store;
use crate::error::ServiceError;
use crate::fields::{Role, Status};
use crate::user::*;

/// JWT payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

/// The caller, as established by a verified token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
}

/// Returned by register and login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    pub token: String,
    pub user: PublicUser,
}

pub struct AuthService {
    store: Arc<Store>,
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
    params: Params,
    /// Hash checked for unknown emails so every failed login pays for argon2.
    decoy_hash: OnceCell<String>,
}

impl AuthService {
    pub fn new(store: Arc<Store>, config: &AuthConfig) -> Result<Self, argon2::Error> {
        let secret: Vec<u8> = match &config.jwt_secret {
            Some(secret) => secret.expose_secret().as_bytes().to_vec(),
            None => {
                warn!("No auth.jwt_secret configured; using a random secret, tokens will not survive a restart");
                rand::random::<[u8; 32]>().to_vec()
            }
        };
        let params = Params::new(config.argon2_memory_kib, config.argon2_iterations, 1, None)?;
        Ok(Self {
            store,
            encoding: EncodingKey::from_secret(&secret),
            decoding: DecodingKey::from_secret(&secret),
            ttl: Duration::hours(i64::from(config.token_ttl_hours)),
            params,
            decoy_hash: OnceCell::new(),
        })
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    #[instrument(skip_all)]
    pub async fn register(&self, draft: RegisterDraft) -> Result<AuthSession, ServiceError> {
        let reg = draft.validate()?;
        if self.store.read(|db| db.user_by_email(&reg.email).is_some()).await {
            return Err(ServiceError::DuplicateIdentity);
        }
        let password_hash = self.hash(reg.password).await?;

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: reg.name,
            email: reg.email,
            password_hash,
            role: reg.role,
            productivity_preferences: ProductivityPreferences::default(),
            created_at: now,
            last_login: None,
        };
        let user = self
            .store
            .write(|db| {
                // Re-checked under the write lock.
                if db.user_by_email(&user.email).is_some() {
                    return Err(ServiceError::DuplicateIdentity);
                }
                db.users.push(user.clone());
                Ok(user)
            })
            .await?;

        info!(user = %user.id, "User registered");
        self.session_for(&user, now)
    }

    #[instrument(skip_all)]
    pub async fn login(&self, draft: LoginDraft) -> Result<AuthSession, ServiceError> {
        let (email, password) = draft.validate()?;
        let Some(user) = self.store.read(|db| db.user_by_email(&email).cloned()).await else {
            let decoy = self
                .decoy_hash
                .get_or_try_init(|| self.hash(Uuid::new_v4().to_string()))
                .await?
                .clone();
            self.verify(password, decoy).await?;
            warn!("Login for unknown email");
            return Err(ServiceError::InvalidCredentials);
        };
        if !self.verify(password, user.password_hash.clone()).await? {
            warn!(user = %user.id, "Login with wrong password");
            return Err(ServiceError::InvalidCredentials);
        }

        let now = Utc::now();
        let user = self
            .store
            .write(|db| {
                let u = db.user_mut(user.id).ok_or(ServiceError::InvalidCredentials)?;
                u.last_login = Some(now);
                Ok::<_, ServiceError>(u.clone())
            })
            .await?;

        info!(user = %user.id, "User logged in");
        self.session_for(&user, now)
    }

    /// Resolve a bearer token to an identity. The user must still exist.
    pub async fn verify_token(&self, token: &str) -> Result<Identity, ServiceError> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::default()).map_err(|e| {
            debug!(error = %e, "Token rejected");
            ServiceError::Unauthenticated
        })?;
        let claims = data.claims;
        let exists = self.store.read(|db| db.user(claims.sub).is_some()).await;
        if !exists {
            debug!(user = %claims.sub, "Token for a deleted user");
            return Err(ServiceError::Unauthenticated);
        }
        Ok(Identity {
            user_id: claims.sub,
            email: claims.email,
            role: claims.role,
        })
    }

    pub async fn current_user(&self, identity: &Identity) -> Result<PublicUser, ServiceError> {
        self.store
            .read(|db| db.user(identity.user_id).map(PublicUser::from))
            .await
            .ok_or(ServiceError::NotFound("User"))
    }

    #[instrument(skip_all, fields(user = %identity.user_id))]
    pub async fn update_profile(
        &self,
        identity: &Identity,
        patch: ProfilePatch,
    ) -> Result<PublicUser, ServiceError> {
        let patch = patch.validate()?;
        self.store
            .write(|db| {
                let user = db.user_mut(identity.user_id).ok_or(ServiceError::NotFound("User"))?;
                if let Some(name) = patch.name {
                    user.name = name;
                }
                if let Some(prefs) = patch.productivity_preferences {
                    user.productivity_preferences.merge(prefs);
                }
                Ok(PublicUser::from(&*user))
            })
            .await
    }

    #[instrument(skip_all, fields(user = %identity.user_id))]
    pub async fn update_preferences(
        &self,
        identity: &Identity,
        patch: PreferencesPatch,
    ) -> Result<ProductivityPreferences, ServiceError> {
        let patch = patch.validate()?;
        self.store
            .write(|db| {
                let user = db.user_mut(identity.user_id).ok_or(ServiceError::NotFound("User"))?;
                user.productivity_preferences.merge(patch);
                Ok(user.productivity_preferences.clone())
            })
            .await
    }

    #[instrument(skip_all, fields(user = %identity.user_id))]
    pub async fn change_password(
        &self,
        identity: &Identity,
        draft: PasswordChangeDraft,
    ) -> Result<(), ServiceError> {
        let (current, new) = draft.validate()?;
        let stored = self.stored_hash(identity).await?;
        if !self.verify(current, stored).await? {
            warn!("Password change with wrong current password");
            return Err(ServiceError::InvalidCredentials);
        }
        let password_hash = self.hash(new).await?;
        self.store
            .write(|db| {
                let user = db.user_mut(identity.user_id).ok_or(ServiceError::NotFound("User"))?;
                user.password_hash = password_hash;
                Ok::<_, ServiceError>(())
            })
            .await?;
        info!("Password changed");
        Ok(())
    }

    /// Delete the caller's account along with their tasks and projects.
    #[instrument(skip_all, fields(user = %identity.user_id))]
    pub async fn delete_account(
        &self,
        identity: &Identity,
        draft: AccountDeletionDraft,
    ) -> Result<(), ServiceError> {
        let password = draft.validate()?;
        let stored = self.stored_hash(identity).await?;
        if !self.verify(password, stored).await? {
            warn!("Account deletion with wrong password");
            return Err(ServiceError::InvalidCredentials);
        }
        self.store
            .write(|db| {
                db.remove_user(identity.user_id);
                Ok::<_, ServiceError>(())
            })
            .await?;
        info!("Account deleted");
        Ok(())
    }

    pub async fn stats(&self, identity: &Identity) -> UserStats {
        let today = Utc::now().date_naive();
        self.store
            .read(|db| {
                let mut stats = UserStats::default();
                for task in db.tasks.iter().filter(|t| t.owner == identity.user_id) {
                    stats.total += 1;
                    match task.status {
                        Status::Todo => stats.todo += 1,
                        Status::InProgress => stats.in_progress += 1,
                        Status::Done => stats.done += 1,
                    }
                    if task.status != Status::Done && task.due_date.is_some_and(|d| d < today) {
                        stats.overdue += 1;
                    }
                }
                if stats.total > 0 {
                    stats.completion_rate = (stats.done * 100 / stats.total) as u8;
                }
                stats
            })
            .await
    }

    fn session_for(&self, user: &User, now: DateTime<Utc>) -> Result<AuthSession, ServiceError> {
        Ok(AuthSession {
            token: self.issue_token(user, now)?,
            user: PublicUser::from(user),
        })
    }

    fn issue_token(&self, user: &User, now: DateTime<Utc>) -> Result<String, ServiceError> {
        let claims = Claims {
            sub: user.id,
            email: user.email.clone(),
            role: user.role,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| ServiceError::Internal(format!("token signing failed: {e}")))
    }

    async fn stored_hash(&self, identity: &Identity) -> Result<String, ServiceError> {
        self.store
            .read(|db| db.user(identity.user_id).map(|u| u.password_hash.clone()))
            .await
            .ok_or(ServiceError::NotFound("User"))
    }

    fn hasher(params: Params) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
    }

    async fn hash(&self, password: String) -> Result<String, ServiceError> {
        let params = self.params.clone();
        tokio::task::spawn_blocking(move || {
            let salt = SaltString::encode_b64(&rand::random::<[u8; 16]>())
                .map_err(|e| ServiceError::Internal(format!("salt encoding failed: {e}")))?;
            Self::hasher(params)
                .hash_password(password.as_bytes(), &salt)
                .map(|h| h.to_string())
                .map_err(|e| ServiceError::Internal(format!("password hashing failed: {e}")))
        })
        .await
        .map_err(|e| ServiceError::Internal(format!("hashing task failed: {e}")))?
    }

    async fn verify(&self, password: String, stored: String) -> Result<bool, ServiceError> {
        let params = self.params.clone();
        tokio::task::spawn_blocking(move || {
            let parsed = PasswordHash::new(&stored)
                .map_err(|e| ServiceError::Internal(format!("stored hash is malformed: {e}")))?;
            Ok(Self::hasher(params)
                .verify_password(password.as_bytes(), &parsed)
                .is_ok())
        })
        .await
        .map_err(|e| ServiceError::Internal(format!("verification task failed: {e}")))?
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use secrecy::SecretString;

    /// Cheap argon2 parameters so tests stay fast.
    pub(crate) fn test_auth(store: Arc<Store>) -> AuthService {
        let config = AuthConfig {
            jwt_secret: Some(SecretString::from("test-secret".to_string())),
            token_ttl_hours: 24,
            argon2_memory_kib: 64,
            argon2_iterations: 1,
        };
        AuthService::new(store, &config).unwrap()
    }

    pub(crate) fn register_draft(name: &str, email: &str, password: &str) -> RegisterDraft {
        RegisterDraft {
            name: Some(name.into()),
            email: Some(email.into()),
            password: Some(password.into()),
            role: None,
        }
    }

    fn login_draft(email: &str, password: &str) -> LoginDraft {
        LoginDraft {
            email: Some(email.into()),
            password: Some(password.into()),
        }
    }

    #[tokio::test]
    async fn stored_password_is_hashed_and_login_round_trips() {
        let store = Arc::new(Store::in_memory());
        let auth = test_auth(store.clone());
        auth.register(register_draft("Alice", "alice@example.com", "secret1"))
            .await
            .unwrap();

        let stored = store.read(|db| db.users[0].password_hash.clone()).await;
        assert_ne!(stored, "secret1");
        assert!(stored.starts_with("$argon2id$"));

        let session = auth.login(login_draft("ALICE@example.com", "secret1")).await.unwrap();
        assert!(session.user.last_login.is_some());

        let wrong = auth.login(login_draft("alice@example.com", "secret2")).await;
        assert!(matches!(wrong, Err(ServiceError::InvalidCredentials)));
        let unknown = auth.login(login_draft("nobody@example.com", "secret1")).await;
        assert!(matches!(unknown, Err(ServiceError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn unknown_email_still_runs_a_password_check() {
        let auth = test_auth(Arc::new(Store::in_memory()));
        assert!(!auth.decoy_hash.initialized());

        let unknown = auth.login(login_draft("nobody@example.com", "secret1")).await;
        assert!(matches!(unknown, Err(ServiceError::InvalidCredentials)));
        let decoy = auth.decoy_hash.get().unwrap();
        assert!(decoy.starts_with("$argon2id$"));

        // The decoy is made once and reused.
        let first = decoy.clone();
        auth.login(login_draft("ghost@example.com", "secret1")).await.unwrap_err();
        assert_eq!(auth.decoy_hash.get(), Some(&first));
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected_case_insensitively() {
        let auth = test_auth(Arc::new(Store::in_memory()));
        auth.register(register_draft("A", "a@example.com", "secret1")).await.unwrap();
        let again = auth.register(register_draft("B", "A@Example.com", "secret1")).await;
        assert!(matches!(again, Err(ServiceError::DuplicateIdentity)));
    }

    #[tokio::test]
    async fn token_verification() {
        let auth = test_auth(Arc::new(Store::in_memory()));
        let session = auth
            .register(register_draft("A", "a@example.com", "secret1"))
            .await
            .unwrap();

        let identity = auth.verify_token(&session.token).await.unwrap();
        assert_eq!(identity.user_id, session.user.id);
        assert_eq!(identity.email, "a@example.com");

        assert!(matches!(
            auth.verify_token("not-a-jwt").await,
            Err(ServiceError::Unauthenticated)
        ));

        let user = auth.store.read(|db| db.users[0].clone()).await;
        let expired = auth
            .issue_token(&user, Utc::now() - Duration::hours(48))
            .unwrap();
        assert!(matches!(
            auth.verify_token(&expired).await,
            Err(ServiceError::Unauthenticated)
        ));

        let other = test_auth_with_secret("other-secret");
        let forged = other.issue_token(&user, Utc::now()).unwrap();
        assert!(matches!(
            auth.verify_token(&forged).await,
            Err(ServiceError::Unauthenticated)
        ));
    }

    fn test_auth_with_secret(secret: &str) -> AuthService {
        let config = AuthConfig {
            jwt_secret: Some(SecretString::from(secret.to_string())),
            token_ttl_hours: 24,
            argon2_memory_kib: 64,
            argon2_iterations: 1,
        };
        AuthService::new(Arc::new(Store::in_memory()), &config).unwrap()
    }

    #[tokio::test]
    async fn password_change_requires_current_password() {
        let auth = test_auth(Arc::new(Store::in_memory()));
        let session = auth
            .register(register_draft("A", "a@example.com", "secret1"))
            .await
            .unwrap();
        let identity = auth.verify_token(&session.token).await.unwrap();

        let wrong = auth
            .change_password(
                &identity,
                PasswordChangeDraft {
                    current_password: Some("nope-nope".into()),
                    new_password: Some("secret2".into()),
                },
            )
            .await;
        assert!(matches!(wrong, Err(ServiceError::InvalidCredentials)));

        let short = auth
            .change_password(
                &identity,
                PasswordChangeDraft {
                    current_password: Some("secret1".into()),
                    new_password: Some("123".into()),
                },
            )
            .await;
        assert!(matches!(short, Err(ServiceError::Validation(_))));

        auth.change_password(
            &identity,
            PasswordChangeDraft {
                current_password: Some("secret1".into()),
                new_password: Some("secret2".into()),
            },
        )
        .await
        .unwrap();
        assert!(auth.login(login_draft("a@example.com", "secret2")).await.is_ok());
        assert!(auth.login(login_draft("a@example.com", "secret1")).await.is_err());
    }

    #[tokio::test]
    async fn profile_update_ignores_role_and_merges_preferences() {
        let auth = test_auth(Arc::new(Store::in_memory()));
        let session = auth
            .register(register_draft("A", "a@example.com", "secret1"))
            .await
            .unwrap();
        let identity = auth.verify_token(&session.token).await.unwrap();

        let patch: ProfilePatch = serde_json::from_str(
            r#"{"name":"Alice","role":"admin","email":"x@y.z","productivityPreferences":{"breakDuration":10}}"#,
        )
        .unwrap();
        let user = auth.update_profile(&identity, patch).await.unwrap();
        assert_eq!(user.name, "Alice");
        assert_eq!(user.role, Role::User);
        assert_eq!(user.email, "a@example.com");
        assert_eq!(user.productivity_preferences.break_duration, 10);
        assert_eq!(user.productivity_preferences.focus_session_duration, 25);
    }

    #[tokio::test]
    async fn deleted_account_tokens_stop_working() {
        let auth = test_auth(Arc::new(Store::in_memory()));
        let session = auth
            .register(register_draft("A", "a@example.com", "secret1"))
            .await
            .unwrap();
        let identity = auth.verify_token(&session.token).await.unwrap();

        let wrong = auth
            .delete_account(&identity, AccountDeletionDraft { password: Some("wrong1".into()) })
            .await;
        assert!(matches!(wrong, Err(ServiceError::InvalidCredentials)));

        auth.delete_account(&identity, AccountDeletionDraft { password: Some("secret1".into()) })
            .await
            .unwrap();
        assert!(matches!(
            auth.verify_token(&session.token).await,
            Err(ServiceError::Unauthenticated)
        ));
    }
}
