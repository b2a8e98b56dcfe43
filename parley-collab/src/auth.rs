use argon2::{
    password_hash::{Encoding, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use log::info;
use rand::rngs::OsRng;
use std::sync::Arc;
use thiserror::Error;

use crate::{
    Database, DatabaseError, NewUser, PrimaryKey, RoomId, UserData, UserRole,
};

/// Owns the user records. Every mutation of a user, including the
/// unread-mention set, goes through here.
pub struct Auth<Db> {
    db: Arc<Db>,
    argon: Argon2<'static>,
}

#[derive(Debug, Error)]
pub enum AuthError {
    /// Username or password is incorrect
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Username {0} is already taken")]
    UsernameTaken(String),
    /// Something else went wrong with the store
    #[error(transparent)]
    Db(DatabaseError),
    #[error("HashError: {0}")]
    HashError(String),
}

impl<Db> Auth<Db>
where
    Db: Database,
{
    pub fn new(db: &Arc<Db>) -> Self {
        Self {
            db: db.clone(),
            argon: Argon2::default(),
        }
    }

    /// Registers a new account
    pub async fn register(&self, new_user: NewPlainUser) -> Result<UserData, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        let password_hash = self
            .argon
            .hash_password(new_user.password.as_bytes(), &salt)
            .map_err(|e| AuthError::HashError(e.to_string()))?
            .to_string();

        let user = self
            .db
            .create_user(NewUser {
                username: new_user.username,
                password_hash,
                role: new_user.role,
            })
            .await
            .map_err(|e| match e {
                DatabaseError::Conflict { value, .. } => AuthError::UsernameTaken(value),
                err => AuthError::Db(err),
            })?;

        info!("Registered user {}", user.username);
        Ok(user)
    }

    /// Verifies credentials, returning the matching user.
    /// Unknown usernames and wrong passwords are indistinguishable to the caller.
    pub async fn login(&self, credentials: Credentials) -> Result<UserData, AuthError> {
        let user = self
            .db
            .user_by_username(&credentials.username)
            .await
            .map_err(|e| match e {
                DatabaseError::NotFound { .. } => AuthError::InvalidCredentials,
                err => AuthError::Db(err),
            })?;

        let stored_password = PasswordHash::parse(&user.password_hash, Encoding::default())
            .map_err(|e| AuthError::HashError(e.to_string()))?;

        self.argon
            .verify_password(credentials.password.as_bytes(), &stored_password)
            .map_err(|_| AuthError::InvalidCredentials)?;

        Ok(user)
    }

    /// Creates the admin account if it's missing, or promotes it if a
    /// regular account with that username already exists.
    pub async fn ensure_admin(
        &self,
        username: &str,
        password: &str,
    ) -> Result<UserData, AuthError> {
        match self.db.user_by_username(username).await {
            Ok(user) => {
                let user = self.db.promote_user(user.id).await.map_err(AuthError::Db)?;
                info!("User {} is now an admin", user.username);
                Ok(user)
            }
            Err(DatabaseError::NotFound { .. }) => {
                self.register(NewPlainUser {
                    username: username.to_string(),
                    password: password.to_string(),
                    role: UserRole::Admin,
                })
                .await
            }
            Err(e) => Err(AuthError::Db(e)),
        }
    }

    /// Sets or clears a user's personal API key
    pub async fn update_personal_key(
        &self,
        user_id: PrimaryKey,
        key: &str,
    ) -> Result<UserData, DatabaseError> {
        self.db.update_user_key(user_id, key).await
    }

    /// Promotes a user to admin. Callers gate this on the acting user's role.
    pub async fn promote(&self, user_id: PrimaryKey) -> Result<UserData, DatabaseError> {
        self.db.promote_user(user_id).await
    }

    /// Deletes a user completely. Callers gate this on the acting user's role.
    pub async fn delete_user(&self, user_id: PrimaryKey) -> Result<(), DatabaseError> {
        self.db.delete_user(user_id).await
    }

    pub async fn user_by_id(&self, user_id: PrimaryKey) -> Result<UserData, DatabaseError> {
        self.db.user_by_id(user_id).await
    }

    pub async fn list_users(&self) -> Result<Vec<UserData>, DatabaseError> {
        self.db.list_users().await
    }

    /// Rooms with a mention this user hasn't acknowledged yet
    pub async fn unread_rooms(&self, user_id: PrimaryKey) -> Result<Vec<RoomId>, DatabaseError> {
        self.db.unread_mentions(user_id).await
    }

    /// Acknowledges a mention. Called when the user opens the room's view.
    pub async fn clear_unread(
        &self,
        user_id: PrimaryKey,
        room_id: RoomId,
    ) -> Result<(), DatabaseError> {
        self.db.remove_unread_mention(user_id, room_id).await
    }
}

#[derive(Debug)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug)]
pub struct NewPlainUser {
    pub username: String,
    pub password: String,
    pub role: UserRole,
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::MemoryDatabase;

    fn auth() -> Auth<MemoryDatabase> {
        Auth::new(&Arc::new(MemoryDatabase::new()))
    }

    fn plain_user(username: &str, password: &str) -> NewPlainUser {
        NewPlainUser {
            username: username.to_string(),
            password: password.to_string(),
            role: UserRole::User,
        }
    }

    #[tokio::test]
    async fn test_register_and_login() {
        let auth = auth();

        auth.register(plain_user("alice", "hunter2")).await.unwrap();

        let user = auth
            .login(Credentials {
                username: "alice".to_string(),
                password: "hunter2".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(user.username, "alice");
        // Digest only, never plaintext
        assert_ne!(user.password_hash, "hunter2");
    }

    #[tokio::test]
    async fn test_duplicate_username_is_rejected() {
        let auth = auth();

        auth.register(plain_user("alice", "hunter2")).await.unwrap();
        let result = auth.register(plain_user("alice", "other")).await;

        assert!(matches!(result, Err(AuthError::UsernameTaken(_))));
    }

    #[tokio::test]
    async fn test_bad_credentials_are_indistinguishable() {
        let auth = auth();

        auth.register(plain_user("alice", "hunter2")).await.unwrap();

        let wrong_password = auth
            .login(Credentials {
                username: "alice".to_string(),
                password: "wrong".to_string(),
            })
            .await;

        let unknown_user = auth
            .login(Credentials {
                username: "nobody".to_string(),
                password: "hunter2".to_string(),
            })
            .await;

        assert!(matches!(wrong_password, Err(AuthError::InvalidCredentials)));
        assert!(matches!(unknown_user, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_ensure_admin_creates_or_promotes() {
        let auth = auth();

        let admin = auth.ensure_admin("admin", "admin123").await.unwrap();
        assert!(admin.is_admin());

        // Existing regular users get promoted instead
        let bob = auth.register(plain_user("bob", "pw")).await.unwrap();
        assert!(!bob.is_admin());

        let bob = auth.ensure_admin("bob", "ignored").await.unwrap();
        assert!(bob.is_admin());
    }
}
