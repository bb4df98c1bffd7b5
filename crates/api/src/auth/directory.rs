//! Static account directory backing `POST /api/login`.
//!
//! There is no user table: the deployment configures a single account via
//! environment variables, and login compares against it.

use sessionlock_core::types::UserKey;

use crate::auth::password::verify_password;

/// One account allowed to log in.
#[derive(Debug, Clone)]
pub struct Account {
    pub id: String,
    pub email: UserKey,
    /// Argon2id PHC hash.
    pub password_hash: String,
}

#[derive(Debug, Clone, Default)]
pub struct UserDirectory {
    accounts: Vec<Account>,
}

impl UserDirectory {
    pub fn new(accounts: Vec<Account>) -> Self {
        Self { accounts }
    }

    /// Load the configured account.
    ///
    /// | Env Var                   | Required | Default |
    /// |---------------------------|----------|---------|
    /// | `AUTH_USER_EMAIL`         | no       | --      |
    /// | `AUTH_USER_PASSWORD_HASH` | no       | --      |
    ///
    /// When either is missing the directory is empty and every login is
    /// rejected.
    ///
    /// # Panics
    ///
    /// Panics if `AUTH_USER_EMAIL` is set but blank.
    pub fn from_env() -> Self {
        let email = std::env::var("AUTH_USER_EMAIL").ok();
        let hash = std::env::var("AUTH_USER_PASSWORD_HASH").ok();

        match (email, hash) {
            (Some(email), Some(password_hash)) => {
                let email = UserKey::parse(&email).expect("AUTH_USER_EMAIL must not be blank");
                Self::new(vec![Account {
                    id: "1".into(),
                    email,
                    password_hash,
                }])
            }
            _ => Self::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Look up an account by email, normalizing the input first.
    pub fn find(&self, email: &str) -> Option<&Account> {
        let key = UserKey::parse(email).ok()?;
        self.accounts.iter().find(|a| a.email == key)
    }

    /// Return the account if `email` exists and `password` matches its hash.
    ///
    /// A malformed stored hash is logged and treated as a mismatch.
    pub fn authenticate(&self, email: &str, password: &str) -> Option<&Account> {
        let account = self.find(email)?;
        match verify_password(password, &account.password_hash) {
            Ok(true) => Some(account),
            Ok(false) => None,
            Err(e) => {
                tracing::error!(error = %e, account = %account.email, "Stored password hash is invalid");
                None
            }
        }
    }
}
