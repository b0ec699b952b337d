use std::collections::BTreeMap;

/// The logged-in user as the session service reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUser {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("unknown user: {0}")]
    UnknownUser(String),
    #[error("invalid credentials for {0}")]
    InvalidCredentials(String),
}

/// Authentication service the scene is created against.
///
/// No scene exists without a logged-in user.
pub trait Session {
    fn is_logged(&self) -> bool;
    fn current_user(&self) -> Option<SessionUser>;
    fn login(&mut self, login: &str, password: &str) -> Result<SessionUser, SessionError>;
    fn logout(&mut self);
}

/// In-memory accounts, for the desktop demo and tests.
#[derive(Debug, Clone, Default)]
pub struct LocalSession {
    accounts: BTreeMap<String, (u64, String)>,
    current: Option<SessionUser>,
}

impl LocalSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(mut self, login: &str, password: &str) -> Self {
        let id = self.accounts.len() as u64 + 1;
        self.accounts
            .insert(login.to_string(), (id, password.to_string()));
        self
    }

    /// A session already logged in as `login`.
    pub fn logged_in(login: &str) -> Self {
        let mut session = Self::new().with_account(login, "");
        session.current = Some(SessionUser {
            id: 1,
            name: login.to_string(),
        });
        session
    }
}

impl Session for LocalSession {
    fn is_logged(&self) -> bool {
        self.current.is_some()
    }

    fn current_user(&self) -> Option<SessionUser> {
        self.current.clone()
    }

    fn login(&mut self, login: &str, password: &str) -> Result<SessionUser, SessionError> {
        let (id, expected) = self
            .accounts
            .get(login)
            .ok_or_else(|| SessionError::UnknownUser(login.to_string()))?;
        if expected != password {
            return Err(SessionError::InvalidCredentials(login.to_string()));
        }
        let user = SessionUser {
            id: *id,
            name: login.to_string(),
        };
        tracing::info!(user = %user.name, "logged in");
        self.current = Some(user.clone());
        Ok(user)
    }

    fn logout(&mut self) {
        if let Some(user) = self.current.take() {
            tracing::info!(user = %user.name, "logged out");
        }
    }
}
