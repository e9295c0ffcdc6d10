//! Error types for SmartShop.
//!
//! Authentication failures are the only errors shown to the user (as localized
//! text, see [`AuthError::message`]). Everything else is logged at the point of
//! the failing call and degrades to a no-op.

use thiserror::Error;

use crate::config::Locale;

/// Failures reported by the authentication provider.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The password does not match the account.
    #[error("invalid credentials")]
    InvalidCredentials,
    /// No account exists for the email.
    #[error("user not found")]
    UserNotFound,
    /// Sign-up with an email that already has an account.
    #[error("email already in use")]
    EmailInUse,
    /// Sign-up password rejected by the provider's strength rule.
    #[error("password is too weak")]
    WeakPassword,
    /// Any other provider rejection or transport failure.
    #[error("authentication failed: {0}")]
    Unknown(String),
}

impl AuthError {
    /// User-facing text for this failure.
    ///
    /// `UserNotFound` and `InvalidCredentials` share a message.
    pub fn message(&self, locale: Locale) -> &'static str {
        match (locale, self) {
            (Locale::Es, Self::InvalidCredentials | Self::UserNotFound) => {
                "Credenciales incorrectas."
            }
            (Locale::Es, Self::EmailInUse) => "Este correo ya está registrado.",
            (Locale::Es, Self::WeakPassword) => {
                "La contraseña debe tener al menos 6 caracteres."
            }
            (Locale::Es, Self::Unknown(_)) => "Ocurrió un error. Inténtalo de nuevo.",
            (Locale::En, Self::InvalidCredentials | Self::UserNotFound) => {
                "Incorrect credentials."
            }
            (Locale::En, Self::EmailInUse) => "This email is already registered.",
            (Locale::En, Self::WeakPassword) => "Password must be at least 6 characters.",
            (Locale::En, Self::Unknown(_)) => "Something went wrong. Please try again.",
        }
    }
}

/// Persistence failures (create / fetch / subscribe). Logged, never shown.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Sled(#[from] sled::Error),
    #[error("failed to encode or decode document: {0}")]
    Serde(#[from] serde_json::Error),
    #[error(transparent)]
    Token(#[from] jsonwebtoken::errors::Error),
    #[error(transparent)]
    Hash(#[from] bcrypt::BcryptError),
    #[error("blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("corrupt record in {tree}: {reason}")]
    Corrupt { tree: String, reason: String },
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        Self::Unknown(err.to_string())
    }
}

/// Invalid configuration values read from the environment.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{var} has invalid value {value:?}: {reason}")]
    InvalidVar {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Crate-level error aggregating the domain errors.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// A write was attempted with no signed-in identity.
    #[error("no signed-in identity")]
    NotSignedIn,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_user_and_bad_password_share_a_message() {
        for locale in [Locale::Es, Locale::En] {
            assert_eq!(
                AuthError::UserNotFound.message(locale),
                AuthError::InvalidCredentials.message(locale)
            );
        }
    }

    #[test]
    fn spanish_messages_match_auth_screen_copy() {
        assert_eq!(
            AuthError::EmailInUse.message(Locale::Es),
            "Este correo ya está registrado."
        );
        assert_eq!(
            AuthError::Unknown("network".into()).message(Locale::Es),
            "Ocurrió un error. Inténtalo de nuevo."
        );
    }

    #[test]
    fn store_errors_become_unknown_auth_errors() {
        let err = StoreError::Corrupt {
            tree: "users".into(),
            reason: "bad json".into(),
        };
        assert!(matches!(AuthError::from(err), AuthError::Unknown(msg) if msg.contains("users")));
    }
}
