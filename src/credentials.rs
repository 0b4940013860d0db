use std::{
    fmt::Debug,
    io::{BufReader, BufWriter},
    path::PathBuf,
};

use fs_err::File;
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

/// API credentials, loaded from a JSON file.
///
/// Either `access_token` is present, or the three fields needed for the
/// authorization-code exchange are.
#[derive(Clone, Debug, TypedBuilder, Serialize, Deserialize)]
pub struct Credentials {
    #[builder(default, setter(strip_option))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<AccessToken>,
    #[builder(default, setter(strip_option))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<ClientId>,
    #[builder(default, setter(strip_option))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<ClientSecret>,
    #[builder(default, setter(strip_option))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<AuthorizationCode>,
}

#[derive(Clone, PartialEq, Eq, derive_more::From, Serialize, Deserialize)]
pub struct AccessToken(String);
impl AccessToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(
    Clone, Copy, PartialEq, Eq, Debug, derive_more::From, derive_more::Display, Serialize, Deserialize,
)]
pub struct ClientId(u64);

#[derive(Clone, PartialEq, Eq, derive_more::From, derive_more::Into, Serialize, Deserialize)]
pub struct ClientSecret(String);

#[derive(Clone, PartialEq, Eq, derive_more::From, derive_more::Into, Serialize, Deserialize)]
pub struct AuthorizationCode(String);

// Secrets never end up in logs.
macro_rules! redacted_debug {
    ($($t: ty),*) => {$(
        impl Debug for $t {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(concat!(stringify!($t), "(..)"))
            }
        }
    )*};
}
redacted_debug!(AccessToken, ClientSecret, AuthorizationCode);

/// What the credentials file allows us to do.
#[derive(Debug)]
pub enum Authorization<'a> {
    Token(&'a AccessToken),
    Exchange {
        client_id: ClientId,
        client_secret: &'a ClientSecret,
        code: &'a AuthorizationCode,
    },
}

impl Credentials {
    pub fn load(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        Ok(serde_json::from_reader(BufReader::new(File::open(path)?))?)
    }

    pub fn save(&self, path: impl Into<PathBuf>) -> anyhow::Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Stores a freshly exchanged token.  The code it came from is single-use,
    /// so it is dropped.
    pub fn with_access_token(self, token: AccessToken) -> Self {
        Self {
            access_token: Some(token),
            code: None,
            ..self
        }
    }

    /// A ready token wins over an exchange.
    pub fn authorization(&self) -> Option<Authorization<'_>> {
        if let Some(token) = &self.access_token {
            return Some(Authorization::Token(token));
        }
        match (&self.client_id, &self.client_secret, &self.code) {
            (Some(client_id), Some(client_secret), Some(code)) => Some(Authorization::Exchange {
                client_id: *client_id,
                client_secret,
                code,
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AccessToken, Authorization, ClientId, Credentials};

    #[test]
    fn test_token_wins() {
        let credentials = Credentials::builder()
            .access_token("tok".to_owned().into())
            .client_id(1.into())
            .client_secret("s".to_owned().into())
            .code("c".to_owned().into())
            .build();
        assert!(matches!(
            credentials.authorization(),
            Some(Authorization::Token(t)) if t == &AccessToken::from("tok".to_owned())
        ));
    }

    #[test]
    fn test_exchange_needs_all_fields() {
        let json = r#"{"client_id":1234,"client_secret":"shh","code":"abc"}"#;
        let credentials: Credentials = serde_json::from_str(json).unwrap();
        assert!(matches!(
            credentials.authorization(),
            Some(Authorization::Exchange { .. })
        ));

        let json = r#"{"client_id":1234,"code":"abc"}"#;
        let credentials: Credentials = serde_json::from_str(json).unwrap();
        assert!(credentials.authorization().is_none());
    }

    #[test]
    fn test_secrets_are_not_printed() {
        let credentials = Credentials::builder()
            .access_token("super-secret".to_owned().into())
            .client_secret("client-secret".to_owned().into())
            .code("one-time-code".to_owned().into())
            .build();
        let printed = format!("{credentials:?}");
        for secret in ["super-secret", "client-secret", "one-time-code"] {
            assert!(!printed.contains(secret), "{printed}");
        }
        assert!(printed.contains("AccessToken(..)"));
        assert!(printed.contains("AuthorizationCode(..)"));

        let credentials = Credentials::builder()
            .client_id(1.into())
            .client_secret("client-secret".to_owned().into())
            .code("one-time-code".to_owned().into())
            .build();
        let printed = format!("{:?}", credentials.authorization());
        assert!(!printed.contains("one-time-code"), "{printed}");
    }

    #[test]
    fn test_exchanged_token_replaces_code() {
        let credentials = Credentials::builder()
            .client_id(1.into())
            .client_secret("s".to_owned().into())
            .code("c".to_owned().into())
            .build()
            .with_access_token("tok".to_owned().into());
        assert!(credentials.code.is_none());
        assert!(credentials.client_secret.is_some());
        assert!(matches!(
            credentials.authorization(),
            Some(Authorization::Token(_))
        ));
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("credentials_{}.json", std::process::id()));
        let credentials = Credentials::builder()
            .client_id(42.into())
            .client_secret("s".to_owned().into())
            .code("c".to_owned().into())
            .build();
        credentials.save(&path).unwrap();
        let loaded = Credentials::load(&path).unwrap();
        assert_eq!(loaded.client_id, Some(ClientId::from(42)));
        assert!(loaded.access_token.is_none());
        let _ = std::fs::remove_file(&path);
    }
}
