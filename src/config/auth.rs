use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Caller resolution.
///
/// Authentication happens upstream. When `trusted_headers` is set, the
/// reverse proxy in front of docguard is trusted to forward the authenticated
/// user's id and system role in request headers. Without it, only a caller
/// placed in the request extensions by an embedding application is seen.
///
/// ```toml
/// [auth.trusted_headers]
/// user_id_header = "X-User-Id"
/// role_header = "X-User-Role"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    #[serde(default)]
    pub trusted_headers: Option<TrustedHeadersConfig>,
}

impl AuthConfig {
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        match &self.trusted_headers {
            Some(headers) => headers.validate(),
            None => Ok(()),
        }
    }
}

/// Headers an upstream proxy uses to forward the caller's identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrustedHeadersConfig {
    /// Header containing the authenticated user's id.
    #[serde(default = "default_user_id_header")]
    pub user_id_header: String,

    /// Header containing the user's system role (ADMIN, USER, GUEST).
    #[serde(default = "default_role_header")]
    pub role_header: String,
}

impl Default for TrustedHeadersConfig {
    fn default() -> Self {
        Self {
            user_id_header: default_user_id_header(),
            role_header: default_role_header(),
        }
    }
}

impl TrustedHeadersConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("user_id_header", &self.user_id_header),
            ("role_header", &self.role_header),
        ] {
            if value.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "auth.trusted_headers.{name} cannot be empty"
                )));
            }
            if http::HeaderName::from_bytes(value.as_bytes()).is_err() {
                return Err(ConfigError::Validation(format!(
                    "auth.trusted_headers.{name} is not a valid header name: '{value}'"
                )));
            }
        }
        if self.user_id_header.eq_ignore_ascii_case(&self.role_header) {
            return Err(ConfigError::Validation(
                "auth.trusted_headers user_id_header and role_header must differ".into(),
            ));
        }
        Ok(())
    }
}

fn default_user_id_header() -> String {
    "X-User-Id".to_string()
}

fn default_role_header() -> String {
    "X-User-Role".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trusted_headers_defaults() {
        let config: AuthConfig = toml::from_str("[trusted_headers]").unwrap();
        let headers = config.trusted_headers.unwrap();
        assert_eq!(headers.user_id_header, "X-User-Id");
        assert_eq!(headers.role_header, "X-User-Role");
    }

    #[test]
    fn test_absent_by_default() {
        let config: AuthConfig = toml::from_str("").unwrap();
        assert!(config.trusted_headers.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_header_name_rejected() {
        let config: AuthConfig = toml::from_str(
            r#"
            [trusted_headers]
            user_id_header = "X User"
            "#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_same_header_rejected() {
        let config: AuthConfig = toml::from_str(
            r#"
            [trusted_headers]
            user_id_header = "X-Identity"
            role_header = "x-identity"
            "#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }
}
