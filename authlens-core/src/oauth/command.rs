//! Messages posted by the login panel.

use serde::Deserialize;
use serde_json::Value;

use crate::store::Secret;

/// A message from the login page.
///
/// Anything that is not a well-formed `LOGIN` or `ACCESS` message parses as
/// [`LoginCommand::Ignored`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "command")]
pub enum LoginCommand {
    /// The user submitted provider settings and client credentials.
    #[serde(rename = "LOGIN")]
    Login {
        #[serde(rename = "baseUrl")]
        base_url: String,
        #[serde(rename = "clientID")]
        client_id: String,
        #[serde(rename = "clientSecret")]
        client_secret: Secret,
    },

    /// The page finished the token exchange.
    #[serde(rename = "ACCESS")]
    Access {
        #[serde(rename = "accessToken")]
        access_token: Secret,
    },

    /// Unknown or malformed message.
    #[serde(other)]
    Ignored,
}

impl LoginCommand {
    /// Parse a raw panel message.
    pub fn parse(message: Value) -> Self {
        let command = message
            .get("command")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        match serde_json::from_value(message) {
            Ok(parsed) => parsed,
            Err(_) => {
                // The error text can quote field values, so only the command is logged.
                tracing::debug!(%command, "Ignoring malformed login panel message");
                Self::Ignored
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_login() {
        let command = LoginCommand::parse(json!({
            "command": "LOGIN",
            "baseUrl": "https://idp.example",
            "clientID": "abc",
            "clientSecret": "s3cr3t",
        }));
        assert_eq!(
            command,
            LoginCommand::Login {
                base_url: "https://idp.example".to_string(),
                client_id: "abc".to_string(),
                client_secret: Secret::new("s3cr3t"),
            }
        );
    }

    #[test]
    fn test_parse_access() {
        let command = LoginCommand::parse(json!({"command": "ACCESS", "accessToken": "tok123"}));
        assert_eq!(
            command,
            LoginCommand::Access {
                access_token: Secret::new("tok123")
            }
        );
    }

    #[test]
    fn test_unknown_command_is_ignored() {
        assert_eq!(
            LoginCommand::parse(json!({"command": "PING"})),
            LoginCommand::Ignored
        );
    }

    #[test]
    fn test_malformed_messages_are_ignored() {
        assert_eq!(LoginCommand::parse(json!({"command": "ACCESS"})), LoginCommand::Ignored);
        assert_eq!(LoginCommand::parse(json!({"accessToken": "t"})), LoginCommand::Ignored);
        assert_eq!(LoginCommand::parse(json!("LOGIN")), LoginCommand::Ignored);
        assert_eq!(
            LoginCommand::parse(json!({"command": "LOGIN", "baseUrl": 5, "clientID": "a", "clientSecret": "b"})),
            LoginCommand::Ignored
        );
    }
}
