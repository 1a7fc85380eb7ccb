//! Live login backends.

mod command;
mod fixed;
mod password_grant;
mod redirect;

pub use command::{CommandProvider, PASSWORD_ENV, USERNAME_ENV};
pub use fixed::StaticProvider;
pub use password_grant::PasswordGrantProvider;
pub use redirect::parse_redirect;

use std::sync::Arc;

use crate::auth::TokenProvider;
use crate::config::Settings;
use crate::{Error, Result};

/// Build the provider selected by `settings`.
pub fn from_settings(settings: &Settings) -> Result<Arc<dyn TokenProvider>> {
    if let Some(command) = &settings.login_command {
        let provider = CommandProvider::new(command).with_timeout(settings.login_timeout);
        return Ok(Arc::new(provider));
    }

    if let Some(endpoint) = &settings.token_endpoint {
        let mut provider = PasswordGrantProvider::new(endpoint)?;
        if let Some(client_id) = &settings.client_id {
            provider = provider.with_client_id(client_id);
        }
        return Ok(Arc::new(provider));
    }

    Err(Error::Config(
        "No login method configured (set login.command or token.endpoint)".into(),
    ))
}
