//! Token extraction from the post-login redirect URL.
//!
//! After a successful login the Spark portal redirects to a URL carrying
//! `access_token=...&token_type=...&expires_in=<seconds>` (in the fragment
//! or the query). The cached token is the full header value
//! `"<token_type> <access_token>"`.

use std::sync::OnceLock;

use chrono::{DateTime, Duration, Utc};
use regex::Regex;

use crate::auth::TokenResult;
use crate::{Error, Result};

fn redirect_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"access_token=(.*?)&token_type=(.*?)&expires_in=([0-9]*)")
            .expect("valid redirect regex")
    })
}

/// Parse the token out of `url`; `now` anchors the relative `expires_in`.
pub fn parse_redirect(url: &str, now: DateTime<Utc>) -> Result<TokenResult> {
    let caps = redirect_regex()
        .captures(url)
        .ok_or_else(|| Error::auth("Unable to authenticate with Harman Spark API"))?;

    let access_token = &caps[1];
    let token_type = &caps[2];
    if access_token.is_empty() || token_type.is_empty() {
        return Err(Error::auth("Redirect URL carries an empty token"));
    }

    let expires_in: i64 = caps[3]
        .parse()
        .map_err(|_| Error::auth("Redirect URL carries no token lifetime"))?;
    let expires_at = Duration::try_seconds(expires_in)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .ok_or_else(|| Error::auth(format!("Token lifetime out of range: {}", expires_in)))?;

    Ok(TokenResult::new(
        format!("{} {}", token_type, access_token),
        expires_at,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_parse_fragment() {
        let now = Utc::now();
        let url = "https://ivehicle-plus.spark.harman.com/#/callback#access_token=eyJabc.def&token_type=Bearer&expires_in=3600&scope=openid";
        let token = parse_redirect(url, now).unwrap();

        assert_eq!(token.token.expose_secret(), "Bearer eyJabc.def");
        assert_eq!(token.expires_at, now + Duration::seconds(3600));
    }

    #[test]
    fn test_parse_query() {
        let now = Utc::now();
        let url = "https://example.com/cb?access_token=t0k&token_type=bearer&expires_in=60";
        let token = parse_redirect(url, now).unwrap();
        assert_eq!(token.token.expose_secret(), "bearer t0k");
        assert_eq!(token.expires_at, now + Duration::seconds(60));
    }

    #[test]
    fn test_login_page_url_rejected() {
        let err = parse_redirect("https://ivehicle-plus.spark.harman.com/login", Utc::now())
            .unwrap_err();
        assert!(err.is_authentication_error());
        assert!(err.to_string().contains("Unable to authenticate"));
    }

    #[test]
    fn test_missing_lifetime_rejected() {
        let url = "https://example.com/cb#access_token=t0k&token_type=Bearer&expires_in=";
        assert!(parse_redirect(url, Utc::now()).is_err());
    }

    #[test]
    fn test_huge_lifetime_rejected() {
        let url = "https://example.com/cb#access_token=t&token_type=Bearer&expires_in=9223372036854775";
        assert!(parse_redirect(url, Utc::now()).is_err());
    }

    #[test]
    fn test_empty_token_rejected() {
        let url = "https://example.com/cb#access_token=&token_type=Bearer&expires_in=3600";
        assert!(parse_redirect(url, Utc::now()).is_err());
    }
}
