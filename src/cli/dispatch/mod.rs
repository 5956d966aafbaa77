//! Command-line argument dispatch.
//!
//! Maps validated CLI matches to an [`Action`] carrying the full server
//! configuration.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{insights, session};
use anyhow::Result;
use secrecy::SecretString;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);

    crate::cli::commands::validate(matches).map_err(|e| anyhow::anyhow!(e))?;

    let session_opts = session::Options::parse(matches)?;
    let insights_opts = insights::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        production: session_opts.production,
        allow_dev_session: session_opts.allow_dev_session,
        deny_unclassified: session_opts.deny_unclassified,
        session_secret: session_opts.session_secret.map(SecretString::from),
        identity_public_key: session_opts.identity_public_key,
        identity_issuer: session_opts.identity_issuer,
        identity_audience: session_opts.identity_audience,
        verify_url: session_opts.verify_url,
        verify_timeout: session_opts.verify_timeout,
        static_dir: session_opts.static_dir,
        openai_api_key: insights_opts.api_key.map(SecretString::from),
        openai_base_url: insights_opts.base_url,
        openai_model: insights_opts.model,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands::{self, tests::with_env};
    use std::time::Duration;

    fn server_args(action: Action) -> Args {
        match action {
            Action::Server(args) => args,
        }
    }

    #[test]
    fn defaults_map_to_development_server() {
        with_env(&[], || {
            let matches = commands::new().get_matches_from(vec!["goalkeeper"]);
            let result = handler(&matches);
            assert!(result.is_ok());
            if let Ok(action) = result {
                let args = server_args(action);
                assert_eq!(args.port, 8080);
                assert!(!args.production);
                assert!(args.session_secret.is_none());
                assert!(args.verify_url.is_none());
                assert_eq!(args.verify_timeout, Duration::from_millis(3000));
                assert_eq!(args.openai_base_url.as_str(), "https://api.openai.com/");
                assert!(args.openai_api_key.is_none());
            }
        });
    }

    #[test]
    fn env_values_reach_the_action() {
        with_env(
            &[
                ("GOALKEEPER_PORT", "3000"),
                ("GOALKEEPER_PRODUCTION", "true"),
                ("GOALKEEPER_SESSION_SECRET", "secret"),
                ("GOALKEEPER_IDENTITY_PUBLIC_KEY", "/etc/goalkeeper/idp.pem"),
                ("GOALKEEPER_IDENTITY_ISSUER", "https://idp.example"),
                ("GOALKEEPER_VERIFY_URL", "http://127.0.0.1:3000/api/auth/verify"),
                ("GOALKEEPER_VERIFY_TIMEOUT_MS", "500"),
                ("GOALKEEPER_STATIC_DIR", "/srv/goalkeeper"),
                ("GOALKEEPER_OPENAI_API_KEY", "sk-test"),
            ],
            || {
                let matches = commands::new().get_matches_from(vec!["goalkeeper"]);
                let result = handler(&matches);
                assert!(result.is_ok());
                if let Ok(action) = result {
                    let args = server_args(action);
                    assert_eq!(args.port, 3000);
                    assert!(args.production);
                    assert!(args.session_secret.is_some());
                    assert_eq!(
                        args.identity_public_key.as_deref(),
                        Some("/etc/goalkeeper/idp.pem")
                    );
                    assert_eq!(args.identity_issuer.as_deref(), Some("https://idp.example"));
                    assert_eq!(
                        args.verify_url.as_ref().map(url::Url::as_str),
                        Some("http://127.0.0.1:3000/api/auth/verify")
                    );
                    assert_eq!(args.verify_timeout, Duration::from_millis(500));
                    assert_eq!(
                        args.static_dir.as_deref(),
                        Some(std::path::Path::new("/srv/goalkeeper"))
                    );
                    assert!(args.openai_api_key.is_some());
                }
            },
        );
    }

    #[test]
    fn half_trust_material_is_an_error() {
        with_env(&[("GOALKEEPER_SESSION_SECRET", "secret")], || {
            let matches = commands::new().get_matches_from(vec!["goalkeeper"]);
            let result = handler(&matches);
            assert!(result.is_err());
            if let Err(err) = result {
                assert!(err.to_string().contains("--identity-public-key"));
            }
        });
    }

    #[test]
    fn invalid_verify_url_is_an_error() {
        with_env(&[("GOALKEEPER_VERIFY_URL", "not a url")], || {
            let matches = commands::new().get_matches_from(vec!["goalkeeper"]);
            let result = handler(&matches);
            assert!(result.is_err());
            if let Err(err) = result {
                assert!(err.to_string().contains("GOALKEEPER_VERIFY_URL"));
            }
        });
    }
}
