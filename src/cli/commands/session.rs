//! Session, gate and static-frontend arguments.

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::{path::PathBuf, time::Duration};
use url::Url;

pub const ARG_PRODUCTION: &str = "production";
pub const ARG_ALLOW_DEV_SESSION: &str = "allow-dev-session";
pub const ARG_DENY_UNCLASSIFIED: &str = "deny-unclassified";
pub const ARG_SESSION_SECRET: &str = "session-secret";
pub const ARG_IDENTITY_PUBLIC_KEY: &str = "identity-public-key";
pub const ARG_IDENTITY_ISSUER: &str = "identity-issuer";
pub const ARG_IDENTITY_AUDIENCE: &str = "identity-audience";
pub const ARG_VERIFY_URL: &str = "verify-url";
pub const ARG_VERIFY_TIMEOUT_MS: &str = "verify-timeout-ms";
pub const ARG_STATIC_DIR: &str = "static-dir";

#[must_use]
pub fn with_args(command: Command) -> Command {
    let command = with_mode_args(command);
    let command = with_trust_args(command);
    with_gate_args(command)
}

fn with_mode_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_PRODUCTION)
                .long(ARG_PRODUCTION)
                .help("Run in production mode: Secure cookies, dev bypass disabled")
                .env("GOALKEEPER_PRODUCTION")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(ARG_ALLOW_DEV_SESSION)
                .long(ARG_ALLOW_DEV_SESSION)
                .help("Honor the __dev_session marker cookie (ignored in production)")
                .env("GOALKEEPER_ALLOW_DEV_SESSION")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(ARG_DENY_UNCLASSIFIED)
                .long(ARG_DENY_UNCLASSIFIED)
                .help("Require a session for paths that are neither public nor protected")
                .env("GOALKEEPER_DENY_UNCLASSIFIED")
                .action(ArgAction::SetTrue),
        )
}

fn with_trust_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SESSION_SECRET)
                .long(ARG_SESSION_SECRET)
                .help("HMAC key used to sign session tokens")
                .env("GOALKEEPER_SESSION_SECRET")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_IDENTITY_PUBLIC_KEY)
                .long(ARG_IDENTITY_PUBLIC_KEY)
                .help("Identity provider RSA public key: PEM text or a path to a PEM file")
                .env("GOALKEEPER_IDENTITY_PUBLIC_KEY"),
        )
        .arg(
            Arg::new(ARG_IDENTITY_ISSUER)
                .long(ARG_IDENTITY_ISSUER)
                .help("Expected issuer of identity credentials")
                .env("GOALKEEPER_IDENTITY_ISSUER"),
        )
        .arg(
            Arg::new(ARG_IDENTITY_AUDIENCE)
                .long(ARG_IDENTITY_AUDIENCE)
                .help("Expected audience of identity credentials")
                .env("GOALKEEPER_IDENTITY_AUDIENCE"),
        )
}

fn with_gate_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_VERIFY_URL)
                .long(ARG_VERIFY_URL)
                .help("Verify sessions over HTTP against this URL instead of in-process")
                .env("GOALKEEPER_VERIFY_URL"),
        )
        .arg(
            Arg::new(ARG_VERIFY_TIMEOUT_MS)
                .long(ARG_VERIFY_TIMEOUT_MS)
                .help("Timeout for the session verification call, in milliseconds")
                .env("GOALKEEPER_VERIFY_TIMEOUT_MS")
                .default_value("3000")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_STATIC_DIR)
                .long(ARG_STATIC_DIR)
                .help("Directory of the compiled frontend served behind the gate")
                .env("GOALKEEPER_STATIC_DIR")
                .value_parser(clap::value_parser!(PathBuf)),
        )
}

/// Session options as parsed from the command line.
#[derive(Debug)]
pub struct Options {
    pub production: bool,
    pub allow_dev_session: bool,
    pub deny_unclassified: bool,
    pub session_secret: Option<String>,
    pub identity_public_key: Option<String>,
    pub identity_issuer: Option<String>,
    pub identity_audience: Option<String>,
    pub verify_url: Option<Url>,
    pub verify_timeout: Duration,
    pub static_dir: Option<PathBuf>,
}

impl Options {
    /// # Errors
    /// Returns an error if the verify URL does not parse.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let verify_url = matches
            .get_one::<String>(ARG_VERIFY_URL)
            .map(|url| Url::parse(url))
            .transpose()
            .context("invalid GOALKEEPER_VERIFY_URL")?;

        Ok(Self {
            production: matches.get_flag(ARG_PRODUCTION),
            allow_dev_session: matches.get_flag(ARG_ALLOW_DEV_SESSION),
            deny_unclassified: matches.get_flag(ARG_DENY_UNCLASSIFIED),
            session_secret: non_empty(matches, ARG_SESSION_SECRET),
            identity_public_key: non_empty(matches, ARG_IDENTITY_PUBLIC_KEY),
            identity_issuer: non_empty(matches, ARG_IDENTITY_ISSUER),
            identity_audience: non_empty(matches, ARG_IDENTITY_AUDIENCE),
            verify_url,
            verify_timeout: Duration::from_millis(
                matches
                    .get_one::<u64>(ARG_VERIFY_TIMEOUT_MS)
                    .copied()
                    .unwrap_or(3000),
            ),
            static_dir: matches.get_one::<PathBuf>(ARG_STATIC_DIR).cloned(),
        })
    }
}

fn non_empty(matches: &ArgMatches, id: &str) -> Option<String> {
    matches
        .get_one::<String>(id)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
