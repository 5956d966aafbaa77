pub mod insights;
pub mod logging;
pub mod session;

use clap::{
    builder::styling::{AnsiColor, Effects, Styles},
    Arg, ColorChoice, Command,
};

use self::session::{ARG_IDENTITY_PUBLIC_KEY, ARG_SESSION_SECRET};

/// Validate that trust material is supplied as a pair.
///
/// # Errors
/// Returns an error string if only one of the session secret and the identity key is set.
pub fn validate(matches: &clap::ArgMatches) -> Result<(), String> {
    let secret = matches.contains_id(ARG_SESSION_SECRET);
    let identity = matches.contains_id(ARG_IDENTITY_PUBLIC_KEY);
    match (secret, identity) {
        (true, false) => Err(format!(
            "--{ARG_SESSION_SECRET} requires --{ARG_IDENTITY_PUBLIC_KEY}"
        )),
        (false, true) => Err(format!(
            "--{ARG_IDENTITY_PUBLIC_KEY} requires --{ARG_SESSION_SECRET}"
        )),
        _ => Ok(()),
    }
}

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("goalkeeper")
        .about("Session gate and API for the goal tracker")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("8080")
                .env("GOALKEEPER_PORT")
                .value_parser(clap::value_parser!(u16)),
        );

    let command = session::with_args(command);
    let command = insights::with_args(command);
    logging::with_args(command)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    const ENV: [&str; 15] = [
        "GOALKEEPER_PORT",
        "GOALKEEPER_PRODUCTION",
        "GOALKEEPER_ALLOW_DEV_SESSION",
        "GOALKEEPER_DENY_UNCLASSIFIED",
        "GOALKEEPER_SESSION_SECRET",
        "GOALKEEPER_IDENTITY_PUBLIC_KEY",
        "GOALKEEPER_IDENTITY_ISSUER",
        "GOALKEEPER_IDENTITY_AUDIENCE",
        "GOALKEEPER_VERIFY_URL",
        "GOALKEEPER_VERIFY_TIMEOUT_MS",
        "GOALKEEPER_STATIC_DIR",
        "GOALKEEPER_OPENAI_API_KEY",
        "GOALKEEPER_OPENAI_BASE_URL",
        "GOALKEEPER_OPENAI_MODEL",
        "GOALKEEPER_LOG_LEVEL",
    ];

    /// Run `f` with every goalkeeper variable unset except `set`.
    pub(crate) fn with_env<F: FnOnce()>(set: &[(&str, &str)], f: F) {
        let vars: Vec<(&str, Option<&str>)> = ENV
            .iter()
            .map(|name| {
                let value = set
                    .iter()
                    .find(|(key, _)| key == name)
                    .map(|(_, value)| *value);
                (*name, value)
            })
            .collect();
        temp_env::with_vars(vars, f);
    }

    #[test]
    fn test_new() {
        let command = new();

        assert_eq!(command.get_name(), "goalkeeper");
        assert_eq!(
            command.get_about().map(ToString::to_string),
            Some("Session gate and API for the goal tracker".to_string())
        );
        assert_eq!(
            command.get_version().map(ToString::to_string),
            Some(env!("CARGO_PKG_VERSION").to_string())
        );
    }

    #[test]
    fn test_defaults() {
        with_env(&[], || {
            let matches = new().get_matches_from(vec!["goalkeeper"]);
            assert_eq!(matches.get_one::<u16>("port").copied(), Some(8080));
            assert!(!matches.get_flag(session::ARG_PRODUCTION));
            assert!(!matches.get_flag(session::ARG_ALLOW_DEV_SESSION));
            assert!(!matches.get_flag(session::ARG_DENY_UNCLASSIFIED));
            assert_eq!(
                matches.get_one::<u64>(session::ARG_VERIFY_TIMEOUT_MS).copied(),
                Some(3000)
            );
            assert_eq!(
                matches
                    .get_one::<String>(insights::ARG_OPENAI_MODEL)
                    .map(String::as_str),
                Some("gpt-4o-mini")
            );
            assert_eq!(matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(), Some(0));
            assert!(validate(&matches).is_ok());
        });
    }

    #[test]
    fn test_check_flags() {
        with_env(&[], || {
            let matches = new().get_matches_from(vec![
                "goalkeeper",
                "--port",
                "9090",
                "--production",
                "--allow-dev-session",
                "--verify-url",
                "http://127.0.0.1:8080/api/auth/verify",
                "-vvv",
            ]);
            assert_eq!(matches.get_one::<u16>("port").copied(), Some(9090));
            assert!(matches.get_flag(session::ARG_PRODUCTION));
            assert!(matches.get_flag(session::ARG_ALLOW_DEV_SESSION));
            assert_eq!(
                matches
                    .get_one::<String>(session::ARG_VERIFY_URL)
                    .map(String::as_str),
                Some("http://127.0.0.1:8080/api/auth/verify")
            );
            assert_eq!(matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(), Some(3));
        });
    }

    #[test]
    fn test_check_env() {
        with_env(
            &[
                ("GOALKEEPER_PORT", "443"),
                ("GOALKEEPER_PRODUCTION", "true"),
                ("GOALKEEPER_DENY_UNCLASSIFIED", "true"),
                ("GOALKEEPER_OPENAI_MODEL", "gpt-4o"),
                ("GOALKEEPER_LOG_LEVEL", "info"),
            ],
            || {
                let matches = new().get_matches_from(vec!["goalkeeper"]);
                assert_eq!(matches.get_one::<u16>("port").copied(), Some(443));
                assert!(matches.get_flag(session::ARG_PRODUCTION));
                assert!(matches.get_flag(session::ARG_DENY_UNCLASSIFIED));
                assert!(!matches.get_flag(session::ARG_ALLOW_DEV_SESSION));
                assert_eq!(
                    matches
                        .get_one::<String>(insights::ARG_OPENAI_MODEL)
                        .map(String::as_str),
                    Some("gpt-4o")
                );
                assert_eq!(matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(), Some(2));
            },
        );
    }

    #[test]
    fn test_check_log_level_env() {
        for (level, expected) in [("error", 0), ("warn", 1), ("debug", 3), ("trace", 4)] {
            with_env(&[("GOALKEEPER_LOG_LEVEL", level)], || {
                let matches = new().get_matches_from(vec!["goalkeeper"]);
                assert_eq!(
                    matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                    Some(expected),
                    "level {level}"
                );
            });
        }
    }

    #[test]
    fn test_invalid_log_level() {
        with_env(&[("GOALKEEPER_LOG_LEVEL", "loud")], || {
            let result = new().try_get_matches_from(vec!["goalkeeper"]);
            assert!(result.is_err());
        });
    }

    #[test]
    fn test_trust_material_must_be_paired() {
        with_env(&[("GOALKEEPER_SESSION_SECRET", "secret")], || {
            let matches = new().get_matches_from(vec!["goalkeeper"]);
            let err = validate(&matches).err().unwrap_or_default();
            assert!(err.contains("--identity-public-key"), "{err}");
        });

        with_env(&[("GOALKEEPER_IDENTITY_PUBLIC_KEY", "/etc/key.pem")], || {
            let matches = new().get_matches_from(vec!["goalkeeper"]);
            let err = validate(&matches).err().unwrap_or_default();
            assert!(err.contains("--session-secret"), "{err}");
        });

        with_env(
            &[
                ("GOALKEEPER_SESSION_SECRET", "secret"),
                ("GOALKEEPER_IDENTITY_PUBLIC_KEY", "/etc/key.pem"),
            ],
            || {
                let matches = new().get_matches_from(vec!["goalkeeper"]);
                assert!(validate(&matches).is_ok());
            },
        );
    }
}
