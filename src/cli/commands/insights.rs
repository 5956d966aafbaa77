use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use url::Url;

pub const ARG_OPENAI_API_KEY: &str = "openai-api-key";
pub const ARG_OPENAI_BASE_URL: &str = "openai-base-url";
pub const ARG_OPENAI_MODEL: &str = "openai-model";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_OPENAI_API_KEY)
                .long(ARG_OPENAI_API_KEY)
                .help("API key for the goal coach; the endpoint answers 501 without it")
                .env("GOALKEEPER_OPENAI_API_KEY")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_OPENAI_BASE_URL)
                .long(ARG_OPENAI_BASE_URL)
                .help("Base URL of the chat completions API")
                .env("GOALKEEPER_OPENAI_BASE_URL")
                .default_value("https://api.openai.com"),
        )
        .arg(
            Arg::new(ARG_OPENAI_MODEL)
                .long(ARG_OPENAI_MODEL)
                .help("Model used for goal insights")
                .env("GOALKEEPER_OPENAI_MODEL")
                .default_value("gpt-4o-mini"),
        )
}

#[derive(Debug)]
pub struct Options {
    pub api_key: Option<String>,
    pub base_url: Url,
    pub model: String,
}

impl Options {
    /// # Errors
    /// Returns an error if the base URL does not parse.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let base_url = matches
            .get_one::<String>(ARG_OPENAI_BASE_URL)
            .map_or("https://api.openai.com", String::as_str);
        Ok(Self {
            api_key: matches
                .get_one::<String>(ARG_OPENAI_API_KEY)
                .map(|key| key.trim().to_string())
                .filter(|key| !key.is_empty()),
            base_url: Url::parse(base_url).context("invalid GOALKEEPER_OPENAI_BASE_URL")?,
            model: matches
                .get_one::<String>(ARG_OPENAI_MODEL)
                .cloned()
                .unwrap_or_else(|| "gpt-4o-mini".to_string()),
        })
    }
}
