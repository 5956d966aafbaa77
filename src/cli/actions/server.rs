use crate::{
    api::{self, GoalCoach},
    gate::{HttpSessionProbe, LocalSessionProbe, SessionProbe},
    insights::OpenAiGenerator,
    session::{
        JwtIdentityVerifier, SessionConfig, SessionManager, TrustMaterial, UnclassifiedPolicy,
    },
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::{fs, path::PathBuf, sync::Arc, time::Duration};
use tracing::{debug, info, warn};
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub production: bool,
    pub allow_dev_session: bool,
    pub deny_unclassified: bool,
    pub session_secret: Option<SecretString>,
    pub identity_public_key: Option<String>,
    pub identity_issuer: Option<String>,
    pub identity_audience: Option<String>,
    pub verify_url: Option<Url>,
    pub verify_timeout: Duration,
    pub static_dir: Option<PathBuf>,
    pub openai_api_key: Option<SecretString>,
    pub openai_base_url: Url,
    pub openai_model: String,
}

/// Execute the server action.
/// # Errors
/// Returns an error if trust material cannot be loaded, a client cannot be built,
/// or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let config = session_config(&args)?;
    let sessions = Arc::new(SessionManager::new(config));
    let probe = session_probe(&args, &sessions)?;
    let coach = goal_coach(&args)?;

    let app = api::app(sessions, probe, coach, args.static_dir.as_deref());
    api::new(args.port, app).await
}

/// Build the shared session configuration from the parsed arguments.
///
/// # Errors
/// Returns an error if the identity public key cannot be read or parsed.
pub fn session_config(args: &Args) -> Result<SessionConfig> {
    let policy = if args.deny_unclassified {
        UnclassifiedPolicy::Deny
    } else {
        UnclassifiedPolicy::Allow
    };

    if args.production && policy == UnclassifiedPolicy::Allow {
        warn!(
            "unclassified paths are served without a session in production; \
             consider --deny-unclassified"
        );
    }

    let mut config = SessionConfig::new(args.production)
        .with_dev_session(args.allow_dev_session)
        .with_unclassified_policy(policy);

    match (&args.session_secret, &args.identity_public_key) {
        (Some(secret), Some(key)) => {
            let pem = load_pem(key)?;
            let mut identity = JwtIdentityVerifier::from_rsa_pem(pem.as_bytes())
                .context("invalid GOALKEEPER_IDENTITY_PUBLIC_KEY")?;
            if let Some(issuer) = &args.identity_issuer {
                identity = identity.with_issuer(issuer);
            }
            if let Some(audience) = &args.identity_audience {
                identity = identity.with_audience(audience);
            }
            config = config.with_trust_material(TrustMaterial::new(
                secret.clone(),
                Arc::new(identity),
            ));
        }
        (None, None) => {
            warn!("no trust material configured; session issuance and verification are disabled");
        }
        _ => anyhow::bail!("session secret and identity public key must be set together"),
    }

    Ok(config)
}

/// Verify over HTTP when a verify URL is configured, in-process otherwise.
///
/// # Errors
/// Returns an error if the HTTP client cannot be built.
pub fn session_probe(args: &Args, sessions: &Arc<SessionManager>) -> Result<Arc<dyn SessionProbe>> {
    let probe: Arc<dyn SessionProbe> = match &args.verify_url {
        Some(url) => {
            debug!("verifying sessions over HTTP at {url}");
            Arc::new(HttpSessionProbe::new(url.clone(), args.verify_timeout)?)
        }
        None => Arc::new(LocalSessionProbe::new(sessions.clone())),
    };
    Ok(probe)
}

/// # Errors
/// Returns an error if the generator client cannot be built.
pub fn goal_coach(args: &Args) -> Result<GoalCoach> {
    let Some(key) = &args.openai_api_key else {
        info!("no OpenAI API key configured; goal insights answer 501");
        return Ok(GoalCoach::default());
    };
    let generator = OpenAiGenerator::new(&args.openai_base_url, key.clone(), &args.openai_model)?;
    Ok(GoalCoach::new(Some(Arc::new(generator))))
}

/// Accept either PEM text or a path to a PEM file.
fn load_pem(value: &str) -> Result<String> {
    if value.contains("-----BEGIN") {
        return Ok(value.to_string());
    }
    fs::read_to_string(value)
        .with_context(|| format!("Failed to read identity public key: {value}"))
}

fn log_startup_args(args: &Args) {
    let entries = [
        ("listen", format!("tcp:{}", args.port)),
        ("production", args.production.to_string()),
        ("allow_dev_session", args.allow_dev_session.to_string()),
        ("deny_unclassified", args.deny_unclassified.to_string()),
        ("session_secret_set", args.session_secret.is_some().to_string()),
        (
            "identity_public_key_set",
            args.identity_public_key.is_some().to_string(),
        ),
        (
            "verify_url",
            args.verify_url
                .as_ref()
                .map_or_else(|| "in-process".to_string(), ToString::to_string),
        ),
        (
            "static_dir",
            args.static_dir
                .as_ref()
                .map_or_else(|| "n/a".to_string(), |dir| dir.display().to_string()),
        ),
        ("openai_api_key_set", args.openai_api_key.is_some().to_string()),
        ("openai_model", args.openai_model.clone()),
    ];

    for (name, value) in entries {
        debug!("startup {name}={value}");
    }
}
