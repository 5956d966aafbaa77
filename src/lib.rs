//! # Goalkeeper (session gate for the goal and habit tracker)
//!
//! `goalkeeper` owns the one piece of the tracker that is not plain CRUD: the
//! decision, per request, of whether a visitor may see protected content.
//!
//! ## Two gates
//!
//! - **Request gate** ([`gate`]): runs in front of every non-API response,
//!   reads the `__session` / `__dev_session` cookies, verifies them against
//!   the session verifier and either lets the request through or redirects.
//!   It never fails open: a verifier error is "not signed in".
//! - **Bootstrap guard** ([`guard`]): the client-side counterpart that
//!   re-checks the identity provider's live state after client-rendered
//!   navigations, which never reach the server.
//!
//! Both read the same constants and path lists from [`session`], so the two
//! layers cannot drift apart.
//!
//! ## Dev bypass
//!
//! A `__dev_session` marker cookie stands in for a real session during local
//! development. It is honored only when the bypass is opted in **and** the
//! runtime is not production, and that production check is made in more than
//! one place.

pub mod api;
pub mod cli;
pub mod gate;
pub mod guard;
pub mod insights;
pub mod session;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
