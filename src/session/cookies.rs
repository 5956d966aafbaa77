//! Reading and writing the two session cookies.

use axum::http::{
    header::{InvalidHeaderValue, COOKIE, SET_COOKIE},
    HeaderMap, HeaderValue,
};
use tracing::error;

use super::{
    DEV_SESSION_COOKIE_NAME, DEV_SESSION_SENTINEL, SESSION_COOKIE_NAME, SESSION_TTL_SECONDS,
};

/// Session cookie values presented by a request. Empty values count as absent.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SessionCookies {
    pub session: Option<String>,
    pub dev_session: Option<String>,
}

impl SessionCookies {
    /// Collect session cookies from every `Cookie` header of a request.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut cookies = Self::default();
        for value in headers.get_all(COOKIE) {
            if let Ok(value) = value.to_str() {
                cookies.absorb(value);
            }
        }
        cookies
    }

    /// Parse a raw `Cookie` header value.
    #[must_use]
    pub fn parse(header: &str) -> Self {
        let mut cookies = Self::default();
        cookies.absorb(header);
        cookies
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.session.is_none() && self.dev_session.is_none()
    }

    fn absorb(&mut self, header: &str) {
        for pair in header.split(';') {
            let Some((key, value)) = pair.trim().split_once('=') else {
                continue;
            };
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            let slot = match key.trim() {
                SESSION_COOKIE_NAME => &mut self.session,
                DEV_SESSION_COOKIE_NAME => &mut self.dev_session,
                _ => continue,
            };
            // First occurrence wins, like browsers sending the most specific path first.
            if slot.is_none() {
                *slot = Some(value.to_string());
            }
        }
    }
}

/// `Set-Cookie` value carrying a freshly signed session token.
///
/// # Errors
///
/// Returns an error if the token contains bytes not allowed in a header.
pub fn session_cookie(token: &str, secure: bool) -> Result<HeaderValue, InvalidHeaderValue> {
    build_cookie(SESSION_COOKIE_NAME, token, SESSION_TTL_SECONDS, secure)
}

/// `Set-Cookie` value for the dev bypass marker. Never `Secure`.
///
/// # Errors
///
/// Infallible in practice; the value is a fixed ASCII string.
pub fn dev_session_cookie() -> Result<HeaderValue, InvalidHeaderValue> {
    build_cookie(
        DEV_SESSION_COOKIE_NAME,
        DEV_SESSION_SENTINEL,
        SESSION_TTL_SECONDS,
        false,
    )
}

/// Two `Set-Cookie` values that expire both session cookies immediately.
///
/// # Errors
///
/// Infallible in practice; the values are fixed ASCII strings.
pub fn cleared_cookies(secure: bool) -> Result<[HeaderValue; 2], InvalidHeaderValue> {
    Ok([
        build_cookie(SESSION_COOKIE_NAME, "", 0, secure)?,
        build_cookie(DEV_SESSION_COOKIE_NAME, "", 0, false)?,
    ])
}

/// Append both clearing `Set-Cookie` headers to a response.
pub fn append_cleared_cookies(headers: &mut HeaderMap, secure: bool) {
    match cleared_cookies(secure) {
        Ok(values) => {
            for value in values {
                headers.append(SET_COOKIE, value);
            }
        }
        Err(err) => error!("Failed to build clearing cookies: {err}"),
    }
}

fn build_cookie(
    name: &str,
    value: &str,
    max_age: i64,
    secure: bool,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie =
        format!("{name}={value}; Path=/; HttpOnly; SameSite=Strict; Max-Age={max_age}");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_reads_both_cookies() {
        let cookies = SessionCookies::parse("theme=dark; __session=abc.def.ghi; __dev_session=1");
        assert_eq!(cookies.session.as_deref(), Some("abc.def.ghi"));
        assert_eq!(cookies.dev_session.as_deref(), Some("1"));
    }

    #[test]
    fn parse_ignores_empty_and_unknown_values() {
        let cookies = SessionCookies::parse("__session=; other=x; broken");
        assert!(cookies.is_empty());
    }

    #[test]
    fn from_headers_merges_multiple_cookie_headers() {
        let mut headers = HeaderMap::new();
        headers.append(COOKIE, HeaderValue::from_static("__session=token"));
        headers.append(COOKIE, HeaderValue::from_static("__dev_session=1"));
        let cookies = SessionCookies::from_headers(&headers);
        assert_eq!(cookies.session.as_deref(), Some("token"));
        assert_eq!(cookies.dev_session.as_deref(), Some("1"));
    }

    #[test]
    fn session_cookie_is_strict_http_only_and_secure_in_production() -> anyhow::Result<()> {
        let cookie = session_cookie("token", true)?;
        let cookie = cookie.to_str()?;
        assert!(cookie.starts_with("__session=token;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Strict"));
        assert!(cookie.contains("Path=/"));
        assert!(cookie.contains("Max-Age=1209600"));
        assert!(cookie.ends_with("; Secure"));

        let cookie = session_cookie("token", false)?;
        assert!(!cookie.to_str()?.contains("Secure"));
        Ok(())
    }

    #[test]
    fn dev_cookie_is_never_secure() -> anyhow::Result<()> {
        let cookie = dev_session_cookie()?;
        let cookie = cookie.to_str()?;
        assert!(cookie.starts_with("__dev_session=1;"));
        assert!(!cookie.contains("Secure"));
        Ok(())
    }

    #[test]
    fn cleared_cookies_expire_both_names() -> anyhow::Result<()> {
        let [session, dev] = cleared_cookies(true)?;
        assert_eq!(
            session.to_str()?,
            "__session=; Path=/; HttpOnly; SameSite=Strict; Max-Age=0; Secure"
        );
        assert_eq!(
            dev.to_str()?,
            "__dev_session=; Path=/; HttpOnly; SameSite=Strict; Max-Age=0"
        );
        Ok(())
    }

    #[test]
    fn append_cleared_cookies_adds_two_headers() {
        let mut headers = HeaderMap::new();
        append_cleared_cookies(&mut headers, false);
        assert_eq!(headers.get_all(SET_COOKIE).iter().count(), 2);
    }
}
