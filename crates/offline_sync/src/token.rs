//! Anti-forgery token sources.

use std::sync::RwLock;

/// Default name of the cookie carrying the token
pub const DEFAULT_CSRF_COOKIE: &str = "csrftoken";

/// Supplies the anti-forgery token sent with every sync request
pub trait TokenSource: Send + Sync {
    /// Current token, `None` if there is none
    fn token(&self) -> Option<String>;
}

/// Token read from a `Cookie` header string
///
/// The cookie string can be replaced at runtime, e.g. after a new login.
#[derive(Debug)]
pub struct CookieToken {
    cookies: RwLock<String>,
    name: String,
}

impl CookieToken {
    /// Read the token from the `csrftoken` cookie
    pub fn new(cookies: impl Into<String>) -> Self {
        Self::with_name(cookies, DEFAULT_CSRF_COOKIE)
    }

    /// Read the token from a differently named cookie
    pub fn with_name(cookies: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            cookies: RwLock::new(cookies.into()),
            name: name.into(),
        }
    }

    /// Replace the cookie string
    pub fn set_cookies(&self, cookies: impl Into<String>) {
        match self.cookies.write() {
            Ok(mut guard) => *guard = cookies.into(),
            Err(poisoned) => *poisoned.into_inner() = cookies.into(),
        }
    }
}

impl TokenSource for CookieToken {
    fn token(&self) -> Option<String> {
        let cookies = match self.cookies.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        cookie_value(&cookies, &self.name)
    }
}

/// Find a cookie value in a `name=value; other=value` string
pub fn cookie_value(cookies: &str, name: &str) -> Option<String> {
    cookies
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim().to_string())
}

/// Fixed token, mainly for tests
#[derive(Clone, Debug, Default)]
pub struct StaticToken(Option<String>);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Some(token.into()))
    }

    /// A source that never has a token
    pub fn none() -> Self {
        Self(None)
    }
}

impl TokenSource for StaticToken {
    fn token(&self) -> Option<String> {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cookie_lookup() {
        let cookies = "sessionid=abc; csrftoken=t0k3n; theme=dark";
        assert_eq!(cookie_value(cookies, "csrftoken").as_deref(), Some("t0k3n"));
        assert_eq!(cookie_value(cookies, "theme").as_deref(), Some("dark"));
        assert_eq!(cookie_value(cookies, "missing"), None);
    }

    #[test]
    fn test_cookie_name_must_match_exactly() {
        assert_eq!(cookie_value("xcsrftoken=nope", "csrftoken"), None);
        assert_eq!(cookie_value("", "csrftoken"), None);
    }

    #[test]
    fn test_cookie_token_updates() {
        let source = CookieToken::new("sessionid=abc");
        assert_eq!(source.token(), None);

        source.set_cookies("csrftoken=fresh");
        assert_eq!(source.token().as_deref(), Some("fresh"));
    }

    #[test]
    fn test_static_token() {
        assert_eq!(StaticToken::new("t").token().as_deref(), Some("t"));
        assert_eq!(StaticToken::none().token(), None);
    }
}
