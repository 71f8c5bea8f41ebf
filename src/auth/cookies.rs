use std::time::Duration;

use axum::http::{header, HeaderMap, HeaderName};

use super::{claims::TokenKind, dto::TokenPair, jwt::TokenSigner};

pub const ACCESS_COOKIE: &str = "accessToken";
pub const REFRESH_COOKIE: &str = "refreshToken";

/// Attributes applied to every session cookie, on set and on clear alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CookiePolicy {
    pub http_only: bool,
    pub secure: bool,
    pub same_site: &'static str,
    pub path: &'static str,
}

pub const SESSION_COOKIES: CookiePolicy = CookiePolicy {
    http_only: true,
    secure: true,
    same_site: "Strict",
    path: "/",
};

impl CookiePolicy {
    /// Build a `Set-Cookie` header value.
    pub fn set(&self, name: &str, value: &str, max_age: Duration) -> String {
        let mut parts = vec![
            format!("{name}={value}"),
            format!("Max-Age={}", max_age.as_secs()),
            format!("Path={}", self.path),
            format!("SameSite={}", self.same_site),
        ];
        if self.http_only {
            parts.push("HttpOnly".to_string());
        }
        if self.secure {
            parts.push("Secure".to_string());
        }
        parts.join("; ")
    }

    pub fn clear(&self, name: &str) -> String {
        self.set(name, "", Duration::ZERO)
    }

    /// Both session cookies for a freshly minted pair.
    pub fn session(&self, tokens: &TokenPair, signer: &TokenSigner) -> [(HeaderName, String); 2] {
        [
            (
                header::SET_COOKIE,
                self.set(
                    ACCESS_COOKIE,
                    &tokens.access_token,
                    signer.ttl(TokenKind::Access),
                ),
            ),
            (
                header::SET_COOKIE,
                self.set(
                    REFRESH_COOKIE,
                    &tokens.refresh_token,
                    signer.ttl(TokenKind::Refresh),
                ),
            ),
        ]
    }

    pub fn cleared(&self) -> [(HeaderName, String); 2] {
        [
            (header::SET_COOKIE, self.clear(ACCESS_COOKIE)),
            (header::SET_COOKIE, self.clear(REFRESH_COOKIE)),
        ]
    }
}

/// Read a cookie value from the request's `Cookie` headers.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}

/// Token from an `Authorization: Bearer` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let auth = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    auth.strip_prefix("Bearer ")
        .or_else(|| auth.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use axum::http::HeaderValue;

    fn attributes(cookie: &str) -> Vec<&str> {
        let mut attrs: Vec<&str> = cookie
            .split("; ")
            .skip(1)
            .filter(|a| !a.starts_with("Max-Age="))
            .collect();
        attrs.sort();
        attrs
    }

    #[test]
    fn set_cookie_carries_policy() {
        let header = SESSION_COOKIES.set(REFRESH_COOKIE, "tok", Duration::from_secs(60));
        assert!(header.starts_with("refreshToken=tok; "));
        assert!(header.contains("Max-Age=60"));
        assert!(header.contains("HttpOnly"));
        assert!(header.contains("Secure"));
        assert!(header.contains("SameSite=Strict"));
        assert!(header.contains("Path=/"));
    }

    #[test]
    fn clear_uses_same_attributes_as_set() {
        let set = SESSION_COOKIES.set(ACCESS_COOKIE, "tok", Duration::from_secs(60));
        let clear = SESSION_COOKIES.clear(ACCESS_COOKIE);
        assert!(clear.starts_with("accessToken=; Max-Age=0"));
        assert_eq!(attributes(&set), attributes(&clear));
    }

    #[test]
    fn session_cookies_use_token_lifetimes() {
        let signer = TokenSigner::new(&testing::jwt_config(), testing::fixed_clock());
        let pair = TokenPair {
            access_token: "a".into(),
            refresh_token: "r".into(),
        };
        let [(_, access), (_, refresh)] = SESSION_COOKIES.session(&pair, &signer);
        assert!(access.starts_with("accessToken=a;"));
        assert!(access.contains("Max-Age=900"));
        assert!(refresh.starts_with("refreshToken=r;"));
        assert!(refresh.contains("Max-Age=864000"));
    }

    #[test]
    fn reads_named_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; refreshToken=abc.def.ghi; accessToken=xyz"),
        );
        assert_eq!(read_cookie(&headers, REFRESH_COOKIE).as_deref(), Some("abc.def.ghi"));
        assert_eq!(read_cookie(&headers, ACCESS_COOKIE).as_deref(), Some("xyz"));
        assert_eq!(read_cookie(&headers, "session"), None);
        assert_eq!(read_cookie(&HeaderMap::new(), ACCESS_COOKIE), None);
    }

    #[test]
    fn reads_bearer_token() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer t0k"));
        assert_eq!(bearer_token(&headers).as_deref(), Some("t0k"));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic Zm9v"));
        assert_eq!(bearer_token(&headers), None);
    }
}
