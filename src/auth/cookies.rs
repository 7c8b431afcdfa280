use crate::crawler::{Request, Response};
use cookie::Cookie;
use cookie_store::CookieStore;
use url::Url;

/// Cookies handed out by the application under test
///
/// Replayed on every outgoing request so that both the crawler and the
/// checker (through the effective request headers) see the same session.
/// Expiry and `Domain`/`Path` scoping follow the cookie rules of the store.
#[derive(Debug, Clone, Default)]
pub struct CookieJar {
    store: CookieStore,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records every `Set-Cookie` of a response
    pub fn store_from(&mut self, response: &Response) {
        for header in response.set_cookies() {
            self.store(header, &response.url);
        }
    }

    /// Records one `Set-Cookie` value received from `url`
    ///
    /// An expired cookie removes the stored one of the same name.
    pub fn store(&mut self, set_cookie: &str, url: &Url) {
        if let Err(e) = self.store.parse(set_cookie, url) {
            tracing::debug!("Ignoring cookie from {}: {}", url, e);
        }
    }

    /// Value of the cookie called `name` that would be sent to `url`
    pub fn get(&self, name: &str, url: &Url) -> Option<&str> {
        self.store
            .matches(url)
            .into_iter()
            .find(|cookie| cookie.name() == name)
            .map(|cookie| cookie.value())
    }

    /// Value for a `Cookie` request header to `url`, or `None` when nothing applies
    pub fn header_value(&self, url: &Url) -> Option<String> {
        let mut pairs: Vec<(&str, &str)> = self.store.get_request_values(url).collect();
        if pairs.is_empty() {
            return None;
        }

        pairs.sort();
        Some(
            pairs
                .iter()
                .map(|(name, value)| format!("{}={}", name, value))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    /// Sets the `Cookie` header of a request, or removes it when nothing applies
    pub fn decorate(&self, request: &mut Request) {
        match self.header_value(&request.url) {
            Some(value) => request.set_header("Cookie", value),
            None => request
                .headers
                .retain(|(name, _)| !name.eq_ignore_ascii_case("cookie")),
        }
    }

    pub fn len(&self) -> usize {
        self.store.iter_unexpired().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Value of the last cookie called `name` among a response's `Set-Cookie` headers
pub fn last_cookie_value(response: &Response, name: &str) -> Option<String> {
    response
        .set_cookies()
        .filter_map(|header| Cookie::parse(header).ok())
        .filter(|cookie| cookie.name() == name && !cookie.value().is_empty())
        .last()
        .map(|cookie| cookie.value().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn url(path: &str) -> Url {
        Url::parse("http://localhost:8000").unwrap().join(path).unwrap()
    }

    fn response_with_cookies(cookies: &[&str]) -> Response {
        Response {
            url: url("/login"),
            requested_url: url("/login"),
            status: 200,
            headers: cookies
                .iter()
                .map(|c| ("Set-Cookie".to_string(), c.to_string()))
                .collect(),
            body: String::new(),
            request_headers: BTreeMap::new(),
            depth: 0,
        }
    }

    #[test]
    fn test_last_cookie_wins() {
        let response = response_with_cookies(&[
            "csrftoken=first; Path=/",
            "sessionid=s1",
            "csrftoken=second; Path=/",
        ]);
        assert_eq!(
            last_cookie_value(&response, "csrftoken").as_deref(),
            Some("second")
        );
        assert_eq!(last_cookie_value(&response, "missing"), None);
    }

    #[test]
    fn test_jar_header_value() {
        let mut jar = CookieJar::new();
        jar.store_from(&response_with_cookies(&["sessionid=s1; HttpOnly", "csrftoken=t"]));
        assert_eq!(
            jar.header_value(&url("/dashboard")).as_deref(),
            Some("csrftoken=t; sessionid=s1")
        );
        assert_eq!(jar.get("csrftoken", &url("/dashboard")), Some("t"));
    }

    #[test]
    fn test_jar_deletes_max_age_zero() {
        let mut jar = CookieJar::new();
        jar.store("sessionid=s1; Path=/", &url("/"));
        jar.store("sessionid=; Max-Age=0; Path=/", &url("/"));
        assert!(jar.is_empty());
        assert_eq!(jar.header_value(&url("/")), None);
    }

    #[test]
    fn test_jar_drops_expired_replacement() {
        let mut jar = CookieJar::new();
        jar.store("sessionid=s1; Path=/", &url("/"));
        jar.store(
            "sessionid=stale; Expires=Thu, 01 Jan 1970 00:00:00 GMT; Path=/",
            &url("/"),
        );
        assert_eq!(jar.header_value(&url("/dashboard")), None);
        assert_eq!(jar.get("sessionid", &url("/dashboard")), None);
    }

    #[test]
    fn test_jar_respects_path_scope() {
        let mut jar = CookieJar::new();
        jar.store("admin_only=x; Path=/admin", &url("/admin/"));
        jar.store("sessionid=s1; Path=/", &url("/"));

        assert_eq!(
            jar.header_value(&url("/dashboard")).as_deref(),
            Some("sessionid=s1")
        );
        assert_eq!(
            jar.header_value(&url("/admin/users")).as_deref(),
            Some("admin_only=x; sessionid=s1")
        );
    }

    #[test]
    fn test_jar_respects_host_scope() {
        let mut jar = CookieJar::new();
        jar.store("sessionid=s1; Path=/", &url("/"));

        let elsewhere = Url::parse("http://elsewhere.test/dashboard").unwrap();
        assert_eq!(jar.header_value(&elsewhere), None);
    }

    #[test]
    fn test_decorate_request() {
        let mut jar = CookieJar::new();
        jar.store("sessionid=s1; Path=/", &url("/"));
        let mut request = Request::get(url("/dashboard"));
        jar.decorate(&mut request);
        assert_eq!(request.header("Cookie"), Some("sessionid=s1"));
    }
}
