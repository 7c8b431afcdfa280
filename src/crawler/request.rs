use std::collections::BTreeMap;
use url::Url;

/// HTTP method of a crawl request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

/// A request for the fetcher to execute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    /// Extra headers on top of the client defaults
    pub headers: Vec<(String, String)>,
    /// Pre-encoded request body
    pub body: Option<String>,
    /// Link depth from the start URLs
    pub depth: u32,
}

impl Request {
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::Get,
            url,
            headers: Vec::new(),
            body: None,
            depth: 0,
        }
    }

    /// A form-encoded POST
    pub fn post_form<'a>(url: Url, fields: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields)
            .finish();

        Self {
            method: Method::Post,
            url,
            headers: vec![(
                "Content-Type".to_string(),
                "application/x-www-form-urlencoded".to_string(),
            )],
            body: Some(body),
            depth: 0,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }

    /// Case-insensitive header lookup (last value wins)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .rev()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Sets a header, replacing any existing value
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|(key, _)| !key.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.into()));
    }

    /// Identity used for request-level dedup in the frontier
    pub fn fingerprint(&self) -> String {
        format!(
            "{} {} {}",
            self.method.as_str(),
            self.url,
            self.body.as_deref().unwrap_or("")
        )
    }
}

/// What the fetcher hands back for a request
#[derive(Debug, Clone)]
pub struct Response {
    /// Final URL after redirects
    pub url: Url,
    /// URL originally requested
    pub requested_url: Url,
    pub status: u16,
    /// Response headers in arrival order; `Set-Cookie` from every redirect hop included
    pub headers: Vec<(String, String)>,
    pub body: String,
    /// Headers the request was sent with
    pub request_headers: BTreeMap<String, String>,
    pub depth: u32,
}

impl Response {
    /// Case-insensitive header lookup (first value)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Every `Set-Cookie` header value, in order
    pub fn set_cookies(&self) -> impl Iterator<Item = &str> {
        self.headers
            .iter()
            .filter(|(key, _)| key.eq_ignore_ascii_case("set-cookie"))
            .map(|(_, value)| value.as_str())
    }

    pub fn content_type(&self) -> &str {
        self.header("content-type").unwrap_or("")
    }

    pub fn is_html(&self) -> bool {
        let content_type = self.content_type();
        content_type.is_empty() || content_type.contains("text/html")
    }

    pub fn is_json(&self) -> bool {
        self.content_type().contains("json")
    }
}
