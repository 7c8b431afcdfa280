//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building the HTTP client with the configured user agent and timeout
//! - Manual redirect handling, carrying cookies set on intermediate hops
//! - Recording the headers a request was sent with

use crate::auth::CookieJar;
use crate::config::CrawlerConfig;
use crate::crawler::request::{Method, Request, Response};
use crate::{Result, SweepError};
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client, StatusCode};
use std::collections::BTreeMap;
use std::time::Duration;

/// Maximum redirect hops followed for one request
pub const MAX_REDIRECTS: usize = 10;

/// Executes crawl requests
///
/// The session and the coordinator only ever talk to this trait, so tests
/// can substitute scripted responses for a live server.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<Response>;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The crawler configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &CrawlerConfig) -> std::result::Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::none()) // Handle redirects manually
        .gzip(true)
        .brotli(true)
        .build()
}

/// [`PageFetcher`] over a live `reqwest` client
pub struct HttpFetcher {
    client: Client,
    user_agent: String,
}

impl HttpFetcher {
    pub fn new(config: &CrawlerConfig) -> Result<Self> {
        Ok(Self {
            client: build_http_client(config)?,
            user_agent: config.user_agent.clone(),
        })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    async fn send_once(&self, request: &Request) -> Result<reqwest::Response> {
        let mut builder = match request.method {
            Method::Get => self.client.get(request.url.clone()),
            Method::Post => self.client.post(request.url.clone()),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        builder.send().await.map_err(|source| SweepError::Http {
            url: request.url.to_string(),
            source,
        })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    /// Fetches a request, following up to [`MAX_REDIRECTS`] redirects
    ///
    /// # Request Flow
    ///
    /// 1. Send the request with its headers and body
    /// 2. On a 3xx with `Location`, record its `Set-Cookie` headers, add
    ///    those cookies to the next hop and follow
    ///    - 301/302/303 continue as a bodiless GET
    ///    - 307/308 repeat the method and body
    /// 3. Return the final response with every hop's `Set-Cookie` merged in
    async fn fetch(&self, request: &Request) -> Result<Response> {
        let mut request_headers: BTreeMap<String, String> = request
            .headers
            .iter()
            .cloned()
            .collect();
        request_headers
            .entry("User-Agent".to_string())
            .or_insert_with(|| self.user_agent.clone());

        let mut hop_cookies = CookieJar::new();
        if let Some(cookie) = request.header("Cookie") {
            for pair in cookie.split(';') {
                hop_cookies.store(&format!("{}; Path=/", pair.trim()), &request.url);
            }
        }

        let mut current = request.clone();
        let mut carried_set_cookies: Vec<(String, String)> = Vec::new();

        for _ in 0..=MAX_REDIRECTS {
            let response = self.send_once(&current).await?;
            let status = response.status();

            let location = response
                .headers()
                .get(reqwest::header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);

            let headers: Vec<(String, String)> = response
                .headers()
                .iter()
                .filter_map(|(name, value)| {
                    value
                        .to_str()
                        .ok()
                        .map(|v| (name.as_str().to_string(), v.to_string()))
                })
                .collect();

            match (status.is_redirection(), location) {
                (true, Some(location)) => {
                    let next_url = current.url.join(&location)?;
                    tracing::debug!("Redirect {} -> {} ({})", current.url, next_url, status);

                    for (name, value) in &headers {
                        if name.eq_ignore_ascii_case("set-cookie") {
                            hop_cookies.store(value, &current.url);
                            carried_set_cookies.push((name.clone(), value.clone()));
                        }
                    }

                    current = redirect_request(&current, next_url, status);
                    hop_cookies.decorate(&mut current);
                }
                _ => {
                    let final_url = response.url().clone();
                    let body = response.text().await.map_err(|source| SweepError::Http {
                        url: final_url.to_string(),
                        source,
                    })?;

                    if let Some(cookie) = current.header("Cookie") {
                        request_headers.insert("Cookie".to_string(), cookie.to_string());
                    }

                    let mut all_headers = carried_set_cookies;
                    all_headers.extend(headers);

                    return Ok(Response {
                        url: final_url,
                        requested_url: request.url.clone(),
                        status: status.as_u16(),
                        headers: all_headers,
                        body,
                        request_headers,
                        depth: request.depth,
                    });
                }
            }
        }

        Err(SweepError::RedirectLimit {
            url: request.url.to_string(),
        })
    }
}

/// The request for the next redirect hop
fn redirect_request(previous: &Request, url: url::Url, status: StatusCode) -> Request {
    let keep_method = matches!(
        status,
        StatusCode::TEMPORARY_REDIRECT | StatusCode::PERMANENT_REDIRECT
    );

    if keep_method {
        let mut next = previous.clone();
        next.url = url;
        next
    } else {
        let mut next = Request::get(url).with_depth(previous.depth);
        next.headers = previous
            .headers
            .iter()
            .filter(|(name, _)| !name.eq_ignore_ascii_case("content-type"))
            .cloned()
            .collect();
        next
    }
}
