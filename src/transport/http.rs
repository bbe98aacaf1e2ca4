use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::transport::{ApiRequest, Method, Transport, TransportError};

pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
const CLIENT_HEADER: &str = concat!("feedwire-rust-", env!("CARGO_PKG_VERSION"));

/// Error body shape used by the service.
#[derive(Debug, Deserialize)]
struct ServiceError {
    code: Option<i64>,
    detail: Option<String>,
}

pub struct HttpTransport {
    client: Client,
    base_url: Url,
    api_key: String,
    location: Option<String>,
}

impl HttpTransport {
    pub fn new(
        api_key: &str,
        location: Option<&str>,
        base_url: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .user_agent(CLIENT_HEADER)
            .build()?;

        let base_url = match base_url {
            Some(url) => Self::parse_base(url)?,
            None => Self::parse_base(&Self::default_base_url(location))?,
        };

        Ok(Self {
            client,
            base_url,
            api_key: api_key.to_string(),
            location: location.map(String::from),
        })
    }

    /// `https://{location}-api.stream-io-api.com/api/v1.0/`, or the global host.
    pub fn default_base_url(location: Option<&str>) -> String {
        match location {
            Some(location) if !location.is_empty() => {
                format!("https://{}-api.stream-io-api.com/api/v1.0/", location)
            }
            _ => "https://api.stream-io-api.com/api/v1.0/".to_string(),
        }
    }

    // Url::join drops the last segment unless the base ends in '/'.
    fn parse_base(url: &str) -> Result<Url, TransportError> {
        if url.ends_with('/') {
            Ok(Url::parse(url)?)
        } else {
            Ok(Url::parse(&format!("{}/", url))?)
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn auth_headers(request: &ApiRequest) -> Result<HeaderMap, TransportError> {
        let mut headers = HeaderMap::new();
        let signature = &request.signature;
        let (auth_type, credential) = if signature.is_jwt() {
            ("jwt", signature.token())
        } else {
            ("simple", signature.as_str())
        };

        headers.insert("stream-auth-type", HeaderValue::from_static(auth_type));
        headers.insert(AUTHORIZATION, HeaderValue::from_str(credential)?);
        headers.insert("x-stream-client", HeaderValue::from_static(CLIENT_HEADER));
        Ok(headers)
    }

    fn query_pairs(&self, request: &ApiRequest) -> Vec<(String, String)> {
        let mut pairs = vec![("api_key".to_string(), self.api_key.clone())];
        if let Some(location) = &self.location {
            pairs.push(("location".to_string(), location.clone()));
        }
        pairs.extend(request.query.to_pairs());
        pairs
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<Value, TransportError> {
        let headers = Self::auth_headers(&request)?;
        let url = self.base_url.join(&request.path)?;
        debug!("{} {}", request.method.as_str(), url);

        let builder = match request.method {
            Method::Get => self.client.get(url),
            Method::Post => self.client.post(url),
            Method::Delete => self.client.delete(url),
        };

        let mut builder = builder
            .headers(headers)
            .query(&self.query_pairs(&request));
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let parsed = serde_json::from_str::<ServiceError>(&text).ok();
            debug!("{} {} failed with {}", request.method.as_str(), request.path, status);
            return Err(TransportError::Api {
                status: status.as_u16(),
                code: parsed.as_ref().and_then(|e| e.code),
                detail: parsed.and_then(|e| e.detail),
                body: text,
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Object(Default::default()));
        }
        Ok(serde_json::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FeedIdentity;

    fn transport(base: Option<&str>) -> HttpTransport {
        HttpTransport::new("key", Some("us-east"), base, Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn test_default_base_url() {
        assert_eq!(
            HttpTransport::default_base_url(Some("eu-west")),
            "https://eu-west-api.stream-io-api.com/api/v1.0/"
        );
        assert_eq!(
            HttpTransport::default_base_url(None),
            "https://api.stream-io-api.com/api/v1.0/"
        );
    }

    #[test]
    fn test_base_override_gets_trailing_slash() {
        let transport = transport(Some("http://localhost:8000/api/v1.0"));
        let url = transport.base_url().join("feed/user/1/").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/api/v1.0/feed/user/1/");
    }

    #[test]
    fn test_simple_auth_headers() {
        let feed = FeedIdentity::new("user", "1", "secret").unwrap();
        let request = ApiRequest::new(Method::Get, "feed/user/1/", feed.signature());
        let headers = HttpTransport::auth_headers(&request).unwrap();
        assert_eq!(headers["stream-auth-type"], "simple");
        assert_eq!(headers[AUTHORIZATION], "user1 secret");
    }

    #[test]
    fn test_jwt_auth_headers() {
        let feed = FeedIdentity::new("user", "1", "h.p.s").unwrap();
        let request = ApiRequest::new(Method::Get, "feed/user/1/", feed.signature());
        let headers = HttpTransport::auth_headers(&request).unwrap();
        assert_eq!(headers["stream-auth-type"], "jwt");
        assert_eq!(headers[AUTHORIZATION], "h.p.s");
    }

    #[test]
    fn test_unencodable_token_fails_instead_of_dropping_auth() {
        let feed = FeedIdentity::new("user", "1", "sec\nret").unwrap();
        let request = ApiRequest::new(Method::Get, "feed/user/1/", feed.signature());
        assert!(matches!(
            HttpTransport::auth_headers(&request),
            Err(TransportError::InvalidHeader(_))
        ));
    }

    #[tokio::test]
    async fn test_send_rejects_unencodable_token_before_connecting() {
        // Nothing listens on the discard port; the header check must fail first.
        let transport = transport(Some("http://127.0.0.1:9/api/v1.0/"));
        let feed = FeedIdentity::new("user", "1", "sec\nret").unwrap();
        let request = ApiRequest::new(Method::Get, "feed/user/1/", feed.signature());
        assert!(matches!(
            transport.send(request).await,
            Err(TransportError::InvalidHeader(_))
        ));
    }

    #[test]
    fn test_query_pairs_lead_with_credentials() {
        let feed = FeedIdentity::new("user", "1", "secret").unwrap();
        let mut request = ApiRequest::new(Method::Get, "feed/user/1/", feed.signature());
        request.query.set("limit", 5i64);

        let pairs = transport(None).query_pairs(&request);
        assert_eq!(pairs[0], ("api_key".to_string(), "key".to_string()));
        assert_eq!(pairs[1], ("location".to_string(), "us-east".to_string()));
        assert_eq!(pairs[2], ("limit".to_string(), "5".to_string()));
    }
}
