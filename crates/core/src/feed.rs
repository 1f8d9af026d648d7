use crate::collection::clean_endpoint;
use crate::traits::FeedSource;
use crate::{FeedResponse, IngestError, QueryParams};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use url::Url;

pub const DEFAULT_FEED_URL: &str = "https://api.twitter.com/1.1/";

/// Feed API over plain HTTP GET. `statuses/user_timeline` is served from
/// `<base>statuses/user_timeline.json`.
pub struct HttpFeedClient {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpFeedClient {
    pub fn new(base_url: &str) -> Result<Self, IngestError> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            client: Client::new(),
            base_url,
            token: None,
        })
    }

    /// Bearer token sent as-is with every request.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn resource_url(&self, endpoint: &str) -> Result<Url, IngestError> {
        let endpoint = clean_endpoint(endpoint);
        if endpoint.is_empty() {
            return Err(IngestError::Configuration(
                "feed endpoint is empty".to_string(),
            ));
        }
        Ok(self.base_url.join(&format!("{endpoint}.json"))?)
    }
}

#[async_trait]
impl FeedSource for HttpFeedClient {
    async fn fetch(&self, endpoint: &str, query: &QueryParams) -> Result<FeedResponse, IngestError> {
        let mut request = self.client.get(self.resource_url(endpoint)?);
        if !query.is_empty() {
            request = request.query(query.pairs());
        }
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        parse_feed_body(endpoint, status.is_success(), status.as_str(), &body)
    }
}

fn parse_feed_body(
    endpoint: &str,
    success: bool,
    status: &str,
    body: &str,
) -> Result<FeedResponse, IngestError> {
    if success && body.trim().is_empty() {
        return Ok(FeedResponse::Records(Value::Array(Vec::new())));
    }

    let raw: Value = serde_json::from_str(body).map_err(|error| IngestError::FeedResponse {
        endpoint: endpoint.to_string(),
        details: format!("status {status}, body is not json: {error}"),
    })?;

    match FeedResponse::classify(raw) {
        FeedResponse::Records(_) if !success => Err(IngestError::FeedResponse {
            endpoint: endpoint.to_string(),
            details: format!("status {status} without error payload"),
        }),
        classified => Ok(classified),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resource_url_uses_clean_endpoint() -> Result<(), Box<dyn std::error::Error>> {
        let client = HttpFeedClient::new("https://api.example.com/1.1")?;
        assert_eq!(
            client.resource_url("//statuses/user_timeline/")?.as_str(),
            "https://api.example.com/1.1/statuses/user_timeline.json"
        );
        assert!(matches!(
            client.resource_url("///"),
            Err(IngestError::Configuration(_))
        ));
        Ok(())
    }

    #[test]
    fn error_payload_passes_through_on_failure_status() -> Result<(), Box<dyn std::error::Error>> {
        let body = r#"{"errors":[{"code":215,"message":"Bad Authentication data."}]}"#;
        let parsed = parse_feed_body("statuses/user_timeline", false, "400", body)?;
        assert_eq!(
            parsed,
            FeedResponse::ErrorPayload(json!({
                "errors": [{"code": 215, "message": "Bad Authentication data."}]
            }))
        );
        Ok(())
    }

    #[test]
    fn records_and_empty_bodies_parse() -> Result<(), Box<dyn std::error::Error>> {
        let parsed = parse_feed_body("statuses/user_timeline", true, "200", r#"[{"id_str":"1"}]"#)?;
        assert_eq!(parsed, FeedResponse::Records(json!([{"id_str": "1"}])));

        let empty = parse_feed_body("statuses/user_timeline", true, "200", "  ")?;
        assert_eq!(empty, FeedResponse::Records(json!([])));
        Ok(())
    }

    #[test]
    fn unexpected_bodies_are_errors() {
        assert!(matches!(
            parse_feed_body("statuses/user_timeline", false, "503", "<html>down</html>"),
            Err(IngestError::FeedResponse { .. })
        ));
        assert!(matches!(
            parse_feed_body("statuses/user_timeline", false, "404", r#"{"error":"nope"}"#),
            Err(IngestError::FeedResponse { .. })
        ));
    }
}
