//! Remote object dereferencing
//!
//! [`RemoteResolver`] is the boundary between the pipelines and the network.
//! Transport failures never leak out of it: lookups return `None` and
//! collection fetches return `NotFetchable`.

use async_trait::async_trait;
use serde_json::Value;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::FederationConfig;
use crate::data::{Database, ShadowObject};
use crate::error::AppError;

/// `Accept` header sent on every dereference
pub const ACTIVITY_ACCEPT: &str =
    "application/activity+json, application/ld+json; profile=\"https://www.w3.org/ns/activitystreams\"";

const MAX_REDIRECTS: usize = 5;
const MAX_COLLECTION_PAGES: usize = 20;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteResolver: Send + Sync {
    /// Dereference a URI. `None` when unreachable or not an ActivityPub document.
    async fn fetch_remote_object(&self, uri: &str) -> Option<Value>;

    /// Dereference a URI and persist it as a shadow object.
    async fn fetch_and_store_remote_object(
        &self,
        uri: &str,
    ) -> Result<Option<ShadowObject>, AppError>;

    /// Member URIs of a (possibly paged) followers collection.
    ///
    /// # Errors
    /// `NotFetchable` when the collection itself cannot be retrieved
    async fn get_followers_collection(&self, url: &str) -> Result<Vec<String>, AppError>;
}

fn is_disallowed_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_multicast()
                || v4.is_unspecified()
        }
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_unique_local()
                || v6.is_unicast_link_local()
                || v6.is_multicast()
                || v6.is_unspecified()
        }
    }
}

pub(crate) fn is_disallowed_host(host: &str) -> bool {
    let normalized = host
        .trim_start_matches('[')
        .trim_end_matches(']')
        .trim_end_matches('.')
        .to_ascii_lowercase();
    if normalized == "localhost" || normalized.ends_with(".localhost") {
        return true;
    }

    normalized
        .parse::<IpAddr>()
        .map(is_disallowed_ip)
        .unwrap_or(false)
}

/// Reject non-HTTP(S) targets and, unless allowed, local/private hosts.
///
/// Hostnames are resolved so a public-looking name pointing at an internal
/// address is rejected as well.
async fn check_fetch_target(uri: &str, allow_private: bool) -> Result<url::Url, AppError> {
    let parsed =
        url::Url::parse(uri).map_err(|e| AppError::Validation(format!("Invalid URL: {}", e)))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(AppError::Validation(format!(
                "Unsupported URL scheme: {}",
                scheme
            )));
        }
    }

    let host = parsed
        .host_str()
        .ok_or_else(|| AppError::Validation("Missing host in URL".to_string()))?
        .to_string();

    if allow_private {
        return Ok(parsed);
    }

    if is_disallowed_host(&host) {
        return Err(AppError::Forbidden);
    }

    let port = parsed.port_or_known_default().unwrap_or(443);
    let lookup = tokio::net::lookup_host((host.as_str(), port))
        .await
        .map_err(|e| AppError::NotFetchable(format!("Failed to resolve {}: {}", host, e)))?;
    for addr in lookup {
        if is_disallowed_ip(addr.ip()) {
            return Err(AppError::Forbidden);
        }
    }

    Ok(parsed)
}

fn is_activity_content_type(content_type: &str) -> bool {
    let media_type = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    matches!(
        media_type.as_str(),
        "application/activity+json" | "application/ld+json" | "application/json"
    )
}

/// Build the outbound HTTP client shared by the resolver and delivery.
///
/// Redirects are followed up to a fixed depth and never into private
/// networks unless those are explicitly allowed.
pub fn build_http_client(config: &FederationConfig) -> Result<reqwest::Client, AppError> {
    let allow_private = config.allow_private_networks;
    let redirect_policy = reqwest::redirect::Policy::custom(move |attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            return attempt.error("too many redirects");
        }
        let blocked = attempt
            .url()
            .host_str()
            .map(is_disallowed_host)
            .unwrap_or(true);
        if blocked && !allow_private {
            return attempt.stop();
        }
        attempt.follow()
    });

    reqwest::Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(config.request_timeout())
        .connect_timeout(Duration::from_secs(5))
        .redirect(redirect_policy)
        .build()
        .map_err(AppError::HttpClient)
}

/// Resolver that dereferences over HTTP and stores shadows in SQLite
pub struct HttpResolver {
    http_client: reqwest::Client,
    db: Arc<Database>,
    allow_private_networks: bool,
}

impl HttpResolver {
    pub fn new(http_client: reqwest::Client, db: Arc<Database>, allow_private_networks: bool) -> Self {
        Self {
            http_client,
            db,
            allow_private_networks,
        }
    }

    async fn fetch_json(&self, uri: &str) -> Result<Value, AppError> {
        let target = check_fetch_target(uri, self.allow_private_networks).await?;

        let started = Instant::now();
        let response = self
            .http_client
            .get(target)
            .header(reqwest::header::ACCEPT, ACTIVITY_ACCEPT)
            .send()
            .await
            .map_err(|e| AppError::NotFetchable(format!("{}: {}", uri, e)))?;
        crate::metrics::FEDERATION_REQUEST_DURATION_SECONDS
            .with_label_values(&["fetch"])
            .observe(started.elapsed().as_secs_f64());

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::NotFetchable(format!("{}: HTTP {}", uri, status)));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !is_activity_content_type(&content_type) {
            return Err(AppError::NotFetchable(format!(
                "{}: unexpected content type {:?}",
                uri, content_type
            )));
        }

        let document: Value = response
            .json()
            .await
            .map_err(|e| AppError::NotFetchable(format!("{}: invalid JSON: {}", uri, e)))?;
        if !document.is_object() {
            return Err(AppError::NotFetchable(format!("{}: not a JSON object", uri)));
        }

        Ok(document)
    }
}

#[async_trait]
impl RemoteResolver for HttpResolver {
    async fn fetch_remote_object(&self, uri: &str) -> Option<Value> {
        match self.fetch_json(uri).await {
            Ok(document) => Some(document),
            Err(error) => {
                tracing::warn!(uri = %uri, error = %error, "Failed to dereference remote object");
                None
            }
        }
    }

    async fn fetch_and_store_remote_object(
        &self,
        uri: &str,
    ) -> Result<Option<ShadowObject>, AppError> {
        let Some(document) = self.fetch_remote_object(uri).await else {
            return Ok(None);
        };
        let Some(object) = ShadowObject::from_document(&document) else {
            tracing::warn!(uri = %uri, "Remote object has no id");
            return Ok(None);
        };
        if object.uri != uri.trim() {
            tracing::warn!(uri = %uri, claimed = %object.uri, "Remote object id does not match its URI");
            return Ok(None);
        }

        self.db.upsert_object(&object).await?;
        self.db.get_object_by_uri(&object.uri).await
    }

    async fn get_followers_collection(&self, url: &str) -> Result<Vec<String>, AppError> {
        let collection = self.fetch_json(url).await.map_err(|error| {
            tracing::warn!(url = %url, error = %error, "Failed to fetch followers collection");
            match error {
                AppError::NotFetchable(reason) => AppError::NotFetchable(reason),
                other => AppError::NotFetchable(other.to_string()),
            }
        })?;

        let mut members = collection_items(&collection);
        let mut next = match collection.get("first") {
            Some(Value::Object(_)) => {
                let page = &collection["first"];
                members.extend(collection_items(page));
                page.get("next").and_then(crate::federation::first_id)
            }
            Some(first) => crate::federation::first_id(first),
            None => None,
        };

        let mut pages = 0;
        while let Some(page_url) = next.take() {
            pages += 1;
            if pages > MAX_COLLECTION_PAGES {
                tracing::warn!(url = %url, "Followers collection exceeds page limit, truncating");
                break;
            }
            // A page that fails mid-way keeps what was already collected
            let Some(page) = self.fetch_remote_object(&page_url).await else {
                break;
            };
            members.extend(collection_items(&page));
            next = page
                .get("next")
                .and_then(crate::federation::first_id)
                .filter(|candidate| candidate != &page_url);
        }

        let mut seen = std::collections::HashSet::new();
        members.retain(|member| seen.insert(member.clone()));
        Ok(members)
    }
}

/// Items of a collection or collection page, as URIs.
///
/// Accepts `orderedItems` or `items`, each entry a string or `{id}`.
fn collection_items(collection: &Value) -> Vec<String> {
    let items = collection
        .get("orderedItems")
        .or_else(|| collection.get("items"));

    match items {
        Some(Value::Array(entries)) => entries
            .iter()
            .filter_map(crate::federation::first_id)
            .collect(),
        Some(single) => crate::federation::first_id(single).into_iter().collect(),
        None => Vec::new(),
    }
}
