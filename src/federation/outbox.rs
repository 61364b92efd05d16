//! Outbox pipeline
//!
//! Delivers a locally originated activity to every recipient inbox:
//! recipients are resolved from the addressing fields, the document is
//! normalized and serialized deterministically, and each inbox receives its
//! own signed POST.

use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;

use super::activity::{
    all_ids, canonical_json_string, embedded_object, first_id, is_public_address,
};
use super::jsonld::normalize;
use super::keys::KeyStore;
use super::signature::{compute_digest, sign_request};
use crate::config::FederationConfig;
use crate::data::{Actor, Database};
use crate::error::AppError;
use crate::jobs::OutboxJob;
use crate::service::ActorDirectory;

const ADDRESSING_FIELDS: [&str; 5] = ["to", "cc", "bto", "bcc", "audience"];

/// Result of a completed outbox job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboxOutcome {
    /// Every recipient inbox acknowledged the activity
    Completed {
        delivered_to: usize,
        /// Inboxes skipped because an earlier attempt already delivered
        already_delivered: usize,
    },
    /// Nothing to deliver
    Skipped { reason: String },
}

/// Per-inbox results of one fan-out
#[derive(Debug, Default)]
pub struct DeliveryReport {
    pub delivered: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl DeliveryReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Deterministic forms of an outbound activity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalActivity {
    /// Key-sorted JSON sent to every inbox
    pub body: String,
    /// RDFC-1.0 normalized N-Quads of the same document
    pub normalized: String,
}

impl CanonicalActivity {
    /// `SHA-256=<base64>` of the normalized dataset
    pub fn dataset_digest(&self) -> String {
        compute_digest(self.normalized.as_bytes())
    }
}

/// Canonicalize an outbound activity.
///
/// `bto` and `bcc` are removed, the document is normalized as a JSON-LD
/// dataset, and the body is serialized with object keys sorted at every
/// depth.
///
/// # Errors
/// `Canonicalization` unless the document is an object with `@context`,
/// an absolute `id`, a string `type` and an `actor`, and normalizes as
/// JSON-LD
pub fn canonicalize_activity(activity: &Value) -> Result<CanonicalActivity, AppError> {
    let Some(document) = activity.as_object() else {
        return Err(AppError::Canonicalization(
            "activity is not a JSON object".to_string(),
        ));
    };

    let context_ok = match document.get("@context") {
        Some(Value::String(_)) | Some(Value::Object(_)) => true,
        Some(Value::Array(entries)) => {
            !entries.is_empty()
                && entries
                    .iter()
                    .all(|entry| entry.is_string() || entry.is_object())
        }
        _ => false,
    };
    if !context_ok {
        return Err(AppError::Canonicalization(
            "missing or malformed @context".to_string(),
        ));
    }

    let id = document
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::Canonicalization("missing id".to_string()))?;
    let absolute = url::Url::parse(id)
        .map(|url| url.has_host())
        .unwrap_or(false);
    if !absolute {
        return Err(AppError::Canonicalization(format!(
            "id is not an absolute URI: {}",
            id
        )));
    }

    if !document.get("type").is_some_and(Value::is_string) {
        return Err(AppError::Canonicalization("missing type".to_string()));
    }
    if document.get("actor").and_then(first_id).is_none() {
        return Err(AppError::Canonicalization("missing actor".to_string()));
    }

    let mut stripped = document.clone();
    stripped.remove("bto");
    stripped.remove("bcc");
    let stripped = Value::Object(stripped);

    Ok(CanonicalActivity {
        normalized: normalize(&stripped)?,
        body: canonical_json_string(&stripped),
    })
}

/// POST a signed activity to one inbox.
///
/// # Errors
/// `TransientDelivery` for transport failures and non-2xx responses
pub async fn deliver_to_inbox(
    http_client: &reqwest::Client,
    inbox_uri: &str,
    body: &[u8],
    private_key_pem: &str,
    key_id: &str,
) -> Result<(), AppError> {
    let sig_headers = sign_request("POST", inbox_uri, body, private_key_pem, key_id)?;

    let started = Instant::now();
    let response = http_client
        .post(inbox_uri)
        .header("Host", sig_headers.host)
        .header("Date", sig_headers.date)
        .header("Content-Type", "application/activity+json")
        .header("Digest", sig_headers.digest)
        .header("Signature", sig_headers.signature)
        .body(body.to_vec())
        .send()
        .await;
    crate::metrics::FEDERATION_REQUEST_DURATION_SECONDS
        .with_label_values(&["deliver"])
        .observe(started.elapsed().as_secs_f64());

    let response = response.map_err(|e| AppError::TransientDelivery {
        inbox: inbox_uri.to_string(),
        reason: e.to_string(),
    })?;

    if !response.status().is_success() {
        return Err(AppError::TransientDelivery {
            inbox: inbox_uri.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    tracing::debug!(inbox = %inbox_uri, status = %response.status(), "Delivered activity");
    Ok(())
}

/// Outbound activity processor
pub struct OutboxProcessor {
    db: Arc<Database>,
    directory: Arc<ActorDirectory>,
    keys: Arc<dyn KeyStore>,
    http_client: reqwest::Client,
    concurrency: usize,
    prefer_shared_inbox: bool,
}

impl OutboxProcessor {
    pub fn new(
        db: Arc<Database>,
        directory: Arc<ActorDirectory>,
        keys: Arc<dyn KeyStore>,
        http_client: reqwest::Client,
        config: &FederationConfig,
    ) -> Self {
        Self {
            db,
            directory,
            keys,
            http_client,
            concurrency: config.delivery_concurrency.max(1),
            prefer_shared_inbox: config.prefer_shared_inbox,
        }
    }

    /// Deliver an outbox job.
    ///
    /// # Errors
    /// - `Canonicalization` when the activity cannot be normalized (terminal)
    /// - `PartialDelivery` when at least one inbox failed (retryable; inboxes
    ///   that succeeded are skipped on the next attempt)
    pub async fn process(&self, job: &OutboxJob) -> Result<OutboxOutcome, AppError> {
        let sender = self.directory.find_by_id(&job.actor_id).await?;
        if !sender.is_local {
            return Err(AppError::Forbidden);
        }

        let activity_uri = first_id(&job.activity["id"]).unwrap_or_default();
        let activity_type = super::activity::activity_type(&job.activity)
            .map(|kind| super::ActivityKind::from_type(kind).metric_label())
            .unwrap_or("Unknown");

        let inboxes = self.resolve_recipients(&sender, &job.activity).await?;
        if inboxes.is_empty() {
            tracing::info!(activity_uri = %activity_uri, "No recipients to deliver to");
            crate::metrics::ACTIVITIES_SENT
                .with_label_values(&[activity_type, "skipped"])
                .inc();
            return Ok(OutboxOutcome::Skipped {
                reason: "no recipients".to_string(),
            });
        }

        let canonical = canonicalize_activity(&job.activity)?;
        tracing::debug!(
            activity_uri = %activity_uri,
            dataset_digest = %canonical.dataset_digest(),
            "Activity normalized"
        );

        let delivered_before = self.db.get_delivered_inboxes(&activity_uri).await?;
        let (already, pending): (Vec<String>, Vec<String>) = inboxes
            .into_iter()
            .partition(|inbox| delivered_before.contains(inbox));

        if !already.is_empty() {
            tracing::debug!(
                activity_uri = %activity_uri,
                skipped = already.len(),
                "Skipping inboxes delivered by an earlier attempt"
            );
        }

        let private_key_pem = self.keys.private_key_pem(&sender.id).await?;
        let report = self
            .deliver_all(
                &activity_uri,
                canonical.body,
                pending,
                private_key_pem,
                sender.key_id(),
            )
            .await?;

        tracing::info!(
            activity_uri = %activity_uri,
            delivered = report.delivered.len(),
            failed = report.failed.len(),
            already_delivered = already.len(),
            "Outbox delivery finished"
        );

        if !report.is_complete() {
            crate::metrics::ACTIVITIES_SENT
                .with_label_values(&[activity_type, "partial"])
                .inc();
            return Err(AppError::PartialDelivery {
                delivered: report.delivered.len(),
                failed: report.failed.len(),
            });
        }

        crate::metrics::ACTIVITIES_SENT
            .with_label_values(&[activity_type, "completed"])
            .inc();
        Ok(OutboxOutcome::Completed {
            delivered_to: report.delivered.len(),
            already_delivered: already.len(),
        })
    }

    async fn deliver_all(
        &self,
        activity_uri: &str,
        body: String,
        inboxes: Vec<String>,
        private_key_pem: String,
        key_id: String,
    ) -> Result<DeliveryReport, AppError> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let body = Arc::new(body.into_bytes());
        let private_key_pem = Arc::new(private_key_pem);
        let key_id = Arc::new(key_id);

        let mut tasks = Vec::with_capacity(inboxes.len());
        for inbox in inboxes {
            let semaphore = semaphore.clone();
            let body = body.clone();
            let private_key_pem = private_key_pem.clone();
            let key_id = key_id.clone();
            let http_client = self.http_client.clone();

            tasks.push(tokio::spawn(async move {
                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => {
                        deliver_to_inbox(&http_client, &inbox, &body, &private_key_pem, &key_id)
                            .await
                    }
                    Err(e) => Err(AppError::Internal(e.into())),
                };
                (inbox, result)
            }));
        }

        let mut report = DeliveryReport::default();
        for task in futures::future::join_all(tasks).await {
            let (inbox, result) = task.map_err(|e| AppError::Internal(e.into()))?;
            match result {
                Ok(()) => {
                    crate::metrics::DELIVERIES_TOTAL
                        .with_label_values(&["success"])
                        .inc();
                    // Without a receipt a retry may deliver here again
                    if let Err(error) = self.db.insert_delivery_receipt(activity_uri, &inbox).await {
                        tracing::error!(
                            activity_uri = %activity_uri,
                            inbox = %inbox,
                            error = %error,
                            "Failed to record delivery receipt"
                        );
                    }
                    report.delivered.push(inbox);
                }
                Err(error) => {
                    crate::metrics::DELIVERIES_TOTAL
                        .with_label_values(&["failure"])
                        .inc();
                    tracing::warn!(inbox = %inbox, error = %error, "Delivery failed");
                    report.failed.push((inbox, error.to_string()));
                }
            }
        }

        Ok(report)
    }

    /// Inbox URLs an activity must be delivered to.
    ///
    /// Addressed actors are collected from `to`, `cc`, `bto`, `bcc`,
    /// `audience` and the object's `attributedTo`. The public collection and
    /// the sender's own followers collection expand to the sender's
    /// followers. The sender is never a recipient.
    pub async fn resolve_recipients(
        &self,
        sender: &Actor,
        activity: &Value,
    ) -> Result<Vec<String>, AppError> {
        let mut addresses: Vec<String> = ADDRESSING_FIELDS
            .iter()
            .filter_map(|field| activity.get(*field))
            .flat_map(all_ids)
            .collect();
        if let Some(authors) = embedded_object(activity).and_then(|object| object.get("attributedTo"))
        {
            addresses.extend(all_ids(authors));
        }

        let mut followers_expanded = false;
        let mut seen = HashSet::new();
        let mut recipients = Vec::new();

        for address in addresses {
            let is_followers =
                is_public_address(&address) || sender.followers_uri.as_deref() == Some(&address);
            if is_followers {
                if !followers_expanded {
                    followers_expanded = true;
                    for follower in self.directory.followers_of(sender).await? {
                        if follower != sender.uri && seen.insert(follower.clone()) {
                            recipients.push(follower);
                        }
                    }
                }
                continue;
            }

            if address != sender.uri && seen.insert(address.clone()) {
                recipients.push(address);
            }
        }

        let mut inbox_seen = HashSet::new();
        let mut inboxes = Vec::new();
        for recipient in recipients {
            match self.directory.find_by_uri(&recipient).await {
                Ok(actor) => {
                    let inbox = actor.delivery_inbox(self.prefer_shared_inbox).to_string();
                    if inbox_seen.insert(inbox.clone()) {
                        inboxes.push(inbox);
                    }
                }
                Err(AppError::NotFound) | Err(AppError::Forbidden) => {
                    tracing::warn!(recipient = %recipient, "Dropping unresolvable recipient");
                }
                Err(error) => return Err(error),
            }
        }

        Ok(inboxes)
    }
}
