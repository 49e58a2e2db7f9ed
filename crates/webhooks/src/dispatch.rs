//! The dispatcher itself (spec §4.6). Grounded on the reference
//! `_deliver_webhook`/`_fire_and_forget`/`_deliver_with_tracking` trio in
//! `services/webhooks.py`, restructured around the teacher's
//! `HorizonClient` shape (a cloneable client struct wrapping a configured
//! `reqwest::Client`, a `retry_*` loop, `tracing` logs at each outcome) but
//! with the spec's fixed retry delays instead of `HorizonClient`'s
//! exponential backoff.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tessera_core::domain::WebhookDeliveryStatus;
use tessera_db::repo::WebhookDeliveryRepo;
use uuid::Uuid;

use crate::events::{Payload, ProposalStatusEvent, WebhookEvent};
use crate::sign::sign_payload;
use crate::ssrf::validate_webhook_url;

const MAX_ATTEMPTS: usize = 3;
const RETRY_DELAYS_SECS: [u64; 3] = [1, 5, 30];
const MAX_CONCURRENT: usize = 10;

struct Inner {
    http: reqwest::Client,
    semaphore: tokio::sync::Semaphore,
    webhook_url: Option<String>,
    webhook_secret: Option<String>,
    production: bool,
    deliveries: WebhookDeliveryRepo,
}

/// Owns the process-wide outbound-webhook semaphore and HTTP client.
/// Constructed once at startup and cloned (cheaply, via `Arc`) into every
/// handler that needs to fire an event.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

impl Dispatcher {
    pub fn new(
        webhook_url: Option<String>,
        webhook_secret: Option<String>,
        production: bool,
        deliveries: WebhookDeliveryRepo,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            inner: Arc::new(Inner {
                http,
                semaphore: tokio::sync::Semaphore::new(MAX_CONCURRENT),
                webhook_url,
                webhook_secret,
                production,
                deliveries,
            }),
        }
    }

    /// Schedule delivery without blocking the caller. Mirrors the
    /// reference's fire-and-forget dispatch from inside a request handler.
    pub fn fire_and_forget<P>(&self, payload: &P)
    where
        P: Payload,
    {
        let event = match WebhookEvent::new(payload, Utc::now()) {
            Ok(event) => event,
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize webhook payload");
                return;
            }
        };
        self.spawn(event);
    }

    /// Same as [`Self::fire_and_forget`] but for the proposal status family
    /// of events, whose `WebhookEventType` is chosen by the caller rather
    /// than fixed to the payload type.
    pub fn fire_and_forget_status(&self, status_event: ProposalStatusEvent) {
        let event = match WebhookEvent::from_status_event(status_event, Utc::now()) {
            Ok(event) => event,
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize webhook status payload");
                return;
            }
        };
        self.spawn(event);
    }

    fn spawn(&self, event: WebhookEvent) {
        let dispatcher = self.clone();
        tokio::spawn(async move {
            dispatcher.deliver_with_tracking(event).await;
        });
    }

    async fn deliver_with_tracking(&self, event: WebhookEvent) -> bool {
        let Some(target_url) = self.inner.webhook_url.clone() else {
            tracing::debug!("no webhook URL configured, skipping delivery");
            return true;
        };

        let payload_json = match serde_json::to_string(&event) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize webhook event envelope");
                return false;
            }
        };

        let delivery_id = match self.inner.deliveries.enqueue(event.event, event.payload.clone(), &target_url).await {
            Ok(delivery) => Some(delivery.id),
            Err(e) => {
                tracing::error!(error = %e, "failed to create webhook delivery record");
                None
            }
        };

        self.deliver(&target_url, event.event, &payload_json, delivery_id).await
    }

    async fn deliver(&self, target_url: &str, event_name: &str, payload_json: &str, delivery_id: Option<Uuid>) -> bool {
        if let Err(validation) = validate_webhook_url(target_url, self.inner.production).await {
            tracing::error!(error = %validation.0, "webhook URL validation failed");
            if let Some(id) = delivery_id {
                let _ = self
                    .inner
                    .deliveries
                    .record_attempt(id, WebhookDeliveryStatus::Failed, None, Some(&format!("URL validation failed: {}", validation.0)))
                    .await;
            }
            return false;
        }

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(reqwest::header::CONTENT_TYPE, "application/json".parse().unwrap());
        headers.insert("X-Tessera-Event", event_name.parse().unwrap());
        headers.insert("X-Tessera-Timestamp", Utc::now().to_rfc3339().parse().unwrap());
        if let Some(secret) = &self.inner.webhook_secret {
            let signature = sign_payload(secret, payload_json);
            headers.insert("X-Tessera-Signature", format!("sha256={signature}").parse().unwrap());
        }

        let _permit = self.inner.semaphore.acquire().await;

        let mut last_error: Option<String> = None;
        let mut last_status_code: Option<i32> = None;

        for (attempt, delay_secs) in RETRY_DELAYS_SECS.iter().enumerate() {
            let response = self
                .inner
                .http
                .post(target_url)
                .headers(headers.clone())
                .body(payload_json.to_string())
                .send()
                .await;

            match response {
                Ok(resp) => {
                    let status = resp.status();
                    last_status_code = Some(status.as_u16() as i32);
                    if status.as_u16() < 300 {
                        tracing::info!(event = event_name, url = target_url, "webhook delivered");
                        if let Some(id) = delivery_id {
                            let _ = self
                                .inner
                                .deliveries
                                .record_attempt(id, WebhookDeliveryStatus::Delivered, last_status_code, None)
                                .await;
                        }
                        return true;
                    }
                    let body = resp.text().await.unwrap_or_default();
                    last_error = Some(body.chars().take(500).collect());
                    tracing::warn!(attempt = attempt + 1, status = %status, "webhook delivery failed");
                }
                Err(e) => {
                    last_error = Some(e.to_string().chars().take(500).collect());
                    tracing::warn!(attempt = attempt + 1, error = %e, "webhook delivery error");
                }
            }

            if attempt < MAX_ATTEMPTS - 1 {
                tokio::time::sleep(Duration::from_secs(*delay_secs)).await;
            }
        }

        tracing::error!(event = event_name, attempts = MAX_ATTEMPTS, "webhook delivery failed after all attempts");
        if let Some(id) = delivery_id {
            let _ = self
                .inner
                .deliveries
                .record_attempt(id, WebhookDeliveryStatus::Failed, last_status_code, last_error.as_deref())
                .await;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_repo(pool: sqlx::PgPool) -> WebhookDeliveryRepo {
        WebhookDeliveryRepo::new(pool)
    }

    #[sqlx::test(migrations = "../db/migrations")]
    async fn delivers_successfully_on_first_attempt(pool: sqlx::PgPool) {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let dispatcher = Dispatcher::new(Some(format!("{}/hook", server.uri())), None, false, test_repo(pool));
        let payload = crate::events::ContractPublishedPayload {
            contract_id: Uuid::new_v4(),
            asset_id: Uuid::new_v4(),
            asset_fqn: "warehouse.public.orders".to_string(),
            version: "1.0.0".to_string(),
            producer_team_id: Uuid::new_v4(),
            producer_team_name: "Data Platform".to_string(),
            from_proposal_id: None,
        };
        let event = WebhookEvent::new(&payload, Utc::now()).unwrap();
        let delivered = dispatcher.deliver(&format!("{}/hook", server.uri()), event.event, "{}", None).await;
        assert!(delivered);
    }

    #[tokio::test]
    async fn missing_url_skips_delivery_successfully() {
        let pool_url = std::env::var("DATABASE_URL").unwrap_or_default();
        if pool_url.is_empty() {
            return;
        }
    }
}
