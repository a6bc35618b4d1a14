//! Delivery domain events and the notification collaborator
//!
//! The state machine publishes `DeliveryEvent::Fulfilled` after the
//! transaction that marked a delivery as delivered has committed. The
//! notification dispatcher job consumes the events; its failures never reach
//! the fulfillment request.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Salesperson {
    pub user_id: i32,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl Salesperson {
    pub fn has_contact(&self) -> bool {
        self.email.as_deref().is_some_and(|e| !e.trim().is_empty())
            || self.phone.as_deref().is_some_and(|p| !p.trim().is_empty())
    }
}

/// Everything the notifier needs, captured inside the fulfilling transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FulfilledDelivery {
    pub delivery_id: i32,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub salesperson: Option<Salesperson>,
    pub product_names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryEvent {
    Fulfilled(FulfilledDelivery),
}

/// Sending half of the in-process event channel
#[derive(Clone)]
pub struct EventPublisher {
    tx: mpsc::UnboundedSender<DeliveryEvent>,
}

impl EventPublisher {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<DeliveryEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn publish(&self, event: DeliveryEvent) {
        if let Err(e) = self.tx.send(event) {
            warn!(event = ?e.0, "Notification dispatcher is gone, event dropped");
        }
    }
}

/// Customer-facing transactional email templates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailTemplate {
    GaniWarranty,
    ReviewRequest,
}

impl std::fmt::Display for EmailTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmailTemplate::GaniWarranty => write!(f, "gani_warranty"),
            EmailTemplate::ReviewRequest => write!(f, "review_request"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationTask {
    FollowUp {
        delivery_id: i32,
        salesperson: Salesperson,
    },
    Email {
        template: EmailTemplate,
        to: String,
        name: Option<String>,
        delivery_id: i32,
    },
}

/// Decide which notifications a fulfilled delivery triggers
pub fn plan_notifications(event: &FulfilledDelivery, warranty_keyword: &str) -> Vec<NotificationTask> {
    let mut tasks = Vec::new();

    if let Some(salesperson) = event.salesperson.as_ref().filter(|s| s.has_contact()) {
        tasks.push(NotificationTask::FollowUp {
            delivery_id: event.delivery_id,
            salesperson: salesperson.clone(),
        });
    }

    let Some(email) = event
        .customer_email
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty())
    else {
        return tasks;
    };

    let keyword = warranty_keyword.trim().to_lowercase();
    let warranty = !keyword.is_empty()
        && event
            .product_names
            .iter()
            .any(|name| name.to_lowercase().contains(&keyword));

    if warranty {
        tasks.push(NotificationTask::Email {
            template: EmailTemplate::GaniWarranty,
            to: email.to_string(),
            name: event.customer_name.clone(),
            delivery_id: event.delivery_id,
        });
    }

    tasks.push(NotificationTask::Email {
        template: EmailTemplate::ReviewRequest,
        to: email.to_string(),
        name: event.customer_name.clone(),
        delivery_id: event.delivery_id,
    });

    tasks
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("notification endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Internal follow-up scheduler, keyed by the salesperson's contact info
    async fn schedule_follow_up(
        &self,
        delivery_id: i32,
        salesperson: &Salesperson,
    ) -> Result<(), NotifyError>;

    async fn send_email(
        &self,
        template: EmailTemplate,
        to: &str,
        name: Option<&str>,
        delivery_id: i32,
    ) -> Result<(), NotifyError>;
}

#[derive(Serialize)]
struct FollowUpPayload<'a> {
    delivery_id: i32,
    salesperson_name: &'a str,
    email: Option<&'a str>,
    phone: Option<&'a str>,
}

#[derive(Serialize)]
struct EmailPayload<'a> {
    template: EmailTemplate,
    to: &'a str,
    name: Option<&'a str>,
    delivery_id: i32,
}

/// HTTP implementation; an unconfigured channel is skipped
#[derive(Clone)]
pub struct HttpNotifier {
    client: Client,
    follow_up_url: Option<String>,
    email_url: Option<String>,
}

impl HttpNotifier {
    pub fn new(
        follow_up_url: Option<String>,
        email_url: Option<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            follow_up_url,
            email_url,
        })
    }

    async fn post<T: Serialize + ?Sized>(&self, url: &str, payload: &T) -> Result<(), NotifyError> {
        let response = self.client.post(url).json(payload).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(NotifyError::Status {
            status: status.as_u16(),
            body: body.chars().take(200).collect(),
        })
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn schedule_follow_up(
        &self,
        delivery_id: i32,
        salesperson: &Salesperson,
    ) -> Result<(), NotifyError> {
        let Some(url) = &self.follow_up_url else {
            debug!(delivery_id, "FOLLOW_UP_URL not configured, skipping follow-up");
            return Ok(());
        };

        let payload = FollowUpPayload {
            delivery_id,
            salesperson_name: &salesperson.name,
            email: salesperson.email.as_deref(),
            phone: salesperson.phone.as_deref(),
        };
        self.post(url, &payload).await
    }

    async fn send_email(
        &self,
        template: EmailTemplate,
        to: &str,
        name: Option<&str>,
        delivery_id: i32,
    ) -> Result<(), NotifyError> {
        let Some(url) = &self.email_url else {
            debug!(delivery_id, %template, "EMAIL_TRIGGER_URL not configured, skipping email");
            return Ok(());
        };

        let payload = EmailPayload {
            template,
            to,
            name,
            delivery_id,
        };
        self.post(url, &payload).await
    }
}
