//! Notification Dispatch Job
//!
//! Consumes `DeliveryEvent`s published after a fulfillment commits and turns
//! each into follow-up and email calls. Every call is isolated: a failure is
//! logged and the remaining notifications still go out.

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{info, warn};

use crate::services::notifications::{
    plan_notifications, DeliveryEvent, NotificationTask, Notifier,
};

/// Spawn the dispatcher. It stops once every `EventPublisher` is dropped.
pub fn start_notification_dispatch_job(
    rx: UnboundedReceiver<DeliveryEvent>,
    notifier: Arc<dyn Notifier>,
    warranty_keyword: String,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(run(rx, notifier, warranty_keyword))
}

pub async fn run(
    mut rx: UnboundedReceiver<DeliveryEvent>,
    notifier: Arc<dyn Notifier>,
    warranty_keyword: String,
) {
    info!("Notification dispatcher started");

    while let Some(event) = rx.recv().await {
        dispatch(notifier.as_ref(), &event, &warranty_keyword).await;
    }

    info!("Notification dispatcher stopped: event channel closed");
}

/// Send every notification an event calls for. Returns how many succeeded.
pub async fn dispatch(notifier: &dyn Notifier, event: &DeliveryEvent, warranty_keyword: &str) -> usize {
    let DeliveryEvent::Fulfilled(fulfilled) = event;
    let tasks = plan_notifications(fulfilled, warranty_keyword);
    let mut sent = 0;

    for task in &tasks {
        let result = match task {
            NotificationTask::FollowUp {
                delivery_id,
                salesperson,
            } => notifier.schedule_follow_up(*delivery_id, salesperson).await,
            NotificationTask::Email {
                template,
                to,
                name,
                delivery_id,
            } => {
                notifier
                    .send_email(*template, to, name.as_deref(), *delivery_id)
                    .await
            }
        };

        match result {
            Ok(()) => sent += 1,
            Err(e) => warn!(
                delivery_id = fulfilled.delivery_id,
                task = ?task,
                error = %e,
                "Notification failed"
            ),
        }
    }

    info!(
        delivery_id = fulfilled.delivery_id,
        planned = tasks.len(),
        sent,
        "Delivery notifications dispatched"
    );
    sent
}
