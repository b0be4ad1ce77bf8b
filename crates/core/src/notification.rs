//! Approval notifications.
//!
//! This module composes the message for a submitted requisition and hands it
//! to a [`NotificationSink`]. Delivery itself (SMTP, Graph API, ...) lives
//! behind the sink and is not implemented here.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tera::{Context, Tera};
use thiserror::Error;

use crate::currency::format_currency;
use crate::domain::approval::Contact;
use crate::domain::requisition::{Requisition, RequisitionId};

const SUBMITTED_TEMPLATE_NAME: &str = "requisition_submitted.html";
const SUBMITTED_TEMPLATE: &str = include_str!("../templates/requisition_submitted.html.tera");

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub requisition_id: RequisitionId,
    pub recipients: Vec<Contact>,
    pub subject: String,
    pub rendered_body: String,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum NotificationError {
    #[error("template error: {0}")]
    Template(String),
    #[error("delivery failed: {0}")]
    Delivery(String),
}

pub trait NotificationSink: Send + Sync {
    fn deliver(&self, notification: &Notification) -> Result<(), NotificationError>;
}

#[derive(Clone, Debug)]
pub struct NotificationComposer {
    tera: Tera,
}

impl NotificationComposer {
    pub fn new() -> Result<Self, NotificationError> {
        let mut tera = Tera::default();
        tera.add_raw_template(SUBMITTED_TEMPLATE_NAME, SUBMITTED_TEMPLATE)
            .map_err(|error| NotificationError::Template(error.to_string()))?;
        Ok(Self { tera })
    }

    pub fn subject(requisition: &Requisition) -> String {
        format!(
            "New Purchase Requisition: {} - {}",
            requisition.id,
            format_currency(requisition.totals.grand_total)
        )
    }

    pub fn compose(
        &self,
        requisition: &Requisition,
        recipients: Vec<Contact>,
    ) -> Result<Notification, NotificationError> {
        let mut context = Context::new();
        context.insert("requisition_id", &requisition.id.0);
        context.insert("title", &requisition.title);
        context.insert("requestor", &requisition.requestor);
        context.insert("department", &requisition.department);
        context.insert("priority", &requisition.priority);
        context.insert("item_count", &requisition.items.len());
        context.insert("amount", &format_currency(requisition.totals.grand_total));

        let rendered_body = self
            .tera
            .render(SUBMITTED_TEMPLATE_NAME, &context)
            .map_err(|error| NotificationError::Template(error.to_string()))?;

        Ok(Notification {
            requisition_id: requisition.id.clone(),
            recipients,
            subject: Self::subject(requisition),
            rendered_body,
        })
    }
}

#[derive(Clone, Default)]
pub struct InMemoryNotificationSink {
    delivered: Arc<Mutex<Vec<Notification>>>,
}

impl InMemoryNotificationSink {
    pub fn delivered(&self) -> Vec<Notification> {
        match self.delivered.lock() {
            Ok(delivered) => delivered.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl NotificationSink for InMemoryNotificationSink {
    fn deliver(&self, notification: &Notification) -> Result<(), NotificationError> {
        match self.delivered.lock() {
            Ok(mut delivered) => delivered.push(notification.clone()),
            Err(poisoned) => poisoned.into_inner().push(notification.clone()),
        }
        Ok(())
    }
}

/// Logs the notification instead of sending it.
#[derive(Clone, Debug)]
pub struct TracingNotificationSink {
    sender: String,
}

impl TracingNotificationSink {
    pub fn new(sender: impl Into<String>) -> Self {
        Self { sender: sender.into() }
    }
}

impl NotificationSink for TracingNotificationSink {
    fn deliver(&self, notification: &Notification) -> Result<(), NotificationError> {
        let recipients: Vec<&str> =
            notification.recipients.iter().map(Contact::as_str).collect();
        tracing::info!(
            event_name = "requisition.notification.logged",
            requisition_id = %notification.requisition_id,
            sender = %self.sender,
            recipients = ?recipients,
            subject = %notification.subject,
            body_bytes = notification.rendered_body.len(),
            "approval notification prepared"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use crate::{
        domain::{
            approval::Contact,
            requisition::{Requisition, RequisitionDraft, RequisitionId},
        },
        pricing::{to_output, ComputedTotals},
    };

    use super::{InMemoryNotificationSink, NotificationComposer, NotificationSink};

    fn requisition(title: &str) -> Requisition {
        let mut draft = RequisitionDraft::new();
        draft.title = title.to_string();
        draft.department = "IT".to_string();
        Requisition::from_draft(
            draft,
            RequisitionId("REQ-2026-654321".to_string()),
            "Jane Smith",
            ComputedTotals {
                subtotal: to_output(Decimal::new(113_636, 2)),
                tax_amount: to_output(Decimal::new(11_364, 2)),
                grand_total: to_output(Decimal::new(125_000, 2)),
                currency: "MYR".to_string(),
            },
            Utc::now(),
        )
    }

    #[test]
    fn subject_names_requisition_and_formatted_total() {
        let composer = NotificationComposer::new().expect("embedded template");
        let notification = composer
            .compose(&requisition("Laptops"), vec![Contact::new("it.manager@company.com")])
            .expect("rendered");

        assert_eq!(notification.subject, "New Purchase Requisition: REQ-2026-654321 - RM1,250.00");
        assert_eq!(notification.recipients, vec![Contact::new("it.manager@company.com")]);
    }

    #[test]
    fn body_includes_details_and_escapes_markup() {
        let composer = NotificationComposer::new().expect("embedded template");
        let notification = composer
            .compose(&requisition("Chairs <b>now</b>"), Vec::new())
            .expect("rendered");

        assert!(notification.rendered_body.contains("REQ-2026-654321"));
        assert!(notification.rendered_body.contains("Jane Smith"));
        assert!(notification.rendered_body.contains("RM1,250.00"));
        assert!(notification.rendered_body.contains("normal"));
        assert!(notification.rendered_body.contains("Chairs &lt;b&gt;now"));
        assert!(!notification.rendered_body.contains("<b>now"));
    }

    #[test]
    fn in_memory_sink_keeps_delivery_order() {
        let composer = NotificationComposer::new().expect("embedded template");
        let sink = InMemoryNotificationSink::default();

        for title in ["First", "Second"] {
            let notification = composer.compose(&requisition(title), Vec::new()).expect("rendered");
            sink.deliver(&notification).expect("in-memory delivery");
        }

        let delivered = sink.delivered();
        assert_eq!(delivered.len(), 2);
        assert!(delivered[0].rendered_body.contains("First"));
        assert!(delivered[1].rendered_body.contains("Second"));
    }
}
