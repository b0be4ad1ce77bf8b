use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::{
    approvals::{ApprovalChain, ApprovalRouter, SharedThresholdTable, ThresholdApprovalRouter},
    audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink, TracingAuditSink},
    config::AppConfig,
    domain::requisition::{LineItem, Requisition, RequisitionDraft, RequisitionId},
    errors::{ApplicationError, DomainError},
    notification::{Notification, NotificationComposer, NotificationSink, TracingNotificationSink},
    pricing::{PricingEngine, PricingResult, StandardPricingEngine},
};

const ACTOR: &str = "requisition-submission";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RequisitionEvaluation {
    pub pricing: PricingResult,
    pub approval_chain: ApprovalChain,
}

#[derive(Clone, Debug)]
pub struct SubmissionRequest<'a> {
    pub requestor: &'a str,
    pub correlation_id: &'a str,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SubmissionReceipt {
    pub requisition: Requisition,
    pub pricing: PricingResult,
    pub approval_chain: ApprovalChain,
    pub notification: Option<Notification>,
    pub notification_sent: bool,
}

pub struct RequisitionSubmissionService<P, R, N, A> {
    pricing_engine: P,
    router: R,
    notifier: N,
    audit: A,
    composer: NotificationComposer,
    notifications_enabled: bool,
}

pub type DefaultSubmissionService = RequisitionSubmissionService<
    StandardPricingEngine,
    ThresholdApprovalRouter,
    TracingNotificationSink,
    TracingAuditSink,
>;

impl DefaultSubmissionService {
    pub fn from_config(config: &AppConfig) -> Result<Self, ApplicationError> {
        let router = ThresholdApprovalRouter::new(SharedThresholdTable::new(config.threshold_table()));
        let service = Self::new(
            StandardPricingEngine::new(config.pricing.tax_rate),
            router,
            TracingNotificationSink::new(config.notifications.sender.clone()),
            TracingAuditSink,
        )?;
        Ok(service.with_notifications(config.notifications.enabled))
    }
}

impl<P, R, N, A> RequisitionSubmissionService<P, R, N, A>
where
    P: PricingEngine,
    R: ApprovalRouter,
    N: NotificationSink,
    A: AuditSink,
{
    pub fn new(pricing_engine: P, router: R, notifier: N, audit: A) -> Result<Self, ApplicationError> {
        let composer = NotificationComposer::new()
            .map_err(|error| ApplicationError::Notification(error.to_string()))?;
        Ok(Self { pricing_engine, router, notifier, audit, composer, notifications_enabled: true })
    }

    pub fn with_notifications(mut self, enabled: bool) -> Self {
        self.notifications_enabled = enabled;
        self
    }

    /// Prices the items and resolves who must approve them, without submitting.
    /// Routes on the output-rounded grand total, the same figure the requester
    /// sees and the approvers are notified with.
    pub fn evaluate(
        &self,
        items: &[LineItem],
        department: &str,
    ) -> Result<RequisitionEvaluation, DomainError> {
        let pricing = self.pricing_engine.price(items)?;
        let approval_chain = self.router.route(department, pricing.totals.grand_total)?;
        Ok(RequisitionEvaluation { pricing, approval_chain })
    }

    pub fn submit(
        &self,
        draft: RequisitionDraft,
        request: SubmissionRequest<'_>,
    ) -> Result<SubmissionReceipt, ApplicationError> {
        let correlation_id = request.correlation_id;

        let evaluation = draft
            .validate_for_submission()
            .and_then(|()| self.evaluate(draft.items(), &draft.department));
        let evaluation = match evaluation {
            Ok(evaluation) => evaluation,
            Err(error) => {
                warn!(
                    event_name = "requisition.submission.rejected",
                    correlation_id,
                    department = %draft.department,
                    error = %error,
                    "requisition rejected before submission"
                );
                self.audit.emit(
                    AuditEvent::new(
                        None,
                        correlation_id,
                        "requisition.submission_rejected",
                        AuditCategory::Submission,
                        ACTOR,
                        AuditOutcome::Rejected,
                    )
                    .with_metadata("department", draft.department.clone())
                    .with_metadata("reason", error.to_string()),
                );
                return Err(error.into());
            }
        };

        let RequisitionEvaluation { pricing, approval_chain } = evaluation;
        let requisition = Requisition::from_draft(
            draft,
            RequisitionId::generate(request.submitted_at),
            request.requestor,
            pricing.totals.clone(),
            request.submitted_at,
        );

        info!(
            event_name = "requisition.submission.priced",
            correlation_id,
            requisition_id = %requisition.id,
            grand_total = %pricing.totals.grand_total,
            approvers = approval_chain.len(),
            "requisition priced and routed"
        );
        self.audit.emit(
            AuditEvent::new(
                Some(requisition.id.clone()),
                correlation_id,
                "requisition.priced",
                AuditCategory::Pricing,
                ACTOR,
                AuditOutcome::Success,
            )
            .with_metadata("subtotal", pricing.totals.subtotal.to_string())
            .with_metadata("tax_amount", pricing.totals.tax_amount.to_string())
            .with_metadata("grand_total", pricing.totals.grand_total.to_string()),
        );
        self.audit.emit(
            AuditEvent::new(
                Some(requisition.id.clone()),
                correlation_id,
                "requisition.routed",
                AuditCategory::Routing,
                ACTOR,
                AuditOutcome::Success,
            )
            .with_metadata("department", requisition.department.clone())
            .with_metadata("recipients", join_recipients(&approval_chain)),
        );

        let (notification, notification_sent) = if self.notifications_enabled {
            self.notify(&requisition, &approval_chain, correlation_id)
        } else {
            (None, false)
        };

        Ok(SubmissionReceipt { requisition, pricing, approval_chain, notification, notification_sent })
    }

    /// Delivery problems are reported on the receipt; they never undo a submission.
    fn notify(
        &self,
        requisition: &Requisition,
        approval_chain: &ApprovalChain,
        correlation_id: &str,
    ) -> (Option<Notification>, bool) {
        let delivery = self
            .composer
            .compose(requisition, approval_chain.recipients())
            .map_err(|error| (None, error))
            .and_then(|notification| match self.notifier.deliver(&notification) {
                Ok(()) => Ok(notification),
                Err(error) => Err((Some(notification), error)),
            });

        match delivery {
            Ok(notification) => {
                self.audit.emit(
                    AuditEvent::new(
                        Some(requisition.id.clone()),
                        correlation_id,
                        "requisition.notification_sent",
                        AuditCategory::Notification,
                        ACTOR,
                        AuditOutcome::Success,
                    )
                    .with_metadata("recipients", join_recipients(approval_chain)),
                );
                (Some(notification), true)
            }
            Err((notification, error)) => {
                warn!(
                    event_name = "requisition.notification.failed",
                    correlation_id,
                    requisition_id = %requisition.id,
                    error = %error,
                    "approval notification could not be delivered"
                );
                self.audit.emit(
                    AuditEvent::new(
                        Some(requisition.id.clone()),
                        correlation_id,
                        "requisition.notification_failed",
                        AuditCategory::Notification,
                        ACTOR,
                        AuditOutcome::Failed,
                    )
                    .with_metadata("reason", error.to_string()),
                );
                (notification, false)
            }
        }
    }
}

fn join_recipients(chain: &ApprovalChain) -> String {
    chain.steps.iter().map(|step| step.contact.as_str()).collect::<Vec<_>>().join(",")
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use crate::{
        approvals::ThresholdApprovalRouter,
        audit::{AuditOutcome, InMemoryAuditSink},
        domain::{
            approval::Contact,
            requisition::{ItemCategory, ItemUpdate, RequisitionDraft, RequisitionStatus},
        },
        errors::{ApplicationError, DomainError},
        notification::{InMemoryNotificationSink, Notification, NotificationError, NotificationSink},
        pricing::StandardPricingEngine,
    };

    use super::{RequisitionSubmissionService, SubmissionRequest};

    struct RefusingSink;

    impl NotificationSink for RefusingSink {
        fn deliver(&self, _notification: &Notification) -> Result<(), NotificationError> {
            Err(NotificationError::Delivery("relay refused connection".to_string()))
        }
    }

    fn draft(department: &str) -> RequisitionDraft {
        let mut draft = RequisitionDraft::new();
        draft.title = "Office Supplies Q1".to_string();
        draft.department = department.to_string();
        draft.remove_item(1).expect("blank item");
        draft
            .push_item("A4 paper", 10, Decimal::new(850, 2), Some(ItemCategory::OfficeSupplies))
            .expect("in range");
        draft
            .push_item("Pens", 50, Decimal::new(120, 2), Some(ItemCategory::OfficeSupplies))
            .expect("in range");
        draft
    }

    fn request() -> SubmissionRequest<'static> {
        SubmissionRequest { requestor: "Jane Smith", correlation_id: "req-42", submitted_at: Utc::now() }
    }

    #[test]
    fn submission_prices_routes_and_notifies() {
        let notifier = InMemoryNotificationSink::default();
        let audit = InMemoryAuditSink::default();
        let service = RequisitionSubmissionService::new(
            StandardPricingEngine::default(),
            ThresholdApprovalRouter::default(),
            notifier.clone(),
            audit.clone(),
        )
        .expect("service");

        let receipt = service.submit(draft("IT"), request()).expect("submitted");

        assert_eq!(receipt.requisition.status, RequisitionStatus::Pending);
        assert_eq!(receipt.requisition.totals.grand_total, Decimal::new(15950, 2));
        assert_eq!(
            receipt.approval_chain.recipients(),
            vec![Contact::new("it.manager@company.com"), Contact::new("admin@company.com")]
        );
        assert!(receipt.notification_sent);
        assert!(receipt.requisition.id.0.starts_with("REQ-"));

        let delivered = notifier.delivered();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].recipients, receipt.approval_chain.recipients());
        assert!(delivered[0].subject.ends_with("RM159.50"));

        let event_types: Vec<String> =
            audit.events().into_iter().map(|event| event.event_type).collect();
        assert_eq!(
            event_types,
            vec!["requisition.priced", "requisition.routed", "requisition.notification_sent"]
        );
    }

    #[test]
    fn failed_delivery_keeps_the_submission() {
        let audit = InMemoryAuditSink::default();
        let service = RequisitionSubmissionService::new(
            StandardPricingEngine::default(),
            ThresholdApprovalRouter::default(),
            RefusingSink,
            audit.clone(),
        )
        .expect("service");

        let receipt = service.submit(draft("Operations"), request()).expect("submitted");

        assert!(!receipt.notification_sent);
        assert!(receipt.notification.is_some());
        let last = audit.events().pop().expect("notification audit event");
        assert_eq!(last.outcome, AuditOutcome::Failed);
    }

    #[test]
    fn disabled_notifications_skip_delivery() {
        let notifier = InMemoryNotificationSink::default();
        let service = RequisitionSubmissionService::new(
            StandardPricingEngine::default(),
            ThresholdApprovalRouter::default(),
            notifier.clone(),
            InMemoryAuditSink::default(),
        )
        .expect("service")
        .with_notifications(false);

        let receipt = service.submit(draft("HR"), request()).expect("submitted");

        assert!(!receipt.notification_sent);
        assert!(receipt.notification.is_none());
        assert!(notifier.delivered().is_empty());
    }

    #[test]
    fn unknown_department_rejects_whole_submission() {
        let notifier = InMemoryNotificationSink::default();
        let audit = InMemoryAuditSink::default();
        let service = RequisitionSubmissionService::new(
            StandardPricingEngine::default(),
            ThresholdApprovalRouter::default(),
            notifier.clone(),
            audit.clone(),
        )
        .expect("service");

        let error = service.submit(draft("Legal"), request()).expect_err("unknown department");

        assert_eq!(
            error,
            ApplicationError::Domain(DomainError::UnknownDepartment {
                department: "Legal".to_string()
            })
        );
        assert!(notifier.delivered().is_empty());
        let events = audit.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].outcome, AuditOutcome::Rejected);
    }

    #[test]
    fn evaluate_returns_totals_and_chain_without_submitting() {
        let service = RequisitionSubmissionService::new(
            StandardPricingEngine::new(Decimal::ZERO),
            ThresholdApprovalRouter::default(),
            InMemoryNotificationSink::default(),
            InMemoryAuditSink::default(),
        )
        .expect("service");

        let mut draft = RequisitionDraft::new();
        draft.update_item(1, ItemUpdate::Quantity(2)).expect("qty");
        draft.update_item(1, ItemUpdate::UnitPrice(Decimal::from(600))).expect("price");

        let evaluation = service.evaluate(draft.items(), "Marketing").expect("evaluated");
        assert_eq!(evaluation.pricing.totals.grand_total, Decimal::from(1_200));
        assert_eq!(evaluation.approval_chain.len(), 3);
    }

    #[test]
    fn routing_compares_the_rounded_grand_total() {
        let service = RequisitionSubmissionService::new(
            StandardPricingEngine::new(Decimal::ZERO),
            ThresholdApprovalRouter::default(),
            InMemoryNotificationSink::default(),
            InMemoryAuditSink::default(),
        )
        .expect("service");

        let mut draft = RequisitionDraft::new();
        draft.update_item(1, ItemUpdate::Quantity(1)).expect("qty");
        draft.update_item(1, ItemUpdate::UnitPrice(Decimal::new(1_000_004, 3))).expect("price");

        let evaluation = service.evaluate(draft.items(), "IT").expect("evaluated");
        assert_eq!(evaluation.pricing.totals.grand_total, Decimal::new(100_000, 2));
        assert_eq!(evaluation.approval_chain.len(), 2, "1000.004 shows as 1000.00 and skips finance");
    }
}
