pub mod approvals;
pub mod audit;
pub mod config;
pub mod currency;
pub mod domain;
pub mod errors;
pub mod notification;
pub mod pricing;
pub mod submission;

pub use approvals::{
    resolve_approval_chain, ApprovalChain, ApprovalRouter, ApprovalStep, ApproverKind,
    SharedThresholdTable, ThresholdApprovalRouter,
};
pub use audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink};
pub use currency::{format_currency, parse_currency, try_parse_currency};
pub use domain::approval::{ApprovalThreshold, ApprovalThresholdTable, Contact};
pub use domain::requisition::{
    DraftDocument, ItemCategory, ItemUpdate, LineItem, Priority, Requisition, RequisitionDraft,
    RequisitionId, RequisitionStatus,
};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use notification::{Notification, NotificationComposer, NotificationSink};
pub use pricing::{
    compute_line_total, compute_totals, ComputedTotals, PricingEngine, PricingResult,
    StandardPricingEngine, DEFAULT_TAX_RATE,
};
pub use submission::{
    DefaultSubmissionService, RequisitionEvaluation, RequisitionSubmissionService,
    SubmissionReceipt, SubmissionRequest,
};
