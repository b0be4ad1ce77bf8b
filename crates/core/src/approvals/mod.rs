use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::approval::{ApprovalThresholdTable, Contact};
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ApproverKind {
    DepartmentManager { department: String },
    SpendThreshold { approver_role: String, threshold: Decimal },
    SystemAdministrator,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalStep {
    pub contact: Contact,
    pub kind: ApproverKind,
}

/// Ordered, duplicate-free approval path; the first step approves first.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalChain {
    pub steps: Vec<ApprovalStep>,
}

impl ApprovalChain {
    pub fn recipients(&self) -> Vec<Contact> {
        self.steps.iter().map(|step| step.contact.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    fn push_unique(&mut self, seen: &mut HashSet<Contact>, step: ApprovalStep) {
        if seen.insert(step.contact.clone()) {
            self.steps.push(step);
        }
    }
}

/// Manager first, then every tier whose amount is strictly below the grand
/// total in ascending order, then the system administrator. A contact reached
/// twice keeps only its first position.
pub fn resolve_approval_chain(
    department: &str,
    grand_total: Decimal,
    table: &ApprovalThresholdTable,
) -> Result<ApprovalChain, DomainError> {
    let manager = table
        .manager_for(department)
        .ok_or_else(|| DomainError::UnknownDepartment { department: department.trim().to_string() })?;

    let mut chain = ApprovalChain::default();
    let mut seen = HashSet::new();

    chain.push_unique(
        &mut seen,
        ApprovalStep {
            contact: manager.clone(),
            kind: ApproverKind::DepartmentManager { department: department.trim().to_string() },
        },
    );

    for threshold in table.thresholds() {
        if threshold.amount < grand_total {
            chain.push_unique(
                &mut seen,
                ApprovalStep {
                    contact: threshold.contact.clone(),
                    kind: ApproverKind::SpendThreshold {
                        approver_role: threshold.approver_role.clone(),
                        threshold: threshold.amount,
                    },
                },
            );
        }
    }

    chain.push_unique(
        &mut seen,
        ApprovalStep {
            contact: table.system_admin().clone(),
            kind: ApproverKind::SystemAdministrator,
        },
    );

    Ok(chain)
}

pub trait ApprovalRouter: Send + Sync {
    fn route(&self, department: &str, grand_total: Decimal) -> Result<ApprovalChain, DomainError>;
}

/// Process-wide threshold configuration. Readers take an immutable snapshot
/// per computation; updates swap in a whole new table.
#[derive(Clone, Debug)]
pub struct SharedThresholdTable {
    current: Arc<RwLock<Arc<ApprovalThresholdTable>>>,
}

impl SharedThresholdTable {
    pub fn new(table: ApprovalThresholdTable) -> Self {
        Self { current: Arc::new(RwLock::new(Arc::new(table))) }
    }

    pub fn snapshot(&self) -> Arc<ApprovalThresholdTable> {
        match self.current.read() {
            Ok(current) => Arc::clone(&*current),
            Err(poisoned) => Arc::clone(&*poisoned.into_inner()),
        }
    }

    pub fn replace(&self, table: ApprovalThresholdTable) {
        let table = Arc::new(table);
        match self.current.write() {
            Ok(mut current) => *current = table,
            Err(poisoned) => *poisoned.into_inner() = table,
        }
    }
}

impl Default for SharedThresholdTable {
    fn default() -> Self {
        Self::new(ApprovalThresholdTable::default())
    }
}

#[derive(Clone, Debug, Default)]
pub struct ThresholdApprovalRouter {
    table: SharedThresholdTable,
}

impl ThresholdApprovalRouter {
    pub fn new(table: SharedThresholdTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &SharedThresholdTable {
        &self.table
    }
}

impl ApprovalRouter for ThresholdApprovalRouter {
    fn route(&self, department: &str, grand_total: Decimal) -> Result<ApprovalChain, DomainError> {
        let table = self.table.snapshot();
        resolve_approval_chain(department, grand_total, &table)
    }
}
