use std::collections::BTreeMap;
use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub const DEFAULT_SYSTEM_ADMIN: &str = "admin@company.com";

pub const DEFAULT_DEPARTMENT_MANAGERS: &[(&str, &str)] = &[
    ("IT", "it.manager@company.com"),
    ("HR", "hr.manager@company.com"),
    ("Finance", "finance.manager@company.com"),
    ("Operations", "operations.manager@company.com"),
    ("Marketing", "marketing.manager@company.com"),
    ("Administration", "admin.manager@company.com"),
];

/// Spend tiers as `(amount in whole ringgit, approver role, contact)`.
pub const DEFAULT_THRESHOLDS: &[(i64, &str, &str)] = &[
    (1_000, "Finance Team", "finance.team@company.com"),
    (5_000, "CEO", "ceo@company.com"),
];

/// A notification recipient. Identity is the trimmed, lower-cased address so
/// that the same mailbox reached through two tiers compares equal.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String")]
pub struct Contact(String);

impl Contact {
    pub fn new(address: impl AsRef<str>) -> Self {
        Self(address.as_ref().trim().to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Contact {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for Contact {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for Contact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalThreshold {
    pub amount: Decimal,
    pub approver_role: String,
    pub contact: Contact,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartmentRoute {
    pub department: String,
    pub manager: Contact,
}

/// Department managers, ordered spend thresholds and the administrator that
/// closes every chain. Thresholds are kept sorted ascending by amount
/// regardless of the order they were declared in, so [`ApprovalThresholdTable::new`]
/// is the only way to build one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ApprovalThresholdTable {
    departments: BTreeMap<String, DepartmentRoute>,
    thresholds: Vec<ApprovalThreshold>,
    system_admin: Contact,
}

impl ApprovalThresholdTable {
    pub fn new<I, D>(departments: I, thresholds: Vec<ApprovalThreshold>, system_admin: Contact) -> Self
    where
        I: IntoIterator<Item = (D, Contact)>,
        D: Into<String>,
    {
        let departments = departments
            .into_iter()
            .map(|(department, manager)| {
                let department = department.into();
                (
                    department_key(&department),
                    DepartmentRoute { department: department.trim().to_string(), manager },
                )
            })
            .collect();

        let mut thresholds = thresholds;
        thresholds.sort_by(|left, right| left.amount.cmp(&right.amount));

        Self { departments, thresholds, system_admin }
    }

    pub fn manager_for(&self, department: &str) -> Option<&Contact> {
        self.departments.get(&department_key(department)).map(|route| &route.manager)
    }

    pub fn departments(&self) -> impl Iterator<Item = &DepartmentRoute> {
        self.departments.values()
    }

    pub fn thresholds(&self) -> &[ApprovalThreshold] {
        &self.thresholds
    }

    pub fn system_admin(&self) -> &Contact {
        &self.system_admin
    }
}

impl Default for ApprovalThresholdTable {
    fn default() -> Self {
        Self::new(
            DEFAULT_DEPARTMENT_MANAGERS
                .iter()
                .map(|(department, manager)| (*department, Contact::new(manager))),
            DEFAULT_THRESHOLDS
                .iter()
                .map(|(amount, role, contact)| ApprovalThreshold {
                    amount: Decimal::from(*amount),
                    approver_role: (*role).to_string(),
                    contact: Contact::new(contact),
                })
                .collect(),
            Contact::new(DEFAULT_SYSTEM_ADMIN),
        )
    }
}

fn department_key(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}
