use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::approval::Contact;
use crate::errors::DomainError;
use crate::pricing::{line_amount, out_of_range, ComputedTotals};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequisitionId(pub String);

impl RequisitionId {
    /// `REQ-{year}-{last six digits of the epoch milliseconds}`.
    pub fn generate(at: DateTime<Utc>) -> Self {
        Self(format!("REQ-{}-{:06}", at.year(), at.timestamp_millis().rem_euclid(1_000_000)))
    }
}

impl fmt::Display for RequisitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ItemCategory {
    OfficeSupplies,
    ItEquipment,
    Furniture,
    Software,
    Services,
    Maintenance,
}

impl ItemCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OfficeSupplies => "office-supplies",
            Self::ItEquipment => "it-equipment",
            Self::Furniture => "furniture",
            Self::Software => "software",
            Self::Services => "services",
            Self::Maintenance => "maintenance",
        }
    }
}

impl FromStr for ItemCategory {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "office-supplies" => Ok(Self::OfficeSupplies),
            "it-equipment" => Ok(Self::ItEquipment),
            "furniture" => Ok(Self::Furniture),
            "software" => Ok(Self::Software),
            "services" => Ok(Self::Services),
            "maintenance" => Ok(Self::Maintenance),
            other => Err(DomainError::invalid_input(
                "category",
                format!("unsupported category `{other}`"),
            )),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

impl FromStr for Priority {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "normal" => Ok(Self::Normal),
            "high" => Ok(Self::High),
            "urgent" => Ok(Self::Urgent),
            other => Err(DomainError::invalid_input(
                "priority",
                format!("unsupported priority `{other}` (expected low|normal|high|urgent)"),
            )),
        }
    }
}

/// One purchasable entry on a draft. `line_total` is derived and kept in step
/// with quantity and unit price through the setters, which refuse any change
/// whose total would not fit a `Decimal`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LineItem {
    pub id: u32,
    pub description: String,
    quantity: i64,
    unit_price: Decimal,
    pub category: Option<ItemCategory>,
    pub specifications: Option<String>,
    line_total: Decimal,
}

impl LineItem {
    pub fn new(
        id: u32,
        description: impl Into<String>,
        quantity: i64,
        unit_price: Decimal,
        category: Option<ItemCategory>,
    ) -> Result<Self, DomainError> {
        Ok(Self {
            id,
            description: description.into(),
            quantity,
            unit_price,
            category,
            specifications: None,
            line_total: checked_line_total(quantity, unit_price)?,
        })
    }

    pub fn blank(id: u32) -> Self {
        Self {
            id,
            description: String::new(),
            quantity: 1,
            unit_price: Decimal::ZERO,
            category: None,
            specifications: None,
            line_total: Decimal::ZERO,
        }
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn unit_price(&self) -> Decimal {
        self.unit_price
    }

    pub fn line_total(&self) -> Decimal {
        self.line_total
    }

    /// Leaves the item untouched when the new total is out of range.
    pub fn set_quantity(&mut self, quantity: i64) -> Result<(), DomainError> {
        self.line_total = checked_line_total(quantity, self.unit_price)?;
        self.quantity = quantity;
        Ok(())
    }

    pub fn set_unit_price(&mut self, unit_price: Decimal) -> Result<(), DomainError> {
        self.line_total = checked_line_total(self.quantity, unit_price)?;
        self.unit_price = unit_price;
        Ok(())
    }

    fn validate_for_submission(&self, index: usize) -> Result<(), DomainError> {
        if self.description.trim().is_empty() {
            return Err(DomainError::invalid_input(
                format!("items[{index}].description"),
                "description is required",
            ));
        }
        if self.quantity < 1 {
            return Err(DomainError::invalid_input(
                format!("items[{index}].quantity"),
                "quantity must be at least 1",
            ));
        }
        if self.unit_price < Decimal::ZERO {
            return Err(DomainError::invalid_input(
                format!("items[{index}].unit_price"),
                "unit price must not be negative",
            ));
        }
        if self.category.is_none() {
            return Err(DomainError::invalid_input(
                format!("items[{index}].category"),
                "category is required",
            ));
        }
        Ok(())
    }
}

fn checked_line_total(quantity: i64, unit_price: Decimal) -> Result<Decimal, DomainError> {
    line_amount(quantity, unit_price).ok_or_else(|| out_of_range("unit_price"))
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ItemUpdate {
    Description(String),
    Quantity(i64),
    UnitPrice(Decimal),
    Category(Option<ItemCategory>),
    Specifications(Option<String>),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RequisitionDraft {
    pub title: String,
    pub department: String,
    pub cost_center: Option<String>,
    pub justification: Option<String>,
    pub priority: Priority,
    pub expected_date: Option<NaiveDate>,
    pub vendor: Option<String>,
    items: Vec<LineItem>,
    #[serde(skip)]
    next_item_id: u32,
}

impl Default for RequisitionDraft {
    fn default() -> Self {
        Self::new()
    }
}

impl RequisitionDraft {
    /// A fresh draft holds a single blank line item, ready for editing.
    pub fn new() -> Self {
        Self {
            title: String::new(),
            department: String::new(),
            cost_center: None,
            justification: None,
            priority: Priority::Normal,
            expected_date: None,
            vendor: None,
            items: vec![LineItem::blank(1)],
            next_item_id: 2,
        }
    }

    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    pub fn item(&self, item_id: u32) -> Option<&LineItem> {
        self.items.iter().find(|item| item.id == item_id)
    }

    pub fn add_item(&mut self) -> u32 {
        let id = self.allocate_item_id();
        self.items.push(LineItem::blank(id));
        id
    }

    pub fn push_item(
        &mut self,
        description: impl Into<String>,
        quantity: i64,
        unit_price: Decimal,
        category: Option<ItemCategory>,
    ) -> Result<u32, DomainError> {
        let item = LineItem::new(self.next_item_id, description, quantity, unit_price, category)?;
        let id = self.allocate_item_id();
        self.items.push(item);
        Ok(id)
    }

    pub fn remove_item(&mut self, item_id: u32) -> Result<LineItem, DomainError> {
        let position = self
            .items
            .iter()
            .position(|item| item.id == item_id)
            .ok_or(DomainError::ItemNotFound { item_id })?;
        Ok(self.items.remove(position))
    }

    pub fn update_item(&mut self, item_id: u32, update: ItemUpdate) -> Result<&LineItem, DomainError> {
        let item = self
            .items
            .iter_mut()
            .find(|item| item.id == item_id)
            .ok_or(DomainError::ItemNotFound { item_id })?;

        match update {
            ItemUpdate::Description(description) => item.description = description,
            ItemUpdate::Quantity(quantity) => item.set_quantity(quantity)?,
            ItemUpdate::UnitPrice(unit_price) => item.set_unit_price(unit_price)?,
            ItemUpdate::Category(category) => item.category = category,
            ItemUpdate::Specifications(specifications) => item.specifications = specifications,
        }

        Ok(&*item)
    }

    pub fn validate_for_submission(&self) -> Result<(), DomainError> {
        if self.title.trim().is_empty() {
            return Err(DomainError::invalid_input("title", "title is required"));
        }
        if self.department.trim().is_empty() {
            return Err(DomainError::invalid_input("department", "department is required"));
        }
        if self.items.is_empty() {
            return Err(DomainError::EmptyRequisition);
        }
        for (index, item) in self.items.iter().enumerate() {
            item.validate_for_submission(index)?;
        }
        Ok(())
    }

    fn allocate_item_id(&mut self) -> u32 {
        let id = self.next_item_id;
        self.next_item_id += 1;
        id
    }
}

/// Wire shape of a draft as supplied by a caller. Converting it into a
/// [`RequisitionDraft`] is the validation boundary for untyped input.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct DraftDocument {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub cost_center: Option<String>,
    #[serde(default)]
    pub justification: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub expected_date: Option<NaiveDate>,
    #[serde(default)]
    pub vendor: Option<String>,
    #[serde(default)]
    pub items: Vec<LineItemInput>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct LineItemInput {
    #[serde(default)]
    pub description: String,
    pub quantity: i64,
    /// Read from the JSON number's literal digits (or a quoted string), never
    /// through a binary float.
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    pub unit_price: Decimal,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub specifications: Option<String>,
}

impl TryFrom<DraftDocument> for RequisitionDraft {
    type Error = DomainError;

    fn try_from(document: DraftDocument) -> Result<Self, Self::Error> {
        let priority = match document.priority.as_deref() {
            Some(raw) if !raw.trim().is_empty() => raw.parse()?,
            _ => Priority::default(),
        };

        let mut draft = Self {
            title: document.title,
            department: document.department,
            cost_center: document.cost_center,
            justification: document.justification,
            priority,
            expected_date: document.expected_date,
            vendor: document.vendor,
            items: Vec::with_capacity(document.items.len()),
            next_item_id: 1,
        };

        for (index, input) in document.items.into_iter().enumerate() {
            let category = match input.category.as_deref() {
                Some(raw) if !raw.trim().is_empty() => {
                    Some(raw.parse::<ItemCategory>().map_err(|_| {
                        DomainError::invalid_input(
                            format!("items[{index}].category"),
                            format!("unsupported category `{}`", raw.trim()),
                        )
                    })?)
                }
                _ => None,
            };

            let id = draft
                .push_item(input.description, input.quantity, input.unit_price, category)
                .map_err(|_| out_of_range(format!("items[{index}].unit_price")))?;
            draft.update_item(id, ItemUpdate::Specifications(input.specifications))?;
        }

        Ok(draft)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequisitionStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalDecision {
    pub approver: Contact,
    pub outcome: RequisitionStatus,
    pub comments: Option<String>,
    pub decided_at: DateTime<Utc>,
}

/// A submitted draft, frozen together with the totals it was priced at.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Requisition {
    pub id: RequisitionId,
    pub title: String,
    pub department: String,
    pub cost_center: Option<String>,
    pub justification: Option<String>,
    pub priority: Priority,
    pub expected_date: Option<NaiveDate>,
    pub vendor: Option<String>,
    pub requestor: String,
    pub items: Vec<LineItem>,
    pub totals: ComputedTotals,
    pub status: RequisitionStatus,
    pub submitted_at: DateTime<Utc>,
    pub decision: Option<ApprovalDecision>,
}

impl Requisition {
    pub fn from_draft(
        draft: RequisitionDraft,
        id: RequisitionId,
        requestor: impl Into<String>,
        totals: ComputedTotals,
        submitted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            title: draft.title,
            department: draft.department,
            cost_center: draft.cost_center,
            justification: draft.justification,
            priority: draft.priority,
            expected_date: draft.expected_date,
            vendor: draft.vendor,
            requestor: requestor.into(),
            items: draft.items,
            totals,
            status: RequisitionStatus::Pending,
            submitted_at,
            decision: None,
        }
    }

    pub fn can_transition_to(&self, next: RequisitionStatus) -> bool {
        matches!(
            (self.status, next),
            (RequisitionStatus::Pending, RequisitionStatus::Approved)
                | (RequisitionStatus::Pending, RequisitionStatus::Rejected)
        )
    }

    pub fn approve(
        &mut self,
        approver: Contact,
        comments: Option<String>,
        decided_at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        self.decide(RequisitionStatus::Approved, approver, comments, decided_at)
    }

    pub fn reject(
        &mut self,
        approver: Contact,
        comments: Option<String>,
        decided_at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        self.decide(RequisitionStatus::Rejected, approver, comments, decided_at)
    }

    fn decide(
        &mut self,
        outcome: RequisitionStatus,
        approver: Contact,
        comments: Option<String>,
        decided_at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if !self.can_transition_to(outcome) {
            return Err(DomainError::InvalidRequisitionTransition { from: self.status, to: outcome });
        }

        self.status = outcome;
        self.decision = Some(ApprovalDecision { approver, outcome, comments, decided_at });
        Ok(())
    }
}
