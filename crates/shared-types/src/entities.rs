//! # Core Domain Entities
//!
//! Defines the field-level entity representation the audit core works with
//! and the typed budget entities built on top of it.
//!
//! ## Clusters
//!
//! - **Opaque model**: [`FieldValue`], [`FieldMap`], [`EntityKey`], [`EntityRecord`]
//! - **Agreements**: [`Agreement`], [`BudgetLineItem`]
//! - **Funds**: [`Can`], [`CanFundingReceived`], [`CanFundingBudget`]

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::{CoreError, CoreResult};

// =============================================================================
// CLUSTER A: THE OPAQUE MODEL
// =============================================================================

/// Primary-key value of a stored entity.
pub type RowKey = u64;

/// Ordered mapping of field name to value.
///
/// An absent key means "unset"; [`FieldValue::Null`] means an explicit None.
pub type FieldMap = BTreeMap<String, FieldValue>;

/// A single field value.
///
/// Numeric variants compare by value, so `Int(100)` equals `Decimal(100.00)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Decimal(Decimal),
    Text(String),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
    List(Vec<FieldValue>),
}

impl FieldValue {
    /// Value equality across numeric representations.
    pub fn same_value(&self, other: &FieldValue) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Decimal(a), Self::Decimal(b)) => a == b,
            (Self::Int(a), Self::Decimal(b)) | (Self::Decimal(b), Self::Int(a)) => {
                Decimal::from(*a) == *b
            }
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Date(a), Self::Date(b)) => a == b,
            (Self::Timestamp(a), Self::Timestamp(b)) => a == b,
            (Self::List(a), Self::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same_value(y))
            }
            _ => false,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Self::Decimal(d) => Some(*d),
            Self::Int(i) => Some(Decimal::from(*i)),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Decimal(d) if d.fract().is_zero() => i64::try_from(*d).ok(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        self.as_i64().and_then(|i| u64::try_from(i).ok())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Self::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Natural JSON rendering, used for request snapshots in event details.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(i) => Value::from(*i),
            Self::Decimal(d) => Value::String(d.to_string()),
            Self::Text(s) => Value::String(s.clone()),
            Self::Date(d) => Value::String(d.format("%Y-%m-%d").to_string()),
            Self::Timestamp(t) => Value::String(t.to_rfc3339()),
            Self::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
        }
    }
}

impl PartialEq for FieldValue {
    fn eq(&self, other: &Self) -> bool {
        self.same_value(other)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "none"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Decimal(d) => write!(f, "{d}"),
            Self::Text(s) => write!(f, "{s}"),
            Self::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Self::Timestamp(t) => write!(f, "{}", t.to_rfc3339()),
            Self::List(items) => {
                let parts: Vec<String> = items.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", parts.join(", "))
            }
        }
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u64> for FieldValue {
    fn from(value: u64) -> Self {
        match i64::try_from(value) {
            Ok(i) => Self::Int(i),
            Err(_) => Self::Decimal(Decimal::from(value)),
        }
    }
}

impl From<Decimal> for FieldValue {
    fn from(value: Decimal) -> Self {
        Self::Decimal(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Identity of a stored entity: type name plus primary key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKey {
    pub class_name: String,
    pub row_key: RowKey,
}

impl EntityKey {
    pub fn new(class_name: impl Into<String>, row_key: RowKey) -> Self {
        Self {
            class_name: class_name.into(),
            row_key,
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.class_name, self.row_key)
    }
}

/// An entity as the unit of work stores it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub key: EntityKey,
    pub fields: FieldMap,
}

impl EntityRecord {
    pub fn new(key: EntityKey, fields: FieldMap) -> Self {
        Self { key, fields }
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    /// Typed view of this record.
    pub fn to_entity<T: AuditedEntity>(&self) -> CoreResult<T> {
        if self.key.class_name != T::CLASS_NAME {
            return Err(CoreError::Serialization(format!(
                "expected {} but record is {}",
                T::CLASS_NAME,
                self.key
            )));
        }
        T::from_fields(self.key.row_key, &self.fields)
    }
}

/// Conversion between a typed entity and the opaque field model.
pub trait AuditedEntity: Sized {
    /// Class name recorded in audit rows.
    const CLASS_NAME: &'static str;

    fn row_key(&self) -> RowKey;

    /// Every persisted field except the row key.
    fn to_fields(&self) -> FieldMap;

    fn from_fields(row_key: RowKey, fields: &FieldMap) -> CoreResult<Self>;

    fn key(&self) -> EntityKey {
        EntityKey::new(Self::CLASS_NAME, self.row_key())
    }

    fn to_record(&self) -> EntityRecord {
        EntityRecord::new(self.key(), self.to_fields())
    }
}

/// Typed access to a [`FieldMap`] while decoding an entity.
pub struct FieldReader<'a> {
    class_name: &'static str,
    fields: &'a FieldMap,
}

impl<'a> FieldReader<'a> {
    pub fn new(class_name: &'static str, fields: &'a FieldMap) -> Self {
        Self { class_name, fields }
    }

    fn present(&self, name: &str) -> Option<&'a FieldValue> {
        self.fields.get(name).filter(|v| !v.is_null())
    }

    fn invalid(&self, name: &str, expected: &str) -> CoreError {
        CoreError::Serialization(format!(
            "{}.{name}: expected {expected}",
            self.class_name
        ))
    }

    pub fn opt_u64(&self, name: &str) -> CoreResult<Option<u64>> {
        self.present(name)
            .map(|v| v.as_u64().ok_or_else(|| self.invalid(name, "unsigned integer")))
            .transpose()
    }

    pub fn u64(&self, name: &str) -> CoreResult<u64> {
        self.opt_u64(name)?
            .ok_or_else(|| self.invalid(name, "unsigned integer"))
    }

    pub fn opt_i64(&self, name: &str) -> CoreResult<Option<i64>> {
        self.present(name)
            .map(|v| v.as_i64().ok_or_else(|| self.invalid(name, "integer")))
            .transpose()
    }

    pub fn i64(&self, name: &str) -> CoreResult<i64> {
        self.opt_i64(name)?.ok_or_else(|| self.invalid(name, "integer"))
    }

    pub fn opt_decimal(&self, name: &str) -> CoreResult<Option<Decimal>> {
        self.present(name)
            .map(|v| v.as_decimal().ok_or_else(|| self.invalid(name, "decimal")))
            .transpose()
    }

    pub fn decimal(&self, name: &str) -> CoreResult<Decimal> {
        self.opt_decimal(name)?
            .ok_or_else(|| self.invalid(name, "decimal"))
    }

    pub fn opt_text(&self, name: &str) -> CoreResult<Option<String>> {
        self.present(name)
            .map(|v| {
                v.as_text()
                    .map(str::to_string)
                    .ok_or_else(|| self.invalid(name, "text"))
            })
            .transpose()
    }

    pub fn text(&self, name: &str) -> CoreResult<String> {
        self.opt_text(name)?.ok_or_else(|| self.invalid(name, "text"))
    }

    pub fn opt_date(&self, name: &str) -> CoreResult<Option<NaiveDate>> {
        self.present(name)
            .map(|v| v.as_date().ok_or_else(|| self.invalid(name, "date")))
            .transpose()
    }

    pub fn parsed<T: FromStr>(&self, name: &str) -> CoreResult<T> {
        self.text(name)?
            .parse()
            .map_err(|_| self.invalid(name, "known variant"))
    }
}

// =============================================================================
// CLUSTER B: AGREEMENTS
// =============================================================================

/// Kind of agreement. Fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgreementType {
    Contract,
    Grant,
    DirectAllocation,
    Iaa,
}

impl AgreementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Contract => "CONTRACT",
            Self::Grant => "GRANT",
            Self::DirectAllocation => "DIRECT_ALLOCATION",
            Self::Iaa => "IAA",
        }
    }
}

impl FromStr for AgreementType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CONTRACT" => Ok(Self::Contract),
            "GRANT" => Ok(Self::Grant),
            "DIRECT_ALLOCATION" => Ok(Self::DirectAllocation),
            "IAA" => Ok(Self::Iaa),
            other => Err(CoreError::Serialization(format!(
                "unknown agreement type {other}"
            ))),
        }
    }
}

/// Lifecycle of a budget line item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BudgetLineItemStatus {
    Draft,
    Planned,
    InExecution,
    Obligated,
}

impl BudgetLineItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Planned => "PLANNED",
            Self::InExecution => "IN_EXECUTION",
            Self::Obligated => "OBLIGATED",
        }
    }

    /// Human-readable label used in history and notification messages.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Draft => "Draft",
            Self::Planned => "Planned",
            Self::InExecution => "Executing",
            Self::Obligated => "Obligated",
        }
    }
}

impl FromStr for BudgetLineItemStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DRAFT" => Ok(Self::Draft),
            "PLANNED" => Ok(Self::Planned),
            "IN_EXECUTION" => Ok(Self::InExecution),
            "OBLIGATED" => Ok(Self::Obligated),
            other => Err(CoreError::Serialization(format!(
                "unknown budget line item status {other}"
            ))),
        }
    }
}

impl From<BudgetLineItemStatus> for FieldValue {
    fn from(value: BudgetLineItemStatus) -> Self {
        Self::Text(value.as_str().to_string())
    }
}

impl From<AgreementType> for FieldValue {
    fn from(value: AgreementType) -> Self {
        Self::Text(value.as_str().to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agreement {
    pub id: RowKey,
    pub name: String,
    pub agreement_type: AgreementType,
    /// Responsible procurement shop.
    pub awarding_entity_id: Option<u64>,
    pub contract_number: Option<String>,
    pub description: Option<String>,
}

impl AuditedEntity for Agreement {
    const CLASS_NAME: &'static str = "Agreement";

    fn row_key(&self) -> RowKey {
        self.id
    }

    fn to_fields(&self) -> FieldMap {
        crate::field_map! {
            "name" => self.name.clone(),
            "agreement_type" => self.agreement_type,
            "awarding_entity_id" => self.awarding_entity_id,
            "contract_number" => self.contract_number.clone(),
            "description" => self.description.clone(),
        }
    }

    fn from_fields(row_key: RowKey, fields: &FieldMap) -> CoreResult<Self> {
        let r = FieldReader::new(Self::CLASS_NAME, fields);
        Ok(Self {
            id: row_key,
            name: r.text("name")?,
            agreement_type: r.parsed("agreement_type")?,
            awarding_entity_id: r.opt_u64("awarding_entity_id")?,
            contract_number: r.opt_text("contract_number")?,
            description: r.opt_text("description")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetLineItem {
    pub id: RowKey,
    pub agreement_id: u64,
    pub can_id: Option<u64>,
    pub amount: Option<Decimal>,
    pub status: BudgetLineItemStatus,
    pub date_needed: Option<NaiveDate>,
    pub line_description: Option<String>,
}

impl AuditedEntity for BudgetLineItem {
    const CLASS_NAME: &'static str = "BudgetLineItem";

    fn row_key(&self) -> RowKey {
        self.id
    }

    fn to_fields(&self) -> FieldMap {
        crate::field_map! {
            "agreement_id" => self.agreement_id,
            "can_id" => self.can_id,
            "amount" => self.amount,
            "status" => self.status,
            "date_needed" => self.date_needed,
            "line_description" => self.line_description.clone(),
        }
    }

    fn from_fields(row_key: RowKey, fields: &FieldMap) -> CoreResult<Self> {
        let r = FieldReader::new(Self::CLASS_NAME, fields);
        Ok(Self {
            id: row_key,
            agreement_id: r.u64("agreement_id")?,
            can_id: r.opt_u64("can_id")?,
            amount: r.opt_decimal("amount")?,
            status: r.parsed("status")?,
            date_needed: r.opt_date("date_needed")?,
            line_description: r.opt_text("line_description")?,
        })
    }
}

// =============================================================================
// CLUSTER C: FUNDS
// =============================================================================

/// Common Accounting Number: a fund line money is drawn from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Can {
    pub id: RowKey,
    pub number: String,
    pub nickname: Option<String>,
    pub description: Option<String>,
}

impl AuditedEntity for Can {
    const CLASS_NAME: &'static str = "CAN";

    fn row_key(&self) -> RowKey {
        self.id
    }

    fn to_fields(&self) -> FieldMap {
        crate::field_map! {
            "number" => self.number.clone(),
            "nickname" => self.nickname.clone(),
            "description" => self.description.clone(),
        }
    }

    fn from_fields(row_key: RowKey, fields: &FieldMap) -> CoreResult<Self> {
        let r = FieldReader::new(Self::CLASS_NAME, fields);
        Ok(Self {
            id: row_key,
            number: r.text("number")?,
            nickname: r.opt_text("nickname")?,
            description: r.opt_text("description")?,
        })
    }
}

/// Money actually received into a CAN for a fiscal year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanFundingReceived {
    pub id: RowKey,
    pub can_id: u64,
    pub fiscal_year: i64,
    pub funding: Decimal,
    pub notes: Option<String>,
}

impl AuditedEntity for CanFundingReceived {
    const CLASS_NAME: &'static str = "CANFundingReceived";

    fn row_key(&self) -> RowKey {
        self.id
    }

    fn to_fields(&self) -> FieldMap {
        crate::field_map! {
            "can_id" => self.can_id,
            "fiscal_year" => self.fiscal_year,
            "funding" => self.funding,
            "notes" => self.notes.clone(),
        }
    }

    fn from_fields(row_key: RowKey, fields: &FieldMap) -> CoreResult<Self> {
        let r = FieldReader::new(Self::CLASS_NAME, fields);
        Ok(Self {
            id: row_key,
            can_id: r.u64("can_id")?,
            fiscal_year: r.i64("fiscal_year")?,
            funding: r.decimal("funding")?,
            notes: r.opt_text("notes")?,
        })
    }
}

/// Money budgeted for a CAN for a fiscal year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanFundingBudget {
    pub id: RowKey,
    pub can_id: u64,
    pub fiscal_year: i64,
    pub budget: Decimal,
}

impl AuditedEntity for CanFundingBudget {
    const CLASS_NAME: &'static str = "CANFundingBudget";

    fn row_key(&self) -> RowKey {
        self.id
    }

    fn to_fields(&self) -> FieldMap {
        crate::field_map! {
            "can_id" => self.can_id,
            "fiscal_year" => self.fiscal_year,
            "budget" => self.budget,
        }
    }

    fn from_fields(row_key: RowKey, fields: &FieldMap) -> CoreResult<Self> {
        let r = FieldReader::new(Self::CLASS_NAME, fields);
        Ok(Self {
            id: row_key,
            can_id: r.u64("can_id")?,
            fiscal_year: r.i64("fiscal_year")?,
            budget: r.decimal("budget")?,
        })
    }
}
