use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::{Error, Result};

/// Identity of a medicine across catalog and pending queue.
/// Matching is exact and case-sensitive on both fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MedicineKey {
    pub brand_name: String,
    pub manufacturer: String,
}

impl MedicineKey {
    pub fn new(brand_name: impl Into<String>, manufacturer: impl Into<String>) -> Self {
        Self {
            brand_name: brand_name.into(),
            manufacturer: manufacturer.into(),
        }
    }
}

impl std::fmt::Display for MedicineKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.brand_name, self.manufacturer)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationStatus {
    Pending,
    Approved,
    Rejected,
}

impl VerificationStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
        }
    }
}

impl std::fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for VerificationStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "APPROVED" => Ok(Self::Approved),
            "REJECTED" => Ok(Self::Rejected),
            _ => Err(Error::InvalidStatus(s.to_string())),
        }
    }
}

/// Medicine fields as returned by the structuring model.
///
/// Descriptive fields are kept as raw JSON because the model is free to answer
/// with a string, an array or an object for any of them. Key fields and the
/// critical flag read an explicit `null` the same as a missing key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedMedicine {
    #[serde(default, deserialize_with = "null_as_default")]
    pub brand_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub manufacturer: String,
    #[serde(default)]
    pub generic: Value,
    #[serde(default)]
    pub category: Value,
    #[serde(default)]
    pub dosage: Value,
    #[serde(default)]
    pub uses: Value,
    #[serde(default)]
    pub side_effects: Value,
    #[serde(default)]
    pub warnings: Value,
    #[serde(default)]
    pub food_instructions: Value,
    #[serde(default, alias = "critical", deserialize_with = "null_as_default")]
    pub is_critical: bool,
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl ParsedMedicine {
    pub fn new(brand_name: impl Into<String>, manufacturer: impl Into<String>) -> Self {
        Self {
            brand_name: brand_name.into(),
            manufacturer: manufacturer.into(),
            generic: Value::Null,
            category: Value::Null,
            dosage: Value::Null,
            uses: Value::Null,
            side_effects: Value::Null,
            warnings: Value::Null,
            food_instructions: Value::Null,
            is_critical: false,
        }
    }

    /// Parse the structured text of a successful medicine scan
    pub fn from_json(text: &str) -> Result<Self> {
        let parsed: Self = serde_json::from_str(text)
            .map_err(|e| Error::InvalidMedicine(format!("not a medicine payload: {e}")))?;
        parsed.validate()?;
        Ok(parsed)
    }

    pub fn validate(&self) -> Result<()> {
        if self.brand_name.trim().is_empty() {
            return Err(Error::InvalidMedicine("brand name is empty".into()));
        }
        Ok(())
    }

    pub fn key(&self) -> MedicineKey {
        MedicineKey::new(self.brand_name.clone(), self.manufacturer.clone())
    }
}

/// Render a model-supplied field for storage: strings verbatim, other JSON
/// serialized, null as absent
pub fn field_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// An admin-verified medicine. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: Uuid,
    pub brand_name: String,
    pub generic: Option<String>,
    pub manufacturer: String,
    pub category: Option<String>,
    pub dosage: Option<String>,
    pub uses: Option<String>,
    pub side_effects: Option<String>,
    pub warnings: Option<String>,
    pub food_instructions: Option<String>,
    pub is_critical: bool,
    pub verified_at: DateTime<Utc>,
}

impl CatalogEntry {
    #[must_use]
    pub fn new(brand_name: String, manufacturer: String) -> Self {
        Self {
            id: Uuid::now_v7(),
            brand_name,
            generic: None,
            manufacturer,
            category: None,
            dosage: None,
            uses: None,
            side_effects: None,
            warnings: None,
            food_instructions: None,
            is_critical: false,
            verified_at: Utc::now(),
        }
    }

    /// Promote an approved pending entry into a catalog entry
    #[must_use]
    pub fn from_pending(pending: &PendingEntry) -> Self {
        Self {
            id: Uuid::now_v7(),
            brand_name: pending.brand_name.clone(),
            generic: pending.generic.clone(),
            manufacturer: pending.manufacturer.clone(),
            category: pending.category.clone(),
            dosage: pending.dosage.clone(),
            uses: pending.uses.clone(),
            side_effects: pending.side_effects.clone(),
            warnings: pending.warnings.clone(),
            food_instructions: pending.food_instructions.clone(),
            is_critical: pending.is_critical,
            verified_at: Utc::now(),
        }
    }

    pub fn key(&self) -> MedicineKey {
        MedicineKey::new(self.brand_name.clone(), self.manufacturer.clone())
    }
}

/// A scanned medicine awaiting admin verification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingEntry {
    pub id: Uuid,
    pub brand_name: String,
    pub generic: Option<String>,
    pub manufacturer: String,
    pub category: Option<String>,
    pub dosage: Option<String>,
    pub uses: Option<String>,
    pub side_effects: Option<String>,
    pub warnings: Option<String>,
    pub food_instructions: Option<String>,
    pub is_critical: bool,
    pub status: VerificationStatus,
    pub scanned_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
}

impl PendingEntry {
    /// Queue a parsed medicine, copying its fields verbatim
    #[must_use]
    pub fn from_parsed(parsed: &ParsedMedicine) -> Self {
        Self {
            id: Uuid::now_v7(),
            brand_name: parsed.brand_name.clone(),
            generic: field_text(&parsed.generic),
            manufacturer: parsed.manufacturer.clone(),
            category: field_text(&parsed.category),
            dosage: field_text(&parsed.dosage),
            uses: field_text(&parsed.uses),
            side_effects: field_text(&parsed.side_effects),
            warnings: field_text(&parsed.warnings),
            food_instructions: field_text(&parsed.food_instructions),
            is_critical: parsed.is_critical,
            status: VerificationStatus::Pending,
            scanned_at: Utc::now(),
            decided_at: None,
        }
    }

    pub fn key(&self) -> MedicineKey {
        MedicineKey::new(self.brand_name.clone(), self.manufacturer.clone())
    }
}
