use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Source field holding the business key, with its legacy spelling as fallback.
pub const BUSINESS_KEY_FIELDS: [&str; 2] = ["ordencompra", "OrdenCompra"];
pub const STATUS_FIELD: &str = "OrdenStatus";
pub const DEFAULT_FILENAME: &str = "file";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentGroup {
    Feature,
    Exterior,
    Interior,
}

impl AttachmentGroup {
    /// Groups in the order their attachments are submitted.
    pub const ALL: [AttachmentGroup; 3] = [
        AttachmentGroup::Feature,
        AttachmentGroup::Exterior,
        AttachmentGroup::Interior,
    ];

    pub fn source_field(&self) -> &'static str {
        match self {
            AttachmentGroup::Feature => "Foto",
            AttachmentGroup::Exterior => "fotos_exterior_archivos",
            AttachmentGroup::Interior => "fotos_interior_archivos",
        }
    }

    pub fn cache_column(&self) -> &'static str {
        match self {
            AttachmentGroup::Feature => "feature_image",
            AttachmentGroup::Exterior => "fotos_exterior",
            AttachmentGroup::Interior => "fotos_interior",
        }
    }
}

impl Display for AttachmentGroup {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            AttachmentGroup::Feature => write!(f, "feature"),
            AttachmentGroup::Exterior => write!(f, "exterior"),
            AttachmentGroup::Interior => write!(f, "interior"),
        }
    }
}

/// One file attached to a source record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttachmentRef {
    pub url: String,
    pub filename: String,
    pub mime_type: Option<String>,
}

impl AttachmentRef {
    /// Parse one attachment object; `None` when it carries no usable URL.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let url = obj
            .get("url")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|u| !u.is_empty())?;
        let filename = obj
            .get("filename")
            .and_then(Value::as_str)
            .filter(|f| !f.trim().is_empty())
            .unwrap_or(DEFAULT_FILENAME);
        let mime_type = obj.get("type").and_then(Value::as_str).map(str::to_string);

        Some(Self {
            url: url.to_string(),
            filename: filename.to_string(),
            mime_type,
        })
    }
}

/// Snapshot of one inventory record as read from the tabular source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRecord {
    pub id: String,
    pub business_key: Option<String>,
    pub status: Option<String>,
    pub feature: Vec<AttachmentRef>,
    pub exterior: Vec<AttachmentRef>,
    pub interior: Vec<AttachmentRef>,
}

impl SourceRecord {
    /// Build a record from the source's loosely-typed field map.
    ///
    /// Attachment fields that are not arrays are ignored, as are entries without a URL.
    pub fn from_fields(id: impl Into<String>, fields: &Map<String, Value>) -> Self {
        // Legacy spelling is consulted only when the primary field is absent or null;
        // a present but blank key leaves the record without one.
        let business_key = BUSINESS_KEY_FIELDS
            .iter()
            .find_map(|name| fields.get(*name).filter(|v| !v.is_null()))
            .and_then(scalar_to_string);
        let status = fields.get(STATUS_FIELD).and_then(scalar_to_string);

        let attachments = |group: AttachmentGroup| -> Vec<AttachmentRef> {
            match fields.get(group.source_field()) {
                Some(Value::Array(items)) => {
                    items.iter().filter_map(AttachmentRef::from_value).collect()
                }
                _ => Vec::new(),
            }
        };

        Self {
            id: id.into(),
            business_key,
            status,
            feature: attachments(AttachmentGroup::Feature),
            exterior: attachments(AttachmentGroup::Exterior),
            interior: attachments(AttachmentGroup::Interior),
        }
    }

    pub fn has_status(&self, expected: &str) -> bool {
        self.status.as_deref() == Some(expected)
    }

    pub fn attachments(&self, group: AttachmentGroup) -> &[AttachmentRef] {
        match group {
            AttachmentGroup::Feature => &self.feature,
            AttachmentGroup::Exterior => &self.exterior,
            AttachmentGroup::Interior => &self.interior,
        }
    }

    pub fn attachment_count(&self) -> usize {
        self.feature.len() + self.exterior.len() + self.interior.len()
    }

    /// One task per attachment in submission order (feature, exterior, interior).
    ///
    /// Empty when the record has no business key.
    pub fn tasks(&self) -> Vec<AttachmentTask> {
        let Some(business_key) = self.business_key.as_deref() else {
            return Vec::new();
        };

        AttachmentGroup::ALL
            .iter()
            .flat_map(|group| {
                self.attachments(*group)
                    .iter()
                    .map(move |attachment| (*group, attachment))
            })
            .enumerate()
            .map(|(index, (group, attachment))| AttachmentTask {
                business_key: business_key.to_string(),
                group,
                filename: attachment.filename.clone(),
                url: attachment.url.clone(),
                index,
            })
            .collect()
    }
}

/// Work unit for one attachment of one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentTask {
    pub business_key: String,
    pub group: AttachmentGroup,
    pub filename: String,
    pub url: String,
    /// Position within the record's submission order.
    pub index: usize,
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
