//! Envelope validation for the payloads handed from one specialist to the next.
//!
//! Validation is deliberately shallow: a contract only checks that the stage
//! output is an object carrying its envelope field(s) with a non-null value.
//! What lives inside the envelope is opaque here.

use super::errors::{codes, ContractErrorInfo};
use crate::errors::SchemaViolation;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// A stage boundary guarded by a handoff contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Boundary {
    /// Content output consumed by Design.
    ContentToDesign,
    /// Design output consumed by Quality.
    DesignToQuality,
    /// Quality output consumed by Delivery.
    QualityToDelivery,
    /// Delivery output returned to the caller.
    DeliveryReceipt,
}

impl Boundary {
    /// Envelope fields that must be present and non-null.
    #[must_use]
    pub fn required_fields(self) -> &'static [&'static str] {
        match self {
            Self::ContentToDesign => &["content_package"],
            Self::DesignToQuality => &["email_package"],
            Self::QualityToDelivery => &["quality_package", "email_package"],
            Self::DeliveryReceipt => &["delivery_receipt"],
        }
    }
}

impl fmt::Display for Boundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ContentToDesign => write!(f, "content_to_design"),
            Self::DesignToQuality => write!(f, "design_to_quality"),
            Self::QualityToDelivery => write!(f, "quality_to_delivery"),
            Self::DeliveryReceipt => write!(f, "delivery_receipt"),
        }
    }
}

/// A handoff envelope with an opaque inner value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "boundary", rename_all = "snake_case")]
pub enum HandoffPayload {
    /// Content package for the Design stage.
    ContentToDesign {
        /// Copy, pricing and metadata produced by Content.
        content_package: Value,
    },
    /// Email package for the Quality stage.
    DesignToQuality {
        /// Rendered markup and assets produced by Design.
        email_package: Value,
    },
    /// Quality report plus the approved email for Delivery.
    QualityToDelivery {
        /// Score and findings produced by Quality.
        quality_package: Value,
        /// The email package as approved by Quality.
        email_package: Value,
    },
    /// Receipt returned by Delivery.
    DeliveryReceipt {
        /// External delivery receipt.
        delivery_receipt: Value,
    },
}

impl HandoffPayload {
    /// Returns the boundary this envelope belongs to.
    #[must_use]
    pub fn boundary(&self) -> Boundary {
        match self {
            Self::ContentToDesign { .. } => Boundary::ContentToDesign,
            Self::DesignToQuality { .. } => Boundary::DesignToQuality,
            Self::QualityToDelivery { .. } => Boundary::QualityToDelivery,
            Self::DeliveryReceipt { .. } => Boundary::DeliveryReceipt,
        }
    }
}

/// A payload that passed its boundary contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedHandoff {
    payload: HandoffPayload,
}

impl ValidatedHandoff {
    /// Returns the boundary that validated this payload.
    #[must_use]
    pub fn boundary(&self) -> Boundary {
        self.payload.boundary()
    }

    /// Returns the validated envelope.
    #[must_use]
    pub fn payload(&self) -> &HandoffPayload {
        &self.payload
    }

    /// Returns the primary inner value of the envelope.
    #[must_use]
    pub fn package(&self) -> &Value {
        match &self.payload {
            HandoffPayload::ContentToDesign { content_package } => content_package,
            HandoffPayload::DesignToQuality { email_package } => email_package,
            HandoffPayload::QualityToDelivery { quality_package, .. } => quality_package,
            HandoffPayload::DeliveryReceipt { delivery_receipt } => delivery_receipt,
        }
    }

    /// Returns the email package, for boundaries that carry one.
    #[must_use]
    pub fn email_package(&self) -> Option<&Value> {
        match &self.payload {
            HandoffPayload::DesignToQuality { email_package }
            | HandoffPayload::QualityToDelivery { email_package, .. } => Some(email_package),
            _ => None,
        }
    }
}

/// Validates a stage output against the contract of `boundary`.
///
/// Pure: the same payload always produces the same verdict.
pub fn validate(boundary: Boundary, payload: Value) -> Result<ValidatedHandoff, SchemaViolation> {
    let mut fields = match payload {
        Value::Object(fields) => fields,
        other => return Err(not_an_object(boundary, &other)),
    };

    for field in boundary.required_fields() {
        if fields.get(*field).map_or(true, Value::is_null) {
            return Err(missing_envelope(boundary, field, &fields));
        }
    }

    let mut take = |field: &str| fields.remove(field).unwrap_or(Value::Null);
    let payload = match boundary {
        Boundary::ContentToDesign => HandoffPayload::ContentToDesign {
            content_package: take("content_package"),
        },
        Boundary::DesignToQuality => HandoffPayload::DesignToQuality {
            email_package: take("email_package"),
        },
        Boundary::QualityToDelivery => HandoffPayload::QualityToDelivery {
            quality_package: take("quality_package"),
            email_package: take("email_package"),
        },
        Boundary::DeliveryReceipt => HandoffPayload::DeliveryReceipt {
            delivery_receipt: take("delivery_receipt"),
        },
    };

    Ok(ValidatedHandoff { payload })
}

/// Validates a Content stage output.
pub fn validate_content_to_design(payload: Value) -> Result<ValidatedHandoff, SchemaViolation> {
    validate(Boundary::ContentToDesign, payload)
}

/// Validates a Design stage output.
pub fn validate_design_to_quality(payload: Value) -> Result<ValidatedHandoff, SchemaViolation> {
    validate(Boundary::DesignToQuality, payload)
}

/// Validates a Quality stage output.
pub fn validate_quality_to_delivery(payload: Value) -> Result<ValidatedHandoff, SchemaViolation> {
    validate(Boundary::QualityToDelivery, payload)
}

/// Validates a Delivery stage output.
pub fn validate_delivery_receipt(payload: Value) -> Result<ValidatedHandoff, SchemaViolation> {
    validate(Boundary::DeliveryReceipt, payload)
}

fn missing_envelope(boundary: Boundary, field: &str, fields: &Map<String, Value>) -> SchemaViolation {
    let present: Vec<&String> = fields.keys().collect();
    let info = ContractErrorInfo::new(
        codes::MISSING_ENVELOPE,
        format!("payload is missing required field '{field}'"),
    )
    .with_fix_hint(format!(
        "The stage handing off across {boundary} must wrap its output under '{field}'."
    ))
    .with_context("boundary", serde_json::json!(boundary))
    .with_context("present_fields", serde_json::json!(present));

    SchemaViolation {
        boundary,
        field: Some(field.to_string()),
        info,
    }
}

fn not_an_object(boundary: Boundary, payload: &Value) -> SchemaViolation {
    let found = match payload {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    };
    let info = ContractErrorInfo::new(
        codes::NOT_AN_OBJECT,
        format!("payload must be an object, found {found}"),
    )
    .with_context("boundary", serde_json::json!(boundary));

    SchemaViolation {
        boundary,
        field: None,
        info,
    }
}
