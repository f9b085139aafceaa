//! Handoff contracts for data crossing stage boundaries.
//!
//! This module provides:
//! - The three stage boundaries and their envelope fields
//! - Shallow, pure validation of handoff payloads
//! - Structured diagnostics for contract violations

mod errors;
mod handoff;

pub use errors::{codes, ContractErrorInfo};
pub use handoff::{
    validate, validate_content_to_design, validate_delivery_receipt,
    validate_design_to_quality, validate_quality_to_delivery, Boundary, HandoffPayload,
    ValidatedHandoff,
};
