//! The closed set of pipeline stages.

use crate::contracts::Boundary;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the four specialist stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    /// Writes copy and computes pricing.
    Content,
    /// Renders markup and gathers assets.
    Design,
    /// Scores the rendered email.
    Quality,
    /// Hands the approved email to the delivery service.
    Delivery,
}

impl StageName {
    /// All stages in execution order.
    pub const PIPELINE: [Self; 4] = [Self::Content, Self::Design, Self::Quality, Self::Delivery];

    /// Returns the lowercase stage name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Content => "content",
            Self::Design => "design",
            Self::Quality => "quality",
            Self::Delivery => "delivery",
        }
    }

    /// Returns the stage that follows this one, if any.
    #[must_use]
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Content => Some(Self::Design),
            Self::Design => Some(Self::Quality),
            Self::Quality => Some(Self::Delivery),
            Self::Delivery => None,
        }
    }

    /// Returns the contract this stage's output must satisfy.
    #[must_use]
    pub fn output_boundary(self) -> Boundary {
        match self {
            Self::Content => Boundary::ContentToDesign,
            Self::Design => Boundary::DesignToQuality,
            Self::Quality => Boundary::QualityToDelivery,
            Self::Delivery => Boundary::DeliveryReceipt,
        }
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_order_follows_next() {
        let mut walked = vec![StageName::Content];
        while let Some(next) = walked.last().and_then(|stage| stage.next()) {
            walked.push(next);
        }
        assert_eq!(walked, StageName::PIPELINE.to_vec());
    }

    #[test]
    fn test_display_and_serde_agree() {
        for stage in StageName::PIPELINE {
            let json = serde_json::to_string(&stage).unwrap();
            assert_eq!(json, format!("\"{stage}\""));
        }
    }

    #[test]
    fn test_output_boundaries() {
        assert_eq!(StageName::Design.output_boundary(), Boundary::DesignToQuality);
        assert_eq!(StageName::Delivery.output_boundary(), Boundary::DeliveryReceipt);
    }
}
