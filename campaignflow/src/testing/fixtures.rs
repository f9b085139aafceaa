//! Sample stage outputs and ready-made specialist sets.

use super::mocks::ScriptedSpecialist;
use crate::specialists::{SpecialistSet, StageName};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};
use std::sync::Arc;

/// Reference date used by fixtures: 2025-09-01T09:00:00Z.
#[must_use]
pub fn reference_date() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 9, 1, 9, 0, 0)
        .single()
        .unwrap_or_default()
}

/// Content output for the "Paris flight sale" brief.
#[must_use]
pub fn content_output() -> Value {
    json!({
        "content_package": {
            "copy": {
                "subject": "Paris from £74 this autumn",
                "preheader": "Three days only",
                "body": "Croissants, the Seine and fares that will not last.",
                "cta": "Book now"
            },
            "prices": {
                "currency": "GBP",
                "routes": [
                    {
                        "origin": "LHR",
                        "destination": "CDG",
                        "price": 74.0,
                        "departure_date": "2025-10-03",
                        "return_date": "2025-10-06"
                    },
                    {
                        "origin": "LGW",
                        "destination": "ORY",
                        "price": 89.0,
                        "departure_date": "2025-10-10",
                        "return_date": "2025-10-13"
                    }
                ]
            },
            "metadata": {
                "topic": "paris flight sale",
                "content_variations": 2
            }
        }
    })
}

/// Rendered markup shared by the Design and Quality fixtures.
#[must_use]
pub fn email_html() -> &'static str {
    "<html><body><h1>Paris from £74</h1><a href=\"https://book.example.com\">Book now</a></body></html>"
}

/// Design output.
#[must_use]
pub fn design_output() -> Value {
    json!({
        "email_package": {
            "html": email_html(),
            "assets": [
                {"url": "https://cdn.example.com/paris-hero.jpg", "alt": "Paris skyline"},
                {"url": "https://cdn.example.com/eiffel.jpg", "kind": "image"}
            ],
            "metadata": {"content_variations": 1}
        }
    })
}

/// Quality output, forwarding the approved email.
#[must_use]
pub fn quality_output() -> Value {
    json!({
        "quality_package": {
            "score": 92,
            "findings": ["alt text missing on one image"]
        },
        "email_package": {"html": email_html()}
    })
}

/// Delivery output.
#[must_use]
pub fn delivery_output() -> Value {
    json!({
        "delivery_receipt": {
            "campaign_id": "cmp-paris-001",
            "status": "queued",
            "provider": "mailer"
        }
    })
}

/// The fixture output for `stage`.
#[must_use]
pub fn output_for(stage: StageName) -> Value {
    match stage {
        StageName::Content => content_output(),
        StageName::Design => design_output(),
        StageName::Quality => quality_output(),
        StageName::Delivery => delivery_output(),
    }
}

/// Scripted specialists that all succeed on the first attempt.
#[must_use]
pub fn happy_specialists() -> SpecialistSet {
    let [content, design, quality, delivery] = StageName::PIPELINE
        .map(|stage| Arc::new(ScriptedSpecialist::succeeding(stage.as_str(), output_for(stage))));
    SpecialistSet::new(content, design, quality, delivery)
}
