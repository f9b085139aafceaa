//! Data model for the generation state.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Structured route pricing computed alongside the copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceData {
    /// Individual route quotes.
    #[serde(default)]
    pub routes: Vec<RouteEntry>,
    /// Currency the quotes default to.
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_currency() -> String {
    "EUR".to_string()
}

/// One quoted route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteEntry {
    /// Origin airport or city code.
    pub origin: String,
    /// Destination airport or city code.
    pub destination: String,
    /// Quoted price.
    pub price: f64,
    /// Overrides [`PriceData::currency`] for this entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    /// Outbound date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub departure_date: Option<NaiveDate>,
    /// Return date, absent for one-way quotes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_date: Option<NaiveDate>,
}

/// A visual or media reference used by the rendered email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetData {
    /// Where the asset lives.
    pub url: String,
    /// Asset kind, e.g. `image` or `video`.
    #[serde(default = "default_asset_kind")]
    pub kind: String,
    /// Alternative text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
}

fn default_asset_kind() -> String {
    "image".to_string()
}

/// Email copy written by the Content stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentData {
    /// Subject line.
    pub subject: String,
    /// Inbox preview text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preheader: Option<String>,
    /// Body copy.
    pub body: String,
    /// Call to action label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cta: Option<String>,
    /// Free-form copy annotations.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

/// Inclusive travel window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    /// First day.
    pub start: NaiveDate,
    /// Last day.
    pub end: NaiveDate,
}

/// Campaign-level facts accumulated by every stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CampaignMetadata {
    /// Campaign topic.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    /// Number of routes examined.
    #[serde(default)]
    pub routes_analyzed: u32,
    /// Travel windows covered.
    #[serde(default)]
    pub date_ranges: Vec<DateRange>,
    /// Number of usable prices found.
    #[serde(default)]
    pub prices_found: u32,
    /// Number of copy variants produced.
    #[serde(default)]
    pub content_variations: u32,
    /// Keys this model does not know about.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CampaignMetadata {
    /// Folds `update` into `self`.
    ///
    /// Counters add, date ranges append without duplicates, a non-empty topic
    /// replaces the previous one, and extra keys are merged key by key.
    pub fn absorb(&mut self, update: Self) {
        if let Some(topic) = update.topic.filter(|topic| !topic.trim().is_empty()) {
            self.topic = Some(topic);
        }
        self.routes_analyzed = self.routes_analyzed.saturating_add(update.routes_analyzed);
        self.prices_found = self.prices_found.saturating_add(update.prices_found);
        self.content_variations = self
            .content_variations
            .saturating_add(update.content_variations);
        for range in update.date_ranges {
            if !self.date_ranges.contains(&range) {
                self.date_ranges.push(range);
            }
        }
        self.extra.extend(update.extra);
    }
}

/// The single record accumulated across one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationState {
    pub(super) brief: String,
    pub(super) current_date: DateTime<Utc>,
    pub(super) prices: Option<PriceData>,
    pub(super) assets: Vec<AssetData>,
    pub(super) copy: Option<ContentData>,
    pub(super) html: Option<String>,
    pub(super) qa_score: Option<f64>,
    pub(super) metadata: CampaignMetadata,
}

impl GenerationState {
    /// Creates the state for a new run.
    pub fn new(brief: impl Into<String>, current_date: DateTime<Utc>) -> Self {
        Self {
            brief: brief.into(),
            current_date,
            prices: None,
            assets: Vec::new(),
            copy: None,
            html: None,
            qa_score: None,
            metadata: CampaignMetadata::default(),
        }
    }

    /// The campaign brief.
    #[must_use]
    pub fn brief(&self) -> &str {
        &self.brief
    }

    /// Reference date for date-dependent content.
    #[must_use]
    pub fn current_date(&self) -> DateTime<Utc> {
        self.current_date
    }

    /// Pricing, once Content has computed it.
    #[must_use]
    pub fn prices(&self) -> Option<&PriceData> {
        self.prices.as_ref()
    }

    /// Assets in the order they were appended.
    #[must_use]
    pub fn assets(&self) -> &[AssetData] {
        &self.assets
    }

    /// Copy, once Content has run.
    #[must_use]
    pub fn copy(&self) -> Option<&ContentData> {
        self.copy.as_ref()
    }

    /// Rendered markup, once Design has run.
    #[must_use]
    pub fn html(&self) -> Option<&str> {
        self.html.as_deref()
    }

    /// Quality score; `0.0` until Quality has run.
    #[must_use]
    pub fn qa_score(&self) -> f64 {
        self.qa_score.unwrap_or(0.0)
    }

    /// Whether Quality has recorded a score.
    #[must_use]
    pub fn has_qa_score(&self) -> bool {
        self.qa_score.is_some()
    }

    /// Accumulated campaign metadata.
    #[must_use]
    pub fn metadata(&self) -> &CampaignMetadata {
        &self.metadata
    }
}
