//! Folding validated stage handoffs into the generation state.

use super::mappers;
use super::model::{AssetData, CampaignMetadata, ContentData, GenerationState, PriceData};
use crate::contracts::ValidatedHandoff;
use crate::errors::PreconditionViolation;
use crate::specialists::StageName;
use serde::de::DeserializeOwned;
use serde_json::Value;

impl GenerationState {
    /// Returns a new state with the output of `stage` folded in.
    ///
    /// | Stage    | Effect |
    /// |----------|--------|
    /// | Content  | sets `copy`, sets `prices` when present, accumulates metadata |
    /// | Design   | sets `html`, appends `assets`, accumulates metadata |
    /// | Quality  | sets `qa_score` (last write wins), accumulates metadata |
    /// | Delivery | no change |
    ///
    /// # Errors
    ///
    /// Returns a [`PreconditionViolation`] when the package lacks a field a
    /// later stage needs, a write-once field is already set, or the handoff
    /// belongs to another stage's boundary.
    pub fn merge(
        mut self,
        stage: StageName,
        handoff: &ValidatedHandoff,
    ) -> Result<Self, PreconditionViolation> {
        if handoff.boundary() != stage.output_boundary() {
            return Err(PreconditionViolation::malformed(
                stage,
                "handoff",
                format!(
                    "expected {} payload, got {}",
                    stage.output_boundary(),
                    handoff.boundary()
                ),
            ));
        }
        let package = handoff.package();

        match stage {
            StageName::Content => {
                if self.copy.is_some() {
                    return Err(PreconditionViolation::already_set(stage, "copy"));
                }
                let copy: ContentData = required(stage, package, "copy")?;
                let prices: Option<PriceData> = optional(stage, package, "prices")?;
                let mut metadata = metadata_update(stage, package)?;
                if let Some(prices) = &prices {
                    if self.prices.is_some() {
                        return Err(PreconditionViolation::already_set(stage, "prices"));
                    }
                    mappers::fill_from_prices(&mut metadata, prices);
                }

                self.copy = Some(copy);
                if prices.is_some() {
                    self.prices = prices;
                }
                self.metadata.absorb(metadata);
            }
            StageName::Design => {
                if self.html.is_some() {
                    return Err(PreconditionViolation::already_set(stage, "html"));
                }
                let html: String = required(stage, package, "html")?;
                if html.trim().is_empty() {
                    return Err(PreconditionViolation::missing(stage, "html"));
                }
                let assets: Option<Vec<AssetData>> = optional(stage, package, "assets")?;
                let metadata = metadata_update(stage, package)?;

                self.html = Some(html);
                self.assets.extend(assets.unwrap_or_default());
                self.metadata.absorb(metadata);
            }
            StageName::Quality => {
                if self.html.is_none() {
                    return Err(PreconditionViolation::missing(stage, "html"));
                }
                let score: f64 = required(stage, package, "score")?;
                if !score.is_finite() || score < 0.0 {
                    return Err(PreconditionViolation::malformed(
                        stage,
                        "score",
                        format!("{score} is not a non-negative number"),
                    ));
                }
                let metadata = metadata_update(stage, package)?;

                self.qa_score = Some(score);
                self.metadata.absorb(metadata);
            }
            StageName::Delivery => {}
        }

        Ok(self)
    }
}

/// Checks that `state` carries everything `stage` consumes.
///
/// # Errors
///
/// Returns the first missing field as a [`PreconditionViolation`].
pub fn check_preconditions(
    stage: StageName,
    state: &GenerationState,
) -> Result<(), PreconditionViolation> {
    let required: &[(&str, bool)] = match stage {
        StageName::Content => &[],
        StageName::Design => &[("copy", state.copy.is_some())],
        StageName::Quality => &[("html", state.html.is_some())],
        StageName::Delivery => &[
            ("copy", state.copy.is_some()),
            ("html", state.html.is_some()),
            ("qa_score", state.qa_score.is_some()),
        ],
    };

    match required.iter().find(|(_, present)| !present) {
        Some((field, _)) => Err(PreconditionViolation::missing(stage, *field)),
        None => Ok(()),
    }
}

fn required<T: DeserializeOwned>(
    stage: StageName,
    package: &Value,
    field: &str,
) -> Result<T, PreconditionViolation> {
    optional(stage, package, field)?.ok_or_else(|| PreconditionViolation::missing(stage, field))
}

fn optional<T: DeserializeOwned>(
    stage: StageName,
    package: &Value,
    field: &str,
) -> Result<Option<T>, PreconditionViolation> {
    match package.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => T::deserialize(value)
            .map(Some)
            .map_err(|err| PreconditionViolation::malformed(stage, field, err)),
    }
}

fn metadata_update(
    stage: StageName,
    package: &Value,
) -> Result<CampaignMetadata, PreconditionViolation> {
    Ok(optional(stage, package, "metadata")?.unwrap_or_default())
}
