//! Select stage: primary, fallback chain and justification

use std::fmt::Write;

use crate::profiles::WeightProfile;
use crate::selection::filter::FilterConstraints;
use crate::selection::rank::RankedCandidate;
use crate::selection::types::ResolutionSource;

/// Contributing dimensions named in a justification
const JUSTIFICATION_FACTORS: usize = 3;

/// Facts from earlier stages that explain a selection
#[derive(Debug, Clone, Copy)]
pub struct SelectionFacts<'a> {
    pub profile: &'a WeightProfile,
    pub resolution: &'a ResolutionSource,
    /// Constraints the filter actually enforced
    pub constraints: &'a FilterConstraints,
    pub eligible: usize,
    pub total: usize,
    pub partial_scoring: bool,
}

/// The chosen worker and its fallbacks
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub primary: RankedCandidate,
    pub fallbacks: Vec<String>,
    pub justification: String,
}

#[derive(Debug, Clone, Copy)]
pub struct SelectStage {
    fallback_count: usize,
}

impl Default for SelectStage {
    fn default() -> Self {
        Self::new(3)
    }
}

impl SelectStage {
    pub fn new(fallback_count: usize) -> Self {
        Self { fallback_count }
    }

    /// Take the top entry and the next `fallback_count`; `None` if nothing ranked
    pub fn select(&self, ranked: Vec<RankedCandidate>, facts: &SelectionFacts<'_>) -> Option<Selection> {
        let mut ranked = ranked.into_iter();
        let primary = ranked.next()?;
        let fallbacks = ranked
            .take(self.fallback_count)
            .map(|candidate| candidate.worker_id)
            .collect();
        let justification = justify(&primary, facts);

        Some(Selection {
            primary,
            fallbacks,
            justification,
        })
    }
}

fn describe_resolution(source: &ResolutionSource) -> String {
    match source {
        ResolutionSource::ExplicitProfile => "requested explicitly".to_string(),
        ResolutionSource::Optimization { preference } => {
            format!("optimizing for {}", preference)
        }
        ResolutionSource::Domain {
            domain,
            detected: false,
            ..
        } => format!("domain {}", domain),
        ResolutionSource::Domain {
            domain,
            confidence,
            detected: true,
        } => format!("detected domain {} at {:.0}% confidence", domain, confidence * 100.0),
        ResolutionSource::Default => "default".to_string(),
    }
}

fn justify(primary: &RankedCandidate, facts: &SelectionFacts<'_>) -> String {
    let mut text = format!(
        "Selected {} (score {:.1}) using profile '{}' ({})",
        primary.worker_id,
        primary.composite,
        facts.profile.id,
        describe_resolution(facts.resolution)
    );

    let factors: Vec<String> = primary
        .contributions(&facts.profile.weights)
        .into_iter()
        .filter(|(_, contribution)| *contribution > 0.0)
        .take(JUSTIFICATION_FACTORS)
        .map(|(dimension, _)| format!("{} {:.0}", dimension, primary.scores.get(dimension)))
        .collect();
    if !factors.is_empty() {
        let _ = write!(text, "; strongest: {}", factors.join(", "));
    }

    let constraints = facts.constraints;
    if !constraints.certifications.is_empty() {
        let certifications: Vec<String> =
            constraints.certifications.iter().map(ToString::to_string).collect();
        let _ = write!(text, "; requires {}", certifications.join(", "));
    }
    if let Some(floor) = constraints.min_quality {
        let _ = write!(text, "; quality floor {:.0}", floor);
    }

    let _ = write!(text, "; {} of {} workers eligible", facts.eligible, facts.total);
    if facts.partial_scoring {
        text.push_str("; partial scoring under latency budget");
    }
    text
}
