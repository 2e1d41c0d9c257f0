//! Domain classification
//!
//! Maps free-text request content and/or an explicit task-type tag onto one
//! of the fixed [`Domain`]s with a confidence value. The engine only relies
//! on the [`DomainClassifier`] contract; [`KeywordClassifier`] is the
//! built-in implementation.

use serde::{Deserialize, Serialize};

use crate::selection::types::Domain;

/// Result of classifying a request
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub domain: Domain,
    /// Confidence in [0.0, 1.0]
    pub confidence: f64,
}

impl Classification {
    pub fn new(domain: Domain, confidence: f64) -> Self {
        Self {
            domain,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// Default domain with no confidence
    pub fn fallback() -> Self {
        Self::new(Domain::General, 0.0)
    }
}

/// Pluggable domain classifier
pub trait DomainClassifier: Send + Sync {
    fn classify(&self, text: Option<&str>, task_type: Option<&str>) -> Classification;
}

const TASK_TYPE_CONFIDENCE: f64 = 0.95;
const MAX_KEYWORD_CONFIDENCE: f64 = 0.95;

/// Keyword table per domain, in tie-break order
const KEYWORDS: &[(Domain, &[&str])] = &[
    (
        Domain::Healthcare,
        &[
            "patient", "diagnosis", "symptom", "symptoms", "medical", "clinical", "medication",
            "dosage", "treatment", "disease", "doctor", "hospital", "prescription", "therapy",
        ],
    ),
    (
        Domain::Legal,
        &[
            "contract", "agreement", "clause", "lawsuit", "court", "statute", "liability",
            "legal", "attorney", "compliance", "regulation", "litigation", "plaintiff",
        ],
    ),
    (
        Domain::Financial,
        &[
            "invoice", "revenue", "portfolio", "stock", "trading", "trade", "accounting",
            "budget", "tax", "audit", "loan", "interest", "payment", "financial",
        ],
    ),
    (
        Domain::Scientific,
        &[
            "hypothesis", "experiment", "theorem", "equation", "physics", "chemistry",
            "molecule", "quantum", "proof", "statistical", "biology",
        ],
    ),
    (
        Domain::Coding,
        &[
            "code", "function", "bug", "compile", "rust", "python", "javascript", "refactor",
            "api", "debug", "stacktrace", "repository", "unit", "test",
        ],
    ),
    (
        Domain::Creative,
        &[
            "story", "poem", "novel", "character", "lyrics", "slogan", "fiction", "creative",
            "screenplay", "brainstorm",
        ],
    ),
    (
        Domain::Education,
        &[
            "explain", "lesson", "student", "homework", "teach", "curriculum", "quiz",
            "learn", "tutorial",
        ],
    ),
    (
        Domain::CustomerSupport,
        &[
            "refund", "order", "account", "password", "subscription", "cancel", "shipping",
            "complaint", "ticket",
        ],
    ),
    (
        Domain::Research,
        &[
            "research", "literature", "survey", "sources", "citation", "citations", "study",
            "papers", "investigate", "compare",
        ],
    ),
];

/// Keyword-counting classifier
#[derive(Debug, Clone, Default)]
pub struct KeywordClassifier;

impl KeywordClassifier {
    pub fn new() -> Self {
        Self
    }

    fn classify_task_type(task_type: &str) -> Option<Classification> {
        let normalized = task_type.trim().to_lowercase().replace([' ', '-'], "_");
        if let Ok(domain) = normalized.parse::<Domain>() {
            return Some(Classification::new(domain, TASK_TYPE_CONFIDENCE));
        }

        let domain = match normalized.as_str() {
            "diagnosis" | "clinical_summary" | "triage" => Domain::Healthcare,
            "contract_review" | "case_analysis" => Domain::Legal,
            "risk_analysis" | "trade_review" | "bookkeeping" => Domain::Financial,
            "code_review" | "code_generation" | "debugging" => Domain::Coding,
            "copywriting" | "storytelling" => Domain::Creative,
            "tutoring" => Domain::Education,
            "support_ticket" | "chat_support" => Domain::CustomerSupport,
            "literature_review" => Domain::Research,
            _ => return None,
        };
        Some(Classification::new(domain, TASK_TYPE_CONFIDENCE))
    }

    fn classify_text(text: &str) -> Classification {
        let lowered = text.to_lowercase();
        let tokens: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .collect();

        let mut best: Option<(Domain, usize)> = None;
        for (domain, keywords) in KEYWORDS {
            let hits = tokens.iter().filter(|t| keywords.contains(*t)).count();
            if hits > 0 && best.is_none_or(|(_, top)| hits > top) {
                best = Some((*domain, hits));
            }
        }

        match best {
            Some((domain, hits)) => Classification::new(
                domain,
                (0.45 + 0.15 * hits as f64).min(MAX_KEYWORD_CONFIDENCE),
            ),
            None => Classification::fallback(),
        }
    }
}

impl DomainClassifier for KeywordClassifier {
    fn classify(&self, text: Option<&str>, task_type: Option<&str>) -> Classification {
        if let Some(classification) = task_type.and_then(Self::classify_task_type) {
            return classification;
        }
        match text {
            Some(text) if !text.trim().is_empty() => Self::classify_text(text),
            _ => Classification::fallback(),
        }
    }
}
