//! Weight resolution
//!
//! Picks exactly one weight profile per request. First match wins:
//! explicit profile id, optimization preference, explicit or detected
//! domain, default profile.

use std::sync::Arc;
use tracing::debug;

use crate::classifier::DomainClassifier;
use crate::error::{Error, Result};
use crate::profiles::{WeightProfile, WeightProfileStore};
use crate::selection::types::{RequestContext, ResolutionSource};

/// A resolved profile and why it was chosen
#[derive(Debug, Clone)]
pub struct Resolution {
    pub profile: Arc<WeightProfile>,
    pub source: ResolutionSource,
}

/// Resolves the weight profile for a request
#[derive(Clone)]
pub struct WeightResolver {
    store: Arc<dyn WeightProfileStore>,
    classifier: Arc<dyn DomainClassifier>,
    confidence_threshold: f64,
}

impl std::fmt::Debug for WeightResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeightResolver")
            .field("confidence_threshold", &self.confidence_threshold)
            .finish_non_exhaustive()
    }
}

impl WeightResolver {
    pub fn new(
        store: Arc<dyn WeightProfileStore>,
        classifier: Arc<dyn DomainClassifier>,
        confidence_threshold: f64,
    ) -> Self {
        Self {
            store,
            classifier,
            confidence_threshold,
        }
    }

    pub fn store(&self) -> &Arc<dyn WeightProfileStore> {
        &self.store
    }

    pub fn resolve(&self, request: &RequestContext) -> Result<Resolution> {
        if let Some(id) = &request.profile_id {
            let profile = self
                .store
                .get_profile(id)
                .ok_or_else(|| Error::ProfileNotFound(id.clone()))?;
            debug!(profile = %profile.id, "resolved explicit profile");
            return Ok(Resolution {
                profile,
                source: ResolutionSource::ExplicitProfile,
            });
        }

        if let Some(preference) = request.optimization {
            let profile = self.store.profile_for_optimization(preference);
            debug!(profile = %profile.id, %preference, "resolved optimization profile");
            return Ok(Resolution {
                profile,
                source: ResolutionSource::Optimization { preference },
            });
        }

        if let Some(domain) = request.domain {
            let profile = self.store.profile_for_domain(domain);
            debug!(profile = %profile.id, %domain, "resolved explicit domain profile");
            return Ok(Resolution {
                profile,
                source: ResolutionSource::Domain {
                    domain,
                    confidence: 1.0,
                    detected: false,
                },
            });
        }

        if request.content.is_some() || request.task_type.is_some() {
            let classification = self
                .classifier
                .classify(request.content.as_deref(), request.task_type.as_deref());

            if classification.confidence >= self.confidence_threshold {
                let profile = self.store.profile_for_domain(classification.domain);
                debug!(
                    profile = %profile.id,
                    domain = %classification.domain,
                    confidence = classification.confidence,
                    "resolved detected domain profile"
                );
                return Ok(Resolution {
                    profile,
                    source: ResolutionSource::Domain {
                        domain: classification.domain,
                        confidence: classification.confidence,
                        detected: true,
                    },
                });
            }
            debug!(
                domain = %classification.domain,
                confidence = classification.confidence,
                threshold = self.confidence_threshold,
                "classifier confidence below threshold"
            );
        }

        Ok(Resolution {
            profile: self.store.default_profile(),
            source: ResolutionSource::Default,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{Classification, KeywordClassifier};
    use crate::profiles::ProfileCatalog;
    use crate::selection::types::{Domain, OptimizationPreference};

    struct FixedClassifier(Classification);

    impl DomainClassifier for FixedClassifier {
        fn classify(&self, _text: Option<&str>, _task_type: Option<&str>) -> Classification {
            self.0
        }
    }

    fn resolver() -> WeightResolver {
        WeightResolver::new(
            Arc::new(ProfileCatalog::builtin().unwrap()),
            Arc::new(KeywordClassifier::new()),
            0.6,
        )
    }

    #[test]
    fn test_explicit_profile_wins() {
        let request = RequestContext::new()
            .with_profile("legal")
            .with_optimization(OptimizationPreference::Cost)
            .with_domain(Domain::Healthcare)
            .with_content("patient diagnosis and symptoms");

        let resolution = resolver().resolve(&request).unwrap();

        assert_eq!(resolution.profile.id, "legal");
        assert_eq!(resolution.source, ResolutionSource::ExplicitProfile);
    }

    #[test]
    fn test_unknown_profile_is_error() {
        let request = RequestContext::new().with_profile("nope");
        let err = resolver().resolve(&request).unwrap_err();
        assert!(matches!(err, Error::ProfileNotFound(ref id) if id == "nope"));
    }

    #[test]
    fn test_optimization_beats_domain() {
        let request = RequestContext::new()
            .with_optimization(OptimizationPreference::Latency)
            .with_domain(Domain::Healthcare);

        let resolution = resolver().resolve(&request).unwrap();

        assert_eq!(resolution.profile.id, "latency");
        assert_eq!(
            resolution.source,
            ResolutionSource::Optimization {
                preference: OptimizationPreference::Latency
            }
        );
    }

    #[test]
    fn test_explicit_domain() {
        let request = RequestContext::new().with_domain(Domain::Healthcare);
        let resolution = resolver().resolve(&request).unwrap();

        assert_eq!(resolution.profile.id, "healthcare");
        assert_eq!(resolution.profile.min_quality, Some(80.0));
    }

    #[test]
    fn test_detected_domain_above_threshold() {
        let resolver = WeightResolver::new(
            Arc::new(ProfileCatalog::builtin().unwrap()),
            Arc::new(FixedClassifier(Classification::new(Domain::Financial, 0.8))),
            0.6,
        );
        let resolution = resolver
            .resolve(&RequestContext::new().with_content("anything"))
            .unwrap();

        assert_eq!(resolution.profile.id, "financial");
        assert!(matches!(
            resolution.source,
            ResolutionSource::Domain { detected: true, .. }
        ));
    }

    #[test]
    fn test_low_confidence_falls_through_to_default() {
        let resolver = WeightResolver::new(
            Arc::new(ProfileCatalog::builtin().unwrap()),
            Arc::new(FixedClassifier(Classification::new(Domain::Legal, 0.59))),
            0.6,
        );
        let resolution = resolver
            .resolve(&RequestContext::new().with_content("anything"))
            .unwrap();

        assert_eq!(resolution.profile.id, "general");
        assert_eq!(resolution.source, ResolutionSource::Default);
    }

    #[test]
    fn test_empty_request_uses_default() {
        let resolution = resolver().resolve(&RequestContext::new()).unwrap();
        assert_eq!(resolution.profile.id, "general");
    }
}
