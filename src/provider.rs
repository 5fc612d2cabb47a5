// Provider selection shared by the OCR, narration and speech registries.
//
// Each capability keeps an ordered list of candidate implementations built
// from the configured priority list. The first candidate that reports itself
// available is used for the whole run.

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::{Result, RecapError};

/// Common surface of every external capability implementation
#[async_trait]
pub trait Provider: Send + Sync {
    /// Short identifier, matches the name used in configuration
    fn name(&self) -> &str;

    /// Whether the provider can be used right now (binary present, API key set, ...)
    async fn is_available(&self) -> bool;
}

/// Availability report for a single provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderStatus {
    pub name: String,
    pub available: bool,
}

/// Pick the first available candidate in priority order
pub async fn select_provider<T>(kind: &str, candidates: Vec<Box<T>>) -> Result<Box<T>>
where
    T: Provider + ?Sized,
{
    for candidate in candidates {
        if candidate.is_available().await {
            info!("Using {} provider: {}", kind, candidate.name());
            return Ok(candidate);
        }
        debug!("{} provider {} is not available", kind, candidate.name());
    }

    Err(RecapError::ProviderUnavailable(kind.to_string()))
}

/// Probe every candidate without selecting one
pub async fn describe_providers<T>(candidates: &[Box<T>]) -> Vec<ProviderStatus>
where
    T: Provider + ?Sized,
{
    let mut statuses = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        statuses.push(ProviderStatus {
            name: candidate.name().to_string(),
            available: candidate.is_available().await,
        });
    }
    statuses
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed {
        name: &'static str,
        available: bool,
    }

    #[async_trait]
    impl Provider for Fixed {
        fn name(&self) -> &str {
            self.name
        }

        async fn is_available(&self) -> bool {
            self.available
        }
    }

    fn candidates() -> Vec<Box<dyn Provider>> {
        vec![
            Box::new(Fixed { name: "openai", available: false }),
            Box::new(Fixed { name: "local", available: true }),
            Box::new(Fixed { name: "silent", available: true }),
        ]
    }

    #[tokio::test]
    async fn test_selects_first_available_in_order() {
        let selected = select_provider("test", candidates()).await.unwrap();
        assert_eq!(selected.name(), "local");
    }

    #[tokio::test]
    async fn test_no_available_provider() {
        let none: Vec<Box<dyn Provider>> = vec![Box::new(Fixed { name: "openai", available: false })];
        let err = select_provider("speech", none).await.err().unwrap();
        assert!(matches!(err, RecapError::ProviderUnavailable(kind) if kind == "speech"));
    }

    #[tokio::test]
    async fn test_describe_keeps_order() {
        let statuses = describe_providers(&candidates()).await;
        let names: Vec<_> = statuses.iter().map(|s| (s.name.as_str(), s.available)).collect();
        assert_eq!(names, vec![("openai", false), ("local", true), ("silent", true)]);
    }

    #[test]
    fn test_empty_candidate_list() {
        let none: Vec<Box<dyn Provider>> = Vec::new();
        let result = tokio_test::block_on(select_provider("ocr", none));
        assert!(result.is_err());
    }
}
