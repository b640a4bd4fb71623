//! Document sampling
//!
//! Pulls a bounded sample of documents from one collection through a
//! [`DatabaseClient`]. Two policies are available:
//!
//! - `head` takes the first documents in cursor order and passes the limit to
//!   the client as a page hint
//! - `reservoir` reads the whole collection once and keeps a uniform random
//!   sample (Algorithm R), reproducible when a seed is given

mod reservoir;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::inference::RawDocument;
use crate::source::{DatabaseClient, SourceError};

pub use reservoir::Reservoir;

/// Sampling errors
#[derive(Error, Debug)]
pub enum SamplingError {
    #[error("Collection '{collection}' is unavailable: {source}")]
    CollectionUnavailable {
        collection: String,
        #[source]
        source: SourceError,
    },

    #[error("Failed reading collection '{collection}': {source}")]
    Read {
        collection: String,
        #[source]
        source: SourceError,
    },

    #[error("Sampling of collection '{0}' was cancelled")]
    Cancelled(String),
}

impl SamplingError {
    pub fn collection(&self) -> &str {
        match self {
            SamplingError::CollectionUnavailable { collection, .. }
            | SamplingError::Read { collection, .. }
            | SamplingError::Cancelled(collection) => collection,
        }
    }
}

/// How documents are picked from a collection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SamplingPolicy {
    #[default]
    Head,
    Reservoir,
}

impl fmt::Display for SamplingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SamplingPolicy::Head => write!(f, "head"),
            SamplingPolicy::Reservoir => write!(f, "reservoir"),
        }
    }
}

impl FromStr for SamplingPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "head" => Ok(SamplingPolicy::Head),
            "reservoir" => Ok(SamplingPolicy::Reservoir),
            _ => Err(format!("Unknown sampling policy: {}", s)),
        }
    }
}

/// Upper bound on the number of sampled documents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleLimit {
    All,
    AtMost(usize),
}

impl SampleLimit {
    /// `0` means no limit
    pub fn from_config(size: usize) -> Self {
        if size == 0 {
            SampleLimit::All
        } else {
            SampleLimit::AtMost(size)
        }
    }

    fn as_hint(self) -> Option<usize> {
        match self {
            SampleLimit::All => None,
            SampleLimit::AtMost(n) => Some(n),
        }
    }
}

/// Samples documents of one collection at a time
#[derive(Debug, Clone, Default)]
pub struct Sampler {
    policy: SamplingPolicy,
    seed: Option<u64>,
}

impl Sampler {
    pub fn new(policy: SamplingPolicy) -> Self {
        Self { policy, seed: None }
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn policy(&self) -> SamplingPolicy {
        self.policy
    }

    /// Sample up to `limit` documents from `collection`
    ///
    /// Returns every document when the collection is smaller than the limit.
    /// The token is checked before each read; a cancelled run discards what
    /// was read so far.
    pub async fn sample(
        &self,
        client: &dyn DatabaseClient,
        collection: &str,
        limit: SampleLimit,
        cancel: &CancellationToken,
    ) -> Result<Vec<RawDocument>, SamplingError> {
        if cancel.is_cancelled() {
            return Err(SamplingError::Cancelled(collection.to_string()));
        }
        if limit == SampleLimit::AtMost(0) {
            return Ok(Vec::new());
        }

        let page_hint = match self.policy {
            SamplingPolicy::Head => limit.as_hint(),
            SamplingPolicy::Reservoir => None,
        };
        let mut cursor = client
            .open_cursor(collection, page_hint)
            .await
            .map_err(|source| SamplingError::CollectionUnavailable {
                collection: collection.to_string(),
                source,
            })?;

        let mut head = Vec::new();
        let mut reservoir = match (self.policy, limit) {
            (SamplingPolicy::Reservoir, SampleLimit::AtMost(n)) => {
                Some(Reservoir::new(n, self.seed))
            }
            _ => None,
        };

        loop {
            if cancel.is_cancelled() {
                debug!(collection = %collection, "Sampling cancelled");
                return Err(SamplingError::Cancelled(collection.to_string()));
            }

            let next = cursor
                .next_document()
                .await
                .map_err(|source| SamplingError::Read {
                    collection: collection.to_string(),
                    source,
                })?;
            let Some(document) = next else { break };

            match reservoir.as_mut() {
                Some(reservoir) => reservoir.offer(document),
                None => {
                    head.push(document);
                    if limit == SampleLimit::AtMost(head.len()) {
                        break;
                    }
                }
            }
        }

        let sample = match reservoir {
            Some(reservoir) => {
                debug!(
                    collection = %collection,
                    seen = reservoir.seen(),
                    kept = reservoir.len(),
                    "Reservoir sample complete"
                );
                reservoir.into_sample()
            }
            None => head,
        };
        Ok(sample)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::inference::document_from_json;
    use crate::source::InMemoryDatabase;

    fn database(n: usize) -> InMemoryDatabase {
        let docs = (0..n)
            .map(|i| document_from_json(json!({"Id": i})).unwrap())
            .collect();
        InMemoryDatabase::new("shop").with_collection("Products", docs)
    }

    fn ids(docs: &[RawDocument]) -> Vec<String> {
        docs.iter().map(|d| format!("{:?}", d["Id"])).collect()
    }

    #[test]
    fn test_limit_from_config() {
        assert_eq!(SampleLimit::from_config(0), SampleLimit::All);
        assert_eq!(SampleLimit::from_config(5), SampleLimit::AtMost(5));
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!(
            "Reservoir".parse::<SamplingPolicy>().unwrap(),
            SamplingPolicy::Reservoir
        );
        assert!("random".parse::<SamplingPolicy>().is_err());
        assert_eq!(SamplingPolicy::Head.to_string(), "head");
    }

    #[tokio::test]
    async fn test_sampler_bound() {
        let db = database(10);
        let cancel = CancellationToken::new();
        for policy in [SamplingPolicy::Head, SamplingPolicy::Reservoir] {
            let sampler = Sampler::new(policy).with_seed(Some(7));
            for limit in [0, 1, 3, 10, 25] {
                let docs = sampler
                    .sample(&db, "Products", SampleLimit::AtMost(limit), &cancel)
                    .await
                    .unwrap();
                assert_eq!(docs.len(), limit.min(10), "{policy} limit {limit}");
            }
            let all = sampler
                .sample(&db, "Products", SampleLimit::All, &cancel)
                .await
                .unwrap();
            assert_eq!(all.len(), 10);
        }
    }

    #[tokio::test]
    async fn test_head_keeps_cursor_order() {
        let db = database(5);
        let docs = Sampler::new(SamplingPolicy::Head)
            .sample(&db, "Products", SampleLimit::AtMost(3), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(ids(&docs), vec!["Integer(0)", "Integer(1)", "Integer(2)"]);
    }

    #[tokio::test]
    async fn test_reservoir_seed_is_reproducible() {
        let db = database(100);
        let sampler = Sampler::new(SamplingPolicy::Reservoir).with_seed(Some(42));
        let cancel = CancellationToken::new();
        let a = sampler
            .sample(&db, "Products", SampleLimit::AtMost(10), &cancel)
            .await
            .unwrap();
        let b = sampler
            .sample(&db, "Products", SampleLimit::AtMost(10), &cancel)
            .await
            .unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_unavailable_collection() {
        let db = database(1).with_unavailable_collection("Broken");
        let err = Sampler::default()
            .sample(&db, "Broken", SampleLimit::All, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SamplingError::CollectionUnavailable { .. }));
        assert_eq!(err.collection(), "Broken");
    }

    #[tokio::test]
    async fn test_read_failure() {
        let db = database(5).with_failing_read("Products", 2);
        let err = Sampler::default()
            .sample(&db, "Products", SampleLimit::All, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SamplingError::Read { .. }));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = Sampler::default()
            .sample(&database(5), "Products", SampleLimit::All, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, SamplingError::Cancelled(_)));
    }
}
