use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Fetch,
    Extract,
    Analyze,
    Publish,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Fetch => "fetch",
            Stage::Extract => "extract",
            Stage::Analyze => "analyze",
            Stage::Publish => "publish",
        };
        f.write_str(name)
    }
}

/// Which stages a cycle runs, with per-stage limits. Unset limits fall back
/// to the pipeline configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CyclePlan {
    pub fetch: bool,
    pub extract: bool,
    pub analyze: bool,
    pub publish: bool,
    /// Page size per feed query.
    pub fetch_size: Option<usize>,
    /// Rows re-extracted when `extract` runs without `fetch`.
    pub extract_limit: Option<usize>,
    pub analyze_limit: Option<usize>,
    pub publish_limit: Option<usize>,
}

impl CyclePlan {
    pub fn full() -> Self {
        Self {
            fetch: true,
            extract: true,
            analyze: true,
            publish: true,
            ..Self::default()
        }
    }

    pub fn fetch_only(extract: bool) -> Self {
        Self {
            fetch: true,
            extract,
            ..Self::default()
        }
    }

    pub fn extract_only(limit: Option<usize>) -> Self {
        Self {
            extract: true,
            extract_limit: limit,
            ..Self::default()
        }
    }

    pub fn analyze_only(limit: Option<usize>) -> Self {
        Self {
            analyze: true,
            analyze_limit: limit,
            ..Self::default()
        }
    }

    pub fn publish_only(limit: Option<usize>) -> Self {
        Self {
            publish: true,
            publish_limit: limit,
            ..Self::default()
        }
    }

    pub fn with_fetch_size(mut self, size: usize) -> Self {
        self.fetch_size = Some(size);
        self
    }

    pub fn stages(&self) -> Vec<Stage> {
        [
            (self.fetch, Stage::Fetch),
            (self.extract, Stage::Extract),
            (self.analyze, Stage::Analyze),
            (self.publish, Stage::Publish),
        ]
        .into_iter()
        .filter_map(|(enabled, stage)| enabled.then_some(stage))
        .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.stages().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_lists() {
        assert_eq!(
            CyclePlan::full().stages(),
            vec![Stage::Fetch, Stage::Extract, Stage::Analyze, Stage::Publish]
        );
        assert_eq!(CyclePlan::fetch_only(false).stages(), vec![Stage::Fetch]);
        assert_eq!(CyclePlan::analyze_only(Some(3)).analyze_limit, Some(3));
        assert!(CyclePlan::default().is_empty());
    }
}
