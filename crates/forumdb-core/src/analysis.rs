//! Document bundles attached to a run by the analysis collaborators.
//!
//! Each document is an opaque JSON value; its shape belongs to whichever
//! analyzer produced it.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::CoreError;

/// Statistical documents computed from a run's posts and comments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisDocuments {
    pub score_distribution: Option<Value>,
    pub flair_distribution: Option<Value>,
    pub timing_patterns: Option<Value>,
    pub title_analysis: Option<Value>,
    pub op_engagement_analysis: Option<Value>,
    pub upvote_ratio_analysis: Option<Value>,
    pub post_format_analysis: Option<Value>,
    pub author_success_analysis: Option<Value>,
}

/// Model-generated documents, filled in after the statistical pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AiAnalysisDocuments {
    pub sentiment_analysis: Option<Value>,
    pub pain_point_analysis: Option<Value>,
    pub tone_analysis: Option<Value>,
    pub promotion_analysis: Option<Value>,
}

impl AiAnalysisDocuments {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sentiment_analysis.is_none()
            && self.pain_point_analysis.is_none()
            && self.tone_analysis.is_none()
            && self.promotion_analysis.is_none()
    }
}

/// Audience-characterization documents for a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudienceDocuments {
    pub self_identifications: Option<Value>,
    pub skill_levels: Option<Value>,
    pub goals_motivations: Option<Value>,
    pub pain_points: Option<Value>,
    pub tools_mentioned: Option<Value>,
    pub budget_signals: Option<Value>,
    pub skepticism_level: Option<SkepticismLevel>,
    pub personas: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkepticismLevel {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl SkepticismLevel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SkepticismLevel::Low => "low",
            SkepticismLevel::Medium => "medium",
            SkepticismLevel::High => "high",
            SkepticismLevel::VeryHigh => "very_high",
        }
    }
}

impl std::fmt::Display for SkepticismLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SkepticismLevel {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(SkepticismLevel::Low),
            "medium" => Ok(SkepticismLevel::Medium),
            "high" => Ok(SkepticismLevel::High),
            "very_high" => Ok(SkepticismLevel::VeryHigh),
            other => Err(CoreError::InvalidSkepticismLevel(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn skepticism_level_serde_matches_as_str() {
        for level in [
            SkepticismLevel::Low,
            SkepticismLevel::Medium,
            SkepticismLevel::High,
            SkepticismLevel::VeryHigh,
        ] {
            let encoded = serde_json::to_value(level).unwrap();
            assert_eq!(encoded, json!(level.as_str()));
            assert_eq!(level.as_str().parse::<SkepticismLevel>().unwrap(), level);
        }
    }

    #[test]
    fn ai_documents_is_empty() {
        let mut docs = AiAnalysisDocuments::default();
        assert!(docs.is_empty());
        docs.tone_analysis = Some(json!({"dominant": "casual"}));
        assert!(!docs.is_empty());
    }

    #[test]
    fn audience_documents_deserialize_partial() {
        let docs: AudienceDocuments =
            serde_json::from_value(json!({"skepticism_level": "very_high"})).unwrap();
        assert_eq!(docs.skepticism_level, Some(SkepticismLevel::VeryHigh));
        assert!(docs.personas.is_none());
    }
}
