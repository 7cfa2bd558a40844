use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Big Five trait scores, each normalized to 0..=1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(deny_unknown_fields)]
pub struct Personality {
    pub openness: f64,
    pub conscientiousness: f64,
    pub extraversion: f64,
    pub agreeableness: f64,
    pub neuroticism: f64,
}

impl Personality {
    fn traits(&self) -> [(&'static str, f64); 5] {
        [
            ("openness", self.openness),
            ("conscientiousness", self.conscientiousness),
            ("extraversion", self.extraversion),
            ("agreeableness", self.agreeableness),
            ("neuroticism", self.neuroticism),
        ]
    }

    pub fn validate(&self) -> Result<(), String> {
        for (name, score) in self.traits() {
            if !score.is_finite() || !(0.0..=1.0).contains(&score) {
                return Err(format!("{name} must be between 0 and 1, got {score}"));
            }
        }
        Ok(())
    }

    /// Recommender user labels, `"<trait>:<score>"` with two decimals.
    pub fn labels(&self) -> Vec<String> {
        self.traits()
            .iter()
            .map(|(name, score)| format!("{name}:{score:.2}"))
            .collect()
    }
}

/// Stored personality as returned by GET /recommender/users/{id}/personality.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserPersonality {
    pub user_id: String,
    #[serde(flatten)]
    pub personality: Personality,
}
