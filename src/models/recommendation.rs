use serde::{Deserialize, Serialize};

/// Positional row as projected by every branch of the union query
///
/// Order: continent, country, region, city, recommendation_id, Ranking,
/// recommendation_type, recommendation_activity.
pub type RecommendationRow = (String, String, String, String, String, i64, String, String);

/// A geo-localized recommendation (game, micro-app or card) returned to the client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Recommendation {
    pub continent: String,
    pub country: String,
    pub region: String,
    pub city: String,
    pub recommendation_id: String,
    #[serde(rename = "Ranking")]
    pub ranking: i64,
    pub recommendation_type: String,
    pub recommendation_activity: String,
}

impl From<RecommendationRow> for Recommendation {
    fn from(row: RecommendationRow) -> Self {
        Recommendation {
            continent: row.0,
            country: row.1,
            region: row.2,
            city: row.3,
            recommendation_id: row.4,
            ranking: row.5,
            recommendation_type: row.6,
            recommendation_activity: row.7,
        }
    }
}
