use tokio::time::Instant;

use crate::{
    db::{fetch_rows, SnapshotStore},
    error::AppResult,
    models::{FilterRequest, FilterSet, Recommendation},
    services::{predicate, union_query::UnionQueryBuilder},
};

/// Looks up geo-localized recommendations for the given location filters
///
/// Validates the filters, compiles them into one union query over games, micro-apps
/// and cards, reads it under a single snapshot and maps each row to a record.
/// An empty match is an empty vector, not an error.
pub async fn recommend(
    store: &dyn SnapshotStore,
    request: FilterRequest,
    deadline: Option<Instant>,
) -> AppResult<Vec<Recommendation>> {
    let filters = FilterSet::try_from(request)?;

    tracing::info!(
        country = ?filters.country(),
        city = ?filters.city(),
        region = ?filters.region(),
        "Fetching geo recommendations"
    );

    let compiled = predicate::compile(&filters, store.param_style());
    let query = UnionQueryBuilder::default().build(compiled)?;

    tracing::debug!(sql = %query.sql, "Compiled union query");

    let rows = fetch_rows(store, &query, deadline).await?;
    let recommendations: Vec<Recommendation> = rows.into_iter().map(Recommendation::from).collect();

    if recommendations.is_empty() {
        tracing::info!("No recommendations found for provided parameters");
    } else {
        tracing::info!(
            count = recommendations.len(),
            store = store.name(),
            "Retrieved recommendations"
        );
    }

    Ok(recommendations)
}
