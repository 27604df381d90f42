use std::collections::BTreeMap;

use crate::services::predicate::{CompiledPredicate, ParamType, QueryParam};

/// One physical table of geo-ranked recommendations
///
/// All sources expose the same location and type columns; only the identifier and
/// rank column names differ, and the projection renames them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordSource {
    pub table: &'static str,
    pub id_column: &'static str,
    pub rank_column: &'static str,
}

impl RecordSource {
    /// `SELECT <projection> FROM <table>` without the WHERE clause
    pub fn branch(&self) -> String {
        format!(
            "SELECT continent, country, region, city, {} AS recommendation_id, {} AS Ranking, \
             recommendation_type, recommendation_activity FROM {}",
            self.id_column, self.rank_column, self.table
        )
    }
}

/// Number of columns every branch projects
pub const PROJECTION_ARITY: usize = 8;

/// Games, micro-apps and cards
///
/// Identifiers are emitted unquoted, so the tables must be created with unquoted
/// (case-folded) names; Postgres resolves `GameID` as `gameid`. Rows are decoded by
/// position, never by column name, so the `Ranking` alias casing does not matter.
pub const RECORD_SOURCES: [RecordSource; 3] = [
    RecordSource {
        table: "games_geo_popularity",
        id_column: "GameID",
        rank_column: "City_Ranking",
    },
    RecordSource {
        table: "microapps_geo_popularity",
        id_column: "appID",
        rank_column: "City_Ranking",
    },
    RecordSource {
        table: "cards_geo_popularity",
        id_column: "cardID",
        rank_column: "City_Ranking",
    },
];

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryBuildError {
    #[error("no record sources registered")]
    NoSources,

    #[error("no predicates compiled")]
    NoPredicates,
}

/// A ready-to-execute union query and its bound parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySpec {
    pub branches: Vec<String>,
    pub where_clause: String,
    /// Typed values in placeholder order
    pub bindings: Vec<QueryParam>,
    pub sql: String,
}

impl QuerySpec {
    pub fn params(&self) -> BTreeMap<String, String> {
        self.bindings
            .iter()
            .map(|p| (p.name.clone(), p.value.clone()))
            .collect()
    }

    pub fn param_types(&self) -> BTreeMap<String, ParamType> {
        self.bindings
            .iter()
            .map(|p| (p.name.clone(), p.param_type))
            .collect()
    }
}

/// Builds a UNION ALL over a registry of record sources
///
/// Every branch gets the identical WHERE clause. Sources never overlap, so UNION ALL
/// is used rather than UNION.
pub struct UnionQueryBuilder<'a> {
    sources: &'a [RecordSource],
}

impl Default for UnionQueryBuilder<'static> {
    fn default() -> Self {
        Self::new(&RECORD_SOURCES)
    }
}

impl<'a> UnionQueryBuilder<'a> {
    pub fn new(sources: &'a [RecordSource]) -> Self {
        Self { sources }
    }

    pub fn build(&self, compiled: CompiledPredicate) -> Result<QuerySpec, QueryBuildError> {
        if self.sources.is_empty() {
            return Err(QueryBuildError::NoSources);
        }
        if compiled.predicates().is_empty() {
            return Err(QueryBuildError::NoPredicates);
        }

        let where_clause = compiled.where_clause();
        let branches: Vec<String> = self.sources.iter().map(RecordSource::branch).collect();

        let sql = branches
            .iter()
            .map(|branch| format!("{} WHERE {}", branch, where_clause))
            .collect::<Vec<_>>()
            .join(" UNION ALL ");

        Ok(QuerySpec {
            branches,
            where_clause,
            bindings: compiled.bindings(),
            sql,
        })
    }
}
