use std::collections::BTreeMap;

use crate::models::{FilterField, FilterSet};

/// Declared type of a bound query parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
}

/// How a store expects parameter placeholders to be spelled in query text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParamStyle {
    /// `@name`
    #[default]
    Named,
    /// `$1`, `$2`, ... numbered in predicate order
    Positional,
}

impl ParamStyle {
    fn placeholder(&self, name: &str, position: usize) -> String {
        match self {
            ParamStyle::Named => format!("@{}", name),
            ParamStyle::Positional => format!("${}", position),
        }
    }
}

/// One equality condition `field = <placeholder>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    pub field: FilterField,
    pub param: String,
    pub param_type: ParamType,
}

/// A value bound to a placeholder, with its declared type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParam {
    pub name: String,
    pub param_type: ParamType,
    pub value: String,
}

/// Predicates for the present filters plus the values bound to them
///
/// Query shape (which predicates exist) lives in `predicates`; values only ever
/// travel through `params` and are never written into query text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledPredicate {
    predicates: Vec<Predicate>,
    params: BTreeMap<String, String>,
    style: ParamStyle,
}

impl CompiledPredicate {
    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    pub fn param_types(&self) -> BTreeMap<String, ParamType> {
        self.predicates
            .iter()
            .map(|p| (p.param.clone(), p.param_type))
            .collect()
    }

    /// `field = placeholder` terms joined with AND
    pub fn where_clause(&self) -> String {
        self.predicates
            .iter()
            .enumerate()
            .map(|(i, p)| format!("{} = {}", p.field.column(), self.style.placeholder(&p.param, i + 1)))
            .collect::<Vec<_>>()
            .join(" AND ")
    }

    /// Typed parameters in predicate order, i.e. the order of positional placeholders
    pub fn bindings(&self) -> Vec<QueryParam> {
        self.predicates
            .iter()
            .filter_map(|p| {
                self.params.get(&p.param).map(|value| QueryParam {
                    name: p.param.clone(),
                    param_type: p.param_type,
                    value: value.clone(),
                })
            })
            .collect()
    }
}

/// Compiles a validated filter set into AND-joined equality predicates
///
/// Fields are visited in the fixed order country, city, region, so the same set of
/// present fields always yields the same query text.
pub fn compile(filters: &FilterSet, style: ParamStyle) -> CompiledPredicate {
    let mut predicates = Vec::with_capacity(FilterField::ALL.len());
    let mut params = BTreeMap::new();

    for (field, value) in filters.present() {
        let param = field.column().to_string();
        params.insert(param.clone(), value.to_string());
        predicates.push(Predicate {
            field,
            param,
            param_type: ParamType::String,
        });
    }

    CompiledPredicate {
        predicates,
        params,
        style,
    }
}
