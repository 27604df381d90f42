use serde::Deserialize;

/// Raw request body for the recommendations endpoint
///
/// Only the three location keys are recognized; anything else in the body is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilterRequest {
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error("At least one of country, city, or region must be provided")]
    Empty,
}

/// A filterable location column, in predicate order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterField {
    Country,
    City,
    Region,
}

impl FilterField {
    /// Fixed compilation order: country, then city, then region
    pub const ALL: [FilterField; 3] = [FilterField::Country, FilterField::City, FilterField::Region];

    /// Column name shared by every record source
    pub fn column(&self) -> &'static str {
        match self {
            FilterField::Country => "country",
            FilterField::City => "city",
            FilterField::Region => "region",
        }
    }
}

/// Validated, sparse set of location filters
///
/// Holds at least one non-empty value. Values are exact-match and are kept verbatim
/// (no trimming or case folding).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterSet {
    country: Option<String>,
    city: Option<String>,
    region: Option<String>,
}

impl FilterSet {
    pub fn country(&self) -> Option<&str> {
        self.country.as_deref()
    }

    pub fn city(&self) -> Option<&str> {
        self.city.as_deref()
    }

    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    pub fn get(&self, field: FilterField) -> Option<&str> {
        match field {
            FilterField::Country => self.country(),
            FilterField::City => self.city(),
            FilterField::Region => self.region(),
        }
    }

    /// Present filters in predicate order
    pub fn present(&self) -> impl Iterator<Item = (FilterField, &str)> + '_ {
        FilterField::ALL
            .into_iter()
            .filter_map(move |field| self.get(field).map(|value| (field, value)))
    }

    pub fn len(&self) -> usize {
        self.present().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TryFrom<FilterRequest> for FilterSet {
    type Error = FilterError;

    fn try_from(request: FilterRequest) -> Result<Self, Self::Error> {
        // Empty strings count as absent
        let non_empty = |value: Option<String>| value.filter(|v| !v.is_empty());

        let filters = FilterSet {
            country: non_empty(request.country),
            city: non_empty(request.city),
            region: non_empty(request.region),
        };

        if filters.is_empty() {
            return Err(FilterError::Empty);
        }

        Ok(filters)
    }
}
