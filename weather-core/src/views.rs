//! Derived view catalog.
//!
//! Every view is a named query definition kept as data. SQL is rendered
//! against a [`SqlDialect`] so that aggregates a backend lacks can be
//! substituted instead of failing the whole definition.

use crate::schema::WEATHER_DATA;

/// Name of the population standard deviation aggregate registered by [`crate::store`].
pub const STDDEV_FUNCTION: &str = "stddev_pop";

/// Window of the "hottest city in the last hours" view.
pub const HOTTEST_CITY_WINDOW_HOURS: u32 = 5;

/// Backend capabilities the view SQL depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqlDialect {
    /// Aggregate computing a standard deviation, if the backend has one.
    pub stddev: Option<&'static str>,
}

impl SqlDialect {
    pub const SQLITE: SqlDialect = SqlDialect {
        stddev: Some(STDDEV_FUNCTION),
    };

    /// Renders stddev columns as `NULL`.
    pub const WITHOUT_STDDEV: SqlDialect = SqlDialect { stddev: None };

    fn stddev(&self, expr: &str) -> String {
        match self.stddev {
            Some(func) => format!("{func}({expr})"),
            None => "NULL".to_string(),
        }
    }
}

impl Default for SqlDialect {
    fn default() -> Self {
        Self::SQLITE
    }
}

/// Time window a view aggregates over. "now" is UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Today,
    Yesterday,
    /// Monday-based calendar week containing today.
    CurrentWeek,
    /// From midnight seven days ago until now.
    Last7Days,
    /// The last N hours, restricted to today.
    LastHoursToday(u32),
}

impl Period {
    pub fn label(&self) -> &'static str {
        match self {
            Period::Today => "today",
            Period::Yesterday => "yesterday",
            Period::CurrentWeek => "current_week",
            Period::Last7Days => "last_7_days",
            Period::LastHoursToday(_) => "last_hours",
        }
    }

    fn predicate(&self) -> String {
        match self {
            Period::Today => "date(timestamp) = date('now')".to_string(),
            Period::Yesterday => "date(timestamp) = date('now', '-1 day')".to_string(),
            Period::CurrentWeek => "date(timestamp, 'weekday 0', '-6 days') = \
                                    date('now', 'weekday 0', '-6 days')"
                .to_string(),
            Period::Last7Days => "timestamp >= date('now', '-7 days')".to_string(),
            Period::LastHoursToday(hours) => format!(
                "timestamp >= datetime('now', '-{hours} hours') AND date(timestamp) = date('now')"
            ),
        }
    }
}

const COMPARED_PERIODS: [Period; 4] = [
    Period::Today,
    Period::Yesterday,
    Period::CurrentWeek,
    Period::Last7Days,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewKind {
    /// Max/min/stddev temperature per (city, country).
    TemperatureStats(Period),
    /// `TemperatureStats` of several periods, unioned, tagged with a `period` column.
    TemperatureComparison(Vec<Period>),
    /// The single (city, country) with the highest temperature.
    HottestCity(Period),
    /// Number of rows typed "Rain".
    RainyHours(Period),
    /// Literal SELECT text, used as-is.
    Custom(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewDefinition {
    pub name: String,
    pub kind: ViewKind,
}

impl ViewDefinition {
    pub fn new(name: impl Into<String>, kind: ViewKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    /// The SELECT statement behind the view.
    pub fn query(&self, dialect: &SqlDialect) -> String {
        let table = WEATHER_DATA.name;
        match &self.kind {
            ViewKind::TemperatureStats(period) => format!(
                "SELECT city_name, country, \
                 MAX(temperature) AS max_temp, \
                 MIN(temperature) AS min_temp, \
                 {stddev} AS stddev_temp \
                 FROM {table} WHERE {pred} \
                 GROUP BY city_name, country",
                stddev = dialect.stddev("temperature"),
                pred = period.predicate(),
            ),
            ViewKind::TemperatureComparison(periods) => periods
                .iter()
                .map(|period| {
                    format!(
                        "SELECT city_name, country, \
                         MAX(temperature) AS max_temperature, \
                         MIN(temperature) AS min_temperature, \
                         {stddev} AS temperature_stddev, \
                         '{label}' AS period \
                         FROM {table} WHERE {pred} \
                         GROUP BY city_name, country",
                        stddev = dialect.stddev("temperature"),
                        label = period.label(),
                        pred = period.predicate(),
                    )
                })
                .collect::<Vec<_>>()
                .join(" UNION ALL "),
            ViewKind::HottestCity(period) => format!(
                "SELECT city_name, country, MAX(temperature) AS max_temp \
                 FROM {table} WHERE {pred} \
                 GROUP BY city_name, country \
                 ORDER BY max_temp DESC \
                 LIMIT 1",
                pred = period.predicate(),
            ),
            ViewKind::RainyHours(period) => format!(
                "SELECT COUNT(*) AS rainy_hours \
                 FROM {table} WHERE ({pred}) AND weather_type = 'Rain'",
                pred = period.predicate(),
            ),
            ViewKind::Custom(sql) => sql.clone(),
        }
    }
}

/// Ordered set of view definitions, recreated in order on every start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewCatalog {
    views: Vec<ViewDefinition>,
}

impl ViewCatalog {
    pub fn empty() -> Self {
        Self { views: Vec::new() }
    }

    /// The ten standard aggregate views.
    pub fn standard() -> Self {
        use Period::*;
        use ViewKind::*;

        let views = vec![
            ViewDefinition::new("temperature_differences_today", TemperatureStats(Today)),
            ViewDefinition::new("temperature_differences_yesterday", TemperatureStats(Yesterday)),
            ViewDefinition::new(
                "temperature_differences_current_week",
                TemperatureStats(CurrentWeek),
            ),
            ViewDefinition::new(
                "temperature_differences_last_7_days",
                TemperatureStats(Last7Days),
            ),
            ViewDefinition::new(
                "temperature_comparison",
                TemperatureComparison(COMPARED_PERIODS.to_vec()),
            ),
            // Covers the last few hours of today, not just one hour.
            ViewDefinition::new(
                "highest_temperature_city_last_hour",
                HottestCity(LastHoursToday(HOTTEST_CITY_WINDOW_HOURS)),
            ),
            ViewDefinition::new("highest_temperature_city_today", HottestCity(Today)),
            ViewDefinition::new("highest_temperature_city_last_week", HottestCity(CurrentWeek)),
            // Counts yesterday's rows; the name is kept for existing queries.
            ViewDefinition::new("rainy_hours_today", RainyHours(Yesterday)),
            ViewDefinition::new("rainy_hours_last_week", RainyHours(Last7Days)),
        ];

        Self { views }
    }

    /// Add (or replace) a definition with literal SQL.
    pub fn with_custom(mut self, name: impl Into<String>, sql: impl Into<String>) -> Self {
        let definition = ViewDefinition::new(name, ViewKind::Custom(sql.into()));
        match self.views.iter_mut().find(|v| v.name == definition.name) {
            Some(existing) => *existing = definition,
            None => self.views.push(definition),
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&ViewDefinition> {
        self.views.iter().find(|v| v.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ViewDefinition> {
        self.views.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.views.iter().map(|v| v.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }
}

impl Default for ViewCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn standard_catalog_has_ten_unique_views() {
        let catalog = ViewCatalog::standard();
        let names: HashSet<&str> = catalog.names().into_iter().collect();

        assert_eq!(catalog.len(), 10);
        assert_eq!(names.len(), 10);
        assert!(names.contains("temperature_differences_today"));
        assert!(names.contains("temperature_comparison"));
        assert!(names.contains("rainy_hours_last_week"));
    }

    #[test]
    fn stddev_is_substituted_per_dialect() {
        let catalog = ViewCatalog::standard();
        let view = catalog.get("temperature_differences_today").unwrap();

        assert!(view.query(&SqlDialect::SQLITE).contains("stddev_pop(temperature) AS stddev_temp"));
        assert!(view.query(&SqlDialect::WITHOUT_STDDEV).contains("NULL AS stddev_temp"));
    }

    #[test]
    fn comparison_unions_four_periods() {
        let catalog = ViewCatalog::standard();
        let sql = catalog
            .get("temperature_comparison")
            .unwrap()
            .query(&SqlDialect::default());

        assert_eq!(sql.matches(" UNION ALL ").count(), 3);
        for label in ["'today'", "'yesterday'", "'current_week'", "'last_7_days'"] {
            assert!(sql.contains(label), "missing {label}");
        }
    }

    #[test]
    fn hottest_city_in_window_is_limited_to_one_row() {
        let catalog = ViewCatalog::standard();
        let sql = catalog
            .get("highest_temperature_city_last_hour")
            .unwrap()
            .query(&SqlDialect::default());

        assert!(sql.contains("datetime('now', '-5 hours')"));
        assert!(sql.ends_with("LIMIT 1"));
    }

    #[test]
    fn rainy_hours_counts_rain_rows() {
        let catalog = ViewCatalog::standard();
        let sql = catalog
            .get("rainy_hours_today")
            .unwrap()
            .query(&SqlDialect::default());

        assert!(sql.contains("COUNT(*) AS rainy_hours"));
        assert!(sql.contains("weather_type = 'Rain'"));
        assert!(sql.contains("date('now', '-1 day')"));
    }

    #[test]
    fn custom_definition_replaces_same_name() {
        let catalog = ViewCatalog::standard()
            .with_custom("rainy_hours_last_week", "SELECT 1 AS one")
            .with_custom("extra", "SELECT 2 AS two");

        assert_eq!(catalog.len(), 11);
        assert_eq!(
            catalog
                .get("rainy_hours_last_week")
                .unwrap()
                .query(&SqlDialect::default()),
            "SELECT 1 AS one"
        );
    }
}
