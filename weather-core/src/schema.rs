//! Explicit description of the `weather_data` table.
//!
//! The table is described as data (column → semantic type → nullability)
//! and rendered to SQL here; nothing registers it implicitly.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Real,
    Text { max_len: u16 },
    /// UTC, stored as text in [`crate::model::TIMESTAMP_FORMAT`].
    Timestamp,
}

impl ColumnType {
    pub fn sql(&self) -> String {
        match self {
            ColumnType::Integer => "INTEGER".to_string(),
            ColumnType::Real => "REAL".to_string(),
            ColumnType::Text { max_len } => format!("VARCHAR({max_len})"),
            ColumnType::Timestamp => "TEXT".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub ty: ColumnType,
    pub nullable: bool,
}

const fn required(name: &'static str, ty: ColumnType) -> Column {
    Column {
        name,
        ty,
        nullable: false,
    }
}

const fn optional(name: &'static str, ty: ColumnType) -> Column {
    Column {
        name,
        ty,
        nullable: true,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TableSchema {
    pub name: &'static str,
    /// Surrogate auto-incrementing key, not part of [`Self::columns`].
    pub primary_key: &'static str,
    pub columns: &'static [Column],
    pub indexed: &'static [&'static str],
}

impl TableSchema {
    /// `CREATE TABLE IF NOT EXISTS` plus its indexes. Never alters an existing table.
    pub fn create_sql(&self) -> String {
        let mut defs = vec![format!(
            "    {} INTEGER PRIMARY KEY AUTOINCREMENT",
            self.primary_key
        )];
        defs.extend(self.columns.iter().map(|c| {
            let null = if c.nullable { "" } else { " NOT NULL" };
            format!("    {} {}{}", c.name, c.ty.sql(), null)
        }));

        let mut sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (\n{}\n);\n",
            self.name,
            defs.join(",\n")
        );
        for column in self.indexed {
            sql.push_str(&format!(
                "CREATE INDEX IF NOT EXISTS idx_{table}_{column} ON {table} ({column});\n",
                table = self.name,
            ));
        }
        sql
    }

    /// Single-row insert over every column, positional parameters in column order.
    pub fn insert_sql(&self) -> String {
        let names: Vec<&str> = self.columns.iter().map(|c| c.name).collect();
        let params: Vec<String> = (1..=names.len()).map(|i| format!("?{i}")).collect();

        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.name,
            names.join(", "),
            params.join(", ")
        )
    }
}

const CITY_NAME: ColumnType = ColumnType::Text { max_len: 128 };
const COUNTRY: ColumnType = ColumnType::Text { max_len: 64 };

pub const WEATHER_DATA: TableSchema = TableSchema {
    name: "weather_data",
    primary_key: "id",
    columns: &[
        required("city_id", ColumnType::Integer),
        required("city_name", CITY_NAME),
        required("country", COUNTRY),
        required("lon_coordinate", ColumnType::Real),
        required("lat_coordinate", ColumnType::Real),
        required("timestamp", ColumnType::Timestamp),
        required("weather_type", CITY_NAME),
        required("weather_description", CITY_NAME),
        required("temperature", ColumnType::Real),
        required("feels_like", ColumnType::Real),
        required("temperature_min", ColumnType::Real),
        required("temperature_max", ColumnType::Real),
        required("pressure", ColumnType::Real),
        required("humidity", ColumnType::Real),
        optional("visibility", ColumnType::Real),
        required("wind_speed", ColumnType::Real),
        required("wind_deg", ColumnType::Real),
        optional("rain_1h", ColumnType::Real),
    ],
    indexed: &["city_id"],
};
