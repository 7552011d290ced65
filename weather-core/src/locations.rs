use std::{fmt, fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::error::LocationFileError;

/// A (city, country code) pair, one weather query target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub city: String,
    pub country: String,
}

impl Location {
    pub fn new(city: impl Into<String>, country: impl Into<String>) -> Self {
        Self {
            city: city.into(),
            country: country.into(),
        }
    }

    /// Value of the API `q` parameter.
    pub fn query(&self) -> String {
        format!("{},{}", self.city, self.country)
    }

    /// Parse one `city,country` line; fields are trimmed and must be non-empty.
    pub fn parse_line(line: &str) -> Option<Self> {
        let (city, country) = line.split_once(',')?;
        let (city, country) = (city.trim(), country.trim());

        if city.is_empty() || country.is_empty() {
            return None;
        }

        Some(Self::new(city, country))
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.city, self.country)
    }
}

/// Parse a locations list, one `city,country` per line. Blank lines are skipped.
pub fn parse_locations(contents: &str) -> Result<Vec<Location>, LocationFileError> {
    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            Location::parse_line(line).ok_or_else(|| LocationFileError::Malformed {
                line: idx + 1,
                content: line.to_string(),
            })
        })
        .collect()
}

/// Read and parse the locations file. Any malformed line fails the whole file.
pub fn read_locations(path: &Path) -> Result<Vec<Location>, LocationFileError> {
    let contents = fs::read_to_string(path).map_err(|source| LocationFileError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let locations = parse_locations(&contents)?;
    tracing::info!(count = locations.len(), path = %path.display(), "Locations file has been read");
    Ok(locations)
}
