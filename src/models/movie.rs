use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

/// The protected resource.
#[derive(Debug, Clone, Serialize)]
pub struct Movie {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub title: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub year: i32,
    #[serde(skip_serializing_if = "Runtime::is_zero")]
    pub runtime: Runtime,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub genres: Vec<String>,
    pub version: i32,
}

fn is_zero(v: &i32) -> bool {
    *v == 0
}

impl Movie {
    pub fn new(title: String, year: i32, runtime: Runtime, genres: Vec<String>) -> Self {
        Self {
            id: 0,
            created_at: Utc::now(),
            title,
            year,
            runtime,
            genres,
            version: 0,
        }
    }
}

/// Running time in minutes, exchanged on the wire as `"<n> mins"`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Runtime(pub i32);

impl Runtime {
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} mins", self.0)
    }
}

impl Serialize for Runtime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Runtime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_runtime(&raw).ok_or_else(|| de::Error::custom("invalid runtime format"))
    }
}

fn parse_runtime(raw: &str) -> Option<Runtime> {
    let (minutes, unit) = raw.split_once(' ')?;
    if unit != "mins" {
        return None;
    }
    minutes.parse::<i32>().ok().map(Runtime)
}

/// Sort columns accepted by the list endpoint. A leading `-` means descending.
pub const MOVIE_SORT_SAFELIST: &[&str] = &[
    "id", "title", "year", "runtime", "-id", "-title", "-year", "-runtime",
];

/// Pagination and ordering for list queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filters {
    pub page: i64,
    pub page_size: i64,
    pub sort: String,
}

impl Default for Filters {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 20,
            sort: "id".to_string(),
        }
    }
}

impl Filters {
    /// Column name for ORDER BY. Only values from the safelist ever reach SQL.
    pub fn sort_column(&self) -> &'static str {
        match self.sort.trim_start_matches('-') {
            "title" => "title",
            "year" => "year",
            "runtime" => "runtime",
            _ => "id",
        }
    }

    pub fn sort_descending(&self) -> bool {
        self.sort.starts_with('-')
    }

    pub fn limit(&self) -> i64 {
        self.page_size
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.page_size
    }
}

/// Pagination metadata returned next to list results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Metadata {
    #[serde(skip_serializing_if = "is_zero_i64")]
    pub current_page: i64,
    #[serde(skip_serializing_if = "is_zero_i64")]
    pub page_size: i64,
    #[serde(skip_serializing_if = "is_zero_i64")]
    pub first_page: i64,
    #[serde(skip_serializing_if = "is_zero_i64")]
    pub last_page: i64,
    #[serde(skip_serializing_if = "is_zero_i64")]
    pub total_records: i64,
}

fn is_zero_i64(v: &i64) -> bool {
    *v == 0
}

impl Metadata {
    pub fn calculate(total_records: i64, page: i64, page_size: i64) -> Self {
        if total_records == 0 {
            return Self::default();
        }

        Self {
            current_page: page,
            page_size,
            first_page: 1,
            last_page: (total_records + page_size - 1) / page_size,
            total_records,
        }
    }
}
