//! Synthetic record generator.
//!
//! Produces random people-like records for seeding an index. A generator
//! built with a seed always produces the same sequence.

use chrono::{Days, NaiveDate};
use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Date format used for `created_at`, matching the sample index mapping.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Element type for [`DataGenerator::generate_list`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    String,
    Integer,
    Float,
    Boolean,
    Date,
}

/// One generated document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub name: String,
    pub age: i64,
    pub email: String,
    pub score: f64,
    pub active: bool,
    pub created_at: String,
    pub metadata: Value,
}

/// Random data source.
#[derive(Debug, Clone)]
pub struct DataGenerator {
    rng: StdRng,
}

impl Default for DataGenerator {
    fn default() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }
}

impl DataGenerator {
    /// Creates a generator seeded from the operating system.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a reproducible generator.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Random ASCII letters and digits.
    pub fn generate_string(&mut self, length: usize) -> String {
        (&mut self.rng)
            .sample_iter(&Alphanumeric)
            .take(length)
            .map(char::from)
            .collect()
    }

    /// Uniform integer in `min..=max`. Bounds are swapped if reversed.
    pub fn generate_integer(&mut self, min: i64, max: i64) -> i64 {
        let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
        self.rng.gen_range(lo..=hi)
    }

    /// Uniform float in `min..=max`, rounded to two decimals.
    pub fn generate_float(&mut self, min: f64, max: f64) -> f64 {
        let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
        let value = self.rng.gen_range(lo..=hi);
        ((value * 100.0).round() / 100.0).clamp(lo, hi)
    }

    pub fn generate_boolean(&mut self) -> bool {
        self.rng.gen_bool(0.5)
    }

    /// Uniform date from January 1st of `start_year` to December 31st of
    /// `end_year`. Returns `None` if the years are out of range or reversed.
    pub fn generate_date(&mut self, start_year: i32, end_year: i32) -> Option<NaiveDate> {
        let start = NaiveDate::from_ymd_opt(start_year, 1, 1)?;
        let end = NaiveDate::from_ymd_opt(end_year, 12, 31)?;
        let span = end.signed_duration_since(start).num_days();
        if span < 0 {
            return None;
        }
        let offset = self.rng.gen_range(0..=span) as u64;
        start.checked_add_days(Days::new(offset))
    }

    /// An address of the form `xxxxxxxx@yyyyyy.com`.
    pub fn generate_email(&mut self) -> String {
        format!("{}@{}.com", self.generate_string(8), self.generate_string(6))
    }

    /// A list of `length` values of one kind, using each generator's defaults.
    pub fn generate_list(&mut self, kind: ItemKind, length: usize) -> Vec<Value> {
        (0..length)
            .map(|_| match kind {
                ItemKind::String => json!(self.generate_string(10)),
                ItemKind::Integer => json!(self.generate_integer(0, 100)),
                ItemKind::Float => json!(self.generate_float(0.0, 100.0)),
                ItemKind::Boolean => json!(self.generate_boolean()),
                ItemKind::Date => json!(
                    self.generate_date(2000, 2030)
                        .map(|d| d.format(DATE_FORMAT).to_string())
                ),
            })
            .collect()
    }

    /// `{name, attributes}` nested `depth` levels, ending in `{value}`.
    pub fn generate_nested_object(&mut self, depth: u32) -> Value {
        if depth == 0 {
            return json!({ "value": self.generate_string(10) });
        }
        json!({
            "name": self.generate_string(10),
            "attributes": self.generate_nested_object(depth - 1),
        })
    }

    /// A full record matching the sample index mapping.
    pub fn generate_record(&mut self) -> Record {
        let created_at = self
            .generate_date(2010, 2025)
            .map(|d| d.format(DATE_FORMAT).to_string())
            .unwrap_or_default();

        Record {
            id: self.generate_string(8),
            name: self.generate_string(12),
            age: self.generate_integer(18, 65),
            email: self.generate_email(),
            score: self.generate_float(0.0, 100.0),
            active: self.generate_boolean(),
            created_at,
            metadata: self.generate_nested_object(2),
        }
    }

    /// A full record as a JSON document.
    pub fn generate_random_data(&mut self) -> Value {
        let record = self.generate_record();
        json!({
            "id": record.id,
            "name": record.name,
            "age": record.age,
            "email": record.email,
            "score": record.score,
            "active": record.active,
            "created_at": record.created_at,
            "metadata": record.metadata,
        })
    }
}
