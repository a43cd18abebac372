use std::collections::BTreeMap;
use std::io::Read;

use chrono::NaiveDate;
use rate_core::{
    Bound, EffectivePeriod, RateBand, RateTable, RepositoryError, TableRepository,
    ValidationError,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

/// Errors that can occur when loading rate table data.
#[derive(Debug, Error)]
pub enum TableLoaderError {
    #[error("CSV parse error: {0}")]
    CsvParse(String),

    #[error("Invalid table '{table}' for {period}: {source}")]
    InvalidTable {
        table: String,
        period: EffectivePeriod,
        source: ValidationError,
    },

    #[error("Table '{table}' has overlapping periods {first} and {second}")]
    OverlappingPeriods {
        table: String,
        first: EffectivePeriod,
        second: EffectivePeriod,
    },

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<csv::Error> for TableLoaderError {
    fn from(err: csv::Error) -> Self {
        TableLoaderError::CsvParse(err.to_string())
    }
}

/// A single row from a rate table CSV file.
///
/// - `table`: logical table name (e.g. `salary-tax`)
/// - `effective_from`: first day the table applies (`YYYY-MM-DD`)
/// - `effective_to`: first day it no longer applies (empty for open-ended)
/// - `lower_bound`: lower edge of the band
/// - `upper_bound`: upper edge of the band (empty for the terminal band)
/// - `rate`: marginal rate as a percentage (e.g. `10` for 10%)
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct BandRecord {
    pub table: String,
    pub effective_from: NaiveDate,
    #[serde(deserialize_with = "deserialize_optional_date")]
    pub effective_to: Option<NaiveDate>,
    pub lower_bound: Decimal,
    #[serde(deserialize_with = "deserialize_optional_decimal")]
    pub upper_bound: Option<Decimal>,
    pub rate: Decimal,
}

fn deserialize_optional_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    match s {
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => s
            .trim()
            .parse::<Decimal>()
            .map(Some)
            .map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

fn deserialize_optional_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    match s {
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => s
            .trim()
            .parse::<NaiveDate>()
            .map(Some)
            .map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

/// Conventions of older rate sheets that can be translated while loading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LegacyFormat {
    /// Read an `upper_bound` of `0` on a table's last row as "unbounded".
    pub zero_means_unbounded: bool,

    /// Read a lower bound of exactly the previous upper bound plus one as
    /// the previous upper bound (`0–100`, `101–200` becomes `0–100`, `100–200`).
    pub inclusive_integer_bounds: bool,
}

type GroupKey = (String, NaiveDate, Option<NaiveDate>);

/// Loader for rate tables from CSV files.
///
/// Rows are grouped by (table, effective_from, effective_to); each group
/// becomes one validated [`RateTable`]. Loading goes through the
/// [`TableRepository`] trait so it works with any storage backend.
pub struct TableLoader;

impl TableLoader {
    /// Parse band records from a CSV reader.
    pub fn parse<R: Read>(reader: R) -> Result<Vec<BandRecord>, TableLoaderError> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let mut records = Vec::new();

        for result in csv_reader.deserialize() {
            let record: BandRecord = result?;
            records.push(record);
        }

        Ok(records)
    }

    /// Build validated tables from parsed records.
    ///
    /// Tables come back ordered by name, then period start. Fails on the
    /// first group that does not form a valid table, or if two groups of the
    /// same name have overlapping periods.
    pub fn assemble(
        records: &[BandRecord],
        legacy: LegacyFormat,
    ) -> Result<Vec<RateTable>, TableLoaderError> {
        let mut groups: BTreeMap<GroupKey, Vec<&BandRecord>> = BTreeMap::new();
        for record in records {
            groups
                .entry((
                    record.table.clone(),
                    record.effective_from,
                    record.effective_to,
                ))
                .or_default()
                .push(record);
        }

        let mut tables: Vec<RateTable> = Vec::with_capacity(groups.len());
        for ((name, from, to), mut group) in groups {
            let period = EffectivePeriod::new(from, to);
            group.sort_by(|a, b| a.lower_bound.cmp(&b.lower_bound));

            let bands = to_bands(&group, legacy);
            let table = RateTable::build(name.clone(), period, bands).map_err(|source| {
                TableLoaderError::InvalidTable {
                    table: name.clone(),
                    period,
                    source,
                }
            })?;

            if let Some(previous) = tables
                .iter()
                .find(|t| t.name() == name && t.period().overlaps(&period))
            {
                return Err(TableLoaderError::OverlappingPeriods {
                    table: name,
                    first: *previous.period(),
                    second: period,
                });
            }

            tables.push(table);
        }

        Ok(tables)
    }

    /// Store tables in the repository.
    ///
    /// Any table already stored under the same name and period is replaced,
    /// so running the same load twice produces the same result. Returns the
    /// number of bands written.
    pub async fn load<R: TableRepository + ?Sized>(
        repo: &R,
        tables: &[RateTable],
    ) -> Result<usize, TableLoaderError> {
        let mut inserted = 0;

        for table in tables {
            let replaced = repo.delete_table(table.name(), table.period()).await?;
            repo.insert_table(table).await?;
            inserted += table.bands().len();

            info!(
                table = table.name(),
                period = %table.period(),
                bands = table.bands().len(),
                replaced,
                "loaded rate table"
            );
        }

        Ok(inserted)
    }
}

fn to_bands(
    group: &[&BandRecord],
    legacy: LegacyFormat,
) -> Vec<RateBand> {
    let last = group.len().saturating_sub(1);
    let mut bands: Vec<RateBand> = Vec::with_capacity(group.len());

    for (index, record) in group.iter().enumerate() {
        let mut lower_bound = record.lower_bound;
        if legacy.inclusive_integer_bounds {
            if let Some(previous) = bands.last().and_then(|b| b.upper_bound.value()) {
                if lower_bound == previous + Decimal::ONE {
                    lower_bound = previous;
                }
            }
        }

        let upper_bound = match record.upper_bound {
            Some(upper) if legacy.zero_means_unbounded && index == last && upper.is_zero() => {
                Bound::Unbounded
            }
            other => Bound::from(other),
        };

        bands.push(RateBand::new(lower_bound, upper_bound, record.rate));
    }

    bands
}
