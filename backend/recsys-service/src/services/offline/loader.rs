use super::OfflineIndex;
use crate::config::{Config, RowOrder};
use crate::error::LoadError;
use crate::models::{TrackId, UserId};
use crate::services::similarity::SimilarityIndex;
use crate::utils::unique_keep_order;
use arrow::array::{Array, AsArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Float64Type, Int64Type, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

const USER_COLUMN: &str = "user_id";
const TRACK_COLUMN: &str = "track_id";
const SIMILAR_TRACK_COLUMN: &str = "similar_track_id";
const RANK_COLUMN: &str = "rank";
const SCORE_COLUMN: &str = "score";
const RANK_SCORE_COLUMN: &str = "rank_score";

/// One row of an offline table. `key` is the user (or seed track) and is
/// unused for the global popularity table; `order_value` is unused when the
/// table keeps its stored order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankingRow {
    pub key: i64,
    pub item: i64,
    pub order_value: f64,
}

/// Raw rows of one offline table in file order, plus the rule that orders them
#[derive(Debug, Clone)]
pub struct RankingTable {
    pub source: PathBuf,
    pub order: RowOrder,
    pub rows: Vec<RankingRow>,
}

impl RankingTable {
    pub fn new(source: impl Into<PathBuf>, order: RowOrder) -> Self {
        Self {
            source: source.into(),
            order,
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, key: i64, item: i64, order_value: f64) {
        self.rows.push(RankingRow {
            key,
            item,
            order_value,
        });
    }

    /// Rows sorted by the table's rule. `sort_by` is stable, so ties keep file order.
    fn sorted_rows(mut self) -> Vec<RankingRow> {
        match self.order {
            RowOrder::ByRank(_) => self
                .rows
                .sort_by(|a, b| a.order_value.total_cmp(&b.order_value)),
            RowOrder::ByScore(_) => self
                .rows
                .sort_by(|a, b| b.order_value.total_cmp(&a.order_value)),
            RowOrder::Stored | RowOrder::Auto => {}
        }
        self.rows
    }

    /// Group by key, each group ordered and deduplicated
    pub fn into_grouped(self) -> HashMap<i64, Vec<i64>> {
        let mut groups: HashMap<i64, Vec<i64>> = HashMap::new();
        for row in self.sorted_rows() {
            groups.entry(row.key).or_default().push(row.item);
        }

        groups
            .into_iter()
            .map(|(key, items)| (key, unique_keep_order(items)))
            .collect()
    }

    /// A single global ranking, ordered and deduplicated
    pub fn into_ranked(self) -> Vec<i64> {
        unique_keep_order(self.sorted_rows().into_iter().map(|row| row.item))
    }
}

/// The four raw offline tables
#[derive(Debug, Clone)]
pub struct OfflineTables {
    pub final_recs: RankingTable,
    pub personal: RankingTable,
    pub popularity: RankingTable,
    pub similarity: RankingTable,
}

/// Immutable indices the service is built from
#[derive(Debug)]
pub struct LoadedIndices {
    pub offline: OfflineIndex,
    pub similarity: SimilarityIndex,
}

/// Read the four tables named by the config and build the indices.
///
/// Any unreadable or malformed table aborts the whole load.
pub fn load_indices(config: &Config) -> Result<LoadedIndices, LoadError> {
    let started = Instant::now();
    let tables = read_tables(config)?;
    let indices = build_indices(tables);

    info!(
        final_users = indices.offline.final_user_count(),
        personal_users = indices.offline.personal_user_count(),
        popular_tracks = indices.offline.popularity().len(),
        similarity_seeds = indices.similarity.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Offline indices loaded"
    );

    Ok(indices)
}

pub fn read_tables(config: &Config) -> Result<OfflineTables, LoadError> {
    Ok(OfflineTables {
        final_recs: read_table(
            &config.final_path(),
            Some(USER_COLUMN),
            TRACK_COLUMN,
            &config.final_order,
        )?,
        personal: read_table(
            &config.personal_path(),
            Some(USER_COLUMN),
            TRACK_COLUMN,
            &config.personal_order,
        )?,
        popularity: read_table(
            &config.popularity_path(),
            None,
            TRACK_COLUMN,
            &config.popularity_order,
        )?,
        similarity: read_table(
            &config.similarity_path(),
            Some(TRACK_COLUMN),
            SIMILAR_TRACK_COLUMN,
            &config.similarity_order,
        )?,
    })
}

/// One-time transform from raw tables to lookup structures
pub fn build_indices(tables: OfflineTables) -> LoadedIndices {
    let final_by_user: HashMap<UserId, Vec<TrackId>> = tables.final_recs.into_grouped();
    let personal_by_user: HashMap<UserId, Vec<TrackId>> = tables.personal.into_grouped();
    let popularity: Vec<TrackId> = tables.popularity.into_ranked();
    let similar_by_track: HashMap<TrackId, Vec<TrackId>> = tables.similarity.into_grouped();

    LoadedIndices {
        offline: OfflineIndex::new(final_by_user, personal_by_user, popularity),
        similarity: SimilarityIndex::new(similar_by_track),
    }
}

fn read_table(
    path: &Path,
    key_column: Option<&str>,
    item_column: &str,
    order: &RowOrder,
) -> Result<RankingTable, LoadError> {
    let file = File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).map_err(|source| LoadError::Parquet {
            path: path.to_path_buf(),
            source,
        })?;

    // Check the schema up front so an empty file with a wrong layout still fails
    let schema = builder.schema().clone();
    let order = &resolve_order(order, &schema);
    for column in key_column
        .into_iter()
        .chain(std::iter::once(item_column))
        .chain(order.column())
    {
        if schema.column_with_name(column).is_none() {
            return Err(LoadError::MissingColumn {
                path: path.to_path_buf(),
                column: column.to_string(),
            });
        }
    }

    let reader = builder.build().map_err(|source| LoadError::Parquet {
        path: path.to_path_buf(),
        source,
    })?;

    let mut table = RankingTable::new(path, order.clone());
    let mut row_offset = 0;

    for batch in reader {
        let batch = batch.map_err(|source| LoadError::Arrow {
            path: path.to_path_buf(),
            source,
        })?;

        let items = int_column(path, &batch, item_column, row_offset)?;
        let keys = match key_column {
            Some(column) => int_column(path, &batch, column, row_offset)?,
            None => vec![0; items.len()],
        };
        let order_values = match order.column() {
            Some(column) => float_column(path, &batch, column, row_offset)?,
            None => vec![0.0; items.len()],
        };

        for ((key, item), order_value) in keys.into_iter().zip(items).zip(order_values) {
            table.push(key, item, order_value);
        }
        row_offset += batch.num_rows();
    }

    info!(
        path = %path.display(),
        rows = table.rows.len(),
        order = %order,
        "Offline table read"
    );

    Ok(table)
}

/// Resolve `RowOrder::Auto` against the table schema: `rank` ascending, else
/// `score` descending, else `rank_score` descending, else file order.
fn resolve_order(order: &RowOrder, schema: &Schema) -> RowOrder {
    if *order != RowOrder::Auto {
        return order.clone();
    }

    let has = |column: &str| schema.column_with_name(column).is_some();
    if has(RANK_COLUMN) {
        RowOrder::ByRank(RANK_COLUMN.to_string())
    } else if has(SCORE_COLUMN) {
        RowOrder::ByScore(SCORE_COLUMN.to_string())
    } else if has(RANK_SCORE_COLUMN) {
        RowOrder::ByScore(RANK_SCORE_COLUMN.to_string())
    } else {
        RowOrder::Stored
    }
}

fn int_column(
    path: &Path,
    batch: &RecordBatch,
    column: &str,
    row_offset: usize,
) -> Result<Vec<i64>, LoadError> {
    let array = batch
        .column_by_name(column)
        .ok_or_else(|| LoadError::MissingColumn {
            path: path.to_path_buf(),
            column: column.to_string(),
        })?;

    if !array.data_type().is_integer() {
        return Err(LoadError::InvalidColumn {
            path: path.to_path_buf(),
            column: column.to_string(),
            reason: format!("expected integer identifiers, found {}", array.data_type()),
        });
    }

    let casted = cast(array, &DataType::Int64).map_err(|source| LoadError::Arrow {
        path: path.to_path_buf(),
        source,
    })?;
    let values = casted.as_primitive::<Int64Type>();

    (0..values.len())
        .map(|i| {
            if values.is_null(i) {
                Err(LoadError::NullValue {
                    path: path.to_path_buf(),
                    column: column.to_string(),
                    row: row_offset + i,
                })
            } else {
                Ok(values.value(i))
            }
        })
        .collect()
}

fn float_column(
    path: &Path,
    batch: &RecordBatch,
    column: &str,
    row_offset: usize,
) -> Result<Vec<f64>, LoadError> {
    let array = batch
        .column_by_name(column)
        .ok_or_else(|| LoadError::MissingColumn {
            path: path.to_path_buf(),
            column: column.to_string(),
        })?;

    if !array.data_type().is_numeric() {
        return Err(LoadError::InvalidColumn {
            path: path.to_path_buf(),
            column: column.to_string(),
            reason: format!("expected a numeric ordering column, found {}", array.data_type()),
        });
    }

    let casted = cast(array, &DataType::Float64).map_err(|source| LoadError::Arrow {
        path: path.to_path_buf(),
        source,
    })?;
    let values = casted.as_primitive::<Float64Type>();

    (0..values.len())
        .map(|i| {
            if values.is_null(i) {
                Err(LoadError::NullValue {
                    path: path.to_path_buf(),
                    column: column.to_string(),
                    row: row_offset + i,
                })
            } else if values.value(i).is_nan() {
                Err(LoadError::InvalidColumn {
                    path: path.to_path_buf(),
                    column: column.to_string(),
                    reason: format!("NaN at row {}", row_offset + i),
                })
            } else {
                Ok(values.value(i))
            }
        })
        .collect()
}
