//! The `Relation` value type.

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, BooleanArray};
use arrow::compute::{concat_batches, filter_record_batch};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;

use common_error::{BasketError, BasketResult};

use crate::ops;
use crate::ops::aggregate::AggSpec;
use crate::ops::join::JoinOutput;
use crate::ops::sort::SortKey;

/// An immutable typed table: a schema plus zero or more `RecordBatch`es.
///
/// Row order across batches is the relation's row order. Operations never
/// mutate their inputs; they return new `Relation` values.
#[derive(Debug, Clone)]
pub struct Relation {
    schema: SchemaRef,
    batches: Vec<RecordBatch>,
}

impl Relation {
    /// Create a relation from a schema and batches sharing that schema.
    pub fn new(schema: SchemaRef, batches: Vec<RecordBatch>) -> BasketResult<Self> {
        for batch in &batches {
            if batch.schema().fields() != schema.fields() {
                return Err(BasketError::schema_mismatch(format!(
                    "batch schema {:?} does not match relation schema {:?}",
                    batch.schema().fields(),
                    schema.fields()
                )));
            }
        }
        Ok(Self { schema, batches })
    }

    /// Create a relation holding a single batch.
    pub fn from_batch(batch: RecordBatch) -> Self {
        Self {
            schema: batch.schema(),
            batches: vec![batch],
        }
    }

    /// Create an empty relation with the given schema.
    pub fn empty(schema: SchemaRef) -> Self {
        Self {
            schema,
            batches: Vec::new(),
        }
    }

    /// The relation's schema.
    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    /// The relation's batches.
    pub fn batches(&self) -> &[RecordBatch] {
        &self.batches
    }

    /// Total row count across all batches.
    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(RecordBatch::num_rows).sum()
    }

    /// True if the relation holds no rows.
    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }

    /// Arrow memory footprint of all batches, in bytes.
    pub fn memory_bytes(&self) -> usize {
        self.batches
            .iter()
            .map(RecordBatch::get_array_memory_size)
            .sum()
    }

    /// Resolve a column name to its index.
    pub fn index_of(&self, name: &str) -> BasketResult<usize> {
        self.schema
            .index_of(name)
            .map_err(|_| BasketError::column_not_found(name))
    }

    /// Combine all batches into one.
    pub fn concat(&self) -> BasketResult<RecordBatch> {
        if self.batches.is_empty() {
            return Ok(RecordBatch::new_empty(self.schema.clone()));
        }
        concat_batches(&self.schema, &self.batches).map_err(BasketError::from)
    }

    /// Append all rows of `other` to this relation.
    ///
    /// The two schemas must match exactly (names, types, nullability).
    /// Output cardinality is the sum of the input cardinalities; no
    /// deduplication, no filtering.
    pub fn union_all(&self, other: &Relation) -> BasketResult<Relation> {
        if self.schema.fields() != other.schema.fields() {
            return Err(BasketError::schema_mismatch(format!(
                "union inputs differ: left {:?}, right {:?}",
                self.schema.fields(),
                other.schema.fields()
            )));
        }

        let mut batches = self.batches.clone();
        batches.extend(other.batches.iter().cloned());
        Ok(Self {
            schema: self.schema.clone(),
            batches,
        })
    }

    /// Keep only rows for which the predicate mask is true.
    ///
    /// The predicate is evaluated once per batch and must return a mask of
    /// the batch's length.
    pub fn filter<F>(&self, predicate: F) -> BasketResult<Relation>
    where
        F: Fn(&RecordBatch) -> BasketResult<BooleanArray>,
    {
        let mut batches = Vec::with_capacity(self.batches.len());
        for batch in &self.batches {
            let mask = predicate(batch)?;
            batches.push(filter_record_batch(batch, &mask)?);
        }
        Ok(Self {
            schema: self.schema.clone(),
            batches,
        })
    }

    /// Project the named columns, in the given order.
    pub fn select(&self, names: &[&str]) -> BasketResult<Relation> {
        let indices = names
            .iter()
            .map(|name| self.index_of(name))
            .collect::<BasketResult<Vec<_>>>()?;

        let schema = Arc::new(self.schema.project(&indices)?);
        let batches = self
            .batches
            .iter()
            .map(|batch| batch.project(&indices).map_err(BasketError::from))
            .collect::<BasketResult<Vec<_>>>()?;

        Ok(Self { schema, batches })
    }

    /// Append a derived column computed per batch.
    pub fn with_column<F>(
        &self,
        name: &str,
        data_type: DataType,
        nullable: bool,
        f: F,
    ) -> BasketResult<Relation>
    where
        F: Fn(&RecordBatch) -> BasketResult<ArrayRef>,
    {
        if self.schema.index_of(name).is_ok() {
            return Err(BasketError::invalid_parameter(format!(
                "column {name} already exists"
            )));
        }

        let mut fields: Vec<Arc<Field>> = self.schema.fields().iter().cloned().collect();
        fields.push(Arc::new(Field::new(name, data_type, nullable)));
        let schema: SchemaRef = Arc::new(Schema::new(fields));

        let mut batches = Vec::with_capacity(self.batches.len());
        for batch in &self.batches {
            let column = f(batch)?;
            if column.len() != batch.num_rows() {
                return Err(BasketError::execution(format!(
                    "derived column {name} has {} values for {} rows",
                    column.len(),
                    batch.num_rows()
                )));
            }
            let mut columns: Vec<ArrayRef> = batch.columns().to_vec();
            columns.push(column);
            batches.push(RecordBatch::try_new(schema.clone(), columns)?);
        }

        Ok(Self { schema, batches })
    }

    /// Hash aggregation over the given key columns.
    ///
    /// Emits exactly one row per distinct key, sorted ascending by key.
    pub fn group_by(&self, keys: &[&str], aggs: &[AggSpec]) -> BasketResult<Relation> {
        ops::aggregate::group_by(self, keys, aggs)
    }

    /// Inner hash join on a same-named key column.
    ///
    /// The key appears once in the output; probe rows without a match are
    /// dropped and counted in [`JoinOutput::dropped_rows`].
    pub fn inner_join(&self, right: &Relation, key: &str) -> BasketResult<JoinOutput> {
        ops::join::inner_join(self, right, key)
    }

    /// Total sort by the given keys.
    pub fn order_by(&self, keys: &[SortKey]) -> BasketResult<Relation> {
        ops::sort::order_by(self, keys)
    }

    /// Partitioned dense rank (descending by the ranking column).
    pub fn dense_rank(
        &self,
        partition_by: &str,
        order_by_desc: &str,
        out: &str,
    ) -> BasketResult<Relation> {
        ops::window::dense_rank(self, partition_by, order_by_desc, out)
    }
}
