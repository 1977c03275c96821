//! Hash aggregation with mergeable accumulators.
//!
//! Aggregation is split into an explicit state object so partial states
//! built over disjoint partitions of the input can be combined: counts and
//! sums merge by addition, averages merge by summing their (sum, count)
//! pairs. Derived ratios are never computed on a partial state.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, Float64Array, Float64Builder, Int64Array, Int64Builder, StringBuilder,
};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;

use common_error::{BasketError, BasketResult};

use crate::ops::{key_value, KeyValue};
use crate::relation::Relation;

/// Aggregate function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggFunc {
    /// Row count; takes no input column.
    Count,
    /// Integer sum of an Int64 column.
    Sum,
    /// Arithmetic mean of a numeric column, as Float64.
    Avg,
}

impl AggFunc {
    /// Arrow type of the aggregate's output column.
    pub fn output_type(self) -> DataType {
        match self {
            Self::Count | Self::Sum => DataType::Int64,
            Self::Avg => DataType::Float64,
        }
    }
}

/// One aggregate to compute: function, optional input column, output name.
#[derive(Debug, Clone)]
pub struct AggSpec {
    /// The aggregate function.
    pub func: AggFunc,
    /// Input column; `None` only for `Count`.
    pub input: Option<String>,
    /// Output column name.
    pub output: String,
}

impl AggSpec {
    /// count(*) under the given output name.
    pub fn count(output: impl Into<String>) -> Self {
        Self {
            func: AggFunc::Count,
            input: None,
            output: output.into(),
        }
    }

    /// sum(input) under the given output name.
    pub fn sum(input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            func: AggFunc::Sum,
            input: Some(input.into()),
            output: output.into(),
        }
    }

    /// avg(input) under the given output name.
    pub fn avg(input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            func: AggFunc::Avg,
            input: Some(input.into()),
            output: output.into(),
        }
    }
}

/// Finished value of one accumulator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AggValue {
    Int64(i64),
    Float64(f64),
}

/// One aggregate's running state for a single group.
///
/// `merge` combines a partial state built over a different partition of
/// the input; `finish` must only be called once all partials are merged.
pub trait Accumulator: Send {
    /// Fold in the value at `row` of the input column (ignored by Count).
    fn update(&mut self, input: Option<&ArrayRef>, row: usize) -> BasketResult<()>;

    /// Merge another partial state of the same kind into this one.
    fn merge(&mut self, other: &dyn Accumulator) -> BasketResult<()>;

    /// Final value.
    fn finish(&self) -> AggValue;

    /// For downcasting in `merge`.
    fn as_any(&self) -> &dyn Any;
}

#[derive(Debug, Default)]
struct CountAccumulator {
    count: i64,
}

impl Accumulator for CountAccumulator {
    fn update(&mut self, _input: Option<&ArrayRef>, _row: usize) -> BasketResult<()> {
        self.count += 1;
        Ok(())
    }

    fn merge(&mut self, other: &dyn Accumulator) -> BasketResult<()> {
        let other = other
            .as_any()
            .downcast_ref::<Self>()
            .ok_or_else(|| BasketError::execution("cannot merge unlike accumulators"))?;
        self.count += other.count;
        Ok(())
    }

    fn finish(&self) -> AggValue {
        AggValue::Int64(self.count)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug, Default)]
struct SumAccumulator {
    sum: i64,
}

impl Accumulator for SumAccumulator {
    fn update(&mut self, input: Option<&ArrayRef>, row: usize) -> BasketResult<()> {
        let input = input
            .ok_or_else(|| BasketError::invalid_parameter("SUM requires an input column"))?;
        let ints = input
            .as_any()
            .downcast_ref::<Int64Array>()
            .ok_or_else(|| BasketError::type_error("SUM requires an Int64 input"))?;
        if !ints.is_null(row) {
            self.sum += ints.value(row);
        }
        Ok(())
    }

    fn merge(&mut self, other: &dyn Accumulator) -> BasketResult<()> {
        let other = other
            .as_any()
            .downcast_ref::<Self>()
            .ok_or_else(|| BasketError::execution("cannot merge unlike accumulators"))?;
        self.sum += other.sum;
        Ok(())
    }

    fn finish(&self) -> AggValue {
        AggValue::Int64(self.sum)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Average kept as (sum, count) so partials merge exactly; the quotient is
/// taken only in `finish`.
#[derive(Debug, Default)]
struct AvgAccumulator {
    sum: f64,
    count: i64,
}

impl Accumulator for AvgAccumulator {
    fn update(&mut self, input: Option<&ArrayRef>, row: usize) -> BasketResult<()> {
        let input = input
            .ok_or_else(|| BasketError::invalid_parameter("AVG requires an input column"))?;
        if let Some(floats) = input.as_any().downcast_ref::<Float64Array>() {
            if !floats.is_null(row) {
                self.sum += floats.value(row);
                self.count += 1;
            }
        } else if let Some(ints) = input.as_any().downcast_ref::<Int64Array>() {
            if !ints.is_null(row) {
                self.sum += ints.value(row) as f64;
                self.count += 1;
            }
        } else {
            return Err(BasketError::type_error("AVG requires a numeric input"));
        }
        Ok(())
    }

    fn merge(&mut self, other: &dyn Accumulator) -> BasketResult<()> {
        let other = other
            .as_any()
            .downcast_ref::<Self>()
            .ok_or_else(|| BasketError::execution("cannot merge unlike accumulators"))?;
        self.sum += other.sum;
        self.count += other.count;
        Ok(())
    }

    fn finish(&self) -> AggValue {
        if self.count == 0 {
            AggValue::Float64(0.0)
        } else {
            AggValue::Float64(self.sum / self.count as f64)
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn create_accumulator(func: AggFunc) -> Box<dyn Accumulator> {
    match func {
        AggFunc::Count => Box::<CountAccumulator>::default(),
        AggFunc::Sum => Box::<SumAccumulator>::default(),
        AggFunc::Avg => Box::<AvgAccumulator>::default(),
    }
}

/// Hash-aggregation state: one accumulator vector per distinct key.
///
/// Build one state per input partition, `merge` the partials, then
/// `finish` once.
pub struct GroupByState {
    keys: Vec<String>,
    aggs: Vec<AggSpec>,
    groups: HashMap<Vec<KeyValue>, Vec<Box<dyn Accumulator>>>,
}

impl std::fmt::Debug for GroupByState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupByState")
            .field("keys", &self.keys)
            .field("num_groups", &self.groups.len())
            .finish_non_exhaustive()
    }
}

impl GroupByState {
    /// Create an empty state for the given key columns and aggregates.
    pub fn new(keys: Vec<String>, aggs: Vec<AggSpec>) -> Self {
        Self {
            keys,
            aggs,
            groups: HashMap::new(),
        }
    }

    /// Number of distinct keys seen so far.
    pub fn num_groups(&self) -> usize {
        self.groups.len()
    }

    /// Fold a batch into the state.
    pub fn update_batch(&mut self, batch: &RecordBatch) -> BasketResult<()> {
        if batch.num_rows() == 0 {
            return Ok(());
        }

        let key_arrays = self
            .keys
            .iter()
            .map(|name| {
                batch
                    .column_by_name(name)
                    .cloned()
                    .ok_or_else(|| BasketError::column_not_found(name.clone()))
            })
            .collect::<BasketResult<Vec<_>>>()?;

        let agg_inputs = self
            .aggs
            .iter()
            .map(|spec| {
                spec.input
                    .as_ref()
                    .map(|name| {
                        batch
                            .column_by_name(name)
                            .cloned()
                            .ok_or_else(|| BasketError::column_not_found(name.clone()))
                    })
                    .transpose()
            })
            .collect::<BasketResult<Vec<Option<ArrayRef>>>>()?;

        for row in 0..batch.num_rows() {
            let mut key = Vec::with_capacity(self.keys.len());
            for (name, array) in self.keys.iter().zip(&key_arrays) {
                let value = key_value(array, row)?.ok_or_else(|| {
                    BasketError::execution(format!("null value in group key column {name}"))
                })?;
                key.push(value);
            }

            let accumulators = self.groups.entry(key).or_insert_with(|| {
                self.aggs
                    .iter()
                    .map(|spec| create_accumulator(spec.func))
                    .collect()
            });

            for (accumulator, input) in accumulators.iter_mut().zip(&agg_inputs) {
                accumulator.update(input.as_ref(), row)?;
            }
        }

        Ok(())
    }

    /// Merge a partial state built over a different partition.
    pub fn merge(&mut self, other: GroupByState) -> BasketResult<()> {
        if self.keys != other.keys {
            return Err(BasketError::invalid_parameter(
                "cannot merge aggregation states with different keys",
            ));
        }
        for (key, other_accs) in other.groups {
            match self.groups.entry(key) {
                std::collections::hash_map::Entry::Occupied(mut entry) => {
                    for (acc, other_acc) in entry.get_mut().iter_mut().zip(&other_accs) {
                        acc.merge(other_acc.as_ref())?;
                    }
                }
                std::collections::hash_map::Entry::Vacant(entry) => {
                    entry.insert(other_accs);
                }
            }
        }
        Ok(())
    }

    /// Emit one row per group, sorted ascending by key.
    ///
    /// `input_schema` supplies the key columns' types.
    pub fn finish(self, input_schema: &SchemaRef) -> BasketResult<Relation> {
        let mut fields: Vec<Field> = Vec::with_capacity(self.keys.len() + self.aggs.len());
        for name in &self.keys {
            let field = input_schema
                .field_with_name(name)
                .map_err(|_| BasketError::column_not_found(name.clone()))?;
            fields.push(Field::new(name, field.data_type().clone(), false));
        }
        for spec in &self.aggs {
            fields.push(Field::new(&spec.output, spec.func.output_type(), false));
        }
        let schema: SchemaRef = Arc::new(Schema::new(fields));

        if self.groups.is_empty() {
            return Ok(Relation::empty(schema));
        }

        let mut entries: Vec<_> = self.groups.into_iter().collect();
        entries.sort_by(|(a, _), (b, _)| a.cmp(b));
        let num_groups = entries.len();

        let mut columns: Vec<ArrayRef> = Vec::with_capacity(schema.fields().len());

        for (idx, _name) in self.keys.iter().enumerate() {
            match schema.field(idx).data_type() {
                DataType::Int64 => {
                    let mut builder = Int64Builder::with_capacity(num_groups);
                    for (key, _) in &entries {
                        match &key[idx] {
                            KeyValue::Int64(v) => builder.append_value(*v),
                            KeyValue::Utf8(_) => {
                                return Err(BasketError::execution(
                                    "group key value does not match its declared type",
                                ))
                            }
                        }
                    }
                    columns.push(Arc::new(builder.finish()));
                }
                DataType::Utf8 => {
                    let mut builder = StringBuilder::new();
                    for (key, _) in &entries {
                        match &key[idx] {
                            KeyValue::Utf8(v) => builder.append_value(v),
                            KeyValue::Int64(_) => {
                                return Err(BasketError::execution(
                                    "group key value does not match its declared type",
                                ))
                            }
                        }
                    }
                    columns.push(Arc::new(builder.finish()));
                }
                other => {
                    return Err(BasketError::type_error(format!(
                        "unsupported group key type {other:?}"
                    )))
                }
            }
        }

        for (agg_idx, spec) in self.aggs.iter().enumerate() {
            match spec.func.output_type() {
                DataType::Int64 => {
                    let mut builder = Int64Builder::with_capacity(num_groups);
                    for (_, accs) in &entries {
                        match accs[agg_idx].finish() {
                            AggValue::Int64(v) => builder.append_value(v),
                            AggValue::Float64(_) => {
                                return Err(BasketError::execution(
                                    "accumulator produced a value of the wrong type",
                                ))
                            }
                        }
                    }
                    columns.push(Arc::new(builder.finish()));
                }
                _ => {
                    let mut builder = Float64Builder::with_capacity(num_groups);
                    for (_, accs) in &entries {
                        match accs[agg_idx].finish() {
                            AggValue::Float64(v) => builder.append_value(v),
                            AggValue::Int64(_) => {
                                return Err(BasketError::execution(
                                    "accumulator produced a value of the wrong type",
                                ))
                            }
                        }
                    }
                    columns.push(Arc::new(builder.finish()));
                }
            }
        }

        let batch = RecordBatch::try_new(schema, columns)?;
        Ok(Relation::from_batch(batch))
    }
}

/// Aggregate a relation in one pass (single partition).
pub fn group_by(relation: &Relation, keys: &[&str], aggs: &[AggSpec]) -> BasketResult<Relation> {
    let mut state = GroupByState::new(
        keys.iter().map(|k| (*k).to_string()).collect(),
        aggs.to_vec(),
    );
    for batch in relation.batches() {
        state.update_batch(batch)?;
    }
    state.finish(relation.schema())
}
