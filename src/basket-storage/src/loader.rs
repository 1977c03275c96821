//! Input table loading.

use std::fs::File;
use std::path::{Path, PathBuf};

use arrow::csv::ReaderBuilder;
use arrow::datatypes::SchemaRef;
use async_trait::async_trait;

use basket_core::{schema, Relation};
use common_error::{BasketError, BasketResult};

/// Batch size for CSV reads; large inputs arrive as multiple batches,
/// which is what the partitioned aggregation path works over.
const CSV_BATCH_SIZE: usize = 8192;

/// The six cleaned input relations, loaded once per pipeline run.
#[derive(Debug, Clone)]
pub struct InputTables {
    pub products: Relation,
    pub orders: Relation,
    pub order_items_prior: Relation,
    pub order_items_train: Relation,
    pub aisles: Relation,
    pub departments: Relation,
}

impl InputTables {
    /// Arrow memory footprint of all six tables, in bytes.
    pub fn memory_bytes(&self) -> usize {
        self.products.memory_bytes()
            + self.orders.memory_bytes()
            + self.order_items_prior.memory_bytes()
            + self.order_items_train.memory_bytes()
            + self.aisles.memory_bytes()
            + self.departments.memory_bytes()
    }
}

/// Supplies the input tables as typed relations.
#[async_trait]
pub trait TableLoader: Send + Sync {
    /// Load all six tables.
    async fn load(&self) -> BasketResult<InputTables>;
}

/// Loads the cleaned CSV files produced by the upstream cleaning step.
///
/// Each file is read with its declared schema; nothing is inferred.
#[derive(Debug, Clone)]
pub struct CsvTableLoader {
    input_dir: PathBuf,
}

impl CsvTableLoader {
    /// Create a loader rooted at the given input directory.
    pub fn new(input_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
        }
    }
}

#[async_trait]
impl TableLoader for CsvTableLoader {
    async fn load(&self) -> BasketResult<InputTables> {
        let specs: [(&str, SchemaRef); 6] = [
            ("products_cleaned.csv", schema::products()),
            ("orders_cleaned.csv", schema::orders()),
            ("order_products_prior_cleaned.csv", schema::order_items()),
            ("order_products_train_cleaned.csv", schema::order_items()),
            ("aisles_cleaned.csv", schema::aisles()),
            ("departments_cleaned.csv", schema::departments()),
        ];

        let handles: Vec<_> = specs
            .iter()
            .map(|(file, schema)| {
                let path = self.input_dir.join(file);
                let schema = schema.clone();
                tokio::task::spawn_blocking(move || read_csv(&path, schema))
            })
            .collect();

        let tables = futures::future::try_join_all(handles)
            .await
            .map_err(|e| BasketError::execution(format!("table load task failed: {e}")))?
            .into_iter()
            .collect::<BasketResult<Vec<_>>>()?;

        let [products, orders, order_items_prior, order_items_train, aisles, departments]: [Relation; 6] = tables
            .try_into()
            .map_err(|_| BasketError::execution("expected six loaded tables"))?;

        Ok(InputTables {
            products,
            orders,
            order_items_prior,
            order_items_train,
            aisles,
            departments,
        })
    }
}

/// Read one CSV file into a relation using a declared schema.
///
/// The header row is skipped; columns are read positionally.
pub fn read_csv(path: &Path, schema: SchemaRef) -> BasketResult<Relation> {
    let file = File::open(path)
        .map_err(|e| BasketError::storage(format!("cannot open {}: {e}", path.display())))?;

    let reader = ReaderBuilder::new(schema.clone())
        .with_header(true)
        .with_batch_size(CSV_BATCH_SIZE)
        .build(file)?;

    let batches = reader.collect::<Result<Vec<_>, _>>()?;
    let relation = Relation::new(schema, batches)?;
    log::debug!("loaded {} rows from {}", relation.num_rows(), path.display());
    Ok(relation)
}
