//! Output materialization.

use std::fs::File;
use std::path::{Path, PathBuf};

use arrow::csv::WriterBuilder;
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;

use basket_core::Relation;
use common_error::{BasketError, BasketResult};

/// Durably writes a derived relation under a logical name.
#[async_trait]
pub trait Materializer: Send + Sync {
    /// Write `relation` as the complete new content of artifact `name`.
    ///
    /// Must replace any prior artifact of the same name in full, or leave
    /// it untouched on failure.
    async fn materialize(&self, name: &str, relation: &Relation) -> BasketResult<()>;
}

/// Writes each relation to `<output_dir>/<name>.csv` with a header row.
///
/// The write goes to a temporary file in the same directory which is then
/// renamed over the target, so a re-run overwrites in place and a failed
/// write leaves the previous artifact intact.
#[derive(Debug, Clone)]
pub struct CsvMaterializer {
    output_dir: PathBuf,
}

impl CsvMaterializer {
    /// Create a materializer rooted at the given output directory.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }
}

#[async_trait]
impl Materializer for CsvMaterializer {
    async fn materialize(&self, name: &str, relation: &Relation) -> BasketResult<()> {
        std::fs::create_dir_all(&self.output_dir)?;

        let target = self.output_dir.join(format!("{name}.csv"));
        let staging = self.output_dir.join(format!(".{name}.csv.tmp"));
        let relation = relation.clone();

        let rows = relation.num_rows();
        tokio::task::spawn_blocking(move || write_csv(&staging, &target, &relation))
            .await
            .map_err(|e| BasketError::execution(format!("materialize task failed: {e}")))??;

        log::info!("materialized {name} ({rows} rows)");
        Ok(())
    }
}

fn write_csv(staging: &Path, target: &Path, relation: &Relation) -> BasketResult<()> {
    let result = (|| -> BasketResult<()> {
        let file = File::create(staging).map_err(|e| {
            BasketError::storage(format!("cannot create {}: {e}", staging.display()))
        })?;

        let mut writer = WriterBuilder::new().with_header(true).build(file);
        if relation.batches().is_empty() {
            // Header-only output.
            writer.write(&RecordBatch::new_empty(relation.schema().clone()))?;
        } else {
            for batch in relation.batches() {
                writer.write(batch)?;
            }
        }

        let file = writer.into_inner();
        file.sync_all()?;
        std::fs::rename(staging, target)?;
        Ok(())
    })();

    if result.is_err() {
        let _ = std::fs::remove_file(staging);
    }
    result
}
