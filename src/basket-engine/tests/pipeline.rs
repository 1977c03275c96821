//! End-to-end pipeline tests: CSV inputs in, five CSV artifacts out.

use std::path::Path;
use std::sync::Arc;

use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use async_trait::async_trait;

use basket_core::testing::{float_values, int_values, str_values};
use basket_core::Relation;
use basket_engine::{run_pipeline, ExecutionContext, RuntimeConfig};
use basket_storage::{read_csv, CsvMaterializer, CsvTableLoader, Materializer};
use common_error::{BasketError, BasketResult};

/// Small but meaningful fixture:
/// - product 1 (Banana) and product 3 (Sourdough) each appear in three
///   orders, product 2 (Apple) in one;
/// - reorder flags give product rates 2/3, 0 and 2/3;
/// - orders at hours 9, 9, 14 and 20 from users 7, 7, 8 and 9.
fn write_input_files(dir: &Path) {
    std::fs::write(
        dir.join("products_cleaned.csv"),
        "product_id,product_name,aisle_id,department_id\n\
         1,Banana,1,1\n\
         2,Apple,1,1\n\
         3,Sourdough,2,2\n",
    )
    .unwrap();
    std::fs::write(
        dir.join("orders_cleaned.csv"),
        "order_id,user_id,eval_set,order_number,order_dow,order_hour_of_day,days_since_prior_order\n\
         100,7,prior,1,2,9,0.0\n\
         101,7,prior,2,3,9,3.0\n\
         102,8,train,1,5,14,0.0\n\
         103,9,prior,1,0,20,0.0\n",
    )
    .unwrap();
    std::fs::write(
        dir.join("order_products_prior_cleaned.csv"),
        "order_id,product_id,add_to_cart_order,reordered\n\
         100,1,1,0\n\
         100,3,2,0\n\
         101,1,1,1\n\
         101,2,2,0\n\
         103,3,1,1\n",
    )
    .unwrap();
    std::fs::write(
        dir.join("order_products_train_cleaned.csv"),
        "order_id,product_id,add_to_cart_order,reordered\n\
         102,1,1,1\n\
         102,3,2,1\n",
    )
    .unwrap();
    std::fs::write(
        dir.join("aisles_cleaned.csv"),
        "aisle_id,aisle\n1,fresh fruit\n2,bread\n",
    )
    .unwrap();
    std::fs::write(
        dir.join("departments_cleaned.csv"),
        "department_id,department\n1,produce\n2,bakery\n",
    )
    .unwrap();
}

fn popular_products_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("product_id", DataType::Int64, false),
        Field::new("product_name", DataType::Utf8, false),
        Field::new("aisle", DataType::Utf8, false),
        Field::new("department", DataType::Utf8, false),
        Field::new("order_count", DataType::Int64, false),
    ]))
}

fn reorder_rates_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("department_id", DataType::Int64, false),
        Field::new("department", DataType::Utf8, false),
        Field::new("avg_reorder_rate", DataType::Float64, false),
    ]))
}

fn hour_patterns_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("order_hour_of_day", DataType::Int64, false),
        Field::new("order_count", DataType::Int64, false),
    ]))
}

fn user_frequency_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("user_id", DataType::Int64, false),
        Field::new("order_count", DataType::Int64, false),
    ]))
}

fn top_aisle_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("aisle_id", DataType::Int64, false),
        Field::new("aisle", DataType::Utf8, false),
        Field::new("product_id", DataType::Int64, false),
        Field::new("product_name", DataType::Utf8, false),
        Field::new("product_count", DataType::Int64, false),
        Field::new("rank", DataType::Int64, false),
    ]))
}

#[tokio::test]
async fn full_pipeline_produces_all_five_artifacts() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_input_files(input.path());

    let ctx = ExecutionContext::new(RuntimeConfig::default().with_parallelism(2));
    let loader = CsvTableLoader::new(input.path());
    let materializer = Arc::new(CsvMaterializer::new(output.path()));

    let reports = run_pipeline(&ctx, &loader, materializer).await.unwrap();
    assert_eq!(reports.len(), 5);
    for report in &reports {
        assert!(report.succeeded(), "{} failed: {:?}", report.name, report.error);
    }

    // popular_products: counts 3, 3, 1; ties break ascending by id.
    let popular = read_csv(
        &output.path().join("popular_products.csv"),
        popular_products_schema(),
    )
    .unwrap();
    assert_eq!(int_values(&popular, "product_id"), vec![1, 3, 2]);
    assert_eq!(int_values(&popular, "order_count"), vec![3, 3, 1]);
    assert_eq!(
        str_values(&popular, "product_name"),
        vec!["Banana", "Sourdough", "Apple"]
    );
    assert_eq!(
        str_values(&popular, "department"),
        vec!["produce", "bakery", "produce"]
    );

    // reorder_rates_by_department: bakery 2/3, produce mean(2/3, 0) = 1/3.
    let rates = read_csv(
        &output.path().join("reorder_rates_by_department.csv"),
        reorder_rates_schema(),
    )
    .unwrap();
    assert_eq!(int_values(&rates, "department_id"), vec![2, 1]);
    assert_eq!(str_values(&rates, "department"), vec!["bakery", "produce"]);
    let rate_values = float_values(&rates, "avg_reorder_rate");
    assert!((rate_values[0] - 2.0 / 3.0).abs() < 1e-9);
    assert!((rate_values[1] - 1.0 / 3.0).abs() < 1e-9);

    // order_hour_patterns: hours 9, 14, 20; total preserved.
    let hours = read_csv(
        &output.path().join("order_hour_patterns.csv"),
        hour_patterns_schema(),
    )
    .unwrap();
    assert_eq!(int_values(&hours, "order_hour_of_day"), vec![9, 14, 20]);
    assert_eq!(int_values(&hours, "order_count"), vec![2, 1, 1]);

    // user_frequency: user 7 twice, then 8 and 9.
    let users = read_csv(
        &output.path().join("user_frequency.csv"),
        user_frequency_schema(),
    )
    .unwrap();
    assert_eq!(int_values(&users, "user_id"), vec![7, 8, 9]);
    assert_eq!(int_values(&users, "order_count"), vec![2, 1, 1]);

    // top_aisle_products: "bread" sorts before "fresh fruit".
    let top = read_csv(
        &output.path().join("top_aisle_products.csv"),
        top_aisle_schema(),
    )
    .unwrap();
    assert_eq!(str_values(&top, "aisle"), vec!["bread", "fresh fruit", "fresh fruit"]);
    assert_eq!(int_values(&top, "product_id"), vec![3, 1, 2]);
    assert_eq!(int_values(&top, "rank"), vec![1, 1, 2]);
    assert_eq!(int_values(&top, "product_count"), vec![3, 3, 1]);
}

#[tokio::test]
async fn rerun_overwrites_outputs_in_place() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_input_files(input.path());

    let ctx = ExecutionContext::default();
    let loader = CsvTableLoader::new(input.path());
    let materializer: Arc<dyn Materializer> = Arc::new(CsvMaterializer::new(output.path()));

    run_pipeline(&ctx, &loader, Arc::clone(&materializer))
        .await
        .unwrap();
    let first = std::fs::read_to_string(output.path().join("user_frequency.csv")).unwrap();

    run_pipeline(&ctx, &loader, materializer).await.unwrap();
    let second = std::fs::read_to_string(output.path().join("user_frequency.csv")).unwrap();

    assert_eq!(first, second);
}

/// Materializer that fails for one artifact and delegates the rest.
struct FailingMaterializer {
    inner: CsvMaterializer,
    fail_for: &'static str,
}

#[async_trait]
impl Materializer for FailingMaterializer {
    async fn materialize(&self, name: &str, relation: &Relation) -> BasketResult<()> {
        if name == self.fail_for {
            return Err(BasketError::storage("injected write failure"));
        }
        self.inner.materialize(name, relation).await
    }
}

#[tokio::test]
async fn one_failing_analysis_does_not_stop_the_others() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_input_files(input.path());

    let ctx = ExecutionContext::default();
    let loader = CsvTableLoader::new(input.path());
    let materializer = Arc::new(FailingMaterializer {
        inner: CsvMaterializer::new(output.path()),
        fail_for: "popular_products",
    });

    let reports = run_pipeline(&ctx, &loader, materializer).await.unwrap();
    assert_eq!(reports.len(), 5);

    let failed: Vec<_> = reports.iter().filter(|r| !r.succeeded()).collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].name, "popular_products");

    // The other four artifacts all landed.
    assert!(!output.path().join("popular_products.csv").exists());
    for artifact in [
        "reorder_rates_by_department.csv",
        "order_hour_patterns.csv",
        "user_frequency.csv",
        "top_aisle_products.csv",
    ] {
        assert!(output.path().join(artifact).exists(), "{artifact} missing");
    }
}

#[tokio::test]
async fn exceeded_memory_budget_aborts_the_run() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_input_files(input.path());

    // A few bytes cannot hold six tables.
    let ctx = ExecutionContext::new(RuntimeConfig::default().with_memory_budget(16));
    let loader = CsvTableLoader::new(input.path());
    let materializer = Arc::new(CsvMaterializer::new(output.path()));

    let err = run_pipeline(&ctx, &loader, materializer).await.unwrap_err();
    assert!(err.to_string().contains("ResourceExhausted"));
    // The budget is returned after the failed run.
    assert_eq!(ctx.memory.used(), 0);
}

#[tokio::test]
async fn dropped_join_rows_are_surfaced_in_metrics() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_input_files(input.path());

    // Remove product 2 so its one order-item no longer resolves.
    std::fs::write(
        input.path().join("products_cleaned.csv"),
        "product_id,product_name,aisle_id,department_id\n\
         1,Banana,1,1\n\
         3,Sourdough,2,2\n",
    )
    .unwrap();

    let ctx = ExecutionContext::default();
    let loader = CsvTableLoader::new(input.path());
    let materializer = Arc::new(CsvMaterializer::new(output.path()));

    let reports = run_pipeline(&ctx, &loader, materializer).await.unwrap();
    for report in &reports {
        assert!(report.succeeded());
    }

    let sink = ctx.metrics.as_ref().unwrap();
    assert_eq!(sink.get("popular_products").unwrap().dropped_rows, 1);
    assert_eq!(sink.get("top_aisle_products").unwrap().dropped_rows, 1);

    let popular = read_csv(
        &output.path().join("popular_products.csv"),
        popular_products_schema(),
    )
    .unwrap();
    assert_eq!(int_values(&popular, "product_id"), vec![1, 3]);
}
