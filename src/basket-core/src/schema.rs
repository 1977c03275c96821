//! Declared schemas for the six input tables.
//!
//! The loader reads every input with the schema declared here — no
//! inference. Column order matches the cleaned CSV files.

use std::sync::Arc;

use arrow::datatypes::{DataType, Field, Schema, SchemaRef};

/// Schema of the products dimension table.
pub fn products() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("product_id", DataType::Int64, false),
        Field::new("product_name", DataType::Utf8, false),
        Field::new("aisle_id", DataType::Int64, false),
        Field::new("department_id", DataType::Int64, false),
    ]))
}

/// Schema of the aisles dimension table.
pub fn aisles() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("aisle_id", DataType::Int64, false),
        Field::new("aisle", DataType::Utf8, false),
    ]))
}

/// Schema of the departments dimension table.
pub fn departments() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("department_id", DataType::Int64, false),
        Field::new("department", DataType::Utf8, false),
    ]))
}

/// Schema of the order header table.
///
/// `days_since_prior_order` arrives already null-filled (zeroes) from the
/// upstream cleaning step. `eval_set` is carried by the cleaned file but
/// consumed by no analysis.
pub fn orders() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("order_id", DataType::Int64, false),
        Field::new("user_id", DataType::Int64, false),
        Field::new("eval_set", DataType::Utf8, false),
        Field::new("order_number", DataType::Int64, false),
        Field::new("order_dow", DataType::Int64, false),
        Field::new("order_hour_of_day", DataType::Int64, false),
        Field::new("days_since_prior_order", DataType::Float64, false),
    ]))
}

/// Schema shared by both order-item tables (prior and train).
pub fn order_items() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("order_id", DataType::Int64, false),
        Field::new("product_id", DataType::Int64, false),
        Field::new("add_to_cart_order", DataType::Int64, false),
        Field::new("reordered", DataType::Int64, false),
    ]))
}
