//! Formatting utilities for printing relations.

use std::fmt::Write;

use arrow::array::{Array, ArrayRef, Float64Array, Int64Array, StringArray};

use basket_core::Relation;

/// Format up to `limit` rows of a relation as a text table.
pub fn format_relation(relation: &Relation, limit: usize) -> String {
    let mut output = String::new();

    // Header
    write!(output, "| ").unwrap();
    for field in relation.schema().fields() {
        write!(output, "{:18} | ", field.name()).unwrap();
    }
    writeln!(output).unwrap();

    write!(output, "|").unwrap();
    for _ in relation.schema().fields() {
        write!(output, "{:-<20}|", "").unwrap();
    }
    writeln!(output).unwrap();

    // Rows
    let total = relation.num_rows();
    let mut printed = 0;
    'outer: for batch in relation.batches() {
        for row in 0..batch.num_rows() {
            write!(output, "| ").unwrap();
            for column in batch.columns() {
                let value = format_value(column, row);
                write!(output, "{:18} | ", truncate(&value, 18)).unwrap();
            }
            writeln!(output).unwrap();

            printed += 1;
            if printed >= limit {
                break 'outer;
            }
        }
    }

    if printed < total {
        writeln!(output, "... showing {printed} of {total} rows").unwrap();
    }
    output
}

fn format_value(column: &ArrayRef, row: usize) -> String {
    if column.is_null(row) {
        return "null".to_string();
    }
    if let Some(ints) = column.as_any().downcast_ref::<Int64Array>() {
        ints.value(row).to_string()
    } else if let Some(floats) = column.as_any().downcast_ref::<Float64Array>() {
        format!("{:.4}", floats.value(row))
    } else if let Some(strings) = column.as_any().downcast_ref::<StringArray>() {
        strings.value(row).to_string()
    } else {
        format!("{:?}", column.data_type())
    }
}

fn truncate(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        value.to_string()
    } else {
        let cut: String = value.chars().take(width.saturating_sub(1)).collect();
        format!("{cut}…")
    }
}
