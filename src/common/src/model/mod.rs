pub mod metric;

pub use metric::{FieldValue, Metric};
