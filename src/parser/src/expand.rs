//! Array expansion
//!
//! Every scalar reached through arrays (and arrays of arrays) becomes its own
//! row: a copy of the fields collected so far plus that one scalar. A uniform
//! nesting of lengths `n1, n2, .., nD` therefore yields `n1 * n2 * .. * nD`
//! rows in document order.

use serde_json::Value;

use crate::clock::Clock;
use crate::error::ParseError;
use crate::row::WorkingRow;

/// Expand `row` into one row per scalar leaf
///
/// A row whose query matched nothing yields no rows. A scalar is added to the
/// row's own metric. Objects are rejected wherever they appear, and the first
/// failure at any depth aborts the whole expansion.
pub fn expand<'v>(row: WorkingRow<'v>, clock: &dyn Clock) -> Result<Vec<WorkingRow<'v>>, ParseError> {
    let mut rows = Vec::new();
    expand_into(row, clock, &mut rows)?;
    Ok(rows)
}

fn expand_into<'v>(
    mut row: WorkingRow<'v>,
    clock: &dyn Clock,
    out: &mut Vec<WorkingRow<'v>>,
) -> Result<(), ParseError> {
    match row.node {
        None => Ok(()),
        Some(Value::Object(_)) => Err(ParseError::encountered_object(&row.field_name)),
        Some(Value::Array(items)) => {
            for item in items {
                if item.is_object() {
                    return Err(ParseError::encountered_object(&row.field_name));
                }

                let mut branch = row.branch(item, clock);
                if item.is_array() {
                    expand_into(branch, clock, out)?;
                } else {
                    branch.add_value(item)?;
                    out.push(branch);
                }
            }
            Ok(())
        }
        Some(scalar) => {
            row.add_value(scalar)?;
            out.push(row);
            Ok(())
        }
    }
}
