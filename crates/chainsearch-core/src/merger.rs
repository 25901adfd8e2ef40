//! Result merger: folds batch fragments into one ordered dataset.

use crate::types::{EventDataset, EventSchema, Fragment, Row};

/// Concatenate `fragments` and stable-sort the rows by block number.
///
/// `NoData` and empty fragments contribute nothing; if every fragment is
/// empty the result is an empty dataset that still carries the columns.
pub fn merge(schema: &EventSchema, fragments: Vec<Fragment>) -> EventDataset {
    let mut rows: Vec<Row> = fragments
        .into_iter()
        .filter(|f| !f.is_empty())
        .flat_map(Fragment::into_rows)
        .collect();
    rows.sort_by_key(|r| r.block_number);

    let mut dataset = EventDataset::empty(schema);
    dataset.rows = rows;
    dataset
}
