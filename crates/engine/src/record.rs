use rid::Rid;

/// A materialized row: the base RID it was located through, the search key
/// it was found by, and its projected column values. `columns[i]` is `None`
/// wherever the caller's projection mask excluded column `i`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    pub rid: Rid,
    pub key: i64,
    pub columns: Vec<Option<i64>>,
}
