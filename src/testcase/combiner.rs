use serde::{Deserialize, Serialize};

// ============================================================================
// Test-case rows
// ============================================================================

/// One combination: a value for every field, in column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCaseRow {
    pub assignments: Vec<(String, String)>,
}

impl TestCaseRow {
    pub fn get(&self, field: &str) -> Option<&str> {
        self.assignments
            .iter()
            .find(|(f, _)| f == field)
            .map(|(_, v)| v.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.assignments.iter().map(|(_, v)| v.as_str())
    }
}

/// Column headers plus the rows that were materialized.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TestCaseTable {
    pub headers: Vec<String>,
    pub rows: Vec<TestCaseRow>,
}

impl TestCaseTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ============================================================================
// Cartesian product
// ============================================================================

/// Lazy lexicographic walk over the product of several value lists.
///
/// The last list varies fastest, like an odometer. Yields nothing when there
/// are no lists or any list is empty.
pub struct Combinations<'a> {
    lists: Vec<&'a [String]>,
    cursor: Vec<usize>,
    done: bool,
}

impl<'a> Combinations<'a> {
    pub fn new(lists: Vec<&'a [String]>) -> Self {
        let done = lists.is_empty() || lists.iter().any(|l| l.is_empty());
        let cursor = vec![0; lists.len()];
        Self {
            lists,
            cursor,
            done,
        }
    }

    fn advance(&mut self) {
        for pos in (0..self.cursor.len()).rev() {
            self.cursor[pos] += 1;
            if self.cursor[pos] < self.lists[pos].len() {
                return;
            }
            self.cursor[pos] = 0;
        }
        // every position wrapped
        self.done = true;
    }
}

impl<'a> Iterator for Combinations<'a> {
    type Item = Vec<&'a str>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = self
            .cursor
            .iter()
            .zip(&self.lists)
            .map(|(&i, list)| list[i].as_str())
            .collect();
        self.advance();
        Some(item)
    }
}

/// Number of combinations, saturating at `usize::MAX`.
pub fn product_size(lists: &[&[String]]) -> usize {
    if lists.is_empty() {
        return 0;
    }
    lists
        .iter()
        .fold(1usize, |acc, l| acc.saturating_mul(l.len()))
}

/// The first `limit` combinations of the fields' candidate values.
///
/// Fields keep their given order as columns; when the full product is larger
/// than `limit` the output is its lexicographic prefix, so the same input
/// always yields the same rows.
pub fn combine(fields: &[(String, Vec<String>)], limit: usize) -> TestCaseTable {
    let headers: Vec<String> = fields.iter().map(|(name, _)| name.clone()).collect();
    let lists: Vec<&[String]> = fields.iter().map(|(_, values)| values.as_slice()).collect();

    let rows = Combinations::new(lists)
        .take(limit)
        .map(|combo| TestCaseRow {
            assignments: headers
                .iter()
                .cloned()
                .zip(combo.into_iter().map(str::to_string))
                .collect(),
        })
        .collect();

    TestCaseTable { headers, rows }
}

/// Smallest per-field candidate count `k` with `k^fields >= target`, so that
/// asking the model for `k` examples per field roughly fills `target` rows.
pub fn per_field_quota(fields: usize, target: usize) -> usize {
    if fields == 0 || target <= 1 {
        return 1;
    }
    let exp = u32::try_from(fields).unwrap_or(u32::MAX);
    let mut k = 1usize;
    while k.checked_pow(exp).is_some_and(|p| p < target) {
        k += 1;
    }
    k
}
