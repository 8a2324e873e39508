use super::Panel;
use crate::stats::is_missing;

/// One entity's rows, copied out of the panel in chronological order.
///
/// Frames are independent of each other, so detectors can run on them in
/// any order or in parallel.
#[derive(Debug, Clone)]
pub struct EntityFrame<'a> {
    entity: &'a str,
    rows: &'a [usize],
    fields: &'a [String],
    timestamps: Vec<i64>,
    columns: Vec<Vec<f64>>,
}

impl<'a> EntityFrame<'a> {
    pub(crate) fn gather(entity: &'a str, rows: &'a [usize], panel: &'a Panel) -> Self {
        let timestamps = rows
            .iter()
            .filter_map(|&r| panel.index().key(r).map(|(_, ts)| ts.timestamp()))
            .collect();
        let columns = panel
            .columns()
            .iter()
            .map(|col| rows.iter().map(|&r| col[r]).collect())
            .collect();
        Self {
            entity,
            rows,
            fields: panel.fields(),
            timestamps,
            columns,
        }
    }

    pub fn entity(&self) -> &'a str {
        self.entity
    }

    /// Row positions in the source panel, one per observation.
    pub fn rows(&self) -> &'a [usize] {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn fields(&self) -> &'a [String] {
        self.fields
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f == name)
    }

    /// Epoch seconds, strictly increasing.
    pub fn timestamps(&self) -> &[i64] {
        &self.timestamps
    }

    pub fn column(&self, field: usize) -> &[f64] {
        &self.columns[field]
    }

    pub fn valid_count(&self, field: usize) -> usize {
        self.columns[field].iter().filter(|v| !is_missing(**v)).count()
    }

    /// Replaces every column by `f(column)`; used for the log transform.
    pub(crate) fn map_columns(mut self, f: impl Fn(f64) -> f64) -> Self {
        for col in self.columns.iter_mut() {
            for v in col.iter_mut() {
                *v = f(*v);
            }
        }
        self
    }
}
