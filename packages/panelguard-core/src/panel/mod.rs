//! Validated multi-entity time-series panel.
//!
//! Columnar (one `Vec<f64>` per field, `NaN` = missing) over a shared
//! (entity, timestamp) index. Rows keep the caller's order; each entity's rows
//! are chronological.

mod frame;
mod reader;

pub use frame::EntityFrame;
pub use reader::{parse_timestamp, CsvOptions, PanelRecords, RowRecord};

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::{PanelError, Result};
use crate::stats::is_missing;

/// Composite (entity, timestamp) index shared by a panel and everything derived from it.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelIndex {
    entities: Vec<String>,
    keys: Vec<(u32, DateTime<Utc>)>,
    // row positions per entity, chronological
    rows_by_entity: Vec<Vec<usize>>,
}

impl PanelIndex {
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn entities(&self) -> &[String] {
        &self.entities
    }

    pub fn key(&self, row: usize) -> Option<(&str, DateTime<Utc>)> {
        let (e, ts) = self.keys.get(row)?;
        Some((self.entities[*e as usize].as_str(), *ts))
    }

    pub fn entity_rows(&self, entity: &str) -> Option<&[usize]> {
        let e = self.entities.iter().position(|x| x == entity)?;
        Some(&self.rows_by_entity[e])
    }
}

#[derive(Debug, Clone)]
pub struct Panel {
    fields: Arc<[String]>,
    index: Arc<PanelIndex>,
    columns: Vec<Vec<f64>>,
}

impl Panel {
    pub fn builder<S: AsRef<str>>(fields: &[S]) -> Result<PanelBuilder> {
        PanelBuilder::new(fields)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f == name)
    }

    pub fn entities(&self) -> &[String] {
        self.index.entities()
    }

    pub fn index(&self) -> &PanelIndex {
        &self.index
    }

    pub fn keys(&self) -> impl Iterator<Item = (&str, DateTime<Utc>)> + '_ {
        (0..self.len()).filter_map(move |r| self.index.key(r))
    }

    pub fn entity_rows(&self, entity: &str) -> Option<&[usize]> {
        self.index.entity_rows(entity)
    }

    /// `None` when the cell is missing or out of range.
    pub fn value(&self, row: usize, field: usize) -> Option<f64> {
        let v = *self.columns.get(field)?.get(row)?;
        (!is_missing(v)).then_some(v)
    }

    /// Raw column, `NaN` marking missing cells.
    pub fn column(&self, field: usize) -> &[f64] {
        &self.columns[field]
    }

    pub fn column_by_name(&self, name: &str) -> Option<&[f64]> {
        self.field_index(name).map(|i| self.column(i))
    }

    pub fn non_missing_count(&self, field: usize) -> usize {
        self.columns[field].iter().filter(|v| !is_missing(**v)).count()
    }

    pub fn missing_count(&self, field: usize) -> usize {
        self.len() - self.non_missing_count(field)
    }

    /// Same keys, same order, same fields.
    pub fn same_shape(&self, other: &Panel) -> bool {
        (Arc::ptr_eq(&self.index, &other.index) || self.index == other.index)
            && self.fields == other.fields
    }

    /// Panel sharing this index and field list with new cell values.
    ///
    /// Callers guarantee `columns` matches the shape; non-finite values are
    /// normalised to missing.
    pub(crate) fn with_columns(&self, mut columns: Vec<Vec<f64>>) -> Panel {
        debug_assert_eq!(columns.len(), self.fields.len());
        for col in columns.iter_mut() {
            debug_assert_eq!(col.len(), self.len());
            for v in col.iter_mut().filter(|v| !v.is_finite()) {
                *v = f64::NAN;
            }
        }
        Panel {
            fields: Arc::clone(&self.fields),
            index: Arc::clone(&self.index),
            columns,
        }
    }

    pub(crate) fn columns(&self) -> &[Vec<f64>] {
        &self.columns
    }

    /// Keeps only rows of entities accepted by `keep`, preserving row order.
    pub fn select_entities(&self, mut keep: impl FnMut(&str) -> bool) -> Panel {
        let mut builder = PanelBuilder::from_fields(Arc::clone(&self.fields));
        let mut row_buf = vec![None; self.fields.len()];
        for row in 0..self.len() {
            let Some((entity, ts)) = self.index.key(row) else {
                continue;
            };
            if !keep(entity) {
                continue;
            }
            for (f, slot) in row_buf.iter_mut().enumerate() {
                *slot = self.value(row, f);
            }
            builder.push_unchecked(entity, ts, &row_buf);
        }
        builder.build()
    }

    /// Per-entity arena: contiguous chronological copies of every entity's rows.
    pub fn entity_frames(&self) -> Vec<EntityFrame<'_>> {
        self.index
            .entities
            .iter()
            .zip(&self.index.rows_by_entity)
            .map(|(entity, rows)| EntityFrame::gather(entity, rows, self))
            .collect()
    }
}

/// Row-by-row panel construction with validation.
#[derive(Debug)]
pub struct PanelBuilder {
    fields: Arc<[String]>,
    entity_ids: HashMap<String, u32>,
    entities: Vec<String>,
    keys: Vec<(u32, DateTime<Utc>)>,
    rows_by_entity: Vec<Vec<usize>>,
    columns: Vec<Vec<f64>>,
}

impl PanelBuilder {
    pub fn new<S: AsRef<str>>(fields: &[S]) -> Result<Self> {
        if fields.is_empty() {
            return Err(PanelError::NoFields);
        }
        let mut names: Vec<String> = Vec::with_capacity(fields.len());
        for (i, f) in fields.iter().enumerate() {
            let name = f.as_ref().trim();
            if name.is_empty() {
                return Err(PanelError::EmptyFieldName(i));
            }
            if names.iter().any(|n| n == name) {
                return Err(PanelError::DuplicateField(name.to_string()));
            }
            names.push(name.to_string());
        }
        Ok(Self::from_fields(names.into()))
    }

    fn from_fields(fields: Arc<[String]>) -> Self {
        let width = fields.len();
        Self {
            fields,
            entity_ids: HashMap::new(),
            entities: Vec::new(),
            keys: Vec::new(),
            rows_by_entity: Vec::new(),
            columns: vec![Vec::new(); width],
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Appends a row. Rejects width mismatches, non-finite values, empty
    /// entities and timestamps not strictly after the entity's previous row.
    pub fn push_row(
        &mut self,
        entity: &str,
        timestamp: DateTime<Utc>,
        values: &[Option<f64>],
    ) -> Result<()> {
        let row = self.keys.len();
        if values.len() != self.fields.len() {
            return Err(PanelError::RowWidth {
                row,
                expected: self.fields.len(),
                got: values.len(),
            });
        }
        let entity = entity.trim();
        if entity.is_empty() {
            return Err(PanelError::EmptyEntity { row });
        }
        if let Some((f, _)) = values
            .iter()
            .enumerate()
            .find(|(_, v)| v.is_some_and(|x| !x.is_finite()))
        {
            return Err(PanelError::NonFinite {
                row,
                field: self.fields[f].clone(),
            });
        }
        if let Some(&e) = self.entity_ids.get(entity) {
            let last_row = self.rows_by_entity[e as usize].last().copied();
            if let Some(last) = last_row {
                if self.keys[last].1 >= timestamp {
                    return Err(PanelError::UnorderedKey {
                        entity: entity.to_string(),
                        timestamp: timestamp.to_rfc3339(),
                        row,
                    });
                }
            }
        }
        self.push_unchecked(entity, timestamp, values);
        Ok(())
    }

    fn push_unchecked(&mut self, entity: &str, timestamp: DateTime<Utc>, values: &[Option<f64>]) {
        let row = self.keys.len();
        let e = match self.entity_ids.get(entity) {
            Some(&e) => e,
            None => {
                let e = self.entities.len() as u32;
                self.entity_ids.insert(entity.to_string(), e);
                self.entities.push(entity.to_string());
                self.rows_by_entity.push(Vec::new());
                e
            }
        };
        self.keys.push((e, timestamp));
        self.rows_by_entity[e as usize].push(row);
        for (col, v) in self.columns.iter_mut().zip(values) {
            col.push(v.unwrap_or(f64::NAN));
        }
    }

    pub fn build(self) -> Panel {
        Panel {
            fields: self.fields,
            index: Arc::new(PanelIndex {
                entities: self.entities,
                keys: self.keys,
                rows_by_entity: self.rows_by_entity,
            }),
            columns: self.columns,
        }
    }
}
