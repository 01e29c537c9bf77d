//! Data
//!
//! Array containers and the [`NumericArray`] contract every score and
//! prediction set function is written against.
use crate::errors::ConformalError;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Family of in-memory representations an array belongs to.
///
/// Plain arrays (slices, vectors, dense matrices) are `Dense`, tabular frames
/// made of independent column buffers are `Columnar`. Prediction and ground
/// truth must share the same layout.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
pub enum Layout {
    Dense,
    Columnar,
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Layout::Dense => write!(f, "dense"),
            Layout::Columnar => write!(f, "columnar"),
        }
    }
}

/// Uniform read access over one and two dimensional numeric arrays.
pub trait NumericArray: Sync {
    /// Representation family of the array.
    fn layout(&self) -> Layout;
    /// Number of dimensions, 1 or 2.
    fn ndim(&self) -> usize;
    /// Number of rows (examples).
    fn rows(&self) -> usize;
    /// Number of columns, 1 for one dimensional arrays.
    fn cols(&self) -> usize;
    /// Value at row `i`, column `j`.
    fn get(&self, i: usize, j: usize) -> f64;

    /// Entire column `col`, borrowed when the storage is contiguous.
    fn column(&self, col: usize) -> Cow<'_, [f64]> {
        Cow::Owned((0..self.rows()).map(|i| self.get(i, col)).collect())
    }

    /// Entire row `row`, borrowed when the storage is contiguous.
    fn row(&self, row: usize) -> Cow<'_, [f64]> {
        Cow::Owned((0..self.cols()).map(|j| self.get(row, j)).collect())
    }
}

impl NumericArray for Vec<f64> {
    fn layout(&self) -> Layout {
        Layout::Dense
    }
    fn ndim(&self) -> usize {
        1
    }
    fn rows(&self) -> usize {
        self.len()
    }
    fn cols(&self) -> usize {
        1
    }
    fn get(&self, i: usize, _j: usize) -> f64 {
        self[i]
    }
    fn column(&self, _col: usize) -> Cow<'_, [f64]> {
        Cow::Borrowed(self.as_slice())
    }
}

impl NumericArray for &[f64] {
    fn layout(&self) -> Layout {
        Layout::Dense
    }
    fn ndim(&self) -> usize {
        1
    }
    fn rows(&self) -> usize {
        self.len()
    }
    fn cols(&self) -> usize {
        1
    }
    fn get(&self, i: usize, _j: usize) -> f64 {
        self[i]
    }
    fn column(&self, _col: usize) -> Cow<'_, [f64]> {
        Cow::Borrowed(*self)
    }
}

/// Contiguous Column Major Matrix data container.
///
/// This structure holds a dense matrix of values in a single contiguous memory block,
/// in column-major order (Fortran-style), which allows for efficient column slicing.
///
/// # Type Parameters
/// * `T` - The numeric type of the data (e.g., `f32`, `f64`).
pub struct Matrix<'a, T> {
    /// The raw data stored in a single slice.
    pub data: &'a [T],
    /// Number of rows in the matrix.
    pub rows: usize,
    /// Number of columns in the matrix.
    pub cols: usize,
    stride1: usize,
    stride2: usize,
}

impl<'a, T> Matrix<'a, T> {
    /// Create a new Matrix.
    pub fn new(data: &'a [T], rows: usize, cols: usize) -> Self {
        Matrix {
            data,
            rows,
            cols,
            stride1: rows,
            stride2: 1,
        }
    }

    /// Get a single reference to an item in the matrix.
    ///
    /// * `i` - The ith row of the data to get.
    /// * `j` - the jth column of the data to get.
    pub fn get(&self, i: usize, j: usize) -> &T {
        &self.data[self.item_index(i, j)]
    }

    fn item_index(&self, i: usize, j: usize) -> usize {
        let mut idx = self.stride2 * i;
        idx += j * self.stride1;
        idx
    }

    /// Get a slice of a column in the matrix.
    ///
    /// * `col` - The index of the column to select.
    /// * `start_row` - The index of the start of the slice.
    /// * `end_row` - The index of the end of the slice of the column to select.
    pub fn get_col_slice(&self, col: usize, start_row: usize, end_row: usize) -> &[T] {
        let i = self.item_index(start_row, col);
        let j = self.item_index(end_row, col);
        &self.data[i..j]
    }

    /// Get an entire column in the matrix.
    ///
    /// * `col` - The index of the column to get.
    pub fn get_col(&self, col: usize) -> &[T] {
        self.get_col_slice(col, 0, self.rows)
    }
}

impl NumericArray for Matrix<'_, f64> {
    fn layout(&self) -> Layout {
        Layout::Dense
    }
    fn ndim(&self) -> usize {
        2
    }
    fn rows(&self) -> usize {
        self.rows
    }
    fn cols(&self) -> usize {
        self.cols
    }
    fn get(&self, i: usize, j: usize) -> f64 {
        *Matrix::get(self, i, j)
    }
    fn column(&self, col: usize) -> Cow<'_, [f64]> {
        Cow::Borrowed(self.get_col(col))
    }
}

/// Columnar matrix storing columns as separate slices.
///
/// This is the tabular representation: each column is its own buffer, as handed
/// over by Arrow or Polars without copying. Validity masks (bitmaps) mark null
/// cells, which read as NaN through [`NumericArray`].
pub struct ColumnarMatrix<'a, T> {
    /// The columns of the matrix. Each element is a slice representing one column.
    pub columns: Vec<&'a [T]>,
    /// Optional validity mask for each column.
    /// Each mask is a byte slice representing a packed bitmap (1 bit per element).
    /// * If the vector is present, it must have the same length as `columns`.
    /// * If a specific column's mask is `None`, all values are considered valid.
    /// * Bit set (1) means valid, bit unset (0) means null/missing.
    pub masks: Option<Vec<Option<&'a [u8]>>>,
    /// Number of rows.
    pub rows: usize,
    /// Number of columns.
    pub cols: usize,
}

impl<'a, T> ColumnarMatrix<'a, T> {
    /// Create a new columnar matrix from a vector of column slices.
    ///
    /// * `columns` - Vector of slices, one per column.
    /// * `masks` - Optional vector of validity masks, one per column.
    /// * `rows` - Number of rows (must match length of each column slice).
    pub fn new(
        columns: Vec<&'a [T]>,
        masks: Option<Vec<Option<&'a [u8]>>>,
        rows: usize,
    ) -> Result<Self, ConformalError> {
        let cols = columns.len();
        if let Some(ref m) = masks {
            if m.len() != cols {
                return Err(ConformalError::ShapeMismatch(
                    "validity masks".to_string(),
                    format!("{} masks", cols),
                    m.len().to_string(),
                ));
            }
        }
        if let Some(bad) = columns.iter().find(|c| c.len() != rows) {
            return Err(ConformalError::ShapeMismatch(
                "column length".to_string(),
                rows.to_string(),
                bad.len().to_string(),
            ));
        }
        Ok(ColumnarMatrix {
            columns,
            masks,
            rows,
            cols,
        })
    }

    /// Check if a value at (row, col) is valid (not null).
    pub fn is_valid(&self, row: usize, col: usize) -> bool {
        if let Some(ref masks) = self.masks {
            if let Some(mask) = masks[col] {
                let byte_idx = row / 8;
                let bit_idx = row % 8;
                if byte_idx < mask.len() {
                    return (mask[byte_idx] >> bit_idx) & 1 != 0;
                }
                return false;
            }
        }
        true
    }

    fn has_mask(&self, col: usize) -> bool {
        matches!(self.masks.as_ref().map(|m| m[col]), Some(Some(_)))
    }
}

impl NumericArray for ColumnarMatrix<'_, f64> {
    fn layout(&self) -> Layout {
        Layout::Columnar
    }
    fn ndim(&self) -> usize {
        if self.cols == 1 {
            1
        } else {
            2
        }
    }
    fn rows(&self) -> usize {
        self.rows
    }
    fn cols(&self) -> usize {
        self.cols
    }
    fn get(&self, i: usize, j: usize) -> f64 {
        if self.is_valid(i, j) {
            self.columns[j][i]
        } else {
            f64::NAN
        }
    }
    fn column(&self, col: usize) -> Cow<'_, [f64]> {
        if self.has_mask(col) {
            Cow::Owned((0..self.rows).map(|i| self.get(i, col)).collect())
        } else {
            Cow::Borrowed(self.columns[col])
        }
    }
}

/// A lightweight row major matrix that owns its data.
///
/// Used for values handed back to the caller, such as predictor outputs,
/// candidate bound matrices and normalized weight matrices, where rows are
/// appended one test example at a time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowMajorMatrix<T> {
    /// The raw data in row-major order.
    pub data: Vec<T>,
    /// Number of rows.
    pub rows: usize,
    /// Number of columns.
    pub cols: usize,
    stride1: usize,
    stride2: usize,
}

impl<T> RowMajorMatrix<T> {
    /// Create a new RowMajorMatrix.
    pub fn new(data: Vec<T>, rows: usize, cols: usize) -> Self {
        RowMajorMatrix {
            data,
            rows,
            cols,
            stride1: 1,
            stride2: cols,
        }
    }

    /// Get a single reference to an item in the matrix.
    ///
    /// * `i` - The ith row of the data to get.
    /// * `j` - the jth column of the data to get.
    pub fn get(&self, i: usize, j: usize) -> &T {
        &self.data[self.item_index(i, j)]
    }

    fn item_index(&self, i: usize, j: usize) -> usize {
        let mut idx = self.stride2 * i;
        idx += j * self.stride1;
        idx
    }

    /// Get a row of the matrix as a slice.
    pub fn get_row(&self, row: usize) -> &[T] {
        let start = self.item_index(row, 0);
        &self.data[start..start + self.cols]
    }

    /// Check that the matrix holds `rows * cols` values.
    ///
    /// * `name` - What the matrix is, used in the error message.
    pub fn check_shape(&self, name: &str) -> Result<(), ConformalError> {
        if self.data.len() != self.rows * self.cols {
            return Err(ConformalError::ShapeMismatch(
                name.to_string(),
                format!("{} values for {} rows of {} columns", self.rows * self.cols, self.rows, self.cols),
                self.data.len().to_string(),
            ));
        }
        Ok(())
    }

    /// Add rows to the matrix, this can be multiple
    /// rows, if they are in sequential order in the items.
    pub fn append_row(&mut self, items: Vec<T>) -> Result<(), ConformalError> {
        if self.cols == 0 || items.len() % self.cols != 0 {
            return Err(ConformalError::ShapeMismatch(
                "appended row".to_string(),
                format!("a multiple of {} values", self.cols),
                items.len().to_string(),
            ));
        }
        self.rows += items.len() / self.cols;
        self.data.extend(items);
        Ok(())
    }
}

impl<T> RowMajorMatrix<T>
where
    T: Copy,
{
    /// Build a matrix from equally sized rows.
    pub fn from_rows(rows: &[Vec<T>]) -> Result<Self, ConformalError> {
        let cols = rows.first().map_or(0, |r| r.len());
        let mut data = Vec::with_capacity(rows.len() * cols);
        for (i, r) in rows.iter().enumerate() {
            if r.len() != cols {
                return Err(ConformalError::ShapeMismatch(
                    format!("row {}", i),
                    format!("{} columns", cols),
                    r.len().to_string(),
                ));
            }
            data.extend_from_slice(r);
        }
        Ok(RowMajorMatrix::new(data, rows.len(), cols))
    }

    /// Concatenate matrices column-wise. All blocks must have the same number of rows.
    pub fn hstack(blocks: &[RowMajorMatrix<T>]) -> Result<Self, ConformalError> {
        let first = blocks
            .first()
            .ok_or_else(|| ConformalError::Internal("no blocks to concatenate".to_string()))?;
        let rows = first.rows;
        if let Some(bad) = blocks.iter().find(|b| b.rows != rows) {
            return Err(ConformalError::ShapeMismatch(
                "concatenated block".to_string(),
                format!("{} rows", rows),
                bad.rows.to_string(),
            ));
        }
        let cols: usize = blocks.iter().map(|b| b.cols).sum();
        let mut data = Vec::with_capacity(rows * cols);
        for i in 0..rows {
            for b in blocks {
                data.extend_from_slice(b.get_row(i));
            }
        }
        Ok(RowMajorMatrix::new(data, rows, cols))
    }
}

impl NumericArray for RowMajorMatrix<f64> {
    fn layout(&self) -> Layout {
        Layout::Dense
    }
    fn ndim(&self) -> usize {
        2
    }
    fn rows(&self) -> usize {
        self.rows
    }
    fn cols(&self) -> usize {
        self.cols
    }
    fn get(&self, i: usize, j: usize) -> f64 {
        *RowMajorMatrix::get(self, i, j)
    }
    fn row(&self, row: usize) -> Cow<'_, [f64]> {
        Cow::Borrowed(self.get_row(row))
    }
}
