//! tokens — whitespace-token reader and writers for the gk text layout.
//!
//! Every density, mixture, and subspace serializes as whitespace-separated
//! tokens. Floats are written with Rust's shortest round-trip formatting,
//! so a write/read cycle reproduces every `f64` bit for bit.
//!
//! [`TokenReader`] tracks the current line number so parse failures can be
//! reported as [`DensityError::Format`] with a location.
use crate::densities::errors::{DensityError, DensityResult};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use std::{collections::VecDeque, io::BufRead, io::Write};

/// Upper bound on capacity reserved from a count read off the input.
pub const MAX_PREALLOC: usize = 1024;

/// Pull-based tokenizer over a buffered reader.
#[derive(Debug)]
pub struct TokenReader<R: BufRead> {
    reader: R,
    line: usize,
    pending: VecDeque<String>,
}

impl<R: BufRead> TokenReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, line: 0, pending: VecDeque::new() }
    }

    /// 1-based number of the line the last token came from.
    pub fn line(&self) -> usize {
        self.line
    }

    /// A [`DensityError::Format`] at the current line.
    pub fn format_error(&self, reason: impl Into<String>) -> DensityError {
        DensityError::Format { line: self.line, reason: reason.into() }
    }

    fn fill(&mut self) -> DensityResult<bool> {
        while self.pending.is_empty() {
            let mut buf = String::new();
            if self.reader.read_line(&mut buf)? == 0 {
                return Ok(false);
            }
            self.line += 1;
            self.pending.extend(buf.split_whitespace().map(str::to_string));
        }
        Ok(true)
    }

    /// Next token without consuming it, or `None` at end of input.
    pub fn peek(&mut self) -> DensityResult<Option<&str>> {
        if !self.fill()? {
            return Ok(None);
        }
        Ok(self.pending.front().map(String::as_str))
    }

    /// Next token, or `None` at end of input.
    pub fn next_token(&mut self) -> DensityResult<Option<String>> {
        if !self.fill()? {
            return Ok(None);
        }
        Ok(self.pending.pop_front())
    }

    /// Next token; end of input is a format error naming `what`.
    pub fn expect_token(&mut self, what: &str) -> DensityResult<String> {
        match self.next_token()? {
            Some(tok) => Ok(tok),
            None => Err(self.format_error(format!("unexpected end of input, expected {what}"))),
        }
    }

    /// Consume `keyword` or fail.
    pub fn expect_keyword(&mut self, keyword: &str) -> DensityResult<()> {
        let tok = self.expect_token(keyword)?;
        if tok != keyword {
            return Err(self.format_error(format!("expected '{keyword}', found '{tok}'")));
        }
        Ok(())
    }

    pub fn read_usize(&mut self, what: &str) -> DensityResult<usize> {
        let tok = self.expect_token(what)?;
        tok.parse::<usize>()
            .map_err(|_| self.format_error(format!("invalid {what} '{tok}'")))
    }

    /// Parse a finite `f64`.
    pub fn read_f64(&mut self, what: &str) -> DensityResult<f64> {
        let tok = self.expect_token(what)?;
        match tok.parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(v),
            _ => Err(self.format_error(format!("invalid {what} '{tok}'"))),
        }
    }

    /// Read `len` floats. Values are pushed as they parse, so a bogus
    /// `len` from the input fails on truncation instead of allocating.
    pub fn read_vector(&mut self, len: usize, what: &str) -> DensityResult<Array1<f64>> {
        let mut out = Vec::with_capacity(len.min(MAX_PREALLOC));
        for _ in 0..len {
            out.push(self.read_f64(what)?);
        }
        Ok(Array1::from(out))
    }

    /// Row-major `rows × cols` matrix.
    pub fn read_matrix(&mut self, rows: usize, cols: usize, what: &str) -> DensityResult<Array2<f64>> {
        let len = rows
            .checked_mul(cols)
            .ok_or_else(|| self.format_error(format!("{what} shape {rows}×{cols} overflows")))?;
        let values = self.read_vector(len, what)?;
        Array2::from_shape_vec((rows, cols), values.to_vec())
            .map_err(|e| self.format_error(format!("{what}: {e}")))
    }

    /// Read a dimension token and require it to equal `expected`.
    pub fn expect_dim(&mut self, expected: usize) -> DensityResult<()> {
        let dim = self.read_usize("dimension")?;
        if dim != expected {
            return Err(DensityError::DimensionMismatch { expected, actual: dim });
        }
        Ok(())
    }
}

/// Write ` v_0 v_1 …` (each value preceded by a space).
pub fn write_vector<W: Write>(w: &mut W, v: ArrayView1<f64>) -> DensityResult<()> {
    for x in v.iter() {
        write!(w, " {x}")?;
    }
    Ok(())
}

/// Write a matrix in row-major order, each value preceded by a space.
pub fn write_matrix<W: Write>(w: &mut W, m: ArrayView2<f64>) -> DensityResult<()> {
    for x in m.iter() {
        write!(w, " {x}")?;
    }
    Ok(())
}
