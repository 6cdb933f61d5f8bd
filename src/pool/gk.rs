//! gk — text serialization of a density pool.
//!
//! Purpose
//! -------
//! Persist a pool of Gaussians (and the subspace bases the constrained
//! variants share) as whitespace-separated tokens.
//!
//! Layout
//! ------
//! ```text
//! PDFPool <count> <dim>
//! precision_subspace <id> <dim> <nbasis> <nbasis dim×dim matrices>      (0 or more)
//! exponential_subspace <id> <dim> <nbasis> <nbasis (vector, matrix)>    (0 or more)
//! <count records, one per line>
//! ```
//! Records are `diag <payload>`, `full <payload>`, `pcgmm <id> <payload>`
//! and `scgmm <id> <payload>`, where the payload is the variant's
//! [`Pdf::write`] output and `<id>` names a subspace section of the
//! matching kind.
//!
//! Key behaviors
//! -------------
//! - Subspaces shared through one `Arc` are written once; ids are assigned
//!   per kind in order of first use.
//! - Reading validates everything (unknown tags, truncation, bad numbers,
//!   duplicate or dangling ids, foreign dimensions, trailing tokens) before
//!   returning, so callers can commit the result atomically.
use crate::densities::{
    core::{
        subspace::{ExponentialSubspace, PrecisionSubspace},
        tokens::{write_matrix, write_vector, TokenReader, MAX_PREALLOC},
    },
    errors::{DensityError, DensityResult},
    gaussians::{
        Density, DiagonalGaussian, FullCovarianceGaussian, Pdf, PrecisionConstrainedGaussian,
        SubspaceConstrainedGaussian,
    },
};
use std::{
    collections::HashMap,
    io::{BufRead, Write},
    sync::Arc,
};

pub const POOL_KEYWORD: &str = "PDFPool";
pub const PRECISION_SUBSPACE_KEYWORD: &str = "precision_subspace";
pub const EXPONENTIAL_SUBSPACE_KEYWORD: &str = "exponential_subspace";

/// Id table for `Arc`-shared subspaces, keyed by pointer identity.
struct SubspaceIds<T> {
    entries: Vec<Arc<T>>,
}

impl<T> SubspaceIds<T> {
    fn new() -> Self {
        Self { entries: Vec::new() }
    }

    fn id_of(&mut self, s: &Arc<T>) -> usize {
        match self.entries.iter().position(|e| Arc::ptr_eq(e, s)) {
            Some(id) => id,
            None => {
                self.entries.push(Arc::clone(s));
                self.entries.len() - 1
            }
        }
    }
}

/// Write `densities` as a gk pool of dimension `dim`.
///
/// # Errors
/// [`DensityError::Io`] if the writer fails.
pub fn write_pool<W: Write>(w: &mut W, dim: usize, densities: &[Density]) -> DensityResult<()> {
    let mut precision = SubspaceIds::<PrecisionSubspace>::new();
    let mut exponential = SubspaceIds::<ExponentialSubspace>::new();
    let mut record_ids = Vec::with_capacity(densities.len());
    for d in densities {
        record_ids.push(match d {
            Density::PrecisionConstrained(g) => Some(precision.id_of(g.subspace())),
            Density::SubspaceConstrained(g) => Some(exponential.id_of(g.subspace())),
            Density::Diagonal(_) | Density::Full(_) => None,
        });
    }

    writeln!(w, "{POOL_KEYWORD} {} {dim}", densities.len())?;
    for (id, s) in precision.entries.iter().enumerate() {
        writeln!(w, "{PRECISION_SUBSPACE_KEYWORD} {id} {} {}", s.dim(), s.len())?;
        for b in s.basis() {
            write_matrix(w, b.view())?;
            writeln!(w)?;
        }
    }
    for (id, s) in exponential.entries.iter().enumerate() {
        writeln!(w, "{EXPONENTIAL_SUBSPACE_KEYWORD} {id} {} {}", s.dim(), s.len())?;
        for (v, m) in s.linear().iter().zip(s.quadratic()) {
            write_vector(w, v.view())?;
            write_matrix(w, m.view())?;
            writeln!(w)?;
        }
    }
    for (d, id) in densities.iter().zip(record_ids) {
        write!(w, "{}", d.tag())?;
        if let Some(id) = id {
            write!(w, " {id}")?;
        }
        write!(w, " ")?;
        d.write(w)?;
        writeln!(w)?;
    }
    Ok(())
}

/// Parsed pool contents: dimensionality and densities in file order.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolContents {
    pub dim: usize,
    pub densities: Vec<Density>,
}

/// Read a complete gk pool from `reader`.
///
/// # Errors
/// - [`DensityError::Io`] for reader failures.
/// - [`DensityError::Format`] for malformed content.
/// - [`DensityError::DimensionMismatch`] for a density or subspace whose
///   dimension differs from the header.
/// - [`DensityError::InvalidSubspace`] for an invalid basis.
pub fn read_pool<R: BufRead>(reader: R) -> DensityResult<PoolContents> {
    let mut tokens = TokenReader::new(reader);
    tokens.expect_keyword(POOL_KEYWORD)?;
    let count = tokens.read_usize("density count")?;
    let dim = tokens.read_usize("dimension")?;

    let mut precision: HashMap<usize, Arc<PrecisionSubspace>> = HashMap::new();
    let mut exponential: HashMap<usize, Arc<ExponentialSubspace>> = HashMap::new();
    loop {
        let next = tokens.peek()?.map(str::to_owned);
        match next.as_deref() {
            Some(PRECISION_SUBSPACE_KEYWORD) => {
                tokens.expect_token("section")?;
                let id = tokens.read_usize("subspace id")?;
                let sub = read_precision_subspace(&mut tokens, dim)?;
                if precision.insert(id, Arc::new(sub)).is_some() {
                    return Err(tokens.format_error(format!("duplicate precision subspace id {id}")));
                }
            }
            Some(EXPONENTIAL_SUBSPACE_KEYWORD) => {
                tokens.expect_token("section")?;
                let id = tokens.read_usize("subspace id")?;
                let sub = read_exponential_subspace(&mut tokens, dim)?;
                if exponential.insert(id, Arc::new(sub)).is_some() {
                    return Err(
                        tokens.format_error(format!("duplicate exponential subspace id {id}"))
                    );
                }
            }
            _ => break,
        }
    }

    let mut densities = Vec::with_capacity(count.min(MAX_PREALLOC));
    for _ in 0..count {
        let tag = tokens.expect_token("density tag")?;
        let density: Density = match tag.as_str() {
            "diag" => DiagonalGaussian::from_tokens(&mut tokens)?.into(),
            "full" => FullCovarianceGaussian::from_tokens(&mut tokens)?.into(),
            "pcgmm" => {
                let id = tokens.read_usize("subspace id")?;
                let sub = precision.get(&id).cloned().ok_or_else(|| {
                    tokens.format_error(format!("unknown precision subspace id {id}"))
                })?;
                PrecisionConstrainedGaussian::from_tokens(sub, &mut tokens)?.into()
            }
            "scgmm" => {
                let id = tokens.read_usize("subspace id")?;
                let sub = exponential.get(&id).cloned().ok_or_else(|| {
                    tokens.format_error(format!("unknown exponential subspace id {id}"))
                })?;
                SubspaceConstrainedGaussian::from_tokens(sub, &mut tokens)?.into()
            }
            other => return Err(tokens.format_error(format!("unknown density tag '{other}'"))),
        };
        if density.dim() != dim {
            return Err(DensityError::DimensionMismatch { expected: dim, actual: density.dim() });
        }
        densities.push(density);
    }

    if let Some(tok) = tokens.next_token()? {
        return Err(tokens.format_error(format!("trailing content '{tok}'")));
    }
    Ok(PoolContents { dim, densities })
}

fn read_precision_subspace<R: BufRead>(
    tokens: &mut TokenReader<R>, pool_dim: usize,
) -> DensityResult<PrecisionSubspace> {
    tokens.expect_dim(pool_dim)?;
    let n = tokens.read_usize("basis size")?;
    let basis = (0..n)
        .map(|_| tokens.read_matrix(pool_dim, pool_dim, "basis entry"))
        .collect::<DensityResult<Vec<_>>>()?;
    PrecisionSubspace::new(pool_dim, basis)
}

fn read_exponential_subspace<R: BufRead>(
    tokens: &mut TokenReader<R>, pool_dim: usize,
) -> DensityResult<ExponentialSubspace> {
    tokens.expect_dim(pool_dim)?;
    let n = tokens.read_usize("basis size")?;
    let mut basis = Vec::with_capacity(n.min(MAX_PREALLOC));
    for _ in 0..n {
        let v = tokens.read_vector(pool_dim, "basis vector entry")?;
        let m = tokens.read_matrix(pool_dim, pool_dim, "basis matrix entry")?;
        basis.push((v, m));
    }
    ExponentialSubspace::new(pool_dim, basis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::densities::gaussians::Gaussian;
    use ndarray::array;
    use std::io::Cursor;

    fn read_str(s: &str) -> DensityResult<PoolContents> {
        read_pool(Cursor::new(s.as_bytes()))
    }

    #[test]
    // Purpose
    // -------
    // Two constrained Gaussians sharing one `Arc` subspace write a single
    // subspace section and read back sharing one `Arc`.
    //
    // Given
    // -----
    // - Two PCGMMs over the same diagonal basis with different means.
    //
    // Expect
    // ------
    // - Exactly one `precision_subspace` line; read densities equal the
    //   originals and their subspaces are pointer-equal.
    fn shared_subspace_is_written_once() {
        // Arrange
        let sub = Arc::new(PrecisionSubspace::diagonal(2).expect("valid basis"));
        let a = PrecisionConstrainedGaussian::new(Arc::clone(&sub)).expect("identity fits");
        let mut b = a.clone();
        b.set_mean(array![1.0, -2.0].view()).expect("valid mean");
        let densities: Vec<Density> = vec![a.into(), b.into()];
        let mut buf = Vec::new();

        // Act
        write_pool(&mut buf, 2, &densities).expect("write to Vec");
        let text = String::from_utf8(buf).expect("utf8");
        let back = read_str(&text).expect("parse");

        // Assert
        assert_eq!(text.matches(PRECISION_SUBSPACE_KEYWORD).count(), 1);
        assert_eq!(back.densities, densities);
        match (&back.densities[0], &back.densities[1]) {
            (Density::PrecisionConstrained(x), Density::PrecisionConstrained(y)) => {
                assert!(Arc::ptr_eq(x.subspace(), y.subspace()));
            }
            _ => panic!("expected two precision-constrained densities"),
        }
    }

    #[test]
    // Purpose
    // -------
    // Malformed files are rejected with the right error kind.
    //
    // Given
    // -----
    // - An unknown tag, a truncated record, a dangling subspace id, a
    //   density of the wrong dimension, and trailing tokens.
    //
    // Expect
    // ------
    // - `Format` for the first, second, third and fifth; `DimensionMismatch`
    //   for the fourth.
    fn malformed_files_are_rejected() {
        // Arrange
        let unknown = "PDFPool 1 1\nblob 1 0 1\n";
        let truncated = "PDFPool 1 2\ndiag 2 0 0 1\n";
        let dangling = "PDFPool 1 1\npcgmm 3 1 0 1 1\n";
        let wrong_dim = "PDFPool 1 2\ndiag 1 0 1\n";
        let trailing = "PDFPool 1 1\ndiag 1 0 1\nextra\n";

        // Act / Assert
        assert!(matches!(read_str(unknown), Err(DensityError::Format { line: 2, .. })));
        assert!(matches!(read_str(truncated), Err(DensityError::Format { .. })));
        assert!(matches!(read_str(dangling), Err(DensityError::Format { .. })));
        assert!(matches!(read_str(wrong_dim), Err(DensityError::DimensionMismatch { .. })));
        assert!(matches!(read_str(trailing), Err(DensityError::Format { .. })));
    }

    #[test]
    // Purpose
    // -------
    // Duplicate subspace ids are rejected.
    //
    // Given
    // -----
    // - Two `precision_subspace 0` sections.
    //
    // Expect
    // ------
    // - `Format` error.
    fn duplicate_subspace_ids_are_rejected() {
        // Arrange
        let text = "PDFPool 0 1\nprecision_subspace 0 1 1 1\nprecision_subspace 0 1 1 2\n";

        // Act
        let res = read_str(text);

        // Assert
        assert!(matches!(res, Err(DensityError::Format { .. })));
    }

    #[test]
    // Purpose
    // -------
    // Counts and dimensions in a header or record are untrusted: a file
    // that declares enormous sizes but carries no data fails with a
    // `Format` error instead of allocating up front.
    //
    // Given
    // -----
    // - Headers declaring 10^15 and `usize::MAX` densities with no records.
    // - A `full` record declaring dimension 10^9 in a pool of that size.
    // - A precision subspace declaring 10^15 basis elements.
    //
    // Expect
    // ------
    // - `Format` for every input.
    fn oversized_counts_fail_without_allocating() {
        // Arrange
        let huge_count = "PDFPool 1000000000000000 1\n".to_string();
        let max_count = format!("PDFPool {} 1\n", usize::MAX);
        let huge_dim = "PDFPool 1 1000000000\nfull 1000000000 0 1\n".to_string();
        let huge_basis = "PDFPool 0 2\nprecision_subspace 0 2 1000000000000000 1 0\n".to_string();

        // Act / Assert
        for text in [huge_count, max_count, huge_dim, huge_basis] {
            assert!(matches!(read_str(&text), Err(DensityError::Format { .. })), "{text}");
        }
    }
}
