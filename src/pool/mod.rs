//! pool — density storage, likelihood cache, mixtures, and pool files.
//!
//! - [`PdfPool`]: sole owner of densities, indexed by `usize`, with one
//!   cached log-likelihood slot per density.
//! - [`Mixture`]: `(index, weight)` components evaluated against a borrowed
//!   pool.
//! - [`gk`]: the whitespace-token pool file format.

pub mod gk;
pub mod mixture;
pub mod pdf_pool;

pub use self::mixture::{Mixture, MixtureComponent};
pub use self::pdf_pool::PdfPool;
