// Event reconciliation: raw documents in, canonical events out

pub mod gallery;
pub mod normalize;
pub mod temporal;

pub use gallery::GalleryResolver;
pub use normalize::{DefaultNormalizer, Normalizer};
pub use temporal::{classify, Clock, FixedClock, SystemClock};
