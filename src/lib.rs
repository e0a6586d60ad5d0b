//! Arithmetic-coding codec for neural network feature maps.
//!
//! A batch of `C x H x W` float32 activations is split into per-sample slices.
//! Each slice is mapped to a stream of integer symbols and squeezed through an
//! arithmetic coder driven by a [`ProbabilityModel`]. Encoder and decoder never
//! exchange frequency tables: both sides start from the same model state and
//! update it identically, symbol by symbol. The stream is closed with a
//! reserved end-of-message symbol, so no length is transmitted.
//!
//! ```
//! use nnfc::{AdaptiveModel, ArithmeticDecoder, ArithmeticEncoder};
//!
//! let symbols = [3, 1, 4, 1, 5, 9, 2, 6];
//!
//! let mut encoder = ArithmeticEncoder::new();
//! encoder.encode(&mut AdaptiveModel::new(10), symbols);
//! let bytes = encoder.finalize();
//!
//! let mut decoder = ArithmeticDecoder::new(bytes);
//! let decoded = decoder.decode(&mut AdaptiveModel::new(10)).unwrap();
//! assert_eq!(decoded, symbols);
//! ```

use std::ops::Range;

/// Largest denominator a model may reach.
///
/// The coder keeps 32 bits of working precision and renormalizes so that its
/// range never drops to a quarter of that or below; a denominator above
/// `2^30` could therefore scale some symbol to an empty interval.
pub const MAX_FREQUENCY: u32 = 1 << 30;

/// A probability model over a finite alphabet whose last symbol marks the end
/// of the message.
///
/// Symbol `s` owns the half-open interval `symbol_numerator(s)` of
/// `[0, denominator())`. Intervals are listed in ascending symbol order and tile
/// that range without gaps.
pub trait ProbabilityModel {
    fn symbol_numerator(&self, symbol: u32) -> Range<u32>;
    fn denominator(&self) -> u32;

    /// Number of symbols, the end-of-message symbol included.
    fn size(&self) -> u32;

    fn finished_symbol(&self) -> u32 {
        self.size() - 1
    }

    /// Record one observation of `symbol`.
    ///
    /// Encoder and decoder must call this with the same symbols in the same
    /// order, or the decoder silently produces garbage.
    fn consume_symbol(&mut self, symbol: u32);

    /// Find the symbol whose interval, scaled into the coder's closed working
    /// range `[low, high]`, contains `value`.
    ///
    /// Falls back to the end-of-message symbol when nothing matches.
    fn find_symbol(&self, high: u64, low: u64, value: u64) -> u32 {
        let range = high - low + 1;
        let denominator = self.denominator() as u64;

        (0..self.size())
            .find(|&symbol| {
                let Range { start, end } = self.symbol_numerator(symbol);
                let sym_low = low + range * start as u64 / denominator;
                // Closed upper bound is one below the next symbol's start
                let sym_next = low + range * end as u64 / denominator;
                sym_low <= value && value < sym_next
            })
            .unwrap_or_else(|| self.finished_symbol())
    }
}

mod arith32;
pub mod codec;
pub mod error;
pub mod mapper;
pub mod model;
pub mod snapshot;
pub mod tensor;

pub type ArithmeticEncoder = arith32::ArithmeticEncoder32;
pub type ArithmeticDecoder<I> = arith32::ArithmeticDecoder32<I>;

pub use codec::{
    ArithmeticSliceCodec, BackendKind, CodecConfig, FeatureDecoder,
    FeatureEncoder, ModelKind, NoopSliceCodec, SliceCodec,
};
pub use error::{CodecError, Result};
pub use mapper::SymbolMapping;
pub use model::{AdaptiveModel, FastAdaptiveModel, Model, StaticModel};
pub use snapshot::ModelSnapshot;
pub use tensor::{ArrayData, ArrayRef, DType, Tensor, TensorView};
