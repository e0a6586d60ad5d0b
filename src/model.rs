//! Probability models driving the arithmetic coder.

use std::ops::Range;

use tracing::warn;

use crate::{error::Result, CodecError, ProbabilityModel, MAX_FREQUENCY};

/// Cumulative bounds: symbol `i` owns `bounds[i]..bounds[i + 1]`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Cumulative {
    bounds: Box<[u32]>,
}

impl Cumulative {
    fn uniform(size: u32) -> Self {
        Self {
            bounds: (0..=size).collect(),
        }
    }

    fn from_weights(weights: &[u32]) -> Result<Self> {
        if weights.is_empty() {
            return Err(CodecError::format("a model needs at least one symbol"));
        }

        let mut bounds = Vec::with_capacity(weights.len() + 1);
        let mut total = 0u32;
        bounds.push(total);

        for (symbol, &weight) in weights.iter().enumerate() {
            if weight == 0 {
                return Err(CodecError::format(format!(
                    "symbol {symbol} has zero weight"
                )));
            }

            total = total
                .checked_add(weight)
                .filter(|&total| total <= MAX_FREQUENCY)
                .ok_or_else(|| {
                    CodecError::format(format!(
                        "total weight exceeds the coder limit of {MAX_FREQUENCY}"
                    ))
                })?;
            bounds.push(total);
        }

        Ok(Self {
            bounds: bounds.into(),
        })
    }

    #[inline]
    fn size(&self) -> u32 {
        (self.bounds.len() - 1) as u32
    }

    #[inline]
    fn denominator(&self) -> u32 {
        self.bounds[self.bounds.len() - 1]
    }

    #[inline]
    fn numerator(&self, symbol: u32) -> Range<u32> {
        assert!(
            symbol < self.size(),
            "symbol {symbol} is out of range for an alphabet of {}",
            self.size()
        );

        let symbol = symbol as usize;
        self.bounds[symbol]..self.bounds[symbol + 1]
    }
}

/// A model with a fixed interval table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticModel {
    table: Cumulative,
}

impl StaticModel {
    /// The default three-slot table: a frequent symbol, a rare one, and the
    /// end-of-message symbol.
    pub const DEFAULT_WEIGHTS: [u32; 3] = [11000, 999, 1];

    pub fn new() -> Self {
        Self {
            table: Cumulative {
                bounds: [0, 11000, 11999, 12000].into(),
            },
        }
    }

    /// Build a table from per-symbol weights; the last weight belongs to the
    /// end-of-message symbol.
    pub fn from_weights(weights: &[u32]) -> Result<Self> {
        Ok(Self {
            table: Cumulative::from_weights(weights)?,
        })
    }
}

impl Default for StaticModel {
    fn default() -> Self {
        Self::new()
    }
}

impl ProbabilityModel for StaticModel {
    fn symbol_numerator(&self, symbol: u32) -> Range<u32> {
        self.table.numerator(symbol)
    }

    fn denominator(&self) -> u32 {
        self.table.denominator()
    }

    fn size(&self) -> u32 {
        self.table.size()
    }

    #[inline]
    fn consume_symbol(&mut self, _symbol: u32) {}
}

/// A frequency-count model.
///
/// Starts uniform over `num_symbols + 1` slots (the extra slot is the
/// end-of-message symbol). Each consumed symbol widens its own interval by one
/// and shifts every later interval up by one. Counts are never rescaled, so the
/// denominator grows by exactly one per symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdaptiveModel {
    table: Cumulative,
    denominator: u32,
}

impl AdaptiveModel {
    pub fn new(num_symbols: u32) -> Self {
        assert!(
            num_symbols < MAX_FREQUENCY,
            "alphabet of {num_symbols} symbols exceeds the coder limit"
        );

        let table = Cumulative::uniform(num_symbols + 1);
        Self {
            denominator: table.denominator(),
            table,
        }
    }

    /// Number of ordinary symbols, the end-of-message symbol excluded.
    pub fn num_symbols(&self) -> u32 {
        self.table.size() - 1
    }

    /// Cumulative bounds of every symbol, end-of-message symbol last.
    pub fn intervals(&self) -> impl Iterator<Item = Range<u32>> + '_ {
        self.table.bounds.windows(2).map(|w| w[0]..w[1])
    }

    /// Rebuild a model from bounds already validated to tile
    /// `[0, denominator)`.
    pub(crate) fn from_bounds(bounds: Box<[u32]>) -> Self {
        let table = Cumulative { bounds };
        Self {
            denominator: table.denominator(),
            table,
        }
    }
}

impl ProbabilityModel for AdaptiveModel {
    fn symbol_numerator(&self, symbol: u32) -> Range<u32> {
        self.table.numerator(symbol)
    }

    fn denominator(&self) -> u32 {
        self.denominator
    }

    fn size(&self) -> u32 {
        self.table.size()
    }

    fn consume_symbol(&mut self, symbol: u32) {
        assert!(
            symbol < self.size(),
            "symbol {symbol} is out of range for an alphabet of {}",
            self.size()
        );
        assert!(
            self.denominator < MAX_FREQUENCY,
            "adaptive model reached the coder limit of {MAX_FREQUENCY} observations"
        );

        self.denominator += 1;

        // Widen `symbol` and shift everything after it
        for bound in &mut self.table.bounds[symbol as usize + 1..] {
            *bound += 1;
        }

        assert_eq!(self.table.denominator(), self.denominator);
    }
}

/// An [`AdaptiveModel`] with a logarithmic decode-side lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastAdaptiveModel {
    inner: AdaptiveModel,
}

impl FastAdaptiveModel {
    pub fn new(num_symbols: u32) -> Self {
        Self {
            inner: AdaptiveModel::new(num_symbols),
        }
    }

    pub fn num_symbols(&self) -> u32 {
        self.inner.num_symbols()
    }

    pub fn as_adaptive(&self) -> &AdaptiveModel {
        &self.inner
    }
}

impl From<AdaptiveModel> for FastAdaptiveModel {
    fn from(inner: AdaptiveModel) -> Self {
        Self { inner }
    }
}

impl ProbabilityModel for FastAdaptiveModel {
    fn symbol_numerator(&self, symbol: u32) -> Range<u32> {
        self.inner.symbol_numerator(symbol)
    }

    fn denominator(&self) -> u32 {
        self.inner.denominator()
    }

    fn size(&self) -> u32 {
        self.inner.size()
    }

    fn consume_symbol(&mut self, symbol: u32) {
        self.inner.consume_symbol(symbol)
    }

    /// Binary search over the scaled bounds.
    ///
    /// Scaled intervals are closed, `[sym_low, sym_high]`, and
    /// `sym_high(s) + 1 == sym_low(s + 1)`, so at most one symbol matches.
    fn find_symbol(&self, high: u64, low: u64, value: u64) -> u32 {
        let range = high - low + 1;
        let denominator = self.denominator() as u64;
        let scale = |numerator: u32| low + range * numerator as u64 / denominator;

        let bounds = &self.inner.table.bounds;
        // First symbol whose scaled upper bound reaches `value`
        let symbol = bounds[1..].partition_point(|&end| scale(end) <= value);

        if symbol < self.size() as usize && scale(bounds[symbol]) <= value {
            return symbol as u32;
        }

        warn!(high, low, value, "no scaled interval matched, assuming end of message");
        self.finished_symbol()
    }
}

/// Run-time choice between the model variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Model {
    Static(StaticModel),
    Adaptive(AdaptiveModel),
    FastAdaptive(FastAdaptiveModel),
}

impl Model {
    fn as_dyn(&self) -> &dyn ProbabilityModel {
        match self {
            Model::Static(model) => model,
            Model::Adaptive(model) => model,
            Model::FastAdaptive(model) => model,
        }
    }

    /// Observations left before the denominator reaches [`MAX_FREQUENCY`].
    /// `None` for the static model, which never grows.
    pub fn remaining_observations(&self) -> Option<u32> {
        match self {
            Model::Static(_) => None,
            Model::Adaptive(model) => Some(MAX_FREQUENCY - model.denominator()),
            Model::FastAdaptive(model) => Some(MAX_FREQUENCY - model.denominator()),
        }
    }

    fn as_dyn_mut(&mut self) -> &mut dyn ProbabilityModel {
        match self {
            Model::Static(model) => model,
            Model::Adaptive(model) => model,
            Model::FastAdaptive(model) => model,
        }
    }
}

impl ProbabilityModel for Model {
    fn symbol_numerator(&self, symbol: u32) -> Range<u32> {
        self.as_dyn().symbol_numerator(symbol)
    }

    fn denominator(&self) -> u32 {
        self.as_dyn().denominator()
    }

    fn size(&self) -> u32 {
        self.as_dyn().size()
    }

    fn finished_symbol(&self) -> u32 {
        self.as_dyn().finished_symbol()
    }

    fn consume_symbol(&mut self, symbol: u32) {
        self.as_dyn_mut().consume_symbol(symbol)
    }

    fn find_symbol(&self, high: u64, low: u64, value: u64) -> u32 {
        self.as_dyn().find_symbol(high, low, value)
    }
}
