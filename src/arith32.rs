use std::{collections::VecDeque, ops::Range};

use tracing::trace;

use crate::{error::Result, CodecError, ProbabilityModel};

/// Bits of precision in the working interval
const CODE_BITS: u32 = 32;
const HALF: u64 = 1 << (CODE_BITS - 1);
const QUARTER: u64 = HALF / 2;
const THREE_QUARTERS: u64 = HALF + QUARTER;

/// Narrow the closed interval `[low, high]` to the slice owned by `numerator`.
///
/// Probability intervals are half-open while the register interval is closed,
/// hence the `- 1` on the upper bound.
#[inline]
fn narrow(
    low: &mut u64,
    high: &mut u64,
    Range { start, end }: Range<u32>,
    denominator: u64,
) {
    let range = *high - *low + 1;
    *high = *low + range * end as u64 / denominator - 1;
    *low += range * start as u64 / denominator;
}

pub struct ArithmeticEncoder32 {
    /// Finalized bytes
    encoded: VecDeque<u8>,
    /// Bit mask for the next output bit
    bit_index: u8,
    current: u8,
    /// Lower bound of the current interval
    low: u64,
    /// Upper bound of the current interval (inclusive)
    high: u64,
    /// Counter for follow bits
    pending: u64,
}

impl ArithmeticEncoder32 {
    pub fn new() -> Self {
        Self {
            encoded: [].into(),
            current: 0,
            bit_index: 0b10000000,
            low: 0,
            high: (1 << CODE_BITS) - 1,
            pending: 0,
        }
    }

    /// Push a single bit to the output stream
    #[inline]
    fn push_bit(&mut self, is_one: bool) {
        if is_one {
            self.current |= self.bit_index;
        }

        self.bit_index >>= 1;

        if self.bit_index == 0 {
            self.bit_index = 0b10000000;
            self.encoded.push_back(self.current);
            self.current = 0;
        }
    }

    /// Push a bit followed by every pending bit, inverted
    fn push_hot(&mut self, one_hot: bool) {
        self.push_bit(one_hot);
        while self.pending > 0 {
            self.push_bit(!one_hot);
            self.pending -= 1;
        }
    }

    /// Encode every symbol, then the end-of-message symbol.
    pub fn encode<M: ProbabilityModel>(
        &mut self,
        model: &mut M,
        symbols: impl IntoIterator<Item = u32>,
    ) {
        for symbol in symbols {
            self.encode_symbol(model, symbol);
        }

        self.encode_end(model);
    }

    /// Encode one ordinary symbol and let the model observe it.
    pub fn encode_symbol<M: ProbabilityModel>(
        &mut self,
        model: &mut M,
        symbol: u32,
    ) {
        assert_ne!(
            symbol,
            model.finished_symbol(),
            "the end-of-message symbol can only be written by `encode_end`"
        );

        self.encode_interval(model.symbol_numerator(symbol), model.denominator());
        model.consume_symbol(symbol);
    }

    /// Encode the end-of-message symbol.
    ///
    /// The decoder stops on it, so nothing encoded after it will be read.
    pub fn encode_end<M: ProbabilityModel>(&mut self, model: &mut M) {
        let symbol = model.finished_symbol();
        self.encode_interval(model.symbol_numerator(symbol), model.denominator());
    }

    fn encode_interval(&mut self, numerator: Range<u32>, denominator: u32) {
        debug_assert!(numerator.start < numerator.end);
        debug_assert!(numerator.end <= denominator);

        narrow(&mut self.low, &mut self.high, numerator, denominator as u64);
        debug_assert!(self.low <= self.high);

        // Emit bits and rescale
        loop {
            if self.high < HALF {
                self.push_hot(false);
            } else if self.low >= HALF {
                self.push_hot(true);
                self.low -= HALF;
                self.high -= HALF;
            } else if self.low >= QUARTER && self.high < THREE_QUARTERS {
                // E3 scaling
                self.pending += 1;
                self.low -= QUARTER;
                self.high -= QUARTER;
            } else {
                break;
            }

            self.low <<= 1;
            self.high = (self.high << 1) | 1;
        }
    }

    pub fn pop_byte(&mut self) -> Option<u8> {
        self.encoded.pop_front()
    }

    /// Flush enough bits to pin a value inside the final interval.
    pub fn finalize(mut self) -> Vec<u8> {
        self.pending += 1;
        self.push_hot(self.low >= QUARTER);

        if self.bit_index < 0x80 {
            self.encoded.push_back(self.current)
        }

        trace!(bytes = self.encoded.len(), "arithmetic encoder flushed");
        self.encoded.into()
    }
}

impl Default for ArithmeticEncoder32 {
    fn default() -> Self {
        Self::new()
    }
}

pub struct ArithmeticDecoder32<I> {
    to_decode: I,
    /// Bit mask for the next input bit
    bit: u8,
    current: u8,
    /// Lower bound of the current interval
    low: u64,
    /// Upper bound of the current interval (inclusive)
    high: u64,
    /// The next `CODE_BITS` bits of the stream
    value: u64,
    /// Zero bits substituted after the input ran out
    bits_past_end: u32,
    /// Ordinary symbols decoded so far
    decoded: usize,
    symbol_limit: Option<usize>,
}

impl<I> ArithmeticDecoder32<I>
where
    I: Iterator<Item = u8>,
{
    pub fn new(bytes: impl IntoIterator<Item = u8, IntoIter = I>) -> Self {
        let mut decoder = Self {
            to_decode: bytes.into_iter(),
            bit: 0,
            current: 0,
            low: 0,
            high: (1 << CODE_BITS) - 1,
            value: 0,
            bits_past_end: 0,
            decoded: 0,
            symbol_limit: None,
        };

        // Fill the value register with the first bits of the stream
        for _ in 0..CODE_BITS {
            decoder.value = (decoder.value << 1) | decoder.read_bit();
        }

        decoder
    }

    /// Fail with [`CodecError::TruncatedStream`] instead of decoding more than
    /// `limit` ordinary symbols.
    pub fn with_symbol_limit(mut self, limit: usize) -> Self {
        self.symbol_limit = Some(limit);
        self
    }

    #[inline]
    fn read_bit(&mut self) -> u64 {
        if self.bit == 0 {
            match self.to_decode.next() {
                Some(byte) => self.current = byte,
                None => {
                    self.current = 0;
                    self.bits_past_end += 8;
                }
            }
            self.bit = 0x80;
        }

        let is_one = self.bit & self.current != 0;
        self.bit >>= 1;
        is_one as u64
    }

    /// Number of zero bits read past the end of the input, rounded up to whole
    /// bytes.
    pub fn bits_past_end(&self) -> u32 {
        self.bits_past_end
    }

    /// Decode symbols until the end-of-message symbol, which is not returned.
    pub fn decode<M: ProbabilityModel>(
        &mut self,
        model: &mut M,
    ) -> Result<Vec<u32>> {
        let mut symbols = Vec::with_capacity(self.symbol_limit.unwrap_or(0));
        while let Some(symbol) = self.decode_symbol(model)? {
            symbols.push(symbol);
        }

        Ok(symbols)
    }

    /// Decode one symbol, returning `None` on the end-of-message symbol.
    pub fn decode_symbol<M: ProbabilityModel>(
        &mut self,
        model: &mut M,
    ) -> Result<Option<u32>> {
        debug_assert!(self.low <= self.value);
        debug_assert!(self.value <= self.high);

        let symbol = model.find_symbol(self.high, self.low, self.value);
        assert!(
            symbol < model.size(),
            "model returned symbol {symbol} for an alphabet of {}",
            model.size()
        );

        if symbol == model.finished_symbol() {
            return Ok(None);
        }

        if self.symbol_limit == Some(self.decoded) {
            return Err(self.truncated());
        }

        narrow(
            &mut self.low,
            &mut self.high,
            model.symbol_numerator(symbol),
            model.denominator() as u64,
        );
        debug_assert!(self.low <= self.value);
        debug_assert!(self.value <= self.high);

        self.rescale()?;
        model.consume_symbol(symbol);
        self.decoded += 1;

        Ok(Some(symbol))
    }

    fn rescale(&mut self) -> Result<()> {
        loop {
            if self.high < HALF {
                // Nothing to subtract
            } else if self.low >= HALF {
                self.low -= HALF;
                self.high -= HALF;
                self.value -= HALF;
            } else if self.low >= QUARTER && self.high < THREE_QUARTERS {
                // E3 scaling
                self.low -= QUARTER;
                self.high -= QUARTER;
                self.value -= QUARTER;
            } else {
                return Ok(());
            }

            self.low <<= 1;
            self.high = (self.high << 1) | 1;
            self.value = (self.value << 1) | self.read_bit();

            // A terminated stream never needs more than one register of padding
            if self.bits_past_end > CODE_BITS {
                return Err(self.truncated());
            }
        }
    }

    fn truncated(&self) -> CodecError {
        CodecError::TruncatedStream {
            bits_past_end: self.bits_past_end,
            symbols: self.decoded,
        }
    }
}
