//! Mapping between float32 slices and symbol streams.

use serde::{Deserialize, Serialize};

use crate::{error::Result, CodecError};

/// How a slice's elements become coder symbols.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum SymbolMapping {
    /// Every element's four little-endian bytes, one byte plane at a time.
    /// Reconstruction is bit-exact.
    #[default]
    Lossless,
    /// Uniform quantization between the slice's minimum and maximum into
    /// `levels` bins. The range travels as an eight byte header.
    Quantized { levels: u32 },
}

impl SymbolMapping {
    pub const MAX_LEVELS: u32 = 1 << 16;

    pub fn validate(&self) -> Result<()> {
        match *self {
            SymbolMapping::Lossless => Ok(()),
            SymbolMapping::Quantized { levels } if (2..=Self::MAX_LEVELS).contains(&levels) => Ok(()),
            SymbolMapping::Quantized { levels } => Err(CodecError::format(format!(
                "quantization needs between 2 and {} levels, got {levels}",
                Self::MAX_LEVELS
            ))),
        }
    }

    /// Ordinary symbols of the alphabet, end-of-message symbol excluded.
    pub fn alphabet_size(&self) -> u32 {
        match *self {
            SymbolMapping::Lossless => 256,
            SymbolMapping::Quantized { levels } => levels,
        }
    }

    /// Bytes written ahead of the coded stream.
    pub fn header_len(&self) -> usize {
        match self {
            SymbolMapping::Lossless => 0,
            SymbolMapping::Quantized { .. } => 8,
        }
    }

    /// Symbols produced for a slice of `elements` floats.
    pub fn symbol_count(&self, elements: usize) -> usize {
        match self {
            SymbolMapping::Lossless => elements * 4,
            SymbolMapping::Quantized { .. } => elements,
        }
    }

    /// Returns the header and the symbols, in coding order.
    pub fn to_symbols(&self, data: &[f32]) -> Result<(Vec<u8>, Vec<u32>)> {
        match *self {
            SymbolMapping::Lossless => {
                let symbols = (0..4)
                    .flat_map(move |plane| {
                        data.iter()
                            .map(move |x| (x.to_bits() >> (8 * plane)) & 0xff)
                    })
                    .collect();
                Ok((Vec::new(), symbols))
            }
            SymbolMapping::Quantized { levels } => {
                if let Some(x) = data.iter().find(|x| !x.is_finite()) {
                    return Err(CodecError::format(format!(
                        "cannot quantize non-finite value {x}"
                    )));
                }

                let (min, max) = data
                    .iter()
                    .fold(None, |range: Option<(f32, f32)>, &x| match range {
                        None => Some((x, x)),
                        Some((min, max)) => Some((min.min(x), max.max(x))),
                    })
                    .unwrap_or((0.0, 0.0));

                let top = (levels - 1) as f64;
                let span = max as f64 - min as f64;
                let symbols = data
                    .iter()
                    .map(|&x| {
                        if span == 0.0 {
                            return 0;
                        }
                        let q = ((x as f64 - min as f64) / span * top).round();
                        q.clamp(0.0, top) as u32
                    })
                    .collect();

                let mut header = Vec::with_capacity(8);
                header.extend_from_slice(&min.to_le_bytes());
                header.extend_from_slice(&max.to_le_bytes());
                Ok((header, symbols))
            }
        }
    }

    /// Fill `out` from a header and the decoded symbols.
    pub fn from_symbols(
        &self,
        header: &[u8],
        symbols: &[u32],
        out: &mut [f32],
    ) -> Result<()> {
        let expected = self.symbol_count(out.len());
        if symbols.len() != expected {
            return Err(CodecError::format(format!(
                "stream holds {} symbols, expected {expected}",
                symbols.len()
            )));
        }
        if header.len() != self.header_len() {
            return Err(CodecError::format(format!(
                "expected a {} byte header, got {}",
                self.header_len(),
                header.len()
            )));
        }

        match *self {
            SymbolMapping::Lossless => {
                let mut bits = vec![0u32; out.len()];
                for (plane, chunk) in symbols.chunks(out.len().max(1)).enumerate() {
                    for (word, &byte) in bits.iter_mut().zip(chunk) {
                        *word |= (byte & 0xff) << (8 * plane);
                    }
                }

                for (x, bits) in out.iter_mut().zip(bits) {
                    *x = f32::from_bits(bits);
                }
            }
            SymbolMapping::Quantized { levels } => {
                let min = f32::from_le_bytes([header[0], header[1], header[2], header[3]]);
                let max = f32::from_le_bytes([header[4], header[5], header[6], header[7]]);
                let step = (max as f64 - min as f64) / (levels - 1) as f64;

                for (x, &q) in out.iter_mut().zip(symbols) {
                    *x = (min as f64 + q as f64 * step) as f32;
                }
            }
        }

        Ok(())
    }
}
