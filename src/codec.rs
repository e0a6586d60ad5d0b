//! Batch encode/decode entry points.
//!
//! A batch is split along its leading axis and every slice is coded on its own,
//! with its own copy of the configured model. Slices therefore decode
//! independently, and can be coded in parallel.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    error::Result, AdaptiveModel, ArithmeticDecoder, ArithmeticEncoder,
    ArrayRef, CodecError, Model, ProbabilityModel, StaticModel, SymbolMapping,
    Tensor, TensorView, MAX_FREQUENCY,
};

/// Which per-slice codec to run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    #[default]
    Arithmetic,
    /// Raw little-endian float32 bytes, no compression.
    Noop,
}

/// Which probability model drives the arithmetic backend.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Static,
    Adaptive,
    #[default]
    FastAdaptive,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    pub backend: BackendKind,
    pub model: ModelKind,
    pub mapping: SymbolMapping,
    /// Snapshot record every slice's adaptive model starts from. Uniform when
    /// absent.
    pub initial_model: Option<String>,
    /// Weights of the static model, end-of-message symbol last. Uniform when
    /// absent.
    pub static_weights: Option<Vec<u32>>,
    /// Code slices on the rayon pool.
    pub parallel: bool,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            model: ModelKind::default(),
            mapping: SymbolMapping::default(),
            initial_model: None,
            static_weights: None,
            parallel: true,
        }
    }
}

impl CodecConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// The model every slice starts from.
    pub fn build_model(&self) -> Result<Model> {
        self.mapping.validate()?;
        let alphabet = self.mapping.alphabet_size();

        let model = match self.model {
            ModelKind::Static => {
                let weights = match &self.static_weights {
                    Some(weights) => weights.clone(),
                    None => vec![1; alphabet as usize + 1],
                };
                Model::Static(StaticModel::from_weights(&weights)?)
            }
            ModelKind::Adaptive | ModelKind::FastAdaptive => {
                let adaptive = match &self.initial_model {
                    Some(json) => AdaptiveModel::load_model(json)?,
                    None => AdaptiveModel::new(alphabet),
                };

                if self.model == ModelKind::FastAdaptive {
                    Model::FastAdaptive(adaptive.into())
                } else {
                    Model::Adaptive(adaptive)
                }
            }
        };

        Ok(model)
    }

    pub fn build_codec(&self) -> Result<Box<dyn SliceCodec>> {
        Ok(match self.backend {
            BackendKind::Arithmetic => Box::new(ArithmeticSliceCodec::new(
                self.mapping,
                self.build_model()?,
            )?),
            BackendKind::Noop => Box::new(NoopSliceCodec),
        })
    }
}

/// Encodes one `C x H x W` slice to bytes and back.
pub trait SliceCodec: Send + Sync {
    fn encode(&self, slice: &TensorView<'_, 3>) -> Result<Vec<u8>>;
    fn decode(&self, bytes: &[u8], shape: [usize; 3]) -> Result<Tensor<3>>;
}

/// Symbol mapping followed by arithmetic coding.
#[derive(Debug, Clone)]
pub struct ArithmeticSliceCodec {
    mapping: SymbolMapping,
    /// Cloned for every slice, never mutated
    model: Model,
}

impl ArithmeticSliceCodec {
    pub fn new(mapping: SymbolMapping, model: Model) -> Result<Self> {
        mapping.validate()?;

        let expected = mapping.alphabet_size() + 1;
        if model.size() != expected {
            return Err(CodecError::format(format!(
                "model has {} symbols, the mapping needs {expected} including the end-of-message symbol",
                model.size()
            )));
        }

        Ok(Self { mapping, model })
    }

    /// Reject a slice whose symbols would push an adaptive model past
    /// [`MAX_FREQUENCY`] before any of them is coded.
    fn check_headroom(&self, symbols: usize) -> Result<()> {
        match self.model.remaining_observations() {
            Some(remaining) if symbols as u64 > remaining as u64 => {
                Err(CodecError::format(format!(
                    "slice of {symbols} symbols exceeds the model's remaining {remaining} observations (denominator {}, limit {MAX_FREQUENCY})",
                    self.model.denominator()
                )))
            }
            _ => Ok(()),
        }
    }
}

impl SliceCodec for ArithmeticSliceCodec {
    fn encode(&self, slice: &TensorView<'_, 3>) -> Result<Vec<u8>> {
        self.check_headroom(self.mapping.symbol_count(slice.len()))?;
        let (mut bytes, symbols) = self.mapping.to_symbols(slice.data())?;
        let num_symbols = symbols.len();

        let mut encoder = ArithmeticEncoder::new();
        encoder.encode(&mut self.model.clone(), symbols);
        bytes.extend(encoder.finalize());

        debug!(
            shape = ?slice.shape(),
            symbols = num_symbols,
            bytes = bytes.len(),
            "encoded slice"
        );
        Ok(bytes)
    }

    fn decode(&self, bytes: &[u8], shape: [usize; 3]) -> Result<Tensor<3>> {
        let header_len = self.mapping.header_len();
        if bytes.len() < header_len {
            return Err(CodecError::format(format!(
                "buffer of {} bytes is shorter than the {header_len} byte header",
                bytes.len()
            )));
        }

        let (header, stream) = bytes.split_at(header_len);
        let mut data = Tensor::zeros(shape)?.into_vec();
        let expected = self.mapping.symbol_count(data.len());
        self.check_headroom(expected)?;

        let mut decoder = ArithmeticDecoder::new(stream.iter().copied())
            .with_symbol_limit(expected);
        let symbols = decoder.decode(&mut self.model.clone())?;
        self.mapping.from_symbols(header, &symbols, &mut data)?;

        debug!(?shape, symbols = symbols.len(), bytes = bytes.len(), "decoded slice");
        Tensor::new(data, shape)
    }
}

/// Passes float32 data through as little-endian bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSliceCodec;

impl SliceCodec for NoopSliceCodec {
    fn encode(&self, slice: &TensorView<'_, 3>) -> Result<Vec<u8>> {
        Ok(slice.data().iter().flat_map(|x| x.to_le_bytes()).collect())
    }

    fn decode(&self, bytes: &[u8], shape: [usize; 3]) -> Result<Tensor<3>> {
        let expected = Tensor::zeros(shape)?.data().len() * 4;
        if bytes.len() != expected {
            return Err(CodecError::format(format!(
                "raw slice of shape {shape:?} needs {expected} bytes, got {}",
                bytes.len()
            )));
        }

        let data = bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        Tensor::new(data, shape)
    }
}

#[cfg_attr(not(feature = "parallel"), allow(unused_variables))]
fn map_batch<T, R, F>(parallel: bool, items: &[T], f: F) -> Result<Vec<R>>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> Result<R> + Send + Sync,
{
    #[cfg(feature = "parallel")]
    if parallel {
        use rayon::prelude::*;
        return items.par_iter().map(f).collect();
    }

    items.iter().map(f).collect()
}

/// Turns a 4D batch into one buffer per batch element.
pub struct FeatureEncoder {
    codec: Box<dyn SliceCodec>,
    parallel: bool,
}

impl FeatureEncoder {
    pub fn new(config: &CodecConfig) -> Result<Self> {
        info!(backend = ?config.backend, model = ?config.model, mapping = ?config.mapping, "feature encoder ready");
        Ok(Self {
            codec: config.build_codec()?,
            parallel: config.parallel,
        })
    }

    pub fn with_codec(codec: Box<dyn SliceCodec>) -> Self {
        Self {
            codec,
            parallel: false,
        }
    }

    pub fn encode(&self, batch: &TensorView<'_, 4>) -> Result<Vec<Vec<u8>>> {
        let slices: Vec<_> = batch.slices().collect();
        map_batch(self.parallel, &slices, |slice| self.codec.encode(slice))
    }

    /// Validate a host array, then encode it.
    pub fn encode_array(&self, array: ArrayRef<'_>) -> Result<Vec<Vec<u8>>> {
        let batch = TensorView::<4>::try_from(array)?;
        self.encode(&batch)
    }

    /// The codec has no parameters to learn; gradients pass through unchanged.
    pub fn backprop<G>(&self, grad: G) -> G {
        grad
    }
}

/// Rebuilds a 4D batch from per-element buffers.
pub struct FeatureDecoder {
    codec: Box<dyn SliceCodec>,
    parallel: bool,
}

impl FeatureDecoder {
    pub fn new(config: &CodecConfig) -> Result<Self> {
        Ok(Self {
            codec: config.build_codec()?,
            parallel: config.parallel,
        })
    }

    pub fn with_codec(codec: Box<dyn SliceCodec>) -> Self {
        Self {
            codec,
            parallel: false,
        }
    }

    /// Decode every buffer as a slice of `shape` and stack them in order.
    pub fn decode<B>(&self, buffers: &[B], shape: [usize; 3]) -> Result<Tensor<4>>
    where
        B: AsRef<[u8]> + Sync,
    {
        let slices = map_batch(self.parallel, buffers, |bytes| {
            self.codec.decode(bytes.as_ref(), shape)
        })?;
        Tensor::stack(shape, slices)
    }

    pub fn backprop<G>(&self, grad: G) -> G {
        grad
    }
}
