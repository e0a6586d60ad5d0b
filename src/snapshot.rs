//! Textual snapshots of adaptive model state.
//!
//! A snapshot lets an encoder and a decoder that start at different times agree
//! on the same initial frequencies. The record is a flat JSON object:
//!
//! ```text
//! {"denominator":7,"num_symbols":2,
//!  "sym_0_lower":0,"sym_0_upper":4,
//!  "sym_1_lower":4,"sym_1_upper":6,
//!  "sym_end_lower":6,"sym_end_upper":7}
//! ```
//!
//! Keys are written in sorted order, so dumping a loaded record reproduces it
//! byte for byte.

use std::io::{Read, Write};

use serde_json::{Map, Value};
use tracing::info;

use crate::{
    error::Result, AdaptiveModel, CodecError, FastAdaptiveModel,
    ProbabilityModel, MAX_FREQUENCY,
};

/// An immutable copy of an adaptive model's frequency state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSnapshot {
    /// `bounds[i]..bounds[i + 1]` belongs to symbol `i`; the last slice is the
    /// end-of-message symbol.
    bounds: Box<[u32]>,
}

impl ModelSnapshot {
    pub fn capture(model: &AdaptiveModel) -> Self {
        let bounds = std::iter::once(0)
            .chain(model.intervals().map(|interval| interval.end))
            .collect();

        Self { bounds }
    }

    /// Ordinary symbols, the end-of-message symbol excluded.
    pub fn num_symbols(&self) -> u32 {
        (self.bounds.len() - 2) as u32
    }

    pub fn denominator(&self) -> u32 {
        self.bounds[self.bounds.len() - 1]
    }

    /// A fresh model in the captured state.
    pub fn restore(&self) -> AdaptiveModel {
        AdaptiveModel::from_bounds(self.bounds.clone())
    }

    pub fn to_json(&self) -> String {
        Value::Object(self.to_map()).to_string()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Self::from_value(serde_json::from_str(json)?)
    }

    pub fn write_to(&self, writer: impl Write) -> Result<()> {
        serde_json::to_writer(writer, &Value::Object(self.to_map()))?;
        Ok(())
    }

    pub fn read_from(reader: impl Read) -> Result<Self> {
        Self::from_value(serde_json::from_reader(reader)?)
    }

    fn to_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("num_symbols".into(), self.num_symbols().into());
        map.insert("denominator".into(), self.denominator().into());

        let num_symbols = self.num_symbols() as usize;
        for (symbol, bounds) in self.bounds.windows(2).enumerate() {
            let name = if symbol == num_symbols {
                "end".to_string()
            } else {
                symbol.to_string()
            };

            map.insert(format!("sym_{name}_lower"), bounds[0].into());
            map.insert(format!("sym_{name}_upper"), bounds[1].into());
        }

        map
    }

    fn from_value(value: Value) -> Result<Self> {
        let Value::Object(map) = value else {
            return Err(CodecError::format("model snapshot must be a JSON object"));
        };

        let num_symbols = field(&map, "num_symbols")?;
        let denominator = field(&map, "denominator")?;

        // A saturated record (`denominator == MAX_FREQUENCY`) loads, but a
        // model restored from it cannot observe another symbol. The codec
        // checks that headroom per slice.
        if denominator > MAX_FREQUENCY {
            return Err(CodecError::format(format!(
                "snapshot denominator {denominator} exceeds the coder limit of {MAX_FREQUENCY}"
            )));
        }

        // Every slot, the end-of-message one included, is at least one wide
        if num_symbols >= denominator {
            return Err(CodecError::format(format!(
                "{num_symbols} symbols plus the end-of-message symbol cannot fit a denominator of {denominator}"
            )));
        }

        let mut bounds = Vec::with_capacity(num_symbols as usize + 2);
        bounds.push(0);

        for symbol in 0..=num_symbols {
            let name = if symbol == num_symbols {
                "end".to_string()
            } else {
                symbol.to_string()
            };

            let lower = field(&map, &format!("sym_{name}_lower"))?;
            let upper = field(&map, &format!("sym_{name}_upper"))?;

            let expected = bounds[bounds.len() - 1];
            if lower != expected || upper <= lower {
                return Err(CodecError::format(format!(
                    "symbol {name} has bounds {lower}..{upper}, expected a non-empty interval starting at {expected}"
                )));
            }

            bounds.push(upper);
        }

        if bounds[bounds.len() - 1] != denominator {
            return Err(CodecError::format(format!(
                "intervals end at {}, but the denominator is {denominator}",
                bounds[bounds.len() - 1]
            )));
        }

        Ok(Self {
            bounds: bounds.into(),
        })
    }
}

fn field(map: &Map<String, Value>, key: &str) -> Result<u32> {
    let value = map
        .get(key)
        .ok_or_else(|| CodecError::format(format!("missing field `{key}`")))?;

    value
        .as_u64()
        .and_then(|value| u32::try_from(value).ok())
        .ok_or_else(|| {
            CodecError::format(format!(
                "field `{key}` must be an unsigned 32-bit integer, got {value}"
            ))
        })
}

impl From<&AdaptiveModel> for ModelSnapshot {
    fn from(model: &AdaptiveModel) -> Self {
        Self::capture(model)
    }
}

impl From<&FastAdaptiveModel> for ModelSnapshot {
    fn from(model: &FastAdaptiveModel) -> Self {
        Self::capture(model.as_adaptive())
    }
}

impl AdaptiveModel {
    /// Serialize the current frequency state.
    pub fn dump_model(&self) -> String {
        ModelSnapshot::capture(self).to_json()
    }

    /// Rebuild a model from a record produced by [`AdaptiveModel::dump_model`].
    pub fn load_model(json: &str) -> Result<Self> {
        let model = ModelSnapshot::from_json(json)?.restore();
        info!(
            num_symbols = model.num_symbols(),
            denominator = model.denominator(),
            "restored adaptive model"
        );
        Ok(model)
    }
}

impl FastAdaptiveModel {
    pub fn dump_model(&self) -> String {
        self.as_adaptive().dump_model()
    }

    pub fn load_model(json: &str) -> Result<Self> {
        AdaptiveModel::load_model(json).map(Self::from)
    }
}

#[cfg(test)]
mod test_snapshot;
