//! Row-major float32 tensors, borrowed and owned.
//!
//! [`TensorView`] borrows memory the caller keeps alive, [`Tensor`] owns its
//! buffer. Host arrays enter through [`ArrayRef`], which is validated before
//! anything is coded.

use std::fmt;

use crate::{error::Result, CodecError};

/// Element type of a host array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DType {
    F32,
    F64,
    I32,
    U8,
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DType::F32 => "float32",
            DType::F64 => "float64",
            DType::I32 => "int32",
            DType::U8 => "uint8",
        };
        f.write_str(name)
    }
}

/// Typed element storage of a host array.
#[derive(Debug, Clone, Copy)]
pub enum ArrayData<'a> {
    F32(&'a [f32]),
    F64(&'a [f64]),
    I32(&'a [i32]),
    U8(&'a [u8]),
}

impl ArrayData<'_> {
    pub fn dtype(&self) -> DType {
        match self {
            ArrayData::F32(_) => DType::F32,
            ArrayData::F64(_) => DType::F64,
            ArrayData::I32(_) => DType::I32,
            ArrayData::U8(_) => DType::U8,
        }
    }
}

/// An array handed over by a binding layer, as it describes it.
#[derive(Debug, Clone, Copy)]
pub struct ArrayRef<'a> {
    pub data: ArrayData<'a>,
    pub shape: &'a [usize],
    /// Element strides per axis; `None` means C-contiguous.
    pub strides: Option<&'a [usize]>,
}

impl<'a> ArrayRef<'a> {
    pub fn new(data: ArrayData<'a>, shape: &'a [usize]) -> Self {
        Self {
            data,
            shape,
            strides: None,
        }
    }

    pub fn with_strides(mut self, strides: &'a [usize]) -> Self {
        self.strides = Some(strides);
        self
    }

    fn is_c_contiguous(&self) -> bool {
        let Some(strides) = self.strides else {
            return true;
        };

        if strides.len() != self.shape.len() {
            return false;
        }

        let mut expected = 1;
        for (&dim, &stride) in self.shape.iter().zip(strides).rev() {
            // Axes of length one never step, their stride is irrelevant
            if dim != 1 && stride != expected {
                return false;
            }
            match expected.checked_mul(dim) {
                Some(next) => expected = next,
                None => return false,
            }
        }

        true
    }
}

fn element_count(shape: &[usize]) -> Result<usize> {
    shape
        .iter()
        .try_fold(1usize, |count, &dim| count.checked_mul(dim))
        .ok_or_else(|| CodecError::format(format!("shape {shape:?} overflows")))
}

fn check_len(shape: &[usize], len: usize) -> Result<()> {
    let expected = element_count(shape)?;
    if expected != len {
        return Err(CodecError::format(format!(
            "shape {shape:?} needs {expected} elements, got {len}"
        )));
    }
    Ok(())
}

/// A borrowed, contiguous, row-major tensor of rank `N`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TensorView<'a, const N: usize> {
    shape: [usize; N],
    data: &'a [f32],
}

impl<'a, const N: usize> TensorView<'a, N> {
    pub fn new(data: &'a [f32], shape: [usize; N]) -> Result<Self> {
        check_len(&shape, data.len())?;
        Ok(Self { shape, data })
    }

    pub fn shape(&self) -> [usize; N] {
        self.shape
    }

    pub fn data(&self) -> &'a [f32] {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn to_owned(&self) -> Tensor<N> {
        Tensor {
            shape: self.shape,
            data: self.data.to_vec(),
        }
    }
}

impl<'a> TensorView<'a, 4> {
    pub fn batch_size(&self) -> usize {
        self.shape[0]
    }

    /// Shape of one batch element.
    pub fn slice_shape(&self) -> [usize; 3] {
        [self.shape[1], self.shape[2], self.shape[3]]
    }

    /// The `index`-th element along the batch axis.
    pub fn slice(&self, index: usize) -> TensorView<'a, 3> {
        assert!(index < self.batch_size(), "batch index {index} out of range");

        let shape = self.slice_shape();
        let stride = shape.iter().product::<usize>();
        TensorView {
            shape,
            data: &self.data[index * stride..(index + 1) * stride],
        }
    }

    pub fn slices(&self) -> impl ExactSizeIterator<Item = TensorView<'a, 3>> {
        let batch = *self;
        (0..batch.batch_size()).map(move |index| batch.slice(index))
    }
}

impl<'a, const N: usize> TryFrom<ArrayRef<'a>> for TensorView<'a, N> {
    type Error = CodecError;

    fn try_from(array: ArrayRef<'a>) -> Result<Self> {
        let ArrayData::F32(data) = array.data else {
            return Err(CodecError::format(format!(
                "the input array must have dtype float32, got {}",
                array.data.dtype()
            )));
        };

        let shape: [usize; N] = array.shape.try_into().map_err(|_| {
            CodecError::format(format!(
                "the input must be a {N}D array, got {} dimensions",
                array.shape.len()
            ))
        })?;

        if !array.is_c_contiguous() {
            return Err(CodecError::format(
                "the input array must be C-style and contiguous in memory",
            ));
        }

        Self::new(data, shape)
    }
}

/// An owned, row-major tensor of rank `N`.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor<const N: usize> {
    shape: [usize; N],
    data: Vec<f32>,
}

impl<const N: usize> Tensor<N> {
    pub fn new(data: Vec<f32>, shape: [usize; N]) -> Result<Self> {
        check_len(&shape, data.len())?;
        Ok(Self { shape, data })
    }

    pub fn zeros(shape: [usize; N]) -> Result<Self> {
        Ok(Self {
            shape,
            data: vec![0.0; element_count(&shape)?],
        })
    }

    pub fn shape(&self) -> [usize; N] {
        self.shape
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }

    pub fn view(&self) -> TensorView<'_, N> {
        TensorView {
            shape: self.shape,
            data: &self.data,
        }
    }
}

impl Tensor<4> {
    /// Stack equally shaped slices along a new batch axis.
    pub fn stack(slice_shape: [usize; 3], slices: Vec<Tensor<3>>) -> Result<Self> {
        let [channels, height, width] = slice_shape;
        let mut data = Vec::with_capacity(slices.len() * element_count(&slice_shape)?);

        for (index, slice) in slices.iter().enumerate() {
            if slice.shape != slice_shape {
                return Err(CodecError::format(format!(
                    "slice {index} has shape {:?}, expected {slice_shape:?}",
                    slice.shape
                )));
            }
            data.extend_from_slice(&slice.data);
        }

        Ok(Self {
            shape: [slices.len(), channels, height, width],
            data,
        })
    }
}

#[cfg(test)]
mod test_tensor;
