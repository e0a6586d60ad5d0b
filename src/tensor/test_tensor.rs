use super::*;

fn ramp(len: usize) -> Vec<f32> {
    (0..len).map(|i| i as f32 * 0.5).collect()
}

#[test]
fn test_view_checks_length() {
    let data = ramp(24);
    assert!(TensorView::new(&data, [2, 3, 4]).is_ok());
    assert!(TensorView::new(&data, [2, 3, 5]).is_err());
}

#[test]
fn test_batch_slices_are_contiguous_chunks() {
    let data = ramp(2 * 3 * 2 * 2);
    let batch = TensorView::new(&data, [2, 3, 2, 2]).unwrap();

    assert_eq!(batch.batch_size(), 2);
    assert_eq!(batch.slice_shape(), [3, 2, 2]);

    let slices: Vec<_> = batch.slices().collect();
    assert_eq!(slices.len(), 2);
    assert_eq!(slices[0].data(), &data[..12]);
    assert_eq!(slices[1].data(), &data[12..]);
    assert_eq!(slices[1].shape(), [3, 2, 2]);
}

#[test]
fn test_stack_inverts_slicing() {
    let data = ramp(3 * 2 * 2 * 2);
    let batch = TensorView::new(&data, [3, 2, 2, 2]).unwrap();

    let owned = batch.slices().map(|slice| slice.to_owned()).collect();
    let stacked = Tensor::stack(batch.slice_shape(), owned).unwrap();

    assert_eq!(stacked.view(), batch);
    assert_eq!(stacked.into_vec(), data);
}

#[test]
fn test_stack_rejects_mismatched_slices() {
    let slices = vec![Tensor::zeros([1, 2, 2]).unwrap(), Tensor::zeros([1, 2, 3]).unwrap()];
    assert!(Tensor::stack([1, 2, 2], slices).is_err());
}

#[test]
fn test_array_ref_accepts_contiguous_f32() {
    let data = ramp(16);
    let shape = [2, 2, 2, 2];
    let strides = [8, 4, 2, 1];

    let array = ArrayRef::new(ArrayData::F32(&data), &shape).with_strides(&strides);
    let view = TensorView::<4>::try_from(array).unwrap();
    assert_eq!(view.shape(), shape);

    // Unit axes may carry any stride
    let shape = [1, 4, 2, 2];
    let strides = [999, 4, 2, 1];
    let array = ArrayRef::new(ArrayData::F32(&data), &shape).with_strides(&strides);
    assert!(TensorView::<4>::try_from(array).is_ok());
}

#[test]
fn test_array_ref_rejects_wrong_rank() {
    let data = ramp(8);
    let shape = [2, 2, 2];
    let err = TensorView::<4>::try_from(ArrayRef::new(ArrayData::F32(&data), &shape))
        .unwrap_err();
    assert!(matches!(err, CodecError::Format(ref msg) if msg.contains("4D")));
}

#[test]
fn test_array_ref_rejects_wrong_dtype() {
    let data = vec![0.0f64; 16];
    let shape = [1, 1, 4, 4];
    let err = TensorView::<4>::try_from(ArrayRef::new(ArrayData::F64(&data), &shape))
        .unwrap_err();
    assert!(matches!(err, CodecError::Format(ref msg) if msg.contains("float64")));
}

#[test]
fn test_array_ref_rejects_strided_layout() {
    let data = ramp(16);
    let shape = [2, 2, 2, 2];
    // Fortran order
    let strides = [1, 2, 4, 8];
    let array = ArrayRef::new(ArrayData::F32(&data), &shape).with_strides(&strides);
    let err = TensorView::<4>::try_from(array).unwrap_err();
    assert!(matches!(err, CodecError::Format(ref msg) if msg.contains("contiguous")));
}

#[test]
fn test_empty_batch() {
    let data: Vec<f32> = Vec::new();
    let batch = TensorView::new(&data, [0, 3, 4, 4]).unwrap();
    assert_eq!(batch.slices().len(), 0);
}

#[test]
fn test_array_ref_overflowing_strided_shape() {
    let data = ramp(16);
    let shape = [usize::MAX, 4, 2, 2];
    let strides = [16, 4, 2, 1];

    let array = ArrayRef::new(ArrayData::F32(&data), &shape).with_strides(&strides);
    let err = TensorView::<4>::try_from(array).unwrap_err();
    assert!(matches!(err, CodecError::Format(_)));
}
