use super::*;
use crate::{ArithmeticDecoder, ArithmeticEncoder};

fn trained(num_symbols: u32, symbols: &[u32]) -> AdaptiveModel {
    let mut model = AdaptiveModel::new(num_symbols);
    for &symbol in symbols {
        model.consume_symbol(symbol);
    }
    model
}

#[test]
fn test_dump_fields() {
    let model = trained(2, &[0, 0, 0, 1]);
    let json: Value = serde_json::from_str(&model.dump_model()).unwrap();

    assert_eq!(json["num_symbols"], 2);
    assert_eq!(json["denominator"], 7);
    assert_eq!(json["sym_0_lower"], 0);
    assert_eq!(json["sym_0_upper"], 4);
    assert_eq!(json["sym_1_lower"], 4);
    assert_eq!(json["sym_1_upper"], 6);
    assert_eq!(json["sym_end_lower"], 6);
    assert_eq!(json["sym_end_upper"], 7);
}

#[test]
fn test_dump_load_dump_is_identical() {
    let model = trained(12, &[3, 3, 11, 0, 5, 3, 12, 7]);
    let dumped = model.dump_model();

    let loaded = AdaptiveModel::load_model(&dumped).unwrap();
    assert_eq!(loaded, model);
    assert_eq!(loaded.dump_model(), dumped);
}

#[test]
fn test_loaded_model_keeps_adapting_identically() {
    let mut original = trained(5, &[1, 1, 2]);
    let mut loaded = AdaptiveModel::load_model(&original.dump_model()).unwrap();

    for symbol in [4, 0, 1, 1, 5] {
        original.consume_symbol(symbol);
        loaded.consume_symbol(symbol);
        assert_eq!(loaded.denominator(), original.denominator());
        for s in 0..original.size() {
            assert_eq!(loaded.symbol_numerator(s), original.symbol_numerator(s));
        }
    }
}

#[test]
fn test_resumed_encoder_and_decoder_agree() {
    let warmup: Vec<u32> = (0..500).map(|i| (i % 7) as u32).collect();
    let snapshot = ModelSnapshot::capture(&trained(16, &warmup));
    let json = snapshot.to_json();

    let message = [0, 1, 2, 3, 4, 5, 6, 6, 6, 15];
    let mut encoder = ArithmeticEncoder::new();
    encoder.encode(&mut AdaptiveModel::load_model(&json).unwrap(), message);
    let bytes = encoder.finalize();

    let mut decoder = ArithmeticDecoder::new(bytes);
    let mut model = FastAdaptiveModel::load_model(&json).unwrap();
    assert_eq!(decoder.decode(&mut model).unwrap(), message);
}

#[test]
fn test_stream_round_trip() {
    let model = trained(3, &[2, 2, 0]);
    let snapshot = ModelSnapshot::from(&model);

    let mut buffer = Vec::new();
    snapshot.write_to(&mut buffer).unwrap();
    assert_eq!(buffer, snapshot.to_json().into_bytes());

    let read = ModelSnapshot::read_from(buffer.as_slice()).unwrap();
    assert_eq!(read, snapshot);
    assert_eq!(read.restore(), model);
}

#[test]
fn test_missing_field_is_rejected() {
    let mut json: Value =
        serde_json::from_str(&trained(3, &[1]).dump_model()).unwrap();
    json.as_object_mut().unwrap().remove("sym_1_upper");

    let err = AdaptiveModel::load_model(&json.to_string()).unwrap_err();
    assert!(matches!(err, CodecError::Format(ref msg) if msg.contains("sym_1_upper")));
}

#[test]
fn test_missing_terminator_is_rejected() {
    let mut json: Value =
        serde_json::from_str(&AdaptiveModel::new(2).dump_model()).unwrap();
    json.as_object_mut().unwrap().remove("sym_end_lower");

    assert!(matches!(
        ModelSnapshot::from_json(&json.to_string()),
        Err(CodecError::Format(_))
    ));
}

#[test]
fn test_inconsistent_bounds_are_rejected() {
    let gap = r#"{"num_symbols":1,"denominator":3,"sym_0_lower":0,"sym_0_upper":1,"sym_end_lower":2,"sym_end_upper":3}"#;
    assert!(matches!(ModelSnapshot::from_json(gap), Err(CodecError::Format(_))));

    let wrong_total = r#"{"num_symbols":1,"denominator":9,"sym_0_lower":0,"sym_0_upper":1,"sym_end_lower":1,"sym_end_upper":2}"#;
    assert!(matches!(
        ModelSnapshot::from_json(wrong_total),
        Err(CodecError::Format(_))
    ));

    let negative = r#"{"num_symbols":1,"denominator":2,"sym_0_lower":-1,"sym_0_upper":1,"sym_end_lower":1,"sym_end_upper":2}"#;
    assert!(matches!(
        ModelSnapshot::from_json(negative),
        Err(CodecError::Format(_))
    ));
}

#[test]
fn test_malformed_json_is_rejected() {
    assert!(matches!(
        ModelSnapshot::from_json("{not json"),
        Err(CodecError::Json(_))
    ));
    assert!(matches!(
        ModelSnapshot::from_json("[1, 2, 3]"),
        Err(CodecError::Format(_))
    ));
}

#[test]
fn test_saturated_snapshot_loads() {
    let saturated = format!(
        r#"{{"num_symbols":1,"denominator":{MAX_FREQUENCY},"sym_0_lower":0,"sym_0_upper":1,"sym_end_lower":1,"sym_end_upper":{MAX_FREQUENCY}}}"#
    );
    let model = AdaptiveModel::load_model(&saturated).unwrap();
    assert_eq!(model.denominator(), MAX_FREQUENCY);
    assert_eq!(model.dump_model(), saturated);

    let over = saturated.replace(&MAX_FREQUENCY.to_string(), &(MAX_FREQUENCY + 1).to_string());
    assert!(matches!(ModelSnapshot::from_json(&over), Err(CodecError::Format(_))));
}

#[test]
fn test_more_symbols_than_denominator_is_rejected() {
    let crowded = r#"{"num_symbols":1073741823,"denominator":4,"sym_0_lower":0,"sym_0_upper":1}"#;
    let err = ModelSnapshot::from_json(crowded).unwrap_err();
    assert!(matches!(err, CodecError::Format(ref msg) if msg.contains("cannot fit")));

    // Exactly one slot each still fits
    let tight = r#"{"num_symbols":1,"denominator":2,"sym_0_lower":0,"sym_0_upper":1,"sym_end_lower":1,"sym_end_upper":2}"#;
    assert!(ModelSnapshot::from_json(tight).is_ok());
}
