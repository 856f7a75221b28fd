use nexus_knowledge::embedding::{
    cosine_similarity, from_bytes, to_bytes, EMBEDDING_BYTES, EMBEDDING_DIM,
};
use nexus_knowledge::KnowledgeError;

/// Deterministic vectors covering negatives, subnormals, zero and extremes.
fn awkward_vectors() -> Vec<Vec<f32>> {
    let ramp: Vec<f32> = (0..EMBEDDING_DIM).map(|i| (i as f32 - 192.0) / 97.0).collect();
    let mut extremes = vec![0.0f32; EMBEDDING_DIM];
    extremes[0] = f32::MAX;
    extremes[1] = f32::MIN;
    extremes[2] = f32::MIN_POSITIVE;
    extremes[3] = f32::MIN_POSITIVE / 4.0;
    extremes[4] = -0.0;
    extremes[5] = f32::EPSILON;
    let mut state = 0x2545_f491u32;
    let noisy: Vec<f32> = (0..EMBEDDING_DIM)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            f32::from_bits(state & 0xbf7f_ffff)
        })
        .collect();
    vec![ramp, extremes, noisy, vec![0.0; EMBEDDING_DIM]]
}

#[test]
fn round_trip_is_bit_exact() {
    for v in awkward_vectors() {
        let bytes = to_bytes(&v).unwrap();
        assert_eq!(bytes.len(), EMBEDDING_BYTES);
        let back = from_bytes(&bytes).unwrap();
        let original_bits: Vec<u32> = v.iter().map(|x| x.to_bits()).collect();
        let decoded_bits: Vec<u32> = back.iter().map(|x| x.to_bits()).collect();
        assert_eq!(original_bits, decoded_bits);
    }
}

#[test]
fn wrong_vector_length_is_rejected() {
    for len in [0, 1, 383, 385, 768] {
        let err = to_bytes(&vec![0.5f32; len]).unwrap_err();
        assert!(
            matches!(err, KnowledgeError::DimensionMismatch { expected: 384, actual } if actual == len),
            "len {len}: {err}"
        );
    }
}

#[test]
fn wrong_blob_length_is_rejected() {
    for len in [0, 4, 1532, 1535, 1537, 1540, 3072] {
        let err = from_bytes(&vec![0u8; len]).unwrap_err();
        assert!(
            matches!(err, KnowledgeError::BlobLength { expected: 1536, actual } if actual == len),
            "len {len}: {err}"
        );
    }
}

#[test]
fn cosine_of_zero_vector_is_zero() {
    let zero = vec![0.0f32; EMBEDDING_DIM];
    let mut other = vec![0.0f32; EMBEDDING_DIM];
    other[7] = 2.0;
    assert_eq!(cosine_similarity(&zero, &other), 0.0);
    assert_eq!(cosine_similarity(&zero, &zero), 0.0);
}
