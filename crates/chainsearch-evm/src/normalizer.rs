//! Converts alloy `DynSolValue` into chainsearch `FieldValue`.

use alloy_dyn_abi::DynSolValue;
use chainsearch_core::FieldValue;

/// Convert a decoded `DynSolValue` into a `FieldValue`.
///
/// Integers that fit in 128 bits stay numeric; wider values become decimal
/// strings. Addresses are EIP-55 checksummed.
pub fn normalize(val: DynSolValue) -> FieldValue {
    match val {
        DynSolValue::Bool(b) => FieldValue::Bool(b),

        DynSolValue::Int(i, _bits) => match i128::try_from(i) {
            Ok(v) => FieldValue::Int(v),
            Err(_) => FieldValue::BigInt(i.to_string()),
        },

        DynSolValue::Uint(u, _bits) => match u128::try_from(u) {
            Ok(v) => FieldValue::Uint(v),
            Err(_) => FieldValue::BigUint(u.to_string()),
        },

        DynSolValue::FixedBytes(word, size) => FieldValue::Bytes(word[..size].to_vec()),
        DynSolValue::Bytes(b) => FieldValue::Bytes(b),
        DynSolValue::String(s) => FieldValue::Str(s),
        DynSolValue::Address(a) => FieldValue::Address(a.to_checksum(None)),

        DynSolValue::Array(vals) | DynSolValue::FixedArray(vals) => {
            FieldValue::Array(vals.into_iter().map(normalize).collect())
        }
        DynSolValue::Tuple(fields) => FieldValue::Tuple(fields.into_iter().map(normalize).collect()),

        DynSolValue::Function(f) => FieldValue::Bytes(f.to_vec()),

        #[allow(unreachable_patterns)]
        _ => FieldValue::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, B256, I256, U256};

    #[test]
    fn small_uint256_stays_numeric() {
        let v = normalize(DynSolValue::Uint(U256::from(42u64), 256));
        assert_eq!(v, FieldValue::Uint(42));
    }

    #[test]
    fn wide_uint_becomes_decimal_string() {
        let v = normalize(DynSolValue::Uint(U256::MAX, 256));
        assert_eq!(v, FieldValue::BigUint(U256::MAX.to_string()));
    }

    #[test]
    fn negative_int() {
        let v = normalize(DynSolValue::Int(I256::try_from(-7i64).unwrap(), 256));
        assert_eq!(v, FieldValue::Int(-7));
    }

    #[test]
    fn address_is_checksummed() {
        let addr: Address = "0xd8da6bf26964af9d7eed9e03e53415d37aa96045".parse().unwrap();
        let v = normalize(DynSolValue::Address(addr));
        assert_eq!(
            v,
            FieldValue::Address("0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045".into())
        );
    }

    #[test]
    fn fixed_bytes_are_truncated_to_size() {
        let v = normalize(DynSolValue::FixedBytes(B256::repeat_byte(0xab), 4));
        assert_eq!(v, FieldValue::Bytes(vec![0xab; 4]));
    }

    #[test]
    fn nested_arrays() {
        let v = normalize(DynSolValue::Array(vec![
            DynSolValue::Bool(true),
            DynSolValue::String("x".into()),
        ]));
        assert_eq!(
            v,
            FieldValue::Array(vec![FieldValue::Bool(true), FieldValue::Str("x".into())])
        );
    }
}
