use serde::{Serialize, de::DeserializeOwned};

use crate::error::{Error, Result};

/// Serialization format for supply envelopes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// JSON format (human-readable, good for debugging).
    Json,

    /// CBOR format (compact binary, the default on the wire).
    #[default]
    Cbor,
}

/// Encode a value to bytes using the specified format.
pub fn encode<T: Serialize>(value: &T, format: Format) -> Result<Vec<u8>> {
    match format {
        Format::Json => serde_json::to_vec(value).map_err(Error::from),
        Format::Cbor => {
            let mut buf = Vec::new();
            ciborium::into_writer(value, &mut buf)?;
            Ok(buf)
        }
    }
}

/// Decode bytes to a value using the specified format.
pub fn decode<T: DeserializeOwned>(data: &[u8], format: Format) -> Result<T> {
    match format {
        Format::Json => serde_json::from_slice(data).map_err(Error::from),
        Format::Cbor => ciborium::from_reader(data).map_err(|e| Error::Cbor(e.to_string())),
    }
}

/// Try to auto-detect the format from the data.
///
/// Returns `Json` if the data starts with `{` or `[`, otherwise `Cbor`.
pub fn detect_format(data: &[u8]) -> Format {
    match data.first() {
        Some(b'{') | Some(b'[') => Format::Json,
        _ => Format::Cbor,
    }
}

/// Decode bytes, auto-detecting the format.
pub fn decode_auto<T: DeserializeOwned>(data: &[u8]) -> Result<T> {
    let format = detect_format(data);
    decode(data, format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Content, Supply};

    fn sample_supply() -> Supply {
        Supply::new("PT2Fleet:Fleet", "Fleet Supply", Content::new(vec![0x0a, 0x05, 1, 2, 3]))
    }

    #[test]
    fn test_json_roundtrip() {
        let supply = sample_supply();

        let encoded = encode(&supply, Format::Json).unwrap();
        let decoded: Supply = decode(&encoded, Format::Json).unwrap();

        assert_eq!(decoded, supply);
    }

    #[test]
    fn test_cbor_roundtrip() {
        let supply = sample_supply();

        let encoded = encode(&supply, Format::Cbor).unwrap();
        let decoded: Supply = decode(&encoded, Format::Cbor).unwrap();

        assert_eq!(decoded, supply);
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(detect_format(b"{\"key\": \"value\"}"), Format::Json);
        assert_eq!(detect_format(b"[1, 2, 3]"), Format::Json);
        assert_eq!(detect_format(b"\xa1\x63key\x65value"), Format::Cbor);
        assert_eq!(detect_format(b""), Format::Cbor);
    }

    #[test]
    fn test_auto_decode() {
        let supply = sample_supply();

        let json = encode(&supply, Format::Json).unwrap();
        let decoded: Supply = decode_auto(&json).unwrap();
        assert_eq!(decoded.sender, supply.sender);

        let cbor = encode(&supply, Format::Cbor).unwrap();
        let decoded: Supply = decode_auto(&cbor).unwrap();
        assert_eq!(decoded.sender, supply.sender);
    }

    #[test]
    fn test_garbage_fails_to_decode() {
        let result: Result<Supply> = decode_auto(&[0xff, 0x00, 0x13]);
        assert!(matches!(result, Err(Error::Cbor(_))));

        let result: Result<Supply> = decode_auto(b"{not json");
        assert!(matches!(result, Err(Error::Json(_))));
    }
}
