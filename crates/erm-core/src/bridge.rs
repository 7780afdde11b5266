//! Moves config files between the local filesystem and the base64 strings
//! carried in LWM2M resource values.

use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::AgentError;

/// Largest encoded value written to edge-core.
///
/// Values above roughly 4 KiB get cut by edge-core's websocket layer, which
/// then drops the connection on the malformed frame. Anything longer is
/// truncated here instead; the tail of the file is lost on the manager side.
pub const MAX_ENCODED_PAYLOAD: usize = 3800;

pub fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode a standard base64 value. Line breaks are ignored, so wrapped
/// values from edge-core decode the same as unwrapped ones.
pub fn decode(encoded: &str) -> Result<Vec<u8>, base64::DecodeError> {
    if encoded.contains(['\r', '\n']) {
        let joined: String = encoded.chars().filter(|c| !matches!(c, '\r' | '\n')).collect();
        return STANDARD.decode(joined);
    }
    STANDARD.decode(encoded)
}

/// Read a whole file and return it base64 encoded.
pub async fn read_encoded(path: &Path) -> Result<String, AgentError> {
    let content = tokio::fs::read(path)
        .await
        .map_err(|source| AgentError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(encode(&content))
}

/// Decode `encoded` and replace the file's entire contents with it.
///
/// The value is decoded before the file is opened, so an undecodable value
/// leaves the file untouched. The write itself is create-or-truncate, not an
/// atomic rename.
pub async fn write_decoded(path: &Path, encoded: &str) -> Result<(), AgentError> {
    let content = decode(encoded)?;
    tokio::fs::write(path, content)
        .await
        .map_err(|source| AgentError::FileWrite {
            path: path.to_path_buf(),
            source,
        })
}

/// Cap an encoded value at [`MAX_ENCODED_PAYLOAD`] characters. Returns `true`
/// when something was cut.
pub fn truncate_payload(encoded: &mut String) -> bool {
    // base64 output is ASCII, so the byte index is always a char boundary.
    if encoded.len() > MAX_ENCODED_PAYLOAD {
        encoded.truncate(MAX_ENCODED_PAYLOAD);
        true
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_reverses_encode_for_arbitrary_bytes() {
        let all_bytes: Vec<u8> = (0..=255u8).cycle().take(1027).collect();
        for len in [0, 1, 2, 3, 4, 255, 256, 1027] {
            let input = &all_bytes[..len];
            assert_eq!(decode(&encode(input)).unwrap(), input);
        }
    }

    #[test]
    fn decode_ignores_line_breaks() {
        let body = b"ssid=home\npsk=a rather long passphrase for wrapping\n";
        let encoded = encode(body);
        let (head, tail) = encoded.split_at(24);

        assert_eq!(decode(&format!("{head}\n{tail}")).unwrap(), body);
        assert_eq!(decode(&format!("{head}\r\n{tail}\r\n")).unwrap(), body);
        assert!(decode(&format!("{head} {tail}")).is_err());
    }

    #[tokio::test]
    async fn write_decoded_accepts_wrapped_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wifi.cfg");
        let encoded = encode(b"ssid=wrapped\n");
        let (head, tail) = encoded.split_at(8);

        write_decoded(&path, &format!("{head}\r\n{tail}")).await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"ssid=wrapped\n");
    }

    #[test]
    fn encoding_is_ascii() {
        let encoded = encode("ssid=café\n\0\u{1F4A1}".as_bytes());
        assert!(encoded.is_ascii());
    }

    #[test]
    fn truncates_only_above_ceiling() {
        let mut at_3799 = "A".repeat(3799);
        assert!(!truncate_payload(&mut at_3799));
        assert_eq!(at_3799.len(), 3799);

        let mut at_3800 = "A".repeat(3800);
        assert!(!truncate_payload(&mut at_3800));
        assert_eq!(at_3800.len(), 3800);

        let mut at_3801 = format!("{}Z", "A".repeat(3800));
        assert!(truncate_payload(&mut at_3801));
        assert_eq!(at_3801, "A".repeat(3800));
    }

    #[tokio::test]
    async fn read_encoded_returns_base64_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wifi.cfg");
        std::fs::write(&path, b"ssid=home\n").unwrap();

        let encoded = read_encoded(&path).await.unwrap();
        assert_eq!(encoded, encode(b"ssid=home\n"));
    }

    #[tokio::test]
    async fn read_encoded_missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_encoded(&dir.path().join("missing.cfg")).await.unwrap_err();
        assert!(matches!(err, AgentError::FileRead { .. }));
    }

    #[tokio::test]
    async fn write_decoded_replaces_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wifi.cfg");
        std::fs::write(&path, "a much longer previous configuration body").unwrap();

        write_decoded(&path, &encode(b"short")).await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"short");
    }

    #[tokio::test]
    async fn write_decoded_creates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("new.cfg");

        write_decoded(&path, &encode(b"created")).await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "created");
    }

    #[tokio::test]
    async fn write_decoded_rejects_invalid_base64_without_touching_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wifi.cfg");
        std::fs::write(&path, "keep me").unwrap();

        let err = write_decoded(&path, "not base64!!").await.unwrap_err();
        assert!(matches!(err, AgentError::Decode(_)));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "keep me");
    }

    #[tokio::test]
    async fn write_decoded_into_missing_directory_is_write_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no/such/dir/wifi.cfg");

        let err = write_decoded(&path, &encode(b"x")).await.unwrap_err();
        assert!(matches!(err, AgentError::FileWrite { .. }));
    }
}
