//! Length-prefixed framing for TCP messages.
//!
//! Wire format: `[u32 length (big-endian)][JSON payload]`. Ported near
//! verbatim from the teacher's `imbolc-net::framing`.

use std::io::{self, Read, Write};

use serde::{de::DeserializeOwned, Serialize};

const MAX_MESSAGE_BYTES: u32 = 16_000_000;

pub fn write_message<W: Write, T: Serialize>(writer: &mut W, msg: &T) -> io::Result<()> {
    let payload = serde_json::to_vec(msg).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let len = payload.len() as u32;
    writer.write_all(&len.to_be_bytes())?;
    writer.write_all(&payload)?;
    writer.flush()
}

pub fn serialize_frame<T: Serialize>(msg: &T) -> io::Result<Vec<u8>> {
    let payload = serde_json::to_vec(msg).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let mut frame = Vec::with_capacity(4 + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

pub fn read_message<R: Read, T: DeserializeOwned>(reader: &mut R) -> io::Result<T> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf)?;
    let len = u32::from_be_bytes(len_buf);
    if len > MAX_MESSAGE_BYTES {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("message too large: {len} bytes"),
        ));
    }
    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload)?;
    serde_json::from_slice(&payload).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn roundtrip_string() {
        let mut buf = Vec::new();
        write_message(&mut buf, &"hello".to_string()).unwrap();
        let mut cursor = Cursor::new(buf);
        let result: String = read_message(&mut cursor).unwrap();
        assert_eq!(result, "hello");
    }

    #[test]
    fn oversized_length_prefix_is_rejected() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(MAX_MESSAGE_BYTES + 1).to_be_bytes());
        let mut cursor = Cursor::new(buf);
        let result: io::Result<String> = read_message(&mut cursor);
        assert!(result.is_err());
    }
}
