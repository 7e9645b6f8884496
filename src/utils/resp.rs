//! RESP (Redis Serialization Protocol) encoder and decoder
//!
//! Commands are always encoded as arrays of bulk strings so tensor blobs
//! and packed datasets travel unmodified. Responses are decoded from a
//! buffered stream.

use std::io::{self, BufRead};

use super::error::ProtocolError;

/// RESP value types
#[derive(Debug, Clone, PartialEq)]
pub enum RespValue {
    /// Simple string (+OK\r\n)
    SimpleString(String),
    /// Error (-ERR message\r\n)
    Error(String),
    /// Integer (:1000\r\n)
    Integer(i64),
    /// Bulk string ($6\r\nfoobar\r\n)
    BulkString(Vec<u8>),
    /// Null bulk string or null array ($-1\r\n)
    Null,
    /// Array (*2\r\n...)
    Array(Vec<RespValue>),
}

/// Target of a MOVED or ASK reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub slot: u16,
    pub host: String,
    pub port: u16,
    /// ASK redirects are one-shot and need an ASKING prefix
    pub is_ask: bool,
}

impl RespValue {
    /// Parse a MOVED/ASK error, e.g. "MOVED 3999 127.0.0.1:7001"
    pub fn parse_redirect(&self) -> Option<Redirect> {
        let RespValue::Error(e) = self else {
            return None;
        };
        let mut parts = e.split_whitespace();
        let kind = parts.next()?;
        let is_ask = match kind {
            "MOVED" => false,
            "ASK" => true,
            _ => return None,
        };
        let slot: u16 = parts.next()?.parse().ok()?;
        let (host, port) = parts.next()?.rsplit_once(':')?;
        Some(Redirect {
            slot,
            host: host.to_string(),
            port: port.parse().ok()?,
            is_ask,
        })
    }

    /// Convert server error replies into `ProtocolError::ServerError`
    pub fn into_result(self) -> Result<RespValue, ProtocolError> {
        match self {
            RespValue::Error(e) => Err(ProtocolError::ServerError(e)),
            other => Ok(other),
        }
    }

    /// Get as string (for simple string or bulk string)
    pub fn as_str(&self) -> Option<&str> {
        match self {
            RespValue::SimpleString(s) => Some(s),
            RespValue::BulkString(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    /// Get as bytes (for bulk string)
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            RespValue::BulkString(b) => Some(b),
            _ => None,
        }
    }

    /// Take the bulk string payload without copying
    pub fn into_bytes(self) -> Option<Vec<u8>> {
        match self {
            RespValue::BulkString(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            RespValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[RespValue]> {
        match self {
            RespValue::Array(arr) => Some(arr),
            _ => None,
        }
    }

    /// Short description used in error messages (never dumps blobs)
    pub fn describe(&self) -> String {
        match self {
            RespValue::SimpleString(s) => format!("+{}", s),
            RespValue::Error(e) => format!("-{}", e),
            RespValue::Integer(i) => format!(":{}", i),
            RespValue::BulkString(b) => format!("bulk string of {} bytes", b.len()),
            RespValue::Null => "nil".to_string(),
            RespValue::Array(a) => format!("array of {} elements", a.len()),
        }
    }
}

/// RESP encoder with pre-allocated buffer
pub struct RespEncoder {
    buf: Vec<u8>,
}

impl RespEncoder {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Clear buffer for reuse
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Encode a command as a RESP array of bulk strings
    pub fn encode_command<A: AsRef<[u8]>>(&mut self, args: &[A]) {
        // Array header: *<count>\r\n
        self.buf.push(b'*');
        self.write_int(args.len() as i64);
        self.buf.extend_from_slice(b"\r\n");

        // Each argument as bulk string: $<len>\r\n<data>\r\n
        for arg in args {
            let arg = arg.as_ref();
            self.buf.push(b'$');
            self.write_int(arg.len() as i64);
            self.buf.extend_from_slice(b"\r\n");
            self.buf.extend_from_slice(arg);
            self.buf.extend_from_slice(b"\r\n");
        }
    }

    #[inline]
    fn write_int(&mut self, value: i64) {
        let mut buffer = itoa::Buffer::new();
        let s = buffer.format(value);
        self.buf.extend_from_slice(s.as_bytes());
    }
}

/// RESP decoder for streaming reads
pub struct RespDecoder<R> {
    reader: R,
    line_buf: String,
}

impl<R: BufRead> RespDecoder<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_buf: String::with_capacity(256),
        }
    }

    /// Decode next RESP value from stream
    pub fn decode(&mut self) -> io::Result<RespValue> {
        self.line_buf.clear();
        self.reader.read_line(&mut self.line_buf)?;

        if self.line_buf.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "Connection closed",
            ));
        }

        let line = self.line_buf.trim_end_matches(&['\r', '\n'][..]);
        if line.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Empty RESP line",
            ));
        }

        let type_byte = line.as_bytes()[0];
        let content = &line[1..];

        match type_byte {
            b'+' => Ok(RespValue::SimpleString(content.to_string())),
            b'-' => Ok(RespValue::Error(content.to_string())),
            b':' => content
                .parse()
                .map(RespValue::Integer)
                .map_err(|_| invalid_data("Invalid integer")),
            b'$' => {
                let len: i64 = content
                    .parse()
                    .map_err(|_| invalid_data("Invalid bulk string length"))?;
                if len < 0 {
                    return Ok(RespValue::Null);
                }

                let mut data = vec![0u8; len as usize];
                self.reader.read_exact(&mut data)?;

                let mut crlf = [0u8; 2];
                self.reader.read_exact(&mut crlf)?;
                if &crlf != b"\r\n" {
                    return Err(invalid_data("Bulk string not terminated by CRLF"));
                }

                Ok(RespValue::BulkString(data))
            }
            b'*' => {
                let count: i64 = content
                    .parse()
                    .map_err(|_| invalid_data("Invalid array length"))?;
                if count < 0 {
                    return Ok(RespValue::Null);
                }

                // Nested decode calls reuse line_buf, so the line is not borrowed here
                let mut elements = Vec::with_capacity(count.min(1024) as usize);
                for _ in 0..count {
                    elements.push(self.decode()?);
                }
                Ok(RespValue::Array(elements))
            }
            _ => Err(invalid_data(&format!(
                "Invalid RESP type byte: {}",
                type_byte as char
            ))),
        }
    }
}

fn invalid_data(msg: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_encode_binary_command() {
        let mut encoder = RespEncoder::with_capacity(64);
        let blob: &[u8] = &[0x00, 0x0d, 0x0a, 0xff];
        encoder.encode_command(&[b"SET".as_slice(), b"k".as_slice(), blob]);
        assert_eq!(
            encoder.as_bytes(),
            b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$4\r\n\x00\r\n\xff\r\n"
        );
    }

    #[test]
    fn test_encode_owned_args() {
        let mut encoder = RespEncoder::with_capacity(64);
        let args = vec![b"EXISTS".to_vec(), b"key".to_vec()];
        encoder.encode_command(&args);
        assert_eq!(encoder.as_bytes(), b"*2\r\n$6\r\nEXISTS\r\n$3\r\nkey\r\n");
    }

    #[test]
    fn test_decode_simple_string() {
        let mut decoder = RespDecoder::new(Cursor::new(&b"+OK\r\n"[..]));
        assert_eq!(
            decoder.decode().unwrap(),
            RespValue::SimpleString("OK".to_string())
        );
    }

    #[test]
    fn test_decode_integer() {
        let mut decoder = RespDecoder::new(Cursor::new(&b":1000\r\n"[..]));
        assert_eq!(decoder.decode().unwrap(), RespValue::Integer(1000));
    }

    #[test]
    fn test_decode_binary_bulk_string() {
        let data = b"$4\r\n\r\n\x00\xff\r\n";
        let mut decoder = RespDecoder::new(Cursor::new(&data[..]));
        assert_eq!(
            decoder.decode().unwrap(),
            RespValue::BulkString(vec![b'\r', b'\n', 0x00, 0xff])
        );
    }

    #[test]
    fn test_decode_nested_array() {
        let data = b"*2\r\n$5\r\nshape\r\n*2\r\n:10\r\n:5\r\n";
        let mut decoder = RespDecoder::new(Cursor::new(&data[..]));
        assert_eq!(
            decoder.decode().unwrap(),
            RespValue::Array(vec![
                RespValue::BulkString(b"shape".to_vec()),
                RespValue::Array(vec![RespValue::Integer(10), RespValue::Integer(5)]),
            ])
        );
    }

    #[test]
    fn test_decode_null() {
        let mut decoder = RespDecoder::new(Cursor::new(&b"$-1\r\n"[..]));
        assert_eq!(decoder.decode().unwrap(), RespValue::Null);
    }

    #[test]
    fn test_decode_eof() {
        let mut decoder = RespDecoder::new(Cursor::new(&b""[..]));
        let err = decoder.decode().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_parse_moved() {
        let value = RespValue::Error("MOVED 3999 127.0.0.1:7001".to_string());
        let redirect = value.parse_redirect().unwrap();
        assert_eq!(redirect.slot, 3999);
        assert_eq!(redirect.host, "127.0.0.1");
        assert_eq!(redirect.port, 7001);
        assert!(!redirect.is_ask);
    }

    #[test]
    fn test_parse_ask() {
        let value = RespValue::Error("ASK 12 10.0.0.2:6380".to_string());
        assert!(value.parse_redirect().unwrap().is_ask);
        assert!(RespValue::Error("ERR nope".to_string()).parse_redirect().is_none());
    }

    #[test]
    fn test_describe_hides_payload() {
        let value = RespValue::BulkString(vec![0u8; 4096]);
        assert_eq!(value.describe(), "bulk string of 4096 bytes");
    }
}
