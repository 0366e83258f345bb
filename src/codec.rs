//! OSC 1.0 message framing
//!
//! ```text
//! +----------------+------------------+----------------+
//! | address        | type tags        | arguments      |
//! | "/path\0" pad4 | ",ifsTF\0" pad4  | big-endian     |
//! +----------------+------------------+----------------+
//! ```
//!
//! Argument payloads:
//! - `i`: 4 bytes, `h`: 8 bytes, `f`: 4 bytes, `d`: 8 bytes
//! - `s`: NUL-terminated UTF-8, padded to a multiple of 4
//! - `T` / `F`: no payload

use crate::value::OscArg;
use crate::OscError;
use bytes::{BufMut, Bytes, BytesMut};

/// A complete OSC message
#[derive(Debug, Clone, PartialEq)]
pub struct OscMessage {
    pub path: String,
    pub args: Vec<OscArg>,
}

impl OscMessage {
    pub fn new(path: impl Into<String>, args: Vec<OscArg>) -> Self {
        Self {
            path: path.into(),
            args,
        }
    }

    /// Type tag string, e.g. `,ifs`
    pub fn type_tags(&self) -> String {
        std::iter::once(',')
            .chain(self.args.iter().map(OscArg::type_tag))
            .collect()
    }

    /// Encode into a datagram
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(padded_len(self.path.len()) + 8 + self.args.len() * 8);

        put_padded_str(&mut buf, &self.path);
        put_padded_str(&mut buf, &self.type_tags());

        for arg in &self.args {
            match arg {
                OscArg::Int(v) => match i32::try_from(*v) {
                    Ok(v) => buf.put_i32(v),
                    Err(_) => buf.put_i64(*v),
                },
                // OSC floats are single precision
                OscArg::Float(v) => buf.put_f32(*v as f32),
                OscArg::String(s) => put_padded_str(&mut buf, s),
                OscArg::Bool(_) => {}
            }
        }

        buf.freeze()
    }

    /// Decode a datagram
    ///
    /// Accepts `d` (double) in addition to the tags [`encode`](Self::encode)
    /// produces.
    pub fn decode(packet: &[u8]) -> Result<Self, OscError> {
        let mut reader = Reader { packet, offset: 0 };

        let path = reader.read_str()?;
        if !path.starts_with('/') {
            return Err(OscError::Decode(format!("Invalid address: {}", path)));
        }

        let tags = reader.read_str()?;
        let tags = tags
            .strip_prefix(',')
            .ok_or_else(|| OscError::Decode("Missing type tag string".to_string()))?;

        let mut args = Vec::with_capacity(tags.len());
        for tag in tags.chars() {
            let arg = match tag {
                'i' => OscArg::Int(i64::from(i32::from_be_bytes(reader.read_array()?))),
                'h' => OscArg::Int(i64::from_be_bytes(reader.read_array()?)),
                'f' => OscArg::Float(f64::from(f32::from_be_bytes(reader.read_array()?))),
                'd' => OscArg::Float(f64::from_be_bytes(reader.read_array()?)),
                's' => OscArg::String(reader.read_str()?),
                'T' => OscArg::Bool(true),
                'F' => OscArg::Bool(false),
                other => {
                    return Err(OscError::Decode(format!("Unsupported type tag: '{}'", other)))
                }
            };
            args.push(arg);
        }

        Ok(Self { path, args })
    }
}

/// Length of a string once NUL-terminated and padded to 4 bytes
fn padded_len(len: usize) -> usize {
    (len + 4) & !3
}

fn put_padded_str(buf: &mut BytesMut, s: &str) {
    buf.put_slice(s.as_bytes());
    let padding = padded_len(s.len()) - s.len();
    buf.put_bytes(0, padding);
}

struct Reader<'a> {
    packet: &'a [u8],
    offset: usize,
}

impl Reader<'_> {
    fn read_str(&mut self) -> Result<String, OscError> {
        let rest = &self.packet[self.offset..];
        let nul = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| OscError::Decode("Unterminated string".to_string()))?;
        let end = padded_len(nul);
        if end > rest.len() {
            return Err(OscError::Decode("String padding truncated".to_string()));
        }

        let s = std::str::from_utf8(&rest[..nul])
            .map_err(|e| OscError::Decode(format!("Invalid UTF-8: {}", e)))?
            .to_string();
        self.offset += end;
        Ok(s)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], OscError> {
        let bytes = self
            .packet
            .get(self.offset..self.offset + N)
            .ok_or_else(|| OscError::Decode(format!("Expected {} more bytes", N)))?;
        self.offset += N;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }
}
