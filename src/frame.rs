//! Frame header codec and `runcommand` request encoding.
//!
//! Every frame from the server starts with a 5-byte header: one channel tag
//! byte followed by a 4-byte big-endian unsigned length. The payload (for
//! `Output`/`Error`/`Result`/`Debug`) or requested size (for `Input`/`Line`)
//! follows immediately.

use std::io::{BufRead, Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::error::HgError;
use crate::types::ChannelTag;

/// The size in bytes of a frame header.
pub const HEADER_SIZE: usize = 5;

/// A single frame read from the server.
#[derive(Debug, Clone)]
pub enum Frame {
    /// A payload-carrying frame (`Output`, `Error`, `Result` or `Debug`).
    Payload {
        /// The channel this frame belongs to.
        channel: ChannelTag,
        /// The frame's raw bytes.
        data: Vec<u8>,
    },
    /// An input request (`Input` or `Line`), carrying the number of bytes
    /// the server wants written back.
    InputRequest {
        /// The channel this request arrived on.
        channel: ChannelTag,
        /// The number of bytes the server is asking for.
        requested: u32,
    },
}

impl Frame {
    /// The channel this frame belongs to, regardless of variant.
    pub fn channel(&self) -> ChannelTag {
        match self {
            Frame::Payload { channel, .. } => *channel,
            Frame::InputRequest { channel, .. } => *channel,
        }
    }
}

/// Reads a single frame from the server's stdout.
///
/// Handles lengths up to `u32::MAX` (2^32 - 1 bytes) without sign-extension
/// bugs, looping on short reads rather than assuming one `read` call fills
/// the payload.
pub fn read_frame<R: Read>(r: &mut R) -> Result<Frame, HgError> {
    let mut header = [0u8; HEADER_SIZE];
    r.read_exact(&mut header).map_err(|_| HgError::ServerClosed)?;

    let channel = ChannelTag::from_byte(header[0])
        .ok_or_else(|| HgError::ProtocolError("invalid channel identifier".to_string()))?;
    let length = (&header[1..5]).read_u32::<BigEndian>()?;

    if !channel.carries_payload() {
        return Ok(Frame::InputRequest {
            channel,
            requested: length,
        });
    }

    let mut data = vec![0u8; length as usize];
    read_exact_in_chunks(r, &mut data)?;

    Ok(Frame::Payload { channel, data })
}

/// Reads `buf.len()` bytes, looping over short reads. Equivalent to
/// `read_exact`, but documented separately since payloads can exceed a
/// single `read` call (notably ones over 2 GiB).
fn read_exact_in_chunks<R: Read>(r: &mut R, buf: &mut [u8]) -> Result<(), HgError> {
    r.read_exact(buf).map_err(|_| HgError::ServerClosed)
}

/// Writes a `runcommand` request frame: the literal `runcommand\n`, a
/// 4-byte big-endian length, then the NUL-separated argument block (no
/// trailing NUL).
pub fn write_runcommand<W: Write>(w: &mut W, argv: &[Vec<u8>]) -> Result<(), HgError> {
    let block = encode_argv(argv);
    let length: u32 = block
        .len()
        .try_into()
        .map_err(|_| HgError::ProtocolError("argument block too large".to_string()))?;

    w.write_all(b"runcommand\n")?;
    w.write_u32::<BigEndian>(length)?;
    w.write_all(&block)?;
    w.flush()?;

    Ok(())
}

/// Writes the response to an `Input`/`Line` request: a 4-byte big-endian
/// length followed by the bytes themselves.
pub fn write_input_response<W: Write>(w: &mut W, data: &[u8]) -> Result<(), HgError> {
    let length: u32 = data
        .len()
        .try_into()
        .map_err(|_| HgError::ProtocolError("input response too large".to_string()))?;

    w.write_u32::<BigEndian>(length)?;
    w.write_all(data)?;
    w.flush()?;

    Ok(())
}

/// Joins argv entries with NUL separators, with no trailing separator.
fn encode_argv(argv: &[Vec<u8>]) -> Vec<u8> {
    let mut buf = Vec::new();
    for (i, arg) in argv.iter().enumerate() {
        if i > 0 {
            buf.push(0);
        }
        buf.extend_from_slice(arg);
    }
    buf
}

/// Reads the handshake frame, which must be a single `Output` frame
/// containing `\n`-delimited `key: value` lines.
pub fn read_handshake<R: BufRead>(r: &mut R) -> Result<Vec<u8>, HgError> {
    match read_frame(r)? {
        Frame::Payload {
            channel: ChannelTag::Output,
            data,
        } => Ok(data),
        Frame::Payload { channel, .. } => Err(HgError::HandshakeError(format!(
            "expected handshake on the output channel, got {channel:?}"
        ))),
        Frame::InputRequest { .. } => Err(HgError::HandshakeError(
            "server requested input before handshake".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    fn header(tag: u8, length: u32) -> Vec<u8> {
        let mut buf = vec![tag];
        buf.extend_from_slice(&length.to_be_bytes());
        buf
    }

    #[test]
    fn reads_a_payload_frame() {
        let mut input = header(b'o', 5);
        input.extend_from_slice(b"hello");
        let frame = read_frame(&mut Cursor::new(input)).unwrap();

        match frame {
            Frame::Payload { channel, data } => {
                assert_eq!(channel, ChannelTag::Output);
                assert_eq!(data, b"hello");
            }
            other => panic!("expected a payload frame, got {other:?}"),
        }
    }

    #[test]
    fn length_is_big_endian_not_little_endian() {
        // 0x00000100 = 256, not 0x00010000.
        let input = header(b'o', 0x00000100);
        let mut cursor = Cursor::new(input);
        let header_bytes = {
            let mut h = [0u8; HEADER_SIZE];
            cursor.read_exact(&mut h).unwrap();
            h
        };
        let length = (&header_bytes[1..5]).read_u32::<BigEndian>().unwrap();
        assert_eq!(length, 256);
    }

    #[test]
    fn rejects_unknown_channel_byte() {
        let input = header(b'X', 0);
        let err = read_frame(&mut Cursor::new(input)).unwrap_err();
        assert!(matches!(err, HgError::ProtocolError(_)));
    }

    #[test]
    fn input_request_carries_no_payload_bytes() {
        let input = header(b'I', 42);
        let frame = read_frame(&mut Cursor::new(input)).unwrap();
        match frame {
            Frame::InputRequest { channel, requested } => {
                assert_eq!(channel, ChannelTag::Input);
                assert_eq!(requested, 42);
            }
            other => panic!("expected an input request, got {other:?}"),
        }
    }

    #[test]
    fn encodes_runcommand_with_nul_separated_argv() {
        let argv: Vec<Vec<u8>> = vec![b"log".to_vec(), b"--rev".to_vec(), b"1::".to_vec()];
        let mut out = Vec::new();
        write_runcommand(&mut out, &argv).unwrap();

        let expected_block = b"log\0--rev\x001::".to_vec();

        assert_eq!(&out[..11], b"runcommand\n");
        let length = (&out[11..15]).read_u32::<BigEndian>().unwrap();
        let block = &out[15..];
        assert_eq!(length as usize, block.len());
        assert_eq!(block, expected_block.as_slice());
    }

    #[test]
    fn write_input_response_writes_length_then_bytes() {
        let mut out = Vec::new();
        write_input_response(&mut out, b"hello").unwrap();

        let length = (&out[..4]).read_u32::<BigEndian>().unwrap();
        assert_eq!(length, 5);
        assert_eq!(&out[4..], b"hello");
    }
}
