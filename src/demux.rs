//! Per-command channel demultiplexing.
//!
//! Once a `runcommand` request has been written, the session loops reading
//! frames from the server until a `Result` frame arrives, routing payload
//! bytes to the caller's output sinks and answering `Input`/`Line` requests
//! from the caller's input providers.

use std::collections::HashMap;
use std::io::{Read, Write};

use byteorder::{BigEndian, ByteOrder};

use crate::error::HgError;
use crate::frame::{self, Frame};
use crate::types::ChannelTag;

/// A destination for payload bytes arriving on a given channel.
pub type OutputSink<'a> = &'a mut dyn Write;

/// Answers an `Input`/`Line` request with the bytes to write back to the
/// server, given the number of bytes the server asked for.
pub type InputProvider<'a> = &'a mut dyn FnMut(u32) -> Vec<u8>;

/// Drives the channel demultiplexer for a single command: reads frames from
/// `r` until a `Result` frame arrives, appending payload bytes to the
/// matching entry of `output_sinks` and answering `Input`/`Line` requests
/// via `input_providers`, writing their response back to `w`.
///
/// Returns the exit code carried by the `Result` frame.
pub fn drive_command<R: Read, W: Write>(
    r: &mut R,
    w: &mut W,
    mut output_sinks: HashMap<ChannelTag, OutputSink<'_>>,
    mut input_providers: HashMap<ChannelTag, InputProvider<'_>>,
) -> Result<i32, HgError> {
    loop {
        match frame::read_frame(r)? {
            Frame::Payload {
                channel: ChannelTag::Result,
                data,
            } => {
                if data.len() < 4 {
                    return Err(HgError::ProtocolError(
                        "result frame shorter than 4 bytes".to_string(),
                    ));
                }
                let code = BigEndian::read_i32(&data[..4]);
                log::debug!("command finished with exit code {code}");
                return Ok(code);
            }
            Frame::Payload { channel, data } => {
                log::trace!("received {} bytes on {channel:?}", data.len());
                match output_sinks.get_mut(&channel) {
                    Some(sink) => sink.write_all(&data)?,
                    None => log::warn!("discarding {} bytes on unmapped {channel:?}", data.len()),
                }
            }
            Frame::InputRequest { channel, requested } => {
                log::trace!("server requests {requested} bytes on {channel:?}");
                let response = match input_providers.get_mut(&channel) {
                    Some(provider) => provider(requested),
                    None => {
                        log::warn!("no input provider registered for {channel:?}, sending empty block");
                        Vec::new()
                    }
                };
                frame::write_input_response(w, &response)?;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    fn frame_bytes(tag: u8, payload: &[u8]) -> Vec<u8> {
        let mut buf = vec![tag];
        buf.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        buf.extend_from_slice(payload);
        buf
    }

    fn input_request_bytes(tag: u8, requested: u32) -> Vec<u8> {
        let mut buf = vec![tag];
        buf.extend_from_slice(&requested.to_be_bytes());
        buf
    }

    #[test]
    fn routes_output_and_error_then_stops_at_result() {
        let mut input = Vec::new();
        input.extend(frame_bytes(b'o', b"M file1.txt\n"));
        input.extend(frame_bytes(b'e', b"warning\n"));
        input.extend(frame_bytes(b'r', &0i32.to_be_bytes()));

        let mut reader = Cursor::new(input);
        let mut writer = Vec::new();
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();

        let mut sinks: HashMap<ChannelTag, OutputSink<'_>> = HashMap::new();
        sinks.insert(ChannelTag::Output, &mut stdout);
        sinks.insert(ChannelTag::Error, &mut stderr);

        let code =
            drive_command(&mut reader, &mut writer, sinks, HashMap::new()).unwrap();

        assert_eq!(code, 0);
        assert_eq!(stdout, b"M file1.txt\n");
        assert_eq!(stderr, b"warning\n");
    }

    #[test]
    fn discards_unmapped_channel_output() {
        let mut input = Vec::new();
        input.extend(frame_bytes(b'd', b"debug noise"));
        input.extend(frame_bytes(b'r', &0i32.to_be_bytes()));

        let mut reader = Cursor::new(input);
        let mut writer = Vec::new();

        let code = drive_command(&mut reader, &mut writer, HashMap::new(), HashMap::new())
            .unwrap();
        assert_eq!(code, 0);
    }

    #[test]
    fn answers_input_request_by_writing_provider_response() {
        let mut input = Vec::new();
        input.extend(input_request_bytes(b'L', 1));
        input.extend(frame_bytes(b'r', &0i32.to_be_bytes()));

        let mut reader = Cursor::new(input);
        let mut writer = Vec::new();

        let mut provider = |requested: u32| {
            assert_eq!(requested, 1);
            b"y\n".to_vec()
        };
        let mut providers: HashMap<ChannelTag, InputProvider<'_>> = HashMap::new();
        providers.insert(ChannelTag::Line, &mut provider);

        let code = drive_command(&mut reader, &mut writer, HashMap::new(), providers).unwrap();

        assert_eq!(code, 0);
        // A 4-byte length prefix followed by the provider's bytes.
        assert_eq!(writer, [0, 0, 0, 2, b'y', b'\n']);
    }

    #[test]
    fn missing_provider_sends_empty_block() {
        let mut input = Vec::new();
        input.extend(input_request_bytes(b'I', 4));
        input.extend(frame_bytes(b'r', &0i32.to_be_bytes()));

        let mut reader = Cursor::new(input);
        let mut writer = Vec::new();

        let code = drive_command(&mut reader, &mut writer, HashMap::new(), HashMap::new())
            .unwrap();

        assert_eq!(code, 0);
        assert_eq!(writer, [0, 0, 0, 0]);
    }

    #[test]
    fn negative_exit_codes_round_trip() {
        let mut input = Vec::new();
        input.extend(frame_bytes(b'r', &(-1i32).to_be_bytes()));
        let mut reader = Cursor::new(input);
        let mut writer = Vec::new();

        let code = drive_command(&mut reader, &mut writer, HashMap::new(), HashMap::new())
            .unwrap();
        assert_eq!(code, -1);
    }
}
