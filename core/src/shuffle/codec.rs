//! Fixed-size wire frames exchanged between shuffle peers.
//!
//! Every frame is one control byte followed by a 100-byte payload. DATA
//! frames carry a record (key then value); the END frame marks the end of a
//! sender's stream and carries a zero-filled payload.

use bytes::{Buf, BufMut, BytesMut};
use meshsort_common::{RECORD_LEN, Record, Result, SortError};
use tokio_util::codec::{Decoder, Encoder};

/// Size of one frame on the wire.
pub const FRAME_LEN: usize = 1 + RECORD_LEN;

const CONTROL_DATA: u8 = 0;
const CONTROL_END: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Data,
    End,
}

impl Control {
    fn as_byte(self) -> u8 {
        match self {
            Control::Data => CONTROL_DATA,
            Control::End => CONTROL_END,
        }
    }

    fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            CONTROL_DATA => Ok(Control::Data),
            CONTROL_END => Ok(Control::End),
            other => Err(SortError::framing_error(format!(
                "unknown control byte {:#04x}",
                other
            ))),
        }
    }
}

/// A decoded wire unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame {
    Data(Record),
    End,
}

impl Frame {
    pub fn control(&self) -> Control {
        match self {
            Frame::Data(_) => Control::Data,
            Frame::End => Control::End,
        }
    }

    pub fn record(&self) -> Option<&Record> {
        match self {
            Frame::Data(record) => Some(record),
            Frame::End => None,
        }
    }
}

pub fn encode_data(record: &Record) -> [u8; FRAME_LEN] {
    let mut frame = [0u8; FRAME_LEN];
    frame[0] = Control::Data.as_byte();
    record.write_into(&mut frame[1..]);
    frame
}

pub fn encode_end() -> [u8; FRAME_LEN] {
    let mut frame = [0u8; FRAME_LEN];
    frame[0] = Control::End.as_byte();
    frame
}

/// Decode exactly one frame; `buffer` must hold `FRAME_LEN` bytes.
pub fn decode(buffer: &[u8]) -> Result<Frame> {
    if buffer.len() != FRAME_LEN {
        return Err(SortError::framing_error(format!(
            "frame must be {} bytes, got {}",
            FRAME_LEN,
            buffer.len()
        )));
    }
    match Control::from_byte(buffer[0])? {
        Control::End => Ok(Frame::End),
        Control::Data => Record::try_from(&buffer[1..])
            .map(Frame::Data)
            .map_err(|e| SortError::framing_error_with_source("malformed DATA payload", e)),
    }
}

/// Stream codec that buffers partial reads until a whole frame is available.
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameCodec;

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = SortError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        if src.len() < FRAME_LEN {
            src.reserve(FRAME_LEN - src.len());
            return Ok(None);
        }
        let frame = decode(&src[..FRAME_LEN])?;
        src.advance(FRAME_LEN);
        Ok(Some(frame))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        match Decoder::decode(self, src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() => Ok(None),
            None => Err(SortError::framing_error(format!(
                "stream closed after {} of {} frame bytes",
                src.len(),
                FRAME_LEN
            ))),
        }
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = SortError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<()> {
        dst.reserve(FRAME_LEN);
        dst.put_u8(frame.control().as_byte());
        match frame {
            Frame::Data(record) => {
                dst.put_slice(record.key());
                dst.put_slice(record.value());
            }
            Frame::End => dst.put_bytes(0, RECORD_LEN),
        }
        Ok(())
    }
}
