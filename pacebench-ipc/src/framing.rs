//! Length-Prefixed Frame Encoding
//!
//! Message boundaries over the byte-stream pipes between master and worker.
//!
//! ```text
//! +----------------+------------------+
//! | length (4 LE)  | rkyv payload     |
//! +----------------+------------------+
//! ```

use rkyv::ser::serializers::AllocSerializer;
use rkyv::validation::validators::DefaultValidator;
use rkyv::{AlignedVec, Archive, CheckBytes, Deserialize, Infallible, Serialize};
use std::io::{BufReader, BufWriter, Read, Write};
use thiserror::Error;

/// Largest accepted payload. Lifecycle events are small; anything bigger is
/// a corrupted stream.
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

const LEN_PREFIX: usize = 4;

/// Errors that can occur during frame encoding/decoding
#[derive(Debug, Error)]
pub enum FrameError {
    /// Underlying read or write failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Message could not be serialized
    #[error("encode error: {0}")]
    Encode(String),

    /// Payload failed validation or deserialization
    #[error("decode error: {0}")]
    Decode(String),

    /// Length prefix above [`MAX_FRAME_SIZE`]
    #[error("frame too large: {size} bytes (max {max} bytes)")]
    TooLarge {
        /// Announced payload size
        size: usize,
        /// Accepted maximum
        max: usize,
    },

    /// Zero-length payload
    #[error("empty frame")]
    Empty,

    /// Peer closed the channel between frames
    #[error("end of stream")]
    EndOfStream,
}

impl FrameError {
    /// `true` when the peer closed the channel cleanly between frames
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, FrameError::EndOfStream)
    }
}

/// Serialize a message into a complete frame (prefix included)
pub fn encode<T>(message: &T) -> Result<Vec<u8>, FrameError>
where
    T: Serialize<AllocSerializer<256>>,
{
    let payload =
        rkyv::to_bytes::<_, 256>(message).map_err(|e| FrameError::Encode(e.to_string()))?;
    check_len(payload.len())?;

    let mut frame = Vec::with_capacity(LEN_PREFIX + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Validate and deserialize one payload (prefix excluded)
pub fn decode<T>(payload: &[u8]) -> Result<T, FrameError>
where
    T: Archive,
    T::Archived: for<'a> CheckBytes<DefaultValidator<'a>> + Deserialize<T, Infallible>,
{
    if payload.is_empty() {
        return Err(FrameError::Empty);
    }

    // rkyv requires an aligned buffer
    let mut aligned = AlignedVec::with_capacity(payload.len());
    aligned.extend_from_slice(payload);

    let archived = rkyv::check_archived_root::<T>(&aligned)
        .map_err(|e| FrameError::Decode(e.to_string()))?;
    archived
        .deserialize(&mut Infallible)
        .map_err(|_| FrameError::Decode("deserialization failed".to_string()))
}

fn check_len(len: usize) -> Result<(), FrameError> {
    if len > MAX_FRAME_SIZE {
        return Err(FrameError::TooLarge {
            size: len,
            max: MAX_FRAME_SIZE,
        });
    }
    Ok(())
}

/// Sending half of a channel
pub struct FrameWriter<W: Write> {
    writer: BufWriter<W>,
}

impl<W: Write> FrameWriter<W> {
    /// Wrap a byte sink
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::with_capacity(16 * 1024, writer),
        }
    }

    /// Write one message and flush it to the peer
    pub fn send<T>(&mut self, message: &T) -> Result<(), FrameError>
    where
        T: Serialize<AllocSerializer<256>>,
    {
        let frame = encode(message)?;
        self.writer.write_all(&frame)?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Receiving half of a channel
pub struct FrameReader<R: Read> {
    reader: BufReader<R>,
    payload: Vec<u8>,
}

impl<R: Read> FrameReader<R> {
    /// Wrap a byte source
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::with_capacity(16 * 1024, reader),
            payload: Vec::new(),
        }
    }

    /// Block until the next message arrives.
    ///
    /// Returns [`FrameError::EndOfStream`] when the peer closed the channel
    /// on a frame boundary.
    pub fn recv<T>(&mut self) -> Result<T, FrameError>
    where
        T: Archive,
        T::Archived: for<'a> CheckBytes<DefaultValidator<'a>> + Deserialize<T, Infallible>,
    {
        let mut prefix = [0u8; LEN_PREFIX];
        match self.reader.read_exact(&mut prefix) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Err(FrameError::EndOfStream);
            }
            Err(e) => return Err(FrameError::Io(e)),
        }

        let len = u32::from_le_bytes(prefix) as usize;
        check_len(len)?;

        self.payload.resize(len, 0);
        self.reader.read_exact(&mut self.payload)?;
        decode(&self.payload)
    }

    /// `true` when a complete or partial frame is already buffered, so the
    /// next `recv` will not wait on the underlying descriptor first
    pub fn has_buffered_data(&self) -> bool {
        !self.reader.buffer().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LifecycleEvent, MasterMessage, TestInit, TestOptions, WorkerMessage};
    use pacebench_stats::Stats;
    use std::io::Cursor;

    #[test]
    fn test_event_stream_order() {
        let events = vec![
            WorkerMessage::Event(LifecycleEvent::TestStart {
                name: "sort".to_string(),
                location: vec![0, 2],
            }),
            WorkerMessage::Event(LifecycleEvent::MeasureProgress { percent: 0.25 }),
            WorkerMessage::Event(LifecycleEvent::TestEnd {
                name: "sort".to_string(),
                duration: Stats {
                    size: 3,
                    mean: 2.0,
                    ..Default::default()
                },
                memory: Stats::default(),
            }),
        ];

        let mut buffer = Vec::new();
        {
            let mut writer = FrameWriter::new(&mut buffer);
            for event in &events {
                writer.send(event).unwrap();
            }
        }

        let mut reader = FrameReader::new(Cursor::new(buffer));
        for expected in &events {
            let decoded: WorkerMessage = reader.recv().unwrap();
            assert_eq!(expected, &decoded);
        }
        let tail: Result<WorkerMessage, _> = reader.recv();
        assert!(tail.unwrap_err().is_end_of_stream());
    }

    #[test]
    fn test_init_message() {
        let init = MasterMessage::Init(TestInit {
            suite: "collections".to_string(),
            setups: vec!["env".to_string()],
            location: vec![1, 0, 3],
            options: TestOptions::new().with_target_rme(0.02),
        });

        let frame = encode(&init).unwrap();
        let decoded: MasterMessage = decode(&frame[LEN_PREFIX..]).unwrap();
        assert_eq!(decoded, init);
    }

    #[test]
    fn test_oversized_prefix_rejected() {
        let mut buffer = ((MAX_FRAME_SIZE + 1) as u32).to_le_bytes().to_vec();
        buffer.extend_from_slice(&[0u8; 16]);

        let mut reader = FrameReader::new(Cursor::new(buffer));
        let result: Result<MasterMessage, _> = reader.recv();
        assert!(matches!(result, Err(FrameError::TooLarge { .. })));
    }

    #[test]
    fn test_garbage_payload_rejected() {
        let result: Result<MasterMessage, _> = decode(&[0xff; 3]);
        assert!(matches!(result, Err(FrameError::Decode(_))));
    }

    #[test]
    fn test_truncated_payload_is_io_error() {
        let frame = encode(&MasterMessage::Shutdown).unwrap();
        let truncated = frame[..frame.len() - 1].to_vec();

        let mut reader = FrameReader::new(Cursor::new(truncated));
        let result: Result<MasterMessage, _> = reader.recv();
        assert!(matches!(result, Err(FrameError::Io(_))));
    }
}
