//! The framing of the audio socket.
//!
//! A host application streams audio to a DSP plugin over a local socket and reads the
//! processed audio back on the same connection. Every packet starts with a one-byte opcode:
//!
//! ```text
//! FORMAT:  0x01 | channels: u8 | sample_rate: i32 (big endian)
//! DATA:    0x02 | num_samples: i32 (big endian) | num_samples * i16 (little endian)
//! ```
//!
//! `num_samples` counts individual samples, not frames: a stereo packet of 512 frames has
//! `num_samples == 1024`.

use std::io::{self, Read, Write};

use crate::{Error, Result};

/// Announces the channel count and sample rate of the stream.
pub const OPCODE_FORMAT: u8 = 1;
/// Carries interleaved audio.
pub const OPCODE_DATA: u8 = 2;
/// The largest number of samples a data packet may carry.
pub const MAX_SAMPLES_PER_PACKET: usize = 262_144;

/// One packet on the audio socket.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Packet {
    /// The layout of the audio that follows.
    Format {
        /// The number of interleaved channels.
        channels: u8,
        /// Frames per second.
        sample_rate: i32,
    },
    /// Interleaved 16-bit samples.
    Data(Vec<i16>),
}

// Like `Read::read_exact`, except that EOF before the first byte is not an error.
fn read_first<R: Read>(r: &mut R, buf: &mut [u8]) -> io::Result<bool> {
    loop {
        match r.read(buf) {
            Ok(0) => return Ok(false),
            Ok(_) => return Ok(true),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}

impl Packet {
    /// Reads the next packet, returning `None` if the stream ended cleanly between packets.
    pub fn read_from<R: Read>(r: &mut R) -> Result<Option<Packet>> {
        let mut opcode = [0u8; 1];
        if !read_first(r, &mut opcode)? {
            return Ok(None);
        }

        match opcode[0] {
            OPCODE_FORMAT => {
                let mut buf = [0u8; 5];
                r.read_exact(&mut buf)?;
                Ok(Some(Packet::Format {
                    channels: buf[0],
                    sample_rate: i32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]),
                }))
            }
            OPCODE_DATA => {
                let mut len = [0u8; 4];
                r.read_exact(&mut len)?;
                let len = i32::from_be_bytes(len);
                if len < 0 || len as usize > MAX_SAMPLES_PER_PACKET {
                    return Err(Error::BadPacketLength(len as i64));
                }

                let mut bytes = vec![0u8; len as usize * 2];
                r.read_exact(&mut bytes)?;
                let samples = bytes
                    .chunks_exact(2)
                    .map(|b| i16::from_le_bytes([b[0], b[1]]))
                    .collect();
                Ok(Some(Packet::Data(samples)))
            }
            op => Err(Error::UnknownOpcode(op)),
        }
    }

    /// The number of bytes [`Packet::write_to`] will write.
    pub fn encoded_len(&self) -> usize {
        match self {
            Packet::Format { .. } => 6,
            Packet::Data(samples) if samples.is_empty() => 0,
            Packet::Data(samples) => 5 + 2 * samples.len(),
        }
    }

    /// Writes this packet. Empty data packets are skipped entirely.
    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        match self {
            Packet::Format {
                channels,
                sample_rate,
            } => {
                buf.push(OPCODE_FORMAT);
                buf.push(*channels);
                buf.extend_from_slice(&sample_rate.to_be_bytes());
            }
            Packet::Data(samples) => {
                if samples.is_empty() {
                    return Ok(());
                }
                if samples.len() > MAX_SAMPLES_PER_PACKET {
                    return Err(Error::BadPacketLength(samples.len() as i64));
                }
                buf.push(OPCODE_DATA);
                buf.extend_from_slice(&(samples.len() as i32).to_be_bytes());
                for s in samples {
                    buf.extend_from_slice(&s.to_le_bytes());
                }
            }
        }
        w.write_all(&buf)?;
        Ok(())
    }
}
