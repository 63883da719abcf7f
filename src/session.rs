use std::io::{Read, Write};

use crate::socket::Packet;
use crate::{BassBoost, Result};

/// Counters for a finished [`Session`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Packets read, of any kind.
    pub packets: u64,
    /// Audio samples boosted (counting each channel separately).
    pub samples: u64,
}

/// Runs an audio socket connection through a [`BassBoost`].
///
/// Data packets are boosted and sent back in the same order. Format packets reconfigure the
/// boost and are echoed, so that whatever reads our output learns the format too.
#[derive(Debug)]
pub struct Session {
    boost: BassBoost,
}

impl Session {
    /// Creates a session around `boost`.
    pub fn new(boost: BassBoost) -> Session {
        Session { boost }
    }

    /// The bass boost, as the stream left it.
    pub fn boost(&self) -> &BassBoost {
        &self.boost
    }

    /// Gives the bass boost back, for reuse with another connection.
    pub fn into_boost(self) -> BassBoost {
        self.boost
    }

    /// Processes packets from `reader` until it ends, writing the results to `writer`.
    ///
    /// The writer is flushed after every packet.
    pub fn run<R: Read, W: Write>(
        &mut self,
        mut reader: R,
        mut writer: W,
    ) -> Result<SessionStats> {
        let mut stats = SessionStats::default();
        while let Some(packet) = Packet::read_from(&mut reader)? {
            stats.packets += 1;
            match packet {
                Packet::Format {
                    channels,
                    sample_rate,
                } => {
                    log::info!("stream format: {} channels at {} Hz", channels, sample_rate);
                    self.boost.set_format(channels, sample_rate)?;
                    Packet::Format {
                        channels,
                        sample_rate,
                    }
                    .write_to(&mut writer)?;
                }
                Packet::Data(mut samples) => {
                    log::trace!("boosting {} samples", samples.len());
                    self.boost.process_interleaved(&mut samples);
                    stats.samples += samples.len() as u64;
                    Packet::Data(samples).write_to(&mut writer)?;
                }
            }
            writer.flush()?;
        }
        log::info!(
            "stream ended after {} packets ({} samples)",
            stats.packets,
            stats.samples
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BoostParams, Error, Settings};
    use std::io::Cursor;
    use std::sync::Arc;

    fn encode(packets: &[Packet]) -> Vec<u8> {
        let mut buf = Vec::new();
        for p in packets {
            p.write_to(&mut buf).unwrap();
        }
        buf
    }

    fn decode(bytes: Vec<u8>) -> Vec<Packet> {
        let mut r = Cursor::new(bytes);
        let mut ret = Vec::new();
        while let Some(p) = Packet::read_from(&mut r).unwrap() {
            ret.push(p);
        }
        ret
    }

    fn params() -> Arc<BoostParams> {
        Arc::new(BoostParams::new(Settings {
            center_frequency: 200.0,
            gain: 666.0,
        }))
    }

    #[test]
    fn boosts_and_echoes() {
        let format = Packet::Format {
            channels: 2,
            sample_rate: 48_000,
        };
        let chunk: Vec<i16> = (0..512).map(|i| if i % 2 == 0 { 1000 } else { 3000 }).collect();
        let input = encode(&[
            format.clone(),
            Packet::Data(chunk.clone()),
            Packet::Data(chunk.clone()),
        ]);

        let mut session = Session::new(BassBoost::new(params()));
        let mut output = Vec::new();
        let stats = session.run(Cursor::new(input), &mut output).unwrap();
        assert_eq!(
            stats,
            SessionStats {
                packets: 3,
                samples: 1024
            }
        );
        assert_eq!(session.boost().sample_rate(), 48_000.0);

        let mut reference = BassBoost::new(params());
        reference.set_format(2, 48_000).unwrap();
        let mut expected = chunk.clone();
        reference.process_interleaved(&mut expected);

        let out = decode(output);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0], format);
        assert_eq!(out[1], Packet::Data(expected));
        match &out[2] {
            Packet::Data(samples) => {
                // Both channels get the same boost.
                for frame in samples.chunks_exact(2) {
                    assert_eq!(frame[0] as i32 - 1000, frame[1] as i32 - 3000);
                }
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn empty_stream() {
        let mut session = Session::new(BassBoost::new(params()));
        let mut output = Vec::new();
        let stats = session.run(Cursor::new(Vec::new()), &mut output).unwrap();
        assert_eq!(stats, SessionStats::default());
        assert!(output.is_empty());
    }

    #[test]
    fn protocol_errors_end_the_session() {
        let mut input = encode(&[Packet::Data(vec![5; 8])]);
        input.push(42);
        let mut session = Session::new(BassBoost::new(params()));
        let mut output = Vec::new();
        assert!(matches!(
            session.run(Cursor::new(input), &mut output),
            Err(Error::UnknownOpcode(42))
        ));
        // The packet before the bad one still went out.
        assert_eq!(decode(output).len(), 1);

        let input = encode(&[Packet::Format {
            channels: 0,
            sample_rate: 44_100,
        }]);
        let mut session = Session::new(BassBoost::new(params()));
        assert!(matches!(
            session.run(Cursor::new(input), Vec::new()),
            Err(Error::InvalidFormat { .. })
        ));
    }
}
