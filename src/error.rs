use std::io;

use thiserror::Error;

/// Everything that can go wrong outside the filter itself.
///
/// The filter never fails; errors come from settings and from the audio socket.
#[derive(Debug, Error)]
pub enum Error {
    /// Reading or writing the stream failed, or it ended in the middle of a packet.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The peer sent a packet type we don't know.
    #[error("unknown packet opcode {0}")]
    UnknownOpcode(u8),

    /// A data packet announced a negative or unreasonably large number of samples.
    #[error("data packet length {0} is out of range")]
    BadPacketLength(i64),

    /// A format packet announced a stream we can't process.
    #[error("unsupported stream format: {channels} channels at {sample_rate} Hz")]
    InvalidFormat {
        /// The announced channel count.
        channels: u8,
        /// The announced sample rate.
        sample_rate: i32,
    },

    /// A setting had a value that isn't a usable number.
    #[error("invalid value {value:?} for setting `{key}`")]
    InvalidSetting {
        /// The name of the setting.
        key: &'static str,
        /// The offending value, as it was given.
        value: String,
    },

    /// The settings file isn't valid TOML, or has the wrong types.
    #[error("malformed settings file: {0}")]
    Config(#[from] toml::de::Error),
}

/// Shorthand for results carrying an [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
