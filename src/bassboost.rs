use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, SystemTime};

use anyhow::{anyhow, bail, Context, Error};
use clap::{arg, crate_version, value_parser, ArgMatches, Command};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use bassboost::{BassBoost, BoostParams, Session, Settings, DEFAULT_SAMPLE_RATE};

/// Samples per processing chunk, before rounding down to whole frames.
const CHUNK_SAMPLES: usize = 16384;
const SETTINGS_POLL_INTERVAL: Duration = Duration::from_millis(500);

type SampleIter = Box<dyn Iterator<Item = Result<i16, Error>>>;

struct RawSampleIter<R: Read> {
    bytes: std::io::Bytes<R>,
}

impl<R: Read> Iterator for RawSampleIter<R> {
    type Item = Result<i16, Error>;

    fn next(&mut self) -> Option<Result<i16, Error>> {
        match self.bytes.next() {
            None => None,
            Some(Err(e)) => Some(Err(e.into())),
            Some(Ok(a)) => match self.bytes.next() {
                None => Some(Err(anyhow!(
                    "Unexpected end of input (expected an even number of bytes)"
                ))),
                Some(Err(e)) => Some(Err(e.into())),
                Some(Ok(b)) => Some(Ok(i16::from_le_bytes([a, b]))),
            },
        }
    }
}

trait FrameWriter {
    fn write_frames(&mut self, buf: &[i16]) -> Result<(), Error>;
    fn finalize(&mut self) -> Result<(), Error>;
}

struct RawFrameWriter<W: Write> {
    writer: W,
    buf: Vec<u8>,
}

struct WavFrameWriter<W: Write + Seek> {
    writer: WavWriter<W>,
}

impl<W: Write> FrameWriter for RawFrameWriter<W> {
    fn write_frames(&mut self, buf: &[i16]) -> Result<(), Error> {
        self.buf.clear();
        for x in buf {
            self.buf.extend_from_slice(&x.to_le_bytes());
        }
        self.writer.write_all(&self.buf[..]).map_err(|e| e.into())
    }

    fn finalize(&mut self) -> Result<(), Error> {
        self.writer.flush()?;
        Ok(())
    }
}

impl<W: Write + Seek> FrameWriter for WavFrameWriter<W> {
    fn write_frames(&mut self, buf: &[i16]) -> Result<(), Error> {
        let mut w = self.writer.get_i16_writer(buf.len() as u32);
        for &x in buf {
            w.write_sample(x);
        }
        w.flush().map_err(|e| e.into())
    }

    fn finalize(&mut self) -> Result<(), Error> {
        self.writer.flush().map_err(|e| e.into())
    }
}

fn raw_samples<R: Read + 'static>(r: R) -> SampleIter {
    Box::new(RawSampleIter { bytes: r.bytes() })
}

fn wav_samples<R: Read + 'static>(wav: WavReader<R>) -> SampleIter {
    match wav.spec().sample_format {
        SampleFormat::Int => {
            let bits_per_sample = wav.spec().bits_per_sample;
            Box::new(wav.into_samples::<i32>().map(move |s| {
                s.map(|s| {
                    if bits_per_sample < 16 {
                        (s << (16 - bits_per_sample)) as i16
                    } else {
                        (s >> (bits_per_sample - 16)) as i16
                    }
                })
                .map_err(|e| e.into())
            }))
        }
        SampleFormat::Float => Box::new(
            wav.into_samples::<f32>()
                .map(|s| s.map(|s| (s * 32767.0).round() as i16).map_err(|e| e.into())),
        ),
    }
}

/// Settings given on the command line, which win over the settings file.
#[derive(Clone, Copy, Debug, Default)]
struct Overrides {
    center_frequency: Option<f64>,
    gain: Option<f64>,
}

impl Overrides {
    fn from_matches(matches: &ArgMatches) -> Overrides {
        Overrides {
            center_frequency: matches.get_one::<f64>("center-frequency").copied(),
            gain: matches.get_one::<f64>("gain").copied(),
        }
    }

    fn apply(&self, mut settings: Settings) -> Result<Settings, Error> {
        if let Some(hz) = self.center_frequency {
            settings.center_frequency = hz;
        }
        if let Some(gain) = self.gain {
            settings.gain = gain;
        }
        Ok(settings.validated()?)
    }
}

fn load_settings(path: Option<&PathBuf>, overrides: &Overrides) -> Result<Settings, Error> {
    let settings = match path {
        Some(path) => Settings::load(path)
            .with_context(|| format!("Failed to load settings from \"{}\"", path.display()))?,
        None => Settings::default(),
    };
    overrides.apply(settings)
}

fn modified(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Re-reads the settings file whenever it changes, for as long as the process lives.
fn watch_settings(path: PathBuf, overrides: Overrides, params: Arc<BoostParams>) {
    thread::spawn(move || {
        let mut last_modified = modified(&path);
        loop {
            thread::sleep(SETTINGS_POLL_INTERVAL);
            let m = modified(&path);
            if m == last_modified {
                continue;
            }
            last_modified = m;

            match load_settings(Some(&path), &overrides) {
                Ok(settings) => {
                    log::info!(
                        "reloaded settings: {} Hz, gain {}",
                        settings.center_frequency,
                        settings.gain
                    );
                    params.set(&settings);
                }
                Err(e) => log::warn!("keeping the old settings: {:#}", e),
            }
        }
    });
}

fn boost_file(matches: &ArgMatches, settings: Settings) -> Result<(), Error> {
    let in_name = matches
        .get_one::<String>("INPUT")
        .ok_or_else(|| anyhow!("No input file"))?;
    let out_name = matches
        .get_one::<String>("OUTPUT")
        .ok_or_else(|| anyhow!("No output file"))?;
    let in_file = BufReader::new(
        File::open(in_name)
            .with_context(|| format!("Failed to open input file \"{}\"", in_name))?,
    );
    let out_file = BufWriter::new(
        File::create(out_name)
            .with_context(|| format!("Failed to open output file \"{}\"", out_name))?,
    );
    let in_wav =
        matches.get_flag("wav-in") || Path::new(in_name).extension() == Some("wav".as_ref());
    let out_wav =
        matches.get_flag("wav-out") || Path::new(out_name).extension() == Some("wav".as_ref());

    let (mut samples, channels, sample_rate) = if in_wav {
        let wav_reader = WavReader::new(in_file)
            .with_context(|| format!("Failed to read WAV header from \"{}\"", in_name))?;
        let spec = wav_reader.spec();
        (wav_samples(wav_reader), spec.channels, spec.sample_rate)
    } else {
        let sample_rate = matches
            .get_one::<u32>("sample-rate")
            .copied()
            .unwrap_or(DEFAULT_SAMPLE_RATE as u32);
        let channels = matches.get_one::<u16>("channels").copied().unwrap_or(2);
        (raw_samples(in_file), channels, sample_rate)
    };

    if channels == 0 || channels > u8::MAX as u16 {
        bail!("Unsupported channel count {}", channels);
    }
    if settings.center_frequency >= sample_rate as f64 / 2.0 {
        bail!(
            "Center frequency {} Hz is above the Nyquist frequency of {} Hz audio",
            settings.center_frequency,
            sample_rate
        );
    }

    let mut boost = BassBoost::new(Arc::new(BoostParams::new(settings)));
    boost.set_format(channels as u8, sample_rate as i32)?;

    let mut frame_writer: Box<dyn FrameWriter> = if out_wav {
        let spec = WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let writer = WavWriter::new(out_file, spec)?;
        Box::new(WavFrameWriter { writer })
    } else {
        Box::new(RawFrameWriter {
            writer: out_file,
            buf: Vec::with_capacity(CHUNK_SAMPLES * 2),
        })
    };

    let channels = channels as usize;
    let chunk_len = CHUNK_SAMPLES / channels * channels;
    let mut buf = Vec::with_capacity(chunk_len);
    let mut total = 0;
    loop {
        buf.clear();
        while buf.len() < chunk_len {
            match samples.next() {
                Some(s) => buf.push(s?),
                None => break,
            }
        }
        if buf.is_empty() {
            break;
        }
        if buf.len() % channels != 0 {
            bail!(
                "Unexpected end of input (expected a multiple of {} samples)",
                channels
            );
        }

        boost.process_interleaved(&mut buf);
        frame_writer.write_frames(&buf[..])?;
        total += buf.len();
        if buf.len() < chunk_len {
            break;
        }
    }
    frame_writer.finalize()?;

    log::info!(
        "boosted {} frames of {}-channel audio at {} Hz",
        total / channels,
        channels,
        sample_rate
    );
    Ok(())
}

#[cfg(unix)]
fn serve(socket: &Path, params: Arc<BoostParams>) -> Result<(), Error> {
    use std::os::unix::fs::FileTypeExt;
    use std::os::unix::net::UnixListener;

    // A socket left behind by an earlier run would make bind fail.
    if let Ok(meta) = std::fs::symlink_metadata(socket) {
        if meta.file_type().is_socket() {
            std::fs::remove_file(socket).with_context(|| {
                format!("Failed to remove stale socket \"{}\"", socket.display())
            })?;
        }
    }
    let listener = UnixListener::bind(socket)
        .with_context(|| format!("Failed to listen on \"{}\"", socket.display()))?;
    log::info!("listening on {}", socket.display());

    // One client at a time; each gets a fresh filter.
    for stream in listener.incoming() {
        let stream = match stream {
            Ok(stream) => stream,
            Err(e) => {
                log::warn!("failed to accept a client: {}", e);
                continue;
            }
        };
        log::info!("client connected");

        let reader = BufReader::new(
            stream
                .try_clone()
                .context("Failed to clone the client socket")?,
        );
        let writer = BufWriter::new(stream);
        let mut session = Session::new(BassBoost::new(Arc::clone(&params)));
        if let Err(e) = session.run(reader, writer) {
            log::warn!("client stream failed: {}", e);
        }
    }
    Ok(())
}

#[cfg(not(unix))]
fn serve(_socket: &Path, _params: Arc<BoostParams>) -> Result<(), Error> {
    bail!("--listen needs Unix domain sockets, which this platform doesn't have")
}

fn main() -> Result<(), Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let matches = Command::new("bassboost")
        .version(crate_version!())
        .about("Boost the bass in 16-bit audio")
        .arg(arg!([INPUT] "input audio file").required_unless_present("listen"))
        .arg(arg!([OUTPUT] "output audio file").required_unless_present("listen"))
        .arg(
            arg!(--listen <SOCKET> "serve the audio socket protocol on a Unix socket instead of processing files")
                .required(false)
                .value_parser(value_parser!(PathBuf))
                .conflicts_with_all(["INPUT", "OUTPUT"]),
        )
        .arg(
            arg!(--"center-frequency" <HZ> "corner frequency of the boosted band (defaults to 55)")
                .required(false)
                .value_parser(value_parser!(f64)),
        )
        .arg(
            arg!(--gain <GAIN> "boost strength; 0 turns the boost off (defaults to 0)")
                .required(false)
                .value_parser(value_parser!(f64)),
        )
        .arg(
            arg!(--settings <FILE> "TOML settings file; in --listen mode it is re-read when it changes")
                .required(false)
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(arg!(--"wav-in" "the input is a wav file (default is to detect wav files by their filename)"))
        .arg(arg!(--"wav-out" "the output is a wav file (default is to detect wav files by their filename)"))
        .arg(
            arg!(--"sample-rate" <RATE> "for raw input, the sample rate of the input (defaults to 44.1kHz)")
                .required(false)
                .value_parser(value_parser!(u32)),
        )
        .arg(
            arg!(--channels <CHANNELS> "for raw input, the number of channels (defaults to 2)")
                .required(false)
                .value_parser(value_parser!(u16)),
        )
        .get_matches();

    let overrides = Overrides::from_matches(&matches);
    let settings_path = matches.get_one::<PathBuf>("settings");
    let settings = load_settings(settings_path, &overrides)?;

    if let Some(socket) = matches.get_one::<PathBuf>("listen") {
        let params = Arc::new(BoostParams::new(settings));
        if let Some(path) = settings_path {
            watch_settings(path.clone(), overrides, Arc::clone(&params));
        }
        serve(socket, params)
    } else {
        boost_file(&matches, settings)
    }
}
