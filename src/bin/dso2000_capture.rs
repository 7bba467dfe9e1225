extern crate dso2000;

use std::io::{self, BufWriter, Error, ErrorKind, Write};
use std::path::PathBuf;

use clap::Parser;
use log::{error, info};

use dso2000::devices::dso2000::{AcquisitionConfig, DSO2000, Waveform};
use dso2000::transport::{ReplayTransport, StreamTransport, Transport};

/// Capture one waveform from a Hantek DSO2000 and write it as CSV to stdout
#[derive(Parser, Debug)]
#[command(name = "dso2000_capture")]
#[command(version, about, long_about = None)]
struct Args {
	/// usbtmc character device of the instrument
	#[arg(short, long, value_name = "PATH", default_value = "/dev/usbtmc0")]
	device: PathBuf,

	/// Replay a captured session instead of talking to an instrument
	#[arg(short, long, value_name = "CAPTURE.json", conflicts_with = "device")]
	replay: Option<PathBuf>,

	/// JSON acquisition config (channel, chunk_count, chunk_size)
	#[arg(short, long, value_name = "PATH")]
	config: Option<PathBuf>,
}

fn capture<T: Transport>(transport:T, config:&AcquisitionConfig) -> io::Result<Waveform> {
	let mut dev = DSO2000::new(transport).map_err(|e| Error::new(ErrorKind::Other, e))?;
	dev.acquire(config).map_err(|e| Error::new(ErrorKind::Other, e))
}

fn write_csv<W: Write>(out:W, wf:Waveform) -> io::Result<()> {
	let mut out = BufWriter::new(out);
	writeln!(out, "Time_s,Volt_V")?;
	for s in wf {
		writeln!(out, "{:e},{:e}", s.time, s.voltage)?;
	}
	out.flush()
}

pub fn main() -> io::Result<()> {
	env_logger::init();

	let args = Args::parse();
	let config:AcquisitionConfig = match &args.config {
		Some(path) => AcquisitionConfig::load(path)?,
		None       => AcquisitionConfig::default(),
	};

	let result = match &args.replay {
		Some(path) => {
			info!("Replaying {} from {}", config.channel, path.display());
			capture(ReplayTransport::load(path)?, &config)
		},
		None => {
			info!("Capturing {} from {} with {:?}", config.channel, args.device.display(), config);
			capture(StreamTransport::open_usbtmc(&args.device)?, &config)
		},
	};

	match result {
		Ok(wf) => {
			info!("Received {} samples in {} chunks", wf.len(), wf.chunk_lengths().len());
			write_csv(io::stdout(), wf)
		},
		Err(e) => {
			error!("Acquisition failed: {}", e);
			Err(e)
		},
	}
}
