extern crate regex;

use std::fs::File;
use std::io;
use std::path::Path;
use std::str;

use lazy_static::lazy_static;
use log::{debug, info};
use regex::{Captures, Match, Regex};
use serde::{Serialize, Deserialize};

use crate::transport::Transport;

pub mod assembler;
pub mod calibration;
pub mod commands;
pub mod error;
pub mod header;

pub use assembler::{Sample, Waveform, WaveformAssembler};
pub use calibration::CalibratedHeader;
pub use commands::{Channel, ChannelParam, Coupling, DsoBool, StorageDepth};
pub use error::{AcquisitionError, CommandError, FormatError, TransportError};
pub use header::{BlockHeader, WaveformHeader};

lazy_static! {
    static ref IDN_RE: Regex = Regex::new("([^,]+),([^,]+),([^,]+),([^,\\s]+)").unwrap();
}

// Largest answer to any of the short setting queries
pub const RESPONSE_LEN:usize = 512;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
	pub channel: Channel,
	pub chunk_count: usize,
	pub chunk_size: usize,
}

impl Default for AcquisitionConfig {
	fn default() -> Self {
		Self{ channel: Channel::C1, chunk_count: assembler::DEFAULT_CHUNK_COUNT, chunk_size: assembler::DEFAULT_CHUNK_SIZE }
	}
}

impl AcquisitionConfig {

	pub fn load<P: AsRef<Path>>(path:P) -> io::Result<Self> {
		Ok(serde_json::from_reader(File::open(path)?)?)
	}

}

pub struct DSO2000<T: Transport> {
	transport: T,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
	pub manufacturer: String,
	pub model: String,
	pub serial_num: String,
	pub fw_version: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct State {
	pub identity: Identity,
	pub storage_depth: StorageDepth,
	pub channels: Vec<ChannelState>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelState {
	pub channel: Channel,
	pub bandwidth_limit: DsoBool,
	pub coupling: Coupling,
	pub display_enabled: DsoBool,
	pub inverted: DsoBool,
}

fn match_str(opt_match:Option<Match>, what:&'static str) -> Result<String, CommandError> {
	opt_match.map(|m| m.as_str().to_owned()).ok_or(CommandError::NoMatch(what))
}

pub fn parse_identity(idn:&str) -> Result<Identity, CommandError> {
	let caps:Captures = IDN_RE.captures(idn).ok_or(CommandError::NoMatch("*IDN? response"))?;
	Ok(Identity {
		manufacturer: match_str(caps.get(1), "manufacturer")?,
		model:        match_str(caps.get(2), "model")?,
		serial_num:   match_str(caps.get(3), "serial_num")?,
		fw_version:   match_str(caps.get(4), "fw_version")?,
	})
}

impl<T: Transport> DSO2000<T> {

	pub fn new(transport:T) -> Result<Self, CommandError> {
		let mut dev = Self{ transport };

		let idn:Identity = dev.identify()?;
		if !idn.model.starts_with("DSO2") {
			return Err(CommandError::WrongModel(idn.model));
		}
		info!("Connected to {} {} (serial {}, firmware {})", idn.manufacturer, idn.model, idn.serial_num, idn.fw_version);

		Ok(dev)
	}

	pub fn into_transport(self) -> T { self.transport }

	pub fn identify(&mut self) -> Result<Identity, CommandError> {
		let res:String = self.ask_str(commands::IDN_QUERY)?;
		parse_identity(&res)
	}

	pub fn get_full_state(&mut self) -> Result<State, CommandError> {
		let identity:Identity = self.identify()?;
		let storage_depth:StorageDepth = self.get_storage_depth()?;

		let mut channels:Vec<ChannelState> = vec![];
		for ch in Channel::ALL.iter() {
			channels.push(self.get_channel_state(*ch)?);
		}

		Ok(State{ identity, storage_depth, channels })
	}

	pub fn get_channel_state(&mut self, ch:Channel) -> Result<ChannelState, CommandError> {
		let bandwidth_limit:DsoBool = self.get_bandwidth_limit(ch)?;
		let coupling:Coupling       = self.get_coupling(ch)?;
		let display_enabled:DsoBool = self.get_display_enabled(ch)?;
		let inverted:DsoBool        = self.get_inverted(ch)?;

		Ok(ChannelState{ channel: ch, bandwidth_limit, coupling, display_enabled, inverted })
	}

	// 20 MHz low-pass on the channel input
	pub fn get_bandwidth_limit(&mut self, ch:Channel) -> Result<DsoBool, CommandError> { self.query_channel(ch, ChannelParam::BandwidthLimit) }
	pub fn set_bandwidth_limit(&mut self, ch:Channel, b:DsoBool) -> Result<(), CommandError> { self.set_channel(ch, ChannelParam::BandwidthLimit, b.token()) }

	pub fn get_coupling(&mut self, ch:Channel) -> Result<Coupling, CommandError> { self.query_channel(ch, ChannelParam::Coupling) }
	pub fn set_coupling(&mut self, ch:Channel, c:Coupling) -> Result<(), CommandError> { self.set_channel(ch, ChannelParam::Coupling, c.token()) }

	pub fn get_display_enabled(&mut self, ch:Channel) -> Result<DsoBool, CommandError> { self.query_channel(ch, ChannelParam::Display) }
	pub fn set_display_enabled(&mut self, ch:Channel, b:DsoBool) -> Result<(), CommandError> { self.set_channel(ch, ChannelParam::Display, b.token()) }

	pub fn get_inverted(&mut self, ch:Channel) -> Result<DsoBool, CommandError> { self.query_channel(ch, ChannelParam::Invert) }
	pub fn set_inverted(&mut self, ch:Channel, b:DsoBool) -> Result<(), CommandError> { self.set_channel(ch, ChannelParam::Invert, b.token()) }

	pub fn get_storage_depth(&mut self) -> Result<StorageDepth, CommandError> {
		self.ask_str(&commands::depth_query())?.parse::<StorageDepth>()
	}

	pub fn set_storage_depth(&mut self, depth:StorageDepth) -> Result<(), CommandError> {
		Ok(self.transport.write(&commands::depth_set(depth))?)
	}

	pub fn read_header(&mut self) -> Result<WaveformHeader, AcquisitionError> {
		let buff:Vec<u8> = self.transport.ask(commands::WAVEFORM_QUERY, header::HEADER_LEN).map_err(TransportError::Io)?;
		Ok(header::decode(&buff)?)
	}

	// One full acquisition: header, calibration, then the sample chunks
	pub fn acquire(&mut self, config:&AcquisitionConfig) -> Result<Waveform, AcquisitionError> {
		let cal:CalibratedHeader = calibration::calibrate(self.read_header()?);
		debug!("Volts per sample {:?}", cal.volts_per_sample);

		let assembler = WaveformAssembler::for_channel(&cal, config.channel)?;
		assembler.assemble(&mut self.transport, config.chunk_count, config.chunk_size)
	}

	fn query_channel<V: str::FromStr<Err=CommandError>>(&mut self, ch:Channel, param:ChannelParam) -> Result<V, CommandError> {
		self.ask_str(&commands::channel_query(ch, param))?.parse::<V>()
	}

	fn set_channel(&mut self, ch:Channel, param:ChannelParam, value:&str) -> Result<(), CommandError> {
		Ok(self.transport.write(&commands::channel_set(ch, param, value))?)
	}

	pub fn ask_str(&mut self, cmd:&str) -> Result<String, CommandError> {
		let resp:Vec<u8> = self.transport.ask(cmd, RESPONSE_LEN)?;
		str::from_utf8(&resp)
			.map(|s| s.to_owned())
			.map_err(|_| CommandError::Utf8)
	}

}
