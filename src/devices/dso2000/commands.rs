use std::convert::TryFrom;
use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Deserialize};

use super::error::CommandError;

pub const WAVEFORM_QUERY:&str = ":WAV:DATA:ALL?\n";
pub const IDN_QUERY:&str      = "*IDN?\n";

pub const NUM_CHANNELS:usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel { C1, C2, C3, C4 }

impl Channel {

	pub const ALL:[Channel; NUM_CHANNELS] = [Channel::C1, Channel::C2, Channel::C3, Channel::C4];

	// 1-based, the way the front panel and the SCPI commands number them
	pub fn number(self) -> u8 { self.index() as u8 + 1 }

	pub fn index(self) -> usize {
		match self {
			Channel::C1 => 0,
			Channel::C2 => 1,
			Channel::C3 => 2,
			Channel::C4 => 3,
		}
	}

}

impl TryFrom<u8> for Channel {
	type Error = CommandError;

	fn try_from(n:u8) -> Result<Self, CommandError> {
		match n {
			1 => Ok(Channel::C1),
			2 => Ok(Channel::C2),
			3 => Ok(Channel::C3),
			4 => Ok(Channel::C4),
			_ => Err(CommandError::BadChannel(n)),
		}
	}
}

impl fmt::Display for Channel {
	fn fmt(&self, f:&mut fmt::Formatter) -> fmt::Result { write!(f, "C{}", self.number()) }
}

// Used for on/off settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DsoBool { Off, On }

impl DsoBool {
	pub fn token(self) -> &'static str {
		match self {
			DsoBool::Off => "OFF",
			DsoBool::On  => "ON",
		}
	}
}

impl From<bool> for DsoBool {
	fn from(b:bool) -> Self { if b { DsoBool::On } else { DsoBool::Off } }
}

impl From<DsoBool> for bool {
	fn from(b:DsoBool) -> Self { b == DsoBool::On }
}

impl FromStr for DsoBool {
	type Err = CommandError;

	// Queries answer with 0/1, but ON/OFF is accepted on input so both spellings come back the same
	fn from_str(s:&str) -> Result<Self, CommandError> {
		match s.trim() {
			"OFF" | "0" => Ok(DsoBool::Off),
			"ON"  | "1" => Ok(DsoBool::On),
			other       => Err(CommandError::UnknownToken(other.to_owned())),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Coupling { AC, DC, GND }

impl Coupling {
	pub fn token(self) -> &'static str {
		match self {
			Coupling::AC  => "AC",
			Coupling::DC  => "DC",
			Coupling::GND => "GND",
		}
	}
}

impl FromStr for Coupling {
	type Err = CommandError;

	fn from_str(s:&str) -> Result<Self, CommandError> {
		match s.trim() {
			"AC"  => Ok(Coupling::AC),
			"DC"  => Ok(Coupling::DC),
			"GND" => Ok(Coupling::GND),
			other => Err(CommandError::UnknownToken(other.to_owned())),
		}
	}
}

// Acquisition memory depth in samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageDepth {
	D4K   = 4000,
	D40K  = 40000,
	D400K = 400000,
	D4M   = 4000000,
	D8M   = 8000000,
}

impl StorageDepth {

	pub fn samples(self) -> usize { self as usize }

	pub fn token(self) -> &'static str {
		match self {
			StorageDepth::D4K   => "4K",
			StorageDepth::D40K  => "40K",
			StorageDepth::D400K => "400K",
			StorageDepth::D4M   => "4M",
			StorageDepth::D8M   => "8M",
		}
	}

}

impl FromStr for StorageDepth {
	type Err = CommandError;

	fn from_str(s:&str) -> Result<Self, CommandError> {
		match s.trim() {
			"4K"   => Ok(StorageDepth::D4K),
			"40K"  => Ok(StorageDepth::D40K),
			"400K" => Ok(StorageDepth::D400K),
			"4M"   => Ok(StorageDepth::D4M),
			"8M"   => Ok(StorageDepth::D8M),
			other  => Err(CommandError::UnknownToken(other.to_owned())),
		}
	}
}

// The per-channel settings reachable through :CHANnel<N>:<PARAM>
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelParam { BandwidthLimit, Coupling, Display, Invert }

impl ChannelParam {
	pub fn token(self) -> &'static str {
		match self {
			ChannelParam::BandwidthLimit => "BWLimit",
			ChannelParam::Coupling       => "COUPling",
			ChannelParam::Display        => "DISPlay",
			ChannelParam::Invert         => "INVert",
		}
	}
}

pub fn channel_set(ch:Channel, param:ChannelParam, value:&str) -> String {
	format!(":CHANnel{}:{} {}\n", ch.number(), param.token(), value)
}

pub fn channel_query(ch:Channel, param:ChannelParam) -> String {
	format!(":CHANnel{}:{}?\n", ch.number(), param.token())
}

pub fn depth_set(depth:StorageDepth) -> String { format!(":ACQuire:DEPMem {}\n", depth.token()) }
pub fn depth_query() -> String { ":ACQuire:DEPMem?\n".to_owned() }
