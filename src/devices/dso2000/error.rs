use std::io;

use thiserror::Error;

use super::commands::Channel;

#[derive(Debug, Error)]
pub enum FormatError {
	#[error("buffer holds {len} bytes but the waveform header needs {need}")]
	TooShort { len: usize, need: usize },
	#[error("invalid header sentinel {found:?}, expected \"#9\"")]
	BadSentinel { found: String },
	#[error("unable to parse header field {0}")]
	FieldParse(&'static str),
}

#[derive(Debug, Error)]
pub enum TransportError {
	#[error("chunk {chunk} returned {got} bytes, shorter than the {need} byte framing")]
	Truncated { chunk: usize, got: usize, need: usize },
	#[error("transfer abandoned after {after_chunks} chunks")]
	Cancelled { after_chunks: usize },
	#[error(transparent)]
	Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum CommandError {
	#[error("DSO2000 only has four channels, got channel {0}")]
	BadChannel(u8),
	#[error("unrecognized token {0:?}")]
	UnknownToken(String),
	#[error("unable to parse response as UTF-8")]
	Utf8,
	#[error("no match for {0}")]
	NoMatch(&'static str),
	#[error("device does not appear to be a DSO2000: {0:?}")]
	WrongModel(String),
	#[error(transparent)]
	Io(#[from] io::Error),
}

// Tagged by stage so the caller can tell a bad header from a bad read
#[derive(Debug, Error)]
pub enum AcquisitionError {
	#[error("header decode failed: {0}")]
	Format(#[from] FormatError),
	#[error("waveform transfer failed: {0}")]
	Transport(#[from] TransportError),
	#[error("channel {0} is not enabled in the waveform header")]
	ChannelDisabled(Channel),
}

impl From<io::Error> for AcquisitionError {
	fn from(e:io::Error) -> Self { AcquisitionError::Transport(TransportError::Io(e)) }
}
