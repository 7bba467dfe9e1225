use std::io::Cursor;
use std::vec;

use byteorder::ReadBytesExt;
use log::{debug, trace, warn};
use serde::{Serialize, Deserialize};

use crate::transport::Transport;
use super::calibration::CalibratedHeader;
use super::commands::{Channel, WAVEFORM_QUERY};
use super::error::{AcquisitionError, TransportError};
use super::header::{self, BLOCK_HEADER_LEN};

// Every chunk repeats the sentinel and the three length fields before its samples
pub const CHUNK_HEADER_LEN:usize = BLOCK_HEADER_LEN;

// The ADC codes sit two counts above the offset reported in the header
pub const MID_SCALE_CORRECTION:i32 = 2;

pub const DEFAULT_CHUNK_COUNT:usize = 2;
pub const DEFAULT_CHUNK_SIZE:usize  = 4100;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
	pub channel: Channel,
	pub time: f64,
	pub voltage: f64,
}

pub fn code_to_voltage(code:i8, offset:i32, volts_per_sample:f64) -> f64 {
	volts_per_sample * ((code as i32 - offset - MID_SCALE_CORRECTION) as f64)
}

pub struct WaveformAssembler<'h> {
	cal: &'h CalibratedHeader,
	channel: Channel,
}

impl<'h> WaveformAssembler<'h> {

	pub fn new(cal:&'h CalibratedHeader) -> Self { Self{ cal, channel: Channel::C1 } }

	pub fn for_channel(cal:&'h CalibratedHeader, channel:Channel) -> Result<Self, AcquisitionError> {
		if !cal.header.channel(channel).enabled {
			return Err(AcquisitionError::ChannelDisabled(channel));
		}
		Ok(Self{ cal, channel })
	}

	// Pulls chunk_count chunks of up to chunk_size bytes each.  Nothing is handed back unless every chunk arrived,
	// so a failed transfer can't be mistaken for a short trace
	pub fn assemble<T: Transport + ?Sized>(&self, transport:&mut T, chunk_count:usize, chunk_size:usize) -> Result<Waveform, AcquisitionError> {
		let mut raw:Vec<i8> = vec![];
		let mut chunk_lengths:Vec<usize> = Vec::with_capacity(chunk_count);

		for chunk in 0..chunk_count {
			if transport.abandoned() {
				debug!("Transfer abandoned after {} of {} chunks, dropping {} samples", chunk, chunk_count, raw.len());
				return Err(TransportError::Cancelled{ after_chunks: chunk }.into());
			}

			transport.write(WAVEFORM_QUERY).map_err(TransportError::Io)?;
			let mut buff:Vec<u8> = transport.read(chunk_size).map_err(TransportError::Io)?;

			if buff.len() < CHUNK_HEADER_LEN {
				return Err(TransportError::Truncated{ chunk, got: buff.len(), need: CHUNK_HEADER_LEN }.into());
			}
			if buff.len() > chunk_size {
				warn!("Chunk {} returned {} bytes when at most {} were asked for", chunk, buff.len(), chunk_size);
				buff.truncate(chunk_size);
			}

			match header::decode_block_header(&buff) {
				Ok(block) => trace!("Chunk {}: {:?}", chunk, block),
				Err(e)    => debug!("Chunk {} framing not understood: {}", chunk, e),
			}

			let mut rdr = Cursor::new(&buff[CHUNK_HEADER_LEN..]);
			let n:usize = buff.len() - CHUNK_HEADER_LEN;
			raw.reserve(n);
			for _ in 0..n {
				raw.push(rdr.read_i8().map_err(TransportError::Io)?);
			}
			chunk_lengths.push(n);
		}

		debug!("Assembled {} samples for {} from {} chunks", raw.len(), self.channel, chunk_lengths.len());

		Ok(Waveform {
			channel: self.channel,
			offset: self.cal.header.channel(self.channel).offset,
			volts_per_sample: self.cal.volts_per_sample(self.channel),
			seconds_per_sample: self.cal.header.seconds_per_sample(),
			raw,
			chunk_lengths,
		})
	}

}

pub fn assemble<T: Transport + ?Sized>(cal:&CalibratedHeader, transport:&mut T, chunk_count:usize, chunk_size:usize) -> Result<Waveform, AcquisitionError> {
	WaveformAssembler::new(cal).assemble(transport, chunk_count, chunk_size)
}

// The raw codes of one channel's transfer plus what it takes to turn them into volts
#[derive(Debug, Clone)]
pub struct Waveform {
	channel: Channel,
	offset: i32,
	volts_per_sample: f64,
	seconds_per_sample: f64,
	raw: Vec<i8>,
	chunk_lengths: Vec<usize>,
}

impl Waveform {

	pub fn channel(&self) -> Channel { self.channel }
	pub fn raw(&self) -> &[i8] { &self.raw }
	pub fn chunk_lengths(&self) -> &[usize] { &self.chunk_lengths }
	pub fn seconds_per_sample(&self) -> f64 { self.seconds_per_sample }
	pub fn len(&self) -> usize { self.raw.len() }
	pub fn is_empty(&self) -> bool { self.raw.is_empty() }

}

impl IntoIterator for Waveform {
	type Item = Sample;
	type IntoIter = Samples;

	fn into_iter(self) -> Samples {
		Samples {
			channel: self.channel,
			offset: self.offset,
			volts_per_sample: self.volts_per_sample,
			seconds_per_sample: self.seconds_per_sample,
			codes: self.raw.into_iter().enumerate(),
		}
	}
}

// Converts one code per call.  The index runs across chunk boundaries, so time never resets mid-trace
pub struct Samples {
	channel: Channel,
	offset: i32,
	volts_per_sample: f64,
	seconds_per_sample: f64,
	codes: std::iter::Enumerate<vec::IntoIter<i8>>,
}

impl Iterator for Samples {
	type Item = Sample;

	fn next(&mut self) -> Option<Sample> {
		let (idx, code) = self.codes.next()?;
		Some(Sample {
			channel: self.channel,
			time: self.seconds_per_sample * (idx as f64),
			voltage: code_to_voltage(code, self.offset, self.volts_per_sample),
		})
	}

	fn size_hint(&self) -> (usize, Option<usize>) { self.codes.size_hint() }
}

impl ExactSizeIterator for Samples {}
