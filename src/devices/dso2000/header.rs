use std::str::{self, FromStr};

use log::{debug, warn};
use serde::{Serialize, Deserialize};

use super::commands::{Channel, NUM_CHANNELS};
use super::error::FormatError;

// Size of the first response to :WAV:DATA:ALL?, which carries the full header and no samples
pub const HEADER_LEN:usize = 128;

// "#9" means each of the three leading length fields is nine decimal digits wide
pub const SENTINEL:&[u8; 2] = b"#9";

// Offset and width of every fixed ASCII field in the header
pub struct Field {
	pub name: &'static str,
	pub offset: usize,
	pub width: usize,
}

const fn field(name:&'static str, offset:usize, width:usize) -> Field { Field{ name, offset, width } }

pub const BLOCK_LENGTH:Field      = field("block_length",      2, 9);
pub const TOTAL_LENGTH:Field      = field("total_length",     11, 9);
pub const BYTES_TRANSMITTED:Field = field("bytes_transmitted", 20, 9);
pub const RUNNING:Field           = field("running",           29, 1);
pub const TRIGGERED:Field         = field("triggered",         30, 1);
pub const OFFSET:[Field; NUM_CHANNELS] = [
	field("offset_c1", 31, 4), field("offset_c2", 35, 4), field("offset_c3", 39, 4), field("offset_c4", 43, 4),
];
pub const RAW_SCALE:[Field; NUM_CHANNELS] = [
	field("raw_scale_c1", 47, 8), field("raw_scale_c2", 55, 8), field("raw_scale_c3", 63, 8), field("raw_scale_c4", 71, 8),
];
pub const ENABLED:[Field; NUM_CHANNELS] = [
	field("enabled_c1", 79, 1), field("enabled_c2", 80, 1), field("enabled_c3", 81, 1), field("enabled_c4", 82, 1),
];
pub const SAMPLE_RATE:Field       = field("sample_rate",            83, 9);
pub const SAMPLE_MULTIPLIER:Field = field("sample_rate_multiplier", 92, 6);
pub const TRIGGER_TIME:Field      = field("trigger_time_offset",    98, 9);
pub const START_TIME:Field        = field("block_start_time",      107, 9);

// The three length fields end where every chunk's sample payload begins
pub const BLOCK_HEADER_LEN:usize = 29;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlockHeader {
	pub block_length: u64,
	pub total_length: u64,
	pub bytes_transmitted: u64,
}

impl BlockHeader {

	// The device claims to have sent more than it ever intended to
	pub fn is_desynchronized(&self) -> bool { self.total_length < self.bytes_transmitted }

}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelHeader {
	// Raw sample code of the channel's zero level
	pub offset: i32,
	pub raw_scale: f64,
	pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveformHeader {
	pub block: BlockHeader,
	pub running: bool,
	pub triggered: bool,
	pub channels: [ChannelHeader; NUM_CHANNELS],
	pub sample_rate: f64,
	pub sample_rate_multiplier: u32,
	pub trigger_time_offset: f64,
	pub block_start_time: f64,
}

impl WaveformHeader {

	pub fn channel(&self, ch:Channel) -> &ChannelHeader { &self.channels[ch.index()] }

	pub fn enabled_channels(&self) -> Vec<Channel> {
		Channel::ALL.iter().cloned().filter(|ch| self.channel(*ch).enabled).collect()
	}

	pub fn seconds_per_sample(&self) -> f64 { 1.0 / self.sample_rate * (self.sample_rate_multiplier as f64) }

}

fn field_str<'a>(buff:&'a [u8], f:&Field) -> Result<&'a str, FormatError> {
	let end = f.offset + f.width;
	let bytes = buff.get(f.offset..end).ok_or(FormatError::TooShort{ len: buff.len(), need: end })?;
	str::from_utf8(bytes).map(|s| s.trim()).map_err(|_| FormatError::FieldParse(f.name))
}

fn parse_field<T: FromStr>(buff:&[u8], f:&Field) -> Result<T, FormatError> {
	field_str(buff, f)?.parse::<T>().map_err(|_| FormatError::FieldParse(f.name))
}

fn parse_flag(buff:&[u8], f:&Field) -> Result<bool, FormatError> {
	match field_str(buff, f)? {
		"0" => Ok(false),
		"1" => Ok(true),
		_   => Err(FormatError::FieldParse(f.name)),
	}
}

// Every timestamp is divided by the rate and scaled by the multiplier, so neither may be zero
fn parse_sample_rate(buff:&[u8]) -> Result<f64, FormatError> {
	let rate:f64 = parse_field(buff, &SAMPLE_RATE)?;
	if rate.is_finite() && rate > 0.0 { Ok(rate) }
	else { Err(FormatError::FieldParse(SAMPLE_RATE.name)) }
}

fn parse_multiplier(buff:&[u8]) -> Result<u32, FormatError> {
	match parse_field::<u32>(buff, &SAMPLE_MULTIPLIER)? {
		0 => Err(FormatError::FieldParse(SAMPLE_MULTIPLIER.name)),
		m => Ok(m),
	}
}

fn check_sentinel(buff:&[u8]) -> Result<(), FormatError> {
	match buff.get(0..2) {
		Some(s) if s == SENTINEL => Ok(()),
		Some(s) => Err(FormatError::BadSentinel{ found: String::from_utf8_lossy(s).into_owned() }),
		None    => Err(FormatError::TooShort{ len: buff.len(), need: SENTINEL.len() }),
	}
}

// Only the "#9" sentinel and the three length fields, which is all a continuation chunk repeats
pub fn decode_block_header(buff:&[u8]) -> Result<BlockHeader, FormatError> {
	check_sentinel(buff)?;
	if buff.len() < BLOCK_HEADER_LEN {
		return Err(FormatError::TooShort{ len: buff.len(), need: BLOCK_HEADER_LEN });
	}

	Ok(BlockHeader {
		block_length:      parse_field(buff, &BLOCK_LENGTH)?,
		total_length:      parse_field(buff, &TOTAL_LENGTH)?,
		bytes_transmitted: parse_field(buff, &BYTES_TRANSMITTED)?,
	})
}

pub fn decode(buff:&[u8]) -> Result<WaveformHeader, FormatError> {
	let block = decode_block_header(buff)?;
	if buff.len() < HEADER_LEN {
		return Err(FormatError::TooShort{ len: buff.len(), need: HEADER_LEN });
	}

	let mut channels = [ChannelHeader{ offset: 0, raw_scale: 0.0, enabled: false }; NUM_CHANNELS];
	for (idx, ch) in channels.iter_mut().enumerate() {
		ch.offset    = parse_field(buff, &OFFSET[idx])?;
		ch.raw_scale = parse_field(buff, &RAW_SCALE[idx])?;
		ch.enabled   = parse_flag(buff, &ENABLED[idx])?;
	}

	let header = WaveformHeader {
		block,
		running:   parse_flag(buff, &RUNNING)?,
		triggered: parse_flag(buff, &TRIGGERED)?,
		channels,
		sample_rate:            parse_sample_rate(buff)?,
		sample_rate_multiplier: parse_multiplier(buff)?,
		trigger_time_offset:    parse_field(buff, &TRIGGER_TIME)?,
		block_start_time:       parse_field(buff, &START_TIME)?,
	};

	if header.block.is_desynchronized() {
		warn!("Header reports {} bytes transmitted out of a total of {}", header.block.bytes_transmitted, header.block.total_length);
	}
	debug!("Decoded waveform header {:?}", header);

	Ok(header)
}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;
	use rand::Rng;

	// Every field filled with a plausible value, padded out to HEADER_LEN with spaces
	pub(crate) const SAMPLE_HEADER:&str = concat!(
		"#9",
		"000000128", "000008000", "000000000",
		"1", "0",
		"0016", "-008", "0000", "0000",
		"1.0e-318", "2.4e-317", "1.2e-317", "1.2e-317",
		"1", "1", "0", "0",
		"1.0000e+9", "000004",
		"0.000e+00", "-1.00e-03",
	);

	pub(crate) fn sample_buffer() -> Vec<u8> {
		let mut b = SAMPLE_HEADER.as_bytes().to_vec();
		b.resize(HEADER_LEN, b' ');
		b
	}

	fn with_field(f:&Field, text:&str) -> Vec<u8> {
		assert_eq!(text.len(), f.width, "test value for {} must fill the field", f.name);
		let mut b = sample_buffer();
		b[f.offset..f.offset + f.width].copy_from_slice(text.as_bytes());
		b
	}

	#[test]
	fn sample_header_fills_the_table() {
		assert_eq!(SAMPLE_HEADER.len(), START_TIME.offset + START_TIME.width);
	}

	#[test]
	fn decodes_every_field() {
		let h = decode(&sample_buffer()).unwrap();

		assert_eq!(h.block, BlockHeader{ block_length: 128, total_length: 8000, bytes_transmitted: 0 });
		assert!(h.running);
		assert!(!h.triggered);
		assert_eq!(h.channels[0].offset, 16);
		assert_eq!(h.channels[1].offset, -8);
		assert_eq!(h.channels[0].raw_scale, "1.0e-318".parse::<f64>().unwrap());
		assert_eq!(h.channels[1].raw_scale, 2.4e-317);
		assert_eq!(h.enabled_channels(), vec![Channel::C1, Channel::C2]);
		assert_eq!(h.sample_rate, 1.0e9);
		assert_eq!(h.sample_rate_multiplier, 4);
		assert_eq!(h.trigger_time_offset, 0.0);
		assert_eq!(h.block_start_time, -1.0e-3);
		assert_eq!(h.seconds_per_sample(), 1.0 / 1.0e9 * 4.0);
	}

	#[test]
	fn each_field_is_read_from_its_own_offset() {
		assert_eq!(decode(&with_field(&BLOCK_LENGTH, "000004100")).unwrap().block.block_length, 4100);
		assert_eq!(decode(&with_field(&TOTAL_LENGTH, "004000000")).unwrap().block.total_length, 4_000_000);
		assert_eq!(decode(&with_field(&BYTES_TRANSMITTED, "000004071")).unwrap().block.bytes_transmitted, 4071);
		assert!(!decode(&with_field(&RUNNING, "0")).unwrap().running);
		assert!(decode(&with_field(&TRIGGERED, "1")).unwrap().triggered);

		for idx in 0..NUM_CHANNELS {
			let h = decode(&with_field(&OFFSET[idx], "-123")).unwrap();
			assert_eq!(h.channels[idx].offset, -123);
			assert!(h.channels.iter().enumerate().all(|(i, c)| i == idx || c.offset != -123));

			let h = decode(&with_field(&RAW_SCALE[idx], "6.0e-317")).unwrap();
			assert_eq!(h.channels[idx].raw_scale, 6.0e-317);
			assert!(h.channels.iter().enumerate().all(|(i, c)| i == idx || c.raw_scale != 6.0e-317));

			let h = decode(&with_field(&ENABLED[idx], "1")).unwrap();
			assert!(h.channels[idx].enabled);
			let h = decode(&with_field(&ENABLED[idx], "0")).unwrap();
			assert!(!h.channels[idx].enabled);
		}

		assert_eq!(decode(&with_field(&SAMPLE_RATE, "2.5000e+8")).unwrap().sample_rate, 2.5e8);
		assert_eq!(decode(&with_field(&SAMPLE_MULTIPLIER, "000100")).unwrap().sample_rate_multiplier, 100);
		assert_eq!(decode(&with_field(&TRIGGER_TIME, "1.250e-06")).unwrap().trigger_time_offset, 1.25e-6);
		assert_eq!(decode(&with_field(&START_TIME, "-2.00e-05")).unwrap().block_start_time, -2.0e-5);
	}

	#[test]
	fn padded_fields_are_trimmed() {
		let h = decode(&with_field(&OFFSET[2], "  -4")).unwrap();
		assert_eq!(h.channels[2].offset, -4);
	}

	#[test]
	fn bad_sentinel_regardless_of_contents() {
		for prefix in [b"#8", b"$9", b"99", b"\0\0"].iter() {
			let mut b = sample_buffer();
			b[0..2].copy_from_slice(*prefix);
			assert!(matches!(decode(&b), Err(FormatError::BadSentinel{ .. })));
		}

		let garbage:Vec<u8> = (0..HEADER_LEN as u32).map(|x| (x * 7) as u8).collect();
		assert!(matches!(decode(&garbage), Err(FormatError::BadSentinel{ .. })));
	}

	#[test]
	fn short_buffers_are_rejected() {
		assert!(matches!(decode(b""), Err(FormatError::TooShort{ len: 0, .. })));
		let b = sample_buffer();
		assert!(matches!(decode(&b[..100]), Err(FormatError::TooShort{ len: 100, need: HEADER_LEN })));
		assert!(matches!(decode_block_header(&b[..20]), Err(FormatError::TooShort{ len: 20, need: BLOCK_HEADER_LEN })));
	}

	#[test]
	fn unparsable_fields_are_named() {
		let cases:[(&Field, &str); 6] = [
			(&BLOCK_LENGTH, "00000012x"),
			(&RUNNING, "2"),
			(&OFFSET[3], "12.5"),
			(&RAW_SCALE[1], "volts!!!"),
			(&SAMPLE_MULTIPLIER, "-00004"),
			(&START_TIME, "         "),
		];
		for (f, text) in cases.iter() {
			match decode(&with_field(f, text)) {
				Err(FormatError::FieldParse(name)) => assert_eq!(name, f.name),
				other => panic!("expected FieldParse({}) but got {:?}", f.name, other),
			}
		}
	}

	#[test]
	fn desync_is_flagged_but_decoded() {
		let mut b = with_field(&TOTAL_LENGTH, "000004000");
		b[BYTES_TRANSMITTED.offset..BYTES_TRANSMITTED.offset + 9].copy_from_slice(b"000004100");
		let h = decode(&b).unwrap();
		assert!(h.block.is_desynchronized());
		assert!(!decode(&sample_buffer()).unwrap().block.is_desynchronized());
	}

	#[test]
	fn degenerate_timing_is_refused() {
		for text in ["0.0000000", "-1.000e+9", "      inf", "      NaN"].iter() {
			match decode(&with_field(&SAMPLE_RATE, text)) {
				Err(FormatError::FieldParse(name)) => assert_eq!(name, "sample_rate"),
				other => panic!("sample rate {:?} should be refused, got {:?}", text, other),
			}
		}

		match decode(&with_field(&SAMPLE_MULTIPLIER, "000000")) {
			Err(FormatError::FieldParse(name)) => assert_eq!(name, "sample_rate_multiplier"),
			other => panic!("zero multiplier should be refused, got {:?}", other),
		}
	}

	fn flag_text(b:bool) -> String { if b { "1".to_owned() } else { "0".to_owned() } }

	// Nine characters, e.g. "4.125e-06" or "-3.50e-04"
	fn time_text<R: Rng>(rng:&mut R) -> String {
		let m:f64 = rng.gen_range(1.0..9.9);
		let exp:u32 = rng.gen_range(1..10);
		if rng.gen::<bool>() { format!("{:.3}e-0{}", m, exp) } else { format!("-{:.2}e-0{}", m, exp) }
	}

	#[test]
	fn random_fields_round_trip() {
		let mut rng = rand::thread_rng();
		for _ in 0..200 {
			let lengths:[u64; 3] = [rng.gen_range(0..1_000_000_000), rng.gen_range(0..1_000_000_000), rng.gen_range(0..1_000_000_000)];
			let offsets:[i32; 4] = [rng.gen_range(-999..10000), rng.gen_range(-999..10000), rng.gen_range(-999..10000), rng.gen_range(-999..10000)];
			let enabled:[bool; 4] = [rng.gen(), rng.gen(), rng.gen(), rng.gen()];
			let (running, triggered):(bool, bool) = (rng.gen(), rng.gen());
			let scale_text:Vec<String> = (0..NUM_CHANNELS)
				.map(|_| format!("{:.1}e-3{}", rng.gen_range(1.0..9.9), rng.gen_range(10..19)))
				.collect();
			let mult:u32 = rng.gen_range(1..1_000_000);
			let rate:f64 = rng.gen_range(1.0..9.9999);
			let rate_text = format!("{:.4}e+8", rate);
			let trigger_text = time_text(&mut rng);
			let start_text = time_text(&mut rng);

			let mut b = sample_buffer();
			let mut put = |f:&Field, text:String| b[f.offset..f.offset + f.width].copy_from_slice(text.as_bytes());
			put(&BLOCK_LENGTH, format!("{:09}", lengths[0]));
			put(&TOTAL_LENGTH, format!("{:09}", lengths[1]));
			put(&BYTES_TRANSMITTED, format!("{:09}", lengths[2]));
			put(&RUNNING, flag_text(running));
			put(&TRIGGERED, flag_text(triggered));
			for idx in 0..NUM_CHANNELS {
				put(&OFFSET[idx], format!("{:04}", offsets[idx]));
				put(&RAW_SCALE[idx], scale_text[idx].clone());
				put(&ENABLED[idx], flag_text(enabled[idx]));
			}
			put(&SAMPLE_MULTIPLIER, format!("{:06}", mult));
			put(&SAMPLE_RATE, rate_text.clone());
			put(&TRIGGER_TIME, trigger_text.clone());
			put(&START_TIME, start_text.clone());

			let h = decode(&b).unwrap();
			assert_eq!([h.block.block_length, h.block.total_length, h.block.bytes_transmitted], lengths);
			assert_eq!((h.running, h.triggered), (running, triggered));
			for idx in 0..NUM_CHANNELS {
				assert_eq!(h.channels[idx].offset, offsets[idx]);
				assert_eq!(h.channels[idx].raw_scale, scale_text[idx].parse::<f64>().unwrap());
				assert_eq!(h.channels[idx].enabled, enabled[idx]);
			}
			assert_eq!(h.sample_rate_multiplier, mult);
			assert_eq!(h.sample_rate, rate_text.parse::<f64>().unwrap());
			assert!((h.sample_rate - rate * 1e8).abs() < 1e4);
			assert_eq!(h.trigger_time_offset, trigger_text.parse::<f64>().unwrap());
			assert_eq!(h.block_start_time, start_text.parse::<f64>().unwrap());
		}
	}
}
