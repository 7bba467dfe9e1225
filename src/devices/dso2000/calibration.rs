use serde::{Serialize, Deserialize};

use super::commands::{Channel, NUM_CHANNELS};
use super::header::WaveformHeader;

// The scale fields come over the wire divided by 12 and by 1e-317, the bottom of the f64 subnormal range, so a
// scale of 0.1 V per code reads as "1.2e-317".  This has only been checked against captured headers; leave the
// arithmetic exactly as it is
pub const SCALE_DIVISOR:f64  = 12.0;
pub const SCALE_DENORMAL:f64 = 1e-317;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibratedHeader {
	pub header: WaveformHeader,
	pub volts_per_sample: [f64; NUM_CHANNELS],
}

impl CalibratedHeader {

	pub fn volts_per_sample(&self, ch:Channel) -> f64 { self.volts_per_sample[ch.index()] }

}

pub fn volts_per_sample(raw_scale:f64) -> f64 { (raw_scale / SCALE_DIVISOR) / SCALE_DENORMAL }

// Disabled channels get a value too; nothing downstream reads it
pub fn calibrate(header:WaveformHeader) -> CalibratedHeader {
	let mut volts_per_sample = [0.0; NUM_CHANNELS];
	for (vps, ch) in volts_per_sample.iter_mut().zip(header.channels.iter()) {
		*vps = self::volts_per_sample(ch.raw_scale);
	}

	CalibratedHeader{ header, volts_per_sample }
}
