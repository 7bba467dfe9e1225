use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write, Error, ErrorKind};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;

use log::trace;
use serde::{Serialize, Deserialize};

// The instrument is a single stateful session: every command is written in full before the matching read is issued,
// and nothing here retries.  Timeouts belong to whatever sits underneath (the usbtmc driver, the socket)
pub trait Transport {

	fn write(&mut self, cmd:&str) -> io::Result<()>;

	// Returns at most max_bytes, possibly fewer
	fn read(&mut self, max_bytes:usize) -> io::Result<Vec<u8>>;

	fn ask(&mut self, cmd:&str, max_bytes:usize) -> io::Result<Vec<u8>> {
		self.write(cmd)?;
		self.read(max_bytes)
	}

	// Polled between chunk reads so the caller can walk away from a long transfer
	fn abandoned(&self) -> bool { false }

}

impl<T: Transport + ?Sized> Transport for &mut T {
	fn write(&mut self, cmd:&str) -> io::Result<()> { (**self).write(cmd) }
	fn read(&mut self, max_bytes:usize) -> io::Result<Vec<u8>> { (**self).read(max_bytes) }
	fn ask(&mut self, cmd:&str, max_bytes:usize) -> io::Result<Vec<u8>> { (**self).ask(cmd, max_bytes) }
	fn abandoned(&self) -> bool { (**self).abandoned() }
}

pub struct StreamTransport<S: Read + Write> {
	pub stream: S,
}

impl<S: Read + Write> StreamTransport<S> {

	pub fn new(stream:S) -> Self { Self{ stream } }

}

impl StreamTransport<File> {

	// On Linux the usbtmc kernel driver exposes each instrument as /dev/usbtmcN, and one read() returns one transfer
	pub fn open_usbtmc<P: AsRef<Path>>(path:P) -> io::Result<Self> {
		let file = OpenOptions::new().read(true).write(true).open(path)?;
		Ok(Self::new(file))
	}

}

impl StreamTransport<TcpStream> {

	pub fn connect_tcp<A: ToSocketAddrs>(addr:A) -> io::Result<Self> {
		let stream = TcpStream::connect(addr)?;
		stream.set_nodelay(true)?;
		Ok(Self::new(stream))
	}

}

impl<S: Read + Write> Transport for StreamTransport<S> {

	fn write(&mut self, cmd:&str) -> io::Result<()> {
		trace!("tx {:?}", cmd);
		self.stream.write_all(cmd.as_bytes())?;
		self.stream.flush()
	}

	fn read(&mut self, max_bytes:usize) -> io::Result<Vec<u8>> {
		let mut buff:Vec<u8> = vec![0; max_bytes];
		let n:usize = self.stream.read(&mut buff)?;
		buff.truncate(n);
		trace!("rx {} bytes", n);
		Ok(buff)
	}

}

// On-disk form of a captured session: the raw bytes of each response, in the order the device sent them
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Capture {
	pub responses: Vec<Vec<u8>>,
}

// Plays back captured responses one per read, regardless of which command was written.  Every command is kept in
// `sent` so tests can check what the host asked for
#[derive(Debug, Default)]
pub struct ReplayTransport {
	responses: VecDeque<Vec<u8>>,
	pub sent: Vec<String>,
	reads: usize,
	abandon_after: Option<usize>,
}

impl ReplayTransport {

	pub fn new<I: IntoIterator<Item=Vec<u8>>>(responses:I) -> Self {
		Self{ responses: responses.into_iter().collect(), ..Self::default() }
	}

	pub fn from_capture(capture:Capture) -> Self { Self::new(capture.responses) }

	pub fn load<P: AsRef<Path>>(path:P) -> io::Result<Self> {
		let capture:Capture = serde_json::from_reader(File::open(path)?)?;
		Ok(Self::from_capture(capture))
	}

	// Report the session as abandoned once n reads have completed
	pub fn abandon_after(mut self, n:usize) -> Self {
		self.abandon_after = Some(n);
		self
	}

	pub fn remaining(&self) -> usize { self.responses.len() }

}

impl Transport for ReplayTransport {

	fn write(&mut self, cmd:&str) -> io::Result<()> {
		self.sent.push(cmd.to_owned());
		Ok(())
	}

	fn read(&mut self, max_bytes:usize) -> io::Result<Vec<u8>> {
		let mut resp:Vec<u8> = self.responses.pop_front()
			.ok_or(Error::new(ErrorKind::UnexpectedEof, "Replay capture has no more responses"))?;
		resp.truncate(max_bytes);
		self.reads += 1;
		Ok(resp)
	}

	fn abandoned(&self) -> bool {
		match self.abandon_after {
			Some(n) => self.reads >= n,
			None    => false,
		}
	}

}
