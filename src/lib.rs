
// Byte-oriented request/response channels to an instrument (usbtmc device files, raw SCPI sockets, replayed captures)
pub mod transport;

// Module for devices that speak the Hantek waveform transfer protocol
pub mod devices;

