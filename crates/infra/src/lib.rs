//! Soundstage infrastructure: FIFOs, chunking, audio threads and devices

pub mod audio;

pub use audio::*;
