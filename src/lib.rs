#![doc = include_str!("../README.md")]

mod applier;
mod config;
mod diffgen;
mod error;
mod format;
mod index;
mod intcodec;
mod search;
mod suffixarray;

pub mod driver;

pub use applier::apply as bspatch_bytes;
pub use config::{Config, LOWMEM_VAR};
pub use diffgen::generate as bsdiff_bytes;
pub use driver::{bsdiff, bsindex, bspatch, InputSource, OutputSink, Written};
pub use error::{BsdiffError, Result};
pub use format::{detect, ControlRecord, Format, PatchDecoder, PatchEncoder};
pub use index::{read_index, write_index};
pub use intcodec::{read_int, write_int};
pub use suffixarray::SuffixArray;
