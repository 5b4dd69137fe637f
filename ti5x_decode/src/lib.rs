//! Decoder for the TI-5x calculator system bus.
//!
//! Samples of the IDLE, EXT, IRG, IO8..IO1 and PHI1 lines go in; annotations come out. See
//! [`decoder::run`] for the whole pipeline and [`tracker::FrameTracker`] for the framing rules.

#![allow(clippy::module_name_repetitions)]

pub mod annotation;
pub mod bits;
pub mod config;
pub mod decoder;
pub mod instr;
pub mod pins;
pub mod source;
pub mod synth;
pub mod timing;
pub mod tracker;
pub mod word;
