//! Soundstage core: a deterministic stereo effects engine
//!
//! Everything with numerical or real-time requirements lives here: shelving
//! EQ, mid/side spatializer, harmonic enhancers, limiter, reverb, the settings
//! store shared with a control thread, and the pipeline that ties them together.

pub mod domain;

pub use domain::*;
