pub mod annotate;
pub mod config;
pub mod detectors;
pub mod error;
pub mod io;
pub mod metrics;
pub mod pipeline;
pub mod plot;
pub mod signal;
pub mod synth;

pub use annotate::AnnotatedSignal;
pub use detectors::*;
pub use error::QrsError;
pub use metrics::*;
pub use signal::*;
