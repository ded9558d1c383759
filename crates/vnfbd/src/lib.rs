//! VNF-BD benchmark descriptor engine.
//!
//! A descriptor is loaded from a YAML template rendered against caller
//! inputs, expanded into instances by multiplexing its list-valued inputs,
//! matched against the capabilities managers advertise, and post-processed
//! into a VNF-PP profile once every instance has reported.

mod descriptor;
mod error;
pub mod matching;
pub mod multiplex;
pub mod template;
mod vnfpp;

pub use descriptor::{VnfBd, INSTANCE_ID_BASE};
pub use error::DescriptorError;
pub use matching::ComponentMapping;
pub use vnfpp::VnfPp;
