// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod cancel;
pub mod error;
pub mod event;
pub mod input;
mod process;
pub mod run;
pub mod spec;

pub use cancel::CancelToken;
pub use error::TaskError;
pub use event::TaskEvent;
pub use input::{ByteChunkStream, InputSource};
pub use run::TaskRun;
pub use spec::TaskSpec;
