//! Typed access to the generic values produced by LLVM's execution engines.
#![allow(clippy::missing_safety_doc)]

pub mod config;
pub mod engine;
pub mod error;
pub mod layout;
pub mod value;


pub use crate::config::Config;
pub use crate::engine::Engine;
pub use crate::error::Error;
pub use crate::layout::BoxedString;
pub use crate::value::{
    FloatWidth, GenericValue, GenericValueView, Kind, TypedValue,
};
