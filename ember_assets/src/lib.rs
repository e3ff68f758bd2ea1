//! Texture and binary asset pipeline.
//!
//! Turns `.texture` definitions into packed pixel data in the output blob
//! plus generated lookup tables, with a content-addressed cache so only
//! changed assets are rebuilt.

#![deny(unsafe_op_in_unsafe_fn)]
#![deny(unused_crate_dependencies)]

pub mod atlas;
pub mod format;
pub mod image;
pub mod mip;
pub mod texture;
