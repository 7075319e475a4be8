//! Data types held by a settings resource.

pub mod attributes;
