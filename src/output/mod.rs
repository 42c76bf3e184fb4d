//! Output formatting: console reports and JSON documents

pub mod json;
pub mod text;
