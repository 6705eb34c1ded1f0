//! Plain-text rendering for the command line front-end

mod render;

pub use render::*;
