pub mod markdown;

pub use markdown::{Block, Document, Inline, escape_html, parse};
