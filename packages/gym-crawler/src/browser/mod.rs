//! Browser implementations.

mod chromium;

pub use chromium::{ChromiumBrowser, ChromiumPage};
