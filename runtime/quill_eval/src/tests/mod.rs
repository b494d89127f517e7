//! End-to-end render tests spanning several modules.

mod properties_tests;
mod render_tests;
