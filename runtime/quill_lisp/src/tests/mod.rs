//! Lisp blocks rendered through a full script context.

mod lisp_tests;
mod properties_tests;
