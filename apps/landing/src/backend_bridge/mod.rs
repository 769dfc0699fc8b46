//! Backend side of the UI loop: command queue types and the worker runtime.

pub mod commands;
pub mod runtime;
