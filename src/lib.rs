#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod app;
pub mod clients;
pub mod config;
pub mod manifest;
pub mod normalize;
pub mod observability;
pub mod pipeline;
pub mod record;
pub mod util;
