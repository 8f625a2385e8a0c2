//! Integration tests for the run engine
//!
//! Every suite drives the public API end to end: records are created
//! through `Records`, runs through `RunDispatcher`, and transitions through
//! `RunWorker` or the queue consumers, against an in-memory `Database`.

mod common;

mod config;
mod dispatcher;
mod idempotency;
mod listing;
mod pairing_properties;
mod races;
mod scenarios;
