pub mod answer;
pub mod catalog;
pub mod classify;
pub mod collab;
pub mod config;
pub mod engine;
pub mod lexicon;
pub mod render;
pub mod session;
