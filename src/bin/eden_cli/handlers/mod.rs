#![deny(clippy::all, clippy::pedantic)]

pub mod batch;
pub mod call;
pub mod pages;
