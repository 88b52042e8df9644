//! Compile-time defaults shared by the render engine and the benchmark tooling.

pub mod benchmark;
pub mod cluster;
pub mod lights;
