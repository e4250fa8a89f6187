pub mod header;
pub mod indicators;
pub mod status_mix;
