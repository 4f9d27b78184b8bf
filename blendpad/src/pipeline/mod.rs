pub mod blend;
pub mod config;
pub mod coordinator;
pub mod export;
pub mod latent;
pub mod pattern;
pub mod presets;
pub mod puck;
pub mod transport;
pub mod worker;

#[cfg(test)]
pub mod test_fixture;
