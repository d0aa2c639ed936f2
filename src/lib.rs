pub mod error;
pub mod nested;
pub mod filename;
pub mod cmds;
pub mod esg;
pub mod config;
pub mod logging;

#[cfg(test)]
pub(crate) mod test_utils;
