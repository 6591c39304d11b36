pub mod actions;
pub mod app;
pub mod input;
pub mod logger;
pub mod matcher;
pub mod ocr;
pub mod platform;
pub mod poll;
pub mod routine;
pub mod settings;
pub mod sleep;
pub mod types;
pub mod window;

#[cfg(test)]
mod testing;
