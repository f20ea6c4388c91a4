pub mod batch;
pub mod cookies;
pub mod downloads;
pub mod settings;
