pub mod api;
pub mod item;
pub mod metadata;
pub mod settings;
