pub mod chat;
pub mod feedback;
pub mod settings;
pub mod uploads;
