mod settings;
mod wiring;

pub use settings::Settings;
pub use wiring::run;
