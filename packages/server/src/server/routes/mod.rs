// HTTP routes
pub mod health;
pub mod import;
pub mod scrape;
pub mod settings;

pub use health::*;
pub use import::*;
pub use scrape::*;
pub use settings::*;
