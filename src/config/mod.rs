mod settings;

pub use settings::{MappingSettings, RenderingSettings, Settings};
