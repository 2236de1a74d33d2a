//! Service layer: image I/O, output formats, background synthesis and compositing

pub mod background;
pub mod compositing;
pub mod format;
pub mod io;

pub use background::BackgroundSynthesizer;
pub use compositing::AlphaCompositor;
pub use format::OutputFormatHandler;
pub use io::ImageIOService;
