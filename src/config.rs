// Fixed run settings. The program has no CLI or config file; everything the
// pipeline needs to know about its environment is collected here.
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Settings {
    pub input_path: PathBuf,
    pub output_dir: PathBuf,
    /// Pixel density used to turn figure sizes in inches into pixels.
    pub dpi: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from("datos_sinteticos.csv"),
            output_dir: PathBuf::from("."),
            dpi: 300,
        }
    }
}
