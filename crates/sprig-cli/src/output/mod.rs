//! Terminal output shared by every command.

pub mod colors;
pub mod errors;

use colors::ColorSupport;

/// Prints status lines in one consistent style
pub struct OutputHandler {
    colors: ColorSupport,
}

impl OutputHandler {
    pub fn new() -> Self {
        Self::with_colors(ColorSupport::detect())
    }

    pub fn with_colors(colors: ColorSupport) -> Self {
        Self { colors }
    }

    pub fn colors(&self) -> &ColorSupport {
        &self.colors
    }

    /// Plain line on stdout
    pub fn line(&self, message: &str) {
        println!("{}", message);
    }

    pub fn info(&self, message: &str) {
        println!("{}", self.colors.dim(message));
    }

    pub fn success(&self, message: &str) {
        println!("{} {}", self.colors.green("✓"), message);
    }

    pub fn warn(&self, message: &str) {
        eprintln!("{} {}", self.colors.yellow("⚠"), message);
    }

    /// Right-aligned verb followed by a message, e.g. `   Resolving 3 requirements`
    pub fn step(&self, verb: &str, message: &str) {
        println!("{} {}", self.colors.bold(&self.colors.cyan(&format!("{:>12}", verb))), message);
    }
}

impl Default for OutputHandler {
    fn default() -> Self {
        Self::new()
    }
}
