//! Error rendering with suggestions and cause chains.

use std::error::Error;

use sprig_core::error::SprigError;

use super::colors::ColorSupport;

/// Renders errors for the terminal
pub struct ErrorFormatter {
    colors: ColorSupport,
}

impl ErrorFormatter {
    pub fn new() -> Self {
        Self::with_colors(ColorSupport::detect())
    }

    pub fn with_colors(colors: ColorSupport) -> Self {
        Self { colors }
    }

    /// The error, its causes, and a hint when one is known.
    ///
    /// Unsatisfiable resolutions already carry a multi-line explanation, so
    /// it is printed as is below the headline.
    pub fn format_error(&self, error: &SprigError) -> String {
        let mut output = format!("{}: ", self.colors.red("error"));
        match error {
            SprigError::Unsatisfiable { report } => {
                output.push_str("version solving failed\n\n");
                output.push_str(report);
                output.push('\n');
            },
            other => {
                output.push_str(&other.to_string());
                output.push('\n');
            },
        }

        let mut source = error.source();
        while let Some(cause) = source {
            output.push_str(&format!("{}: {}\n", self.colors.dim("caused by"), cause));
            source = cause.source();
        }

        if let Some(suggestion) = error.suggestion() {
            output.push('\n');
            output.push_str(&format!("{}: {}\n", self.colors.dim("help"), suggestion));
        }

        output
    }
}

impl Default for ErrorFormatter {
    fn default() -> Self {
        Self::new()
    }
}
