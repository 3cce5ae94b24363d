use thiserror::Error;

/// Errors surfaced to the user. The `Display` text is what the banner shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    #[error("Please paste the webpage content first.")]
    EmptyContent,
    #[error("An error occurred while generating the email. Please check the console and try again.")]
    GenerationFailed,
}
