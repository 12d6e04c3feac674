use std::path::PathBuf;

use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Failures are scoped per the propagation policy: an error for one mod assembly or one patch
/// never aborts the overall startup sequence. Callers are expected to catch, log, and continue
/// with the remaining mods or patches.
#[derive(Error, Debug)]
pub enum Error {
    /// The module image is damaged and could not be parsed.
    ///
    /// The error includes the source location where the malformation was
    /// detected for debugging purposes.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while parsing the module image.
    #[error("Out of Bound read would have occurred!")]
    OutOfBounds,

    /// This file type is not supported.
    ///
    /// Indicates that the input is not a supported module image, or uses a
    /// format version this library does not implement.
    #[error("This file type is not supported")]
    NotSupported,

    /// Provided input was empty.
    #[error("Provided input was empty")]
    Empty,

    /// File I/O error.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// A mod assembly could not be loaded.
    ///
    /// Fatal for that one mod only: the mod is skipped and all other mods
    /// continue loading.
    #[error("Could not load '{}': {reason}", path.display())]
    AssemblyLoadFailed {
        /// The assembly file path which failed to load
        path: PathBuf,
        /// Why the assembly could not be loaded
        reason: String,
    },

    /// A patch target method does not exist in the host metadata.
    ///
    /// Typically means the game method's signature changed in a new game
    /// version. The associated string is the requested method signature.
    #[error("No method matching '{0}' exists in the loaded host metadata")]
    MissingTarget(String),

    /// A patch failed to apply.
    ///
    /// Fatal for that one patch only: the target method keeps its original
    /// behavior and all other patches in the batch still apply.
    #[error("Couldn't apply patch '{patch}': {reason}")]
    PatchFailed {
        /// The name of the patch which failed
        patch: String,
        /// Why the patch could not be applied
        reason: String,
    },

    /// Generic error for miscellaneous failures.
    #[error("{0}")]
    Error(String),
}

/// Get a simplified, user-facing summary for an error.
///
/// Joins the error with its source chain so end users can report actionable
/// bug reports without needing the full debug representation.
pub fn error_summary(error: &dyn std::error::Error) -> String {
    let mut summary = error.to_string();

    let mut source = error.source();
    while let Some(cause) = source {
        summary.push_str(": ");
        summary.push_str(&cause.to_string());
        source = cause.source();
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_error_macro_captures_location() {
        let error = malformed_error!("bad table count - {}", 99);
        match error {
            Error::Malformed { message, file, .. } => {
                assert_eq!(message, "bad table count - 99");
                assert!(file.ends_with("error.rs"));
            }
            _ => panic!("expected Malformed"),
        }
    }

    #[test]
    fn error_summary_includes_source_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let error = Error::FileError(io);
        assert!(error_summary(&error).contains("no such file"));
    }

    #[test]
    fn assembly_load_failed_names_path_and_reason() {
        let error = Error::AssemblyLoadFailed {
            path: PathBuf::from("Mods/Example/Example.dll"),
            reason: "it doesn't exist".into(),
        };
        let text = error.to_string();
        assert!(text.contains("Example.dll"));
        assert!(text.contains("doesn't exist"));
    }
}
