//! Line classifier: error line, info line, or noise.

/// Marker the server prints in front of informational log lines.
pub const INFO_MARKER: &str = "[INFO] ";
/// Marker the server prints in front of error log lines.
pub const ERROR_MARKER: &str = "[ERR!] ";

/// Signature of a map file that the server could not open.
const MISSING_FILE_SIGNATURE: &str = "ArcRuntimeException: File not found";

/// Classification of one stripped output line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind<'a> {
    /// An error line; carries the trimmed text after the marker.
    Error(&'a str),
    /// An info line; carries the trimmed text after the marker.
    Info(&'a str),
    /// Anything else (banner, stack trace continuation, blank line).
    Other,
}

/// Classify a line whose terminal escapes were already removed.
///
/// The markers may appear anywhere in the line since the server prefixes
/// them with a timestamp. The error marker wins when both are present.
pub fn classify(line: &str) -> LineKind<'_> {
    if let Some(idx) = line.find(ERROR_MARKER) {
        return LineKind::Error(line[idx + ERROR_MARKER.len()..].trim());
    }
    if let Some(idx) = line.find(INFO_MARKER) {
        return LineKind::Info(line[idx + INFO_MARKER.len()..].trim());
    }
    LineKind::Other
}

/// Whether an error body reports a missing map file. The server cannot
/// recover from this on its own and has to be restarted.
pub fn is_missing_file(body: &str) -> bool {
    body.contains(MISSING_FILE_SIGNATURE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn info_body_is_trimmed() {
        let kind = classify("[12-01-2024 10:00:00] [INFO]  Alice has connected.  ");
        assert_eq!(kind, LineKind::Info("Alice has connected."));
    }

    #[test]
    fn error_marker_wins() {
        let kind = classify("[ERR!] failed while handling [INFO] line");
        assert_eq!(kind, LineKind::Error("failed while handling [INFO] line"));
    }

    #[test]
    fn unmarked_lines_are_noise() {
        assert_eq!(classify("    at java.lang.Thread.run(Thread.java:748)"), LineKind::Other);
        assert_eq!(classify(""), LineKind::Other);
        // Marker without its trailing space is not a marker.
        assert_eq!(classify("[INFO]"), LineKind::Other);
    }

    #[test]
    fn missing_map_file_detected() {
        let body = "io.anuke.arc.util.ArcRuntimeException: File not found: maps/Foo.msav (Local)";
        assert!(is_missing_file(body));
        assert!(!is_missing_file("Could not parse command"));
    }
}
