use anyhow::{anyhow, Result};
use semver::Version;

/// Pulls a semantic version out of arbitrary `--version` output.
///
/// Tool banners differ wildly (`v22.1.0`, `Python 3.12.4`, `Homebrew 4.3.9`,
/// `git version 2.39.2 (Apple Git-143)`); the first whitespace-separated
/// token carrying a dotted numeric run wins. Missing minor/patch fields are
/// padded with zeros so `3.12` parses as `3.12.0`.
pub fn parse_lenient_version(output: &str) -> Result<Version> {
    for token in output.split_whitespace() {
        let candidate = token.trim_start_matches(|ch: char| !ch.is_ascii_digit());
        let numeric: String = candidate
            .chars()
            .take_while(|ch| ch.is_ascii_digit() || *ch == '.')
            .collect();
        // A numeric run that continues into letters ("1.2.x", "1.0rc2") is
        // not a version this caller can compare; skip the token.
        if candidate[numeric.len()..]
            .chars()
            .next()
            .map(|ch| ch.is_ascii_alphanumeric())
            .unwrap_or(false)
        {
            continue;
        }
        let numeric = numeric.trim_matches('.');
        if numeric.is_empty() || !numeric.contains('.') {
            continue;
        }

        let mut fields = numeric.split('.');
        let major = fields.next().and_then(|v| v.parse::<u64>().ok());
        let minor = fields.next().and_then(|v| v.parse::<u64>().ok());
        let patch = fields.next().map(|v| v.parse::<u64>().ok());

        let (Some(major), Some(minor)) = (major, minor) else {
            continue;
        };
        // An absent third field pads to zero; a malformed one ("1..2.3")
        // disqualifies the token.
        let patch = match patch {
            Some(Some(patch)) => patch,
            Some(None) => continue,
            None => 0,
        };

        return Ok(Version::new(major, minor, patch));
    }

    Err(anyhow!("no version found in output: '{}'", output.trim()))
}

pub fn meets_minimum(installed: &Version, minimum: &Version) -> bool {
    installed >= minimum
}
