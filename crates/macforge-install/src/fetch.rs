use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use sha2::{Digest, Sha256};

const USER_AGENT: &str = concat!("macforge/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Downloaded {
    pub path: PathBuf,
    pub bytes: u64,
    pub sha256_hex: String,
}

fn client() -> Result<reqwest::blocking::Client> {
    reqwest::blocking::Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .context("failed to build HTTP client")
}

pub fn http_get_text(url: &str) -> Result<String> {
    client()?
        .get(url)
        .send()
        .with_context(|| format!("GET {url} failed"))?
        .error_for_status()
        .with_context(|| format!("GET {url} returned an error status"))?
        .text()
        .with_context(|| format!("GET {url} body was not readable text"))
}

/// First `href` in the document whose target (query and fragment ignored)
/// ends with `extension`. A linear scan is all the page structure we rely
/// on; this is a marketing page, not an API.
pub fn scrape_first_link_with_extension(html: &str, extension: &str) -> Option<String> {
    let bytes = html.as_bytes();
    let mut at = 0;
    while let Some(found) = html[at..].find("href") {
        let mut cursor = at + found + "href".len();
        at = cursor;

        while cursor < bytes.len() && bytes[cursor].is_ascii_whitespace() {
            cursor += 1;
        }
        if cursor >= bytes.len() || bytes[cursor] != b'=' {
            continue;
        }
        cursor += 1;
        while cursor < bytes.len() && bytes[cursor].is_ascii_whitespace() {
            cursor += 1;
        }
        if cursor >= bytes.len() {
            continue;
        }

        let target = match bytes[cursor] {
            quote @ (b'"' | b'\'') => {
                let start = cursor + 1;
                let end = html[start..].find(quote as char).map(|pos| start + pos)?;
                &html[start..end]
            }
            _ => {
                let start = cursor;
                let end = html[start..]
                    .find(|ch: char| ch.is_ascii_whitespace() || ch == '>')
                    .map(|pos| start + pos)
                    .unwrap_or(html.len());
                &html[start..end]
            }
        };

        let without_fragment = target.split('#').next().unwrap_or(target);
        let without_query = without_fragment
            .split('?')
            .next()
            .unwrap_or(without_fragment);
        if without_query
            .to_ascii_lowercase()
            .ends_with(&extension.to_ascii_lowercase())
        {
            return Some(target.to_string());
        }
    }
    None
}

/// Makes a scraped link absolute against the page it came from.
pub fn resolve_link(page_url: &str, link: &str) -> String {
    if link.starts_with("http://") || link.starts_with("https://") {
        return link.to_string();
    }
    if let Some(rest) = link.strip_prefix("//") {
        let scheme = page_url.split("://").next().unwrap_or("https");
        return format!("{scheme}://{rest}");
    }
    if link.starts_with('/') {
        return format!("{}{}", origin_of(page_url), link);
    }

    let base = match page_url.rfind('/') {
        // Keep everything through the final slash unless it is part of the
        // scheme separator.
        Some(pos) if pos > page_url.find("://").map(|p| p + 2).unwrap_or(0) => &page_url[..=pos],
        _ => page_url,
    };
    format!("{}/{}", base.trim_end_matches('/'), link)
}

fn origin_of(url: &str) -> &str {
    let Some(scheme_end) = url.find("://") else {
        return url;
    };
    let host_start = scheme_end + 3;
    match url[host_start..].find('/') {
        Some(pos) => &url[..host_start + pos],
        None => url,
    }
}

/// Streams `url` into `dest`, reporting progress and digesting the bytes as
/// they arrive. The download lands in a `.part` sibling first and is
/// renamed into place only when complete, so an interrupted run never
/// leaves a plausible-looking partial file at `dest`.
pub fn download_to_file(
    url: &str,
    dest: &Path,
    progress: &mut dyn FnMut(u64, Option<u64>),
) -> Result<Downloaded> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create download dir: {}", parent.display()))?;
    }

    let part_path = dest.with_file_name(format!(
        "{}.part",
        dest.file_name()
            .and_then(|v| v.to_str())
            .unwrap_or("download")
    ));

    let result = stream_to_part(url, &part_path, progress);
    let (bytes, sha256_hex) = match result {
        Ok(summary) => summary,
        Err(err) => {
            let _ = fs::remove_file(&part_path);
            return Err(err);
        }
    };

    if bytes == 0 {
        let _ = fs::remove_file(&part_path);
        return Err(anyhow!("download of {url} produced an empty file"));
    }

    if dest.exists() {
        fs::remove_file(dest)
            .with_context(|| format!("failed to replace existing file: {}", dest.display()))?;
    }
    fs::rename(&part_path, dest).with_context(|| {
        format!("failed to move completed download into place: {}", dest.display())
    })?;

    Ok(Downloaded {
        path: dest.to_path_buf(),
        bytes,
        sha256_hex,
    })
}

fn stream_to_part(
    url: &str,
    part_path: &Path,
    progress: &mut dyn FnMut(u64, Option<u64>),
) -> Result<(u64, String)> {
    let response = client()?
        .get(url)
        .send()
        .with_context(|| format!("GET {url} failed"))?
        .error_for_status()
        .with_context(|| format!("GET {url} returned an error status"))?;
    let total = response.content_length();

    let mut reader = response;
    let mut out = fs::File::create(part_path)
        .with_context(|| format!("failed to create {}", part_path.display()))?;
    let mut hasher = Sha256::new();
    let mut downloaded: u64 = 0;
    let mut buffer = [0u8; 64 * 1024];

    progress(0, total);
    loop {
        let read = reader
            .read(&mut buffer)
            .with_context(|| format!("read from {url} failed"))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
        out.write_all(&buffer[..read])
            .with_context(|| format!("write to {} failed", part_path.display()))?;
        downloaded += read as u64;
        progress(downloaded, total);
    }
    out.flush()
        .with_context(|| format!("flush of {} failed", part_path.display()))?;

    Ok((downloaded, hex::encode(hasher.finalize())))
}
