//! Mod URL list parsing and host classification

use crate::catalogs::Host;

use serde::Serialize;

/// Lines starting with this are user comments
pub const COMMENT_MARKER: char = '#';

/// Shorter lines cannot be a mod URL and are ignored
pub const MIN_URL_LEN: usize = 6;

// Matched without scheme so `http://` and `www`-less links work too. The
// trailing slash keeps `modrinth.com/modpack/...` out.
const CURSEFORGE_PATTERN: &str = "curseforge.com/minecraft/mc-mods/";
const MODRINTH_PATTERN: &str = "modrinth.com/mod/";

/// A classified input URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModReference {
    /// The URL as the user typed it (trimmed)
    pub url: String,
    pub host: Host,
    pub slug: String,
}

impl ModReference {
    /// Canonical mod page URL: rebuilt from the slug for known hosts, the
    /// original URL otherwise
    pub fn catalog_url(&self) -> String {
        match self.host.mod_page_base() {
            Some(base) => format!("{}/{}", base, self.slug),
            None => self.url.clone(),
        }
    }
}

/// Keep only candidate URL lines: trimmed, non-blank, not comments, long enough
pub fn filter_lines<'a, I>(lines: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    lines
        .into_iter()
        .map(str::trim)
        .filter(|line| !line.starts_with(COMMENT_MARKER) && line.chars().count() >= MIN_URL_LEN)
        .map(String::from)
        .collect()
}

/// Split newline-delimited text into candidate URL lines
pub fn parse_url_list(text: &str) -> Vec<String> {
    filter_lines(text.lines())
}

/// Work out which catalog `url` points at and its slug
pub fn classify(url: &str) -> ModReference {
    let url = url.trim();
    let host = if url.contains(CURSEFORGE_PATTERN) {
        Host::CurseForge
    } else if url.contains(MODRINTH_PATTERN) {
        Host::Modrinth
    } else {
        Host::Unsupported
    };

    ModReference {
        url: url.to_string(),
        host,
        slug: slug_from_url(url),
    }
}

/// Classify every line, keeping input order
pub fn classify_all<S: AsRef<str>>(urls: &[S]) -> Vec<ModReference> {
    urls.iter().map(|url| classify(url.as_ref())).collect()
}

/// Last path segment, ignoring query, fragment and trailing slashes
pub fn slug_from_url(url: &str) -> String {
    let url = url.trim();
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let segment = path.trim_end_matches('/').rsplit('/').next().unwrap_or_default();

    let decoded = match urlencoding::decode(segment) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => segment.to_string(),
    };
    decoded.trim().to_string()
}
