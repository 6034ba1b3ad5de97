// HLS Playlist Parser: classifies M3U8 text and extracts variants, segments and key parameters.

use crate::HlsError;
use url::Url;

const M3U_MARKER: &str = "#EXTM3U";
const INF_DIRECTIVE: &str = "#EXTINF:";
const STREAM_DIRECTIVE: &str = "#EXT-X-STREAM-INF:";
const KEY_DIRECTIVE: &str = "#EXT-X-KEY:";
const TARGET_DURATION_DIRECTIVE: &str = "#EXT-X-TARGETDURATION:";
const MEDIA_SEQUENCE_DIRECTIVE: &str = "#EXT-X-MEDIA-SEQUENCE:";

/// What kind of valid playlist a text blob is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaylistKind {
    /// Lists bitrate variants, each pointing at its own media playlist.
    Master,
    /// Lists the ordered segments of one variant.
    Media,
}

/// One advertised rendition of a master playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantInfo {
    pub url: Url,
    /// Bits per second, as advertised by `BANDWIDTH`.
    pub bandwidth: u64,
}

/// Header facts of a media playlist, read up to the first segment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaInfo {
    /// `EXT-X-MEDIA-SEQUENCE`, 0 when absent.
    pub sequence: u64,
    /// `EXT-X-TARGETDURATION` in seconds, 0 when absent.
    pub target_duration: u64,
    pub is_encrypted: bool,
    /// Encryption method as written in the playlist, e.g. `AES-128`.
    pub method: Option<String>,
    pub key_url: Option<Url>,
    pub iv: Option<[u8; 16]>,
}

/// Whether the first non-empty line is the `#EXTM3U` marker.
pub fn is_m3u(text: &str) -> bool {
    text.trim_start_matches('\u{feff}')
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        == Some(M3U_MARKER)
}

/// A playlist is a master playlist if a stream-variant directive shows up
/// before any segment-duration directive.
pub fn is_master(text: &str) -> bool {
    for line in text.lines().map(str::trim) {
        if line.starts_with(STREAM_DIRECTIVE) {
            return true;
        }
        if line.starts_with(INF_DIRECTIVE) {
            return false;
        }
    }
    false
}

/// Whether the playlist declares a key anywhere.
pub fn is_encrypted(text: &str) -> bool {
    text.contains(KEY_DIRECTIVE)
}

pub fn classify(text: &str) -> Result<PlaylistKind, HlsError> {
    ensure_m3u(text)?;
    if is_master(text) {
        Ok(PlaylistKind::Master)
    } else {
        Ok(PlaylistKind::Media)
    }
}

/// Parse the variants of a master playlist, in manifest order.
pub fn parse_master(text: &str, base_url: &Url) -> Result<Vec<VariantInfo>, HlsError> {
    ensure_m3u(text)?;
    let mut lines = text.lines().map(str::trim);
    let mut variants = Vec::new();

    while let Some(line) = lines.next() {
        let Some(attrs) = line.strip_prefix(STREAM_DIRECTIVE) else {
            continue;
        };
        let attrs = AttributeList::parse(attrs)?;
        let bandwidth = attrs
            .get("BANDWIDTH")
            .ok_or_else(|| HlsError::invalid_format("stream variant without BANDWIDTH"))
            .and_then(|value| parse_number(value, "BANDWIDTH"))?;
        let uri = next_uri(&mut lines)
            .ok_or_else(|| HlsError::invalid_format("stream variant without a URI line"))?;

        variants.push(VariantInfo {
            url: resolve(base_url, uri)?,
            bandwidth,
        });
    }

    Ok(variants)
}

/// Parse a media playlist into its header facts and absolute segment URLs.
pub fn parse_media(text: &str, base_url: &Url) -> Result<(MediaInfo, Vec<Url>), HlsError> {
    ensure_m3u(text)?;
    let mut lines = text.lines().map(str::trim);
    let mut info = MediaInfo::default();
    let mut segments = Vec::new();
    let mut in_segment_list = false;

    while let Some(line) = lines.next() {
        if line.starts_with(INF_DIRECTIVE) {
            in_segment_list = true;
            let uri = next_uri(&mut lines).ok_or_else(|| {
                HlsError::invalid_format(format!("segment #{} has no URI line", segments.len()))
            })?;
            segments.push(resolve(base_url, uri)?);
            continue;
        }
        if in_segment_list {
            continue;
        }

        if let Some(value) = line.strip_prefix(TARGET_DURATION_DIRECTIVE) {
            info.target_duration = parse_number(value, "EXT-X-TARGETDURATION")?;
        } else if let Some(value) = line.strip_prefix(MEDIA_SEQUENCE_DIRECTIVE) {
            info.sequence = parse_number(value, "EXT-X-MEDIA-SEQUENCE")?;
        } else if let Some(attrs) = line.strip_prefix(KEY_DIRECTIVE) {
            apply_key(&mut info, &AttributeList::parse(attrs)?, base_url)?;
        }
    }

    Ok((info, segments))
}

fn apply_key(info: &mut MediaInfo, attrs: &AttributeList, base_url: &Url) -> Result<(), HlsError> {
    let method = attrs
        .get("METHOD")
        .ok_or_else(|| HlsError::invalid_format("EXT-X-KEY without METHOD"))?;
    if method == "NONE" {
        return Ok(());
    }

    let uri = attrs
        .get("URI")
        .ok_or_else(|| HlsError::invalid_format(format!("EXT-X-KEY {method} without URI")))?;
    info.is_encrypted = true;
    info.method = Some(method.to_string());
    info.key_url = Some(resolve(base_url, uri)?);
    info.iv = attrs.get("IV").map(parse_iv).transpose()?;
    Ok(())
}

/// Decode a `0x`-prefixed, 32-hex-digit IV attribute.
pub fn parse_iv(value: &str) -> Result<[u8; 16], HlsError> {
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    let mut iv = [0u8; 16];
    hex::decode_to_slice(digits, &mut iv)
        .map_err(|e| HlsError::invalid_format(format!("invalid IV '{value}': {e}")))?;
    Ok(iv)
}

fn ensure_m3u(text: &str) -> Result<(), HlsError> {
    if is_m3u(text) {
        Ok(())
    } else {
        Err(HlsError::invalid_format(format!(
            "first line is not the {M3U_MARKER} marker"
        )))
    }
}

/// The URI line of the entry directive just read.
///
/// Blank lines and other tags (e.g. `#EXT-X-BYTERANGE`) are skipped. Reaching
/// the next entry directive first means this entry has no URI.
fn next_uri<'a>(lines: &mut impl Iterator<Item = &'a str>) -> Option<&'a str> {
    for line in lines.by_ref() {
        if line.starts_with(INF_DIRECTIVE) || line.starts_with(STREAM_DIRECTIVE) {
            return None;
        }
        if !line.is_empty() && !line.starts_with('#') {
            return Some(line);
        }
    }
    None
}

fn resolve(base_url: &Url, reference: &str) -> Result<Url, HlsError> {
    base_url.join(reference).map_err(|e| {
        HlsError::invalid_format(format!("cannot resolve '{reference}' against {base_url}: {e}"))
    })
}

fn parse_number(value: &str, what: &str) -> Result<u64, HlsError> {
    value
        .trim()
        .parse()
        .map_err(|e| HlsError::invalid_format(format!("{what} value '{value}': {e}")))
}

/// A parsed `KEY=VALUE,...` attribute list with quotes removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeList {
    entries: Vec<(String, String)>,
}

impl AttributeList {
    /// Commas inside double quotes do not separate attributes. A missing `=`,
    /// an empty name or unbalanced quoting is an error.
    pub fn parse(input: &str) -> Result<Self, HlsError> {
        let mut entries = Vec::new();
        let mut in_quotes = false;
        let mut start = 0;

        for (pos, ch) in input.char_indices() {
            match ch {
                '"' => in_quotes = !in_quotes,
                ',' if !in_quotes => {
                    Self::push_item(&mut entries, &input[start..pos])?;
                    start = pos + 1;
                }
                _ => {}
            }
        }
        if in_quotes {
            return Err(HlsError::invalid_format(format!(
                "unterminated quoted value in attribute list '{input}'"
            )));
        }
        Self::push_item(&mut entries, &input[start..])?;

        Ok(Self { entries })
    }

    fn push_item(entries: &mut Vec<(String, String)>, item: &str) -> Result<(), HlsError> {
        let item = item.trim();
        if item.is_empty() {
            return Ok(());
        }
        let (name, value) = item
            .split_once('=')
            .ok_or_else(|| HlsError::invalid_format(format!("attribute '{item}' has no '='")))?;
        let name = name.trim();
        if name.is_empty() || name.contains('"') {
            return Err(HlsError::invalid_format(format!(
                "attribute '{item}' has an invalid name"
            )));
        }

        let value = value.trim();
        let value = if let Some(rest) = value.strip_prefix('"') {
            rest.strip_suffix('"')
                .filter(|inner| !inner.contains('"'))
                .ok_or_else(|| {
                    HlsError::invalid_format(format!("attribute '{item}' has mismatched quotes"))
                })?
        } else if value.contains('"') {
            return Err(HlsError::invalid_format(format!(
                "attribute '{item}' has mismatched quotes"
            )));
        } else {
            value
        };

        entries.push((name.to_string(), value.to_string()));
        Ok(())
    }

    /// Value of an attribute; the last occurrence wins.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
