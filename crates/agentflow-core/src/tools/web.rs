//! HTTP and markup helpers shared by the web tools.

use crate::error::FlowError;
use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;

const USER_AGENT: &str = "agentflow/0.1";

/// GET `url` and return the status code with the body, failing on non-2xx.
pub(crate) async fn fetch_text(
    tool: &str,
    url: &str,
    timeout: Duration,
) -> Result<(u16, String), FlowError> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| FlowError::tool(tool, format!("HTTP client error: {e}")))?;

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| FlowError::tool(tool, format!("request to {url} failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(FlowError::tool(tool, format!("{url} returned status {status}")));
    }

    let body = response
        .text()
        .await
        .map_err(|e| FlowError::tool(tool, format!("failed to read {url}: {e}")))?;
    Ok((status.as_u16(), body))
}

pub(crate) fn tags() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<!--.*?-->|<[^>]*>").expect("tag regex is valid"))
}

fn entities() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"&(?:#([0-9]{1,7})|#[xX]([0-9a-fA-F]{1,6})|([A-Za-z][A-Za-z0-9]*));")
            .expect("entity regex is valid")
    })
}

fn named_entity(name: &str) -> Option<char> {
    let c = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => ' ',
        "mdash" => '\u{2014}',
        "ndash" => '\u{2013}',
        "hellip" => '\u{2026}',
        "lsquo" => '\u{2018}',
        "rsquo" => '\u{2019}',
        "ldquo" => '\u{201C}',
        "rdquo" => '\u{201D}',
        "laquo" => '\u{00AB}',
        "raquo" => '\u{00BB}',
        "middot" => '\u{00B7}',
        "bull" => '\u{2022}',
        "copy" => '\u{00A9}',
        "reg" => '\u{00AE}',
        "trade" => '\u{2122}',
        _ => return None,
    };
    Some(c)
}

/// Decode character references in one pass. Unknown or invalid references are kept as written.
pub(crate) fn decode_entities(text: &str) -> String {
    entities()
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let decoded = if let Some(dec) = caps.get(1) {
                dec.as_str().parse::<u32>().ok().and_then(char::from_u32)
            } else if let Some(hex) = caps.get(2) {
                u32::from_str_radix(hex.as_str(), 16).ok().and_then(char::from_u32)
            } else {
                caps.get(3).and_then(|name| named_entity(name.as_str()))
            };
            match decoded {
                Some(c) => c.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Text of an inline fragment such as a link label, on a single line.
pub(crate) fn inline_text(fragment: &str) -> String {
    let stripped = tags().replace_all(fragment, "");
    decode_entities(&stripped)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
