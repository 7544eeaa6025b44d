use edge_filter_common::scene::DetectedObject;

/// Parse one line of detector output.
///
/// Detection records look like `person: 95%`: exactly two whitespace
/// separated tokens, the second being digits followed by `%`. Anything else
/// (progress banners, layer dumps, timing lines, warnings) yields `None`.
pub fn parse_detection_line(line: &str) -> Option<DetectedObject> {
    let mut tokens = line.split_whitespace();
    let (name_token, pct_token) = (tokens.next()?, tokens.next()?);
    if tokens.next().is_some() {
        return None;
    }

    let digits = pct_token.strip_suffix('%')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    // Out-of-range values are clamped; only overflow beyond u64 is rejected.
    let confidence = digits.parse::<u64>().ok()?.min(100) as u8;

    let name = name_token.strip_suffix(':').unwrap_or(name_token);
    if name.is_empty() {
        return None;
    }

    Some(DetectedObject::new(name, confidence))
}
