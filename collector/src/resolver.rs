use persona_core::{CoreError, REDDIT_WEB_BASE};
use url::Url;

fn invalid(reference: &str, reason: &str) -> CoreError {
    CoreError::InvalidReference {
        reference: reference.to_string(),
        reason: reason.to_string(),
    }
}

/// Extract the username from a profile reference such as
/// `https://www.reddit.com/user/Some_Name/comments/`.
///
/// The path must contain a `user` segment (any case) directly followed by
/// the name. Scheme-less references (`reddit.com/user/x`) are accepted. The
/// name keeps its case.
pub fn resolve_username(reference: &str) -> Result<String, CoreError> {
    let trimmed = reference.trim();
    if trimmed.is_empty() {
        return Err(invalid(reference, "empty reference"));
    }

    let url = match Url::parse(trimmed) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let with_scheme = if trimmed.starts_with('/') {
                format!("{}{}", REDDIT_WEB_BASE, trimmed)
            } else {
                format!("https://{}", trimmed)
            };
            Url::parse(&with_scheme).map_err(|e| invalid(reference, &e.to_string()))?
        }
        Err(e) => return Err(invalid(reference, &e.to_string())),
    };

    let segments: Vec<&str> = url
        .path_segments()
        .map(|segments| segments.filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();

    let username = segments
        .windows(2)
        .find(|pair| pair[0].eq_ignore_ascii_case("user"))
        .map(|pair| pair[1])
        .ok_or_else(|| invalid(reference, "no /user/<name> segment in path"))?;

    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(invalid(reference, "username contains invalid characters"));
    }

    Ok(username.to_string())
}
