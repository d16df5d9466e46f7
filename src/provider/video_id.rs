use crate::errors::{AppError, AppResult};
use once_cell::sync::Lazy;
use regex::Regex;

static URL_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)^(?:https?://)?(?:www\.|m\.|music\.)?youtube\.com/watch\?(?:[^#]*&)?v=([A-Za-z0-9_-]{11})(?:[&#].*)?$")
            .expect("valid regex"),
        Regex::new(r"(?i)^(?:https?://)?(?:www\.|m\.)?youtube\.com/(?:shorts|embed|live|v)/([A-Za-z0-9_-]{11})(?:[/?#].*)?$")
            .expect("valid regex"),
        Regex::new(r"(?i)^(?:https?://)?youtu\.be/([A-Za-z0-9_-]{11})(?:[/?#].*)?$").expect("valid regex"),
    ]
});

static BARE_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").expect("valid regex"));

pub fn resolve_video_id(source_url: &str) -> AppResult<String> {
    let trimmed = source_url.trim();
    if trimmed.is_empty() {
        return Err(AppError::InvalidInput("Track URL cannot be empty".to_string()));
    }
    if BARE_ID.is_match(trimmed) {
        return Ok(trimmed.to_string());
    }

    URL_PATTERNS
        .iter()
        .find_map(|pattern| pattern.captures(trimmed))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| AppError::InvalidInput(format!("Could not resolve a video id from '{}'", trimmed)))
}

#[cfg(test)]
mod tests {
    use super::resolve_video_id;

    #[test]
    fn resolves_common_url_shapes() {
        let cases = [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://youtube.com/watch?feature=share&v=dQw4w9WgXcQ&t=42",
            "https://m.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://music.youtube.com/watch?v=dQw4w9WgXcQ&list=RD",
            "https://youtu.be/dQw4w9WgXcQ?si=abc",
            "https://www.youtube.com/shorts/dQw4w9WgXcQ",
            "https://www.youtube.com/embed/dQw4w9WgXcQ",
            "youtube.com/live/dQw4w9WgXcQ",
            "  dQw4w9WgXcQ  ",
        ];
        for case in cases {
            assert_eq!(resolve_video_id(case).expect(case), "dQw4w9WgXcQ", "{}", case);
        }
    }

    #[test]
    fn rejects_unresolvable_urls() {
        assert!(resolve_video_id("").is_err());
        assert!(resolve_video_id("https://vimeo.com/12345").is_err());
        assert!(resolve_video_id("https://www.youtube.com/watch?v=short").is_err());
        assert!(resolve_video_id("https://www.youtube.com/channel/UCabcdefghijk").is_err());
    }
}
