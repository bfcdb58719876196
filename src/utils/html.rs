// src/utils/html.rs

use ammonia;

/// Clean teacher-authored rich text (question text, explanations,
/// assignment descriptions) with the ammonia library.
///
/// Whitelist-based sanitization: safe tags like <b> and <p> survive,
/// <script>/<iframe> and event-handler attributes are stripped. This is
/// the fail-safe against stored XSS reaching students during an attempt
/// or a review.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}
