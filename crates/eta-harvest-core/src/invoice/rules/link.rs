//! External share-link derivation.

/// Build the public share link of a document.
///
/// The link is a pure function of the identifiers: the submission id is used
/// when it is longer than 10 characters, otherwise the electronic id reduced
/// to ASCII alphanumerics and cut to 26 characters stands in for it. Returns
/// an empty string when there is no electronic id.
pub fn share_link(base: &str, electronic_number: &str, submission_id: &str) -> String {
    let electronic_number = electronic_number.trim();
    if electronic_number.is_empty() {
        return String::new();
    }

    let submission_id = submission_id.trim();
    let share_id = if submission_id.chars().count() > 10 {
        submission_id.to_string()
    } else {
        electronic_number
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .take(26)
            .collect()
    };

    format!(
        "{}/{}/share/{}",
        base.trim_end_matches('/'),
        electronic_number,
        share_id
    )
}
