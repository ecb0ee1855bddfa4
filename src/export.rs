use crate::models::{EmailMessage, EmailSequence};

pub fn stage_title(position: usize) -> &'static str {
    match position {
        1 => "1. Welcome",
        2 => "2. Nurture",
        3 => "3. Convert",
        _ => "Email",
    }
}

/// Clipboard form of a single email.
pub fn copy_text(email: &EmailMessage) -> String {
    format!("Subject: {}\n\n{}", email.subject, email.body)
}

/// Plain-text rendering of the whole sequence, in send order.
pub fn sequence_text(seq: &EmailSequence) -> String {
    seq.iter()
        .map(|(position, email)| {
            format!(
                "=== {} ===\nDelay: {}\n{}\n",
                stage_title(position),
                email.delay,
                copy_text(email)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
